use serde::{Deserialize, Serialize};

/// A registered patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub registered_by: String,
    pub registered_at: String,
}

/// Registration desk input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl Patient {
    /// "Name (34, F)" style label used on documents and previews.
    pub fn display_label(&self) -> String {
        let mut details = Vec::new();
        if let Some(age) = self.age {
            details.push(age.to_string());
        }
        if let Some(gender) = self.gender.as_deref().filter(|g| !g.trim().is_empty()) {
            details.push(gender.trim().to_string());
        }
        if details.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, details.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(age: Option<u32>, gender: Option<&str>) -> Patient {
        Patient {
            id: "p-1".into(),
            name: "Asha Rao".into(),
            age,
            gender: gender.map(String::from),
            phone: None,
            address: None,
            registered_by: "doc-1".into(),
            registered_at: "2026-01-01 09:00:00".into(),
        }
    }

    #[test]
    fn display_label_with_details() {
        assert_eq!(patient(Some(34), Some("F")).display_label(), "Asha Rao (34, F)");
    }

    #[test]
    fn display_label_without_details() {
        assert_eq!(patient(None, Some("  ")).display_label(), "Asha Rao");
    }
}
