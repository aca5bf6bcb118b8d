use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Severity;

/// Items collected by the wizard carry a session-local id.
pub trait LocalItem {
    fn local_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: String,
    pub name: String,
    pub frequency: String,
    pub severity: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub route: String,
    pub times_per_day: String,
    pub duration_days: String,
    pub timing: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigation {
    pub id: String,
    pub name: String,
}

macro_rules! local_item {
    ($($ty:ty),+ $(,)?) => {
        $(impl LocalItem for $ty {
            fn local_id(&self) -> &str {
                &self.id
            }
        })+
    };
}

local_item!(Symptom, Finding, Diagnosis, Medicine, Investigation);

/// Vital signs as typed by the operator. Free text throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub temperature: String,
    pub blood_pressure: String,
    pub pulse: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub bmi: String,
    #[serde(default)]
    pub waist_hip: String,
    #[serde(default)]
    pub spo2: String,
}

impl Vitals {
    /// Names of the mandatory fields that are blank.
    pub fn missing_mandatory(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.temperature.trim().is_empty() {
            missing.push("temperature");
        }
        if self.blood_pressure.trim().is_empty() {
            missing.push("blood_pressure");
        }
        if self.pulse.trim().is_empty() {
            missing.push("pulse");
        }
        missing
    }

    /// Label/value pairs in display order.
    pub fn labelled(&self) -> [(&'static str, &str); 8] {
        [
            ("Temperature", self.temperature.as_str()),
            ("Blood Pressure", self.blood_pressure.as_str()),
            ("Pulse", self.pulse.as_str()),
            ("Height", self.height.as_str()),
            ("Weight", self.weight.as_str()),
            ("BMI", self.bmi.as_str()),
            ("Waist/Hip", self.waist_hip.as_str()),
            ("SpO2", self.spo2.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineReminder {
    pub message: bool,
    pub call: bool,
}

impl MedicineReminder {
    /// Labels of the enabled reminder channels, in fixed order.
    pub fn active_labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.message {
            labels.push("Message");
        }
        if self.call {
            labels.push("Call");
        }
        labels
    }
}

/// The structured clinical document assembled from the wizard.
///
/// Immutable once persisted: there is no update path, a correction is a
/// new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionRecord {
    pub prescription_id: String,
    pub doctor_id: String,
    pub patient_id: String,
    pub symptoms: Vec<Symptom>,
    pub findings: Vec<Finding>,
    pub diagnoses: Vec<Diagnosis>,
    pub medicines: Vec<Medicine>,
    pub investigations: Vec<Investigation>,
    pub investigation_notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub medicine_instructions: Option<String>,
    pub chronic_condition: bool,
    pub critical_lab_values: Option<String>,
    pub severity: Option<Severity>,
    pub medicine_reminder: MedicineReminder,
    pub vitals: Vitals,
    /// Reference to the rendered PDF, set only after a successful upload.
    pub storage_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row shape for history lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionSummary {
    pub prescription_id: String,
    pub doctor_id: String,
    pub patient_id: String,
    pub diagnosis_names: Vec<String>,
    pub medicine_count: usize,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<&PrescriptionRecord> for PrescriptionSummary {
    fn from(record: &PrescriptionRecord) -> Self {
        Self {
            prescription_id: record.prescription_id.clone(),
            doctor_id: record.doctor_id.clone(),
            patient_id: record.patient_id.clone(),
            diagnosis_names: record.diagnoses.iter().map(|d| d.name.clone()).collect(),
            medicine_count: record.medicines.len(),
            follow_up_date: record.follow_up_date,
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mandatory_vitals_reported_in_order() {
        let vitals = Vitals {
            temperature: " ".into(),
            pulse: "72".into(),
            ..Default::default()
        };
        assert_eq!(vitals.missing_mandatory(), vec!["temperature", "blood_pressure"]);
    }

    #[test]
    fn optional_vitals_do_not_count_as_missing() {
        let vitals = Vitals {
            temperature: "98.6F".into(),
            blood_pressure: "120/80".into(),
            pulse: "72".into(),
            ..Default::default()
        };
        assert!(vitals.missing_mandatory().is_empty());
    }

    #[test]
    fn reminder_labels_only_active_flags() {
        assert!(MedicineReminder::default().active_labels().is_empty());
        let both = MedicineReminder { message: true, call: true };
        assert_eq!(both.active_labels(), vec!["Message", "Call"]);
        let call = MedicineReminder { message: false, call: true };
        assert_eq!(call.active_labels(), vec!["Call"]);
    }

    #[test]
    fn vitals_deserialize_with_only_mandatory_fields() {
        let vitals: Vitals =
            serde_json::from_str(r#"{"temperature":"99F","blood_pressure":"110/70","pulse":"80"}"#)
                .unwrap();
        assert_eq!(vitals.pulse, "80");
        assert!(vitals.spo2.is_empty());
    }
}
