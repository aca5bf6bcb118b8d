//! Prescription document composition.

use crate::models::{DoctorProfile, Patient, PrescriptionRecord};
use crate::preview::{PrescriptionPreview, PreviewTable, NOT_SPECIFIED};

use super::layout::{Composer, HeaderLine, LayoutDocument, PageSpec};

/// Index of the symptoms table within a prescription document.
pub const SYMPTOM_TABLE: usize = 0;
/// Index of the medicines table within a prescription document.
pub const MEDICINE_TABLE: usize = 1;

/// Clinic and doctor identity printed in the header and footer.
#[derive(Debug, Clone, PartialEq)]
pub struct Letterhead {
    pub clinic_name: String,
    pub clinic_address: Option<String>,
    pub clinic_contact: Option<String>,
    pub doctor_name: String,
    pub specialty: String,
    pub license_number: String,
}

impl Default for Letterhead {
    fn default() -> Self {
        Self {
            clinic_name: "Medical Clinic".into(),
            clinic_address: None,
            clinic_contact: None,
            doctor_name: "Attending Physician".into(),
            specialty: NOT_SPECIFIED.into(),
            license_number: NOT_SPECIFIED.into(),
        }
    }
}

impl Letterhead {
    /// Profile values where present, defaults elsewhere.
    pub fn from_profile(profile: Option<&DoctorProfile>) -> Self {
        let Some(profile) = profile else {
            return Self::default();
        };
        let defaults = Self::default();
        let contact: Vec<&str> = [profile.clinic_phone.as_deref(), profile.clinic_email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            clinic_name: present(profile.clinic_name.as_deref()).unwrap_or(defaults.clinic_name),
            clinic_address: present(profile.clinic_address.as_deref()),
            clinic_contact: (!contact.is_empty()).then(|| contact.join(" | ")),
            doctor_name: present(Some(profile.name.as_str())).unwrap_or(defaults.doctor_name),
            specialty: present(profile.specialty.as_deref()).unwrap_or(defaults.specialty),
            license_number: present(profile.license_number.as_deref())
                .unwrap_or(defaults.license_number),
        }
    }

    /// "Dr. Name" without doubling an existing title.
    pub fn doctor_display(&self) -> String {
        let name = self.doctor_name.trim();
        if name.starts_with("Dr.") || name.starts_with("Dr ") {
            name.to_string()
        } else {
            format!("Dr. {name}")
        }
    }

    pub fn footer_line(&self) -> String {
        format!(
            "{} | {} | Reg. No: {}",
            self.doctor_display(),
            self.specialty,
            self.license_number
        )
    }

    fn header_lines(&self) -> Vec<HeaderLine> {
        let mut lines = vec![HeaderLine {
            text: self.clinic_name.clone(),
            size: 16.0,
            bold: true,
        }];
        for detail in [&self.clinic_address, &self.clinic_contact].into_iter().flatten() {
            lines.push(HeaderLine {
                text: detail.clone(),
                size: 9.0,
                bold: false,
            });
        }
        lines
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Lays out a prescription in its fixed section order: letterhead, title,
/// patient line, vitals, symptoms, findings, diagnoses, medicines,
/// investigations, follow-up.
pub fn compose_prescription(
    record: &PrescriptionRecord,
    patient: Option<&Patient>,
    letterhead: &Letterhead,
) -> LayoutDocument {
    let preview = PrescriptionPreview::build(record, patient);
    let spec = PageSpec::a4();
    let title = format!("Prescription {}", record.prescription_id);
    let mut doc = Composer::new(spec, &title, letterhead.header_lines());

    doc.text_block("PRESCRIPTION", 0.0, spec.section_font + 2.0, true);
    doc.text_block(&format!("Rx ID: {}", preview.prescription_id), 0.0, spec.table_font, false);
    doc.text_block(
        &format!(
            "Patient: {}    Doctor: {}    Date: {}",
            preview.patient,
            letterhead.doctor_display(),
            preview.date
        ),
        0.0,
        spec.body_font,
        false,
    );

    doc.section("Vitals", &[preview.vitals.join("  |  ")]);

    table_section(&mut doc, &preview.symptoms);

    doc.section("Findings", &bulleted(&preview.findings));

    let mut diagnoses = bulleted(&preview.diagnoses);
    diagnoses.push(format!("Severity: {}", preview.severity));
    diagnoses.push(format!("Chronic condition: {}", preview.chronic_condition));
    diagnoses.push(format!("Critical lab values: {}", preview.critical_lab_values));
    doc.section("Diagnoses", &diagnoses);

    table_section(&mut doc, &preview.medicines);
    doc.text_block(
        &format!("Instructions: {}", preview.medicine_instructions),
        spec.indent,
        spec.body_font,
        false,
    );
    doc.text_block(
        &format!("Reminders: {}", preview.reminders),
        spec.indent,
        spec.body_font,
        false,
    );

    let mut investigations = bulleted(&preview.investigations);
    investigations.push(format!("Notes: {}", preview.investigation_notes));
    doc.section("Investigations", &investigations);

    doc.section("Follow-up", &[preview.follow_up.clone()]);

    doc.finish(&letterhead.footer_line())
}

fn table_section(doc: &mut Composer, table: &PreviewTable) {
    doc.table_section(&table.title, &table.headers, &table.rows);
}

fn bulleted(items: &[String]) -> Vec<String> {
    items.iter().map(|item| format!("- {item}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Diagnosis, Medicine, MedicineReminder, Symptom, Vitals};
    use crate::render::layout::{DrawOp, Role};
    use crate::render::wrap::text_width_mm;
    use crate::render::table_rows;
    use chrono::{TimeZone, Utc};

    fn record(symptoms: usize, medicines: usize) -> PrescriptionRecord {
        PrescriptionRecord {
            prescription_id: "RX-20260309-110000-AB12".into(),
            doctor_id: "doc-1".into(),
            patient_id: "p-1".into(),
            symptoms: (0..symptoms)
                .map(|i| Symptom {
                    id: i.to_string(),
                    name: format!("Symptom {i}"),
                    frequency: "1/day".into(),
                    severity: "Mild".into(),
                    duration: "2 days".into(),
                })
                .collect(),
            findings: vec![],
            diagnoses: vec![Diagnosis { id: "d".into(), name: "Viral fever".into() }],
            medicines: (0..medicines)
                .map(|i| Medicine {
                    id: format!("m{i}"),
                    name: format!("Medicine {i}"),
                    dosage: "500mg".into(),
                    route: "Oral".into(),
                    times_per_day: "3".into(),
                    duration_days: "5".into(),
                    timing: "After Food".into(),
                })
                .collect(),
            investigations: vec![],
            investigation_notes: None,
            follow_up_date: None,
            medicine_instructions: None,
            chronic_condition: false,
            critical_lab_values: None,
            severity: None,
            medicine_reminder: MedicineReminder::default(),
            vitals: Vitals {
                temperature: "98.6F".into(),
                blood_pressure: "120/80".into(),
                pulse: "72".into(),
                ..Default::default()
            },
            storage_id: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 9, 11, 0, 0).unwrap(),
        }
    }

    fn all_text(doc: &LayoutDocument) -> Vec<String> {
        doc.texts(|_| true).into_iter().map(|(_, t)| t.to_string()).collect()
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let doc = compose_prescription(&record(1, 1), None, &Letterhead::default());
        let titles: Vec<&str> = doc
            .texts(|r| r == Role::SectionTitle)
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert_eq!(
            titles,
            vec![
                "Vitals",
                "Symptoms",
                "Findings",
                "Diagnoses",
                "Medicines",
                "Investigations",
                "Follow-up"
            ]
        );
    }

    #[test]
    fn placeholders_are_never_blank() {
        let doc = compose_prescription(&record(0, 0), None, &Letterhead::default());
        let text = all_text(&doc);
        assert!(text.iter().any(|t| t == "No follow-up date set"));
        assert!(text.iter().any(|t| t == "Reminders: None"));
        assert!(text.iter().any(|t| t == "- None"));
        assert_eq!(text.iter().filter(|t| *t == "No data").count(), 2);
        assert_eq!(table_rows(&doc, SYMPTOM_TABLE), 0);
        assert_eq!(table_rows(&doc, MEDICINE_TABLE), 0);
    }

    #[test]
    fn row_counts_survive_pagination() {
        let doc = compose_prescription(&record(30, 45), None, &Letterhead::default());
        assert!(doc.page_count() > 1);
        assert_eq!(table_rows(&doc, SYMPTOM_TABLE), 30);
        assert_eq!(table_rows(&doc, MEDICINE_TABLE), 45);
    }

    #[test]
    fn footer_carries_doctor_identity_on_every_page() {
        let profile = DoctorProfile {
            doctor_id: "doc-1".into(),
            name: "Anil Mehta".into(),
            specialty: Some("General Physician".into()),
            license_number: Some("KMC-12345".into()),
            clinic_name: Some("Sunrise Clinic".into()),
            clinic_address: Some("12 MG Road".into()),
            clinic_phone: Some("080-555-0101".into()),
            clinic_email: None,
        };
        let letterhead = Letterhead::from_profile(Some(&profile));
        let doc = compose_prescription(&record(40, 40), None, &letterhead);

        let footers = doc.texts(|r| r == Role::Footer);
        for page in 0..doc.page_count() {
            assert!(footers.iter().any(|(p, t)| *p == page
                && *t == "Dr. Anil Mehta | General Physician | Reg. No: KMC-12345"));
        }
        let headers = doc.texts(|r| r == Role::Header);
        assert_eq!(headers.iter().filter(|(_, t)| *t == "Sunrise Clinic").count(), doc.page_count());
    }

    #[test]
    fn long_letterhead_is_wrapped_not_cut() {
        let profile = DoctorProfile {
            doctor_id: "doc-1".into(),
            name: "Venkataramana Subrahmanyam Chandrasekharan".into(),
            specialty: Some("Consultant in Internal Medicine, Diabetology and Endocrinology".into()),
            license_number: Some("KMC-2026-0004512".into()),
            clinic_name: Some("Sunrise Clinic".into()),
            clinic_address: Some(
                "Ground Floor, Lakshmi Arcade, 14th Cross, 7th Main, Indiranagar Second Stage, \
                 Near the Old Water Tank, Bengaluru, Karnataka 560038"
                    .into(),
            ),
            clinic_phone: Some("080-555-0101".into()),
            clinic_email: None,
        };
        let letterhead = Letterhead::from_profile(Some(&profile));
        let doc = compose_prescription(&record(1, 1), None, &letterhead);
        let spec = doc.spec;

        let footer: Vec<&str> = doc
            .texts(|r| r == Role::Footer)
            .into_iter()
            .filter(|(p, t)| *p == 0 && !t.starts_with("Page "))
            .map(|(_, t)| t)
            .collect();
        assert!(footer.len() >= 2);
        assert_eq!(footer.join(" "), letterhead.footer_line());

        let header: Vec<&str> = doc
            .texts(|r| r == Role::Header)
            .into_iter()
            .filter(|(p, _)| *p == 0)
            .map(|(_, t)| t)
            .collect();
        assert!(header.len() > 2);
        assert!(header.iter().any(|t| t.contains("560038")));
        for op in &doc.pages[0].ops {
            if let DrawOp::Text { x, size, text, role: Role::Header, .. } = op {
                assert!(*x + text_width_mm(text, *size) <= spec.width - spec.margin + 0.01, "{text}");
            }
        }
    }

    #[test]
    fn letterhead_defaults_fill_gaps() {
        let profile = DoctorProfile {
            doctor_id: "doc-1".into(),
            name: "Dr. Priya Nair".into(),
            specialty: None,
            license_number: Some(" ".into()),
            clinic_name: None,
            clinic_address: None,
            clinic_phone: None,
            clinic_email: Some("desk@clinic.test".into()),
        };
        let letterhead = Letterhead::from_profile(Some(&profile));
        assert_eq!(letterhead.clinic_name, "Medical Clinic");
        assert_eq!(letterhead.clinic_contact.as_deref(), Some("desk@clinic.test"));
        assert_eq!(
            letterhead.footer_line(),
            "Dr. Priya Nair | Not specified | Reg. No: Not specified"
        );
        assert_eq!(Letterhead::from_profile(None), Letterhead::default());
    }
}
