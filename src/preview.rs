//! Read-only views of a prescription, for draft review and history.
//!
//! The same view feeds the PDF renderer, so what the operator reviews is
//! what gets printed: table headers, cell text and placeholders all come
//! from here.

use serde::Serialize;

use crate::models::{Patient, PrescriptionRecord};

pub const NOT_SPECIFIED: &str = "Not specified";
pub const NONE: &str = "None";
pub const NO_FOLLOW_UP: &str = "No follow-up date set";

pub const SYMPTOM_HEADERS: [&str; 5] = ["#", "Symptom", "Frequency", "Severity", "Duration"];
pub const MEDICINE_HEADERS: [&str; 7] =
    ["#", "Medicine", "Dosage", "Route", "Times/Day", "Days", "Timing"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrescriptionPreview {
    pub prescription_id: String,
    pub patient: String,
    pub date: String,
    pub vitals: Vec<String>,
    pub symptoms: PreviewTable,
    pub findings: Vec<String>,
    pub diagnoses: Vec<String>,
    pub severity: String,
    pub chronic_condition: String,
    pub critical_lab_values: String,
    pub medicines: PreviewTable,
    pub medicine_instructions: String,
    pub reminders: String,
    pub investigations: Vec<String>,
    pub investigation_notes: String,
    pub follow_up: String,
}

impl PrescriptionPreview {
    /// Builds the view. Without a patient row the stored patient id is shown.
    pub fn build(record: &PrescriptionRecord, patient: Option<&Patient>) -> Self {
        let symptoms = PreviewTable {
            title: "Symptoms".into(),
            headers: SYMPTOM_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: record
                .symptoms
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    vec![
                        (i + 1).to_string(),
                        or_not_specified(&s.name),
                        or_not_specified(&s.frequency),
                        or_not_specified(&s.severity),
                        or_not_specified(&s.duration),
                    ]
                })
                .collect(),
        };

        let medicines = PreviewTable {
            title: "Medicines".into(),
            headers: MEDICINE_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: record
                .medicines
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    vec![
                        (i + 1).to_string(),
                        or_not_specified(&m.name),
                        or_not_specified(&m.dosage),
                        or_not_specified(&m.route),
                        or_not_specified(&m.times_per_day),
                        or_not_specified(&m.duration_days),
                        or_not_specified(&m.timing),
                    ]
                })
                .collect(),
        };

        let reminders = record.medicine_reminder.active_labels();

        Self {
            prescription_id: record.prescription_id.clone(),
            patient: patient
                .map(Patient::display_label)
                .unwrap_or_else(|| record.patient_id.clone()),
            date: record.created_at.format("%d %b %Y").to_string(),
            vitals: record
                .vitals
                .labelled()
                .iter()
                .map(|(label, value)| format!("{label}: {}", or_not_specified(value)))
                .collect(),
            symptoms,
            findings: list_or_none(record.findings.iter().map(|f| f.description.as_str())),
            diagnoses: list_or_none(record.diagnoses.iter().map(|d| d.name.as_str())),
            severity: record
                .severity
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            chronic_condition: if record.chronic_condition { "Yes" } else { "No" }.to_string(),
            critical_lab_values: or_none(record.critical_lab_values.as_deref()),
            medicines,
            medicine_instructions: or_none(record.medicine_instructions.as_deref()),
            reminders: if reminders.is_empty() {
                NONE.to_string()
            } else {
                reminders.join(", ")
            },
            investigations: list_or_none(record.investigations.iter().map(|i| i.name.as_str())),
            investigation_notes: or_none(record.investigation_notes.as_deref()),
            follow_up: record
                .follow_up_date
                .map(|d| d.format("%d %b %Y").to_string())
                .unwrap_or_else(|| NO_FOLLOW_UP.to_string()),
        }
    }
}

fn or_not_specified(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        value.to_string()
    }
}

fn or_none(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NONE.to_string(),
    }
}

fn list_or_none<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let items: Vec<String> = items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if items.is_empty() {
        vec![NONE.to_string()]
    } else {
        items
    }
}
