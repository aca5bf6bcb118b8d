//! Prescription wizard: per-operator draft state.
//!
//! Each clinical list (symptoms, findings, diagnoses, medicines,
//! investigations) is a `Collector` of locally identified items. The
//! `PrescriptionDraft` aggregates every collector plus vitals and the
//! scalar fields, and is only ever changed through `apply`. Nothing here
//! touches the database or the network: the draft becomes a
//! `PrescriptionRecord` at submit time via `assemble`.

use chrono::{DateTime, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    Diagnosis, Finding, Investigation, LocalItem, Medicine, MedicineReminder,
    PrescriptionRecord, Severity, Symptom, Vitals,
};

// ─── Local ids ────────────────────────────────────────────────────────────────

/// Session-scoped id source. Ids are millisecond timestamps, bumped so
/// that they stay strictly increasing within one draft. They are not
/// globally unique and are never checked server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalIds {
    last: i64,
}

impl LocalIds {
    pub fn next(&mut self) -> String {
        self.next_at(Utc::now().timestamp_millis())
    }

    fn next_at(&mut self, now_ms: i64) -> String {
        let id = now_ms.max(self.last + 1);
        self.last = id;
        id.to_string()
    }
}

// ─── Collectors ───────────────────────────────────────────────────────────────

/// Ordered list of items for one wizard step. Insertion order is kept and
/// duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collector<T> {
    items: Vec<T>,
}

impl<T> Default for Collector<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: LocalItem + Clone> Collector<T> {
    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    /// Drops the item with `id`. Returns false when nothing matched.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.local_id() != id);
        self.items.len() != before
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }
}

// ─── Steps ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Symptoms,
    Findings,
    Diagnoses,
    Medicines,
    Investigations,
    VitalsAndFollowUp,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 7] = [
        WizardStep::Symptoms,
        WizardStep::Findings,
        WizardStep::Diagnoses,
        WizardStep::Medicines,
        WizardStep::Investigations,
        WizardStep::VitalsAndFollowUp,
        WizardStep::Review,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    /// Following step; the last step stays put.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1).min(Self::ALL.len() - 1)]
    }

    /// Preceding step; the first step stays put.
    pub fn previous(self) -> Self {
        Self::ALL[self.index().saturating_sub(1)]
    }
}

// ─── Actions ──────────────────────────────────────────────────────────────────

/// Every change a client can make to a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftAction {
    SetPatient { patient_id: String },
    AddSymptom {
        name: String,
        #[serde(default)]
        frequency: String,
        #[serde(default)]
        severity: String,
        #[serde(default)]
        duration: String,
    },
    RemoveSymptom { id: String },
    AddFinding { description: String },
    RemoveFinding { id: String },
    AddDiagnosis { name: String },
    RemoveDiagnosis { id: String },
    AddMedicine {
        name: String,
        #[serde(default)]
        dosage: String,
        #[serde(default)]
        route: String,
        #[serde(default)]
        times_per_day: String,
        #[serde(default)]
        duration_days: String,
        #[serde(default)]
        timing: String,
    },
    RemoveMedicine { id: String },
    AddInvestigation { name: String },
    RemoveInvestigation { id: String },
    SetInvestigationNotes { notes: Option<String> },
    SetMedicineInstructions { instructions: Option<String> },
    SetChronicCondition { chronic: bool },
    SetCriticalLabValues { values: Option<String> },
    SetSeverity { severity: Option<Severity> },
    SetMedicineReminder { message: bool, call: bool },
    SetVitals { vitals: Vitals },
    SetFollowUp { date: Option<NaiveDate> },
    NextStep,
    PreviousStep,
    GoToStep { step: WizardStep },
    Reset,
}

/// What `apply` changed, for the caller's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionEffect {
    Added { id: String },
    Removed { found: bool },
    Updated,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No patient selected")]
    MissingPatient,

    #[error("Missing mandatory vitals: {}", .0.join(", "))]
    MissingVitals(Vec<&'static str>),
}

// ─── Draft ────────────────────────────────────────────────────────────────────

/// All wizard state for one operator's prescription in progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrescriptionDraft {
    pub patient_id: Option<String>,
    pub step: WizardStep,
    pub symptoms: Collector<Symptom>,
    pub findings: Collector<Finding>,
    pub diagnoses: Collector<Diagnosis>,
    pub medicines: Collector<Medicine>,
    pub investigations: Collector<Investigation>,
    pub investigation_notes: Option<String>,
    pub medicine_instructions: Option<String>,
    pub chronic_condition: bool,
    pub critical_lab_values: Option<String>,
    pub severity: Option<Severity>,
    pub medicine_reminder: MedicineReminder,
    pub vitals: Vitals,
    pub follow_up_date: Option<NaiveDate>,
    #[serde(skip)]
    ids: LocalIds,
}

impl PrescriptionDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: DraftAction) -> ActionEffect {
        match action {
            DraftAction::SetPatient { patient_id } => {
                self.patient_id = non_blank(Some(patient_id));
            }
            DraftAction::AddSymptom { name, frequency, severity, duration } => {
                let id = self.ids.next();
                self.symptoms.add(Symptom {
                    id: id.clone(),
                    name: name.trim().to_string(),
                    frequency: frequency.trim().to_string(),
                    severity: severity.trim().to_string(),
                    duration: duration.trim().to_string(),
                });
                return ActionEffect::Added { id };
            }
            DraftAction::RemoveSymptom { id } => {
                return ActionEffect::Removed { found: self.symptoms.remove(&id) };
            }
            DraftAction::AddFinding { description } => {
                let id = self.ids.next();
                self.findings.add(Finding {
                    id: id.clone(),
                    description: description.trim().to_string(),
                });
                return ActionEffect::Added { id };
            }
            DraftAction::RemoveFinding { id } => {
                return ActionEffect::Removed { found: self.findings.remove(&id) };
            }
            DraftAction::AddDiagnosis { name } => {
                let id = self.ids.next();
                self.diagnoses.add(Diagnosis {
                    id: id.clone(),
                    name: name.trim().to_string(),
                });
                return ActionEffect::Added { id };
            }
            DraftAction::RemoveDiagnosis { id } => {
                return ActionEffect::Removed { found: self.diagnoses.remove(&id) };
            }
            DraftAction::AddMedicine {
                name,
                dosage,
                route,
                times_per_day,
                duration_days,
                timing,
            } => {
                let id = self.ids.next();
                self.medicines.add(Medicine {
                    id: id.clone(),
                    name: name.trim().to_string(),
                    dosage: dosage.trim().to_string(),
                    route: route.trim().to_string(),
                    times_per_day: times_per_day.trim().to_string(),
                    duration_days: duration_days.trim().to_string(),
                    timing: timing.trim().to_string(),
                });
                return ActionEffect::Added { id };
            }
            DraftAction::RemoveMedicine { id } => {
                return ActionEffect::Removed { found: self.medicines.remove(&id) };
            }
            DraftAction::AddInvestigation { name } => {
                let id = self.ids.next();
                self.investigations.add(Investigation {
                    id: id.clone(),
                    name: name.trim().to_string(),
                });
                return ActionEffect::Added { id };
            }
            DraftAction::RemoveInvestigation { id } => {
                return ActionEffect::Removed { found: self.investigations.remove(&id) };
            }
            DraftAction::SetInvestigationNotes { notes } => {
                self.investigation_notes = non_blank(notes);
            }
            DraftAction::SetMedicineInstructions { instructions } => {
                self.medicine_instructions = non_blank(instructions);
            }
            DraftAction::SetChronicCondition { chronic } => self.chronic_condition = chronic,
            DraftAction::SetCriticalLabValues { values } => {
                self.critical_lab_values = non_blank(values);
            }
            DraftAction::SetSeverity { severity } => self.severity = severity,
            DraftAction::SetMedicineReminder { message, call } => {
                self.medicine_reminder = MedicineReminder { message, call };
            }
            DraftAction::SetVitals { vitals } => self.vitals = vitals,
            DraftAction::SetFollowUp { date } => self.follow_up_date = date,
            DraftAction::NextStep => self.step = self.step.next(),
            DraftAction::PreviousStep => self.step = self.step.previous(),
            DraftAction::GoToStep { step } => self.step = step,
            DraftAction::Reset => self.reset(),
        }
        ActionEffect::Updated
    }

    /// Gate for submission: a patient and the three mandatory vitals.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.patient_id.is_none() {
            return Err(ValidationError::MissingPatient);
        }
        let missing = self.vitals.missing_mandatory();
        if !missing.is_empty() {
            return Err(ValidationError::MissingVitals(missing));
        }
        Ok(())
    }

    /// Snapshot of every step as one record. `storage_id` stays unset
    /// until the rendered document has been uploaded.
    pub fn assemble(
        &self,
        prescription_id: &str,
        doctor_id: &str,
        created_at: DateTime<Utc>,
    ) -> PrescriptionRecord {
        PrescriptionRecord {
            prescription_id: prescription_id.to_string(),
            doctor_id: doctor_id.to_string(),
            patient_id: self.patient_id.clone().unwrap_or_default(),
            symptoms: self.symptoms.to_vec(),
            findings: self.findings.to_vec(),
            diagnoses: self.diagnoses.to_vec(),
            medicines: self.medicines.to_vec(),
            investigations: self.investigations.to_vec(),
            investigation_notes: self.investigation_notes.clone(),
            follow_up_date: self.follow_up_date,
            medicine_instructions: self.medicine_instructions.clone(),
            chronic_condition: self.chronic_condition,
            critical_lab_values: self.critical_lab_values.clone(),
            severity: self.severity,
            medicine_reminder: self.medicine_reminder,
            vitals: self.vitals.clone(),
            storage_id: None,
            created_at,
        }
    }

    /// Back to an empty draft on the first step. The id source is kept so
    /// ids stay increasing across resets.
    pub fn reset(&mut self) {
        let ids = std::mem::take(&mut self.ids);
        *self = Self { ids, ..Self::default() };
    }

    /// True when no step holds any data.
    pub fn is_empty(&self) -> bool {
        self.patient_id.is_none()
            && self.symptoms.is_empty()
            && self.findings.is_empty()
            && self.diagnoses.is_empty()
            && self.medicines.is_empty()
            && self.investigations.is_empty()
            && self.investigation_notes.is_none()
            && self.medicine_instructions.is_none()
            && !self.chronic_condition
            && self.critical_lab_values.is_none()
            && self.severity.is_none()
            && self.medicine_reminder == MedicineReminder::default()
            && self.vitals == Vitals::default()
            && self.follow_up_date.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `RX-YYYYMMDD-HHMMSS-XXXX`, the suffix being four random uppercase
/// alphanumerics.
pub fn new_prescription_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("RX-{}-{}", now.format("%Y%m%d-%H%M%S"), suffix)
}
