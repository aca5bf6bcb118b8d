//! Prescription submission.
//!
//! A strictly sequential chain, each step attempted once:
//! validate → patient lookup → assemble → render → upload → record write →
//! draft reset → optional delivery. The first failure stops the chain and
//! leaves the draft intact. A record write that fails after a successful
//! upload deletes the uploaded document again. Delivery is best effort and
//! never undoes persistence. It runs after the draft is reset, so a slow
//! relay does not hold the draft.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::delivery::{normalize_phone, MessageRelay};
use crate::models::{Patient, PrescriptionRecord};
use crate::render::{self, Letterhead, RenderError};
use crate::storage::{ObjectStore, StorageError, StorageId};
use crate::wizard::{new_prescription_id, PrescriptionDraft, ValidationError};

/// How long the success notice stays visible.
pub const SUCCESS_NOTICE_SECS: i64 = 3;

const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Prescription is incomplete: {0}")]
    Validation(#[from] ValidationError),

    #[error("Patient lookup failed: {0}")]
    PatientLookup(#[source] DatabaseError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Document upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Saving the prescription failed: {0}")]
    RecordWrite(#[source] DatabaseError),
}

/// Collaborators for one submission.
pub struct SubmitContext<'a> {
    pub conn: &'a Connection,
    pub store: &'a dyn ObjectStore,
    pub relay: Option<&'a dyn MessageRelay>,
    pub letterhead: &'a Letterhead,
    pub doctor_id: &'a str,
    pub default_country_code: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent { message_id: Option<String> },
    Failed { reason: String },
    Skipped { reason: String },
}

/// Transient confirmation shown after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessNotice {
    pub message: String,
    pub shown_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SuccessNotice {
    pub fn new(message: &str, shown_at: DateTime<Utc>) -> Self {
        Self {
            message: message.to_string(),
            shown_at,
            expires_at: shown_at + Duration::seconds(SUCCESS_NOTICE_SECS),
        }
    }

    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        now >= self.shown_at && now < self.expires_at
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub record: PrescriptionRecord,
    pub delivery: DeliveryStatus,
    pub notice: SuccessNotice,
}

/// A prescription that is stored and recorded, with the draft already
/// cleared. Delivery needs nothing from the draft, so callers can release
/// the draft before sending.
pub struct SavedPrescription {
    pub record: PrescriptionRecord,
    pub patient: Patient,
    pub pdf: Vec<u8>,
    pub saved_at: DateTime<Utc>,
}

/// Run the whole chain, delivery included.
pub fn submit_prescription(
    ctx: &SubmitContext<'_>,
    draft: &mut PrescriptionDraft,
    deliver: bool,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, SubmitError> {
    let saved = save_prescription(ctx, draft, now)?;
    Ok(deliver_saved(ctx, saved, deliver))
}

/// Validate, render, upload and record the draft, then reset it. Every
/// step that touches the draft happens here.
pub fn save_prescription(
    ctx: &SubmitContext<'_>,
    draft: &mut PrescriptionDraft,
    now: DateTime<Utc>,
) -> Result<SavedPrescription, SubmitError> {
    draft.validate()?;

    let patient_id = draft.patient_id.clone().unwrap_or_default();
    let patient =
        db::require_patient(ctx.conn, &patient_id).map_err(SubmitError::PatientLookup)?;

    let mut record = draft.assemble(&new_prescription_id(now), ctx.doctor_id, now);
    let pdf = render::render_prescription_pdf(&record, Some(&patient), ctx.letterhead)?;

    let storage_id = upload(ctx.store, &pdf).map_err(|e| {
        tracing::error!(prescription_id = %record.prescription_id, error = %e, "Upload failed");
        e
    })?;
    record.storage_id = Some(storage_id.0.clone());

    if let Err(e) = db::insert_prescription(ctx.conn, &record) {
        tracing::error!(
            prescription_id = %record.prescription_id,
            error = %e,
            "Record write failed, removing uploaded document"
        );
        if let Err(cleanup) = ctx.store.delete(&storage_id) {
            tracing::error!(
                storage_id = %storage_id,
                error = %cleanup,
                "Cleanup failed, document is orphaned"
            );
        }
        return Err(SubmitError::RecordWrite(e));
    }

    draft.reset();
    tracing::info!(
        prescription_id = %record.prescription_id,
        patient_id = %record.patient_id,
        storage_id = %storage_id,
        "Prescription saved"
    );

    Ok(SavedPrescription {
        record,
        patient,
        pdf,
        saved_at: now,
    })
}

/// Optional delivery of a saved prescription. Never fails.
pub fn deliver_saved(
    ctx: &SubmitContext<'_>,
    saved: SavedPrescription,
    deliver: bool,
) -> SubmitOutcome {
    let delivery = if deliver {
        deliver_document(ctx, &saved.record, &saved.patient, &saved.pdf)
    } else {
        DeliveryStatus::Skipped { reason: "Delivery not requested".into() }
    };

    SubmitOutcome {
        record: saved.record,
        delivery,
        notice: SuccessNotice::new("Prescription saved", saved.saved_at),
    }
}

fn upload(store: &dyn ObjectStore, bytes: &[u8]) -> Result<StorageId, StorageError> {
    let url = store.create_upload_url()?;
    store.upload(&url, bytes, PDF_CONTENT_TYPE)
}

fn deliver_document(
    ctx: &SubmitContext<'_>,
    record: &PrescriptionRecord,
    patient: &Patient,
    pdf: &[u8],
) -> DeliveryStatus {
    let Some(relay) = ctx.relay else {
        return DeliveryStatus::Skipped { reason: "Messaging relay not configured".into() };
    };
    let Some(raw_phone) = patient.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
        return DeliveryStatus::Skipped { reason: "Patient has no phone number".into() };
    };

    let result = normalize_phone(raw_phone, ctx.default_country_code).and_then(|phone| {
        let filename = format!("{}.pdf", record.prescription_id);
        let caption = format!(
            "Prescription from {} dated {}",
            ctx.letterhead.doctor_display(),
            record.created_at.format("%d %b %Y")
        );
        relay.send_document(&phone, &filename, pdf, &caption)
    });

    match result {
        Ok(receipt) => {
            tracing::info!(prescription_id = %record.prescription_id, "Prescription delivered");
            DeliveryStatus::Sent { message_id: receipt.message_id }
        }
        Err(e) => {
            tracing::warn!(
                prescription_id = %record.prescription_id,
                error = %e,
                "Delivery failed, prescription remains saved"
            );
            DeliveryStatus::Failed { reason: e.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::delivery::MockRelay;
    use crate::models::{NewPatient, Vitals};
    use crate::storage::MockObjectStore;
    use crate::wizard::DraftAction;
    use chrono::TimeZone;

    fn setup(phone: Option<&str>) -> (Connection, String) {
        let conn = open_memory_database().unwrap();
        let patient = db::insert_patient(
            &conn,
            &NewPatient {
                name: "Asha Rao".into(),
                age: Some(34),
                gender: Some("F".into()),
                phone: phone.map(String::from),
                address: None,
            },
            "doc-1",
        )
        .unwrap();
        (conn, patient.id)
    }

    fn cough_paracetamol(patient_id: &str) -> PrescriptionDraft {
        let mut draft = PrescriptionDraft::new();
        draft.apply(DraftAction::SetPatient { patient_id: patient_id.into() });
        draft.apply(DraftAction::AddSymptom {
            name: "Cough".into(),
            frequency: "1/day".into(),
            severity: "Mild".into(),
            duration: "2 days".into(),
        });
        draft.apply(DraftAction::AddMedicine {
            name: "Paracetamol".into(),
            dosage: "500mg".into(),
            route: "Oral".into(),
            times_per_day: "3".into(),
            duration_days: "5".into(),
            timing: "After Food".into(),
        });
        draft.apply(DraftAction::SetVitals {
            vitals: Vitals {
                temperature: "98.6F".into(),
                blood_pressure: "120/80".into(),
                pulse: "72".into(),
                ..Default::default()
            },
        });
        draft
    }

    fn ctx<'a>(
        conn: &'a Connection,
        store: &'a MockObjectStore,
        relay: Option<&'a dyn MessageRelay>,
        letterhead: &'a Letterhead,
    ) -> SubmitContext<'a> {
        SubmitContext {
            conn,
            store,
            relay,
            letterhead,
            doctor_id: "doc-1",
            default_country_code: "91",
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 10, 15, 0).unwrap()
    }

    #[test]
    fn cough_paracetamol_end_to_end() {
        let (conn, patient_id) = setup(None);
        let store = MockObjectStore::new();
        let letterhead = Letterhead::default();
        let mut draft = cough_paracetamol(&patient_id);

        let outcome =
            submit_prescription(&ctx(&conn, &store, None, &letterhead), &mut draft, false, now())
                .unwrap();

        assert_eq!(outcome.record.storage_id.as_deref(), Some("mock-1"));
        assert_eq!(outcome.record.symptoms[0].name, "Cough");
        assert_eq!(outcome.record.medicines[0].name, "Paracetamol");
        assert!(outcome.record.prescription_id.starts_with("RX-20260402-101500-"));
        assert!(draft.is_empty());

        assert!(outcome.notice.is_visible(now()));
        assert!(outcome.notice.is_visible(now() + Duration::milliseconds(2999)));
        assert!(!outcome.notice.is_visible(now() + Duration::seconds(SUCCESS_NOTICE_SECS)));

        let stored = db::get_prescription(&conn, &outcome.record.prescription_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored, outcome.record);
        assert_eq!(store.calls(), vec!["create_upload_url", "upload"]);
        assert_eq!(
            outcome.delivery,
            DeliveryStatus::Skipped { reason: "Delivery not requested".into() }
        );
    }

    #[test]
    fn missing_vitals_block_before_any_collaborator() {
        let (conn, patient_id) = setup(Some("9876543210"));
        let store = MockObjectStore::new();
        let relay = MockRelay::new();
        let letterhead = Letterhead::default();

        for field in ["temperature", "blood_pressure", "pulse"] {
            let mut draft = cough_paracetamol(&patient_id);
            let mut vitals = draft.vitals.clone();
            match field {
                "temperature" => vitals.temperature.clear(),
                "blood_pressure" => vitals.blood_pressure.clear(),
                _ => vitals.pulse.clear(),
            }
            draft.apply(DraftAction::SetVitals { vitals });

            let err = submit_prescription(
                &ctx(&conn, &store, Some(&relay), &letterhead),
                &mut draft,
                true,
                now(),
            )
            .unwrap_err();
            assert!(matches!(err, SubmitError::Validation(_)), "{field}");
            assert!(!draft.is_empty());
        }
        assert!(store.calls().is_empty());
        assert!(relay.sent().is_empty());
        assert!(db::list_prescriptions_for_doctor(&conn, "doc-1").unwrap().is_empty());
    }

    #[test]
    fn unknown_patient_fails_lookup() {
        let (conn, _) = setup(None);
        let store = MockObjectStore::new();
        let letterhead = Letterhead::default();
        let mut draft = cough_paracetamol("ghost");

        let err = submit_prescription(&ctx(&conn, &store, None, &letterhead), &mut draft, false, now())
            .unwrap_err();
        assert!(matches!(err, SubmitError::PatientLookup(DatabaseError::NotFound { .. })));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn upload_failure_keeps_draft_and_writes_nothing() {
        let (conn, patient_id) = setup(None);
        let store = MockObjectStore::new().with_upload_failure();
        let letterhead = Letterhead::default();
        let mut draft = cough_paracetamol(&patient_id);

        let err = submit_prescription(&ctx(&conn, &store, None, &letterhead), &mut draft, false, now())
            .unwrap_err();
        assert!(matches!(err, SubmitError::Upload(StorageError::Status { status: 503, .. })));
        assert_eq!(draft.symptoms.len(), 1);
        assert!(db::list_prescriptions_for_patient(&conn, &patient_id).unwrap().is_empty());
    }

    #[test]
    fn record_write_failure_removes_upload() {
        let (conn, patient_id) = setup(None);
        conn.execute_batch("DROP TABLE prescriptions").unwrap();
        let store = MockObjectStore::new();
        let letterhead = Letterhead::default();
        let mut draft = cough_paracetamol(&patient_id);

        let err = submit_prescription(&ctx(&conn, &store, None, &letterhead), &mut draft, false, now())
            .unwrap_err();
        assert!(matches!(err, SubmitError::RecordWrite(_)));
        assert_eq!(store.calls(), vec!["create_upload_url", "upload", "delete"]);
        assert_eq!(store.object_count(), 0);
        assert_eq!(draft.medicines.len(), 1);
    }

    #[test]
    fn failed_cleanup_still_reports_record_write() {
        let (conn, patient_id) = setup(None);
        conn.execute_batch("DROP TABLE prescriptions").unwrap();
        let store = MockObjectStore::new().with_delete_failure();
        let letterhead = Letterhead::default();
        let mut draft = cough_paracetamol(&patient_id);

        let err = submit_prescription(&ctx(&conn, &store, None, &letterhead), &mut draft, false, now())
            .unwrap_err();
        assert!(matches!(err, SubmitError::RecordWrite(_)));
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn delivery_sends_to_normalized_phone() {
        let (conn, patient_id) = setup(Some("98765 43210"));
        let store = MockObjectStore::new();
        let relay = MockRelay::new();
        let letterhead = Letterhead::default();
        let mut draft = cough_paracetamol(&patient_id);

        let outcome = submit_prescription(
            &ctx(&conn, &store, Some(&relay), &letterhead),
            &mut draft,
            true,
            now(),
        )
        .unwrap();

        assert_eq!(outcome.delivery, DeliveryStatus::Sent { message_id: Some("wamid-1".into()) });
        let sent = relay.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "919876543210");
        assert_eq!(sent[0].1, format!("{}.pdf", outcome.record.prescription_id));
    }

    #[test]
    fn delivery_failure_does_not_undo_persistence() {
        let (conn, patient_id) = setup(Some("9876543210"));
        let store = MockObjectStore::new();
        let relay = MockRelay::failing();
        let letterhead = Letterhead::default();
        let mut draft = cough_paracetamol(&patient_id);

        let outcome = submit_prescription(
            &ctx(&conn, &store, Some(&relay), &letterhead),
            &mut draft,
            true,
            now(),
        )
        .unwrap();

        assert!(matches!(outcome.delivery, DeliveryStatus::Failed { .. }));
        assert!(draft.is_empty());
        assert!(db::get_prescription(&conn, &outcome.record.prescription_id)
            .unwrap()
            .is_some());
        assert!(!store.calls().contains(&"delete".to_string()));
    }

    #[test]
    fn save_resets_draft_before_delivery() {
        let (conn, patient_id) = setup(Some("98765 43210"));
        let store = MockObjectStore::new();
        let relay = MockRelay::new();
        let letterhead = Letterhead::default();
        let submit_ctx = ctx(&conn, &store, Some(&relay), &letterhead);
        let mut draft = cough_paracetamol(&patient_id);

        let saved = save_prescription(&submit_ctx, &mut draft, now()).unwrap();
        assert!(draft.is_empty());
        assert!(relay.sent().is_empty());
        assert!(saved.pdf.starts_with(b"%PDF"));

        let outcome = deliver_saved(&submit_ctx, saved, true);
        assert_eq!(outcome.delivery, DeliveryStatus::Sent { message_id: Some("wamid-1".into()) });
        assert_eq!(relay.sent().len(), 1);
        assert_eq!(outcome.notice.shown_at, now());
    }

    #[test]
    fn delivery_skipped_without_relay_or_phone() {
        let letterhead = Letterhead::default();

        let (conn, patient_id) = setup(Some("9876543210"));
        let store = MockObjectStore::new();
        let mut draft = cough_paracetamol(&patient_id);
        let outcome =
            submit_prescription(&ctx(&conn, &store, None, &letterhead), &mut draft, true, now())
                .unwrap();
        assert!(matches!(outcome.delivery, DeliveryStatus::Skipped { .. }));

        let (conn, patient_id) = setup(None);
        let relay = MockRelay::new();
        let mut draft = cough_paracetamol(&patient_id);
        let outcome = submit_prescription(
            &ctx(&conn, &store, Some(&relay), &letterhead),
            &mut draft,
            true,
            now(),
        )
        .unwrap();
        assert_eq!(
            outcome.delivery,
            DeliveryStatus::Skipped { reason: "Patient has no phone number".into() }
        );
        assert!(relay.sent().is_empty());
    }
}
