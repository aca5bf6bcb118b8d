use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{PrescriptionRecord, PrescriptionSummary};

/// Persists a finished prescription. Records are write-once: there is no
/// update or delete counterpart.
pub fn insert_prescription(
    conn: &Connection,
    record: &PrescriptionRecord,
) -> Result<(), DatabaseError> {
    let storage_id = record
        .storage_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            DatabaseError::ConstraintViolation(format!(
                "Prescription {} has no stored document",
                record.prescription_id
            ))
        })?;

    let body = serde_json::to_string(record)
        .map_err(|e| DatabaseError::Corrupt(format!("Cannot encode prescription: {e}")))?;

    conn.execute(
        "INSERT INTO prescriptions (prescription_id, doctor_id, patient_id, storage_id,
         severity, chronic_condition, follow_up_date, created_at, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.prescription_id,
            record.doctor_id,
            record.patient_id,
            storage_id,
            record.severity.map(|s| s.as_str()),
            record.chronic_condition as i32,
            record.follow_up_date.map(|d| d.to_string()),
            record.created_at.to_rfc3339(),
            body,
        ],
    )?;
    Ok(())
}

pub fn get_prescription(
    conn: &Connection,
    prescription_id: &str,
) -> Result<Option<PrescriptionRecord>, DatabaseError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM prescriptions WHERE prescription_id = ?1",
            params![prescription_id],
            |row| row.get(0),
        )
        .optional()?;

    body.map(|b| decode_record(&b)).transpose()
}

/// Prescriptions for a patient, newest first.
pub fn list_prescriptions_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<PrescriptionSummary>, DatabaseError> {
    list_where(conn, "patient_id", patient_id)
}

/// Prescriptions written by one doctor, newest first.
pub fn list_prescriptions_for_doctor(
    conn: &Connection,
    doctor_id: &str,
) -> Result<Vec<PrescriptionSummary>, DatabaseError> {
    list_where(conn, "doctor_id", doctor_id)
}

fn list_where(
    conn: &Connection,
    column: &'static str,
    value: &str,
) -> Result<Vec<PrescriptionSummary>, DatabaseError> {
    let sql = format!(
        "SELECT body FROM prescriptions WHERE {column} = ?1
         ORDER BY created_at DESC, prescription_id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let bodies = stmt
        .query_map(params![value], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    bodies
        .iter()
        .map(|b| decode_record(b).map(|r| PrescriptionSummary::from(&r)))
        .collect()
}

fn decode_record(body: &str) -> Result<PrescriptionRecord, DatabaseError> {
    serde_json::from_str(body)
        .map_err(|e| DatabaseError::Corrupt(format!("Cannot decode prescription: {e}")))
}
