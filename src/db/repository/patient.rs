use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{NewPatient, Patient};

/// Registers a patient and returns the stored row.
pub fn insert_patient(
    conn: &Connection,
    patient: &NewPatient,
    registered_by: &str,
) -> Result<Patient, DatabaseError> {
    if patient.name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation("patient name is required".into()));
    }
    let id = Uuid::new_v4().to_string();
    let now = Local::now().naive_local().format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute(
        "INSERT INTO patients (id, name, age, gender, phone, address, registered_by, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            patient.name.trim(),
            patient.age,
            patient.gender,
            patient.phone,
            patient.address,
            registered_by,
            now,
        ],
    )?;

    Ok(Patient {
        id,
        name: patient.name.trim().to_string(),
        age: patient.age,
        gender: patient.gender.clone(),
        phone: patient.phone.clone(),
        address: patient.address.clone(),
        registered_by: registered_by.to_string(),
        registered_at: now,
    })
}

pub fn get_patient(conn: &Connection, id: &str) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            "SELECT id, name, age, gender, phone, address, registered_by, registered_at
             FROM patients WHERE id = ?1",
            params![id],
            patient_from_row,
        )
        .optional()?;
    Ok(patient)
}

/// Like `get_patient`, but a missing row is an error.
pub fn require_patient(conn: &Connection, id: &str) -> Result<Patient, DatabaseError> {
    get_patient(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Patient".into(),
        id: id.into(),
    })
}

/// Name or phone substring search, newest registrations first.
/// An empty query lists the most recent registrations.
pub fn search_patients(
    conn: &Connection,
    query: &str,
    limit: u32,
) -> Result<Vec<Patient>, DatabaseError> {
    let pattern = format!("%{}%", query.trim());
    let mut stmt = conn.prepare(
        "SELECT id, name, age, gender, phone, address, registered_by, registered_at
         FROM patients
         WHERE LOWER(name) LIKE LOWER(?1) OR phone LIKE ?1
         ORDER BY registered_at DESC, name ASC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![pattern, limit], patient_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        registered_by: row.get(6)?,
        registered_at: row.get(7)?,
    })
}
