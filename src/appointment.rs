//! Appointment desk: booking, the doctor's schedule, and status changes.
//!
//! Appointments reference a registered patient and belong to the doctor
//! (operator) they were booked for. Times are clinic-local wall clock.

use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::AppointmentStatus;

const SCHEDULE_FORMAT: &str = "%Y-%m-%d %H:%M";

// ─── Types ────────────────────────────────────────────────────────────────────

/// Booking request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: String,
    pub scheduled_for: NaiveDateTime,
    pub reason: Option<String>,
}

/// A booked appointment with the patient's name for schedule views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub doctor_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub scheduled_for: NaiveDateTime,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: String,
}

// ─── Repository functions ─────────────────────────────────────────────────────

/// Books an appointment in `Scheduled` state. The patient must exist.
pub fn book_appointment(
    conn: &Connection,
    doctor_id: &str,
    request: &NewAppointment,
) -> Result<Appointment, DatabaseError> {
    let patient_name: Option<String> = conn
        .query_row(
            "SELECT name FROM patients WHERE id = ?1",
            params![request.patient_id],
            |row| row.get(0),
        )
        .optional()?;
    let patient_name = patient_name.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Patient".into(),
        id: request.patient_id.clone(),
    })?;

    let id = Uuid::new_v4().to_string();
    let created_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let reason = request
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from);

    conn.execute(
        "INSERT INTO appointments (id, doctor_id, patient_id, scheduled_for, reason, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            doctor_id,
            request.patient_id,
            request.scheduled_for.format(SCHEDULE_FORMAT).to_string(),
            reason,
            AppointmentStatus::Scheduled.as_str(),
            created_at,
        ],
    )?;

    Ok(Appointment {
        id,
        doctor_id: doctor_id.to_string(),
        patient_id: request.patient_id.clone(),
        patient_name,
        scheduled_for: request.scheduled_for,
        reason,
        status: AppointmentStatus::Scheduled,
        created_at,
    })
}

/// The doctor's schedule, earliest first. `status` narrows the list.
pub fn list_appointments_for_doctor(
    conn: &Connection,
    doctor_id: &str,
    status: Option<AppointmentStatus>,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.doctor_id, a.patient_id, p.name, a.scheduled_for,
                a.reason, a.status, a.created_at
         FROM appointments a
         JOIN patients p ON a.patient_id = p.id
         WHERE a.doctor_id = ?1 AND (?2 IS NULL OR a.status = ?2)
         ORDER BY a.scheduled_for ASC, a.created_at ASC",
    )?;

    let rows = stmt.query_map(params![doctor_id, status.map(|s| s.as_str())], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut appointments = Vec::new();
    for row in rows {
        let (id, doctor_id, patient_id, patient_name, scheduled, reason, status, created_at) = row?;
        appointments.push(Appointment {
            scheduled_for: parse_schedule(&id, &scheduled)?,
            status: AppointmentStatus::from_str(&status)?,
            id,
            doctor_id,
            patient_id,
            patient_name,
            reason,
            created_at,
        });
    }
    Ok(appointments)
}

/// Moves an appointment to `status`. Only the owning doctor can change it.
pub fn update_appointment_status(
    conn: &Connection,
    doctor_id: &str,
    appointment_id: &str,
    status: AppointmentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2 AND doctor_id = ?3",
        params![status.as_str(), appointment_id, doctor_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: appointment_id.into(),
        });
    }
    tracing::info!(appointment_id, status = status.as_str(), "Appointment status updated");
    Ok(())
}

fn parse_schedule(id: &str, raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, SCHEDULE_FORMAT)
        .map_err(|e| DatabaseError::Corrupt(format!("appointment {id} scheduled_for {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::insert_patient;
    use crate::models::NewPatient;
    use chrono::NaiveDate;

    fn setup() -> (Connection, String) {
        let conn = open_memory_database().unwrap();
        let patient = insert_patient(
            &conn,
            &NewPatient {
                name: "Ravi Kumar".into(),
                age: Some(52),
                gender: Some("M".into()),
                phone: None,
                address: None,
            },
            "doc-1",
        )
        .unwrap();
        (conn, patient.id)
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
    }

    fn book(conn: &Connection, doctor: &str, patient_id: &str, when: NaiveDateTime) -> Appointment {
        book_appointment(
            conn,
            doctor,
            &NewAppointment {
                patient_id: patient_id.into(),
                scheduled_for: when,
                reason: Some("  Review BP  ".into()),
            },
        )
        .unwrap()
    }

    #[test]
    fn booking_starts_scheduled() {
        let (conn, patient_id) = setup();
        let appt = book(&conn, "doc-1", &patient_id, at(10, 9));
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.patient_name, "Ravi Kumar");
        assert_eq!(appt.reason.as_deref(), Some("Review BP"));
    }

    #[test]
    fn booking_unknown_patient_is_not_found() {
        let (conn, _) = setup();
        let err = book_appointment(
            &conn,
            "doc-1",
            &NewAppointment {
                patient_id: "nobody".into(),
                scheduled_for: at(10, 9),
                reason: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { ref entity_type, .. } if entity_type == "Patient"));
    }

    #[test]
    fn schedule_is_per_doctor_and_chronological() {
        let (conn, patient_id) = setup();
        book(&conn, "doc-1", &patient_id, at(12, 9));
        book(&conn, "doc-1", &patient_id, at(10, 15));
        book(&conn, "doc-2", &patient_id, at(11, 9));

        let schedule = list_appointments_for_doctor(&conn, "doc-1", None).unwrap();
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule[0].scheduled_for, at(10, 15));
        assert_eq!(schedule[1].scheduled_for, at(12, 9));
    }

    #[test]
    fn status_update_and_filter() {
        let (conn, patient_id) = setup();
        let first = book(&conn, "doc-1", &patient_id, at(10, 9));
        book(&conn, "doc-1", &patient_id, at(11, 9));

        update_appointment_status(&conn, "doc-1", &first.id, AppointmentStatus::Completed).unwrap();

        let done =
            list_appointments_for_doctor(&conn, "doc-1", Some(AppointmentStatus::Completed)).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, first.id);
        let open =
            list_appointments_for_doctor(&conn, "doc-1", Some(AppointmentStatus::Scheduled)).unwrap();
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn other_doctor_cannot_change_status() {
        let (conn, patient_id) = setup();
        let appt = book(&conn, "doc-1", &patient_id, at(10, 9));
        let err = update_appointment_status(&conn, "doc-2", &appt.id, AppointmentStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
