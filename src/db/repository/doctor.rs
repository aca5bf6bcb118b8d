use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::DoctorProfile;

/// Inserts or replaces the operator's display profile.
pub fn upsert_doctor_profile(conn: &Connection, profile: &DoctorProfile) -> Result<(), DatabaseError> {
    if profile.name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "Doctor name cannot be empty".into(),
        ));
    }

    conn.execute(
        "INSERT INTO doctor_profiles (doctor_id, name, specialty, license_number, clinic_name,
         clinic_address, clinic_phone, clinic_email, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(doctor_id) DO UPDATE SET
            name = excluded.name,
            specialty = excluded.specialty,
            license_number = excluded.license_number,
            clinic_name = excluded.clinic_name,
            clinic_address = excluded.clinic_address,
            clinic_phone = excluded.clinic_phone,
            clinic_email = excluded.clinic_email,
            updated_at = excluded.updated_at",
        params![
            profile.doctor_id,
            profile.name.trim(),
            profile.specialty,
            profile.license_number,
            profile.clinic_name,
            profile.clinic_address,
            profile.clinic_phone,
            profile.clinic_email,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_doctor_profile(
    conn: &Connection,
    doctor_id: &str,
) -> Result<Option<DoctorProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            "SELECT doctor_id, name, specialty, license_number, clinic_name,
                    clinic_address, clinic_phone, clinic_email
             FROM doctor_profiles WHERE doctor_id = ?1",
            params![doctor_id],
            |row| {
                Ok(DoctorProfile {
                    doctor_id: row.get(0)?,
                    name: row.get(1)?,
                    specialty: row.get(2)?,
                    license_number: row.get(3)?,
                    clinic_name: row.get(4)?,
                    clinic_address: row.get(5)?,
                    clinic_phone: row.get(6)?,
                    clinic_email: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn profile(name: &str) -> DoctorProfile {
        DoctorProfile {
            doctor_id: "doc-1".into(),
            name: name.into(),
            specialty: Some("General Physician".into()),
            license_number: Some("KMC-12345".into()),
            clinic_name: Some("Sunrise Clinic".into()),
            clinic_address: None,
            clinic_phone: None,
            clinic_email: None,
        }
    }

    #[test]
    fn upsert_then_get() {
        let conn = open_memory_database().unwrap();
        upsert_doctor_profile(&conn, &profile("Anil Mehta")).unwrap();
        let stored = get_doctor_profile(&conn, "doc-1").unwrap().unwrap();
        assert_eq!(stored.name, "Anil Mehta");
        assert_eq!(stored.license_number.as_deref(), Some("KMC-12345"));
    }

    #[test]
    fn upsert_replaces_existing() {
        let conn = open_memory_database().unwrap();
        upsert_doctor_profile(&conn, &profile("Anil Mehta")).unwrap();
        let mut updated = profile("Anil K. Mehta");
        updated.clinic_name = None;
        upsert_doctor_profile(&conn, &updated).unwrap();

        let stored = get_doctor_profile(&conn, "doc-1").unwrap().unwrap();
        assert_eq!(stored.name, "Anil K. Mehta");
        assert!(stored.clinic_name.is_none());
    }

    #[test]
    fn empty_name_rejected() {
        let conn = open_memory_database().unwrap();
        let err = upsert_doctor_profile(&conn, &profile("  ")).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn missing_profile_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_doctor_profile(&conn, "nobody").unwrap().is_none());
    }
}
