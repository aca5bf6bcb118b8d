use serde::{Deserialize, Serialize};

/// Operator display profile used for document letterheads.
///
/// Every field except the name is optional; the renderer substitutes
/// defaults for whatever is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub doctor_id: String,
    pub name: String,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_address: Option<String>,
    pub clinic_phone: Option<String>,
    pub clinic_email: Option<String>,
}

/// Profile update body. The doctor id comes from the operator context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfileUpdate {
    pub name: String,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_address: Option<String>,
    pub clinic_phone: Option<String>,
    pub clinic_email: Option<String>,
}

impl DoctorProfileUpdate {
    pub fn into_profile(self, doctor_id: &str) -> DoctorProfile {
        DoctorProfile {
            doctor_id: doctor_id.to_string(),
            name: self.name,
            specialty: self.specialty,
            license_number: self.license_number,
            clinic_name: self.clinic_name,
            clinic_address: self.clinic_address,
            clinic_phone: self.clinic_phone,
            clinic_email: self.clinic_email,
        }
    }
}
