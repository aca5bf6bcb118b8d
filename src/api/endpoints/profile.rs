//! Doctor profile endpoints. The profile feeds the prescription letterhead.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OperatorContext};
use crate::db;
use crate::models::{DoctorProfile, DoctorProfileUpdate};
use crate::render::Letterhead;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile: Option<DoctorProfile>,
    /// Footer line printed on every page with the current profile.
    pub footer: String,
}

impl ProfileResponse {
    fn from_profile(profile: Option<DoctorProfile>) -> Self {
        let footer = Letterhead::from_profile(profile.as_ref()).footer_line();
        Self { profile, footer }
    }
}

/// `GET /api/profile`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = ctx
        .blocking(move |core| Ok(core.doctor_profile(&operator.operator_id)?))
        .await?;
    Ok(Json(ProfileResponse::from_profile(profile)))
}

/// `PUT /api/profile`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
    Json(body): Json<DoctorProfileUpdate>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = ctx
        .blocking(move |core| {
            let profile = body.into_profile(&operator.operator_id);
            let conn = core.open_db()?;
            db::upsert_doctor_profile(&conn, &profile)?;
            core.invalidate_profile(&operator.operator_id)?;
            tracing::info!(doctor_id = %profile.doctor_id, "Doctor profile updated");
            Ok(profile)
        })
        .await?;
    Ok(Json(ProfileResponse::from_profile(Some(profile))))
}
