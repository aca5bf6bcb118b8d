//! Patient registration and lookup endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OperatorContext};
use crate::db;
use crate::models::{NewPatient, Patient};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

/// `POST /api/patients`
pub async fn register(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
    Json(body): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = ctx
        .blocking(move |core| {
            let conn = core.open_db()?;
            let patient = db::insert_patient(&conn, &body, &operator.operator_id)?;
            tracing::info!(patient_id = %patient.id, registered_by = %operator.operator_id, "Patient registered");
            Ok(patient)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /api/patients?q=&limit=`
pub async fn search(
    State(ctx): State<ApiContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let patients = ctx
        .blocking(move |core| {
            let conn = core.open_db()?;
            Ok(db::search_patients(&conn, &query.q, limit)?)
        })
        .await?;
    Ok(Json(patients))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let patient = ctx
        .blocking(move |core| {
            let conn = core.open_db()?;
            Ok(db::require_patient(&conn, &id)?)
        })
        .await?;
    Ok(Json(patient))
}
