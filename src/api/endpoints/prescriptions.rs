//! Prescription history endpoints. Records are read-only once written.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OperatorContext};
use crate::core_state::CoreState;
use crate::db;
use crate::models::{PrescriptionRecord, PrescriptionSummary};
use crate::preview::PrescriptionPreview;
use crate::storage::StorageId;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub patient_id: Option<String>,
}

/// `GET /api/prescriptions?patient_id=`
///
/// A patient's history when `patient_id` is given, otherwise everything the
/// operator has written.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PrescriptionSummary>>, ApiError> {
    let summaries = ctx
        .blocking(move |core| {
            let conn = core.open_db()?;
            let summaries = match query.patient_id.as_deref().filter(|p| !p.trim().is_empty()) {
                Some(patient_id) => db::list_prescriptions_for_patient(&conn, patient_id)?,
                None => db::list_prescriptions_for_doctor(&conn, &operator.operator_id)?,
            };
            Ok(summaries)
        })
        .await?;
    Ok(Json(summaries))
}

/// `GET /api/prescriptions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<PrescriptionRecord>, ApiError> {
    let record = ctx.blocking(move |core| load_record(core, &id)).await?;
    Ok(Json(record))
}

/// `GET /api/prescriptions/:id/preview`
pub async fn preview(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<PrescriptionPreview>, ApiError> {
    let preview = ctx
        .blocking(move |core| {
            let record = load_record(core, &id)?;
            let conn = core.open_db()?;
            let patient = db::get_patient(&conn, &record.patient_id)?;
            Ok(PrescriptionPreview::build(&record, patient.as_ref()))
        })
        .await?;
    Ok(Json(preview))
}

/// `GET /api/prescriptions/:id/document`: the stored PDF.
pub async fn document(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (prescription_id, bytes) = ctx
        .blocking(move |core| {
            let record = load_record(core, &id)?;
            let storage_id = record.storage_id.clone().ok_or_else(|| {
                ApiError::Internal(format!("prescription {id} has no stored document"))
            })?;
            let bytes = core.store.fetch(&StorageId(storage_id))?;
            Ok((record.prescription_id, bytes))
        })
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{prescription_id}.pdf\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

fn load_record(core: &CoreState, id: &str) -> Result<PrescriptionRecord, ApiError> {
    let conn = core.open_db()?;
    db::get_prescription(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("Prescription not found: {id}")))
}
