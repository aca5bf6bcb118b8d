//! Prescription wizard endpoints.
//!
//! Each operator has one draft held in memory. Clients drive it with
//! `DraftAction`s, preview it, and finally submit it.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OperatorContext};
use crate::db;
use crate::preview::PrescriptionPreview;
use crate::submit::{deliver_saved, save_prescription, SubmitContext, SubmitOutcome};
use crate::wizard::{ActionEffect, DraftAction, PrescriptionDraft};

/// Placeholder id shown on draft previews.
const DRAFT_PREVIEW_ID: &str = "DRAFT";

#[derive(Serialize)]
pub struct DraftView {
    pub draft: PrescriptionDraft,
    /// Whether the draft would pass submission validation.
    pub ready: bool,
    pub blocking_issue: Option<String>,
}

impl DraftView {
    fn of(draft: &PrescriptionDraft) -> Self {
        let issue = draft.validate().err().map(|e| e.to_string());
        Self {
            draft: draft.clone(),
            ready: issue.is_none(),
            blocking_issue: issue,
        }
    }
}

#[derive(Serialize)]
pub struct ActionResponse {
    pub effect: ActionEffect,
    #[serde(flatten)]
    pub view: DraftView,
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub deliver: bool,
}

/// `GET /api/draft`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
) -> Result<Json<DraftView>, ApiError> {
    let view = ctx
        .blocking(move |core| {
            Ok(core.with_draft(&operator.operator_id, |draft| DraftView::of(draft))?)
        })
        .await?;
    Ok(Json(view))
}

/// `DELETE /api/draft`
pub async fn discard(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
) -> Result<Json<DraftView>, ApiError> {
    let operator_id = operator.operator_id.clone();
    let view = ctx
        .blocking(move |core| {
            Ok(core.with_draft(&operator_id, |draft| {
                draft.reset();
                DraftView::of(draft)
            })?)
        })
        .await?;
    tracing::info!(operator = %operator.operator_id, "Draft discarded");
    Ok(Json(view))
}

/// `POST /api/draft/actions`
pub async fn apply(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
    Json(action): Json<DraftAction>,
) -> Result<Json<ActionResponse>, ApiError> {
    let response = ctx
        .blocking(move |core| {
            Ok(core.with_draft(&operator.operator_id, |draft| {
                let effect = draft.apply(action);
                ActionResponse {
                    effect,
                    view: DraftView::of(draft),
                }
            })?)
        })
        .await?;
    Ok(Json(response))
}

/// `GET /api/draft/preview`
pub async fn preview(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
) -> Result<Json<PrescriptionPreview>, ApiError> {
    let preview = ctx
        .blocking(move |core| {
            let record = core.with_draft(&operator.operator_id, |draft| {
                draft.assemble(DRAFT_PREVIEW_ID, &operator.operator_id, Utc::now())
            })?;
            let conn = core.open_db()?;
            let patient = db::get_patient(&conn, &record.patient_id)?;
            Ok(PrescriptionPreview::build(&record, patient.as_ref()))
        })
        .await?;
    Ok(Json(preview))
}

/// `POST /api/draft/submit`
pub async fn submit(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitOutcome>, ApiError> {
    let outcome = ctx
        .blocking(move |core| {
            let conn = core.open_db()?;
            let letterhead = core.letterhead_for(&operator.operator_id)?;
            let submit_ctx = SubmitContext {
                conn: &conn,
                store: core.store.as_ref(),
                relay: core.relay.as_deref(),
                letterhead: &letterhead,
                doctor_id: &operator.operator_id,
                default_country_code: &core.settings.default_country_code,
            };
            // The draft lock covers only the saving steps; delivery runs
            // after it is released.
            let saved = core.with_draft(&operator.operator_id, |draft| {
                save_prescription(&submit_ctx, draft, Utc::now())
            })??;
            Ok(deliver_saved(&submit_ctx, saved, request.deliver))
        })
        .await?;
    Ok(Json(outcome))
}
