//! Appointment desk endpoints.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OperatorContext};
use crate::appointment::{self, Appointment, NewAppointment};
use crate::models::AppointmentStatus;

#[derive(Deserialize)]
pub struct ScheduleQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: AppointmentStatus,
}

fn parse_status(raw: &str) -> Result<AppointmentStatus, ApiError> {
    AppointmentStatus::from_str(&raw.trim().to_lowercase())
        .map_err(|_| ApiError::BadRequest(format!("Unknown appointment status: {raw}")))
}

/// `POST /api/appointments`
pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
    Json(body): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let booked = ctx
        .blocking(move |core| {
            let conn = core.open_db()?;
            Ok(appointment::book_appointment(&conn, &operator.operator_id, &body)?)
        })
        .await?;
    tracing::info!(appointment_id = %booked.id, "Appointment booked");
    Ok((StatusCode::CREATED, Json(booked)))
}

/// `GET /api/appointments?status=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let schedule = ctx
        .blocking(move |core| {
            let conn = core.open_db()?;
            Ok(appointment::list_appointments_for_doctor(
                &conn,
                &operator.operator_id,
                status,
            )?)
        })
        .await?;
    Ok(Json(schedule))
}

/// `POST /api/appointments/:id/status`
pub async fn set_status(
    State(ctx): State<ApiContext>,
    Extension(operator): Extension<OperatorContext>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = parse_status(&body.status)?;
    let id = ctx
        .blocking(move |core| {
            let conn = core.open_db()?;
            appointment::update_appointment_status(&conn, &operator.operator_id, &id, status)?;
            Ok(id)
        })
        .await?;
    Ok(Json(StatusResponse { id, status }))
}
