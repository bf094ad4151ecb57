// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentQuery, AvailabilityQuery, CalendarQuery, CreateAppointmentRequest,
    UpdateStatusRequest,
};
use crate::services::AppointmentBookingService;

fn require_staff(user: &User) -> Result<(), AppError> {
    if !user.is_staff() {
        return Err(AppError::Forbidden("Clinic staff access required".to_string()));
    }
    Ok(())
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !user.can_book_appointments() {
        return Err(AppError::Forbidden("Not authorized to book appointments".to_string()));
    }

    debug!("User {} booking appointment in clinic {}", user.id, request.clinic_id);

    let service = AppointmentBookingService::from_config(&state, auth.token());
    let appointment = service.book_appointment(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.can_manage_schedule() {
        return Err(AppError::Forbidden("Not authorized to update appointments".to_string()));
    }

    let service = AppointmentBookingService::from_config(&state, auth.token());
    let appointment = service.update_status(appointment_id, request.status).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = AppointmentBookingService::from_config(&state, auth.token());
    let appointments = service.list_appointments(&query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_calendar(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = AppointmentBookingService::from_config(&state, auth.token());
    let days = service.calendar(&query).await?;

    Ok(Json(json!({
        "year": query.year,
        "month": query.month,
        "days": days
    })))
}

#[axum::debug_handler]
pub async fn get_day_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = AppointmentBookingService::from_config(&state, auth.token());
    let availability = service.day_availability(&query).await?;

    Ok(Json(json!(availability)))
}
