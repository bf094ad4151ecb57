use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{DoctorListQuery, UpdateWorkingHoursRequest};
use crate::services::DoctorService;

fn require_staff(user: &User) -> Result<(), AppError> {
    if !user.is_staff() {
        return Err(AppError::Forbidden("Clinic staff access required".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = DoctorService::from_config(&state, auth.token());
    let doctors = service.list_doctors(query.clinic_id).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = DoctorService::from_config(&state, auth.token());
    let doctor = service.get_doctor(doctor_id).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_working_hours(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateWorkingHoursRequest>,
) -> Result<Json<Value>, AppError> {
    let is_self = doctor_id.to_string() == user.id;
    if !user.can_manage_doctors() && !is_self {
        return Err(AppError::Forbidden("Not authorized to edit working hours for this doctor".to_string()));
    }

    let service = DoctorService::from_config(&state, auth.token());
    let doctor = service.update_working_hours(doctor_id, request.working_hours).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}
