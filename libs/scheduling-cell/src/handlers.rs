// libs/scheduling-cell/src/handlers.rs
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

use crate::models::{
    CreateScheduleBlockRequest, ScheduleBlockPatch, ScheduleBlockQuery, SlotCheckQuery,
};
use crate::services::ScheduleBlockService;

fn require_staff(user: &User) -> Result<(), AppError> {
    if !user.is_staff() {
        return Err(AppError::Forbidden("Clinic staff access required".to_string()));
    }
    Ok(())
}

fn require_schedule_manager(user: &User) -> Result<(), AppError> {
    if !user.can_manage_schedule() {
        return Err(AppError::Forbidden("Not authorized to manage schedule blocks".to_string()));
    }
    Ok(())
}

fn require_scope(user: &User, doctor_id: Option<Uuid>) -> Result<(), AppError> {
    let doctor_id = doctor_id.map(|id| id.to_string());
    if !user.can_manage_schedule_of(doctor_id.as_deref()) {
        return Err(AppError::Forbidden("Doctors may only manage their own schedule blocks".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn list_schedule_blocks(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ScheduleBlockQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = ScheduleBlockService::from_config(&state, auth.token());
    let blocks = service.list_blocks(&query).await?;

    Ok(Json(json!({
        "blocks": blocks,
        "total": blocks.len()
    })))
}

#[axum::debug_handler]
pub async fn check_time_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<SlotCheckQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = ScheduleBlockService::from_config(&state, auth.token());
    let blocked = service
        .is_time_slot_blocked(query.clinic_id, query.doctor_id, query.start, query.end)
        .await?;

    Ok(Json(json!({
        "blocked": blocked,
        "doctor_id": query.doctor_id,
        "start": query.start,
        "end": query.end
    })))
}

#[axum::debug_handler]
pub async fn create_schedule_block(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleBlockRequest>,
) -> Result<Json<Value>, AppError> {
    require_schedule_manager(&user)?;
    require_scope(&user, request.doctor_id)?;

    let service = ScheduleBlockService::from_config(&state, auth.token());
    let block = service.create_block(request).await?;

    Ok(Json(json!({
        "success": true,
        "block": block
    })))
}

#[axum::debug_handler]
pub async fn update_schedule_block(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(block_id): Path<Uuid>,
    Json(patch): Json<ScheduleBlockPatch>,
) -> Result<Json<Value>, AppError> {
    require_schedule_manager(&user)?;

    let service = ScheduleBlockService::from_config(&state, auth.token());
    if !user.can_manage_clinic_schedule() {
        let existing = service.get_block(block_id).await?;
        require_scope(&user, existing.doctor_id)?;
        require_scope(&user, patch.apply_to(&existing).doctor_id)?;
    }
    let block = service.update_block(block_id, patch).await?;

    Ok(Json(json!({
        "success": true,
        "block": block
    })))
}

#[axum::debug_handler]
pub async fn delete_schedule_block(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(block_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_schedule_manager(&user)?;

    let service = ScheduleBlockService::from_config(&state, auth.token());
    if !user.can_manage_clinic_schedule() {
        require_scope(&user, service.get_block(block_id).await?.doctor_id)?;
    }
    service.delete_block(block_id).await?;

    Ok(Json(json!({
        "success": true,
        "deleted": block_id
    })))
}
