// libs/scheduling-cell/src/services/blocks.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateScheduleBlockRequest, ScheduleBlock, ScheduleBlockError, ScheduleBlockPatch,
    ScheduleBlockQuery,
};
use crate::services::conflict::ConflictDetectionService;

#[async_trait]
pub trait ScheduleBlockStore: Send + Sync {
    /// Blocks for the clinic. With a doctor, that doctor's blocks plus the
    /// clinic-wide ones.
    async fn fetch_schedule_blocks(
        &self,
        clinic_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<ScheduleBlock>, ScheduleBlockError>;

    async fn get_schedule_block(&self, block_id: Uuid) -> Result<ScheduleBlock, ScheduleBlockError>;

    async fn create_schedule_block(
        &self,
        request: &CreateScheduleBlockRequest,
    ) -> Result<ScheduleBlock, ScheduleBlockError>;

    async fn update_schedule_block(
        &self,
        block_id: Uuid,
        patch: &ScheduleBlockPatch,
    ) -> Result<ScheduleBlock, ScheduleBlockError>;

    async fn delete_schedule_block(&self, block_id: Uuid) -> Result<(), ScheduleBlockError>;
}

pub struct SupabaseScheduleBlockStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseScheduleBlockStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    fn parse_blocks(rows: Vec<Value>) -> Result<Vec<ScheduleBlock>, ScheduleBlockError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ScheduleBlock>, _>>()
            .map_err(|e| ScheduleBlockError::DatabaseError(format!("Failed to parse schedule blocks: {}", e)))
    }

    fn first_block(rows: Vec<Value>) -> Result<ScheduleBlock, ScheduleBlockError> {
        Self::parse_blocks(rows)?
            .into_iter()
            .next()
            .ok_or(ScheduleBlockError::NotFound)
    }

    fn patch_body(patch: &ScheduleBlockPatch) -> Value {
        let mut body = Map::new();

        if patch.clinic_wide {
            body.insert("doctor_id".to_string(), Value::Null);
        } else if let Some(doctor_id) = patch.doctor_id {
            body.insert("doctor_id".to_string(), json!(doctor_id));
        }
        if let Some(start) = patch.start_time {
            body.insert("start_time".to_string(), json!(start.to_rfc3339()));
        }
        if let Some(end) = patch.end_time {
            body.insert("end_time".to_string(), json!(end.to_rfc3339()));
        }
        if let Some(reason) = &patch.reason {
            body.insert("reason".to_string(), json!(reason));
        }

        Value::Object(body)
    }
}

#[async_trait]
impl ScheduleBlockStore for SupabaseScheduleBlockStore {
    async fn fetch_schedule_blocks(
        &self,
        clinic_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<ScheduleBlock>, ScheduleBlockError> {
        let mut query_parts = vec![format!("clinic_id=eq.{}", clinic_id)];
        if let Some(doctor_id) = doctor_id {
            query_parts.push(format!("or=(doctor_id.eq.{},doctor_id.is.null)", doctor_id));
        }

        let path = format!(
            "/rest/v1/schedule_blocks?{}&order=start_time.asc",
            query_parts.join("&")
        );

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        Self::parse_blocks(rows)
    }

    async fn get_schedule_block(&self, block_id: Uuid) -> Result<ScheduleBlock, ScheduleBlockError> {
        let path = format!("/rest/v1/schedule_blocks?id=eq.{}", block_id);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        Self::first_block(rows)
    }

    async fn create_schedule_block(
        &self,
        request: &CreateScheduleBlockRequest,
    ) -> Result<ScheduleBlock, ScheduleBlockError> {
        let body = json!({
            "clinic_id": request.clinic_id,
            "doctor_id": request.doctor_id,
            "start_time": request.start_time.to_rfc3339(),
            "end_time": request.end_time.to_rfc3339(),
            "reason": request.reason,
        });

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/schedule_blocks",
                Some(&self.auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await?;

        Self::first_block(rows)
    }

    async fn update_schedule_block(
        &self,
        block_id: Uuid,
        patch: &ScheduleBlockPatch,
    ) -> Result<ScheduleBlock, ScheduleBlockError> {
        let path = format!("/rest/v1/schedule_blocks?id=eq.{}", block_id);

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(Self::patch_body(patch)),
                Some(SupabaseClient::representation_headers()),
            )
            .await?;

        Self::first_block(rows)
    }

    async fn delete_schedule_block(&self, block_id: Uuid) -> Result<(), ScheduleBlockError> {
        let path = format!("/rest/v1/schedule_blocks?id=eq.{}", block_id);

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(&self.auth_token),
                None,
                Some(SupabaseClient::representation_headers()),
            )
            .await?;

        if rows.is_empty() {
            return Err(ScheduleBlockError::NotFound);
        }
        Ok(())
    }
}

pub struct ScheduleBlockService {
    store: Arc<dyn ScheduleBlockStore>,
}

impl ScheduleBlockService {
    pub fn new(store: Arc<dyn ScheduleBlockStore>) -> Self {
        Self { store }
    }

    pub fn from_config(config: &AppConfig, auth_token: &str) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::new(Arc::new(SupabaseScheduleBlockStore::new(supabase, auth_token)))
    }

    /// Loads the blocks relevant to `doctor_id` into a conflict engine.
    pub async fn snapshot(
        &self,
        clinic_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> Result<ConflictDetectionService, ScheduleBlockError> {
        let blocks = self.store.fetch_schedule_blocks(clinic_id, doctor_id).await?;
        debug!("Loaded {} schedule blocks for clinic {}", blocks.len(), clinic_id);
        Ok(ConflictDetectionService::new(blocks))
    }

    pub async fn list_blocks(
        &self,
        query: &ScheduleBlockQuery,
    ) -> Result<Vec<ScheduleBlock>, ScheduleBlockError> {
        let engine = self.snapshot(query.clinic_id, query.doctor_id).await?;

        if query.from.is_none() && query.to.is_none() {
            return Ok(engine.blocks().to_vec());
        }

        let from = query.from.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let to = query.to.unwrap_or(DateTime::<Utc>::MAX_UTC);
        if from > to {
            return Err(ScheduleBlockError::ValidationError(
                "Range start must not be after range end".to_string(),
            ));
        }

        Ok(engine.blocks_for_date_range(from, to, query.doctor_id))
    }

    pub async fn is_time_slot_blocked(
        &self,
        clinic_id: Uuid,
        doctor_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, ScheduleBlockError> {
        if start >= end {
            return Err(ScheduleBlockError::ValidationError(
                "Slot start must be before slot end".to_string(),
            ));
        }

        let engine = self.snapshot(clinic_id, doctor_id).await?;
        Ok(engine.is_time_slot_blocked(doctor_id, start, end))
    }

    pub async fn get_block(&self, block_id: Uuid) -> Result<ScheduleBlock, ScheduleBlockError> {
        self.store.get_schedule_block(block_id).await
    }

    pub async fn create_block(
        &self,
        request: CreateScheduleBlockRequest,
    ) -> Result<ScheduleBlock, ScheduleBlockError> {
        validate_bounds(request.start_time, request.end_time)?;

        let block = self.store.create_schedule_block(&request).await?;
        info!(
            "Schedule block {} created for {}",
            block.id,
            describe_scope(block.doctor_id)
        );
        Ok(block)
    }

    pub async fn update_block(
        &self,
        block_id: Uuid,
        patch: ScheduleBlockPatch,
    ) -> Result<ScheduleBlock, ScheduleBlockError> {
        let existing = self.store.get_schedule_block(block_id).await?;
        let merged = patch.apply_to(&existing);
        validate_bounds(merged.start_time, merged.end_time)?;

        let block = self.store.update_schedule_block(block_id, &patch).await?;
        info!("Schedule block {} updated", block_id);
        Ok(block)
    }

    pub async fn delete_block(&self, block_id: Uuid) -> Result<(), ScheduleBlockError> {
        self.store.delete_schedule_block(block_id).await?;
        info!("Schedule block {} deleted", block_id);
        Ok(())
    }
}

fn validate_bounds(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ScheduleBlockError> {
    if start >= end {
        warn!("Rejected schedule block with start {} not before end {}", start, end);
        return Err(ScheduleBlockError::ValidationError(
            "Block start must be before block end".to_string(),
        ));
    }
    Ok(())
}

fn describe_scope(doctor_id: Option<Uuid>) -> String {
    match doctor_id {
        Some(doctor_id) => format!("doctor {}", doctor_id),
        None => "the whole clinic".to_string(),
    }
}
