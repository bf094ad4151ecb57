use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError, WorkingHours};

#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError>;

    async fn list_doctors(&self, clinic_id: Uuid) -> Result<Vec<Doctor>, DoctorError>;

    async fn update_working_hours(
        &self,
        doctor_id: Uuid,
        working_hours: &WorkingHours,
    ) -> Result<Doctor, DoctorError>;
}

/// `doctors` table over PostgREST, scoped to the caller's token.
pub struct SupabaseDoctorStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseDoctorStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    fn parse_doctors(rows: Vec<Value>) -> Result<Vec<Doctor>, DoctorError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctors: {}", e)))
    }
}

#[async_trait]
impl DoctorStore for SupabaseDoctorStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        Self::parse_doctors(rows)?
            .into_iter()
            .next()
            .ok_or(DoctorError::NotFound)
    }

    async fn list_doctors(&self, clinic_id: Uuid) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?clinic_id=eq.{}&order=name.asc", clinic_id);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        Self::parse_doctors(rows)
    }

    async fn update_working_hours(
        &self,
        doctor_id: Uuid,
        working_hours: &WorkingHours,
    ) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(json!({ "working_hours": working_hours })),
                Some(SupabaseClient::representation_headers()),
            )
            .await?;

        Self::parse_doctors(rows)?
            .into_iter()
            .next()
            .ok_or(DoctorError::NotFound)
    }
}

pub struct DoctorService {
    store: Arc<dyn DoctorStore>,
}

impl DoctorService {
    pub fn new(store: Arc<dyn DoctorStore>) -> Self {
        Self { store }
    }

    pub fn from_config(config: &AppConfig, auth_token: &str) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::new(Arc::new(SupabaseDoctorStore::new(supabase, auth_token)))
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor {}", doctor_id);
        self.store.get_doctor(doctor_id).await
    }

    pub async fn list_doctors(&self, clinic_id: Uuid) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Listing doctors for clinic {}", clinic_id);
        self.store.list_doctors(clinic_id).await
    }

    pub async fn update_working_hours(
        &self,
        doctor_id: Uuid,
        working_hours: WorkingHours,
    ) -> Result<Doctor, DoctorError> {
        if let Err(e) = working_hours.validate() {
            warn!("Rejected working hours for doctor {}: {}", doctor_id, e);
            return Err(e);
        }

        let doctor = self.store.update_working_hours(doctor_id, &working_hours).await?;
        info!("Working hours updated for doctor {}", doctor_id);
        Ok(doctor)
    }
}
