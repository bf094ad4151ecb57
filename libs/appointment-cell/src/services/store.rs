// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use uuid::Uuid;

use scheduling_cell::models::TimeRange;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments of the clinic starting within `[range.start, range.end)`,
    /// optionally for a single doctor, ordered by start.
    async fn fetch_appointments(
        &self,
        clinic_id: Uuid,
        range: &TimeRange,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError>;

    async fn create_appointment(&self, payload: &NewAppointment) -> Result<Appointment, AppointmentError>;

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError>;
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    fn parse_appointments(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    fn first_appointment(rows: Vec<Value>) -> Result<Appointment, AppointmentError> {
        Self::parse_appointments(rows)?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn fetch_appointments(
        &self,
        clinic_id: Uuid,
        range: &TimeRange,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![
            format!("clinic_id=eq.{}", clinic_id),
            format!("date=gte.{}", urlencoding::encode(&range.start.to_rfc3339())),
            format!("date=lt.{}", urlencoding::encode(&range.end.to_rfc3339())),
        ];

        if let Some(doctor_id) = doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }

        let path = format!("/rest/v1/appointments?{}&order=date.asc", query_parts.join("&"));

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        Self::parse_appointments(rows)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        Self::first_appointment(rows)
    }

    async fn create_appointment(&self, payload: &NewAppointment) -> Result<Appointment, AppointmentError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode appointment: {}", e)))?;

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(&self.auth_token),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await?;

        Self::first_appointment(rows)
            .map_err(|_| AppointmentError::DatabaseError("Failed to create appointment".to_string()))
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(json!({ "status": status })),
                Some(SupabaseClient::representation_headers()),
            )
            .await?;

        Self::first_appointment(rows)
    }
}
