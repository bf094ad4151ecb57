// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::{hhmm, WorkingHours};
use doctor_cell::services::{DoctorService, DoctorStore, SupabaseDoctorStore};
use scheduling_cell::models::{DayAvailability, TimeRange};
use scheduling_cell::services::availability::{self, local_day, local_to_utc};
use scheduling_cell::services::{
    ConflictDetectionService, ScheduleBlockService, ScheduleBlockStore, SupabaseScheduleBlockStore,
};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    appointment_duration, Appointment, AppointmentError, AppointmentQuery, AppointmentStatus,
    AvailabilityQuery, BookingPolicy, CalendarQuery, CreateAppointmentRequest, NewAppointment,
};
use crate::services::calendar;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};

pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentStore>,
    blocks: ScheduleBlockService,
    doctors: DoctorService,
    lifecycle: AppointmentLifecycleService,
    policy: BookingPolicy,
    clinic_tz: FixedOffset,
}

impl AppointmentBookingService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        blocks: Arc<dyn ScheduleBlockStore>,
        doctors: Arc<dyn DoctorStore>,
        policy: BookingPolicy,
        clinic_tz: FixedOffset,
    ) -> Self {
        Self {
            appointments,
            blocks: ScheduleBlockService::new(blocks),
            doctors: DoctorService::new(doctors),
            lifecycle: AppointmentLifecycleService::new(),
            policy,
            clinic_tz,
        }
    }

    pub fn from_config(config: &AppConfig, auth_token: &str) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self::new(
            Arc::new(SupabaseAppointmentStore::new(Arc::clone(&supabase), auth_token)),
            Arc::new(SupabaseScheduleBlockStore::new(Arc::clone(&supabase), auth_token)),
            Arc::new(SupabaseDoctorStore::new(supabase, auth_token)),
            BookingPolicy::from_config(config),
            config.clinic_offset(),
        )
    }

    /// Runs the creation checks against fresh snapshots and persists the
    /// appointment when they pass. The store may still reject the write if a
    /// concurrent booking took the slot.
    pub async fn book_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if request.patient_name.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Patient name is required".to_string()));
        }

        let (Some(date), Some(time)) = (request.date, request.time.as_deref()) else {
            return Err(AppointmentError::ValidationError(
                "Appointment date and time are required".to_string(),
            ));
        };

        let start = resolve_start(date, time, &self.clinic_tz)?;
        let candidate = TimeRange::starting_at(start, appointment_duration());

        if let Some(doctor_id) = request.doctor_id {
            debug!("Checking candidate {} - {} for doctor {}", candidate.start, candidate.end, doctor_id);

            let engine = self.blocks.snapshot(request.clinic_id, Some(doctor_id)).await?;

            // Anything starting up to one appointment length earlier can still overlap.
            let window = TimeRange::new(start - appointment_duration(), candidate.end);
            let existing = self
                .appointments
                .fetch_appointments(request.clinic_id, &window, Some(doctor_id))
                .await?;

            let working_hours = if self.policy.enforce_working_hours {
                Some(self.doctors.get_doctor(doctor_id).await?.working_hours)
            } else {
                None
            };

            validate_candidate(
                doctor_id,
                &candidate,
                &engine,
                &existing,
                working_hours.as_ref(),
                &self.clinic_tz,
            )?;
        }

        let payload = NewAppointment::from_request(request, start);
        let appointment = self.appointments.create_appointment(&payload).await?;

        info!(
            "Appointment {} booked at {} for doctor {:?}",
            appointment.id, appointment.date, appointment.doctor_id
        );
        Ok(appointment)
    }

    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.appointments.get_appointment(appointment_id).await?;
        self.lifecycle.validate_status_transition(current.status, new_status)?;

        let updated = self.appointments.update_status(appointment_id, new_status).await?;
        info!("Appointment {} moved from {} to {}", appointment_id, current.status, new_status);
        Ok(updated)
    }

    pub async fn list_appointments(
        &self,
        query: &AppointmentQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if query.from >= query.to {
            return Err(AppointmentError::ValidationError(
                "Range start must be before range end".to_string(),
            ));
        }

        self.appointments
            .fetch_appointments(query.clinic_id, &TimeRange::new(query.from, query.to), query.doctor_id)
            .await
    }

    /// Local days of the requested month that carry appointments.
    pub async fn calendar(&self, query: &CalendarQuery) -> Result<Vec<NaiveDate>, AppointmentError> {
        let month = calendar::month_range(query.year, query.month, &self.clinic_tz).ok_or_else(|| {
            AppointmentError::ValidationError(format!("Invalid month {}-{}", query.year, query.month))
        })?;

        let appointments = self
            .appointments
            .fetch_appointments(query.clinic_id, &month, query.doctor_id)
            .await?;

        Ok(calendar::days_with_appointments(
            query.year,
            query.month,
            &appointments,
            &self.clinic_tz,
        ))
    }

    pub async fn day_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<DayAvailability, AppointmentError> {
        let doctor = self.doctors.get_doctor(query.doctor_id).await?;
        let day = local_day(query.date, &self.clinic_tz).ok_or_else(|| {
            AppointmentError::ValidationError(format!("Invalid date {}", query.date))
        })?;

        let engine = self.blocks.snapshot(query.clinic_id, Some(doctor.id)).await?;
        let window = TimeRange::new(day.start - appointment_duration(), day.end);
        let busy: Vec<TimeRange> = self
            .appointments
            .fetch_appointments(query.clinic_id, &window, Some(doctor.id))
            .await?
            .iter()
            .filter(|appointment| appointment.is_blocking())
            .map(Appointment::time_range)
            .collect();

        Ok(availability::day_availability(
            query.date,
            &self.clinic_tz,
            doctor.id,
            &doctor.working_hours,
            &engine,
            &busy,
            appointment_duration(),
        ))
    }
}

/// Clinic-local `date` + `HH:MM` as a UTC instant.
pub fn resolve_start<Tz: TimeZone>(
    date: NaiveDate,
    time: &str,
    tz: &Tz,
) -> Result<DateTime<Utc>, AppointmentError> {
    let time = hhmm::parse(time).map_err(AppointmentError::ValidationError)?;

    local_to_utc(date, time, tz).ok_or_else(|| {
        AppointmentError::ValidationError(format!("{} {} does not exist in the clinic's time zone", date, time))
    })
}

/// The first active appointment of `doctor_id` overlapping `candidate`.
pub fn conflicting_appointment<'a>(
    doctor_id: Uuid,
    candidate: &TimeRange,
    existing: &'a [Appointment],
) -> Option<&'a Appointment> {
    existing.iter().find(|appointment| {
        appointment.doctor_id == Some(doctor_id)
            && appointment.is_blocking()
            && appointment.time_range().overlaps(candidate)
    })
}

/// The in-process booking checks, in order: schedule blocks, existing
/// appointments, then working hours when given.
pub fn validate_candidate<Tz: TimeZone>(
    doctor_id: Uuid,
    candidate: &TimeRange,
    engine: &ConflictDetectionService,
    existing: &[Appointment],
    working_hours: Option<&WorkingHours>,
    tz: &Tz,
) -> Result<(), AppointmentError> {
    if let Some(block) = engine.first_blocking(Some(doctor_id), candidate) {
        warn!("Booking rejected: doctor {} blocked by schedule block {}", doctor_id, block.id);
        return Err(AppointmentError::SlotBlocked);
    }

    if let Some(taken) = conflicting_appointment(doctor_id, candidate, existing) {
        warn!("Booking rejected: doctor {} already has appointment {}", doctor_id, taken.id);
        return Err(AppointmentError::ConflictDetected);
    }

    if let Some(working_hours) = working_hours {
        let local_start = candidate.start.with_timezone(tz).naive_local();
        let local_end = candidate.end.with_timezone(tz).naive_local();
        if !working_hours.covers(local_start, local_end) {
            warn!("Booking rejected: {} is outside working hours of doctor {}", local_start, doctor_id);
            return Err(AppointmentError::OutsideWorkingHours);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use doctor_cell::models::TimePeriod;
    use scheduling_cell::models::ScheduleBlock;
    use crate::models::AppointmentType;

    fn at(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    fn hour_from(raw: &str) -> TimeRange {
        TimeRange::starting_at(at(raw), Duration::hours(1))
    }

    fn appointment(doctor_id: Uuid, start: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            clinic_id: Uuid::nil(),
            doctor_id: Some(doctor_id),
            patient_name: "Maria".to_string(),
            patient_phone: None,
            patient_email: None,
            date: at(start),
            appointment_type: AppointmentType::InPerson,
            status,
            notes: None,
            created_at: None,
        }
    }

    fn block(doctor_id: Option<Uuid>, start: &str, end: &str) -> ScheduleBlock {
        ScheduleBlock {
            id: Uuid::new_v4(),
            clinic_id: Uuid::nil(),
            doctor_id,
            start_time: at(start),
            end_time: at(end),
            reason: Some("Congress".to_string()),
            created_at: None,
        }
    }

    fn check(
        doctor_id: Uuid,
        candidate: &str,
        blocks: Vec<ScheduleBlock>,
        existing: &[Appointment],
    ) -> Result<(), AppointmentError> {
        validate_candidate(
            doctor_id,
            &hour_from(candidate),
            &ConflictDetectionService::new(blocks),
            existing,
            None,
            &Utc,
        )
    }

    #[test]
    fn test_resolve_start_uses_clinic_offset() {
        let sao_paulo = FixedOffset::west_opt(3 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        assert_eq!(resolve_start(date, "09:30", &sao_paulo).unwrap(), at("2025-03-10T12:30:00Z"));
        assert!(matches!(
            resolve_start(date, "9h30", &sao_paulo),
            Err(AppointmentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_blocked_slot_is_rejected_before_appointments() {
        let doctor = Uuid::new_v4();
        let existing = [appointment(doctor, "2025-03-10T14:00:00Z", AppointmentStatus::Scheduled)];
        let blocks = vec![block(Some(doctor), "2025-03-10T14:30:00Z", "2025-03-10T15:00:00Z")];

        assert!(matches!(
            check(doctor, "2025-03-10T14:00:00Z", blocks, &existing),
            Err(AppointmentError::SlotBlocked)
        ));
    }

    #[test]
    fn test_back_to_back_blocks_are_fine() {
        let doctor = Uuid::new_v4();
        let blocks = vec![
            block(Some(doctor), "2025-03-10T13:00:00Z", "2025-03-10T14:00:00Z"),
            block(None, "2025-03-10T15:00:00Z", "2025-03-10T16:00:00Z"),
        ];

        assert!(check(doctor, "2025-03-10T14:00:00Z", blocks, &[]).is_ok());
    }

    #[test]
    fn test_other_doctors_block_is_ignored() {
        let doctor = Uuid::new_v4();
        let blocks = vec![block(Some(Uuid::new_v4()), "2025-03-10T14:00:00Z", "2025-03-10T15:00:00Z")];

        assert!(check(doctor, "2025-03-10T14:00:00Z", blocks, &[]).is_ok());
    }

    #[test]
    fn test_overlapping_appointment_is_a_conflict() {
        let doctor = Uuid::new_v4();
        let existing = [appointment(doctor, "2025-03-10T13:30:00Z", AppointmentStatus::Confirmed)];

        assert!(matches!(
            check(doctor, "2025-03-10T14:00:00Z", vec![], &existing),
            Err(AppointmentError::ConflictDetected)
        ));
        assert!(check(doctor, "2025-03-10T14:30:00Z", vec![], &existing).is_ok());
    }

    #[test]
    fn test_inactive_statuses_free_the_slot() {
        let doctor = Uuid::new_v4();
        let existing = [
            appointment(doctor, "2025-03-10T14:00:00Z", AppointmentStatus::Cancelled),
            appointment(doctor, "2025-03-10T14:00:00Z", AppointmentStatus::NoShow),
            appointment(Uuid::new_v4(), "2025-03-10T14:00:00Z", AppointmentStatus::Scheduled),
        ];

        assert!(check(doctor, "2025-03-10T14:00:00Z", vec![], &existing).is_ok());
    }

    #[test]
    fn test_working_hours_only_when_given() {
        let doctor = Uuid::new_v4();
        let mut hours = WorkingHours::default();
        hours.monday.push(TimePeriod::parse("09:00", "12:00").unwrap());
        let engine = ConflictDetectionService::default();

        let late = hour_from("2025-03-10T11:30:00Z");
        assert!(matches!(
            validate_candidate(doctor, &late, &engine, &[], Some(&hours), &Utc),
            Err(AppointmentError::OutsideWorkingHours)
        ));
        assert!(validate_candidate(doctor, &late, &engine, &[], None, &Utc).is_ok());

        let fits = hour_from("2025-03-10T11:00:00Z");
        assert!(validate_candidate(doctor, &fits, &engine, &[], Some(&hours), &Utc).is_ok());
    }
}
