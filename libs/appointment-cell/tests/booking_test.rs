use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use mockall::mock;
use uuid::Uuid;

use appointment_cell::models::*;
use appointment_cell::services::{AppointmentBookingService, AppointmentStore};
use doctor_cell::models::{Doctor, DoctorError, WorkingHours};
use doctor_cell::services::DoctorStore;
use scheduling_cell::models::{
    CreateScheduleBlockRequest, ScheduleBlock, ScheduleBlockError, ScheduleBlockPatch, TimeRange,
};
use scheduling_cell::services::ScheduleBlockStore;

mock! {
    pub Appointments {}

    #[async_trait]
    impl AppointmentStore for Appointments {
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
}

mock! {
    pub Blocks {}

    #[async_trait]
    impl ScheduleBlockStore for Blocks {
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
}

mock! {
    pub Doctors {}

    #[async_trait]
    impl DoctorStore for Doctors {
        async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError>;
        async fn list_doctors(&self, clinic_id: Uuid) -> Result<Vec<Doctor>, DoctorError>;
        async fn update_working_hours(
            &self,
            doctor_id: Uuid,
            working_hours: &WorkingHours,
        ) -> Result<Doctor, DoctorError>;
    }
}

/// Appointments kept in memory so consecutive bookings see each other.
#[derive(Default)]
struct InMemoryAppointments {
    rows: Mutex<Vec<Appointment>>,
}

#[async_trait]
impl AppointmentStore for InMemoryAppointments {
    async fn fetch_appointments(
        &self,
        clinic_id: Uuid,
        range: &TimeRange,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|a| a.clinic_id == clinic_id)
            .filter(|a| doctor_id.is_none() || a.doctor_id == doctor_id)
            .filter(|a| range.start <= a.date && a.date < range.end)
            .cloned()
            .collect())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let rows = self.rows.lock().unwrap();
        rows.iter()
            .find(|a| a.id == appointment_id)
            .cloned()
            .ok_or(AppointmentError::NotFound)
    }

    async fn create_appointment(&self, payload: &NewAppointment) -> Result<Appointment, AppointmentError> {
        let appointment = persisted(payload);
        self.rows.lock().unwrap().push(appointment.clone());
        Ok(appointment)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or(AppointmentError::NotFound)?;
        row.status = status;
        Ok(row.clone())
    }
}

fn persisted(payload: &NewAppointment) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        clinic_id: payload.clinic_id,
        doctor_id: payload.doctor_id,
        patient_name: payload.patient_name.clone(),
        patient_phone: payload.patient_phone.clone(),
        patient_email: payload.patient_email.clone(),
        date: payload.date,
        appointment_type: payload.appointment_type,
        status: payload.status,
        notes: payload.notes.clone(),
        created_at: Some(Utc::now()),
    }
}

fn at(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap()
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn request(clinic_id: Uuid, doctor_id: Option<Uuid>, date: &str, time: &str) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        clinic_id,
        doctor_id,
        patient_name: "Maria Souza".to_string(),
        patient_phone: Some("+55 11 99999-0000".to_string()),
        patient_email: None,
        date: Some(date.parse::<NaiveDate>().unwrap()),
        time: Some(time.to_string()),
        appointment_type: AppointmentType::InPerson,
        notes: None,
    }
}

fn block(clinic_id: Uuid, doctor_id: Option<Uuid>, start: &str, end: &str) -> ScheduleBlock {
    ScheduleBlock {
        id: Uuid::new_v4(),
        clinic_id,
        doctor_id,
        start_time: at(start),
        end_time: at(end),
        reason: Some("Surgery".to_string()),
        created_at: None,
    }
}

fn blocks_returning(blocks: Vec<ScheduleBlock>) -> MockBlocks {
    let mut store = MockBlocks::new();
    store
        .expect_fetch_schedule_blocks()
        .returning(move |_, _| Ok(blocks.clone()));
    store
}

fn service(
    appointments: Arc<dyn AppointmentStore>,
    blocks: MockBlocks,
    doctors: MockDoctors,
    policy: BookingPolicy,
) -> AppointmentBookingService {
    AppointmentBookingService::new(appointments, Arc::new(blocks), Arc::new(doctors), policy, utc())
}

fn accepting_store() -> MockAppointments {
    let mut store = MockAppointments::new();
    store.expect_fetch_appointments().returning(|_, _, _| Ok(vec![]));
    store
        .expect_create_appointment()
        .returning(|payload| Ok(persisted(payload)));
    store
}

#[tokio::test]
async fn test_booking_inside_block_is_rejected() {
    let clinic = Uuid::new_v4();
    let doctor = Uuid::new_v4();

    let mut appointments = MockAppointments::new();
    appointments.expect_fetch_appointments().returning(|_, _, _| Ok(vec![]));
    appointments.expect_create_appointment().never();

    let booking = service(
        Arc::new(appointments),
        blocks_returning(vec![block(clinic, Some(doctor), "2025-03-10T09:00:00Z", "2025-03-10T10:00:00Z")]),
        MockDoctors::new(),
        BookingPolicy::default(),
    );

    let result = booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "09:30"))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotBlocked));
}

#[tokio::test]
async fn test_booking_at_block_end_is_accepted() {
    let clinic = Uuid::new_v4();
    let doctor = Uuid::new_v4();

    let booking = service(
        Arc::new(accepting_store()),
        blocks_returning(vec![block(clinic, Some(doctor), "2025-03-10T09:00:00Z", "2025-03-10T10:00:00Z")]),
        MockDoctors::new(),
        BookingPolicy::default(),
    );

    let appointment = booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "10:00"))
        .await
        .unwrap();

    assert_eq!(appointment.date, at("2025-03-10T10:00:00Z"));
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn test_back_to_back_bookings_are_both_accepted() {
    let clinic = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let store = Arc::new(InMemoryAppointments::default());

    let booking = service(
        store.clone(),
        blocks_returning(vec![]),
        MockDoctors::new(),
        BookingPolicy::default(),
    );

    booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "09:00"))
        .await
        .unwrap();
    booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "10:00"))
        .await
        .unwrap();

    assert_eq!(store.rows.lock().unwrap().len(), 2);

    // A third booking overlapping the first one is refused.
    let overlapping = booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "09:30"))
        .await;
    assert_matches!(overlapping, Err(AppointmentError::ConflictDetected));
}

#[tokio::test]
async fn test_clinic_wide_block_rejects_every_doctor() {
    let clinic = Uuid::new_v4();
    let christmas = vec![block(clinic, None, "2025-12-25T00:00:00Z", "2025-12-26T00:00:00Z")];

    for time in ["00:00", "08:30", "23:00"] {
        let mut appointments = MockAppointments::new();
        appointments.expect_fetch_appointments().returning(|_, _, _| Ok(vec![]));
        appointments.expect_create_appointment().never();

        let booking = service(
            Arc::new(appointments),
            blocks_returning(christmas.clone()),
            MockDoctors::new(),
            BookingPolicy::default(),
        );

        let result = booking
            .book_appointment(request(clinic, Some(Uuid::new_v4()), "2025-12-25", time))
            .await;
        assert_matches!(result, Err(AppointmentError::SlotBlocked));
    }
}

#[tokio::test]
async fn test_cancelled_and_no_show_do_not_block() {
    let clinic = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let store = Arc::new(InMemoryAppointments::default());

    let booking = service(
        store.clone(),
        blocks_returning(vec![]),
        MockDoctors::new(),
        BookingPolicy::default(),
    );

    let first = booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "14:00"))
        .await
        .unwrap();
    booking.update_status(first.id, AppointmentStatus::Cancelled).await.unwrap();

    let second = booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "14:00"))
        .await
        .unwrap();
    booking.update_status(second.id, AppointmentStatus::NoShow).await.unwrap();

    assert!(booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "14:00"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_missing_date_or_time_is_a_validation_error() {
    let clinic = Uuid::new_v4();
    let mut appointments = MockAppointments::new();
    appointments.expect_create_appointment().never();

    let booking = service(
        Arc::new(appointments),
        MockBlocks::new(),
        MockDoctors::new(),
        BookingPolicy::default(),
    );

    let mut no_time = request(clinic, Some(Uuid::new_v4()), "2025-03-10", "09:00");
    no_time.time = None;
    assert_matches!(
        booking.book_appointment(no_time).await,
        Err(AppointmentError::ValidationError(_))
    );

    let mut no_date = request(clinic, None, "2025-03-10", "09:00");
    no_date.date = None;
    assert_matches!(
        booking.book_appointment(no_date).await,
        Err(AppointmentError::ValidationError(_))
    );
}

#[tokio::test]
async fn test_booking_without_doctor_skips_conflict_checks() {
    let clinic = Uuid::new_v4();
    let mut appointments = MockAppointments::new();
    appointments.expect_fetch_appointments().never();
    appointments
        .expect_create_appointment()
        .times(1)
        .returning(|payload| Ok(persisted(payload)));

    let mut blocks = MockBlocks::new();
    blocks.expect_fetch_schedule_blocks().never();

    let booking = service(Arc::new(appointments), blocks, MockDoctors::new(), BookingPolicy::default());

    let appointment = booking
        .book_appointment(request(clinic, None, "2025-12-25", "10:00"))
        .await
        .unwrap();
    assert_eq!(appointment.doctor_id, None);
}

#[tokio::test]
async fn test_store_constraint_violation_surfaces_as_conflict() {
    let clinic = Uuid::new_v4();
    let doctor = Uuid::new_v4();

    let mut appointments = MockAppointments::new();
    appointments.expect_fetch_appointments().returning(|_, _, _| Ok(vec![]));
    appointments.expect_create_appointment().returning(|_| {
        Err(shared_database::supabase::DatabaseError::Conflict(
            "conflicting key value violates exclusion constraint (23P01)".to_string(),
        )
        .into())
    });

    let booking = service(
        Arc::new(appointments),
        blocks_returning(vec![]),
        MockDoctors::new(),
        BookingPolicy::default(),
    );

    let result = booking
        .book_appointment(request(clinic, Some(doctor), "2025-03-10", "09:00"))
        .await;
    assert_matches!(result, Err(AppointmentError::ConflictDetected));
}

#[tokio::test]
async fn test_working_hours_enforced_when_policy_opts_in() {
    let clinic = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    let mut doctors = MockDoctors::new();
    doctors.expect_get_doctor().returning(move |id| {
        let body = shared_utils::test_utils::MockSupabaseResponses::doctor_response(
            &id.to_string(),
            &Uuid::nil().to_string(),
            "Dr. Ana",
        );
        Ok(serde_json::from_value(body).unwrap())
    });

    let booking = service(
        Arc::new(accepting_store()),
        blocks_returning(vec![]),
        doctors,
        BookingPolicy { enforce_working_hours: true },
    );

    // 2025-03-10 is a Monday; lunch runs 12:00-13:00.
    assert_matches!(
        booking.book_appointment(request(clinic, Some(doctor_id), "2025-03-10", "11:30")).await,
        Err(AppointmentError::OutsideWorkingHours)
    );
    assert_matches!(
        booking.book_appointment(request(clinic, Some(doctor_id), "2025-03-15", "10:00")).await,
        Err(AppointmentError::OutsideWorkingHours)
    );
    assert!(booking
        .book_appointment(request(clinic, Some(doctor_id), "2025-03-10", "13:00"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_status_transitions_go_through_lifecycle() {
    let clinic = Uuid::new_v4();
    let store = Arc::new(InMemoryAppointments::default());
    let booking = service(store, MockBlocks::new(), MockDoctors::new(), BookingPolicy::default());

    let appointment = booking
        .book_appointment(request(clinic, None, "2025-03-10", "09:00"))
        .await
        .unwrap();

    assert_matches!(
        booking.update_status(appointment.id, AppointmentStatus::Completed).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );

    booking.update_status(appointment.id, AppointmentStatus::Confirmed).await.unwrap();
    let done = booking
        .update_status(appointment.id, AppointmentStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, AppointmentStatus::Completed);

    assert_matches!(
        booking.update_status(appointment.id, AppointmentStatus::Cancelled).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn test_calendar_marks_days_with_appointments() {
    let clinic = Uuid::new_v4();
    let store = Arc::new(InMemoryAppointments::default());
    let booking = service(store, MockBlocks::new(), MockDoctors::new(), BookingPolicy::default());

    for (date, time) in [("2025-03-03", "09:00"), ("2025-03-03", "15:00"), ("2025-03-21", "10:00"), ("2025-04-01", "10:00")] {
        booking.book_appointment(request(clinic, None, date, time)).await.unwrap();
    }

    let days = booking
        .calendar(&CalendarQuery { clinic_id: clinic, doctor_id: None, year: 2025, month: 3 })
        .await
        .unwrap();

    assert_eq!(
        days,
        vec![
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()
        ]
    );
}

#[tokio::test]
async fn test_day_availability_subtracts_blocks_and_bookings() {
    let clinic = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let store = Arc::new(InMemoryAppointments::default());

    let mut doctors = MockDoctors::new();
    doctors.expect_get_doctor().returning(move |id| {
        let body = shared_utils::test_utils::MockSupabaseResponses::doctor_response(
            &id.to_string(),
            &Uuid::nil().to_string(),
            "Dr. Ana",
        );
        Ok(serde_json::from_value(body).unwrap())
    });

    let booking = service(
        store,
        blocks_returning(vec![block(clinic, Some(doctor_id), "2025-03-10T15:00:00Z", "2025-03-10T18:00:00Z")]),
        doctors,
        BookingPolicy::default(),
    );

    booking
        .book_appointment(request(clinic, Some(doctor_id), "2025-03-10", "09:00"))
        .await
        .unwrap();

    let day = booking
        .day_availability(&AvailabilityQuery {
            clinic_id: clinic,
            doctor_id,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        })
        .await
        .unwrap();

    assert_eq!(
        day.available,
        vec![
            TimeRange::new(at("2025-03-10T10:00:00Z"), at("2025-03-10T12:00:00Z")),
            TimeRange::new(at("2025-03-10T13:00:00Z"), at("2025-03-10T15:00:00Z")),
        ]
    );
    assert_eq!(day.slot_starts.first(), Some(&at("2025-03-10T10:00:00Z")));
    assert!(!day.slot_starts.contains(&at("2025-03-10T11:30:00Z")));
    assert!(day.slot_starts.contains(&at("2025-03-10T14:00:00Z")));
}
