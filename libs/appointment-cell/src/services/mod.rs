pub mod booking;
pub mod calendar;
pub mod lifecycle;
pub mod store;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use store::{AppointmentStore, SupabaseAppointmentStore};
