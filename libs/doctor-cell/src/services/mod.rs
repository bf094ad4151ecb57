pub mod doctor;
pub mod working_hours;

pub use doctor::{DoctorService, DoctorStore, SupabaseDoctorStore};
