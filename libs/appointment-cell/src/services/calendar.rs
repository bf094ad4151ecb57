// libs/appointment-cell/src/services/calendar.rs
use chrono::{Datelike, NaiveDate, TimeZone};

use scheduling_cell::models::TimeRange;
use scheduling_cell::services::availability::local_to_utc;

use crate::models::Appointment;

/// Whether any appointment falls on `date` in the clinic's local calendar.
///
/// Appointments count as instants here; status is not considered.
pub fn has_appointments_on_date<Tz: TimeZone>(
    date: NaiveDate,
    appointments: &[Appointment],
    tz: &Tz,
) -> bool {
    appointments
        .iter()
        .any(|appointment| appointment.date.with_timezone(tz).date_naive() == date)
}

/// The local days of `year`/`month` that carry at least one appointment.
pub fn days_with_appointments<Tz: TimeZone>(
    year: i32,
    month: u32,
    appointments: &[Appointment],
    tz: &Tz,
) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|day| day.month0() == first.month0())
        .filter(|day| has_appointments_on_date(*day, appointments, tz))
        .collect()
}

/// `[first local midnight of the month, first local midnight of the next)`.
pub fn month_range<Tz: TimeZone>(year: i32, month: u32, tz: &Tz) -> Option<TimeRange> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let midnight = chrono::NaiveTime::from_hms_opt(0, 0, 0)?;

    Some(TimeRange::new(
        local_to_utc(first, midnight, tz)?,
        local_to_utc(next, midnight, tz)?,
    ))
}
