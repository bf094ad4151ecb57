// libs/scheduling-cell/src/services/availability.rs
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use doctor_cell::models::{TimePeriod, WorkingHours};

use crate::models::{DayAvailability, TimeRange};
use crate::services::conflict::ConflictDetectionService;

/// Grid on which bookable starts are offered.
pub const SLOT_STEP_MINUTES: i64 = 30;

/// Converts a local wall-clock time on `date` to UTC. `None` when the local
/// time does not exist in `tz`.
pub fn local_to_utc<Tz: TimeZone>(date: NaiveDate, time: NaiveTime, tz: &Tz) -> Option<DateTime<Utc>> {
    local_datetime_to_utc(date.and_time(time), tz)
}

pub fn local_datetime_to_utc<Tz: TimeZone>(local: NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `[local midnight, next local midnight)` for `date`.
pub fn local_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<TimeRange> {
    let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
    let start = local_to_utc(date, midnight, tz)?;
    let end = local_to_utc(date.succ_opt()?, midnight, tz)?;
    Some(TimeRange::new(start, end))
}

/// Projects a weekday's working periods onto `date`.
pub fn open_ranges<Tz: TimeZone>(date: NaiveDate, tz: &Tz, working_hours: &WorkingHours) -> Vec<TimeRange> {
    working_hours
        .periods_for(date.weekday())
        .iter()
        .filter_map(|period: &TimePeriod| {
            let (open, close) = period.span_on(date);
            let start = local_datetime_to_utc(open, tz)?;
            let end = local_datetime_to_utc(close, tz)?;
            let range = TimeRange::new(start, end);
            (!range.is_empty()).then_some(range)
        })
        .collect()
}

/// Sorts and coalesces overlapping or touching ranges. Empty ranges are
/// dropped.
pub fn merge_ranges(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    ranges.retain(|r| !r.is_empty());
    ranges.sort();

    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// `base` minus `cut`, both as half-open ranges.
pub fn subtract_ranges(base: &[TimeRange], cut: &[TimeRange]) -> Vec<TimeRange> {
    let cut = merge_ranges(cut.to_vec());
    let mut remaining = Vec::new();

    for range in merge_ranges(base.to_vec()) {
        let mut cursor = range.start;
        for hole in cut.iter().filter(|hole| hole.overlaps(&range)) {
            if hole.start > cursor {
                remaining.push(TimeRange::new(cursor, hole.start));
            }
            cursor = cursor.max(hole.end);
        }
        if cursor < range.end {
            remaining.push(TimeRange::new(cursor, range.end));
        }
    }

    remaining
}

/// Starts on the `step` grid from `origin` where a `length` slot fits
/// entirely inside one of `available`.
pub fn slot_starts(
    origin: DateTime<Utc>,
    available: &[TimeRange],
    length: Duration,
    step: Duration,
) -> Vec<DateTime<Utc>> {
    let mut starts = Vec::new();
    if step < Duration::seconds(1) {
        return starts;
    }

    for range in available {
        let offset = range.start - origin;
        let steps = offset.num_seconds().div_euclid(step.num_seconds());
        let mut candidate = origin + step * steps as i32;
        if candidate < range.start {
            candidate += step;
        }

        while candidate + length <= range.end {
            starts.push(candidate);
            candidate += step;
        }
    }

    starts
}

/// Open, blocked and available time for one doctor on one local date.
///
/// `busy` holds ranges already taken by active appointments; `slot_length`
/// is the appointment length offered in `slot_starts`.
pub fn day_availability<Tz: TimeZone>(
    date: NaiveDate,
    tz: &Tz,
    doctor_id: Uuid,
    working_hours: &WorkingHours,
    engine: &ConflictDetectionService,
    busy: &[TimeRange],
    slot_length: Duration,
) -> DayAvailability {
    let Some(day) = local_day(date, tz) else {
        return DayAvailability {
            date,
            doctor_id,
            open: Vec::new(),
            blocked: Vec::new(),
            available: Vec::new(),
            slot_starts: Vec::new(),
        };
    };

    let open = open_ranges(date, tz, working_hours);

    let blocked = merge_ranges(
        engine
            .blocks_for_date_range(day.start, day.end, Some(doctor_id))
            .iter()
            .map(|block| block.range())
            .chain(busy.iter().copied())
            .filter_map(|range| range.intersection(&day))
            .collect(),
    );

    let available = subtract_ranges(&open, &blocked);
    let slot_starts = slot_starts(
        day.start,
        &available,
        slot_length,
        Duration::minutes(SLOT_STEP_MINUTES),
    );

    DayAvailability {
        date,
        doctor_id,
        open,
        blocked,
        available,
        slot_starts,
    }
}
