use chrono::{Datelike, NaiveDateTime, Weekday};

use crate::models::{hhmm, DoctorError, TimePeriod, WorkingHours};

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl WorkingHours {
    /// Checks the authoring invariants: every period has `start < end`, and
    /// a day's periods are chronological and non-overlapping.
    ///
    /// Readers never call this; stored hours are taken as they are.
    pub fn validate(&self) -> Result<(), DoctorError> {
        for weekday in WEEKDAYS {
            validate_day(weekday, self.periods_for(weekday))?;
        }
        Ok(())
    }

    /// True when the local interval `[start, end)` lies inside one period of
    /// the weekday `start` falls on. A period closing at `24:00` admits a slot
    /// ending at the next midnight.
    pub fn covers(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        if start >= end {
            return false;
        }

        self.periods_for(start.weekday()).iter().any(|period| {
            let (open, close) = period.span_on(start.date());
            open <= start && end <= close
        })
    }
}

fn validate_day(weekday: Weekday, periods: &[TimePeriod]) -> Result<(), DoctorError> {
    for period in periods {
        let (start, end) = period.offsets();
        if start >= end {
            return Err(DoctorError::ValidationError(format!(
                "{}: period {} must start before it ends",
                weekday_name(weekday),
                describe(period)
            )));
        }
    }

    for pair in periods.windows(2) {
        if pair[1].offsets().0 < pair[0].offsets().1 {
            return Err(DoctorError::ValidationError(format!(
                "{}: period {} overlaps or precedes {}",
                weekday_name(weekday),
                describe(&pair[1]),
                describe(&pair[0])
            )));
        }
    }

    Ok(())
}

fn describe(period: &TimePeriod) -> String {
    format!("{}-{}", period.start.format("%H:%M"), hhmm::format_end(&period.end))
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
