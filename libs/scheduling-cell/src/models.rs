// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::supabase::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// TIME RANGES
// ==============================================================================

/// A span of absolute time. Conflict tests treat it as half-open
/// `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn starting_at(start: DateTime<Utc>, length: Duration) -> Self {
        Self { start, end: start + length }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Half-open overlap. Empty ranges overlap nothing, and ranges that only
    /// touch at an endpoint do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && self.end > other.start
    }

    /// Closed overlap, endpoints included. Used for calendar highlighting.
    pub fn touches(&self, other: &TimeRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        let clipped = TimeRange::new(self.start.max(other.start), self.end.min(other.end));
        (!clipped.is_empty()).then_some(clipped)
    }
}

// ==============================================================================
// SCHEDULE BLOCKS
// ==============================================================================

/// Unavailability for one doctor, or for the whole clinic when `doctor_id`
/// is unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleBlock {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ScheduleBlock {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    pub fn is_clinic_wide(&self) -> bool {
        self.doctor_id.is_none()
    }

    /// Clinic-wide blocks apply to everyone; doctor blocks only to their
    /// doctor. An absent `doctor_id` therefore only matches clinic-wide
    /// blocks.
    pub fn applies_to(&self, doctor_id: Option<Uuid>) -> bool {
        self.doctor_id.is_none() || self.doctor_id == doctor_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleBlockRequest {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleBlockPatch {
    pub doctor_id: Option<Uuid>,
    /// Turns the block into a clinic-wide block. Wins over `doctor_id`.
    #[serde(default)]
    pub clinic_wide: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl ScheduleBlockPatch {
    pub fn apply_to(&self, block: &ScheduleBlock) -> ScheduleBlock {
        let mut merged = block.clone();
        if self.clinic_wide {
            merged.doctor_id = None;
        } else if let Some(doctor_id) = self.doctor_id {
            merged.doctor_id = Some(doctor_id);
        }
        if let Some(start) = self.start_time {
            merged.start_time = start;
        }
        if let Some(end) = self.end_time {
            merged.end_time = end;
        }
        if let Some(reason) = &self.reason {
            merged.reason = Some(reason.clone());
        }
        merged
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleBlockQuery {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotCheckQuery {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub doctor_id: Uuid,
    /// Working-hours periods for the day.
    pub open: Vec<TimeRange>,
    /// Blocks and busy ranges clipped to the day, merged.
    pub blocked: Vec<TimeRange>,
    /// `open` minus `blocked`.
    pub available: Vec<TimeRange>,
    pub slot_starts: Vec<DateTime<Utc>>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ScheduleBlockError {
    #[error("Schedule block not found")]
    NotFound,

    #[error("Unauthorized access to schedule blocks")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for ScheduleBlockError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(_) => ScheduleBlockError::NotFound,
            DatabaseError::Auth(_) => ScheduleBlockError::Unauthorized,
            other => ScheduleBlockError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ScheduleBlockError> for AppError {
    fn from(e: ScheduleBlockError) -> Self {
        match e {
            ScheduleBlockError::NotFound => AppError::NotFound("Schedule block not found".to_string()),
            ScheduleBlockError::Unauthorized => {
                AppError::Forbidden("Unauthorized access to schedule blocks".to_string())
            }
            ScheduleBlockError::ValidationError(msg) => AppError::ValidationError(msg),
            ScheduleBlockError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
