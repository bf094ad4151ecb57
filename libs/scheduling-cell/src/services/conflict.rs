// libs/scheduling-cell/src/services/conflict.rs
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{ScheduleBlock, TimeRange};

/// Bookability questions over a snapshot of schedule blocks.
///
/// The caller loads the blocks first; nothing here performs I/O, and the
/// answers are only as fresh as that snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetectionService {
    blocks: Vec<ScheduleBlock>,
}

impl ConflictDetectionService {
    pub fn new(blocks: Vec<ScheduleBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[ScheduleBlock] {
        &self.blocks
    }

    /// Whether any block for `doctor_id` (or any clinic-wide block) overlaps
    /// the candidate `[start, end)`.
    pub fn is_time_slot_blocked(
        &self,
        doctor_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> bool {
        self.first_blocking(doctor_id, &TimeRange::new(start, end)).is_some()
    }

    /// The first block, in snapshot order, that makes the candidate
    /// unbookable.
    pub fn first_blocking(
        &self,
        doctor_id: Option<Uuid>,
        candidate: &TimeRange,
    ) -> Option<&ScheduleBlock> {
        let found = self
            .blocks
            .iter()
            .find(|block| block.applies_to(doctor_id) && block.range().overlaps(candidate));

        if let Some(block) = found {
            debug!(
                "Candidate {} - {} blocked by schedule block {}",
                candidate.start, candidate.end, block.id
            );
        }
        found
    }

    /// Every block touching `[range_start, range_end]`, endpoints included.
    ///
    /// With a doctor filter, clinic-wide blocks are still returned. Without
    /// one, all blocks are returned. Snapshot order is preserved.
    pub fn blocks_for_date_range(
        &self,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        doctor_id: Option<Uuid>,
    ) -> Vec<ScheduleBlock> {
        let window = TimeRange::new(range_start, range_end);

        self.blocks
            .iter()
            .filter(|block| doctor_id.is_none() || block.applies_to(doctor_id))
            .filter(|block| block.range().touches(&window))
            .cloned()
            .collect()
    }
}
