pub mod availability;
pub mod blocks;
pub mod conflict;

pub use blocks::{ScheduleBlockService, ScheduleBlockStore, SupabaseScheduleBlockStore};
pub use conflict::ConflictDetectionService;
