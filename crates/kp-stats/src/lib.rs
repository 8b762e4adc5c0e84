pub mod record;
pub mod stats;

pub use record::{extract, normalize, PracticeRecord, RecordKind};
pub use stats::{compute, MasteryBuckets, PracticeStatistics};
