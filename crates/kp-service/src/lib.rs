pub mod daily_limit;
pub mod grading;
pub mod recommendations;
pub mod service;

pub use daily_limit::{DailyBreakdown, DailyLimitGovernor, LimitStatus, UserSettings};
pub use grading::{ErrorAnalysisItem, Grading, PracticeMode};
pub use recommendations::Recommendations;
pub use service::{KnowledgeService, MistakeEffect, MistakeOutcome, PurgeReport};
