pub mod knowledge_point;
pub mod scheduler;
pub mod value_objects;

pub use knowledge_point::{EditError, EditableSnapshot, KnowledgePoint, VersionHistoryEntry, EDITABLE_FIELDS};
pub use scheduler::{compute_next_review, is_due_for_review, priority_tier, review_priority_score, PriorityTier};
pub use value_objects::{OriginalError, ReviewExample};
