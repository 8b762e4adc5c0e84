pub mod category;
pub mod subtype;

pub use category::{ErrorCategory, Severity};
pub use subtype::{advice_for, all_subtypes, classify, ErrorSubtype};
