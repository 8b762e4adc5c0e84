//! Shared foundations for the knowledge engine: the unified error shape,
//! environment-sourced settings, and ambient logging setup.

pub mod error;
pub mod logging;
pub mod settings;

pub use error::{ErrorCategory, ErrorSeverity, Result, UnifiedError};
pub use settings::{DatabaseSettings, Environment, LogFormat, LogSettings, Settings};
