pub mod defaults;
pub mod fallback;
pub mod handler;

pub use defaults::GracefulDefault;
pub use fallback::{FallbackChain, FallbackResult, FallbackSource};
pub use handler::ErrorHandler;
