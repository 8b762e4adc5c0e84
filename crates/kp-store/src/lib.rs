pub mod error;
pub mod filters;
pub mod pool;
pub mod postgres_repository;
pub mod repository;

pub use error::{classify, StoreError};
pub use filters::KnowledgePointFilter;
pub use pool::{HealthStatus, Pool, PoolLifecycle};
pub use postgres_repository::PostgresKnowledgeRepository;
pub use repository::{RepoStatistics, Repository};
