// Infrastructure layer modules
pub mod config;
pub mod logging;
pub mod retry_policy;
pub mod user_repository;

// Re-exports
pub use config::{DynamoDbConfig, DynamoDbConfigError};
pub use logging::init_logging;
pub use retry_policy::{RetryPolicy, RetryableError};
pub use user_repository::{DynamoUserStore, UserStore, UserStoreError};
