//! Database implementations

pub mod credentials_repository;
pub mod entity_log_repository;
pub mod manager;
pub mod sqlcipher_pool;
pub mod update_repository;
pub mod user_integration_repository;

pub use credentials_repository::*;
pub use entity_log_repository::*;
pub use manager::*;
pub use sqlcipher_pool::*;
pub use update_repository::*;
pub use user_integration_repository::*;
