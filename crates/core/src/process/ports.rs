//! Port interfaces for processed integration data

use async_trait::async_trait;
use conduit_domain::{FetchedEntityLog, IntegrationUpdate, Result};

/// Storage of integration updates, unique per `(integration_id, identifier)`.
#[async_trait]
pub trait UpdateRepository: Send + Sync {
    async fn find_by_integration_and_identifier(
        &self,
        integration_id: &str,
        identifier: &str,
    ) -> Result<Option<IntegrationUpdate>>;

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<IntegrationUpdate>>;

    async fn insert(&self, update: IntegrationUpdate) -> Result<()>;

    /// Overwrite data and timestamp; returns `false` if `update.id` is unknown.
    async fn update(&self, update: IntegrationUpdate) -> Result<bool>;

    /// Atomically store `update`, or overwrite data and timestamp of the row
    /// already held for its `(integration_id, identifier)`.
    async fn upsert(&self, update: IntegrationUpdate) -> Result<()>;

    /// Atomically null out the data of the row for `(integration_id,
    /// identifier)`, storing `update` as a tombstone if there is none.
    async fn tombstone(&self, update: IntegrationUpdate) -> Result<()>;

    async fn delete_by_ids_and_user(&self, ids: &[String], user_id: &str) -> Result<u64>;

    async fn delete_by_user(&self, user_id: &str) -> Result<u64>;

    async fn delete_by_integration(&self, integration_id: &str) -> Result<u64>;
}

/// Storage of the entity id sets used for deletion diffing.
#[async_trait]
pub trait EntityLogRepository: Send + Sync {
    async fn find(&self, integration_id: &str, identifier: &str) -> Result<Option<FetchedEntityLog>>;

    async fn insert(&self, log: FetchedEntityLog) -> Result<()>;

    /// Append ids not already present.
    async fn add_entities(&self, integration_id: &str, identifier: &str, entity_ids: &[String]) -> Result<()>;

    /// Drop ids if present.
    async fn remove_entities(&self, integration_id: &str, identifier: &str, entity_ids: &[String]) -> Result<()>;

    async fn delete_by_integration_ids(&self, integration_ids: &[String]) -> Result<u64>;
}
