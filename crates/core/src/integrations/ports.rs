//! Port interfaces for user integrations

use async_trait::async_trait;
use conduit_domain::{Result, UserIntegration};

/// Storage of users' integration subscriptions
#[async_trait]
pub trait UserIntegrationRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<UserIntegration>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<UserIntegration>>;

    async fn find_by_id_and_user(&self, id: &str, user_id: &str) -> Result<Option<UserIntegration>>;

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<UserIntegration>>;

    async fn find_by_webhook_token(&self, token: &str) -> Result<Option<UserIntegration>>;

    async fn insert(&self, integration: UserIntegration) -> Result<()>;

    /// Replace fields and options; returns `false` if the id is unknown.
    async fn update(&self, integration: UserIntegration) -> Result<bool>;

    async fn delete_by_id_and_user(&self, id: &str, user_id: &str) -> Result<bool>;

    async fn delete_by_user(&self, user_id: &str) -> Result<u64>;
}

/// Reacts to integrations being created or deleted.
///
/// Listeners are fixed when the service is composed and are notified in
/// registration order.
#[async_trait]
pub trait IntegrationLifecycleListener: Send + Sync {
    async fn on_integration_created(&self, _integration: &UserIntegration) -> Result<()> {
        Ok(())
    }

    async fn on_integration_deleted(&self, _integration: &UserIntegration) -> Result<()> {
        Ok(())
    }
}
