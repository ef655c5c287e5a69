//! Port interfaces for the definition catalogue

use async_trait::async_trait;
use conduit_domain::{IntegrationEntityDefinition, IntegrationTypeDefinition, Result};

/// Source of the static integration catalogue
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn load_types(&self) -> Result<Vec<IntegrationTypeDefinition>>;

    async fn load_entities(&self) -> Result<Vec<IntegrationEntityDefinition>>;
}
