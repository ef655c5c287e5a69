//! In-memory catalogue of integration definitions

use std::collections::HashMap;
use std::sync::Arc;

use conduit_domain::{
    definition_key, IntegrationEntityDefinition, IntegrationEntitySource, IntegrationTypeDefinition,
    PullSourceSettings, PushSourceSettings, Result, SourceKind, SourceSettings,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, warn};

use super::ports::DefinitionSource;

#[derive(Default)]
struct Catalogue {
    types: HashMap<String, Arc<IntegrationTypeDefinition>>,
    entities: HashMap<String, Arc<IntegrationEntityDefinition>>,
    pull_sources: HashMap<String, PullSourceSettings>,
    push_sources: HashMap<String, PushSourceSettings>,
}

/// Read-mostly lookup service over type and entity definitions.
///
/// Absent entries are `None`, never errors: a subscription may outlive its
/// definition and callers treat that as "not configured".
pub struct TypeRegistry {
    source: Arc<dyn DefinitionSource>,
    catalogue: RwLock<Catalogue>,
}

impl TypeRegistry {
    pub fn new(source: Arc<dyn DefinitionSource>) -> Self {
        Self { source, catalogue: RwLock::new(Catalogue::default()) }
    }

    /// Read every definition and rebuild the indices.
    pub async fn load(&self) -> Result<()> {
        let types = self.source.load_types().await?;
        let entities = self.source.load_entities().await?;

        let mut catalogue = Catalogue::default();
        for definition in types {
            catalogue.types.insert(definition.integration_type.clone(), Arc::new(definition));
        }

        for definition in entities {
            let key = definition.key();
            for source in &definition.sources {
                match source.kind {
                    SourceKind::Pull => {
                        if let Some(settings) = decode_source::<PullSourceSettings>(&key, source) {
                            catalogue.pull_sources.entry(key.clone()).or_insert(settings);
                        }
                    }
                    SourceKind::Push => {
                        if let Some(settings) = decode_source::<PushSourceSettings>(&key, source) {
                            catalogue.push_sources.entry(key.clone()).or_insert(settings);
                        }
                    }
                    SourceKind::Unknown => {
                        warn!(entity = %key, "Ignoring source of unknown type");
                    }
                }
            }
            catalogue.entities.insert(key, Arc::new(definition));
        }

        info!(
            types = catalogue.types.len(),
            entities = catalogue.entities.len(),
            pull_sources = catalogue.pull_sources.len(),
            push_sources = catalogue.push_sources.len(),
            "Integration definitions loaded"
        );
        *self.catalogue.write() = catalogue;
        Ok(())
    }

    pub fn get_integration_types(&self) -> Vec<Arc<IntegrationTypeDefinition>> {
        let mut types: Vec<_> = self.catalogue.read().types.values().cloned().collect();
        types.sort_by(|a, b| a.integration_type.cmp(&b.integration_type));
        types
    }

    pub fn get_integration_type(&self, integration_type: &str) -> Option<Arc<IntegrationTypeDefinition>> {
        self.catalogue.read().types.get(integration_type).cloned()
    }

    /// All entities grouped by integration type.
    pub fn get_integration_entities(&self) -> HashMap<String, Vec<Arc<IntegrationEntityDefinition>>> {
        let catalogue = self.catalogue.read();
        let mut grouped: HashMap<String, Vec<Arc<IntegrationEntityDefinition>>> = HashMap::new();
        for entity in catalogue.entities.values() {
            grouped.entry(entity.integration_type.clone()).or_default().push(Arc::clone(entity));
        }
        for entities in grouped.values_mut() {
            entities.sort_by(|a, b| a.entity_type.cmp(&b.entity_type));
        }
        grouped
    }

    pub fn get_integration_entity(
        &self,
        integration_type: &str,
        entity_type: &str,
    ) -> Option<Arc<IntegrationEntityDefinition>> {
        self.catalogue.read().entities.get(&definition_key(integration_type, entity_type)).cloned()
    }

    /// Decoded settings of the first source of `kind` declared by an entity.
    pub fn get_source_settings(
        &self,
        integration_type: &str,
        entity_type: &str,
        kind: SourceKind,
    ) -> Option<SourceSettings> {
        match kind {
            SourceKind::Pull => self.extract_pull_source(integration_type, entity_type).map(SourceSettings::Pull),
            SourceKind::Push => self.extract_push_source(integration_type, entity_type).map(SourceSettings::Push),
            SourceKind::Unknown => None,
        }
    }

    pub fn extract_pull_source(&self, integration_type: &str, entity_type: &str) -> Option<PullSourceSettings> {
        self.catalogue.read().pull_sources.get(&definition_key(integration_type, entity_type)).cloned()
    }

    pub fn extract_push_source(&self, integration_type: &str, entity_type: &str) -> Option<PushSourceSettings> {
        self.catalogue.read().push_sources.get(&definition_key(integration_type, entity_type)).cloned()
    }
}

fn decode_source<T: serde::de::DeserializeOwned>(key: &str, source: &IntegrationEntitySource) -> Option<T> {
    match serde_json::from_value(Value::Object(source.settings.clone())) {
        Ok(settings) => Some(settings),
        Err(err) => {
            warn!(entity = %key, kind = %source.kind, error = %err, "Discarding undecodable source settings");
            None
        }
    }
}
