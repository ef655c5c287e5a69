//! Payload validation, extraction and persistence

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use conduit_common::IngestionMetrics;
use conduit_domain::{
    ConduitError, FetchedEntityLog, IntegrationEntityDefinition, IntegrationUpdate, Result, UserIntegration,
};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::diff::{compute_diff, unique};
use super::ports::{EntityLogRepository, UpdateRepository};
use crate::definitions::declared_options;
use crate::extraction::{jsonpath, FieldExtractor, VariableEvaluator};

/// How a missing field value affects the item being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemMode {
    /// The payload is the item; a missing value drops it as incomplete.
    Single,
    /// One of many items; a missing value is omitted from its record.
    Multiple,
}

/// Turns a fetched or pushed payload into integration updates.
pub struct ProcessService {
    updates: Arc<dyn UpdateRepository>,
    entity_logs: Arc<dyn EntityLogRepository>,
    extractor: FieldExtractor,
    variables: VariableEvaluator,
    schemas: RwLock<HashMap<String, Arc<jsonschema::Validator>>>,
    metrics: Arc<IngestionMetrics>,
}

impl ProcessService {
    pub fn new(
        updates: Arc<dyn UpdateRepository>,
        entity_logs: Arc<dyn EntityLogRepository>,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            updates,
            entity_logs,
            extractor: FieldExtractor::default(),
            variables: VariableEvaluator::with_defaults(),
            schemas: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Replace the default extractor and variable set.
    #[must_use]
    pub fn with_extraction(mut self, extractor: FieldExtractor, variables: VariableEvaluator) -> Self {
        self.extractor = extractor;
        self.variables = variables;
        self
    }

    /// Validate `body` against the entity schema and store what it contains.
    ///
    /// Schema mismatches and per-item data problems are dropped silently;
    /// only malformed JSON, an uncompilable schema and storage failures are
    /// errors.
    pub async fn handle_integration_response(
        &self,
        definition: &IntegrationEntityDefinition,
        integration: &UserIntegration,
        body: &[u8],
        now: &DateTime<Tz>,
    ) -> Result<()> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|err| ConduitError::InvalidInput(format!("response is not valid JSON: {err}")))?;

        if let Some(validator) = self.validator(definition)? {
            if !validator.is_valid(&payload) {
                debug!(
                    integration_id = %integration.id,
                    entity = %definition.key(),
                    "Payload does not match schema, dropping"
                );
                self.metrics.record_schema_rejection();
                return Ok(());
            }
        }

        let options = declared_options(definition, &integration.options);

        let Some(multiple) = &definition.multiple else {
            return self.process_item(definition, integration, &options, &payload, now, ItemMode::Single).await;
        };

        let items = match jsonpath::select(multiple, &payload) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                warn!(path = %multiple, kind = %json_kind(&other), "Multiple path did not select an array");
                return Ok(());
            }
            Err(err) => {
                warn!(path = %multiple, error = %err, "Failed to get items in multiple path");
                return Ok(());
            }
        };

        if definition.log_settings.is_some() {
            self.handle_integration_log(definition, integration, &options, &payload, &items, now).await?;
        }

        for item in &items {
            self.process_item(definition, integration, &options, item, now, ItemMode::Multiple).await?;
        }
        Ok(())
    }

    /// Process one item, logging and skipping data errors.
    async fn process_item(
        &self,
        definition: &IntegrationEntityDefinition,
        integration: &UserIntegration,
        options: &HashMap<String, String>,
        item: &Value,
        now: &DateTime<Tz>,
        mode: ItemMode,
    ) -> Result<()> {
        match self.handle_item(definition, integration, options, item, now, mode).await {
            Err(ConduitError::Validation(message)) => {
                warn!(integration_id = %integration.id, error = %message, "Skipping item");
                Ok(())
            }
            other => other,
        }
    }

    async fn handle_item(
        &self,
        definition: &IntegrationEntityDefinition,
        integration: &UserIntegration,
        options: &HashMap<String, String>,
        item: &Value,
        now: &DateTime<Tz>,
        mode: ItemMode,
    ) -> Result<()> {
        let identifier = self.variables.evaluate_identifier(&definition.identifier, options, item, now)?;
        let timestamp = self.extract_timestamp(definition, item, now);

        let Some(data) = self.extract_fields(definition, integration, item, now, mode) else {
            debug!(integration_id = %integration.id, identifier = %identifier, "Item is incomplete, dropping");
            return Ok(());
        };

        self.upsert(integration, identifier, timestamp, data).await
    }

    /// Epoch milliseconds of the item; falls back to `now`.
    fn extract_timestamp(&self, definition: &IntegrationEntityDefinition, item: &Value, now: &DateTime<Tz>) -> i64 {
        match self.extractor.extract(&definition.timestamp, item, now) {
            Ok(Some(value)) => {
                #[allow(clippy::cast_possible_truncation)]
                let millis = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64));
                millis.unwrap_or_else(|| {
                    warn!(kind = %json_kind(&value), "Timestamp is not a number, using current time");
                    now.timestamp_millis()
                })
            }
            Ok(None) => {
                warn!(entity = %definition.key(), "Unable to extract timestamp, using current time");
                now.timestamp_millis()
            }
            Err(err) => {
                warn!(entity = %definition.key(), error = %err, "Failed to extract timestamp, using current time");
                now.timestamp_millis()
            }
        }
    }

    /// Mapped fields of `item`, keyed by destination id.
    ///
    /// `None` means the item is incomplete and must not be stored.
    fn extract_fields(
        &self,
        definition: &IntegrationEntityDefinition,
        integration: &UserIntegration,
        item: &Value,
        now: &DateTime<Tz>,
        mode: ItemMode,
    ) -> Option<Map<String, Value>> {
        let mut data = Map::new();
        for (remote_field, destination) in &integration.fields {
            let Some(field) = definition.fields.get(remote_field) else {
                warn!(entity = %definition.key(), field = %remote_field, "Field not found in definition");
                continue;
            };

            match self.extractor.extract(&field.path, item, now) {
                Ok(Some(value)) => {
                    data.insert(destination.clone(), value);
                }
                Ok(None) if mode == ItemMode::Single => return None,
                Ok(None) => {
                    debug!(field = %remote_field, "Field has no value, omitting");
                }
                Err(err) => {
                    warn!(entity = %definition.key(), field = %remote_field, error = %err, "Failed to get field");
                }
            }
        }
        Some(data)
    }

    /// Insert or overwrite the update for `(integration, identifier)`.
    async fn upsert(
        &self,
        integration: &UserIntegration,
        identifier: String,
        timestamp: i64,
        data: Map<String, Value>,
    ) -> Result<()> {
        self.updates.upsert(new_update(integration, identifier, timestamp, Some(data))).await?;
        self.metrics.record_update_upserted();
        Ok(())
    }

    /// Null out the update of an entity that disappeared upstream.
    async fn tombstone(&self, integration: &UserIntegration, identifier: String) -> Result<()> {
        let timestamp = Utc::now().timestamp_millis();
        self.updates.tombstone(new_update(integration, identifier, timestamp, None)).await?;
        self.metrics.record_tombstone();
        Ok(())
    }

    /// Reconcile the stored entity log with `items` and tombstone removals.
    async fn handle_integration_log(
        &self,
        definition: &IntegrationEntityDefinition,
        integration: &UserIntegration,
        options: &HashMap<String, String>,
        payload: &Value,
        items: &[Value],
        now: &DateTime<Tz>,
    ) -> Result<()> {
        let Some(log_settings) = &definition.log_settings else {
            return Ok(());
        };

        let identifiers = self
            .variables
            .evaluate_identifier(&log_settings.identifier, options, payload, now)
            .and_then(|log_identifier| {
                items
                    .iter()
                    .map(|item| self.variables.evaluate_identifier(&definition.identifier, options, item, now))
                    .collect::<Result<Vec<_>>>()
                    .map(|current| (log_identifier, current))
            });
        let (log_identifier, current) = match identifiers {
            Ok(identifiers) => identifiers,
            Err(ConduitError::Validation(message)) => {
                warn!(integration_id = %integration.id, error = %message, "Skipping entity log diff");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let Some(previous) = self.entity_logs.find(&integration.id, &log_identifier).await? else {
            self.entity_logs
                .insert(FetchedEntityLog {
                    integration_id: integration.id.clone(),
                    identifier: log_identifier,
                    entity_ids: unique(&current),
                })
                .await?;
            return Ok(());
        };

        let diff = compute_diff(&previous.entity_ids, &current);
        if !diff.removed.is_empty() {
            self.entity_logs.remove_entities(&integration.id, &log_identifier, &diff.removed).await?;
            for removed in diff.removed {
                debug!(integration_id = %integration.id, identifier = %removed, "Entity removed upstream");
                self.tombstone(integration, removed).await?;
            }
        }
        if !diff.added.is_empty() {
            self.entity_logs.add_entities(&integration.id, &log_identifier, &diff.added).await?;
        }
        Ok(())
    }

    /// Compiled schema of `definition`; `None` when it declares no schema.
    fn validator(&self, definition: &IntegrationEntityDefinition) -> Result<Option<Arc<jsonschema::Validator>>> {
        if definition.schema.is_null() {
            return Ok(None);
        }

        let key = definition.key();
        if let Some(validator) = self.schemas.read().get(&key) {
            return Ok(Some(Arc::clone(validator)));
        }

        let validator = jsonschema::validator_for(&definition.schema)
            .map(Arc::new)
            .map_err(|err| ConduitError::Validation(format!("failed to compile schema for `{key}`: {err}")))?;
        self.schemas.write().insert(key, Arc::clone(&validator));
        Ok(Some(validator))
    }
}

fn new_update(
    integration: &UserIntegration,
    identifier: String,
    timestamp: i64,
    data: Option<Map<String, Value>>,
) -> IntegrationUpdate {
    IntegrationUpdate {
        id: Uuid::now_v7().to_string(),
        user_id: integration.user_id.clone(),
        integration_id: integration.id.clone(),
        identifier,
        timestamp,
        data,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
