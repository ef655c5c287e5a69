//! Integration definition catalogue types
//!
//! Definitions are static configuration: which external services exist, how
//! users authenticate against them, and how each entity exposed by a service
//! is fetched, validated and mapped onto user fields.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A family of entities sharing one external service and one auth setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationTypeDefinition {
    pub integration_type: String,
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub authentication: Option<IntegrationAuthentication>,
}

/// Authentication strategy name plus its free-form settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationAuthentication {
    pub method: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// One fetchable/pushable entity of an integration type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationEntityDefinition {
    pub entity_type: String,
    pub name: String,
    pub integration_type: String,
    #[serde(default)]
    pub sources: Vec<IntegrationEntitySource>,
    pub identifier: String,
    pub timestamp: ExtractionPath,
    /// JSON-path selecting an array of items; absent means single-item mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<String>,
    #[serde(default)]
    pub history: Option<HistoryOptions>,
    #[serde(default)]
    pub fields: HashMap<String, IntegrationEntityField>,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub log_settings: Option<IntegrationEntityLogSettings>,
    #[serde(default)]
    pub options: HashMap<String, IntegrationOption>,
}

impl IntegrationEntityDefinition {
    /// Cache key shared by schema and source lookups: `"<type>:<entity>"`.
    #[must_use]
    pub fn key(&self) -> String {
        definition_key(&self.integration_type, &self.entity_type)
    }
}

/// Composite key used for per-entity lookups.
#[must_use]
pub fn definition_key(integration_type: &str, entity_type: &str) -> String {
    format!("{integration_type}:{entity_type}")
}

/// Kind of data source attached to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pull,
    Push,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pull => write!(f, "pull"),
            Self::Push => write!(f, "push"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Raw source entry; settings are decoded per kind by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEntitySource {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// Decoded settings of a pull source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullSourceSettings {
    /// URL template with `[VARIABLE]` placeholders.
    pub url: String,
    pub interval: FetchInterval,
}

/// Cron schedule plus random start delay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchInterval {
    /// Six-field cron expression (seconds first); empty disables scheduling.
    #[serde(default)]
    pub cron: String,
    /// Upper bound of the random start delay, in minutes.
    #[serde(default)]
    pub jitter: u32,
}

/// Decoded settings of a push (webhook) source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSourceSettings {}

/// Decoded source settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSettings {
    Pull(PullSourceSettings),
    Push(PushSourceSettings),
}

/// Backfill endpoint for historical fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOptions {
    pub url: String,
}

/// A remote field the user can map onto one of their own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEntityField {
    pub name: String,
    pub path: ExtractionPath,
}

/// Identifies the "collection" used for deletion diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationEntityLogSettings {
    pub identifier: String,
}

/// A user-configurable option declared by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationOption {
    #[serde(rename = "type")]
    pub option_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// How a value is pulled out of a payload.
///
/// In definition files a bare string is an expression, while an object with
/// a `"$<op>"` key names an aggregator and carries its arguments:
///
/// ```json
/// { "path": "$.distance" }
/// { "path": { "$sum": "$.laps[*].distance" } }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionPath {
    Expression(String),
    Aggregate { operator: String, args: Value },
}

impl<'de> Deserialize<'de> for ExtractionPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(expression) => Ok(Self::Expression(expression)),
            Value::Object(map) => map
                .into_iter()
                .find_map(|(key, args)| {
                    key.strip_prefix('$')
                        .map(|operator| Self::Aggregate { operator: operator.to_string(), args })
                })
                .ok_or_else(|| de::Error::custom("extraction object has no `$` operator key")),
            other => Err(de::Error::custom(format!(
                "extraction path must be a string or an operator object, got {other}"
            ))),
        }
    }
}

impl Serialize for ExtractionPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Expression(expression) => serializer.serialize_str(expression),
            Self::Aggregate { operator, args } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&format!("${operator}"), args)?;
                map.end()
            }
        }
    }
}
