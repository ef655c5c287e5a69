//! Persisted integration records

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user's subscription to one integration entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIntegration {
    pub id: String,
    pub user_id: String,
    pub integration_type: String,
    pub entity_type: String,
    pub form_id: String,
    /// Present only for entities with a push source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_token: Option<String>,
    /// Remote field key -> destination field id.
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub options: HashMap<String, Value>,
}

/// OAuth tokens held for one `(user, integration type)` pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationCredentials {
    pub id: String,
    pub user_id: String,
    pub integration_type: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token expiry in epoch milliseconds; `0` means unknown.
    pub expiry: i64,
}

impl std::fmt::Debug for IntegrationCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationCredentials")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("integration_type", &self.integration_type)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Entity ids last seen in a logical collection of one integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedEntityLog {
    pub integration_id: String,
    pub identifier: String,
    pub entity_ids: Vec<String>,
}

/// Latest extracted state of one remote entity.
///
/// `data == None` is a tombstone: the entity disappeared upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationUpdate {
    pub id: String,
    pub user_id: String,
    pub integration_id: String,
    pub identifier: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub data: Option<Map<String, Value>>,
}

impl IntegrationUpdate {
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.data.is_none()
    }
}
