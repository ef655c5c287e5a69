//! Cross-service notifications
//!
//! Messages arrive as `(key, value)` pairs. `timezoneChange` carries
//! `"<userId>:<timezone>"`, `userDeleted` carries the user id; other keys are
//! ignored.

use std::sync::Arc;

use conduit_domain::constants::{EVENT_TIMEZONE_CHANGE, EVENT_USER_DELETED};
use conduit_domain::{ConduitError, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::auth::AuthService;
use crate::integrations::UserIntegrationService;
use crate::scheduling::SchedulerService;
use crate::updates::UpdateService;

/// A notification this service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationEvent {
    TimezoneChange { user_id: String, timezone: String },
    UserDeleted { user_id: String },
}

impl IntegrationEvent {
    /// Decode a bus message; `Ok(None)` for keys this service does not handle.
    pub fn parse(key: &str, value: &str) -> Result<Option<Self>> {
        match key {
            EVENT_TIMEZONE_CHANGE => {
                let parts: Vec<&str> = value.split(':').collect();
                let [user_id, timezone] = parts.as_slice() else {
                    return Err(ConduitError::InvalidInput(format!("invalid timezone change event: {value}")));
                };
                Ok(Some(Self::TimezoneChange { user_id: (*user_id).to_string(), timezone: (*timezone).to_string() }))
            }
            EVENT_USER_DELETED => Ok(Some(Self::UserDeleted { user_id: value.to_string() })),
            _ => Ok(None),
        }
    }
}

/// Routes events to the services that own the affected state.
pub struct EventDispatcher {
    integrations: Arc<UserIntegrationService>,
    scheduler: Arc<SchedulerService>,
    auth: Arc<AuthService>,
    updates: Arc<UpdateService>,
}

impl EventDispatcher {
    pub fn new(
        integrations: Arc<UserIntegrationService>,
        scheduler: Arc<SchedulerService>,
        auth: Arc<AuthService>,
        updates: Arc<UpdateService>,
    ) -> Self {
        Self { integrations, scheduler, auth, updates }
    }

    pub async fn dispatch(&self, event: IntegrationEvent) -> Result<()> {
        match event {
            IntegrationEvent::TimezoneChange { user_id, timezone } => {
                let integrations = self.integrations.get_by_user(&user_id).await?;
                self.scheduler.reschedule_integrations(&integrations, &timezone).await
            }
            IntegrationEvent::UserDeleted { user_id } => {
                self.integrations.on_user_deleted(&user_id).await?;
                self.auth.on_user_deleted(&user_id).await?;
                self.updates.on_user_deleted(&user_id).await
            }
        }
    }

    /// Parse and dispatch one raw message, logging anything that goes wrong.
    pub async fn handle_message(&self, key: &str, value: &str) {
        let event = match IntegrationEvent::parse(key, value) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(key, "Ignoring event");
                return;
            }
            Err(err) => {
                warn!(key, error = %err, "Skipping malformed event");
                return;
            }
        };

        if let Err(err) = self.dispatch(event).await {
            error!(key, error = %err, "Failed to handle event");
        }
    }

    /// Consume messages until every sender is dropped.
    pub async fn run(&self, mut messages: mpsc::Receiver<(String, String)>) {
        info!("Event dispatcher started");
        while let Some((key, value)) = messages.recv().await {
            self.handle_message(&key, &value).await;
        }
        info!("Event dispatcher stopped");
    }
}
