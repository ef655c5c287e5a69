//! User integrations and webhook intake

pub mod ports;
pub mod service;
pub mod webhook;

pub use ports::{IntegrationLifecycleListener, UserIntegrationRepository};
pub use service::{NewUserIntegration, UserIntegrationService};
pub use webhook::WebhookService;
