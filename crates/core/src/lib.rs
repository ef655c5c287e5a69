//! # Conduit Core
//!
//! Integration ingestion engine - no infrastructure dependencies.
//!
//! This crate contains:
//! - Extraction: variables, JSON-path, expressions, aggregators
//! - Definition registry
//! - Authentication, fetch, process and scheduler services
//! - User integration, webhook and update services
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `conduit-common` and `conduit-domain`
//! - No database, HTTP, or scheduler runtime code
//! - All external dependencies via traits

pub mod auth;
pub mod definitions;
pub mod events;
pub mod extraction;
pub mod fetch;
pub mod integrations;
pub mod process;
pub mod scheduling;
pub mod updates;

// Re-export specific items to avoid ambiguity
pub use auth::{
    AuthService, AuthenticationMethod, AuthenticationMethodFactory, AuthenticationMethodRegistry, AuthorizationGrant,
    CredentialsRepository, TokenRefresh, TokenRefreshListener,
};
pub use definitions::{DefinitionSource, TypeRegistry};
pub use events::{EventDispatcher, IntegrationEvent};
pub use extraction::{AggregatorRegistry, FieldExtractor, PathAggregator, VariableContext, VariableEvaluator};
pub use fetch::{FetchFailure, FetchResponse, FetchService, HttpFetcher, UserDirectory};
pub use integrations::{
    IntegrationLifecycleListener, NewUserIntegration, UserIntegrationRepository, UserIntegrationService,
    WebhookService,
};
pub use process::{EntityLogRepository, ProcessService, UpdateRepository};
pub use scheduling::{job_task, CronSchedule, JobScheduler, JobTask, SchedulerService};
pub use updates::UpdateService;
