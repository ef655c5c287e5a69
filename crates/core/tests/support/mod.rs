//! Shared test helpers for `conduit-core` integration tests.
//!
//! These helpers provide an in-memory catalogue, lightweight port mocks and a
//! fully wired [`Harness`] so tests can focus on behaviour instead of
//! boilerplate.

#![allow(dead_code)]

pub mod collaborators;
pub mod repositories;

use std::collections::HashMap;
use std::sync::Arc;

use collaborators::{
    MockAuthenticationFactory, MockHttpFetcher, MockUserDirectory, RecordingJobScheduler, StaticDefinitionSource,
};
use conduit_common::IngestionMetrics;
use conduit_core::{
    AuthService, AuthenticationMethodRegistry, EventDispatcher, FetchService, ProcessService, SchedulerService,
    TypeRegistry, UpdateService, UserIntegrationService, WebhookService,
};
use conduit_domain::{FetchConfig, IntegrationCredentials, IntegrationUpdate, SchedulerConfig, UserIntegration};
use repositories::{
    MockCredentialsRepository, MockEntityLogRepository, MockUpdateRepository, MockUserIntegrationRepository,
};
use serde_json::{json, Value};

pub const USER: &str = "user-1";
pub const ZONE: &str = "Europe/Amsterdam";

/// Integration types: `public` (no auth) and `oura` (oauth).
pub fn catalogue_types() -> Value {
    json!([
        {"integrationType": "public", "name": "Public data"},
        {
            "integrationType": "oura",
            "name": "Oura",
            "authentication": {"method": "oauth", "settings": {"clientId": "client"}}
        }
    ])
}

/// Entities:
/// - `public:weather`: single-item pull source with an option and a schema
/// - `oura:sleep`: multi-item pull source with history and log diffing
/// - `oura:tag`: push-only source
pub fn catalogue_entities() -> Value {
    json!([
        {
            "entityType": "weather",
            "name": "Weather",
            "integrationType": "public",
            "sources": [{"type": "pull", "settings": {
                "url": "https://weather.test/daily?date=[DATE]&city=[CITY]",
                "interval": {"cron": "0 0 6 * * *", "jitter": 0}
            }}],
            "identifier": "weather-[CITY]",
            "timestamp": {"$current_time": null},
            "fields": {
                "temperature": {"name": "Temperature", "path": "$.temperature"},
                "summary": {"name": "Summary", "path": "$.summary"}
            },
            "schema": {"type": "object", "required": ["temperature"]},
            "options": {"CITY": {"type": "string", "name": "City"}}
        },
        {
            "entityType": "sleep",
            "name": "Sleep",
            "integrationType": "oura",
            "sources": [{"type": "pull", "settings": {
                "url": "https://oura.test/sleep?start=[DATE]",
                "interval": {"cron": "0 0 * * * *", "jitter": 0}
            }}],
            "history": {"url": "https://oura.test/sleep?start=[START]&end=[END]"},
            "multiple": "$.data",
            "logSettings": {"identifier": "sleep"},
            "identifier": "$.id",
            "timestamp": {"$date": "$.day"},
            "fields": {
                "minutes": {"name": "Minutes", "path": {"$div": ["$.duration", 60]}},
                "score": {"name": "Score", "path": "$.score"}
            },
            "schema": {"type": "object", "required": ["data"], "properties": {"data": {"type": "array"}}}
        },
        {
            "entityType": "tag",
            "name": "Tag",
            "integrationType": "oura",
            "sources": [{"type": "push"}],
            "identifier": "$.id",
            "timestamp": "$.ts",
            "fields": {"note": {"name": "Note", "path": "$.note"}}
        }
    ])
}

pub fn integration(id: &str, integration_type: &str, entity_type: &str, fields: &[(&str, &str)]) -> UserIntegration {
    UserIntegration {
        id: id.to_string(),
        user_id: USER.to_string(),
        integration_type: integration_type.to_string(),
        entity_type: entity_type.to_string(),
        form_id: "form-1".to_string(),
        webhook_token: None,
        fields: fields.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        options: HashMap::new(),
    }
}

pub fn weather_integration() -> UserIntegration {
    let mut weather = integration("weather-1", "public", "weather", &[("temperature", "q-temp"), ("summary", "q-sum")]);
    weather.options.insert("CITY".into(), json!("Den Haag"));
    weather
}

pub fn sleep_integration() -> UserIntegration {
    integration("sleep-1", "oura", "sleep", &[("minutes", "q-min"), ("score", "q-score")])
}

pub fn tag_integration(token: &str) -> UserIntegration {
    let mut tag = integration("tag-1", "oura", "tag", &[("note", "q-note")]);
    tag.webhook_token = Some(token.to_string());
    tag
}

pub fn oura_credentials() -> IntegrationCredentials {
    IntegrationCredentials {
        id: "cred-1".into(),
        user_id: USER.into(),
        integration_type: "oura".into(),
        access_token: "access-0".into(),
        refresh_token: "refresh-0".into(),
        expiry: 0,
    }
}

/// Builder for a [`Harness`]
pub struct HarnessBuilder {
    integrations: Vec<UserIntegration>,
    credentials: Vec<IntegrationCredentials>,
    updates: Vec<IntegrationUpdate>,
    directory: MockUserDirectory,
    http: MockHttpFetcher,
    auth_client: MockHttpFetcher,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            integrations: Vec::new(),
            credentials: Vec::new(),
            updates: Vec::new(),
            directory: MockUserDirectory::default().with_zone(USER, ZONE),
            http: MockHttpFetcher::status(404),
            auth_client: MockHttpFetcher::status(404),
        }
    }
}

impl HarnessBuilder {
    pub fn integration(mut self, integration: UserIntegration) -> Self {
        self.integrations.push(integration);
        self
    }

    pub fn credentials(mut self, credentials: IntegrationCredentials) -> Self {
        self.credentials.push(credentials);
        self
    }

    pub fn update(mut self, update: IntegrationUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn directory(mut self, directory: MockUserDirectory) -> Self {
        self.directory = directory;
        self
    }

    /// Client used for unauthenticated types.
    pub fn http(mut self, http: MockHttpFetcher) -> Self {
        self.http = http;
        self
    }

    /// Client handed out by the oauth mock.
    pub fn auth_client(mut self, client: MockHttpFetcher) -> Self {
        self.auth_client = client;
        self
    }

    pub async fn build(self) -> Harness {
        let integrations = MockUserIntegrationRepository::new(self.integrations);
        let credentials = MockCredentialsRepository::new(self.credentials);
        let updates = MockUpdateRepository::new(self.updates);
        let entity_logs = MockEntityLogRepository::default();
        let jobs = RecordingJobScheduler::default();
        let metrics = Arc::new(IngestionMetrics::new());

        let registry = Arc::new(TypeRegistry::new(Arc::new(StaticDefinitionSource::new(
            catalogue_types(),
            catalogue_entities(),
        ))));
        registry.load().await.expect("catalogue loads");

        let auth_factory = MockAuthenticationFactory::new(self.auth_client.clone());
        let mut factories = AuthenticationMethodRegistry::new();
        factories.register("oauth", auth_factory.clone());
        let auth = Arc::new(AuthService::new(
            Arc::clone(&registry),
            Arc::new(credentials.clone()),
            factories,
            "https://conduit.test/",
        ));
        auth.load().await.expect("authentication loads");

        let process =
            Arc::new(ProcessService::new(Arc::new(updates.clone()), Arc::new(entity_logs.clone()), Arc::clone(&metrics)));
        let fetch = Arc::new(FetchService::new(
            Arc::clone(&registry),
            Arc::clone(&auth),
            Arc::clone(&process),
            Arc::new(self.directory.clone()),
            Arc::new(self.http.clone()),
            FetchConfig::default(),
            Arc::clone(&metrics),
        ));
        let scheduler = SchedulerService::new(
            Arc::clone(&registry),
            Arc::clone(&fetch),
            Arc::new(integrations.clone()),
            Arc::new(self.directory.clone()),
            Arc::new(jobs.clone()),
            &SchedulerConfig::default(),
            Arc::clone(&metrics),
        );
        let update_service = Arc::new(UpdateService::new(Arc::new(updates.clone())));
        let user_integrations = Arc::new(
            UserIntegrationService::new(
                Arc::clone(&registry),
                Arc::new(integrations.clone()),
                Arc::new(entity_logs.clone()),
                Arc::clone(&fetch),
            )
            .with_listener(scheduler.clone())
            .with_listener(update_service.clone()),
        );
        let webhooks = WebhookService::new(
            Arc::clone(&registry),
            Arc::new(integrations.clone()),
            Arc::clone(&fetch),
            Arc::clone(&process),
        );
        let events = EventDispatcher::new(
            Arc::clone(&user_integrations),
            Arc::clone(&scheduler),
            Arc::clone(&auth),
            Arc::clone(&update_service),
        );

        Harness {
            integrations,
            credentials,
            updates,
            entity_logs,
            directory: self.directory,
            http: self.http,
            auth_client: self.auth_client,
            auth_factory,
            jobs,
            metrics,
            registry,
            auth,
            process,
            fetch,
            scheduler,
            update_service,
            user_integrations,
            webhooks,
            events,
        }
    }
}

/// Every core service wired against in-memory mocks.
pub struct Harness {
    pub integrations: MockUserIntegrationRepository,
    pub credentials: MockCredentialsRepository,
    pub updates: MockUpdateRepository,
    pub entity_logs: MockEntityLogRepository,
    pub directory: MockUserDirectory,
    pub http: MockHttpFetcher,
    pub auth_client: MockHttpFetcher,
    pub auth_factory: MockAuthenticationFactory,
    pub jobs: RecordingJobScheduler,
    pub metrics: Arc<IngestionMetrics>,
    pub registry: Arc<TypeRegistry>,
    pub auth: Arc<AuthService>,
    pub process: Arc<ProcessService>,
    pub fetch: Arc<FetchService>,
    pub scheduler: Arc<SchedulerService>,
    pub update_service: Arc<UpdateService>,
    pub user_integrations: Arc<UserIntegrationService>,
    pub webhooks: WebhookService,
    pub events: EventDispatcher,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }
}
