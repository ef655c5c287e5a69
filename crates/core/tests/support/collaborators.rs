//! Mocks for the non-storage ports: user directory, HTTP, scheduler,
//! definitions and authentication.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::{
    AuthenticationMethod, AuthenticationMethodFactory, AuthorizationGrant, CronSchedule, DefinitionSource,
    FetchFailure, FetchResponse, HttpFetcher, JobScheduler, JobTask, TokenRefreshListener, UserDirectory,
};
use conduit_domain::{
    ConduitError, IntegrationCredentials, IntegrationEntityDefinition, IntegrationTypeDefinition,
    Result as DomainResult,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Directory answering from a fixed `user -> zone` table.
#[derive(Default, Clone)]
pub struct MockUserDirectory {
    zones: Arc<Mutex<HashMap<String, String>>>,
    batch_calls: Arc<AtomicUsize>,
}

impl MockUserDirectory {
    pub fn with_zone(self, user_id: &str, zone: &str) -> Self {
        self.zones.lock().insert(user_id.to_string(), zone.to_string());
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn get_user_time_zone(&self, user_id: &str) -> DomainResult<String> {
        self.zones
            .lock()
            .get(user_id)
            .cloned()
            .ok_or_else(|| ConduitError::NotFound(format!("user {user_id}")))
    }

    async fn get_users_time_zones(&self, user_ids: &[String]) -> DomainResult<HashMap<String, String>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let zones = self.zones.lock();
        Ok(user_ids.iter().filter_map(|id| zones.get(id).map(|zone| (id.clone(), zone.clone()))).collect())
    }
}

type FetchOutcome = Result<FetchResponse, FetchFailure>;

/// HTTP fetcher replaying queued outcomes; falls back to a default once the
/// queue is drained.
#[derive(Clone)]
pub struct MockHttpFetcher {
    queued: Arc<Mutex<VecDeque<FetchOutcome>>>,
    fallback: Arc<Mutex<FetchOutcome>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockHttpFetcher {
    pub fn ok(body: Value) -> Self {
        Self::with_fallback(Ok(FetchResponse { status: 200, body: body.to_string().into_bytes() }))
    }

    pub fn status(status: u16) -> Self {
        Self::with_fallback(Ok(FetchResponse { status, body: Vec::new() }))
    }

    pub fn failing(failure: FetchFailure) -> Self {
        Self::with_fallback(Err(failure))
    }

    fn with_fallback(fallback: FetchOutcome) -> Self {
        Self {
            queued: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(fallback)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn then(self, outcome: FetchOutcome) -> Self {
        self.queued.lock().push_back(outcome);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpFetcher for MockHttpFetcher {
    async fn get(&self, url: &str) -> FetchOutcome {
        self.requests.lock().push(url.to_string());
        let next = self.queued.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().clone())
    }
}

/// Job scheduler that records registrations and fires them on demand.
#[derive(Default, Clone)]
pub struct RecordingJobScheduler {
    cron: Arc<Mutex<Vec<(Uuid, CronSchedule, JobTask)>>>,
    once: Arc<Mutex<Vec<(Uuid, Duration, JobTask)>>>,
    removed: Arc<Mutex<Vec<Uuid>>>,
}

impl RecordingJobScheduler {
    pub fn cron_jobs(&self) -> Vec<(Uuid, CronSchedule)> {
        self.cron.lock().iter().map(|(id, schedule, _)| (*id, schedule.clone())).collect()
    }

    pub fn once_delays(&self) -> Vec<Duration> {
        self.once.lock().iter().map(|(_, delay, _)| *delay).collect()
    }

    pub fn removed(&self) -> Vec<Uuid> {
        self.removed.lock().clone()
    }

    /// Run the cron task registered as `job_id`.
    pub async fn fire(&self, job_id: Uuid) {
        let task = self.cron.lock().iter().find(|(id, _, _)| *id == job_id).map(|(_, _, task)| Arc::clone(task));
        if let Some(task) = task {
            task().await;
        }
    }

    /// Run and forget every pending one-shot task.
    pub async fn run_once_jobs(&self) {
        let tasks: Vec<JobTask> = self.once.lock().drain(..).map(|(_, _, task)| task).collect();
        for task in tasks {
            task().await;
        }
    }
}

#[async_trait]
impl JobScheduler for RecordingJobScheduler {
    async fn schedule_cron(&self, schedule: &CronSchedule, task: JobTask) -> DomainResult<Uuid> {
        let id = Uuid::new_v4();
        self.cron.lock().push((id, schedule.clone(), task));
        Ok(id)
    }

    async fn schedule_once(&self, delay: Duration, task: JobTask) -> DomainResult<Uuid> {
        let id = Uuid::new_v4();
        self.once.lock().push((id, delay, task));
        Ok(id)
    }

    async fn remove(&self, job_id: Uuid) -> DomainResult<()> {
        self.cron.lock().retain(|(id, _, _)| *id != job_id);
        self.removed.lock().push(job_id);
        Ok(())
    }
}

/// Definition source backed by JSON literals.
pub struct StaticDefinitionSource {
    types: Value,
    entities: Value,
}

impl StaticDefinitionSource {
    pub fn new(types: Value, entities: Value) -> Self {
        Self { types, entities }
    }
}

#[async_trait]
impl DefinitionSource for StaticDefinitionSource {
    async fn load_types(&self) -> DomainResult<Vec<IntegrationTypeDefinition>> {
        serde_json::from_value(self.types.clone()).map_err(|err| ConduitError::Config(err.to_string()))
    }

    async fn load_entities(&self) -> DomainResult<Vec<IntegrationEntityDefinition>> {
        serde_json::from_value(self.entities.clone()).map_err(|err| ConduitError::Config(err.to_string()))
    }
}

/// Authentication method whose callback grants fixed tokens and whose
/// clients are a shared [`MockHttpFetcher`].
pub struct MockAuthenticationMethod {
    pub redirect_url: String,
    pub client: MockHttpFetcher,
    pub listener: Arc<dyn TokenRefreshListener>,
}

#[async_trait]
impl AuthenticationMethod for MockAuthenticationMethod {
    fn generate_redirect_url(&self, user_id: &str) -> DomainResult<String> {
        Ok(format!("https://provider.test/authorize?state={user_id}&redirect_uri={}", self.redirect_url))
    }

    async fn handle_callback(&self, code: &str, state: &str) -> DomainResult<AuthorizationGrant> {
        if code.is_empty() {
            return Err(ConduitError::Auth("missing code".into()));
        }
        Ok(AuthorizationGrant {
            user_id: state.to_string(),
            access_token: format!("access-{code}"),
            refresh_token: format!("refresh-{code}"),
            expiry: 1_700_000_000_000,
        })
    }

    fn create_client(&self, _credentials: &IntegrationCredentials) -> DomainResult<Arc<dyn HttpFetcher>> {
        Ok(Arc::new(self.client.clone()))
    }
}

/// Factory producing [`MockAuthenticationMethod`]s; remembers what it built.
#[derive(Clone)]
pub struct MockAuthenticationFactory {
    pub client: MockHttpFetcher,
    pub created: Arc<Mutex<Vec<(Map<String, Value>, String)>>>,
    pub listeners: Arc<Mutex<Vec<Arc<dyn TokenRefreshListener>>>>,
}

impl MockAuthenticationFactory {
    pub fn new(client: MockHttpFetcher) -> Self {
        Self { client, created: Arc::default(), listeners: Arc::default() }
    }
}

impl AuthenticationMethodFactory for MockAuthenticationFactory {
    fn create(
        &self,
        settings: &Map<String, Value>,
        redirect_url: &str,
        listener: Arc<dyn TokenRefreshListener>,
    ) -> DomainResult<Arc<dyn AuthenticationMethod>> {
        if settings.get("invalid").is_some() {
            return Err(ConduitError::Config("invalid oauth settings".into()));
        }
        self.created.lock().push((settings.clone(), redirect_url.to_string()));
        self.listeners.lock().push(Arc::clone(&listener));
        Ok(Arc::new(MockAuthenticationMethod {
            redirect_url: redirect_url.to_string(),
            client: self.client.clone(),
            listener,
        }))
    }
}
