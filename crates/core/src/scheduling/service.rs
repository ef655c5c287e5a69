//! Per-integration recurring fetch jobs
//!
//! Every pull-capable user integration gets one cron job evaluated in the
//! owner's time zone. A run is pushed back by a random jitter, then re-reads
//! the integration and pulls it; a fetch failure earns one delayed retry.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use conduit_common::IngestionMetrics;
use conduit_domain::constants::JITTER_UNIT_SECS;
use conduit_domain::{ConduitError, PullSourceSettings, Result, SchedulerConfig, UserIntegration};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::ports::{job_task, CronSchedule, JobScheduler, JobTask};
use crate::definitions::TypeRegistry;
use crate::fetch::{FetchService, UserDirectory};
use crate::integrations::ports::{IntegrationLifecycleListener, UserIntegrationRepository};

/// Scheduler service
pub struct SchedulerService {
    this: Weak<Self>,
    registry: Arc<TypeRegistry>,
    fetch: Arc<FetchService>,
    integrations: Arc<dyn UserIntegrationRepository>,
    directory: Arc<dyn UserDirectory>,
    scheduler: Arc<dyn JobScheduler>,
    retry_delay: Duration,
    metrics: Arc<IngestionMetrics>,
    /// Integration id -> job handle. Rebuilt by [`SchedulerService::load`].
    jobs: Mutex<HashMap<String, Uuid>>,
}

impl SchedulerService {
    pub fn new(
        registry: Arc<TypeRegistry>,
        fetch: Arc<FetchService>,
        integrations: Arc<dyn UserIntegrationRepository>,
        directory: Arc<dyn UserDirectory>,
        scheduler: Arc<dyn JobScheduler>,
        config: &SchedulerConfig,
        metrics: Arc<IngestionMetrics>,
    ) -> Arc<Self> {
        let retry_delay = Duration::from_secs(config.retry_delay_seconds);
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registry,
            fetch,
            integrations,
            directory,
            scheduler,
            retry_delay,
            metrics,
            jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Schedule every stored integration that has a pull source.
    ///
    /// Time zones of all owners are resolved with a single directory call.
    pub async fn load(&self) -> Result<()> {
        let integrations = self.integrations.find_all().await?;
        if integrations.is_empty() {
            info!("No integrations to schedule");
            return Ok(());
        }

        let user_ids: Vec<String> =
            integrations.iter().map(|i| i.user_id.clone()).collect::<BTreeSet<_>>().into_iter().collect();
        let zones = self.directory.get_users_time_zones(&user_ids).await?;

        let mut scheduled = 0usize;
        for integration in &integrations {
            let Some(zone) = zones.get(&integration.user_id) else {
                debug!(user_id = %integration.user_id, "No time zone for user, not scheduling");
                continue;
            };
            let Some(source) =
                self.registry.extract_pull_source(&integration.integration_type, &integration.entity_type)
            else {
                continue;
            };

            if self.schedule_integration(integration, &source, zone).await? {
                scheduled += 1;
            }
        }

        info!(total = integrations.len(), scheduled, "Integration jobs loaded");
        Ok(())
    }

    /// Register the cron job of one integration, replacing any existing one.
    ///
    /// Returns `false` when there is nothing to schedule (unknown entity or
    /// empty cron expression).
    #[instrument(skip(self, integration, source), fields(integration_id = %integration.id))]
    pub async fn schedule_integration(
        &self,
        integration: &UserIntegration,
        source: &PullSourceSettings,
        timezone: &str,
    ) -> Result<bool> {
        if self.registry.get_integration_entity(&integration.integration_type, &integration.entity_type).is_none() {
            return Ok(false);
        }
        if source.interval.cron.trim().is_empty() {
            return Ok(false);
        }

        let zone: Tz =
            timezone.parse().map_err(|_| ConduitError::InvalidInput(format!("unknown time zone `{timezone}`")))?;
        let schedule = CronSchedule::new(zone, source.interval.cron.trim());
        let task = self.cron_task(integration.id.clone(), source.clone());

        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.remove(&integration.id) {
            self.scheduler.remove(previous).await?;
        }
        let job_id = self.scheduler.schedule_cron(&schedule, task).await?;
        jobs.insert(integration.id.clone(), job_id);

        info!(
            integration_type = %integration.integration_type,
            entity_type = %integration.entity_type,
            schedule = %schedule,
            "Scheduled integration job"
        );
        Ok(true)
    }

    /// Remove the job of an integration, if one is tracked.
    pub async fn unschedule_job_by_integration_id(&self, integration_id: &str) -> Result<()> {
        let Some(job_id) = self.jobs.lock().await.remove(integration_id) else {
            return Ok(());
        };

        self.scheduler.remove(job_id).await?;
        debug!(integration_id, %job_id, "Unscheduled integration job");
        Ok(())
    }

    /// Move the scheduled integrations among `integrations` to `timezone`.
    pub async fn reschedule_integrations(&self, integrations: &[UserIntegration], timezone: &str) -> Result<()> {
        info!(count = integrations.len(), timezone, "Rescheduling integrations due to time zone change");
        for integration in integrations {
            if !self.is_scheduled(&integration.id).await {
                continue;
            }

            self.unschedule_job_by_integration_id(&integration.id).await?;
            let Some(source) =
                self.registry.extract_pull_source(&integration.integration_type, &integration.entity_type)
            else {
                continue;
            };
            self.schedule_integration(integration, &source, timezone).await?;
        }
        Ok(())
    }

    pub async fn is_scheduled(&self, integration_id: &str) -> bool {
        self.jobs.lock().await.contains_key(integration_id)
    }

    pub async fn scheduled_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    fn cron_task(&self, integration_id: String, source: PullSourceSettings) -> JobTask {
        let this = self.this.clone();
        let integration_id = Arc::new(integration_id);
        let source = Arc::new(source);
        job_task(move || {
            let this = this.clone();
            let integration_id = Arc::clone(&integration_id);
            let source = Arc::clone(&source);
            async move {
                if let Some(service) = this.upgrade() {
                    service.run_job(&integration_id, &source).await;
                }
            }
        })
    }

    fn pull_task(&self, integration_id: Arc<String>, source: Arc<PullSourceSettings>) -> JobTask {
        let this = self.this.clone();
        job_task(move || {
            let this = this.clone();
            let integration_id = Arc::clone(&integration_id);
            let source = Arc::clone(&source);
            async move {
                if let Some(service) = this.upgrade() {
                    service.pull(&integration_id, &source).await;
                }
            }
        })
    }

    async fn run_job(&self, integration_id: &Arc<String>, source: &Arc<PullSourceSettings>) {
        self.metrics.record_job_fired();

        let jitter = source.interval.jitter;
        if jitter == 0 {
            self.pull(integration_id, source).await;
            return;
        }

        // The delayed pull runs as its own job so the job timeout bounds the
        // fetch alone, never the wait in front of it.
        let minutes = u64::from(rand::thread_rng().gen_range(0..jitter));
        let delay = Duration::from_secs(minutes * JITTER_UNIT_SECS);
        let task = self.pull_task(Arc::clone(integration_id), Arc::clone(source));
        match self.scheduler.schedule_once(delay, task).await {
            Ok(_) => debug!(integration_id = %integration_id, ?delay, "Delayed run by jitter"),
            Err(err) => {
                warn!(integration_id = %integration_id, error = %err, "Failed to delay run, pulling now");
                self.pull(integration_id, source).await;
            }
        }
    }

    async fn pull(&self, integration_id: &str, source: &PullSourceSettings) {
        let integration = match self.integrations.find_by_id(integration_id).await {
            Ok(Some(integration)) => integration,
            Ok(None) => {
                info!(integration_id, "Integration no longer exists, skipping run");
                return;
            }
            Err(err) => {
                error!(integration_id, error = %err, "Failed to load integration");
                return;
            }
        };

        if let Err(err) = self.fetch.pull_integration(&integration, source).await {
            error!(
                integration_type = %integration.integration_type,
                entity_type = %integration.entity_type,
                error = %err,
                "Failed to run integration"
            );
            if err.is_fetch_error() {
                self.schedule_retry(integration, source.clone()).await;
            }
        }
    }

    async fn schedule_retry(&self, integration: UserIntegration, source: PullSourceSettings) {
        let fetch = Arc::clone(&self.fetch);
        let integration = Arc::new(integration);
        let source = Arc::new(source);
        let integration_id = integration.id.clone();

        let task = job_task(move || {
            let fetch = Arc::clone(&fetch);
            let integration = Arc::clone(&integration);
            let source = Arc::clone(&source);
            async move {
                info!(integration_id = %integration.id, "Retrying integration");
                if let Err(err) = fetch.pull_integration(&integration, &source).await {
                    error!(integration_id = %integration.id, error = %err, "Integration re-fetch failed");
                }
            }
        });

        match self.scheduler.schedule_once(self.retry_delay, task).await {
            Ok(_) => {
                self.metrics.record_retry_scheduled();
                debug!(integration_id = %integration_id, delay = ?self.retry_delay, "Scheduled retry");
            }
            Err(err) => warn!(integration_id = %integration_id, error = %err, "Failed to schedule retry"),
        }
    }
}

#[async_trait]
impl IntegrationLifecycleListener for SchedulerService {
    async fn on_integration_created(&self, integration: &UserIntegration) -> Result<()> {
        let Some(source) = self.registry.extract_pull_source(&integration.integration_type, &integration.entity_type)
        else {
            return Ok(());
        };

        let timezone = self.directory.get_user_time_zone(&integration.user_id).await?;
        self.schedule_integration(integration, &source, &timezone).await?;
        Ok(())
    }

    async fn on_integration_deleted(&self, integration: &UserIntegration) -> Result<()> {
        self.unschedule_job_by_integration_id(&integration.id).await
    }
}
