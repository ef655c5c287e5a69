//! Application context - dependency injection container

use std::sync::Arc;

use conduit_common::IngestionMetrics;
use conduit_core::{
    AuthService, AuthenticationMethodRegistry, CredentialsRepository, EntityLogRepository, EventDispatcher,
    FetchService, JobScheduler, ProcessService, SchedulerService, TypeRegistry, UpdateRepository, UpdateService,
    UserDirectory, UserIntegrationRepository, UserIntegrationService, WebhookService,
};
use conduit_domain::constants::OAUTH_METHOD;
use conduit_domain::{Config, Result};
use conduit_infra::{
    CronJobRunner, CronJobRunnerConfig, DbManager, FileDefinitionSource, HttpClient, HttpUserDirectory,
    OAuthAuthenticationFactory, ReqwestFetcher, SqlCipherCredentialsRepository, SqlCipherEntityLogRepository,
    SqlCipherUpdateRepository, SqlCipherUserIntegrationRepository,
};
use tracing::info;

pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub metrics: Arc<IngestionMetrics>,

    pub registry: Arc<TypeRegistry>,
    pub auth: Arc<AuthService>,
    pub fetch: Arc<FetchService>,
    pub process: Arc<ProcessService>,
    pub scheduler: Arc<SchedulerService>,
    pub user_integrations: Arc<UserIntegrationService>,
    pub updates: Arc<UpdateService>,
    pub webhooks: Arc<WebhookService>,
    pub events: Arc<EventDispatcher>,

    pub job_runner: Arc<CronJobRunner>,
}

impl AppContext {
    /// Open storage, load the definition catalogue and wire every service.
    ///
    /// Nothing is scheduled until [`AppContext::start`].
    pub async fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::new(
            &config.database.path,
            config.database.pool_size,
            config.database.encryption_key.as_deref(),
        )?);
        db.run_migrations()?;

        let integrations: Arc<dyn UserIntegrationRepository> =
            Arc::new(SqlCipherUserIntegrationRepository::new(Arc::clone(&db)));
        let credentials: Arc<dyn CredentialsRepository> =
            Arc::new(SqlCipherCredentialsRepository::new(Arc::clone(&db)));
        let update_repository: Arc<dyn UpdateRepository> = Arc::new(SqlCipherUpdateRepository::new(Arc::clone(&db)));
        let entity_logs: Arc<dyn EntityLogRepository> = Arc::new(SqlCipherEntityLogRepository::new(Arc::clone(&db)));

        let registry = Arc::new(TypeRegistry::new(Arc::new(FileDefinitionSource::new(&config.definitions.path))));
        registry.load().await?;

        let http = HttpClient::from_config(&config.http)?;
        let mut factories = AuthenticationMethodRegistry::new();
        factories.register(OAUTH_METHOD, OAuthAuthenticationFactory::new(http.clone()));
        let auth = Arc::new(AuthService::new(
            Arc::clone(&registry),
            Arc::clone(&credentials),
            factories,
            config.auth.callback_url_base.clone(),
        ));
        auth.load().await?;

        let metrics = Arc::new(IngestionMetrics::new());
        let directory: Arc<dyn UserDirectory> = Arc::new(HttpUserDirectory::from_config(&config.user_directory)?);

        let process = Arc::new(ProcessService::new(
            Arc::clone(&update_repository),
            Arc::clone(&entity_logs),
            Arc::clone(&metrics),
        ));
        let fetch = Arc::new(FetchService::new(
            Arc::clone(&registry),
            Arc::clone(&auth),
            Arc::clone(&process),
            Arc::clone(&directory),
            Arc::new(ReqwestFetcher::new(http)),
            config.fetch.clone(),
            Arc::clone(&metrics),
        ));

        let job_runner = Arc::new(CronJobRunner::with_config(CronJobRunnerConfig::from(&config.scheduler)).await?);
        let jobs: Arc<dyn JobScheduler> = job_runner.clone();
        let scheduler = SchedulerService::new(
            Arc::clone(&registry),
            Arc::clone(&fetch),
            Arc::clone(&integrations),
            directory,
            jobs,
            &config.scheduler,
            Arc::clone(&metrics),
        );

        let updates = Arc::new(UpdateService::new(update_repository));
        let user_integrations = Arc::new(
            UserIntegrationService::new(
                Arc::clone(&registry),
                Arc::clone(&integrations),
                entity_logs,
                Arc::clone(&fetch),
            )
            .with_listener(scheduler.clone())
            .with_listener(updates.clone()),
        );
        let webhooks =
            Arc::new(WebhookService::new(Arc::clone(&registry), integrations, Arc::clone(&fetch), Arc::clone(&process)));
        let events = Arc::new(EventDispatcher::new(
            Arc::clone(&user_integrations),
            Arc::clone(&scheduler),
            Arc::clone(&auth),
            Arc::clone(&updates),
        ));

        Ok(Self {
            config,
            db,
            metrics,
            registry,
            auth,
            fetch,
            process,
            scheduler,
            user_integrations,
            updates,
            webhooks,
            events,
            job_runner,
        })
    }

    /// Start the job runner and schedule every stored pull integration.
    pub async fn start(&self) -> Result<()> {
        self.job_runner.start().await?;
        self.scheduler.load().await?;
        info!(scheduled = self.scheduler.scheduled_count().await, "Conduit started");
        Ok(())
    }

    /// Stop firing jobs.
    pub async fn shutdown(&self) -> Result<()> {
        if self.job_runner.is_running() {
            self.job_runner.stop().await?;
        }
        info!("Conduit stopped");
        Ok(())
    }
}
