use std::sync::Arc;

use lesson_core::Clock;
use storage::repository::Storage;

use crate::attempt_service::AttemptService;
use crate::block_registry::BlockRegistry;
use crate::collaborators::{
    ActivityLogSync, AlwaysOnline, Connectivity, ModuleRefresher, NoopCollaborator, PasswordPrompt,
};
use crate::cron::SyncCron;
use crate::error::AppServicesError;
use crate::events::EventBus;
use crate::password_gate::PasswordGateService;
use crate::remote::{HttpLessonRemote, LessonRemote, RemoteConfig};
use crate::sync::RetakeSyncService;

/// Everything pluggable when assembling the service graph.
pub struct AppServicesBuilder {
    pub clock: Clock,
    pub remote: Arc<dyn LessonRemote>,
    pub connectivity: Arc<dyn Connectivity>,
    pub password_prompt: Option<Arc<dyn PasswordPrompt>>,
    pub log_sync: Arc<dyn ActivityLogSync>,
    pub refresher: Arc<dyn ModuleRefresher>,
}

impl AppServicesBuilder {
    #[must_use]
    pub fn new(clock: Clock, remote: Arc<dyn LessonRemote>) -> Self {
        Self {
            clock,
            remote,
            connectivity: Arc::new(AlwaysOnline),
            password_prompt: None,
            log_sync: Arc::new(NoopCollaborator),
            refresher: Arc::new(NoopCollaborator),
        }
    }

    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    #[must_use]
    pub fn with_password_prompt(mut self, prompt: Arc<dyn PasswordPrompt>) -> Self {
        self.password_prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn with_log_sync(mut self, log_sync: Arc<dyn ActivityLogSync>) -> Self {
        self.log_sync = log_sync;
        self
    }

    #[must_use]
    pub fn with_refresher(mut self, refresher: Arc<dyn ModuleRefresher>) -> Self {
        self.refresher = refresher;
        self
    }
}

/// Assembles the lesson services once at application start.
///
/// Components are constructed here and passed by reference; there is no
/// implicit global registry.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    events: EventBus,
    blocks: Arc<BlockRegistry>,
    gate: PasswordGateService,
    sync: RetakeSyncService,
    attempts: AttemptService,
    cron: SyncCron,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP remote.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        remote_config: RemoteConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let remote: Arc<dyn LessonRemote> = Arc::new(HttpLessonRemote::new(remote_config));
        Ok(Self::new_with(storage, AppServicesBuilder::new(clock, remote)))
    }

    /// Build services from explicit parts; the seam used by tests.
    #[must_use]
    pub fn new_with(storage: Storage, builder: AppServicesBuilder) -> Self {
        let events = EventBus::default();
        let blocks = Arc::new(BlockRegistry::new());

        let gate = PasswordGateService::new(
            builder.clock,
            Arc::clone(&builder.remote),
            Arc::clone(&storage.passwords),
            builder.password_prompt,
        );

        let sync = RetakeSyncService::new(
            builder.clock,
            storage.clone(),
            Arc::clone(&builder.remote),
            builder.connectivity,
            gate.clone(),
            Arc::clone(&blocks),
            events.clone(),
            builder.log_sync,
            builder.refresher,
        );

        let attempts = AttemptService::new(builder.clock, storage.clone(), events.clone());
        let cron = SyncCron::new(sync.clone());

        Self {
            storage,
            events,
            blocks,
            gate,
            sync,
            attempts,
            cron,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn blocks(&self) -> Arc<BlockRegistry> {
        Arc::clone(&self.blocks)
    }

    #[must_use]
    pub fn password_gate(&self) -> &PasswordGateService {
        &self.gate
    }

    #[must_use]
    pub fn sync(&self) -> &RetakeSyncService {
        &self.sync
    }

    #[must_use]
    pub fn attempts(&self) -> &AttemptService {
        &self.attempts
    }

    #[must_use]
    pub fn cron(&self) -> &SyncCron {
        &self.cron
    }
}
