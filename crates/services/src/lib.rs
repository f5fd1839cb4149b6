#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempt_service;
pub mod block_registry;
pub mod collaborators;
pub mod cron;
pub mod error;
pub mod events;
pub mod password_gate;
pub mod remote;
pub mod sync;

pub use lesson_core::Clock;

pub use app_services::{AppServices, AppServicesBuilder};
pub use attempt_service::{AttemptService, EolPage, PlayContext, ProcessPageResult};
pub use block_registry::BlockRegistry;
pub use collaborators::{
    ActivityLogSync, AlwaysOnline, Connectivity, ModuleRefresher, NoopCollaborator, PasswordPrompt,
};
pub use cron::SyncCron;
pub use error::{AppServicesError, PasswordGateError, PlayerError, RemoteError, SyncError};
pub use events::{DataSentKind, EventBus, LessonEvent};
pub use password_gate::{PasswordData, PasswordGateService};
pub use remote::{
    FinishRetakeOutcome, HttpLessonRemote, LessonRemote, ProcessPageOutcome, RemoteConfig,
    RetakesOverview, UserRetake, UserTimer,
};
pub use sync::{
    LessonSyncOutcome, RetakeSyncService, SYNC_COMPONENT, SYNC_RETRY_INTERVAL, SyncPhase,
    SyncResult,
};
