//! Retake synchronizer: replays locally recorded attempts and retake
//! finishes against the server, reconciling them with whatever the server
//! state has become in the meantime.
//!
//! Two error categories drive the whole control flow. A transport failure
//! aborts the sync and leaves every unsent row in place for the next run.
//! A business rejection is terminal for that one row: the server has
//! judged it and retrying would never succeed, so the row is deleted and a
//! warning recorded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use lesson_core::Clock;
use lesson_core::model::LessonId;
use storage::repository::{
    AttemptStore, PageAttemptRecord, RetakeFinishedInSyncRecord, RetakeStore, Storage,
    StorageError,
};

use crate::block_registry::BlockRegistry;
use crate::collaborators::{ActivityLogSync, Connectivity, ModuleRefresher};
use crate::error::{RemoteError, SyncError};
use crate::events::{EventBus, LessonEvent};
use crate::password_gate::{PasswordData, PasswordGateService};
use crate::remote::LessonRemote;

/// Component key used in the operation-block registry.
pub const SYNC_COMPONENT: &str = "lesson";

/// Minimum time between two automatic syncs of the same lesson.
pub const SYNC_RETRY_INTERVAL: Duration = Duration::from_secs(300);

/// Result of one lesson sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResult {
    /// Human-readable notices, e.g. offline data discarded because the
    /// server moved on.
    pub warnings: Vec<String>,
    /// Whether data was sent to the server or local offline data changed.
    pub updated: bool,
    pub course_id: Option<lesson_core::model::CourseId>,
}

/// Outcome of syncing one lesson during a bulk run.
#[derive(Debug, Clone)]
pub struct LessonSyncOutcome {
    pub lesson_id: LessonId,
    pub result: Result<SyncResult, SyncError>,
}

/// Phases of a lesson sync, in the order they run.
///
/// The transition table is the abort policy: any phase error lands in
/// `Failed`, success walks the chain to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    CheckingBlock,
    SyncingLogs,
    SyncingAttempts,
    SyncingRetake,
    Refreshing,
    Done,
    Failed,
}

impl SyncPhase {
    #[must_use]
    pub fn on_success(self) -> Self {
        match self {
            SyncPhase::CheckingBlock => SyncPhase::SyncingLogs,
            SyncPhase::SyncingLogs => SyncPhase::SyncingAttempts,
            SyncPhase::SyncingAttempts => SyncPhase::SyncingRetake,
            SyncPhase::SyncingRetake => SyncPhase::Refreshing,
            SyncPhase::Refreshing => SyncPhase::Done,
            SyncPhase::Done => SyncPhase::Done,
            SyncPhase::Failed => SyncPhase::Failed,
        }
    }

    #[must_use]
    pub fn on_error(self) -> Self {
        SyncPhase::Failed
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed)
    }
}

type SharedSync = Shared<BoxFuture<'static, Result<SyncResult, SyncError>>>;

struct OngoingEntry {
    generation: u64,
    future: SharedSync,
}

struct SyncInner {
    clock: Clock,
    storage: Storage,
    remote: Arc<dyn LessonRemote>,
    connectivity: Arc<dyn Connectivity>,
    gate: PasswordGateService,
    blocks: Arc<BlockRegistry>,
    events: EventBus,
    log_sync: Arc<dyn ActivityLogSync>,
    refresher: Arc<dyn ModuleRefresher>,
    ongoing: Mutex<HashMap<LessonId, OngoingEntry>>,
    generation: AtomicU64,
    last_sync: StdMutex<HashMap<LessonId, DateTime<Utc>>>,
}

/// Carries partial results between phases of one sync run.
#[derive(Default)]
struct SyncContext {
    result: SyncResult,
    password_data: Option<PasswordData>,
    ask_password: bool,
    ignore_block: bool,
}

/// The retake synchronizer.
#[derive(Clone)]
pub struct RetakeSyncService {
    inner: Arc<SyncInner>,
}

impl RetakeSyncService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        clock: Clock,
        storage: Storage,
        remote: Arc<dyn LessonRemote>,
        connectivity: Arc<dyn Connectivity>,
        gate: PasswordGateService,
        blocks: Arc<BlockRegistry>,
        events: EventBus,
        log_sync: Arc<dyn ActivityLogSync>,
        refresher: Arc<dyn ModuleRefresher>,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                clock,
                storage,
                remote,
                connectivity,
                gate,
                blocks,
                events,
                log_sync,
                refresher,
                ongoing: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                last_sync: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Synchronize one lesson.
    ///
    /// If a sync for this lesson is already in flight the caller joins it
    /// and receives the same result. `ignore_block` is only for the player
    /// itself, which triggers a sync while still holding its own block.
    ///
    /// # Errors
    ///
    /// `SyncError::Blocked` when the lesson is being played, `Offline` or
    /// `Transport` on connectivity problems (local rows are preserved),
    /// `Storage` on local persistence failures.
    pub async fn sync_lesson(
        &self,
        lesson_id: LessonId,
        ask_password: bool,
        ignore_block: bool,
    ) -> Result<SyncResult, SyncError> {
        let (future, started_generation) = {
            let mut ongoing = self.inner.ongoing.lock().await;
            if let Some(entry) = ongoing.get(&lesson_id) {
                debug!(%lesson_id, "joining in-flight sync");
                (entry.future.clone(), None)
            } else {
                if !ignore_block && self.inner.blocks.is_blocked(SYNC_COMPONENT, lesson_id) {
                    debug!(%lesson_id, "cannot sync lesson because it is blocked");
                    return Err(SyncError::Blocked(lesson_id));
                }

                debug!(%lesson_id, "starting lesson sync");
                let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
                let this = self.clone();
                let future = async move {
                    this.perform_sync(lesson_id, ask_password, ignore_block).await
                }
                .boxed()
                .shared();
                ongoing.insert(
                    lesson_id,
                    OngoingEntry {
                        generation,
                        future: future.clone(),
                    },
                );
                (future, Some(generation))
            }
        };

        let result = future.await;

        if let Some(generation) = started_generation {
            let mut ongoing = self.inner.ongoing.lock().await;
            if ongoing
                .get(&lesson_id)
                .is_some_and(|entry| entry.generation == generation)
            {
                ongoing.remove(&lesson_id);
            }
        }

        result
    }

    /// Synchronize a lesson only if enough time passed since the last run.
    ///
    /// # Errors
    ///
    /// Same as [`sync_lesson`](Self::sync_lesson).
    pub async fn sync_lesson_if_needed(
        &self,
        lesson_id: LessonId,
        ask_password: bool,
    ) -> Result<Option<SyncResult>, SyncError> {
        if !self.is_sync_needed(lesson_id) {
            return Ok(None);
        }
        self.sync_lesson(lesson_id, ask_password, false).await.map(Some)
    }

    /// Synchronize every lesson with pending offline data.
    ///
    /// Lessons run concurrently; one lesson failing does not stop its
    /// siblings. An `AutoSynced` event is published for each lesson whose
    /// sync updated something.
    ///
    /// # Errors
    ///
    /// Only the initial scan for pending lessons can fail; per-lesson
    /// failures are reported in the returned outcomes.
    pub async fn sync_all_lessons(&self, force: bool) -> Result<Vec<LessonSyncOutcome>, SyncError> {
        let lessons = self.inner.storage.get_lessons_with_data().await?;

        let outcomes = futures::future::join_all(lessons.into_iter().map(|lesson| {
            let this = self.clone();
            async move {
                let result = if force {
                    this.sync_lesson(lesson.id, false, false).await.map(Some)
                } else {
                    this.sync_lesson_if_needed(lesson.id, false).await
                };

                match result {
                    Ok(Some(result)) => {
                        if result.updated {
                            this.inner.events.publish(LessonEvent::AutoSynced {
                                lesson_id: lesson.id,
                                warnings: result.warnings.clone(),
                            });
                        }
                        Some(LessonSyncOutcome {
                            lesson_id: lesson.id,
                            result: Ok(result),
                        })
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!(lesson_id = %lesson.id, error = %e, "lesson sync failed");
                        Some(LessonSyncOutcome {
                            lesson_id: lesson.id,
                            result: Err(e),
                        })
                    }
                }
            }
        }))
        .await;

        Ok(outcomes.into_iter().flatten().collect())
    }

    /// Whether the lesson has offline rows for the given retake.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn has_data_to_sync(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<bool, SyncError> {
        let storage = &self.inner.storage;
        Ok(storage.has_retake_attempts(lesson_id, retake).await?
            || storage.has_finished_retake(lesson_id).await?)
    }

    /// Marker left by a sync that finished a reviewable retake, if any.
    ///
    /// # Errors
    ///
    /// Propagates storage failures other than a missing marker.
    pub async fn retake_finished_in_sync(
        &self,
        lesson_id: LessonId,
    ) -> Result<Option<RetakeFinishedInSyncRecord>, SyncError> {
        match self.inner.storage.retakes.get_finished_marker(lesson_id).await {
            Ok(marker) => Ok(Some(marker)),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the finished-in-sync marker, e.g. when the lesson is
    /// re-entered.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn delete_retake_finished_in_sync(
        &self,
        lesson_id: LessonId,
    ) -> Result<(), SyncError> {
        self.inner
            .storage
            .retakes
            .delete_finished_marker(lesson_id)
            .await?;
        Ok(())
    }

    fn is_sync_needed(&self, lesson_id: LessonId) -> bool {
        let last_sync = self
            .inner
            .last_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match last_sync.get(&lesson_id) {
            Some(at) => {
                let elapsed = self.inner.clock.now().signed_duration_since(*at);
                elapsed.num_seconds() >= SYNC_RETRY_INTERVAL.as_secs() as i64
            }
            None => true,
        }
    }

    fn record_sync_time(&self, lesson_id: LessonId) {
        self.inner
            .last_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(lesson_id, self.inner.clock.now());
    }

    /// Run the phase machine for one lesson.
    async fn perform_sync(
        &self,
        lesson_id: LessonId,
        ask_password: bool,
        ignore_block: bool,
    ) -> Result<SyncResult, SyncError> {
        let mut ctx = SyncContext {
            ask_password,
            ignore_block,
            ..SyncContext::default()
        };

        let mut phase = SyncPhase::CheckingBlock;
        let mut failure: Option<SyncError> = None;

        while !phase.is_terminal() {
            let step = match phase {
                SyncPhase::CheckingBlock => self.check_block(lesson_id, &ctx),
                SyncPhase::SyncingLogs => {
                    self.sync_logs(lesson_id).await;
                    Ok(())
                }
                SyncPhase::SyncingAttempts => self.sync_attempts(lesson_id, &mut ctx).await,
                SyncPhase::SyncingRetake => self.sync_retake(lesson_id, &mut ctx).await,
                SyncPhase::Refreshing => {
                    self.refresh_after_sync(lesson_id, &ctx).await;
                    Ok(())
                }
                SyncPhase::Done | SyncPhase::Failed => break,
            };

            phase = match step {
                Ok(()) => phase.on_success(),
                Err(e) => {
                    failure = Some(e);
                    phase.on_error()
                }
            };
        }

        // The retry interval counts from the last attempt, successful or
        // not.
        self.record_sync_time(lesson_id);

        match failure {
            Some(e) => Err(e),
            None => Ok(ctx.result),
        }
    }

    fn check_block(&self, lesson_id: LessonId, ctx: &SyncContext) -> Result<(), SyncError> {
        if !ctx.ignore_block && self.inner.blocks.is_blocked(SYNC_COMPONENT, lesson_id) {
            return Err(SyncError::Blocked(lesson_id));
        }
        Ok(())
    }

    /// Flush queued offline analytics for the lesson. Best-effort.
    async fn sync_logs(&self, lesson_id: LessonId) {
        if let Err(e) = self.inner.log_sync.sync_activity_logs(lesson_id).await {
            debug!(%lesson_id, error = %e, "ignoring activity log sync failure");
        }
    }

    /// Replay locally recorded attempts in timestamp order.
    async fn sync_attempts(
        &self,
        lesson_id: LessonId,
        ctx: &mut SyncContext,
    ) -> Result<(), SyncError> {
        let storage = &self.inner.storage;
        let attempts = storage.attempts.get_lesson_attempts(lesson_id).await?;
        if attempts.is_empty() {
            return Ok(());
        }

        if !self.inner.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let course_id = attempts[0].course_id;
        ctx.result.course_id = Some(course_id);
        let total = attempts.len();

        let lesson = self
            .inner
            .remote
            .get_lesson_by_id(course_id, lesson_id)
            .await?;
        let mut password_data = self.inner.gate.gather(lesson_id, ctx.ask_password).await?;
        if password_data.lesson.is_none() {
            password_data.lesson = Some(lesson);
        }

        let current_retake = password_data.access_info.attempts_count;

        // Attempts from a superseded retake are discarded, never sent.
        let mut kept = Vec::with_capacity(total);
        for attempt in attempts {
            if attempt.retake == current_retake {
                kept.push(attempt);
            } else if let Err(e) = storage
                .attempts
                .delete_attempt(
                    lesson_id,
                    attempt.retake,
                    attempt.page_id,
                    attempt.timestamp,
                )
                .await
            {
                debug!(%lesson_id, error = %e, "ignoring stale attempt delete failure");
            }
        }

        if kept.len() != total {
            warn!(%lesson_id, discarded = total - kept.len(), "discarded attempts from a superseded retake");
            ctx.result.warnings.push(format!(
                "Some offline attempts for '{}' were discarded because the retake \
                 was superseded on the server.",
                lesson_name(&password_data)
            ));
        }

        if kept.is_empty() {
            ctx.password_data = Some(password_data);
            return Ok(());
        }

        // Send in the order they were answered; later answers may depend
        // on earlier ones having been applied.
        kept.sort_by_key(|a| a.timestamp);
        for attempt in kept {
            self.send_attempt(lesson_id, &password_data, attempt, ctx)
                .await?;
        }

        ctx.password_data = Some(password_data);
        Ok(())
    }

    /// Send one attempt and delete it locally.
    ///
    /// Business rejections also delete the row: the server has judged the
    /// submission and replaying it can never succeed.
    async fn send_attempt(
        &self,
        lesson_id: LessonId,
        password_data: &PasswordData,
        attempt: PageAttemptRecord,
        ctx: &mut SyncContext,
    ) -> Result<(), SyncError> {
        let storage = &self.inner.storage;
        let send = self
            .inner
            .remote
            .process_page(
                lesson_id,
                attempt.page_id,
                &attempt.data,
                password_data.password.as_deref(),
            )
            .await;

        match send {
            Ok(_) => {
                ctx.result.updated = true;
                storage
                    .attempts
                    .delete_attempt(lesson_id, attempt.retake, attempt.page_id, attempt.timestamp)
                    .await?;
                Ok(())
            }
            Err(RemoteError::Business { message, .. }) => {
                ctx.result.updated = true;
                storage
                    .attempts
                    .delete_attempt(lesson_id, attempt.retake, attempt.page_id, attempt.timestamp)
                    .await?;
                warn!(%lesson_id, page_id = %attempt.page_id, %message, "server rejected offline attempt");
                ctx.result.warnings.push(format!(
                    "An offline attempt for '{}' was rejected by the server: {message}",
                    lesson_name(password_data)
                ));
                Ok(())
            }
            Err(RemoteError::Transport(message)) => Err(SyncError::Transport(message)),
        }
    }

    /// Send the locally finished retake, if there is one worth sending.
    async fn sync_retake(&self, lesson_id: LessonId, ctx: &mut SyncContext) -> Result<(), SyncError> {
        let storage = &self.inner.storage;

        let retake = match storage.retakes.get_retake(lesson_id).await {
            Ok(retake) => retake,
            Err(StorageError::NotFound) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if !retake.finished {
            // Abandoned mid-retake state; nothing to send.
            storage.retakes.delete_retake(lesson_id).await?;
            return Ok(());
        }

        if !self.inner.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        ctx.result.course_id = ctx.result.course_id.or(Some(retake.course_id));

        let password_data = match ctx.password_data.take() {
            Some(password_data) => password_data,
            None => {
                let lesson = self
                    .inner
                    .remote
                    .get_lesson_by_id(retake.course_id, lesson_id)
                    .await?;
                let mut password_data =
                    self.inner.gate.gather(lesson_id, ctx.ask_password).await?;
                if password_data.lesson.is_none() {
                    password_data.lesson = Some(lesson);
                }
                password_data
            }
        };

        if retake.retake != password_data.access_info.attempts_count {
            // The retake was superseded server-side; finishing it now
            // would finish the wrong retake.
            warn!(%lesson_id, local = retake.retake, server = password_data.access_info.attempts_count,
                "discarding finished retake superseded on the server");
            if ctx.result.warnings.is_empty() {
                ctx.result.warnings.push(format!(
                    "The finished retake for '{}' was discarded because the retake \
                     was superseded on the server.",
                    lesson_name(&password_data)
                ));
            }
            storage.retakes.delete_retake(lesson_id).await?;
            ctx.password_data = Some(password_data);
            return Ok(());
        }

        let finish = self
            .inner
            .remote
            .finish_retake(lesson_id, password_data.password.as_deref(), false, false)
            .await;

        match finish {
            Ok(response) => {
                ctx.result.updated = true;

                if !ctx.ignore_block {
                    if let Some(page_id) = response.review_page_id {
                        // Soft: the marker only enables an immediate
                        // review offer.
                        let marker = RetakeFinishedInSyncRecord {
                            lesson_id,
                            retake: retake.retake,
                            page_id,
                            time_finished: self.inner.clock.timestamp(),
                        };
                        if let Err(e) = storage.retakes.set_finished_marker(&marker).await {
                            debug!(%lesson_id, error = %e, "ignoring finished-in-sync marker failure");
                        }
                    }
                }

                storage.retakes.delete_retake(lesson_id).await?;
            }
            Err(RemoteError::Business { message, .. }) => {
                ctx.result.updated = true;
                storage.retakes.delete_retake(lesson_id).await?;
                warn!(%lesson_id, %message, "server rejected offline retake finish");
                ctx.result.warnings.push(format!(
                    "The finished retake for '{}' was rejected by the server: {message}",
                    lesson_name(&password_data)
                ));
            }
            Err(RemoteError::Transport(message)) => return Err(SyncError::Transport(message)),
        }

        ctx.password_data = Some(password_data);
        Ok(())
    }

    /// After data reached the server, refresh cached module data.
    /// Best-effort.
    async fn refresh_after_sync(&self, lesson_id: LessonId, ctx: &SyncContext) {
        let (true, Some(course_id)) = (ctx.result.updated, ctx.result.course_id) else {
            return;
        };
        if let Err(e) = self.inner.refresher.refresh_module(lesson_id, course_id).await {
            debug!(%lesson_id, error = %e, "ignoring module refresh failure");
        }
    }
}

fn lesson_name(password_data: &PasswordData) -> String {
    password_data
        .lesson
        .as_ref()
        .map_or_else(|| "lesson".to_string(), |l| l.name.clone())
}
