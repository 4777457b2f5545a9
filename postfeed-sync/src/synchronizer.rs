//! Collection synchronizer.
//!
//! Owns the local view for one session. Activation opens both event streams,
//! then spawns a session task that multiplexes the snapshot fetch, the two
//! streams and the shutdown signal. That task is the only writer of the view,
//! so every merge runs on one logical thread of control.
//!
//! Phases: `Uninitialized -> Loading -> Live -> Closed`. A closed session can
//! be activated again, which starts over from an empty view.

use crate::error::{FeedError, FeedResult};
use crate::gateway::MutationGateway;
use crate::subscriber::{ChangeEventSubscriber, EventStream};
use crate::view::LocalView;
use postfeed_types::{ChangeEvent, DeletedPost, EventKind, Post, PostId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Snapshot fetches slower than this count as failed (ms).
    pub snapshot_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_timeout_ms: 30_000,
        }
    }
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Uninitialized,
    Loading,
    Live,
    Closed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Live => "live",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Where a non-fatal failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSource {
    Snapshot,
    Stream(EventKind),
}

/// A failure the session survived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWarning {
    pub source: WarningSource,
    pub message: String,
}

/// Payload-free "view changed" notifications.
///
/// Notifications coalesce: after `changed` returns, re-read the whole view.
pub struct ViewChanges {
    rx: watch::Receiver<LocalView>,
}

impl ViewChanges {
    /// Waits for the next change. Returns `false` once the synchronizer is
    /// gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// The view as of now.
    pub fn current(&self) -> LocalView {
        self.rx.borrow().clone()
    }

    /// Waits until the view satisfies `pred` and returns that view.
    pub async fn wait_for(&mut self, pred: impl FnMut(&LocalView) -> bool) -> Option<LocalView> {
        self.rx.wait_for(pred).await.ok().map(|view| view.clone())
    }
}

/// State shared between the synchronizer and its session task.
struct Shared {
    view: watch::Sender<LocalView>,
    phase: watch::Sender<SyncPhase>,
    warnings: StdMutex<Vec<SyncWarning>>,
}

impl Shared {
    fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: SyncPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!("Feed session {} -> {}", previous, phase);
        }
    }

    fn warn(&self, source: WarningSource, err: &FeedError) {
        warn!("Feed session degraded ({:?}): {}", source, err);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SyncWarning {
                source,
                message: err.to_string(),
            });
    }

    /// Merges one event. Late events after close are dropped.
    fn apply(&self, event: &ChangeEvent) {
        if self.phase() == SyncPhase::Closed {
            debug!("Discarding late {} event for {}", event.kind(), event.id());
            return;
        }
        let changed = self.view.send_if_modified(|view| match view.apply(event) {
            Some(next) => {
                *view = next;
                true
            }
            None => false,
        });
        if changed {
            debug!("Merged {} event for {}", event.kind(), event.id());
        } else {
            debug!("Ignored redundant {} event for {}", event.kind(), event.id());
        }
    }

    fn seed(&self, snapshot: Vec<Post>, removed: &HashSet<PostId>) {
        if self.phase() == SyncPhase::Closed {
            debug!("Discarding late snapshot of {} posts", snapshot.len());
            return;
        }
        self.view.send_modify(|view| *view = view.seed(snapshot, removed));
        self.set_phase(SyncPhase::Live);
    }
}

struct Session {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Reconciles the snapshot with the live event streams.
pub struct CollectionSynchronizer {
    gateway: MutationGateway,
    subscriber: ChangeEventSubscriber,
    config: SyncConfig,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl CollectionSynchronizer {
    pub fn new(
        gateway: MutationGateway,
        subscriber: ChangeEventSubscriber,
        config: SyncConfig,
    ) -> Self {
        let (view, _) = watch::channel(LocalView::empty());
        let (phase, _) = watch::channel(SyncPhase::Uninitialized);
        Self {
            gateway,
            subscriber,
            config,
            shared: Arc::new(Shared {
                view,
                phase,
                warnings: StdMutex::new(Vec::new()),
            }),
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.shared.phase()
    }

    /// The current view. Always complete; never a partially merged state.
    pub fn current_view(&self) -> LocalView {
        self.shared.view.borrow().clone()
    }

    /// Subscribes to view change notifications.
    pub fn changes(&self) -> ViewChanges {
        ViewChanges {
            rx: self.shared.view.subscribe(),
        }
    }

    /// Non-fatal failures recorded during the current session.
    pub fn warnings(&self) -> Vec<SyncWarning> {
        self.shared
            .warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until the session has left `Loading`; returns the phase reached.
    pub async fn wait_until_live(&self) -> SyncPhase {
        let mut rx = self.shared.phase.subscribe();
        match rx
            .wait_for(|p| matches!(p, SyncPhase::Live | SyncPhase::Closed | SyncPhase::Uninitialized))
            .await
        {
            Ok(phase) => *phase,
            Err(_) => SyncPhase::Closed,
        }
    }

    /// Starts a session: opens both streams and fetches the snapshot.
    ///
    /// Returns once the streams are open; the snapshot resolves in the
    /// background. A stream that fails to open is recorded as a warning and
    /// the session runs without it.
    pub async fn activate(&self) -> FeedResult<()> {
        let mut session = self.session.lock().await;
        let phase = self.phase();
        match phase {
            SyncPhase::Uninitialized => {}
            SyncPhase::Closed => {
                self.shared.view.send_replace(LocalView::empty());
                self.shared
                    .warnings
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
            }
            SyncPhase::Loading | SyncPhase::Live => {
                return Err(FeedError::InvalidState(format!(
                    "cannot activate a {phase} session"
                )));
            }
        }
        self.shared.set_phase(SyncPhase::Loading);

        let created = match self.subscriber.open_created_stream().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                self.shared.warn(WarningSource::Stream(EventKind::Created), &e);
                None
            }
        };
        let deleted = match self.subscriber.open_deleted_stream().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                self.shared.warn(WarningSource::Stream(EventKind::Deleted), &e);
                None
            }
        };

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_session(
            Arc::clone(&self.shared),
            self.gateway.clone(),
            Duration::from_millis(self.config.snapshot_timeout_ms),
            created,
            deleted,
            shutdown_rx,
        ));
        *session = Some(Session { shutdown, task });
        info!("Feed session activated");
        Ok(())
    }

    /// Ends the session and closes both subscriptions.
    ///
    /// In-flight mutations are not cancelled; they never touch the view.
    pub async fn deactivate(&self) {
        let mut session = self.session.lock().await;
        if self.phase() == SyncPhase::Closed {
            return;
        }
        self.shared.set_phase(SyncPhase::Closed);

        if let Some(Session { shutdown, task }) = session.take() {
            let _ = shutdown.send(());
            if let Err(e) = task.await {
                warn!("Feed session task ended abnormally: {}", e);
            }
        }
        info!("Feed session closed");
    }
}

impl Drop for CollectionSynchronizer {
    fn drop(&mut self) {
        // Aborting drops the streams, whose handles close on drop.
        if let Some(session) = self.session.get_mut().take() {
            session.task.abort();
        }
    }
}

async fn next_event<T>(stream: &mut Option<EventStream<T>>) -> Option<FeedResult<T>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn run_session(
    shared: Arc<Shared>,
    gateway: MutationGateway,
    snapshot_timeout: Duration,
    mut created: Option<EventStream<Post>>,
    mut deleted: Option<EventStream<DeletedPost>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let snapshot = tokio::time::timeout(snapshot_timeout, gateway.fetch_all());
    tokio::pin!(snapshot);

    let mut seeded = false;
    let mut removed_while_loading = HashSet::new();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            result = &mut snapshot, if !seeded => {
                seeded = true;
                let posts = match result {
                    Ok(Ok(snapshot)) => {
                        if snapshot.truncated {
                            shared.warn(
                                WarningSource::Snapshot,
                                &FeedError::TruncatedSnapshot(snapshot.posts.len()),
                            );
                        }
                        snapshot.posts
                    }
                    Ok(Err(e)) => {
                        shared.warn(WarningSource::Snapshot, &e);
                        Vec::new()
                    }
                    Err(_) => {
                        shared.warn(WarningSource::Snapshot, &FeedError::Timeout);
                        Vec::new()
                    }
                };
                info!("Seeding feed with {} posts", posts.len());
                shared.seed(posts, &removed_while_loading);
                removed_while_loading.clear();
            }

            item = next_event(&mut created), if created.is_some() => match item {
                Some(Ok(post)) => shared.apply(&ChangeEvent::Created(post)),
                Some(Err(e)) => {
                    shared.warn(WarningSource::Stream(EventKind::Created), &e);
                    created = None;
                }
                None => created = None,
            },

            item = next_event(&mut deleted), if deleted.is_some() => match item {
                Some(Ok(event)) => {
                    if !seeded {
                        removed_while_loading.insert(event.id.clone());
                    }
                    shared.apply(&ChangeEvent::Deleted(event));
                }
                Some(Err(e)) => {
                    shared.warn(WarningSource::Stream(EventKind::Deleted), &e);
                    deleted = None;
                }
                None => deleted = None,
            },
        }
    }

    if let Some(stream) = created.as_mut() {
        stream.close();
    }
    if let Some(stream) = deleted.as_mut() {
        stream.close();
    }
    debug!("Feed session task finished");
}
