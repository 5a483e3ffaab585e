//! The sync loop: drives repeated polling, feeds each response to the
//! engine, and tracks the continuation cursor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::directory::User;
use crate::error::TransportError;
use crate::member::RoomMember;
use crate::receipts::ReceiptEntry;
use crate::resolver::{ProfileResolver, ProfileSource, ResolvedProfile};
use crate::room::Room;
use crate::sync::{SyncConfig, SyncEngine, SyncState, SyncUpdate};
use crate::types::SyncResponse;

/// Transport collaborator performing one poll against the server.
///
/// Retry and backoff mechanics for the request itself live behind this
/// trait; the loop only sees a decoded response or a typed failure.
pub trait SyncTransport: Send + Sync + 'static {
    /// Polls for the next sync batch. `since` is the continuation token of
    /// the last applied response, or `None` for an initial sync.
    fn sync(
        &self,
        since: Option<&str>,
    ) -> impl Future<Output = Result<SyncResponse, TransportError>> + Send;
}

impl<T: SyncTransport> SyncTransport for Arc<T> {
    fn sync(
        &self,
        since: Option<&str>,
    ) -> impl Future<Output = Result<SyncResponse, TransportError>> + Send {
        (**self).sync(since)
    }
}

/// Backoff collaborator consulted between reconnect attempts.
pub trait BackoffPolicy: Send + Sync {
    /// Delay before reconnect attempt `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with a ceiling; the default policy.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self { base: Duration::from_millis(500), max: Duration::from_secs(30) }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << exponent).min(self.max)
    }
}

/// Mutable loop state, queryable while the loop runs.
#[derive(Debug, Clone)]
pub struct ClientState {
    /// Continuation token of the last applied response
    pub next_batch: Option<String>,

    /// When the last response was applied
    pub last_sync: Option<DateTime<Utc>>,

    /// Current lifecycle state
    pub lifecycle: SyncState,
}

/// The resolver and its completion channel, locked together by the loop for
/// the duration of a run.
struct Lookups<S> {
    resolver: ProfileResolver<S>,
    completions: mpsc::Receiver<ResolvedProfile>,
}

/// Drives the sync loop against a transport, owning the engine and fanning
/// out updates on a broadcast channel.
///
/// The loop is the single writer: a response is fully reconciled before the
/// next poll is issued, and resolver completions are folded in between
/// polls under the same discipline.
pub struct SyncClient<T, S> {
    transport: T,
    engine: Arc<RwLock<SyncEngine>>,
    lookups: Mutex<Lookups<S>>,
    updates: broadcast::Sender<SyncUpdate>,
    state: RwLock<ClientState>,
    backoff: Arc<dyn BackoffPolicy>,
    shutdown: watch::Sender<bool>,
}

impl<T: SyncTransport, S: ProfileSource> SyncClient<T, S> {
    pub fn new(config: SyncConfig, transport: T, profile_source: S) -> Self {
        let (resolver, completions) = ProfileResolver::new(profile_source);
        let (updates, _) = broadcast::channel(1024);
        let (shutdown, _) = watch::channel(false);
        Self {
            transport,
            engine: Arc::new(RwLock::new(SyncEngine::new(config))),
            lookups: Mutex::new(Lookups { resolver, completions }),
            updates,
            state: RwLock::new(ClientState {
                next_batch: None,
                last_sync: None,
                lifecycle: SyncState::Stopped,
            }),
            backoff: Arc::new(ExponentialBackoff::default()),
            shutdown,
        }
    }

    /// Replaces the default reconnect backoff policy.
    pub fn with_backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Subscribes to the update broadcast.
    pub fn subscribe_to_updates(&self) -> broadcast::Receiver<SyncUpdate> {
        self.updates.subscribe()
    }

    /// The update broadcast as a stream.
    pub fn sync_stream(&self) -> impl Stream<Item = SyncUpdate> + Send + Unpin {
        Box::pin(BroadcastStream::new(self.updates.subscribe()).filter_map(|result| {
            async move {
                match result {
                    Ok(update) => Some(update),
                    Err(error) => {
                        warn!(%error, "sync stream lagged, dropping updates");
                        None
                    },
                }
            }
        }))
    }

    pub async fn state(&self) -> ClientState {
        self.state.read().await.clone()
    }

    pub async fn lifecycle(&self) -> SyncState {
        self.state.read().await.lifecycle
    }

    pub async fn room(&self, room_id: &str) -> Option<Room> {
        self.engine.read().await.room(room_id).cloned()
    }

    pub async fn user(&self, user_id: &str) -> Option<User> {
        self.engine.read().await.user(user_id).cloned()
    }

    pub async fn room_member(&self, room_id: &str, user_id: &str) -> Option<RoomMember> {
        self.engine.read().await.room_member(room_id, user_id).cloned()
    }

    pub async fn receipts_for_event(&self, room_id: &str, event_id: &str) -> Vec<ReceiptEntry> {
        self.engine.read().await.receipts_for_event(room_id, event_id)
    }

    /// Runs the poll loop until [`SyncClient::stop`] is called.
    ///
    /// Each successful pass advances the cursor to the applied response's
    /// batch token; a transport failure keeps the cursor and retries with
    /// the same token after backoff, so nothing is skipped or duplicated.
    pub async fn run(&self) {
        let mut lookups = self.lookups.lock().await;
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return;
        }

        info!("sync loop starting");
        let mut prepared = false;
        let mut attempt: u32 = 0;

        loop {
            let since = self.state.read().await.next_batch.clone();
            let poll = self.transport.sync(since.as_deref());
            tokio::pin!(poll);

            // Resolver completions fold in while the poll is in flight,
            // without ever cancelling it.
            let outcome = loop {
                tokio::select! {
                    _ = shutdown.changed() => break None,
                    Some(resolved) = lookups.completions.recv() => {
                        self.apply_resolved(resolved).await;
                    },
                    result = &mut poll => break Some(result),
                }
            };
            let Some(result) = outcome else {
                break;
            };

            match result {
                Ok(response) => {
                    attempt = 0;
                    self.apply_response(&response, &mut lookups.resolver).await;
                    if !prepared {
                        prepared = true;
                        self.set_lifecycle(SyncState::Prepared).await;
                    }
                    self.set_lifecycle(SyncState::Syncing).await;
                },
                Err(error) => {
                    warn!(%error, "sync poll failed, will retry with the same token");
                    attempt += 1;
                    if self.lifecycle().await == SyncState::Reconnecting {
                        self.set_lifecycle(SyncState::Error).await;
                    }
                    self.set_lifecycle(SyncState::Reconnecting).await;
                    let delay = self.backoff.delay(attempt);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(delay) => {},
                    }
                },
            }

            if *shutdown.borrow() {
                break;
            }
        }

        lookups.resolver.abort_all();
        self.set_lifecycle(SyncState::Stopped).await;
        info!("sync loop stopped");
    }

    /// Stops the loop. Terminal: outstanding lookups are cancelled, their
    /// results never applied, and the loop cannot be restarted.
    pub fn stop(&self) {
        info!("stopping sync loop");
        self.shutdown.send_replace(true);
    }

    async fn apply_response(
        &self,
        response: &SyncResponse,
        resolver: &mut ProfileResolver<S>,
    ) {
        let (updates, requests, issued_seq) = {
            let mut engine = self.engine.write().await;
            let applied = engine.apply(response);
            (applied.updates, applied.resolve_requests, engine.directory_seq())
        };
        {
            let mut state = self.state.write().await;
            state.next_batch = Some(response.next_batch.clone());
            state.last_sync = Some(Utc::now());
        }

        // Updates go out only after the pass's state mutation is complete.
        for update in updates {
            let _ = self.updates.send(update);
        }
        for user_id in requests {
            resolver.request(&user_id, issued_seq);
        }
    }

    async fn apply_resolved(&self, resolved: ResolvedProfile) {
        match resolved.result {
            Ok(profile) => {
                let updates = self
                    .engine
                    .write()
                    .await
                    .apply_profile(&resolved.user_id, &profile, resolved.issued_seq);
                for update in updates {
                    let _ = self.updates.send(update);
                }
            },
            Err(_) => {
                let _ = self
                    .updates
                    .send(SyncUpdate::ProfileLookupFailed { user_id: resolved.user_id });
            },
        }
    }

    async fn set_lifecycle(&self, lifecycle: SyncState) {
        {
            let mut state = self.state.write().await;
            if state.lifecycle == lifecycle {
                return;
            }
            debug!(from = %state.lifecycle, to = %lifecycle, "sync lifecycle transition");
            state.lifecycle = lifecycle;
        }
        let _ = self.updates.send(SyncUpdate::SyncLifecycle { state: lifecycle });
    }
}
