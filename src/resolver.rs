//! Deferred profile resolution for invited members.
//!
//! Lookups run as independent background tasks; their completions are
//! messages consumed by the single reconciliation writer, never direct
//! state mutation from a foreign task.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProfileError;
use crate::types::ProfileInfo;

/// Network collaborator answering profile lookups by user id.
pub trait ProfileSource: Send + Sync + 'static {
    /// Looks up the displayed profile for `user_id`.
    fn lookup(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<ProfileInfo, ProfileError>> + Send;
}

/// A profile source that always fails; for configurations with resolution
/// disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProfileSource;

impl ProfileSource for NullProfileSource {
    async fn lookup(&self, user_id: &str) -> Result<ProfileInfo, ProfileError> {
        Err(ProfileError::LookupFailed {
            user_id: user_id.to_owned(),
            reason: "profile resolution disabled".to_owned(),
        })
    }
}

/// A completed lookup, delivered back to the reconciliation writer.
#[derive(Debug)]
pub struct ResolvedProfile {
    /// User the lookup was for
    pub user_id: String,

    /// Directory write sequence snapshotted when the lookup was issued;
    /// the writer discards the result if the record was stamped later
    pub issued_seq: u64,

    /// The profile, or why there is none
    pub result: Result<ProfileInfo, ProfileError>,
}

/// Coalescing, cancellable lookup scheduler.
///
/// At most one lookup is in flight per user id; a second request for a
/// still-pending id attaches to the existing one. Failures are reported
/// once and not retried automatically.
pub struct ProfileResolver<S> {
    source: Arc<S>,
    completions: mpsc::Sender<ResolvedProfile>,
    pending: HashMap<String, JoinHandle<()>>,
}

impl<S: ProfileSource> ProfileResolver<S> {
    /// Creates a resolver and the completion channel its lookups report on.
    pub fn new(source: S) -> (Self, mpsc::Receiver<ResolvedProfile>) {
        let (completions, receiver) = mpsc::channel(64);
        (Self { source: Arc::new(source), completions, pending: HashMap::new() }, receiver)
    }

    /// Issues a lookup for `user_id`, unless one is already in flight.
    pub fn request(&mut self, user_id: &str, issued_seq: u64) {
        self.reap_finished();
        if self.pending.contains_key(user_id) {
            debug!(user_id, "profile lookup already pending, coalescing");
            return;
        }

        debug!(user_id, "issuing profile lookup");
        let source = Arc::clone(&self.source);
        let completions = self.completions.clone();
        let key = user_id.to_owned();
        let user_id = user_id.to_owned();
        let handle = tokio::spawn(async move {
            let result = source.lookup(&user_id).await;
            if let Err(error) = &result {
                warn!(%user_id, %error, "profile lookup failed");
            }
            let _ = completions.send(ResolvedProfile { user_id, issued_seq, result }).await;
        });
        self.pending.insert(key, handle);
    }

    /// Whether a lookup is currently in flight for `user_id`.
    pub fn is_pending(&mut self, user_id: &str) -> bool {
        self.reap_finished();
        self.pending.contains_key(user_id)
    }

    /// Number of lookups currently in flight.
    pub fn pending_count(&mut self) -> usize {
        self.reap_finished();
        self.pending.len()
    }

    /// Aborts every in-flight lookup. Aborted lookups never complete, so
    /// nothing is applied after a stop.
    pub fn abort_all(&mut self) {
        for (user_id, handle) in self.pending.drain() {
            debug!(%user_id, "aborting profile lookup");
            handle.abort();
        }
    }

    fn reap_finished(&mut self) {
        self.pending.retain(|_, handle| !handle.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Counts lookups; optionally never completes.
    struct CountingSource {
        lookups: Arc<AtomicUsize>,
        hang: bool,
    }

    impl ProfileSource for CountingSource {
        async fn lookup(&self, user_id: &str) -> Result<ProfileInfo, ProfileError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(ProfileInfo {
                displayname: Some(format!("resolved {user_id}")),
                avatar_url: None,
            })
        }
    }

    #[tokio::test]
    async fn duplicate_requests_coalesce() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let source = CountingSource { lookups: Arc::clone(&lookups), hang: true };
        let (mut resolver, _completions) = ProfileResolver::new(source);

        resolver.request("@claire:bar", 0);
        resolver.request("@claire:bar", 0);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert!(resolver.is_pending("@claire:bar"));
        resolver.abort_all();
    }

    #[tokio::test]
    async fn completions_arrive_on_the_channel() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let source = CountingSource { lookups, hang: false };
        let (mut resolver, mut completions) = ProfileResolver::new(source);

        resolver.request("@claire:bar", 7);
        let resolved = completions.recv().await.unwrap();
        assert_eq!(resolved.user_id, "@claire:bar");
        assert_eq!(resolved.issued_seq, 7);
        assert_eq!(
            resolved.result.unwrap().displayname.as_deref(),
            Some("resolved @claire:bar")
        );
        assert_eq!(resolver.pending_count(), 0);
    }

    #[tokio::test]
    async fn failures_are_delivered_not_retried() {
        struct FailingSource;
        impl ProfileSource for FailingSource {
            async fn lookup(&self, user_id: &str) -> Result<ProfileInfo, ProfileError> {
                Err(ProfileError::lookup_failed(user_id, "404"))
            }
        }
        let (mut resolver, mut completions) = ProfileResolver::new(FailingSource);

        resolver.request("@claire:bar", 0);
        let resolved = completions.recv().await.unwrap();
        assert!(matches!(resolved.result, Err(ProfileError::LookupFailed { .. })));
        assert_eq!(resolver.pending_count(), 0);
    }

    #[tokio::test]
    async fn abort_cancels_in_flight_lookups() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let source = CountingSource { lookups, hang: true };
        let (mut resolver, mut completions) = ProfileResolver::new(source);

        resolver.request("@claire:bar", 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        resolver.abort_all();
        assert_eq!(resolver.pending_count(), 0);

        // The aborted task never reports a completion.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(completions.try_recv().is_err());
    }
}
