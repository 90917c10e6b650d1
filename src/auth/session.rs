//! Session state shared by every request: the cached bearer token, the
//! at-most-one in-flight token refresh, and sign-out notification.
//!
//! When several requests hit an expired token at once, exactly one of
//! them (the leader) performs the refresh round-trip; the rest enqueue
//! and are resumed in insertion order once the leader finishes. The
//! refreshing flag and the waiter queue live behind one mutex and are
//! only ever read or updated under it, so two callers can never both
//! decide to refresh. The mutex is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::api::error::RefreshError;

use super::credentials::{CredentialStore, StoreError, TokenPair};

type SignOutHandler = Arc<dyn Fn() + Send + Sync>;

/// Owns the mutable session state. One instance is shared (via `Arc`)
/// between the API client and the embedding application.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    state: Mutex<RefreshState>,
    handler: Mutex<HandlerSlot>,
}

struct RefreshState {
    refreshing: bool,
    /// Waiters queued behind the in-flight refresh, in arrival order.
    /// Non-empty only while `refreshing` is true.
    waiters: Vec<oneshot::Sender<Result<String, RefreshError>>>,
    /// Cached access token for building the Authorization header.
    token: Option<String>,
    /// False until the token has been loaded from the store once.
    token_loaded: bool,
}

struct HandlerSlot {
    generation: u64,
    handler: Option<SignOutHandler>,
}

/// What a request that hit an expired token should do next.
pub enum RefreshTicket<'a> {
    /// This caller performs the single refresh round-trip and must
    /// `finish` (or drop) the guard.
    Leader(RefreshGuard<'a>),
    /// A refresh is already in flight; await the shared outcome.
    Waiter(oneshot::Receiver<Result<String, RefreshError>>),
}

/// Held by the refresh leader. `finish` resolves every queued waiter;
/// dropping the guard without finishing fails them instead, so a
/// cancelled leader can never leave the queue stuck.
pub struct RefreshGuard<'a> {
    manager: &'a SessionManager,
    completed: bool,
}

impl RefreshGuard<'_> {
    pub fn finish(mut self, outcome: Result<String, RefreshError>) {
        self.completed = true;
        self.manager.finish_refresh(outcome);
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            warn!("refresh leader dropped before completing; failing queued requests");
            self.manager.finish_refresh(Err(RefreshError::Abandoned));
        }
    }
}

/// Keeps a sign-out handler installed; dropping it uninstalls the
/// handler unless a newer registration has already replaced it.
pub struct SignOutRegistration {
    manager: Arc<SessionManager>,
    generation: u64,
}

impl Drop for SignOutRegistration {
    fn drop(&mut self) {
        let mut slot = lock(&self.manager.handler);
        if slot.generation == self.generation {
            slot.handler = None;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            state: Mutex::new(RefreshState {
                refreshing: false,
                waiters: Vec::new(),
                token: None,
                token_loaded: false,
            }),
            handler: Mutex::new(HandlerSlot {
                generation: 0,
                handler: None,
            }),
        }
    }

    /// Current bearer token, loading it from the store on first use.
    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        {
            let state = lock(&self.state);
            if state.token_loaded {
                return Ok(state.token.clone());
            }
        }
        let pair = self.store.get()?;
        let mut state = lock(&self.state);
        if !state.token_loaded {
            state.token = pair.map(|p| p.access_token);
            state.token_loaded = true;
        }
        Ok(state.token.clone())
    }

    /// Stored token pair, straight from the credential store.
    pub fn token_pair(&self) -> Result<Option<TokenPair>, StoreError> {
        self.store.get()
    }

    /// Persist a new token pair and make it the active bearer token.
    pub fn install_tokens(&self, pair: &TokenPair) -> Result<(), StoreError> {
        self.store.save(pair)?;
        let mut state = lock(&self.state);
        state.token = Some(pair.access_token.clone());
        state.token_loaded = true;
        Ok(())
    }

    /// Classify this caller as refresh leader or waiter.
    ///
    /// The check-and-set of the refreshing flag happens under one lock
    /// acquisition; callers observing an in-flight refresh are enqueued
    /// in the same step.
    pub fn begin_refresh_or_wait(&self) -> RefreshTicket<'_> {
        let mut state = lock(&self.state);
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            debug!(queued = state.waiters.len(), "refresh in flight, queueing request");
            RefreshTicket::Waiter(rx)
        } else {
            state.refreshing = true;
            RefreshTicket::Leader(RefreshGuard {
                manager: self,
                completed: false,
            })
        }
    }

    /// Whether a refresh round-trip is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.state).refreshing
    }

    /// Clear stored credentials and notify the application layer.
    ///
    /// Called once per unrecoverable-auth episode. The triggering request
    /// still fails; this only transitions the app to signed-out.
    pub fn sign_out(&self) {
        debug!("unrecoverable auth failure, signing out");
        if let Err(err) = self.store.remove() {
            warn!(error = %err, "failed to clear stored credentials");
        }
        {
            let mut state = lock(&self.state);
            state.token = None;
            state.token_loaded = true;
        }
        let handler = lock(&self.handler).handler.clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Install the sign-out handler, replacing any previous one.
    ///
    /// Exactly one handler is active at a time; re-registration
    /// supersedes rather than stacks, so sign-out can never fire twice
    /// through stale handlers.
    pub fn on_sign_out<F>(self: &Arc<Self>, handler: F) -> SignOutRegistration
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut slot = lock(&self.handler);
        slot.generation += 1;
        slot.handler = Some(Arc::new(handler));
        SignOutRegistration {
            manager: Arc::clone(self),
            generation: slot.generation,
        }
    }

    /// Resolve the refresh episode: reset the flag, drain the queue, and
    /// hand every waiter the shared outcome, in insertion order.
    fn finish_refresh(&self, outcome: Result<String, RefreshError>) {
        let waiters = {
            let mut state = lock(&self.state);
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(
            waiters = waiters.len(),
            ok = outcome.is_ok(),
            "refresh episode complete"
        );
        for waiter in waiters {
            // A waiter whose caller went away is fine to skip.
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::auth::credentials::MemoryStore;

    fn manager() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(Arc::new(MemoryStore::new())))
    }

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }

    #[tokio::test]
    async fn test_single_leader_then_waiters() {
        let session = manager();

        let leader = match session.begin_refresh_or_wait() {
            RefreshTicket::Leader(guard) => guard,
            RefreshTicket::Waiter(_) => panic!("first caller must lead"),
        };
        assert!(session.is_refreshing());

        let rx1 = match session.begin_refresh_or_wait() {
            RefreshTicket::Waiter(rx) => rx,
            RefreshTicket::Leader(_) => panic!("second caller must queue"),
        };
        let rx2 = match session.begin_refresh_or_wait() {
            RefreshTicket::Waiter(rx) => rx,
            RefreshTicket::Leader(_) => panic!("third caller must queue"),
        };

        leader.finish(Ok("T2".to_string()));

        assert_eq!(rx1.await.expect("waiter 1"), Ok("T2".to_string()));
        assert_eq!(rx2.await.expect("waiter 2"), Ok("T2".to_string()));
        assert!(!session.is_refreshing());

        // Next episode elects a fresh leader
        assert!(matches!(
            session.begin_refresh_or_wait(),
            RefreshTicket::Leader(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_refresh_rejects_all_waiters() {
        let session = manager();

        let leader = match session.begin_refresh_or_wait() {
            RefreshTicket::Leader(guard) => guard,
            RefreshTicket::Waiter(_) => panic!("first caller must lead"),
        };
        let rx1 = match session.begin_refresh_or_wait() {
            RefreshTicket::Waiter(rx) => rx,
            RefreshTicket::Leader(_) => panic!("must queue"),
        };
        let rx2 = match session.begin_refresh_or_wait() {
            RefreshTicket::Waiter(rx) => rx,
            RefreshTicket::Leader(_) => panic!("must queue"),
        };

        let failure = RefreshError::Upstream {
            status: 400,
            message: "token.invalid".to_string(),
        };
        leader.finish(Err(failure.clone()));

        assert_eq!(rx1.await.expect("waiter 1"), Err(failure.clone()));
        assert_eq!(rx2.await.expect("waiter 2"), Err(failure));
        assert!(!session.is_refreshing());
    }

    #[tokio::test]
    async fn test_dropped_leader_fails_waiters() {
        let session = manager();

        let leader = match session.begin_refresh_or_wait() {
            RefreshTicket::Leader(guard) => guard,
            RefreshTicket::Waiter(_) => panic!("first caller must lead"),
        };
        let rx = match session.begin_refresh_or_wait() {
            RefreshTicket::Waiter(rx) => rx,
            RefreshTicket::Leader(_) => panic!("must queue"),
        };

        // Leader cancelled without finishing
        drop(leader);

        assert_eq!(rx.await.expect("waiter"), Err(RefreshError::Abandoned));
        assert!(!session.is_refreshing());
        assert!(matches!(
            session.begin_refresh_or_wait(),
            RefreshTicket::Leader(_)
        ));
    }

    #[tokio::test]
    async fn test_timed_out_refresh_propagates() {
        let session = manager();

        let leader = match session.begin_refresh_or_wait() {
            RefreshTicket::Leader(guard) => guard,
            RefreshTicket::Waiter(_) => panic!("first caller must lead"),
        };
        let rx = match session.begin_refresh_or_wait() {
            RefreshTicket::Waiter(rx) => rx,
            RefreshTicket::Leader(_) => panic!("must queue"),
        };

        let timeout = RefreshError::TimedOut(Duration::from_secs(15));
        leader.finish(Err(timeout.clone()));
        assert_eq!(rx.await.expect("waiter"), Err(timeout));
    }

    #[test]
    fn test_install_and_sign_out_update_cached_token() {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionManager::new(store.clone() as Arc<dyn CredentialStore>));

        assert_eq!(session.access_token().expect("token"), None);

        session.install_tokens(&pair("T1", "R1")).expect("install");
        assert_eq!(
            session.access_token().expect("token"),
            Some("T1".to_string())
        );
        assert_eq!(store.get().expect("get"), Some(pair("T1", "R1")));

        session.sign_out();
        assert_eq!(session.access_token().expect("token"), None);
        assert!(store.get().expect("get").is_none());
    }

    #[test]
    fn test_sign_out_handler_replaces_not_stacks() {
        let session = manager();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let first_count = first.clone();
        let _reg1 = session.on_sign_out(move || {
            first_count.fetch_add(1, Ordering::SeqCst);
        });
        let second_count = second.clone();
        let reg2 = session.on_sign_out(move || {
            second_count.fetch_add(1, Ordering::SeqCst);
        });

        session.sign_out();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        // Dropping the superseded registration must not remove the active one
        drop(_reg1);
        session.sign_out();
        assert_eq!(second.load(Ordering::SeqCst), 2);

        // Dropping the active registration does
        drop(reg2);
        session.sign_out();
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }
}
