use std::time::Duration;

use rowcast_core::TopicOp;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{dispatch, Connector, TopicSession};
use crate::error::{SinkError, SinkResult};
use crate::shutdown::Shutdown;

/// How long an operation already in flight may keep running once shutdown is asserted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Exponential backoff between connection attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retrying after `attempt` consecutive failures (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Where the manager is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session; the next operation triggers a connection attempt.
    Disconnected,
    /// A connection attempt is in progress or backing off.
    Connecting,
    /// A session is open.
    Connected,
    /// The manager was closed and releases no further sessions.
    Closed,
}

/// Owns the topic store session and keeps it alive.
///
/// Operations block until they succeed: when the session drops, the manager
/// reconnects with backoff and repeats the operation. The only ways out are
/// success, a permanent error for that operation, or shutdown.
pub struct SessionManager<C: Connector> {
    connector: C,
    policy: ReconnectPolicy,
    shutdown: Shutdown,
    session: Option<C::Session>,
    state: SessionState,
    /// Incremented on every successful connect.
    generation: u64,
    /// Operation failures since the last successful operation.
    failures: u32,
}

impl<C: Connector> SessionManager<C> {
    pub fn new(connector: C, policy: ReconnectPolicy, shutdown: Shutdown) -> Self {
        Self {
            connector,
            policy,
            shutdown,
            session: None,
            state: SessionState::Disconnected,
            generation: 0,
            failures: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of sessions opened so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Block until a session is open.
    ///
    /// Failed attempts are retried with backoff for as long as it takes.
    /// Returns [`SinkError::Shutdown`] if shutdown is asserted while no
    /// session is available.
    pub async fn ensure_session(&mut self) -> SinkResult<()> {
        if self.state == SessionState::Closed {
            return Err(SinkError::Shutdown);
        }

        if self.session.as_ref().is_some_and(|s| !s.is_open()) {
            info!(endpoint = %self.connector.endpoint(), "Session closed, reconnecting");
            self.session = None;
            self.state = SessionState::Disconnected;
        }

        let mut attempt: u32 = 0;
        while self.session.is_none() {
            self.state = SessionState::Connecting;

            match self.connector.connect().await {
                Ok(session) => {
                    self.session = Some(session);
                    self.state = SessionState::Connected;
                    self.generation += 1;
                    info!(
                        endpoint = %self.connector.endpoint(),
                        generation = self.generation,
                        "Connected to topic store"
                    );
                }
                Err(e) => {
                    self.state = SessionState::Disconnected;
                    if self.shutdown.is_requested() {
                        return Err(SinkError::Shutdown);
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        endpoint = %self.connector.endpoint(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Unable to connect to topic store, retrying"
                    );
                    attempt = attempt.saturating_add(1);

                    let mut shutdown = self.shutdown.clone();
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = shutdown.requested() => return Err(SinkError::Shutdown),
                    }
                }
            }
        }

        Ok(())
    }

    /// Apply one operation, reconnecting and retrying on transport failures.
    ///
    /// A session that fails an operation is dropped and the manager backs off
    /// before reconnecting. The delay grows with every failure until an
    /// operation succeeds.
    pub async fn apply(&mut self, op: &TopicOp) -> SinkResult<()> {
        loop {
            if self.shutdown.is_requested() {
                return Err(SinkError::Shutdown);
            }
            self.ensure_session().await?;

            let session = self.session.as_mut().ok_or(SinkError::NotConnected)?;
            let mut shutdown = self.shutdown.clone();
            let result = tokio::select! {
                result = dispatch(session, op) => result,
                _ = async {
                    shutdown.requested().await;
                    sleep(SHUTDOWN_GRACE).await;
                } => Err(SinkError::Shutdown),
            };

            match result {
                Ok(()) => {
                    self.failures = 0;
                    debug!(op = op.kind(), path = %op.path(), "Applied topic operation");
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    let delay = self.policy.delay_for(self.failures);
                    warn!(
                        op = op.kind(),
                        path = %op.path(),
                        attempt = self.failures + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Topic store operation failed, reconnecting"
                    );
                    self.failures = self.failures.saturating_add(1);
                    self.drop_session().await;

                    let mut shutdown = self.shutdown.clone();
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = shutdown.requested() => return Err(SinkError::Shutdown),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Release the session. Further operations fail with [`SinkError::Shutdown`].
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
            info!(endpoint = %self.connector.endpoint(), "Topic store session released");
        }
        self.state = SessionState::Closed;
    }

    async fn drop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTopicStore;
    use crate::shutdown::shutdown_channel;
    use rowcast_core::{PatchOp, TopicPath, TopicShape};
    use serde_json::{json, Value};
    use std::future::{ready, Future};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Accepts every connection, then fails every operation on it.
    #[derive(Clone, Default)]
    struct FlakyConnector {
        connects: Arc<AtomicU64>,
    }

    impl FlakyConnector {
        fn connects(&self) -> u64 {
            self.connects.load(Ordering::SeqCst)
        }
    }

    struct FlakySession;

    impl TopicSession for FlakySession {
        fn is_open(&self) -> bool {
            true
        }

        fn create_empty_topic(
            &mut self,
            _path: &TopicPath,
            _shape: TopicShape,
        ) -> impl Future<Output = SinkResult<()>> + Send {
            ready(Err(SinkError::SessionClosed))
        }

        fn set_topic_value(
            &mut self,
            _path: &TopicPath,
            _value: &Value,
        ) -> impl Future<Output = SinkResult<()>> + Send {
            ready(Err(SinkError::SessionClosed))
        }

        fn apply_patch(
            &mut self,
            _path: &TopicPath,
            _patch: &[PatchOp],
        ) -> impl Future<Output = SinkResult<()>> + Send {
            ready(Err(SinkError::SessionClosed))
        }

        fn remove_topic(&mut self, _path: &TopicPath) -> impl Future<Output = SinkResult<()>> + Send {
            ready(Err(SinkError::SessionClosed))
        }

        fn close(&mut self) -> impl Future<Output = ()> + Send {
            ready(())
        }
    }

    impl Connector for FlakyConnector {
        type Session = FlakySession;

        fn connect(&self) -> impl Future<Output = SinkResult<FlakySession>> + Send {
            self.connects.fetch_add(1, Ordering::SeqCst);
            ready(Ok(FlakySession))
        }

        fn endpoint(&self) -> String {
            "flaky".to_string()
        }
    }

    fn create_orders() -> TopicOp {
        TopicOp::create_empty(TopicPath::table("db", "orders"), TopicShape::Sequence)
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(16_000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_multiplier_below_one_is_constant() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 0.5,
        };
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_session_retries_until_connected() {
        let store = MemoryTopicStore::new();
        store.refuse_connections(3);
        let (_tx, shutdown) = shutdown_channel();

        let mut manager = SessionManager::new(store.clone(), ReconnectPolicy::default(), shutdown);
        assert_eq!(manager.state(), SessionState::Disconnected);

        manager.ensure_session().await.unwrap();
        assert_eq!(manager.state(), SessionState::Connected);
        assert_eq!(manager.generation(), 1);
        assert_eq!(store.connection_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_reconnects_after_session_drop() {
        let store = MemoryTopicStore::new();
        let (_tx, shutdown) = shutdown_channel();
        let mut manager = SessionManager::new(store.clone(), ReconnectPolicy::default(), shutdown);

        let path = TopicPath::table("db", "orders");
        manager
            .apply(&TopicOp::create_empty(path.clone(), TopicShape::Sequence))
            .await
            .unwrap();

        store.drop_session_after(0);
        manager
            .apply(&TopicOp::patch(path.clone(), PatchOp::append(json!({"id": "A"}))))
            .await
            .unwrap();

        assert_eq!(manager.generation(), 2);
        assert_eq!(store.topic(&path), Some(json!([{"id": "A"}])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_returned() {
        let store = MemoryTopicStore::new();
        let (_tx, shutdown) = shutdown_channel();
        let mut manager = SessionManager::new(store.clone(), ReconnectPolicy::default(), shutdown);

        let result = manager
            .apply(&TopicOp::patch(
                TopicPath::table("db", "missing"),
                PatchOp::remove_index(0),
            ))
            .await;
        assert!(matches!(result, Err(SinkError::TopicNotFound(_))));
        assert_eq!(manager.state(), SessionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_reconnect_wait() {
        let store = MemoryTopicStore::new();
        store.refuse_connections(u32::MAX);
        let (tx, shutdown) = shutdown_channel();
        let mut manager = SessionManager::new(store.clone(), ReconnectPolicy::default(), shutdown);

        let waiter = tokio::spawn(async move { manager.ensure_session().await });
        tokio::time::sleep(Duration::from_secs(60)).await;
        tx.shutdown();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(SinkError::Shutdown)));
        assert!(store.connection_attempts() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_operations_back_off_between_reconnects() {
        let connector = FlakyConnector::default();
        let (tx, shutdown) = shutdown_channel();
        let mut manager =
            SessionManager::new(connector.clone(), ReconnectPolicy::default(), shutdown);

        let waiter = tokio::spawn(async move { manager.apply(&create_orders()).await });

        // Delays of 1s, 2s and 4s put the fourth connect at t=7s and the fifth at t=15s.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.connects(), 4);

        tx.shutdown();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(SinkError::Shutdown)));
        assert_eq!(connector.connects(), 4);
    }

    #[tokio::test]
    async fn test_apply_after_shutdown_returns_immediately() {
        let connector = FlakyConnector::default();
        let (tx, shutdown) = shutdown_channel();
        tx.shutdown();
        let mut manager =
            SessionManager::new(connector.clone(), ReconnectPolicy::default(), shutdown);

        let result = tokio::time::timeout(Duration::from_secs(1), manager.apply(&create_orders()))
            .await
            .unwrap();
        assert!(matches!(result, Err(SinkError::Shutdown)));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_close_releases_session() {
        let store = MemoryTopicStore::new();
        let (_tx, shutdown) = shutdown_channel();
        let mut manager = SessionManager::new(store.clone(), ReconnectPolicy::default(), shutdown);

        manager.ensure_session().await.unwrap();
        manager.close().await;
        assert_eq!(manager.state(), SessionState::Closed);
        assert!(matches!(
            manager.ensure_session().await,
            Err(SinkError::Shutdown)
        ));
    }
}
