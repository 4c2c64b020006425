//! Lazy, thread-safe engine registry.
//!
//! Owns the single construction slot for the semantic engine. The slot
//! moves through an explicit state machine — Empty, Building, Ready,
//! Failed(reason) — broadcast over a watch channel so that any number of
//! concurrent callers coordinate without serializing behind the (slow)
//! construction itself:
//!
//! - the first caller claims Empty (or Failed, retrying) and builds;
//! - late arrivals wait on the channel with a bounded timeout;
//! - success publishes the fully constructed handle and wakes everyone;
//! - failure publishes Failed(reason), releasing waiters with an
//!   initialization error instead of leaving them hanging.
//!
//! The check-and-claim transition happens inside the watch sender's own
//! lock; construction runs outside any lock.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use moneta_types::engine::EngineStatus;
use moneta_types::payload::clean;

use super::contract::{EngineLoader, SemanticEngine};

/// How long a waiter blocks for another caller's construction to finish.
pub const READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Appended to construction failures surfaced to callers.
const MISSING_ASSETS_HINT: &str =
    "check that the intent lexicon and embedding assets are installed";

/// Lifecycle of the engine slot.
enum EnginePhase<E> {
    Empty,
    Building,
    Ready(Arc<E>),
    Failed(String),
}

// Manual impl: `E` itself is not Clone, only the Arc around it is.
impl<E> Clone for EnginePhase<E> {
    fn clone(&self) -> Self {
        match self {
            EnginePhase::Empty => EnginePhase::Empty,
            EnginePhase::Building => EnginePhase::Building,
            EnginePhase::Ready(engine) => EnginePhase::Ready(Arc::clone(engine)),
            EnginePhase::Failed(reason) => EnginePhase::Failed(reason.clone()),
        }
    }
}

/// Why `acquire` did not return a handle.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("timed out waiting for engine initialization")]
    Timeout,

    #[error("engine initialization failed: {0}")]
    Initialization(String),
}

/// Registry owning the lazily constructed engine singleton.
pub struct EngineRegistry<L: EngineLoader> {
    loader: L,
    phase: watch::Sender<EnginePhase<L::Engine>>,
    ready_timeout: Duration,
}

impl<L: EngineLoader> EngineRegistry<L> {
    pub fn new(loader: L) -> Self {
        let (phase, _) = watch::channel(EnginePhase::Empty);
        Self {
            loader,
            phase,
            ready_timeout: READY_TIMEOUT,
        }
    }

    /// Override the waiter timeout (tests use short bounds).
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Return the engine handle, constructing it on first demand.
    ///
    /// At most one caller runs the loader; everyone else either gets the
    /// published handle immediately or waits for the builder, bounded by
    /// the ready timeout. A waiter giving up does not abort the builder.
    pub async fn acquire(&self) -> Result<Arc<L::Engine>, AcquireError> {
        // Fast path: published handle, no claim attempt.
        if let EnginePhase::Ready(engine) = &*self.phase.borrow() {
            return Ok(Arc::clone(engine));
        }

        // Subscribe before claiming so no transition can be missed between
        // the claim decision and the wait.
        let mut rx = self.phase.subscribe();

        let mut claimed = false;
        self.phase.send_if_modified(|phase| match phase {
            // Failed is the resting state after a broken build; claiming it
            // retries construction.
            EnginePhase::Empty | EnginePhase::Failed(_) => {
                *phase = EnginePhase::Building;
                claimed = true;
                true
            }
            EnginePhase::Building | EnginePhase::Ready(_) => false,
        });

        if claimed {
            self.build().await
        } else {
            self.wait_ready(&mut rx).await
        }
    }

    /// Run the loader and publish the outcome. Called by the claiming
    /// caller only; never holds a lock across the load.
    async fn build(&self) -> Result<Arc<L::Engine>, AcquireError> {
        info!("initializing semantic engine");
        let started = Instant::now();

        match self.loader.load().await {
            Ok(engine) => {
                let engine = Arc::new(engine);
                self.phase
                    .send_replace(EnginePhase::Ready(Arc::clone(&engine)));
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "semantic engine initialized"
                );
                Ok(engine)
            }
            Err(err) => {
                error!(error = %err, "semantic engine initialization failed");
                let reason = format!("{err}; {MISSING_ASSETS_HINT}");
                // Broadcast the failure so blocked waiters are released.
                self.phase.send_replace(EnginePhase::Failed(reason.clone()));
                Err(AcquireError::Initialization(reason))
            }
        }
    }

    /// Block on the phase channel until Ready, Failed, or the deadline.
    async fn wait_ready(
        &self,
        rx: &mut watch::Receiver<EnginePhase<L::Engine>>,
    ) -> Result<Arc<L::Engine>, AcquireError> {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            match &*rx.borrow_and_update() {
                EnginePhase::Ready(engine) => return Ok(Arc::clone(engine)),
                EnginePhase::Failed(reason) => {
                    return Err(AcquireError::Initialization(reason.clone()));
                }
                EnginePhase::Empty | EnginePhase::Building => {}
            }

            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    return Err(AcquireError::Initialization(
                        "engine registry dropped".to_string(),
                    ));
                }
                Err(_) => {
                    warn!(
                        timeout_s = self.ready_timeout.as_secs(),
                        "gave up waiting for engine initialization"
                    );
                    return Err(AcquireError::Timeout);
                }
            }
        }
    }

    /// Fire one detached prewarm task so the first user request does not
    /// pay the cold-start cost. Failure is logged, never propagated.
    pub fn prewarm(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            info!("prewarming semantic engine in the background");
            if let Err(err) = registry.acquire().await {
                warn!(error = %err, "background engine prewarm failed");
            }
        })
    }

    /// The published handle, if construction has completed. Never triggers
    /// construction.
    pub fn ready_engine(&self) -> Option<Arc<L::Engine>> {
        match &*self.phase.borrow() {
            EnginePhase::Ready(engine) => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    /// Snapshot the slot state without triggering construction.
    pub fn status(&self) -> EngineStatus {
        match &*self.phase.borrow() {
            EnginePhase::Empty | EnginePhase::Failed(_) => EngineStatus::uninitialized(false),
            EnginePhase::Building => EngineStatus::uninitialized(true),
            EnginePhase::Ready(engine) => EngineStatus::ready(
                clean(engine.context()).into(),
                engine.memory_len(),
                engine.cache_len(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use moneta_types::engine::{EngineReply, EngineRequest};
    use moneta_types::error::EngineError;
    use moneta_types::payload::EngineValue;

    #[derive(Debug)]
    struct NoopEngine;

    impl SemanticEngine for NoopEngine {
        async fn process(&self, request: EngineRequest) -> Result<EngineReply, EngineError> {
            Ok(EngineReply {
                response: format!("echo: {}", request.query),
                intent: None,
                confidence: None,
                data: None,
                chart_type: None,
                understanding: None,
            })
        }

        fn reset(&self) {}

        fn context(&self) -> EngineValue {
            EngineValue::Map(EngineValue::map())
        }

        fn memory_len(&self) -> usize {
            3
        }

        fn cache_len(&self) -> usize {
            5
        }
    }

    /// Counts loads; optionally delays or fails the first `fail_first` loads.
    struct CountingLoader {
        loads: AtomicUsize,
        fail_first: usize,
        delay: Duration,
    }

    impl CountingLoader {
        fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail_first: 0,
                delay: Duration::ZERO,
            }
        }

        fn failing_first(n: usize) -> Self {
            Self {
                fail_first: n,
                ..Self::new()
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }
    }

    impl EngineLoader for CountingLoader {
        type Engine = NoopEngine;

        async fn load(&self) -> Result<NoopEngine, EngineError> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if attempt < self.fail_first {
                return Err(EngineError::Construction("lexicon missing".to_string()));
            }
            Ok(NoopEngine)
        }
    }

    /// Loader whose construction never completes.
    struct HangingLoader;

    impl EngineLoader for HangingLoader {
        type Engine = NoopEngine;

        async fn load(&self) -> Result<NoopEngine, EngineError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_concurrent_acquires_construct_once() {
        let registry = Arc::new(EngineRegistry::new(CountingLoader::with_delay(
            Duration::from_millis(20),
        )));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.acquire().await }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }

        assert_eq!(registry.loader.loads.load(Ordering::SeqCst), 1);
        for handle in &handles {
            assert!(Arc::ptr_eq(handle, &handles[0]));
        }
    }

    #[tokio::test]
    async fn test_acquire_after_ready_is_cheap_read() {
        let registry = EngineRegistry::new(CountingLoader::new());
        registry.acquire().await.unwrap();
        registry.acquire().await.unwrap();
        registry.acquire().await.unwrap();
        assert_eq!(registry.loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_construction_allows_retry() {
        let registry = EngineRegistry::new(CountingLoader::failing_first(1));

        let err = registry.acquire().await.unwrap_err();
        match err {
            AcquireError::Initialization(reason) => {
                assert!(reason.contains("lexicon missing"));
                assert!(reason.contains("intent lexicon"));
            }
            other => panic!("expected Initialization, got {other:?}"),
        }

        // Second attempt claims the Failed slot and succeeds.
        registry.acquire().await.unwrap();
        assert_eq!(registry.loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_waiter_released_when_construction_fails() {
        let loader = CountingLoader {
            loads: AtomicUsize::new(0),
            fail_first: 1,
            delay: Duration::from_millis(30),
        };
        let registry = Arc::new(EngineRegistry::new(loader));

        let builder = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire().await })
        };
        // Let the builder claim the slot before the waiter arrives.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire().await })
        };

        assert!(matches!(
            builder.await.unwrap(),
            Err(AcquireError::Initialization(_))
        ));
        // The waiter must be released, not hang.
        assert!(matches!(
            waiter.await.unwrap(),
            Err(AcquireError::Initialization(_))
        ));
    }

    #[tokio::test]
    async fn test_waiter_times_out_while_builder_continues() {
        let registry = Arc::new(
            EngineRegistry::new(HangingLoader).with_ready_timeout(Duration::from_millis(50)),
        );

        let builder = registry.prewarm();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let err = registry.acquire().await.unwrap_err();
        assert!(matches!(err, AcquireError::Timeout));

        // The builder was not aborted by the waiter giving up.
        assert!(!builder.is_finished());
        builder.abort();
    }

    #[tokio::test]
    async fn test_status_never_triggers_construction() {
        let registry = EngineRegistry::new(CountingLoader::new());

        let status = registry.status();
        assert!(!status.initialized);
        assert!(!status.loading);
        assert_eq!(registry.loader.loads.load(Ordering::SeqCst), 0);
        assert!(registry.ready_engine().is_none());
    }

    #[tokio::test]
    async fn test_status_reports_building() {
        let registry = Arc::new(EngineRegistry::new(HangingLoader));
        let builder = registry.prewarm();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let status = registry.status();
        assert!(!status.initialized);
        assert!(status.loading);
        builder.abort();
    }

    #[tokio::test]
    async fn test_status_reports_engine_sizes_when_ready() {
        let registry = EngineRegistry::new(CountingLoader::new());
        registry.acquire().await.unwrap();

        let status = registry.status();
        assert!(status.initialized);
        assert!(!status.loading);
        assert_eq!(status.memory_size, Some(3));
        assert_eq!(status.cache_size, Some(5));
        assert!(status.context.is_some());
        assert!(registry.ready_engine().is_some());
    }

    #[tokio::test]
    async fn test_prewarm_failure_is_swallowed() {
        let registry = Arc::new(EngineRegistry::new(CountingLoader::failing_first(1)));
        registry.prewarm().await.unwrap();

        // Prewarm logged the failure; a later caller can still retry.
        registry.acquire().await.unwrap();
        assert_eq!(registry.loader.loads.load(Ordering::SeqCst), 2);
    }
}
