//! # Sawari Runtime
//!
//! The `Store` runtime that drives the booking client's state controllers.
//!
//! A [`Store`] owns one controller: its state (behind a `tokio` read/write
//! lock), its reducer, and its environment. Sending an action runs the
//! reducer under the write lock (every state transition is atomic, no
//! observer can read a torn intermediate) and then executes the returned
//! effects on the tokio runtime. Effects that resolve to an action feed it
//! back through [`Store::send`], closing the command → effect → event loop.
//!
//! Every processed action (commands sent directly and events produced by
//! effects) is also published on a broadcast channel, which is how the
//! application coordinator observes one store to drive another, and how
//! request/response flows wait for their terminal event
//! ([`Store::send_and_wait_for`]).
//!
//! ## Example
//!
//! ```ignore
//! let store = Store::new(SessionState::new(), SessionReducer::new(), env);
//!
//! store.send(SessionAction::RestoreSession).await?;
//! let logged_in = store.state(|s| s.token.is_some()).await;
//! ```

use sawari_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};

pub use error::StoreError;

/// Error types for the Store runtime.
pub mod error {
    use thiserror::Error;

    /// Errors returned by [`crate::Store`] operations.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// The store is shutting down and no longer accepts actions.
        #[error("store is shutting down")]
        ShutdownInProgress,

        /// Timed out waiting for a matching action.
        ///
        /// Returned by `send_and_wait_for` when no action satisfied the
        /// predicate before the deadline, and by `settled` when effects were
        /// still in flight at the deadline.
        #[error("timed out waiting for the store")]
        Timeout,

        /// Shutdown deadline passed with effects still running.
        #[error("shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// The action broadcast channel closed while waiting.
        #[error("action broadcast channel closed")]
        ChannelClosed,
    }
}

/// Decrements the pending-effect counter when an effect task finishes,
/// including on panic.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runtime coordinator for a single state controller.
///
/// The store serializes all mutations through the reducer: concurrent
/// `send` calls queue on the state write lock and apply one at a time.
/// Effects run in spawned tasks and may overlap freely; any ordering a
/// controller needs is expressed in its actions (generation tags, in-flight
/// flags), not by blocking the store.
///
/// # Type Parameters
///
/// - `S`: state type
/// - `A`: action type
/// - `E`: environment type
/// - `R`: reducer implementation
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: Arc<R>,
    environment: Arc<E>,
    shutdown: Arc<AtomicBool>,
    pending_effects: Arc<AtomicUsize>,
    action_broadcast: broadcast::Sender<A>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Clone + Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Default capacity of the action broadcast channel.
    const BROADCAST_CAPACITY: usize = 32;

    /// Create a store from initial state, reducer, and environment.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_broadcast_capacity(initial_state, reducer, environment, Self::BROADCAST_CAPACITY)
    }

    /// Create a store with a custom action broadcast capacity.
    ///
    /// Increase the capacity when observers may lag behind bursts of
    /// actions (the default suits a single coordinator plus a test).
    #[must_use]
    pub fn with_broadcast_capacity(
        initial_state: S,
        reducer: R,
        environment: E,
        capacity: usize,
    ) -> Self {
        let (action_broadcast, _) = broadcast::channel(capacity);

        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer: Arc::new(reducer),
            environment: Arc::new(environment),
            shutdown: Arc::new(AtomicBool::new(false)),
            pending_effects: Arc::new(AtomicUsize::new(0)),
            action_broadcast,
        }
    }

    /// Send an action through the reducer and start its effects.
    ///
    /// Returns once the state transition is applied; effects keep running in
    /// the background. Use [`Store::send_and_wait_for`] when the caller needs
    /// the terminal event of a request/response flow, or [`Store::settled`]
    /// to wait for all in-flight effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting
    /// down.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<(), StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("rejected action: store is shutting down");
            return Err(StoreError::ShutdownInProgress);
        }

        metrics::counter!("store.actions.total").increment(1);

        let broadcast_copy = action.clone();
        let effects = {
            let mut state = self.state.write().await;

            let start = std::time::Instant::now();
            let effects = self
                .reducer
                .reduce(&mut state, action, &self.environment);
            metrics::histogram!("store.reducer.duration_seconds")
                .record(start.elapsed().as_secs_f64());

            effects
        };

        // Effects are spawned before the action is published, so an observer
        // that sees the action can rely on the pending-effect counter
        // already covering its follow-up work.
        tracing::trace!(count = effects.len(), "executing effects");
        for effect in effects {
            self.execute_effect(effect);
        }

        // Published after the transition applied, so an observer reacting to
        // the action reads post-transition state. A send error just means
        // nobody is listening.
        let _ = self.action_broadcast.send(broadcast_copy);

        Ok(())
    }

    /// Read state through a closure, releasing the lock before returning.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Subscribe to every action this store processes.
    ///
    /// Both directly-sent commands and effect-produced events are published,
    /// in the order their state transitions were applied.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Send an action and wait for a matching follow-up action.
    ///
    /// Subscribes before sending so the terminal event cannot be missed,
    /// then returns the first published action satisfying `predicate`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if no matching action arrives in time
    /// - [`StoreError::ChannelClosed`] if the store drops the channel
    /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        let mut rx = self.action_broadcast.subscribe();

        self.send(action).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "action observer lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Wait until no effects are in flight.
    ///
    /// Mostly useful in tests, to assert on state after fire-and-forget
    /// flows have finished.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running at the
    /// deadline.
    pub async fn settled(&self, timeout: Duration) -> Result<(), StoreError> {
        let deadline = tokio::time::Instant::now() + timeout;

        while self.pending_effects.load(Ordering::Acquire) > 0 {
            if tokio::time::Instant::now() >= deadline {
                return Err(StoreError::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Ok(())
    }

    /// Initiate graceful shutdown: reject new actions, wait for effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
    /// when the deadline passes.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("initiating store shutdown");
        self.shutdown.store(true, Ordering::Release);

        match self.settled(timeout).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let pending = self.pending_effects.load(Ordering::Acquire);
                tracing::error!(pending, "shutdown timed out with effects running");
                Err(StoreError::ShutdownTimeout(pending))
            },
        }
    }

    /// Spawn a tracked effect task. The pending counter is incremented
    /// before the spawn and decremented when the task finishes, so `settled`
    /// never reports idle while a feedback action is still being produced.
    fn spawn_tracked<Fut>(&self, fut: Fut)
    where
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.pending_effects.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(Arc::clone(&self.pending_effects));

        tokio::spawn(async move {
            let _guard = guard;
            fut.await;
        });
    }

    /// Execute a single effect description.
    fn execute_effect(&self, effect: Effect<A>) {
        match effect {
            Effect::None => {},
            Effect::Future(fut) => {
                metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                let store = self.clone();
                self.spawn_tracked(async move {
                    if let Some(action) = fut.await {
                        // Feedback during shutdown is dropped, not an error.
                        let _ = store.send(action).await;
                    }
                });
            },
            Effect::Delay { duration, action } => {
                metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                let store = self.clone();
                self.spawn_tracked(async move {
                    tokio::time::sleep(duration).await;
                    let _ = store.send(*action).await;
                });
            },
            Effect::Parallel(effects) => {
                metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                for effect in effects {
                    self.execute_effect(effect);
                }
            },
            Effect::Sequential(effects) => {
                metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
                let store = self.clone();
                self.spawn_tracked(async move {
                    for effect in effects {
                        store.run_inline(effect).await;
                    }
                });
            },
        }
    }

    /// Run an effect to completion inside the current task.
    ///
    /// Used for the steps of a `Sequential` effect, where the next step must
    /// not start before the previous one (and its feedback action) finished.
    fn run_inline(
        &self,
        effect: Effect<A>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        let store = self.clone();
        Box::pin(async move {
            match effect {
                Effect::None => {},
                Effect::Future(fut) => {
                    if let Some(action) = fut.await {
                        let _ = store.send(action).await;
                    }
                },
                Effect::Delay { duration, action } => {
                    tokio::time::sleep(duration).await;
                    let _ = store.send(*action).await;
                },
                Effect::Parallel(effects) => {
                    let steps = effects
                        .into_iter()
                        .map(|effect| store.run_inline(effect))
                        .collect::<Vec<_>>();
                    futures::future::join_all(steps).await;
                },
                Effect::Sequential(effects) => {
                    for effect in effects {
                        store.run_inline(effect).await;
                    }
                },
            }
        })
    }
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: Arc::clone(&self.reducer),
            environment: Arc::clone(&self.environment),
            shutdown: Arc::clone(&self.shutdown),
            pending_effects: Arc::clone(&self.pending_effects),
            action_broadcast: self.action_broadcast.clone(),
        }
    }
}
