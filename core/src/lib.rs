//! # Sawari Core
//!
//! Core traits and types for the sawari booking client architecture.
//!
//! The client is built as a set of independent state controllers, each a pure
//! [`reducer::Reducer`] over its own state slice. Controllers never perform
//! I/O directly: they return [`effect::Effect`] descriptions that the runtime
//! executes, feeding any resulting actions back into the reducer. External
//! dependencies (HTTP client, credential storage, clock, notification surface)
//! are injected through each controller's `Environment` type.
//!
//! ## Core Concepts
//!
//! - **State**: owned, `Clone`-able domain state for one controller
//! - **Action**: every input a controller reacts to: user commands and the
//!   completion events produced by its own effects
//! - **Reducer**: `(State, Action, Environment) → Effects`, mutating state in
//!   place; the runtime runs it under a write lock so every mutation is atomic
//! - **Effect**: a description of asynchronous work, not the work itself
//!
//! ## Example
//!
//! ```
//! use sawari_core::{effect::Effect, reducer::Reducer, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     count: i32,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Self::State,
//!         action: Self::Action,
//!         _env: &Self::Environment,
//!     ) -> SmallVec<[Effect<Self::Action>; 4]> {
//!         match action {
//!             CounterAction::Increment => {
//!                 state.count += 1;
//!                 SmallVec::new()
//!             }
//!         }
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub use effect::Effect;
pub use reducer::Reducer;

/// The core trait every state controller implements.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// A pure state-transition function with explicit effects.
    ///
    /// Reducers contain all of a controller's decision logic. They validate
    /// the incoming action against the current state, mutate the state in
    /// place, and describe (never execute) any asynchronous follow-up work.
    ///
    /// The runtime invokes `reduce` while holding the state write lock, so a
    /// single action is applied atomically: no other reader or writer can
    /// observe a half-applied transition.
    pub trait Reducer {
        /// The state slice this reducer owns.
        type State;

        /// The action type this reducer processes.
        type Action;

        /// Injected dependencies (API clients, storage, clock, notifier).
        type Environment;

        /// Apply one action: validate, mutate state, describe effects.
        ///
        /// Returning an empty vector means the action completed synchronously.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side-effect descriptions returned by reducers.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// A description of asynchronous work to be executed by the runtime.
    ///
    /// Effects are values. A reducer that wants to call the network returns
    /// an [`Effect::Future`] wrapping the call; the runtime spawns it and, if
    /// the future resolves to `Some(action)`, feeds that action back into the
    /// reducer. This is how request/response flows and timers are modeled
    /// without the reducer ever suspending.
    #[allow(missing_docs)]
    pub enum Effect<Action> {
        /// No follow-up work.
        None,

        /// Run the contained effects concurrently.
        Parallel(Vec<Effect<Action>>),

        /// Run the contained effects one after another, waiting for each.
        Sequential(Vec<Effect<Action>>),

        /// Dispatch an action after a delay. Used for timed refresh ticks;
        /// a tick chain is broken by the reducer declining to re-arm it.
        Delay {
            /// How long to wait before dispatching.
            duration: Duration,
            /// The action to dispatch once the delay elapses.
            action: Box<Action>,
        },

        /// Arbitrary async computation. `Some(action)` is fed back into the
        /// reducer; `None` ends the flow.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action> Effect<Action> {
        /// Wrap an async computation as an effect.
        ///
        /// Sugar for `Effect::Future(Box::pin(fut))`, which keeps reducer
        /// match arms readable.
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Combine effects to run concurrently.
        #[must_use]
        pub fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run one after another.
        #[must_use]
        pub fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }
    }

    // Manual Debug since Future has no Debug impl.
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }
}

/// Dependency-injection traits shared by every controller environment.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Abstracts time so reducers can timestamp state deterministically in
    /// tests.
    pub trait Clock: Send + Sync {
        /// The current time.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};
    use super::reducer::Reducer;
    use super::SmallVec;
    use std::time::Duration;

    #[derive(Clone, Debug, Default)]
    struct TestState {
        applied: Vec<&'static str>,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Mark(&'static str),
    }

    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            let TestAction::Mark(label) = action;
            state.applied.push(label);
            SmallVec::new()
        }
    }

    #[test]
    fn reducer_mutates_state_in_place() {
        let mut state = TestState::default();
        let effects = TestReducer.reduce(&mut state, TestAction::Mark("a"), &());
        assert!(effects.is_empty());
        assert_eq!(state.applied, vec!["a"]);
    }

    #[test]
    fn effect_debug_formats_every_variant() {
        let none: Effect<TestAction> = Effect::None;
        assert_eq!(format!("{none:?}"), "Effect::None");

        let delay: Effect<TestAction> = Effect::Delay {
            duration: Duration::from_secs(1),
            action: Box::new(TestAction::Mark("tick")),
        };
        assert!(format!("{delay:?}").contains("Effect::Delay"));

        let fut: Effect<TestAction> = Effect::future(async { None });
        assert_eq!(format!("{fut:?}"), "Effect::Future(<future>)");

        let merged = Effect::merge(vec![Effect::<TestAction>::None]);
        assert!(format!("{merged:?}").starts_with("Effect::Parallel"));

        let chained = Effect::chain(vec![Effect::<TestAction>::None]);
        assert!(format!("{chained:?}").starts_with("Effect::Sequential"));
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
