//! # Sawari Testing
//!
//! Test utilities for the booking client's reducers.
//!
//! [`ReducerTest`] drives a reducer directly (no store, no executed effects)
//! with a Given/When/Then surface. Because effects are inert values here, a
//! flow that normally completes through effect feedback is tested by feeding
//! the feedback actions explicitly via [`ReducerTest::when_actions`].
//!
//! ## Example
//!
//! ```ignore
//! ReducerTest::new(BookingReducer::new())
//!     .with_env(test_environment())
//!     .given_state(BookingState::new())
//!     .when_actions(vec![
//!         BookingAction::SelectTrip { bus: bus_a(), travel_date: date() },
//!         BookingAction::SelectTrip { bus: bus_a(), travel_date: date() },
//!     ])
//!     .then_state(|state| assert!(state.selection.is_empty()))
//!     .run();
//! ```

use sawari_core::SmallVec;
use sawari_core::{effect::Effect, reducer::Reducer};

pub use mocks::{FixedClock, test_clock};

/// Type alias for state assertion functions.
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions.
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent Given/When/Then harness for a single reducer.
///
/// When several actions are given, they are reduced in order against the
/// same state; effect assertions see the effects of the **last** action
/// only, since earlier effects would already have been consumed by the
/// runtime in a real flow.
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a test around the given reducer.
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Inject the environment.
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the starting state (Given).
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set a single action to reduce (When).
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions = vec![action];
        self
    }

    /// Set a sequence of actions to reduce in order (When).
    #[must_use]
    pub fn when_actions(mut self, actions: Vec<A>) -> Self {
        self.actions = actions;
        self
    }

    /// Assert on the state after all actions were reduced (Then).
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Assert on the effects of the last reduced action (Then).
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Reduce the actions and execute all assertions.
    ///
    /// # Panics
    ///
    /// Panics if state, environment, or at least one action is missing, or
    /// if an assertion fails.
    #[allow(clippy::panic, clippy::expect_used)] // test harness surfaces misuse loudly
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("initial state must be set with given_state()");

        let env = self
            .environment
            .expect("environment must be set with with_env()");

        assert!(
            !self.actions.is_empty(),
            "at least one action must be set with when_action() or when_actions()"
        );

        let mut last_effects: SmallVec<[Effect<A>; 4]> = SmallVec::new();
        for action in self.actions {
            last_effects = self.reducer.reduce(&mut state, action, &env);
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&last_effects);
        }
    }
}

/// Deterministic environment doubles.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use sawari_core::environment::Clock;

    /// A clock frozen at a fixed instant.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a clock frozen at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// The default test instant (2025-06-01 09:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Never in practice; the hardcoded timestamp always parses.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-06-01T09:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Assertion helpers over effect slices.
pub mod assertions {
    use sawari_core::effect::Effect;

    /// Assert that the reducer produced no effects.
    ///
    /// # Panics
    ///
    /// Panics if any effect other than `Effect::None` is present.
    #[allow(clippy::panic)]
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the exact number of effects.
    ///
    /// # Panics
    ///
    /// Panics if the count differs.
    #[allow(clippy::panic)]
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that at least one `Future` effect is present (a network or
    /// storage call was described).
    ///
    /// # Panics
    ///
    /// Panics if no `Future` effect is found.
    #[allow(clippy::panic)]
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(has_future),
            "expected at least one Future effect, but none found"
        );
    }

    /// Assert that at least one `Delay` effect is present (a timer was
    /// armed).
    ///
    /// # Panics
    ///
    /// Panics if no `Delay` effect is found.
    #[allow(clippy::panic)]
    pub fn assert_has_delay_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(has_delay),
            "expected at least one Delay effect, but none found"
        );
    }

    fn has_future<A>(effect: &Effect<A>) -> bool {
        match effect {
            Effect::Future(_) => true,
            Effect::Parallel(inner) | Effect::Sequential(inner) => inner.iter().any(has_future),
            _ => false,
        }
    }

    fn has_delay<A>(effect: &Effect<A>) -> bool {
        match effect {
            Effect::Delay { .. } => true,
            Effect::Parallel(inner) | Effect::Sequential(inner) => inner.iter().any(has_delay),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sawari_core::environment::Clock;

    #[derive(Clone, Debug, Default)]
    struct TestState {
        count: i32,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Increment,
        IncrementAndPing,
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
            match action {
                TestAction::Increment => {
                    state.count += 1;
                    SmallVec::new()
                }
                TestAction::IncrementAndPing => {
                    state.count += 1;
                    let mut effects: SmallVec<[Effect<Self::Action>; 4]> = SmallVec::new();
                    effects.push(Effect::future(async { None }));
                    effects
                }
            }
        }
    }

    #[test]
    fn single_action_flow() {
        ReducerTest::new(TestReducer)
            .with_env(())
            .given_state(TestState::default())
            .when_action(TestAction::Increment)
            .then_state(|state| assert_eq!(state.count, 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn action_sequence_reduces_in_order_and_keeps_last_effects() {
        ReducerTest::new(TestReducer)
            .with_env(())
            .given_state(TestState::default())
            .when_actions(vec![
                TestAction::Increment,
                TestAction::Increment,
                TestAction::IncrementAndPing,
            ])
            .then_state(|state| assert_eq!(state.count, 3))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn fixed_clock_is_frozen() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }
}
