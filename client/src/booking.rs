//! The booking session controller: trip and seat selection, availability,
//! and the booking workflow.
//!
//! Owns the catalog data (cities, search results), the selected trip, the
//! seat-availability cache, and the seat selection. The cache is the only
//! authority for whether a seat may be selected; every reload replaces it
//! wholesale and re-derives the selection against it. Responses are tagged
//! with the trip, date, and load generation they were issued for, so a
//! response belonging to a superseded trip is dropped on arrival instead of
//! corrupting the current one.

use crate::api::{BookRequest, CatalogApi};
use crate::error::ClientError;
use crate::notify::{Notification, Notifier};
use crate::types::{
    AuthToken, Booking, BookingReceipt, BookingStatus, BusSummary, City, ContactInfo, Passenger,
    RouteSearch, Seat, SeatNo, SelectedTrip,
};
use chrono::{DateTime, NaiveDate, Utc};
use sawari_core::environment::Clock;
use sawari_core::{Effect, Reducer, SmallVec, smallvec};
use std::sync::Arc;

use crate::config::RefreshConfig;

// ============================================================================
// State
// ============================================================================

/// Where the booking workflow currently stands.
///
/// `Confirmed` and `Rejected` are transient: the mandatory post-attempt
/// availability reload moves the machine back to a selection state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingPhase {
    /// No trip selected.
    Idle,
    /// A trip is selected; its seat map has not loaded yet.
    TripSelected,
    /// The seat map is loaded and no seats are selected.
    AvailabilityLoaded,
    /// The seat map is loaded and at least one seat is selected.
    SeatsSelected,
    /// A booking attempt is in flight. At most one at a time.
    Submitting,
    /// The last attempt was confirmed; selection is already cleared.
    Confirmed,
    /// The last attempt was rejected; selection is preserved.
    Rejected,
}

/// State of the booking session controller.
#[derive(Clone, Debug)]
pub struct BookingState {
    /// Workflow phase.
    pub phase: BookingPhase,
    /// Cities offered as route endpoints.
    pub cities: Vec<City>,
    /// The submitted route query, if any. Immutable; a new search replaces
    /// it and invalidates everything downstream.
    pub search: Option<RouteSearch>,
    /// Buses matching the current search.
    pub buses: Vec<BusSummary>,
    /// Informational message from the last search.
    pub search_message: Option<String>,
    /// The trip being booked.
    pub trip: Option<SelectedTrip>,
    /// The seat-availability cache for the selected trip, in server order.
    pub seats: Vec<Seat>,
    /// When the cache was last replaced.
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Selected seat labels, in the order they were picked. Always a subset
    /// of the currently available seats.
    pub selection: Vec<SeatNo>,
    /// Receipt of the last confirmed attempt.
    pub receipt: Option<BookingReceipt>,
    /// Booking history of the authenticated user.
    pub my_bookings: Vec<Booking>,
    /// Bearer token mirrored from the session manager via `AuthChanged`.
    pub auth_token: Option<AuthToken>,
    /// Load generation. Bumped whenever the trip context changes; responses
    /// and refresh ticks carrying an older generation are dropped.
    pub generation: u64,
    /// Last surfaced failure, for inline display.
    pub last_error: Option<String>,
}

impl BookingState {
    /// The state before any interaction.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: BookingPhase::Idle,
            cities: Vec::new(),
            search: None,
            buses: Vec::new(),
            search_message: None,
            trip: None,
            seats: Vec::new(),
            last_refreshed_at: None,
            selection: Vec::new(),
            receipt: None,
            my_bookings: Vec::new(),
            auth_token: None,
            generation: 0,
            last_error: None,
        }
    }

    /// Look up a seat in the availability cache.
    #[must_use]
    pub fn seat(&self, seat_no: &SeatNo) -> Option<&Seat> {
        self.seats.iter().find(|s| &s.seat_no == seat_no)
    }

    /// Total fare of the current selection.
    ///
    /// Derived on demand from the cache so prices are always the server's
    /// latest; never cached across a reload.
    #[must_use]
    pub fn fare(&self) -> f64 {
        self.seats
            .iter()
            .filter(|s| self.selection.contains(&s.seat_no))
            .map(|s| s.price)
            .sum()
    }

    /// The selection in display order (the cache's order, not pick order).
    #[must_use]
    pub fn ordered_selection(&self) -> Vec<SeatNo> {
        self.seats
            .iter()
            .filter(|s| self.selection.contains(&s.seat_no))
            .map(|s| s.seat_no.clone())
            .collect()
    }

    /// The selection-derived phase once a seat map is loaded.
    const fn selection_phase(&self) -> BookingPhase {
        if self.selection.is_empty() {
            BookingPhase::AvailabilityLoaded
        } else {
            BookingPhase::SeatsSelected
        }
    }

    /// Whether a response tag still matches the current trip context.
    fn accepts_response(&self, bus_id: &str, travel_date: NaiveDate, generation: u64) -> bool {
        generation == self.generation
            && self
                .trip
                .as_ref()
                .is_some_and(|t| t.bus.id == bus_id && t.travel_date == travel_date)
    }
}

impl Default for BookingState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Everything the booking controller reacts to.
#[derive(Clone, Debug)]
pub enum BookingAction {
    // ========== Commands ==========
    /// Fetch the list of cities.
    LoadCities,

    /// Run a route search. Replaces the prior search and invalidates any
    /// trip or seat selection made under it.
    SearchBuses {
        /// The route query.
        query: RouteSearch,
    },

    /// Pick a bus for a travel date. Always starts a fresh booking attempt:
    /// selection and cache are cleared even when the same bus is re-picked.
    SelectTrip {
        /// The chosen bus.
        bus: BusSummary,
        /// The travel date.
        travel_date: NaiveDate,
    },

    /// Reload the seat map for the selected trip. Safe no-op without one.
    /// Serves both the manual refresh control and the timed refresh.
    RefreshAvailability,

    /// Flip a seat in or out of the selection. Silently ignored for seats
    /// that are unknown or unavailable in the current cache.
    ToggleSeat {
        /// The seat label.
        seat_no: SeatNo,
    },

    /// Submit the booking attempt for the current selection.
    ConfirmBooking {
        /// One entry per selected seat.
        passengers: Vec<Passenger>,
        /// Contact details for the booking.
        contact: ContactInfo,
    },

    /// Fetch the authenticated user's booking history.
    LoadMyBookings,

    /// Session change fed in by the application coordinator.
    AuthChanged {
        /// The new token, or `None` when the session ended.
        token: Option<AuthToken>,
    },

    /// Timed-refresh tick. Re-arms itself only while its generation is
    /// still current, so changing trips stops the chain cleanly.
    Tick {
        /// The generation this tick was armed for.
        generation: u64,
    },

    // ========== Events ==========
    /// The city list arrived.
    CitiesLoaded {
        /// All cities.
        cities: Vec<City>,
    },

    /// The city list fetch failed.
    CitiesFailed {
        /// The classified failure.
        error: ClientError,
    },

    /// Search results arrived.
    BusesLoaded {
        /// The query the results belong to.
        query: RouteSearch,
        /// Matching buses.
        buses: Vec<BusSummary>,
        /// Informational message from the server.
        message: Option<String>,
    },

    /// The search failed.
    BusesFailed {
        /// The query the failure belongs to.
        query: RouteSearch,
        /// The classified failure.
        error: ClientError,
    },

    /// A seat map arrived.
    AvailabilityLoaded {
        /// Bus the map belongs to.
        bus_id: String,
        /// Travel date the map belongs to.
        travel_date: NaiveDate,
        /// Generation the request was issued under.
        generation: u64,
        /// The full seat map; replaces the cache wholesale.
        seats: Vec<Seat>,
    },

    /// A seat-map fetch failed.
    AvailabilityFailed {
        /// Bus the failure belongs to.
        bus_id: String,
        /// Travel date the failure belongs to.
        travel_date: NaiveDate,
        /// Generation the request was issued under.
        generation: u64,
        /// The classified failure.
        error: ClientError,
    },

    /// The server confirmed the booking attempt.
    BookingConfirmed {
        /// The confirmation receipt.
        receipt: BookingReceipt,
    },

    /// The server rejected the booking attempt.
    BookingRejected {
        /// The classified rejection.
        error: ClientError,
    },

    /// The booking history arrived.
    BookingsLoaded {
        /// The history, newest first as served.
        bookings: Vec<Booking>,
    },

    /// The booking-history fetch failed.
    BookingsFailed {
        /// The classified failure.
        error: ClientError,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Injected dependencies for the booking controller.
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Catalog and booking endpoints.
    pub catalog_api: Arc<dyn CatalogApi>,
    /// Time source for cache freshness stamps.
    pub clock: Arc<dyn Clock>,
    /// User-visible notification sink.
    pub notifier: Arc<dyn Notifier>,
    /// Timed-refresh behavior, read once at construction.
    pub refresh: RefreshConfig,
}

impl BookingEnvironment {
    /// Bundle the booking controller's collaborators.
    #[must_use]
    pub fn new(
        catalog_api: Arc<dyn CatalogApi>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        refresh: RefreshConfig,
    ) -> Self {
        Self {
            catalog_api,
            clock,
            notifier,
            refresh,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the booking session controller.
#[derive(Clone, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_search(query: &RouteSearch) -> Result<(), ClientError> {
        if query.from_city_id.trim().is_empty() || query.to_city_id.trim().is_empty() {
            return Err(ClientError::Validation(
                "pick both an origin and a destination".to_string(),
            ));
        }
        if query.from_city_id == query.to_city_id {
            return Err(ClientError::Validation(
                "origin and destination must differ".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_confirmation(
        state: &BookingState,
        passengers: &[Passenger],
        contact: &ContactInfo,
    ) -> Result<(), ClientError> {
        if state.selection.is_empty() {
            return Err(ClientError::Validation(
                "select at least one seat".to_string(),
            ));
        }
        if passengers.len() != state.selection.len() {
            return Err(ClientError::Validation(
                "provide one passenger per selected seat".to_string(),
            ));
        }
        if contact.phone.trim().is_empty() {
            return Err(ClientError::Validation(
                "a contact phone number is required".to_string(),
            ));
        }
        if contact.email.trim().is_empty() || !contact.email.contains('@') {
            return Err(ClientError::Validation(
                "a valid contact email is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Record and surface a failure without touching the rest of the state.
    fn report(state: &mut BookingState, env: &BookingEnvironment, error: &ClientError) {
        state.last_error = Some(error.to_string());
        env.notifier.notify(Notification::error(error));
    }

    /// Describe a seat-map fetch for one trip under one generation.
    fn fetch_availability(
        env: &BookingEnvironment,
        bus_id: String,
        travel_date: NaiveDate,
        generation: u64,
    ) -> Effect<BookingAction> {
        let api = Arc::clone(&env.catalog_api);
        Effect::future(async move {
            let fetched = api.seat_map(&bus_id, Some(travel_date)).await;
            match fetched {
                Ok(map) => Some(BookingAction::AvailabilityLoaded {
                    bus_id,
                    travel_date,
                    generation,
                    seats: map.seats,
                }),
                Err(err) => Some(BookingAction::AvailabilityFailed {
                    bus_id,
                    travel_date,
                    generation,
                    error: err.into(),
                }),
            }
        })
    }

    /// Describe a seat-map fetch for the currently selected trip, or `None`
    /// when no trip is selected.
    fn refresh_current_trip(
        state: &BookingState,
        env: &BookingEnvironment,
    ) -> Option<Effect<BookingAction>> {
        state.trip.as_ref().map(|trip| {
            Self::fetch_availability(env, trip.bus.id.clone(), trip.travel_date, state.generation)
        })
    }

    /// Describe a booking-history fetch.
    fn fetch_bookings(env: &BookingEnvironment, token: AuthToken) -> Effect<BookingAction> {
        let api = Arc::clone(&env.catalog_api);
        Effect::future(async move {
            match api.list_bookings(&token).await {
                Ok(response) => Some(BookingAction::BookingsLoaded {
                    bookings: response.bookings,
                }),
                Err(err) => Some(BookingAction::BookingsFailed { error: err.into() }),
            }
        })
    }

    /// Arm the next timed-refresh tick for the given generation.
    fn arm_tick(env: &BookingEnvironment, generation: u64) -> Effect<BookingAction> {
        Effect::Delay {
            duration: env.refresh.interval(),
            action: Box::new(BookingAction::Tick { generation }),
        }
    }

    /// Drop selected seats that are no longer present or available in the
    /// freshly replaced cache.
    fn reconcile_selection(state: &mut BookingState, env: &BookingEnvironment) {
        let evicted: Vec<SeatNo> = state
            .selection
            .iter()
            .filter(|no| !state.seat(no).is_some_and(|s| s.is_available))
            .cloned()
            .collect();

        if evicted.is_empty() {
            return;
        }

        state.selection.retain(|no| !evicted.contains(no));

        let labels = evicted
            .iter()
            .map(SeatNo::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(seats = %labels, "selected seats became unavailable");
        env.notifier.notify(Notification::info(format!(
            "Seat(s) {labels} are no longer available and were removed from your selection"
        )));
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per operation of the booking contract
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            BookingAction::LoadCities => {
                let api = Arc::clone(&env.catalog_api);
                smallvec![Effect::future(async move {
                    match api.list_cities().await {
                        Ok(response) => Some(BookingAction::CitiesLoaded {
                            cities: response.cities,
                        }),
                        Err(err) => Some(BookingAction::CitiesFailed { error: err.into() }),
                    }
                })]
            },

            BookingAction::SearchBuses { query } => {
                if let Err(error) = Self::validate_search(&query) {
                    Self::report(state, env, &error);
                    return SmallVec::new();
                }

                // A new search supersedes the old one and everything built
                // on top of it.
                state.search = Some(query.clone());
                state.search_message = None;
                state.trip = None;
                state.seats.clear();
                state.selection.clear();
                state.receipt = None;
                state.phase = BookingPhase::Idle;
                state.generation += 1;
                state.last_error = None;

                let api = Arc::clone(&env.catalog_api);
                smallvec![Effect::future(async move {
                    let searched = api.search_buses(&query).await;
                    match searched {
                        Ok(response) => Some(BookingAction::BusesLoaded {
                            query,
                            buses: response.buses,
                            message: response.message,
                        }),
                        Err(err) => Some(BookingAction::BusesFailed {
                            query,
                            error: err.into(),
                        }),
                    }
                })]
            },

            BookingAction::SelectTrip { bus, travel_date } => {
                tracing::info!(bus_id = %bus.id, %travel_date, "trip selected");

                // Unconditional reset: re-picking the same bus is a fresh
                // booking attempt, and the old cache may be stale.
                state.trip = Some(SelectedTrip {
                    bus,
                    travel_date,
                });
                state.seats.clear();
                state.selection.clear();
                state.receipt = None;
                state.phase = BookingPhase::TripSelected;
                state.generation += 1;
                state.last_error = None;

                let mut effects: SmallVec<[Effect<Self::Action>; 4]> = SmallVec::new();
                if let Some(fetch) = Self::refresh_current_trip(state, env) {
                    effects.push(fetch);
                }
                if env.refresh.auto_refresh_enabled {
                    effects.push(Self::arm_tick(env, state.generation));
                }
                effects
            },

            BookingAction::RefreshAvailability => match Self::refresh_current_trip(state, env) {
                Some(fetch) => smallvec![fetch],
                None => {
                    tracing::debug!("refresh requested with no trip selected");
                    SmallVec::new()
                },
            },

            BookingAction::ToggleSeat { seat_no } => {
                if state.phase == BookingPhase::Submitting {
                    tracing::debug!(seat = %seat_no, "toggle ignored while submitting");
                    return SmallVec::new();
                }

                // Defensive against the race between render and click: a
                // seat that is gone or taken is silently ignored.
                if !state.seat(&seat_no).is_some_and(|s| s.is_available) {
                    tracing::debug!(seat = %seat_no, "toggle ignored for unavailable seat");
                    return SmallVec::new();
                }

                if let Some(pos) = state.selection.iter().position(|no| no == &seat_no) {
                    state.selection.remove(pos);
                } else {
                    state.selection.push(seat_no);
                }
                state.phase = state.selection_phase();
                SmallVec::new()
            },

            BookingAction::ConfirmBooking {
                passengers,
                contact,
            } => {
                // No token, no network call.
                let Some(token) = state.auth_token.clone() else {
                    Self::report(state, env, &ClientError::AuthRequired);
                    return SmallVec::new();
                };

                if state.phase == BookingPhase::Submitting {
                    Self::report(
                        state,
                        env,
                        &ClientError::State("a booking is already being submitted".to_string()),
                    );
                    return SmallVec::new();
                }

                let Some(trip) = state.trip.clone() else {
                    Self::report(
                        state,
                        env,
                        &ClientError::State("select a trip before booking".to_string()),
                    );
                    return SmallVec::new();
                };

                if let Err(error) = Self::validate_confirmation(state, &passengers, &contact) {
                    Self::report(state, env, &error);
                    return SmallVec::new();
                }

                let request = BookRequest {
                    bus_id: trip.bus.id,
                    travel_date: trip.travel_date,
                    seats: state.ordered_selection(),
                    passenger_details: passengers,
                    contact,
                };

                state.phase = BookingPhase::Submitting;
                state.receipt = None;
                state.last_error = None;

                let api = Arc::clone(&env.catalog_api);
                smallvec![Effect::future(async move {
                    match api.create_booking(Some(&token), &request).await {
                        Ok(receipt) if receipt.status == BookingStatus::Confirmed => {
                            Some(BookingAction::BookingConfirmed { receipt })
                        },
                        Ok(receipt) => Some(BookingAction::BookingRejected {
                            error: ClientError::Remote(format!(
                                "booking {} was not confirmed",
                                receipt.booking_id
                            )),
                        }),
                        Err(err) => Some(BookingAction::BookingRejected { error: err.into() }),
                    }
                })]
            },

            BookingAction::LoadMyBookings => {
                let Some(token) = state.auth_token.clone() else {
                    Self::report(state, env, &ClientError::AuthRequired);
                    return SmallVec::new();
                };
                smallvec![Self::fetch_bookings(env, token)]
            },

            BookingAction::AuthChanged { token } => {
                let logged_out = token.is_none();
                state.auth_token = token;
                if logged_out {
                    // The history belongs to the identity that just ended.
                    state.my_bookings.clear();
                }
                SmallVec::new()
            },

            BookingAction::Tick { generation } => {
                if generation != state.generation
                    || state.trip.is_none()
                    || !env.refresh.auto_refresh_enabled
                {
                    // The trip this tick was armed for is gone; the chain
                    // ends here with no timer left behind.
                    tracing::trace!(generation, "refresh tick for superseded context dropped");
                    return SmallVec::new();
                }

                let mut effects: SmallVec<[Effect<Self::Action>; 4]> = SmallVec::new();
                if let Some(fetch) = Self::refresh_current_trip(state, env) {
                    effects.push(fetch);
                }
                effects.push(Self::arm_tick(env, generation));
                effects
            },

            // ========== Events ==========
            BookingAction::CitiesLoaded { cities } => {
                state.cities = cities;
                SmallVec::new()
            },

            BookingAction::CitiesFailed { error } => {
                Self::report(state, env, &error);
                SmallVec::new()
            },

            BookingAction::BusesLoaded {
                query,
                buses,
                message,
            } => {
                if state.search.as_ref() != Some(&query) {
                    tracing::debug!("search results for a superseded query dropped");
                    return SmallVec::new();
                }
                state.buses = buses;
                state.search_message = message;
                state.last_error = None;
                SmallVec::new()
            },

            BookingAction::BusesFailed { query, error } => {
                if state.search.as_ref() != Some(&query) {
                    return SmallVec::new();
                }
                Self::report(state, env, &error);
                SmallVec::new()
            },

            BookingAction::AvailabilityLoaded {
                bus_id,
                travel_date,
                generation,
                seats,
            } => {
                if !state.accepts_response(&bus_id, travel_date, generation) {
                    tracing::debug!(%bus_id, "seat map for a superseded trip dropped");
                    return SmallVec::new();
                }

                // Wholesale replacement: no stale entry survives.
                state.seats = seats;
                state.last_refreshed_at = Some(env.clock.now());
                state.last_error = None;
                Self::reconcile_selection(state, env);

                if state.phase != BookingPhase::Submitting {
                    state.phase = state.selection_phase();
                }
                SmallVec::new()
            },

            BookingAction::AvailabilityFailed {
                bus_id,
                travel_date,
                generation,
                error,
            } => {
                if !state.accepts_response(&bus_id, travel_date, generation) {
                    return SmallVec::new();
                }

                // The previous cache stays; a transient fault must not blank
                // the grid.
                Self::report(state, env, &error);
                if matches!(state.phase, BookingPhase::Confirmed | BookingPhase::Rejected) {
                    state.phase = state.selection_phase();
                }
                SmallVec::new()
            },

            BookingAction::BookingConfirmed { receipt } => {
                tracing::info!(booking_id = %receipt.booking_id, "booking confirmed");
                env.notifier.notify(Notification::success(format!(
                    "Booking {} confirmed",
                    receipt.booking_id
                )));

                state.selection.clear();
                state.receipt = Some(receipt);
                state.phase = BookingPhase::Confirmed;
                state.last_error = None;

                // Booked seats must show as taken for anyone still looking,
                // and the history gains the new entry.
                let mut followups: Vec<Effect<Self::Action>> = Vec::new();
                if let Some(fetch) = Self::refresh_current_trip(state, env) {
                    followups.push(fetch);
                }
                if let Some(token) = state.auth_token.clone() {
                    followups.push(Self::fetch_bookings(env, token));
                }
                smallvec![Effect::merge(followups)]
            },

            BookingAction::BookingRejected { error } => {
                state.phase = BookingPhase::Rejected;
                // Selection is preserved so the user can adjust and retry.
                Self::report(state, env, &error);

                // Availability is refreshed after every attempt, rejected
                // ones included, so stale "available" seats never linger.
                match Self::refresh_current_trip(state, env) {
                    Some(fetch) => smallvec![fetch],
                    None => SmallVec::new(),
                }
            },

            BookingAction::BookingsLoaded { bookings } => {
                state.my_bookings = bookings;
                SmallVec::new()
            },

            BookingAction::BookingsFailed { error } => {
                Self::report(state, env, &error);
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::testsupport::StubCatalogApi;
    use proptest::prelude::*;
    use sawari_testing::{ReducerTest, assertions, test_clock};

    fn test_env_with_refresh(auto_refresh_enabled: bool) -> (BookingEnvironment, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let env = BookingEnvironment::new(
            Arc::new(StubCatalogApi),
            Arc::new(test_clock()),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            RefreshConfig {
                auto_refresh_enabled,
                interval_secs: 15,
            },
        );
        (env, notifier)
    }

    fn test_env() -> (BookingEnvironment, Arc<RecordingNotifier>) {
        test_env_with_refresh(false)
    }

    fn travel_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn bus(id: &str) -> BusSummary {
        BusSummary {
            id: id.to_string(),
            operator: "Hill Express".to_string(),
            bus_type: "AC Seater".to_string(),
            departure_time: "21:30".to_string(),
            arrival_time: "05:45".to_string(),
            duration: "8h 15m".to_string(),
            fare: 500.0,
            available_seats: 24,
            rating: 4.2,
        }
    }

    fn seat(no: &str, available: bool, price: f64) -> Seat {
        Seat {
            id: format!("seat-{no}"),
            seat_no: SeatNo::from(no),
            seat_type: "window".to_string(),
            price,
            is_available: available,
        }
    }

    fn receipt() -> BookingReceipt {
        BookingReceipt {
            booking_id: "bk-1".to_string(),
            bus_id: "b1".to_string(),
            status: BookingStatus::Confirmed,
            seats: vec![SeatNo::from("A1")],
            amount: 500.0,
            travel_date: travel_date(),
            bus_name: Some("Hill Express".to_string()),
            from_city: None,
            to_city: None,
        }
    }

    /// Trip `b1` selected, seat map loaded: A1 available, A2 taken.
    fn loaded_state() -> BookingState {
        BookingState {
            phase: BookingPhase::AvailabilityLoaded,
            trip: Some(SelectedTrip {
                bus: bus("b1"),
                travel_date: travel_date(),
            }),
            seats: vec![seat("A1", true, 500.0), seat("A2", false, 500.0)],
            auth_token: Some(AuthToken::from("tok-1")),
            generation: 1,
            ..BookingState::new()
        }
    }

    fn passengers(n: usize) -> Vec<Passenger> {
        (0..n)
            .map(|i| Passenger {
                name: format!("Passenger {i}"),
                age: 30,
                gender: "F".to_string(),
            })
            .collect()
    }

    fn contact() -> ContactInfo {
        ContactInfo {
            phone: "9876543210".to_string(),
            email: "asha@example.com".to_string(),
        }
    }

    #[test]
    fn select_trip_clears_selection_even_for_the_same_bus() {
        let (env, _) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(BookingState::new())
            .when_actions(vec![
                BookingAction::SelectTrip {
                    bus: bus("b1"),
                    travel_date: travel_date(),
                },
                BookingAction::AvailabilityLoaded {
                    bus_id: "b1".to_string(),
                    travel_date: travel_date(),
                    generation: 1,
                    seats: vec![seat("A1", true, 500.0)],
                },
                BookingAction::ToggleSeat {
                    seat_no: SeatNo::from("A1"),
                },
                BookingAction::SelectTrip {
                    bus: bus("b1"),
                    travel_date: travel_date(),
                },
            ])
            .then_state(|state| {
                assert!(state.selection.is_empty());
                assert!(state.seats.is_empty(), "cache may be stale, so it goes too");
                assert_eq!(state.phase, BookingPhase::TripSelected);
                assert_eq!(state.generation, 2);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn toggle_twice_restores_prior_selection() {
        let (env, _) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(loaded_state())
            .when_actions(vec![
                BookingAction::ToggleSeat {
                    seat_no: SeatNo::from("A1"),
                },
                BookingAction::ToggleSeat {
                    seat_no: SeatNo::from("A1"),
                },
            ])
            .then_state(|state| {
                assert!(state.selection.is_empty());
                assert_eq!(state.phase, BookingPhase::AvailabilityLoaded);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn toggle_unavailable_seat_is_a_silent_noop() {
        let (env, notifier) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(loaded_state())
            .when_action(BookingAction::ToggleSeat {
                seat_no: SeatNo::from("A2"),
            })
            .then_state(|state| {
                assert!(state.selection.is_empty());
                assert!(state.last_error.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
        assert!(notifier.entries().is_empty());
    }

    #[test]
    fn toggle_unknown_seat_is_a_silent_noop() {
        let (env, _) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(loaded_state())
            .when_action(BookingAction::ToggleSeat {
                seat_no: SeatNo::from("Z9"),
            })
            .then_state(|state| assert!(state.selection.is_empty()))
            .run();
    }

    #[test]
    fn stale_seat_map_for_superseded_trip_is_dropped() {
        let (env, _) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(BookingState::new())
            .when_actions(vec![
                BookingAction::SelectTrip {
                    bus: bus("b1"),
                    travel_date: travel_date(),
                },
                BookingAction::SelectTrip {
                    bus: bus("b2"),
                    travel_date: travel_date(),
                },
                // The response for b1 lands after b2 was picked.
                BookingAction::AvailabilityLoaded {
                    bus_id: "b1".to_string(),
                    travel_date: travel_date(),
                    generation: 1,
                    seats: vec![seat("A1", true, 500.0)],
                },
            ])
            .then_state(|state| {
                assert!(state.seats.is_empty());
                assert_eq!(state.phase, BookingPhase::TripSelected);
            })
            .run();
    }

    #[test]
    fn reload_evicts_seats_that_became_unavailable() {
        let (env, notifier) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];
        state.phase = BookingPhase::SeatsSelected;

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::AvailabilityLoaded {
                bus_id: "b1".to_string(),
                travel_date: travel_date(),
                generation: 1,
                seats: vec![seat("A1", false, 500.0), seat("A2", false, 500.0)],
            })
            .then_state(|state| {
                assert!(state.selection.is_empty(), "selection stays a subset of available");
                assert_eq!(state.phase, BookingPhase::AvailabilityLoaded);
            })
            .run();
        assert_eq!(notifier.entries().len(), 1);
    }

    #[test]
    fn failed_reload_keeps_the_previous_cache() {
        let (env, _) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(loaded_state())
            .when_action(BookingAction::AvailabilityFailed {
                bus_id: "b1".to_string(),
                travel_date: travel_date(),
                generation: 1,
                error: ClientError::Transport("connection reset".to_string()),
            })
            .then_state(|state| {
                assert_eq!(state.seats.len(), 2, "grid is not blanked by a transient fault");
                assert!(state.last_error.is_some());
            })
            .run();
    }

    #[test]
    fn fare_follows_the_freshest_prices() {
        let (env, _) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];
        assert!((state.fare() - 500.0).abs() < f64::EPSILON);

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::AvailabilityLoaded {
                bus_id: "b1".to_string(),
                travel_date: travel_date(),
                generation: 1,
                seats: vec![seat("A1", true, 650.0)],
            })
            .then_state(|state| {
                assert!((state.fare() - 650.0).abs() < f64::EPSILON);
            })
            .run();
    }

    #[test]
    fn confirm_without_login_makes_no_call() {
        let (env, notifier) = test_env();
        let mut state = loaded_state();
        state.auth_token = None;
        state.selection = vec![SeatNo::from("A1")];

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::ConfirmBooking {
                passengers: passengers(1),
                contact: contact(),
            })
            .then_state(|state| assert_ne!(state.phase, BookingPhase::Submitting))
            .then_effects(assertions::assert_no_effects)
            .run();
        assert_eq!(
            notifier.error_messages(),
            vec!["please sign in to continue".to_string()]
        );
    }

    #[test]
    fn second_submit_while_one_is_pending_is_rejected() {
        let (env, notifier) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_actions(vec![
                BookingAction::ConfirmBooking {
                    passengers: passengers(1),
                    contact: contact(),
                },
                BookingAction::ConfirmBooking {
                    passengers: passengers(1),
                    contact: contact(),
                },
            ])
            .then_state(|state| {
                assert_eq!(state.phase, BookingPhase::Submitting);
                assert!(state.last_error.as_ref().unwrap().contains("already being submitted"));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
        assert_eq!(notifier.error_messages().len(), 1);
    }

    #[test]
    fn confirm_requires_a_seat_selection() {
        let (env, _) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(loaded_state())
            .when_action(BookingAction::ConfirmBooking {
                passengers: passengers(0),
                contact: contact(),
            })
            .then_state(|state| {
                assert!(state.last_error.as_ref().unwrap().contains("at least one seat"));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn confirm_requires_one_passenger_per_seat() {
        let (env, _) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::ConfirmBooking {
                passengers: passengers(2),
                contact: contact(),
            })
            .then_state(|state| {
                assert!(state.last_error.as_ref().unwrap().contains("one passenger per"));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn valid_confirmation_enters_submitting() {
        let (env, _) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::ConfirmBooking {
                passengers: passengers(1),
                contact: contact(),
            })
            .then_state(|state| assert_eq!(state.phase, BookingPhase::Submitting))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn confirmed_booking_clears_selection_and_refreshes() {
        let (env, _) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];
        state.phase = BookingPhase::Submitting;

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::BookingConfirmed { receipt: receipt() })
            .then_state(|state| {
                assert!(state.selection.is_empty());
                assert_eq!(state.phase, BookingPhase::Confirmed);
                assert!(state.receipt.is_some());
            })
            .then_effects(|effects| {
                // Seat map and booking history, concurrently.
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn rejected_booking_preserves_selection_and_still_refreshes() {
        let (env, notifier) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];
        state.phase = BookingPhase::Submitting;

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::BookingRejected {
                error: ClientError::Remote("Seat already booked".to_string()),
            })
            .then_state(|state| {
                assert_eq!(state.selection, vec![SeatNo::from("A1")]);
                assert_eq!(state.phase, BookingPhase::Rejected);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
        assert_eq!(notifier.error_messages(), vec!["Seat already booked".to_string()]);
    }

    #[test]
    fn post_attempt_reload_returns_rejected_to_its_selection_state() {
        let (env, _) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];
        state.phase = BookingPhase::Rejected;

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::AvailabilityLoaded {
                bus_id: "b1".to_string(),
                travel_date: travel_date(),
                generation: 1,
                seats: vec![seat("A1", true, 500.0), seat("A2", false, 500.0)],
            })
            .then_state(|state| {
                assert_eq!(state.phase, BookingPhase::SeatsSelected);
            })
            .run();
    }

    #[test]
    fn tick_for_superseded_generation_ends_the_chain() {
        let (env, _) = test_env_with_refresh(true);
        let mut state = loaded_state();
        state.generation = 2;

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::Tick { generation: 1 })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn current_tick_refreshes_and_rearms() {
        let (env, _) = test_env_with_refresh(true);
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(loaded_state())
            .when_action(BookingAction::Tick { generation: 1 })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_has_future_effect(effects);
                assertions::assert_has_delay_effect(effects);
            })
            .run();
    }

    #[test]
    fn select_trip_arms_the_timer_only_when_enabled() {
        let (env, _) = test_env_with_refresh(true);
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(BookingState::new())
            .when_action(BookingAction::SelectTrip {
                bus: bus("b1"),
                travel_date: travel_date(),
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_has_delay_effect(effects);
            })
            .run();

        let (env, _) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(BookingState::new())
            .when_action(BookingAction::SelectTrip {
                bus: bus("b1"),
                travel_date: travel_date(),
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn logging_out_clears_the_booking_history() {
        let (env, _) = test_env();
        let mut state = loaded_state();
        state.my_bookings = vec![Booking {
            booking_id: "bk-1".to_string(),
            bus_name: "Hill Express".to_string(),
            from_city: "Pokhara".to_string(),
            to_city: "Kathmandu".to_string(),
            date: travel_date(),
            seats: vec![SeatNo::from("A1")],
            status: BookingStatus::Confirmed,
            amount: 500.0,
            passenger_details: None,
            contact: None,
        }];

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::AuthChanged { token: None })
            .then_state(|state| {
                assert!(state.my_bookings.is_empty());
                assert!(state.auth_token.is_none());
            })
            .run();
    }

    #[test]
    fn search_supersedes_trip_and_seat_selection() {
        let (env, _) = test_env();
        let mut state = loaded_state();
        state.selection = vec![SeatNo::from("A1")];

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::SearchBuses {
                query: RouteSearch {
                    from_city_id: "c1".to_string(),
                    to_city_id: "c2".to_string(),
                    date: Some(travel_date()),
                },
            })
            .then_state(|state| {
                assert!(state.trip.is_none());
                assert!(state.seats.is_empty());
                assert!(state.selection.is_empty());
                assert_eq!(state.phase, BookingPhase::Idle);
                assert_eq!(state.generation, 2);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn search_results_for_a_superseded_query_are_dropped() {
        let (env, _) = test_env();
        let old_query = RouteSearch {
            from_city_id: "c1".to_string(),
            to_city_id: "c2".to_string(),
            date: None,
        };
        let new_query = RouteSearch {
            from_city_id: "c1".to_string(),
            to_city_id: "c3".to_string(),
            date: None,
        };
        let mut state = BookingState::new();
        state.search = Some(new_query);

        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(BookingAction::BusesLoaded {
                query: old_query,
                buses: vec![bus("b1")],
                message: None,
            })
            .then_state(|state| assert!(state.buses.is_empty()))
            .run();
    }

    #[test]
    fn search_with_identical_endpoints_is_rejected() {
        let (env, _) = test_env();
        ReducerTest::new(BookingReducer::new())
            .with_env(env)
            .given_state(BookingState::new())
            .when_action(BookingAction::SearchBuses {
                query: RouteSearch {
                    from_city_id: "c1".to_string(),
                    to_city_id: "c1".to_string(),
                    date: None,
                },
            })
            .then_state(|state| {
                assert!(state.search.is_none());
                assert!(state.last_error.is_some());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    proptest! {
        /// Double-toggling any seat label leaves the selection exactly as
        /// it was, within one availability snapshot.
        #[test]
        fn double_toggle_is_identity(
            seat_flags in prop::collection::vec(any::<bool>(), 1..6),
            pick in 0usize..6,
        ) {
            let seats: Vec<Seat> = seat_flags
                .iter()
                .enumerate()
                .map(|(i, available)| seat(&format!("S{i}"), *available, 100.0 + i as f64))
                .collect();
            let mut state = loaded_state();
            state.seats = seats;
            state.selection.clear();

            let target = SeatNo::from(format!("S{}", pick % seat_flags.len()).as_str());
            let before = state.selection.clone();

            let (env, _) = test_env();
            let reducer = BookingReducer::new();
            reducer.reduce(
                &mut state,
                BookingAction::ToggleSeat { seat_no: target.clone() },
                &env,
            );
            reducer.reduce(
                &mut state,
                BookingAction::ToggleSeat { seat_no: target },
                &env,
            );

            prop_assert_eq!(state.selection, before);
        }

        /// The fare is always the sum of the selected seats' cached prices.
        #[test]
        fn fare_is_sum_of_selected_prices(
            prices in prop::collection::vec(50.0f64..2000.0, 1..6),
        ) {
            let seats: Vec<Seat> = prices
                .iter()
                .enumerate()
                .map(|(i, price)| seat(&format!("S{i}"), true, *price))
                .collect();
            let mut state = loaded_state();
            state.seats = seats;
            state.selection.clear();

            let (env, _) = test_env();
            let reducer = BookingReducer::new();
            for i in 0..prices.len() {
                reducer.reduce(
                    &mut state,
                    BookingAction::ToggleSeat { seat_no: SeatNo::from(format!("S{i}").as_str()) },
                    &env,
                );
            }

            let expected: f64 = prices.iter().sum();
            prop_assert!((state.fare() - expected).abs() < 1e-9);
        }
    }
}
