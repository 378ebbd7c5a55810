//! Application wiring: builds both stores and coordinates between them.
//!
//! The session manager and the booking controller each own a disjoint slice
//! of state behind their own store. Cross-component flow happens through
//! explicit action forwarding, never shared mutable references:
//!
//! - session changes (login, restore, logout, expiry) are forwarded into the
//!   booking store as [`BookingAction::AuthChanged`], carrying the token
//!   read back from the session store *after* the transition applied;
//! - auth-class failures observed by the booking controller are routed back
//!   into the session store as [`SessionAction::AuthExpired`], so forced
//!   logout happens in exactly one place.

use crate::api::{ApiClient, AuthApi, CatalogApi};
use crate::booking::{
    BookingAction, BookingEnvironment, BookingReducer, BookingState,
};
use crate::config::Config;
use crate::credentials::{CredentialStore, CredentialStoreError, FileCredentialStore};
use crate::notify::{Notifier, TracingNotifier};
use crate::session::{
    SessionAction, SessionEnvironment, SessionReducer, SessionState,
};
use crate::types::{BusSummary, ContactInfo, Passenger, RouteSearch, SeatNo};
use chrono::NaiveDate;
use sawari_core::environment::SystemClock;
use sawari_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// The session manager's store.
pub type SessionStore = Store<SessionState, SessionAction, SessionEnvironment, SessionReducer>;

/// The booking controller's store.
pub type BookingStore = Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>;

/// Errors raised while assembling the application.
#[derive(Debug, Error)]
pub enum AppError {
    /// The HTTP client could not be built.
    #[error("http client initialization failed: {0}")]
    Http(String),

    /// The credential store location could not be resolved.
    #[error(transparent)]
    Credentials(#[from] CredentialStoreError),
}

/// The assembled booking client.
///
/// Construct once per process, call [`SawariApp::restore_session`] during
/// startup, then drive it from UI events through the methods below. State is
/// read through the store accessors, never held by the caller.
pub struct SawariApp {
    session: SessionStore,
    booking: BookingStore,
    forwarders: Vec<JoinHandle<()>>,
}

impl SawariApp {
    /// Assemble the client with production collaborators derived from the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or no
    /// credential location can be resolved.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.request_timeout))
            .build()
            .map_err(|e| AppError::Http(e.to_string()))?;
        let api = Arc::new(ApiClient::with_client(http, config.api.base_url.clone()));

        let credentials: Arc<dyn CredentialStore> = match &config.credentials.path {
            Some(path) => Arc::new(FileCredentialStore::new(path)),
            None => Arc::new(FileCredentialStore::default_location()?),
        };

        Ok(Self::with_collaborators(
            config,
            Arc::<ApiClient>::clone(&api),
            api,
            credentials,
            Arc::new(TracingNotifier),
        ))
    }

    /// Assemble the client around explicit collaborators. This is the seam
    /// tests and embedders use to substitute servers, storage, or sinks.
    #[must_use]
    pub fn with_collaborators(
        config: &Config,
        auth_api: Arc<dyn AuthApi>,
        catalog_api: Arc<dyn CatalogApi>,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let clock = Arc::new(SystemClock);

        let session = Store::new(
            SessionState::new(),
            SessionReducer::new(),
            SessionEnvironment::new(
                auth_api,
                credentials,
                Arc::<SystemClock>::clone(&clock),
                Arc::clone(&notifier),
            ),
        );

        let booking = Store::new(
            BookingState::new(),
            BookingReducer::new(),
            BookingEnvironment::new(catalog_api, clock, notifier, config.refresh.clone()),
        );

        let forwarders = Self::spawn_forwarders(&session, &booking);

        Self {
            session,
            booking,
            forwarders,
        }
    }

    /// Wire the two stores together through their action broadcasts.
    fn spawn_forwarders(session: &SessionStore, booking: &BookingStore) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        // Session changes flow into the booking controller as AuthChanged.
        // The token is read back from the session store after the transition
        // applied, so a dropped restore result is never forwarded.
        {
            let mut rx = session.subscribe_actions();
            let session = session.clone();
            let booking = booking.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(action) => {
                            let auth_changed = matches!(
                                action,
                                SessionAction::SessionEstablished { .. }
                                    | SessionAction::RestoreFinished { .. }
                                    | SessionAction::Logout
                                    | SessionAction::AuthExpired
                            );
                            if auth_changed {
                                let token = session.state(|s| s.token.clone()).await;
                                let _ = booking.send(BookingAction::AuthChanged { token }).await;
                            }
                        },
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "session forwarder lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        // Auth-class failures seen by the booking controller route through
        // the session manager's central clearing path.
        {
            let mut rx = booking.subscribe_actions();
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(action) => {
                            if booking_auth_expired(&action) {
                                let _ = session.send(SessionAction::AuthExpired).await;
                            }
                        },
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "booking forwarder lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        handles
    }

    // ========== Session operations ==========

    /// One-shot startup session restore.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn restore_session(&self) -> Result<(), StoreError> {
        self.session.send(SessionAction::RestoreSession).await
    }

    /// Request an OTP for a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn request_otp(
        &self,
        country_code: impl Into<String>,
        phone: impl Into<String>,
    ) -> Result<(), StoreError> {
        self.session
            .send(SessionAction::RequestOtp {
                country_code: country_code.into(),
                phone: phone.into(),
            })
            .await
    }

    /// Verify the code the user typed against the live challenge.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn verify_otp(&self, code: impl Into<String>) -> Result<(), StoreError> {
        self.session
            .send(SessionAction::VerifyOtp { code: code.into() })
            .await
    }

    /// Clear the session and the persisted token.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn logout(&self) -> Result<(), StoreError> {
        self.session.send(SessionAction::Logout).await
    }

    /// Update the authenticated user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn update_profile(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<(), StoreError> {
        self.session
            .send(SessionAction::UpdateProfile {
                name: name.into(),
                email: email.into(),
            })
            .await
    }

    // ========== Booking operations ==========

    /// Fetch the list of cities.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn load_cities(&self) -> Result<(), StoreError> {
        self.booking.send(BookingAction::LoadCities).await
    }

    /// Run a route search.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn search_buses(&self, query: RouteSearch) -> Result<(), StoreError> {
        self.booking.send(BookingAction::SearchBuses { query }).await
    }

    /// Pick a bus for a travel date and load its seat map.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn select_trip(
        &self,
        bus: BusSummary,
        travel_date: NaiveDate,
    ) -> Result<(), StoreError> {
        self.booking
            .send(BookingAction::SelectTrip { bus, travel_date })
            .await
    }

    /// Reload the seat map for the selected trip; no-op without one.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn refresh_availability(&self) -> Result<(), StoreError> {
        self.booking.send(BookingAction::RefreshAvailability).await
    }

    /// Flip a seat in or out of the selection.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn toggle_seat(&self, seat_no: SeatNo) -> Result<(), StoreError> {
        self.booking.send(BookingAction::ToggleSeat { seat_no }).await
    }

    /// Submit the booking attempt for the current selection.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn confirm_booking(
        &self,
        passengers: Vec<Passenger>,
        contact: ContactInfo,
    ) -> Result<(), StoreError> {
        self.booking
            .send(BookingAction::ConfirmBooking {
                passengers,
                contact,
            })
            .await
    }

    /// Fetch the authenticated user's booking history.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is shutting down.
    pub async fn load_my_bookings(&self) -> Result<(), StoreError> {
        self.booking.send(BookingAction::LoadMyBookings).await
    }

    // ========== Accessors ==========

    /// Read session state through a closure.
    pub async fn session_state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&SessionState) -> T,
    {
        self.session.state(f).await
    }

    /// Read booking state through a closure.
    pub async fn booking_state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&BookingState) -> T,
    {
        self.booking.state(f).await
    }

    /// Total fare of the current seat selection.
    pub async fn fare(&self) -> f64 {
        self.booking.state(BookingState::fare).await
    }

    /// Direct handle to the session store, for observers and tests.
    #[must_use]
    pub const fn session_store(&self) -> &SessionStore {
        &self.session
    }

    /// Direct handle to the booking store, for observers and tests.
    #[must_use]
    pub const fn booking_store(&self) -> &BookingStore {
        &self.booking
    }

    /// Shut down both stores and stop the coordinator tasks.
    ///
    /// # Errors
    ///
    /// Returns the first store shutdown error encountered.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        let session_result = self.session.shutdown(timeout).await;
        let booking_result = self.booking.shutdown(timeout).await;
        for handle in &self.forwarders {
            handle.abort();
        }
        session_result.and(booking_result)
    }
}

impl Drop for SawariApp {
    fn drop(&mut self) {
        for handle in &self.forwarders {
            handle.abort();
        }
    }
}

/// Whether a booking-side action reports an expired credential.
fn booking_auth_expired(action: &BookingAction) -> bool {
    let error = match action {
        BookingAction::BookingRejected { error }
        | BookingAction::BookingsFailed { error }
        | BookingAction::CitiesFailed { error }
        | BookingAction::AvailabilityFailed { error, .. }
        | BookingAction::BusesFailed { error, .. } => error,
        _ => return false,
    };
    error.is_auth_expired()
}
