//! Typed REST client for the booking backend.
//!
//! Thin request wrappers: one `reqwest::Client`, a base URL, and one method
//! per endpoint. Response contracts live here as serde structs so the
//! controllers only ever see domain types. Reducers depend on the
//! [`AuthApi`] and [`CatalogApi`] traits, not on [`ApiClient`], so tests can
//! substitute stubs.

use crate::types::{
    AuthToken, Booking, BookingReceipt, BusSummary, City, ContactInfo, Passenger, RouteSearch,
    Seat, SeatNo, UserProfile,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Transport(String),

    /// The server rejected the bearer credential (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response; carries the server's `message` body
    /// field when present.
    #[error("{message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or a generic fallback.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("response parsing failed: {0}")]
    Decode(String),
}

/// Body of `POST /login/request-otp`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOtpRequest {
    /// Dialing prefix, for example `"+91"`.
    pub country_code: String,
    /// Subscriber number without the prefix.
    pub phone: String,
}

/// Response of `POST /login/request-otp`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestOtpResponse {
    /// Server-issued challenge id, echoed back on verification.
    pub otp_id: String,
    /// Optional status message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /login/verify-otp`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest {
    /// Challenge id from the matching request call.
    pub otp_id: String,
    /// The one-time password the user typed.
    pub otp: String,
}

/// Response of `POST /login/verify-otp`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpResponse {
    /// Bearer token for the established session.
    pub token: AuthToken,
    /// The authenticated user.
    pub user: UserProfile,
}

/// Body of `PUT /me`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateProfileRequest {
    /// New display name.
    pub name: String,
    /// New contact email.
    pub email: String,
}

/// Response of `GET /cities`.
#[derive(Debug, Clone, Deserialize)]
pub struct CitiesResponse {
    /// All cities offered as route endpoints.
    pub cities: Vec<City>,
}

/// Response of `POST /search-buses`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchBusesResponse {
    /// Matching bus runs.
    pub buses: Vec<BusSummary>,
    /// Informational message (for example "no buses on this date").
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `GET /bus/{id}/seats`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeatMapResponse {
    /// The bus the seat map belongs to.
    pub bus_id: String,
    /// Seats in display order.
    pub seats: Vec<Seat>,
}

/// Body of `POST /book`.
#[derive(Debug, Clone, Serialize)]
pub struct BookRequest {
    /// Bus to book on.
    pub bus_id: String,
    /// Travel date.
    pub travel_date: NaiveDate,
    /// Seat labels to book, in display order.
    pub seats: Vec<SeatNo>,
    /// One entry per seat.
    pub passenger_details: Vec<Passenger>,
    /// Contact details for the booking.
    pub contact: ContactInfo,
}

/// Response of `GET /bookings`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingsResponse {
    /// The caller's booking history.
    pub bookings: Vec<Booking>,
}

/// Error body shape used by the backend for failed calls.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Authentication endpoints consumed by the session manager.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /login/request-otp`.
    async fn request_otp(&self, req: RequestOtpRequest) -> Result<RequestOtpResponse, ApiError>;

    /// `POST /login/verify-otp`.
    async fn verify_otp(&self, req: VerifyOtpRequest) -> Result<VerifyOtpResponse, ApiError>;

    /// `GET /me`.
    async fn get_profile(&self, token: &AuthToken) -> Result<UserProfile, ApiError>;

    /// `PUT /me`.
    async fn update_profile(
        &self,
        token: &AuthToken,
        req: UpdateProfileRequest,
    ) -> Result<UserProfile, ApiError>;
}

/// Catalog and booking endpoints consumed by the booking controller.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// `GET /cities`.
    async fn list_cities(&self) -> Result<CitiesResponse, ApiError>;

    /// `POST /search-buses`.
    async fn search_buses(&self, req: &RouteSearch) -> Result<SearchBusesResponse, ApiError>;

    /// `GET /bus/{id}/seats?travel_date=`.
    async fn seat_map(
        &self,
        bus_id: &str,
        travel_date: Option<NaiveDate>,
    ) -> Result<SeatMapResponse, ApiError>;

    /// `POST /book`. The token is optional on the wire; the booking
    /// controller always supplies one.
    async fn create_booking(
        &self,
        token: Option<&AuthToken>,
        req: &BookRequest,
    ) -> Result<BookingReceipt, ApiError>;

    /// `GET /bookings`.
    async fn list_bookings(&self, token: &AuthToken) -> Result<BookingsResponse, ApiError>;
}

/// Production API client.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the given base URL with the default `reqwest`
    /// configuration.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a client around a pre-configured `reqwest::Client` (custom
    /// timeouts, proxies).
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a prepared request and decode the response, mapping failures
    /// onto [`ApiError`].
    async fn execute<T>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()));
        }

        let message = server_message(&response.text().await.unwrap_or_default())
            .unwrap_or_else(|| format!("server returned status {status}"));

        if status == StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized(message))
        } else {
            Err(ApiError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Extract the `message` field from an error body, if any.
fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn request_otp(&self, req: RequestOtpRequest) -> Result<RequestOtpResponse, ApiError> {
        self.execute(self.client.post(self.url("/login/request-otp")).json(&req))
            .await
    }

    async fn verify_otp(&self, req: VerifyOtpRequest) -> Result<VerifyOtpResponse, ApiError> {
        self.execute(self.client.post(self.url("/login/verify-otp")).json(&req))
            .await
    }

    async fn get_profile(&self, token: &AuthToken) -> Result<UserProfile, ApiError> {
        self.execute(self.client.get(self.url("/me")).bearer_auth(token.as_str()))
            .await
    }

    async fn update_profile(
        &self,
        token: &AuthToken,
        req: UpdateProfileRequest,
    ) -> Result<UserProfile, ApiError> {
        self.execute(
            self.client
                .put(self.url("/me"))
                .bearer_auth(token.as_str())
                .json(&req),
        )
        .await
    }
}

#[async_trait]
impl CatalogApi for ApiClient {
    async fn list_cities(&self) -> Result<CitiesResponse, ApiError> {
        self.execute(self.client.get(self.url("/cities"))).await
    }

    async fn search_buses(&self, req: &RouteSearch) -> Result<SearchBusesResponse, ApiError> {
        self.execute(self.client.post(self.url("/search-buses")).json(req))
            .await
    }

    async fn seat_map(
        &self,
        bus_id: &str,
        travel_date: Option<NaiveDate>,
    ) -> Result<SeatMapResponse, ApiError> {
        let mut request = self.client.get(self.url(&format!("/bus/{bus_id}/seats")));
        if let Some(date) = travel_date {
            request = request.query(&[("travel_date", date.to_string())]);
        }
        self.execute(request).await
    }

    async fn create_booking(
        &self,
        token: Option<&AuthToken>,
        req: &BookRequest,
    ) -> Result<BookingReceipt, ApiError> {
        let mut request = self.client.post(self.url("/book")).json(req);
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }
        self.execute(request).await
    }

    async fn list_bookings(&self, token: &AuthToken) -> Result<BookingsResponse, ApiError> {
        self.execute(
            self.client
                .get(self.url("/bookings"))
                .bearer_auth(token.as_str()),
        )
        .await
    }
}
