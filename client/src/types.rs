//! Domain types shared by the session and booking controllers.
//!
//! Wire-facing structs keep the backend's `snake_case` field names so the
//! serde derives map one-to-one onto the JSON contract.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Opaque bearer credential identifying an authenticated session.
///
/// The `Debug` impl redacts the value so tokens never leak into logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token string.
    #[must_use]
    pub const fn new(raw: String) -> Self {
        Self(raw)
    }

    /// The raw token value, for the `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthToken(…)")
    }
}

impl From<&str> for AuthToken {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// A seat label as printed on the bus layout (for example `"A1"`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatNo(String);

impl SeatNo {
    /// Wrap a seat label.
    #[must_use]
    pub const fn new(label: String) -> Self {
        Self(label)
    }

    /// The seat label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SeatNo {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

impl std::fmt::Display for SeatNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated user's profile as served by `GET /me`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Server-side user id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Full phone number including country code.
    pub phone: String,
    /// Contact email.
    pub email: String,
}

/// A city offered as a route endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// Server-side city id.
    pub id: String,
    /// Human-readable city name.
    pub name: String,
}

/// One bus run returned by a route search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusSummary {
    /// Server-side bus id, the key for seat-map lookups.
    pub id: String,
    /// Operator name.
    pub operator: String,
    /// Coach category (seater, sleeper, ...).
    pub bus_type: String,
    /// Scheduled departure time, as served.
    pub departure_time: String,
    /// Scheduled arrival time, as served.
    pub arrival_time: String,
    /// Journey duration, as served.
    pub duration: String,
    /// Base fare shown in search results.
    pub fare: f64,
    /// Seats still open at search time (informational; the seat map is the
    /// authority once a trip is selected).
    pub available_seats: u32,
    /// Operator rating.
    pub rating: f64,
}

/// One seat in the availability cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    /// Server-side seat id.
    pub id: String,
    /// Seat label shown to the passenger.
    pub seat_no: SeatNo,
    /// Seat category (window, aisle, sleeper, ...).
    pub seat_type: String,
    /// Price for this seat on the selected trip.
    pub price: f64,
    /// Whether the seat can currently be selected. Server truth; the client
    /// never flips this locally.
    pub is_available: bool,
}

/// Passenger details collected at confirmation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    /// Passenger name.
    pub name: String,
    /// Passenger age in years.
    pub age: u8,
    /// Passenger gender, as the backend expects it.
    pub gender: String,
}

/// Contact details attached to a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Contact phone number.
    pub phone: String,
    /// Contact email.
    pub email: String,
}

/// Terminal status of a booking, as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// The booking holds the listed seats.
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    /// The booking was cancelled or never completed.
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

/// A historical booking from `GET /bookings`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Server-side booking id.
    pub booking_id: String,
    /// Operator/bus name.
    pub bus_name: String,
    /// Origin city name.
    pub from_city: String,
    /// Destination city name.
    pub to_city: String,
    /// Travel date.
    pub date: NaiveDate,
    /// Booked seat labels.
    pub seats: Vec<SeatNo>,
    /// Booking status.
    pub status: BookingStatus,
    /// Total amount paid.
    pub amount: f64,
    /// Passenger details, when the server includes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passenger_details: Option<Vec<Passenger>>,
    /// Contact details, when the server includes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactInfo>,
}

/// The server's response to a booking submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingReceipt {
    /// Server-side booking id.
    pub booking_id: String,
    /// Bus the booking is for.
    pub bus_id: String,
    /// Outcome reported by the server.
    pub status: BookingStatus,
    /// Seats the booking holds.
    pub seats: Vec<SeatNo>,
    /// Total amount charged.
    pub amount: f64,
    /// Travel date.
    pub travel_date: NaiveDate,
    /// Operator/bus name, when included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_name: Option<String>,
    /// Origin city name, when included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_city: Option<String>,
    /// Destination city name, when included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_city: Option<String>,
}

/// An immutable route query. A new search replaces the prior one and
/// invalidates any bus or seat selection made under it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSearch {
    /// Origin city id.
    pub from_city_id: String,
    /// Destination city id.
    pub to_city_id: String,
    /// Travel date; the backend defaults to today when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// The trip the passenger is currently booking: one bus on one travel date.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedTrip {
    /// The chosen bus.
    pub bus: BusSummary,
    /// The travel date the seat map is keyed by.
    pub travel_date: NaiveDate,
}

/// A live OTP challenge issued by the server.
///
/// At most one exists at a time; a successful verification consumes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpChallenge {
    /// Server-issued challenge id, echoed back on verification.
    pub otp_id: String,
    /// The full phone number the challenge was issued for.
    pub phone: String,
    /// When the challenge was received.
    pub requested_at: DateTime<Utc>,
}
