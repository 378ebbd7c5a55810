//! # Sawari Client
//!
//! A passenger-facing bus-ticket booking client: phone + OTP login, route
//! search, seat selection, and booking confirmation, with one source of
//! truth for session and selection state.
//!
//! The crate is organized as two state controllers on the sawari store
//! runtime, plus their collaborators:
//!
//! - [`session::SessionReducer`]: the authentication lifecycle. OTP
//!   handshake, token persistence, startup restore, logout, and centralized
//!   handling of expired credentials.
//! - [`booking::BookingReducer`]: the booking workflow. Route search, trip
//!   selection, the seat-availability cache and its consistency rules, fare
//!   derivation, and booking submission.
//! - [`api::ApiClient`]: typed wrappers over the backend REST contract.
//! - [`credentials`]: the durable token store (one JSON file).
//! - [`notify`]: the one-way notification surface for user-visible events.
//! - [`app::SawariApp`]: wires both stores together and exposes the
//!   operations UIs call.
//!
//! ## Getting started
//!
//! ```ignore
//! use sawari_client::{Config, SawariApp};
//!
//! let app = SawariApp::new(&Config::from_env())?;
//! app.restore_session().await?;      // once, at startup
//!
//! app.request_otp("+91", "98765 43210").await?;
//! app.verify_otp("123456").await?;
//! ```

pub mod api;
pub mod app;
pub mod booking;
pub mod config;
pub mod credentials;
pub mod error;
pub mod notify;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testsupport;

pub use app::{AppError, SawariApp};
pub use config::Config;
pub use error::ClientError;
