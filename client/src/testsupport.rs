//! Shared test doubles for reducer-level tests.
//!
//! Reducer tests never execute effects, so these API stubs exist only to
//! satisfy the environment types; any call is a test bug and panics loudly.

#![allow(clippy::panic)]

use crate::api::{
    ApiError, AuthApi, BookRequest, BookingsResponse, CatalogApi, CitiesResponse,
    RequestOtpRequest, RequestOtpResponse, SearchBusesResponse, SeatMapResponse,
    UpdateProfileRequest, VerifyOtpRequest, VerifyOtpResponse,
};
use crate::types::{AuthToken, BookingReceipt, RouteSearch, UserProfile};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Auth API stub; panics on any call.
pub struct StubAuthApi;

#[async_trait]
impl AuthApi for StubAuthApi {
    async fn request_otp(&self, _req: RequestOtpRequest) -> Result<RequestOtpResponse, ApiError> {
        panic!("reducer tests must not reach the network")
    }

    async fn verify_otp(&self, _req: VerifyOtpRequest) -> Result<VerifyOtpResponse, ApiError> {
        panic!("reducer tests must not reach the network")
    }

    async fn get_profile(&self, _token: &AuthToken) -> Result<UserProfile, ApiError> {
        panic!("reducer tests must not reach the network")
    }

    async fn update_profile(
        &self,
        _token: &AuthToken,
        _req: UpdateProfileRequest,
    ) -> Result<UserProfile, ApiError> {
        panic!("reducer tests must not reach the network")
    }
}

/// Catalog API stub; panics on any call.
pub struct StubCatalogApi;

#[async_trait]
impl CatalogApi for StubCatalogApi {
    async fn list_cities(&self) -> Result<CitiesResponse, ApiError> {
        panic!("reducer tests must not reach the network")
    }

    async fn search_buses(&self, _req: &RouteSearch) -> Result<SearchBusesResponse, ApiError> {
        panic!("reducer tests must not reach the network")
    }

    async fn seat_map(
        &self,
        _bus_id: &str,
        _travel_date: Option<NaiveDate>,
    ) -> Result<SeatMapResponse, ApiError> {
        panic!("reducer tests must not reach the network")
    }

    async fn create_booking(
        &self,
        _token: Option<&AuthToken>,
        _req: &BookRequest,
    ) -> Result<BookingReceipt, ApiError> {
        panic!("reducer tests must not reach the network")
    }

    async fn list_bookings(&self, _token: &AuthToken) -> Result<BookingsResponse, ApiError> {
        panic!("reducer tests must not reach the network")
    }
}
