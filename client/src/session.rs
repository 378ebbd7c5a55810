//! The session manager: single authority for "is the user logged in" and
//! "who are they".
//!
//! Owns the OTP handshake, the bearer token and profile, startup session
//! restoration, and logout. The persisted token is written and cleared
//! synchronously inside the reducer, under the store's state lock, so the
//! in-memory session and the credential store always change in the same
//! observable transition.

use crate::api::{AuthApi, RequestOtpRequest, UpdateProfileRequest, VerifyOtpRequest};
use crate::credentials::CredentialStore;
use crate::error::ClientError;
use crate::notify::{Notification, Notifier};
use crate::types::{AuthToken, OtpChallenge, UserProfile};
use sawari_core::environment::Clock;
use sawari_core::{Effect, Reducer, SmallVec, smallvec};
use std::sync::Arc;

/// Subscriber numbers are exactly this many digits after stripping spaces.
const PHONE_DIGITS: usize = 10;

/// One-time passwords are exactly this many digits.
const OTP_LENGTH: usize = 6;

// ============================================================================
// State
// ============================================================================

/// Current authentication state.
///
/// `token` and `profile` transition together: both set by one
/// `SessionEstablished` or `RestoreFinished` step, both cleared by one
/// `Logout`/`AuthExpired` step.
#[derive(Clone, Debug)]
pub struct SessionState {
    /// Bearer token of the established session.
    pub token: Option<AuthToken>,
    /// Profile of the authenticated user.
    pub profile: Option<UserProfile>,
    /// True from process start until the one-shot startup restore ends.
    /// Never flips back to true.
    pub initializing: bool,
    /// The live OTP challenge, if one is outstanding.
    pub otp: Option<OtpChallenge>,
    /// Guards the one-shot startup restore.
    pub restore_started: bool,
    /// True while a verification call is in flight.
    pub verify_in_flight: bool,
    /// Last surfaced failure, for inline display.
    pub last_error: Option<String>,
}

impl SessionState {
    /// The state at process start: logged out, awaiting restore.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            token: None,
            profile: None,
            initializing: true,
            otp: None,
            restore_started: false,
            verify_in_flight: false,
            last_error: None,
        }
    }

    /// Whether an authenticated session is established.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Outcome of the startup session restore.
#[derive(Clone, Debug)]
pub enum RestoreOutcome {
    /// The persisted token resolved to a profile.
    Restored {
        /// The restored bearer token.
        token: AuthToken,
        /// The profile fetched with it.
        profile: UserProfile,
    },
    /// The server rejected the persisted token; it must be discarded.
    Expired,
    /// The profile fetch failed for a non-authentication reason; the token
    /// stays persisted for a later retry.
    Failed {
        /// The classified failure.
        error: ClientError,
    },
}

/// Everything the session manager reacts to.
#[derive(Clone, Debug)]
pub enum SessionAction {
    // ========== Commands ==========
    /// Request an OTP for a phone number.
    RequestOtp {
        /// Dialing prefix, for example `"+91"`.
        country_code: String,
        /// Subscriber number; spaces are tolerated.
        phone: String,
    },

    /// Verify the code the user typed against the live challenge.
    VerifyOtp {
        /// The one-time password.
        code: String,
    },

    /// One-shot startup restore from the credential store.
    RestoreSession,

    /// Clear the session and the persisted token.
    Logout,

    /// Central entry point for auth-class failures observed anywhere:
    /// clears the session like logout and tells the user why.
    AuthExpired,

    /// Update the authenticated user's profile.
    UpdateProfile {
        /// New display name.
        name: String,
        /// New contact email.
        email: String,
    },

    // ========== Events ==========
    /// The server issued an OTP challenge.
    OtpRequested {
        /// The fresh challenge; replaces any prior one.
        challenge: OtpChallenge,
    },

    /// The OTP request failed.
    OtpRequestFailed {
        /// The classified failure.
        error: ClientError,
    },

    /// Verification succeeded; the token is already persisted by the
    /// reducer when this is applied.
    SessionEstablished {
        /// The session bearer token.
        token: AuthToken,
        /// The authenticated user.
        profile: UserProfile,
    },

    /// Verification was rejected; the challenge stays live.
    VerifyFailed {
        /// The classified failure.
        error: ClientError,
    },

    /// The startup restore finished.
    RestoreFinished {
        /// What the restore concluded.
        outcome: RestoreOutcome,
    },

    /// The profile update succeeded.
    ProfileUpdated {
        /// The updated profile.
        profile: UserProfile,
    },

    /// The profile update failed.
    ProfileUpdateFailed {
        /// The classified failure.
        error: ClientError,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Injected dependencies for the session manager.
#[derive(Clone)]
pub struct SessionEnvironment {
    /// Authentication endpoints.
    pub auth_api: Arc<dyn AuthApi>,
    /// Durable token storage.
    pub credentials: Arc<dyn CredentialStore>,
    /// Time source for challenge timestamps.
    pub clock: Arc<dyn Clock>,
    /// User-visible notification sink.
    pub notifier: Arc<dyn Notifier>,
}

impl SessionEnvironment {
    /// Bundle the session manager's collaborators.
    #[must_use]
    pub fn new(
        auth_api: Arc<dyn AuthApi>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            auth_api,
            credentials,
            clock,
            notifier,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the session manager.
#[derive(Clone, Debug, Default)]
pub struct SessionReducer;

impl SessionReducer {
    /// Creates a new `SessionReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_country_code(country_code: &str) -> Result<(), ClientError> {
        let digits = country_code.strip_prefix('+').ok_or_else(|| {
            ClientError::Validation("country code must start with '+'".to_string())
        })?;

        if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClientError::Validation(
                "country code must be '+' followed by 1-3 digits".to_string(),
            ));
        }

        Ok(())
    }

    /// Strip spaces and insist on exactly [`PHONE_DIGITS`] digits.
    fn normalize_phone(phone: &str) -> Result<String, ClientError> {
        let digits: String = phone.chars().filter(|c| !c.is_whitespace()).collect();

        if digits.len() != PHONE_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClientError::Validation(format!(
                "phone number must be exactly {PHONE_DIGITS} digits"
            )));
        }

        Ok(digits)
    }

    fn validate_otp_code(code: &str) -> Result<(), ClientError> {
        if code.len() != OTP_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClientError::Validation(format!(
                "the OTP is a {OTP_LENGTH}-digit code"
            )));
        }
        Ok(())
    }

    fn validate_profile_update(name: &str, email: &str) -> Result<(), ClientError> {
        if name.trim().is_empty() {
            return Err(ClientError::Validation("name cannot be empty".to_string()));
        }
        if email.trim().is_empty() || !email.contains('@') {
            return Err(ClientError::Validation(
                "a valid email address is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Record and surface a failure without touching the rest of the state.
    fn report(state: &mut SessionState, env: &SessionEnvironment, error: &ClientError) {
        state.last_error = Some(error.to_string());
        env.notifier.notify(Notification::error(error));
    }

    /// Drop the in-memory session and the persisted token in one step.
    fn clear_session(state: &mut SessionState, env: &SessionEnvironment) {
        state.token = None;
        state.profile = None;
        state.otp = None;
        state.verify_in_flight = false;
        state.last_error = None;

        if let Err(err) = env.credentials.clear() {
            tracing::error!(error = %err, "failed to clear persisted credentials");
        }
    }
}

impl Reducer for SessionReducer {
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per operation of the session contract
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            SessionAction::RequestOtp {
                country_code,
                phone,
            } => {
                if let Err(error) = Self::validate_country_code(&country_code) {
                    Self::report(state, env, &error);
                    return SmallVec::new();
                }
                let digits = match Self::normalize_phone(&phone) {
                    Ok(digits) => digits,
                    Err(error) => {
                        Self::report(state, env, &error);
                        return SmallVec::new();
                    },
                };

                state.last_error = None;

                let api = Arc::clone(&env.auth_api);
                let clock = Arc::clone(&env.clock);
                let full_phone = format!("{country_code}{digits}");
                smallvec![Effect::future(async move {
                    let request = RequestOtpRequest {
                        country_code,
                        phone: digits,
                    };
                    match api.request_otp(request).await {
                        Ok(response) => Some(SessionAction::OtpRequested {
                            challenge: OtpChallenge {
                                otp_id: response.otp_id,
                                phone: full_phone,
                                requested_at: clock.now(),
                            },
                        }),
                        Err(err) => Some(SessionAction::OtpRequestFailed { error: err.into() }),
                    }
                })]
            },

            SessionAction::VerifyOtp { code } => {
                let Some(challenge) = state.otp.clone() else {
                    Self::report(
                        state,
                        env,
                        &ClientError::State("request an OTP before verifying".to_string()),
                    );
                    return SmallVec::new();
                };

                if state.verify_in_flight {
                    Self::report(
                        state,
                        env,
                        &ClientError::State("verification already in progress".to_string()),
                    );
                    return SmallVec::new();
                }

                if let Err(error) = Self::validate_otp_code(&code) {
                    Self::report(state, env, &error);
                    return SmallVec::new();
                }

                state.verify_in_flight = true;
                state.last_error = None;

                let api = Arc::clone(&env.auth_api);
                smallvec![Effect::future(async move {
                    let request = VerifyOtpRequest {
                        otp_id: challenge.otp_id,
                        otp: code,
                    };
                    match api.verify_otp(request).await {
                        Ok(response) => Some(SessionAction::SessionEstablished {
                            token: response.token,
                            profile: response.user,
                        }),
                        Err(err) => Some(SessionAction::VerifyFailed { error: err.into() }),
                    }
                })]
            },

            SessionAction::RestoreSession => {
                if state.restore_started {
                    Self::report(
                        state,
                        env,
                        &ClientError::State("session restore already ran".to_string()),
                    );
                    return SmallVec::new();
                }
                state.restore_started = true;

                let stored = match env.credentials.load() {
                    Ok(stored) => stored,
                    Err(err) => {
                        // An unreadable store means logged out; drop the
                        // corrupt payload so the next start is clean.
                        tracing::warn!(error = %err, "credential store unreadable, treating as logged out");
                        let _ = env.credentials.clear();
                        state.initializing = false;
                        return SmallVec::new();
                    },
                };

                let Some(token) = stored else {
                    state.initializing = false;
                    return SmallVec::new();
                };

                let api = Arc::clone(&env.auth_api);
                smallvec![Effect::future(async move {
                    let fetched = api.get_profile(&token).await;
                    let outcome = match fetched {
                        Ok(profile) => RestoreOutcome::Restored { token, profile },
                        Err(crate::api::ApiError::Unauthorized(_)) => RestoreOutcome::Expired,
                        Err(err) => RestoreOutcome::Failed { error: err.into() },
                    };
                    Some(SessionAction::RestoreFinished { outcome })
                })]
            },

            SessionAction::Logout => {
                Self::clear_session(state, env);
                env.notifier.notify(Notification::info("Signed out"));
                SmallVec::new()
            },

            SessionAction::AuthExpired => {
                let had_session = state.is_logged_in();
                Self::clear_session(state, env);
                if had_session {
                    env.notifier
                        .notify(Notification::error(&ClientError::AuthExpired));
                }
                SmallVec::new()
            },

            SessionAction::UpdateProfile { name, email } => {
                let Some(token) = state.token.clone() else {
                    Self::report(state, env, &ClientError::AuthRequired);
                    return SmallVec::new();
                };

                if let Err(error) = Self::validate_profile_update(&name, &email) {
                    Self::report(state, env, &error);
                    return SmallVec::new();
                }

                state.last_error = None;

                let api = Arc::clone(&env.auth_api);
                smallvec![Effect::future(async move {
                    let request = UpdateProfileRequest { name, email };
                    match api.update_profile(&token, request).await {
                        Ok(profile) => Some(SessionAction::ProfileUpdated { profile }),
                        Err(err) => Some(SessionAction::ProfileUpdateFailed { error: err.into() }),
                    }
                })]
            },

            // ========== Events ==========
            SessionAction::OtpRequested { challenge } => {
                tracing::info!(phone = %challenge.phone, "OTP challenge issued");
                // A fresh challenge supersedes any unconsumed one.
                state.otp = Some(challenge);
                state.last_error = None;
                env.notifier
                    .notify(Notification::info("OTP sent to your phone"));
                SmallVec::new()
            },

            SessionAction::OtpRequestFailed { error } => {
                Self::report(state, env, &error);
                SmallVec::new()
            },

            SessionAction::SessionEstablished { token, profile } => {
                // Persist first, inside this same transition. If the token
                // cannot be made durable the session is not established, so
                // memory never runs ahead of the store.
                if let Err(err) = env.credentials.save(&token) {
                    state.verify_in_flight = false;
                    let error =
                        ClientError::Transport(format!("could not persist session: {err}"));
                    Self::report(state, env, &error);
                    return SmallVec::new();
                }

                state.token = Some(token);
                state.profile = Some(profile.clone());
                state.otp = None;
                state.verify_in_flight = false;
                state.last_error = None;
                env.notifier
                    .notify(Notification::success(format!("Signed in as {}", profile.name)));
                SmallVec::new()
            },

            SessionAction::VerifyFailed { error } => {
                state.verify_in_flight = false;
                // The challenge stays live so the user can retype the code.
                Self::report(state, env, &error);
                SmallVec::new()
            },

            SessionAction::RestoreFinished { outcome } => {
                if state.is_logged_in() {
                    // A login completed while the restore was in flight; its
                    // session wins and the restore result is dropped.
                    state.initializing = false;
                    return SmallVec::new();
                }

                match outcome {
                    RestoreOutcome::Restored { token, profile } => {
                        tracing::info!(user = %profile.name, "session restored");
                        state.token = Some(token);
                        state.profile = Some(profile);
                    },
                    RestoreOutcome::Expired => {
                        if let Err(err) = env.credentials.clear() {
                            tracing::error!(error = %err, "failed to clear expired credentials");
                        }
                        env.notifier
                            .notify(Notification::error(&ClientError::AuthExpired));
                    },
                    RestoreOutcome::Failed { error } => {
                        // The token stays persisted for a later retry; the
                        // UI just starts logged out.
                        tracing::warn!(error = %error, "session restore failed, starting logged out");
                        state.last_error = Some(error.to_string());
                    },
                }

                state.initializing = false;
                SmallVec::new()
            },

            SessionAction::ProfileUpdated { profile } => {
                state.profile = Some(profile);
                state.last_error = None;
                env.notifier.notify(Notification::success("Profile updated"));
                SmallVec::new()
            },

            SessionAction::ProfileUpdateFailed { error } => {
                if error.is_auth_expired() {
                    // Route through the central clearing path.
                    state.last_error = Some(error.to_string());
                    return smallvec![Effect::future(async { Some(SessionAction::AuthExpired) })];
                }
                Self::report(state, env, &error);
                SmallVec::new()
            },
        }
    }
}
