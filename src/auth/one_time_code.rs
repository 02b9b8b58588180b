//! Log-in with a one-time code instead of a password.
//!
//! A client asks for a code to be sent to an email address, then exchanges the code for an auth
//! cookie. Pending codes live in memory in a [OneTimeCodeStore], keyed by user, and expire after
//! a short time. Codes are handed to a [CodeSender] for delivery.

use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::{UserID, UserProfile, get_user_by_email, set_auth_cookie},
    db::lock_connection,
};

/// A six digit code that logs a user in once.
#[derive(Clone, PartialEq)]
pub struct OneTimeCode(String);

impl OneTimeCode {
    /// Generate a random code.
    pub fn generate() -> Self {
        let number: u32 = rand::thread_rng().gen_range(0..1_000_000);

        Self(format!("{number:06}"))
    }

    /// The digits of the code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for OneTimeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OneTimeCode(******)")
    }
}

impl Display for OneTimeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivers one-time codes to users.
pub trait CodeSender: Debug + Send + Sync {
    /// Send `code` to the owner of `email`.
    ///
    /// # Errors
    ///
    /// Returns [Error::CodeDeliveryError] if the code could not be handed over for delivery,
    /// e.g. when a mail server rejects the message. The request handler turns this into a 500
    /// response.
    fn send(&self, email: &str, code: &OneTimeCode) -> Result<(), Error>;
}

/// A [CodeSender] that writes codes to the application log.
///
/// Useful for local development and for deployments where an operator hands codes out.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCodeSender;

impl CodeSender for LogCodeSender {
    fn send(&self, email: &str, code: &OneTimeCode) -> Result<(), Error> {
        tracing::info!("One-time log-in code for {email}: {code}");

        Ok(())
    }
}

#[derive(Debug)]
struct PendingCode {
    code: OneTimeCode,
    expires_at: OffsetDateTime,
    attempts_left: u8,
}

/// The codes that have been sent but not used yet.
///
/// Each user has at most one pending code, requesting a new code replaces the old one.
#[derive(Debug)]
pub struct OneTimeCodeStore {
    codes: Mutex<HashMap<UserID, PendingCode>>,
    lifetime: Duration,
}

impl Default for OneTimeCodeStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIFETIME)
    }
}

impl OneTimeCodeStore {
    /// How long a code can be used for after it is issued.
    pub const DEFAULT_LIFETIME: Duration = Duration::minutes(10);
    /// How many wrong guesses are allowed before a code is discarded.
    pub const MAX_ATTEMPTS: u8 = 5;

    /// Create an empty store where codes are valid for `lifetime`.
    pub fn new(lifetime: Duration) -> Self {
        Self {
            codes: Mutex::new(HashMap::new()),
            lifetime,
        }
    }

    // The map holds no invariants across entries, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<UserID, PendingCode>> {
        self.codes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a new code for `user_id`, replacing any pending code.
    pub fn issue(&self, user_id: UserID, now: OffsetDateTime) -> OneTimeCode {
        let code = OneTimeCode::generate();
        let mut codes = self.lock();

        codes.retain(|_, pending| pending.expires_at > now);
        codes.insert(
            user_id,
            PendingCode {
                code: code.clone(),
                expires_at: now + self.lifetime,
                attempts_left: Self::MAX_ATTEMPTS,
            },
        );

        code
    }

    /// Check `candidate` against the pending code for `user_id` and consume the code on success.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidOneTimeCode] if there is no pending code, the code has expired or
    /// `candidate` does not match. The code is discarded after [Self::MAX_ATTEMPTS] wrong guesses.
    pub fn verify(&self, user_id: UserID, candidate: &str, now: OffsetDateTime) -> Result<(), Error> {
        let mut codes = self.lock();
        codes.retain(|_, pending| pending.expires_at > now);

        let pending = codes.get_mut(&user_id).ok_or(Error::InvalidOneTimeCode)?;

        if pending.code.as_str() == candidate.trim() {
            codes.remove(&user_id);
            return Ok(());
        }

        pending.attempts_left = pending.attempts_left.saturating_sub(1);
        if pending.attempts_left == 0 {
            tracing::warn!("Discarding one-time code for user {user_id} after too many attempts");
            codes.remove(&user_id);
        }

        Err(Error::InvalidOneTimeCode)
    }
}

/// The state needed for one-time code log-in.
#[derive(Debug, Clone)]
pub struct OneTimeCodeState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The pending codes.
    pub one_time_codes: Arc<OneTimeCodeStore>,
    /// Delivers new codes.
    pub code_sender: Arc<dyn CodeSender>,
}

impl FromRef<AppState> for OneTimeCodeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
            one_time_codes: state.one_time_codes.clone(),
            code_sender: state.code_sender.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<OneTimeCodeState> for Key {
    fn from_ref(state: &OneTimeCodeState) -> Self {
        state.cookie_key.clone()
    }
}

/// The request body for asking for a one-time code.
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestCodeData {
    /// The email address of the account to log in to.
    pub email: String,
}

/// The request body for logging in with a one-time code.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyCodeData {
    /// The email address the code was requested for.
    pub email: String,
    /// The code that was sent to the user.
    pub otp: String,
}

const CODE_REQUESTED_MESSAGE: &str = "If an account exists for that email, a code has been sent.";

/// Handler for requesting a one-time code.
///
/// Responds with the same message whether or not the email belongs to a registered user.
pub async fn request_one_time_code(
    State(state): State<OneTimeCodeState>,
    payload: Result<Json<RequestCodeData>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(data) = payload.map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;
    let email = data.email.trim();

    let user = match get_user_by_email(email, &*lock_connection(&state.db_connection)?) {
        Ok(user) => Some(user),
        Err(Error::NotFound) => None,
        Err(error) => return Err(error),
    };

    match user {
        Some(user) => {
            let code = state
                .one_time_codes
                .issue(user.id, OffsetDateTime::now_utc());
            state.code_sender.send(&user.email, &code)?;
        }
        None => tracing::debug!("One-time code requested for unknown email"),
    }

    Ok(Json(json!({ "message": CODE_REQUESTED_MESSAGE })).into_response())
}

/// Handler for logging in with a one-time code.
///
/// # Errors
///
/// Responds with 401 Unauthorized if the email is unknown or the code is wrong, expired or
/// already used.
pub async fn verify_one_time_code(
    State(state): State<OneTimeCodeState>,
    jar: PrivateCookieJar,
    payload: Result<Json<VerifyCodeData>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(data) = payload.map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;

    let user = match get_user_by_email(
        data.email.trim(),
        &*lock_connection(&state.db_connection)?,
    ) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidOneTimeCode),
        Err(error) => return Err(error),
    };

    state
        .one_time_codes
        .verify(user.id, &data.otp, OffsetDateTime::now_utc())?;

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((
        jar,
        Json(json!({
            "message": "Login successful",
            "user": UserProfile::from(&user),
        })),
    )
        .into_response())
}

/// A [CodeSender] that remembers every code it was asked to send.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingCodeSender {
    sent: Mutex<Vec<(String, OneTimeCode)>>,
}

#[cfg(test)]
impl RecordingCodeSender {
    /// The most recent code sent to `email`.
    pub(crate) fn last_code_for(&self, email: &str) -> Option<OneTimeCode> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(recipient, _)| recipient == email)
            .map(|(_, code)| code.clone())
    }

    pub(crate) fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(test)]
impl CodeSender for RecordingCodeSender {
    fn send(&self, email: &str, code: &OneTimeCode) -> Result<(), Error> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_owned(), code.clone()));

        Ok(())
    }
}
