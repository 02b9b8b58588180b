//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error,
    auth::{CodeSender, DEFAULT_COOKIE_DURATION, OneTimeCodeStore, PasswordHash},
    db::initialize,
    timezone::get_local_offset,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The timezone used to decide which month a transaction belongs to, as a
    /// canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,

    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The pending one-time log-in codes.
    pub one_time_codes: Arc<OneTimeCodeStore>,

    /// Delivers one-time log-in codes to users.
    pub code_sender: Arc<dyn CodeSender>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or if `local_timezone` is not a
    /// known timezone.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        local_timezone: &str,
        code_sender: Arc<dyn CodeSender>,
    ) -> Result<Self, Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
        }

        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: local_timezone.to_owned(),
            password_cost: PasswordHash::DEFAULT_COST,
            db_connection: Arc::new(Mutex::new(db_connection)),
            one_time_codes: Arc::new(OneTimeCodeStore::default()),
            code_sender,
        })
    }

    /// Use `cost` when hashing passwords instead of [PasswordHash::DEFAULT_COST].
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}


/// An [AppState] backed by an in-memory database with a cheap password hashing cost.
#[cfg(test)]
pub(crate) fn get_test_app_state() -> AppState {
    use crate::LogCodeSender;

    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");

    AppState::new(connection, "foobar", "Etc/UTC", Arc::new(LogCodeSender))
        .expect("Could not create app state")
        .with_password_cost(4)
}
