//! The handler for logging in with an email and password.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{UserProfile, get_user_by_email, set_auth_cookie},
    db::lock_connection,
};

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The request body for logging in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in request, the auth cookie is set and the user's profile is returned.
///
/// # Errors
///
/// Responds with 401 Unauthorized if the email does not belong to a registered user or the
/// password is wrong. Both cases share one message so that clients cannot probe for accounts.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    payload: Result<Json<LogInData>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(data) = payload.map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;

    let user = match get_user_by_email(
        data.email.trim(),
        &*lock_connection(&state.db_connection)?,
    ) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    if !user.password_hash.verify(&data.password)? {
        tracing::debug!("Wrong password for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

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

#[cfg(test)]
mod log_in_tests {
    use axum::{Router, extract::FromRef, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        app_state::get_test_app_state,
        auth::{COOKIE_TOKEN, PasswordHash, User, create_user},
        db::lock_connection,
    };

    use super::{LogInState, post_log_in};

    const PASSWORD: &str = "wobbly-llama-tea-party";

    fn get_test_server() -> (TestServer, User) {
        let state = LogInState::from_ref(&get_test_app_state());
        let user = create_user(
            "alice",
            "alice@example.com",
            PasswordHash::from_raw_password(PASSWORD, &[], 4).unwrap(),
            &lock_connection(&state.db_connection).unwrap(),
        )
        .unwrap();
        let app = Router::new()
            .route("/login", post(post_log_in))
            .with_state(state);

        (
            TestServer::try_new(app).expect("Could not create test server."),
            user,
        )
    }

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let (server, user) = get_test_server();

        let response = server
            .post("/login")
            .json(&json!({"email": "alice@example.com", "password": PASSWORD}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["user"]["_id"], user.id.as_i64());
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_some());
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let (server, _) = get_test_server();

        let response = server
            .post("/login")
            .json(&json!({"email": "alice@example.com", "password": "wrong-password"}))
            .await;

        response.assert_status_unauthorized();
        response.assert_json(&json!({"error": "Invalid credentials"}));
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_none());
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let (server, _) = get_test_server();

        let response = server
            .post("/login")
            .json(&json!({"email": "mallory@example.com", "password": PASSWORD}))
            .await;

        response.assert_status_unauthorized();
        response.assert_json(&json!({"error": "Invalid credentials"}));
    }

    #[tokio::test]
    async fn log_in_fails_with_malformed_body() {
        let (server, _) = get_test_server();

        let response = server
            .post("/login")
            .json(&json!({"email": "alice@example.com"}))
            .await;

        response.assert_status_bad_request();
    }
}
