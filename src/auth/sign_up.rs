//! The handler for creating a new account.

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{PasswordHash, UserProfile, create_user, set_auth_cookie},
    db::lock_connection,
    transaction::is_mentionable_name,
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct SignUpState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The bcrypt cost for hashing the new password.
    pub password_cost: u32,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SignUpState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            password_cost: state.password_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<SignUpState> for Key {
    fn from_ref(state: &SignUpState) -> Self {
        state.cookie_key.clone()
    }
}

/// The request body for signing up.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpData {
    /// The display name other users will mention the new user by.
    pub name: String,
    /// The email address to log in with.
    pub email: String,
    /// The raw password, checked for strength before hashing.
    pub password: String,
}

/// Check that `name` can be used as a display name and return it trimmed.
fn validate_name(name: &str) -> Result<&str, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::InvalidName("the name cannot be empty".to_owned()));
    }

    if name.contains('@') {
        return Err(Error::InvalidName(
            "the name cannot contain the '@' character".to_owned(),
        ));
    }

    if !is_mentionable_name(name) {
        return Err(Error::InvalidName(
            "the name may only contain letters, digits, '.', '_' and '-'".to_owned(),
        ));
    }

    Ok(name)
}

/// Handler for sign-up requests.
///
/// Creates the user, logs them in by setting the auth cookie and responds with 201 Created and
/// the new user's profile.
///
/// # Errors
///
/// Responds with 400 Bad Request if the body is malformed, the name or email is invalid or
/// already taken, or the password is too weak.
pub async fn sign_up(
    State(state): State<SignUpState>,
    jar: PrivateCookieJar,
    payload: Result<Json<SignUpData>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(data) = payload.map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;

    let name = validate_name(&data.name)?;
    let email = data.email.trim();
    EmailAddress::from_str(email).map_err(|error| Error::InvalidEmail(error.to_string()))?;

    let password_hash =
        PasswordHash::from_raw_password(&data.password, &[name, email], state.password_cost)?;

    let user = create_user(
        name,
        email,
        password_hash,
        &*lock_connection(&state.db_connection)?,
    )?;
    tracing::info!("Created user {} with ID {}", user.name, user.id);

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({
            "message": "Signup successful",
            "user": UserProfile::from(&user),
        })),
    )
        .into_response())
}

#[cfg(test)]
mod sign_up_tests {
    use axum::{Router, extract::FromRef, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        Error,
        app_state::get_test_app_state,
        auth::{COOKIE_TOKEN, PasswordHash, count_users, create_user},
        db::lock_connection,
    };

    use super::{SignUpState, sign_up, validate_name};

    fn get_test_server() -> (TestServer, SignUpState) {
        let state = SignUpState::from_ref(&get_test_app_state());
        let app = Router::new()
            .route("/signup", post(sign_up))
            .with_state(state.clone());

        (
            TestServer::try_new(app).expect("Could not create test server."),
            state,
        )
    }

    #[tokio::test]
    async fn sign_up_succeeds() {
        let (server, _) = get_test_server();

        let response = server
            .post("/signup")
            .json(&json!({
                "name": "alice",
                "email": "alice@example.com",
                "password": "correct horse battery staple",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["message"], "Signup successful");
        assert_eq!(body["user"]["name"], "alice");
        assert_eq!(body["user"]["email"], "alice@example.com");
        assert!(body["user"]["_id"].is_i64());
        assert!(body["user"].get("password").is_none());
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_some());
    }

    #[tokio::test]
    async fn sign_up_fails_on_duplicate_email() {
        let (server, state) = get_test_server();
        create_user(
            "alice",
            "alice@example.com",
            PasswordHash::new_unchecked("hash"),
            &lock_connection(&state.db_connection).unwrap(),
        )
        .unwrap();

        let response = server
            .post("/signup")
            .json(&json!({
                "name": "alicia",
                "email": "alice@example.com",
                "password": "correct horse battery staple",
            }))
            .await;

        response.assert_status_bad_request();
        response.assert_json(&json!({"error": "User already exists"}));
    }

    #[tokio::test]
    async fn sign_up_fails_on_duplicate_name() {
        let (server, state) = get_test_server();
        create_user(
            "alice",
            "alice@example.com",
            PasswordHash::new_unchecked("hash"),
            &lock_connection(&state.db_connection).unwrap(),
        )
        .unwrap();

        let response = server
            .post("/signup")
            .json(&json!({
                "name": "alice",
                "email": "alice@example.org",
                "password": "correct horse battery staple",
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn sign_up_fails_on_invalid_email() {
        let (server, _) = get_test_server();

        let response = server
            .post("/signup")
            .json(&json!({
                "name": "alice",
                "email": "not-an-email",
                "password": "correct horse battery staple",
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn sign_up_fails_on_weak_password() {
        let (server, _) = get_test_server();

        let response = server
            .post("/signup")
            .json(&json!({
                "name": "alice",
                "email": "alice@example.com",
                "password": "password",
            }))
            .await;

        response.assert_status_bad_request();
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_none());
    }

    #[tokio::test]
    async fn sign_up_fails_on_missing_field() {
        let (server, _) = get_test_server();

        let response = server
            .post("/signup")
            .json(&json!({"name": "alice", "email": "alice@example.com"}))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn sign_up_fails_on_name_with_space() {
        let (server, state) = get_test_server();

        let response = server
            .post("/signup")
            .json(&json!({
                "name": "Alice Smith",
                "email": "alice@example.com",
                "password": "correct horse battery staple",
            }))
            .await;

        response.assert_status_bad_request();
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_none());
        assert_eq!(
            count_users(&lock_connection(&state.db_connection).unwrap()),
            Ok(0)
        );
    }

    #[test]
    fn name_must_be_a_single_mention_token() {
        for name in ["Alice Smith", "Zoë", "bob!"] {
            assert!(
                matches!(validate_name(name), Err(Error::InvalidName(_))),
                "{name} should be rejected"
            );
        }
        assert_eq!(validate_name("bob.smith-2"), Ok("bob.smith-2"));
    }

    #[test]
    fn name_is_trimmed() {
        assert_eq!(validate_name("  bob "), Ok("bob"));
    }

    #[test]
    fn name_cannot_be_blank() {
        assert!(matches!(validate_name("   "), Err(Error::InvalidName(_))));
    }

    #[test]
    fn name_cannot_contain_at_sign() {
        assert!(matches!(
            validate_name("bob@home"),
            Err(Error::InvalidName(_))
        ));
    }
}
