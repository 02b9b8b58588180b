//! Authentication middleware that validates the auth cookie before protected handlers run.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{CookieJar, PrivateCookieJar, cookie::Key};

use crate::{
    AppState, Error,
    auth::cookie::{COOKIE_TOKEN, get_token_from_cookies},
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid authorization cookie.
///
/// If the cookie holds a valid token, the user ID is placed into the request extensions and the
/// request is executed normally. Otherwise the request is rejected with:
/// - 401 Unauthorized if no auth cookie was sent,
/// - 403 Forbidden if the cookie could not be decrypted, could not be parsed or has expired.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>`
/// to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(error) => {
            tracing::error!("Error getting cookie jar: {error:?}");
            return Error::Unauthorized.into_response();
        }
    };

    let user_id = match get_token_from_cookies(&jar) {
        Ok(token) => token.user_id,
        // The private jar hides cookies that fail decryption, so check whether one was sent.
        Err(Error::Unauthorized)
            if CookieJar::from_headers(&parts.headers)
                .get(COOKIE_TOKEN)
                .is_some() =>
        {
            tracing::debug!("Rejecting an auth cookie that could not be decrypted");
            return Error::InvalidToken.into_response();
        }
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}
