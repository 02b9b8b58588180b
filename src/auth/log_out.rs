//! The handler for logging out.

use axum::{Json, response::IntoResponse};
use axum_extra::extract::PrivateCookieJar;
use serde_json::json;

use crate::auth::invalidate_auth_cookie;

/// Invalidate the auth cookie so that the client has to log in again.
///
/// Succeeds whether or not the client was logged in.
pub async fn post_log_out(jar: PrivateCookieJar) -> impl IntoResponse {
    let jar = invalidate_auth_cookie(jar);

    (jar, Json(json!({ "message": "Logout successful" })))
}
