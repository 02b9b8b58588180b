use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::IntoResponse,
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error,
    auth::{UserID, get_user_by_id},
    db::lock_connection,
};

/// The state needed to look up the logged-in user.
#[derive(Debug, Clone)]
pub struct CurrentUserState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CurrentUserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Respond with the display name of the logged-in user as `{"username": name}`.
pub async fn get_current_user(
    State(state): State<CurrentUserState>,
    Extension(user_id): Extension<UserID>,
) -> Result<impl IntoResponse, Error> {
    let user = match get_user_by_id(user_id, &*lock_connection(&state.db_connection)?) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::UserNotFound),
        Err(error) => return Err(error),
    };

    Ok(Json(json!({ "username": user.name })))
}
