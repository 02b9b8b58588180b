use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::IntoResponse,
};
use rusqlite::Connection;

use crate::{AppState, Error, db::lock_connection, summary::get_monthly_summary};

/// The state needed to summarise transactions by month.
#[derive(Debug, Clone)]
pub struct SummaryState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone used to decide which month a transaction belongs to.
    pub local_timezone: String,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler that responds with every user's transactions grouped by month.
///
/// This route does not require authentication.
pub async fn get_monthly_summary_endpoint(
    State(state): State<SummaryState>,
) -> Result<impl IntoResponse, Error> {
    let summaries = get_monthly_summary(
        &*lock_connection(&state.db_connection)?,
        &state.local_timezone,
    )?;

    Ok(Json(summaries))
}
