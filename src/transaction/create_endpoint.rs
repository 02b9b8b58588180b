//! Defines the endpoint for recording a new expense.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error,
    auth::{UserID, get_user_by_id},
    db::lock_connection,
    transaction::split::{ExpenseOutcome, ExpenseRequest, record_expense},
};

/// The state needed to record an expense.
#[derive(Debug, Clone)]
pub struct CreateExpenseState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for recording a new expense.
///
/// Responds with 201 Created and the new transaction, or with a message if the expense was
/// shared with a mentioned user.
pub async fn create_expense_endpoint(
    State(state): State<CreateExpenseState>,
    Extension(user_id): Extension<UserID>,
    payload: Result<Json<ExpenseRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!("Rejected expense body: {}", rejection.body_text());
        Error::InvalidRequest("Invalid transaction data".to_owned())
    })?;

    let connection = lock_connection(&state.db_connection)?;
    let requester = match get_user_by_id(user_id, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::UserNotFound),
        Err(error) => return Err(error),
    };

    let response = match record_expense(&requester, &request, &connection)? {
        ExpenseOutcome::Solo(transaction) => {
            (StatusCode::CREATED, Json(transaction)).into_response()
        }
        ExpenseOutcome::Split { .. } => (
            StatusCode::CREATED,
            Json(json!({ "message": "Shared transaction recorded." })),
        )
            .into_response(),
    };

    Ok(response)
}
