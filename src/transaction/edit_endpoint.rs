use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{
        FromRef, Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AppState, Error,
    auth::UserID,
    database_id::TransactionId,
    db::lock_connection,
    transaction::{
        TransactionKind,
        core::{TransactionChanges, update_transaction},
        split::parse_amount,
    },
};

/// The state needed to edit a transaction.
#[derive(Debug, Clone)]
pub struct EditExpenseState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The fields a client may change, all optional.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EditExpenseData {
    /// A positive JSON number or numeric string.
    pub amount: Option<Value>,
    /// The new description.
    pub description: Option<String>,
    /// Either "give" or "take".
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl TryFrom<EditExpenseData> for TransactionChanges {
    type Error = Error;

    fn try_from(data: EditExpenseData) -> Result<Self, Self::Error> {
        let amount = data.amount.as_ref().map(parse_amount).transpose()?;
        let kind = data
            .kind
            .as_deref()
            .map(str::parse::<TransactionKind>)
            .transpose()?;

        Ok(TransactionChanges {
            amount,
            kind,
            description: data.description,
        })
    }
}

/// A route handler for editing one of the logged-in user's transactions.
///
/// Responds with the updated transaction, or 404 Not Found if the user does not own a
/// transaction with the given ID.
pub async fn edit_expense_endpoint(
    State(state): State<EditExpenseState>,
    Extension(user_id): Extension<UserID>,
    path: Result<Path<TransactionId>, PathRejection>,
    payload: Result<Json<EditExpenseData>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Path(transaction_id) = path.map_err(|_| Error::NotFound)?;
    let Json(data) = payload.map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;
    let changes = TransactionChanges::try_from(data)?;

    let transaction = update_transaction(
        user_id,
        transaction_id,
        &changes,
        &*lock_connection(&state.db_connection)?,
    )?;

    Ok(Json(transaction))
}
