use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State, rejection::PathRejection},
    response::IntoResponse,
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error, auth::UserID, database_id::TransactionId, db::lock_connection,
    transaction::core::delete_transaction,
};

/// The state needed to delete a transaction.
#[derive(Debug, Clone)]
pub struct DeleteExpenseState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for deleting one of the logged-in user's transactions.
///
/// Only the given transaction is deleted, the other half of a shared expense is kept.
pub async fn delete_expense_endpoint(
    State(state): State<DeleteExpenseState>,
    Extension(user_id): Extension<UserID>,
    path: Result<Path<TransactionId>, PathRejection>,
) -> Result<impl IntoResponse, Error> {
    let Path(transaction_id) = path.map_err(|_| Error::NotFound)?;

    delete_transaction(
        user_id,
        transaction_id,
        &*lock_connection(&state.db_connection)?,
    )?;
    tracing::debug!("User {user_id} deleted transaction {transaction_id}");

    Ok(Json(json!({ "message": "Expense deleted" })))
}

#[cfg(test)]
mod tests {
    use axum::{Extension, Router, extract::FromRef, routing::delete};
    use axum_test::TestServer;
    use rust_decimal::dec;
    use serde_json::json;

    use crate::{
        Error,
        app_state::get_test_app_state,
        auth::{PasswordHash, UserID, create_user},
        db::lock_connection,
        transaction::{Transaction, TransactionKind, create_transaction, get_transaction},
    };

    use super::{DeleteExpenseState, delete_expense_endpoint};

    fn get_test_server(acting_user: UserID, state: &DeleteExpenseState) -> TestServer {
        let app = Router::new()
            .route("/api/expenses/delete/{id}", delete(delete_expense_endpoint))
            .layer(Extension(acting_user))
            .with_state(state.clone());

        TestServer::try_new(app).expect("Could not create test server.")
    }

    fn create_owned_transaction(state: &DeleteExpenseState) -> (UserID, UserID, Transaction) {
        let conn = lock_connection(&state.db_connection).unwrap();
        let owner = create_user(
            "alice",
            "alice@example.com",
            PasswordHash::new_unchecked("hash"),
            &conn,
        )
        .unwrap();
        let other = create_user(
            "mallory",
            "mallory@example.com",
            PasswordHash::new_unchecked("hash"),
            &conn,
        )
        .unwrap();
        let transaction = create_transaction(
            Transaction::build(owner.id, dec!(9.99), TransactionKind::Give, "Snacks"),
            &conn,
        )
        .unwrap();

        (owner.id, other.id, transaction)
    }

    #[tokio::test]
    async fn owner_can_delete() {
        let state = DeleteExpenseState::from_ref(&get_test_app_state());
        let (owner, _, transaction) = create_owned_transaction(&state);
        let server = get_test_server(owner, &state);

        let response = server
            .delete(&format!("/api/expenses/delete/{}", transaction.id))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"message": "Expense deleted"}));
        assert_eq!(
            get_transaction(transaction.id, &lock_connection(&state.db_connection).unwrap()),
            Err(Error::NotFound)
        );
    }

    #[tokio::test]
    async fn non_owner_gets_not_found() {
        let state = DeleteExpenseState::from_ref(&get_test_app_state());
        let (_, other, transaction) = create_owned_transaction(&state);
        let server = get_test_server(other, &state);

        let response = server
            .delete(&format!("/api/expenses/delete/{}", transaction.id))
            .await;

        response.assert_status_not_found();
        response.assert_json(&json!({"error": "Expense not found"}));
        assert!(
            get_transaction(transaction.id, &lock_connection(&state.db_connection).unwrap())
                .is_ok()
        );
    }
}
