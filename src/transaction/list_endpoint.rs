use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::IntoResponse,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, auth::UserID, db::lock_connection,
    transaction::core::get_transactions_for_user,
};

/// The state needed to list a user's transactions.
#[derive(Debug, Clone)]
pub struct ListExpensesState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ListExpensesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that responds with the logged-in user's transactions, most recent first.
pub async fn get_expenses_endpoint(
    State(state): State<ListExpensesState>,
    Extension(user_id): Extension<UserID>,
) -> Result<impl IntoResponse, Error> {
    let transactions =
        get_transactions_for_user(user_id, &*lock_connection(&state.db_connection)?)?;

    Ok(Json(transactions))
}

#[cfg(test)]
mod tests {
    use axum::{Extension, Router, extract::FromRef, routing::get};
    use axum_test::TestServer;
    use rust_decimal::dec;
    use serde_json::Value;
    use time::macros::datetime;

    use crate::{
        app_state::get_test_app_state,
        auth::{PasswordHash, create_user},
        db::lock_connection,
        transaction::{Transaction, TransactionKind, create_transaction},
    };

    use super::{ListExpensesState, get_expenses_endpoint};

    #[tokio::test]
    async fn lists_only_own_transactions_newest_first() {
        let state = ListExpensesState::from_ref(&get_test_app_state());
        let alice = {
            let conn = lock_connection(&state.db_connection).unwrap();
            let alice = create_user(
                "alice",
                "alice@example.com",
                PasswordHash::new_unchecked("hash"),
                &conn,
            )
            .unwrap();
            let bob = create_user(
                "bob",
                "bob@example.com",
                PasswordHash::new_unchecked("hash"),
                &conn,
            )
            .unwrap();
            for (day, description) in [(1, "older"), (2, "newer")] {
                create_transaction(
                    Transaction::build(alice.id, dec!(5), TransactionKind::Give, description)
                        .created_at(datetime!(2025-05-01 12:00 UTC).replace_day(day).unwrap()),
                    &conn,
                )
                .unwrap();
            }
            create_transaction(
                Transaction::build(bob.id, dec!(7), TransactionKind::Take, "bob's"),
                &conn,
            )
            .unwrap();

            alice
        };
        let app = Router::new()
            .route("/api/expenses", get(get_expenses_endpoint))
            .layer(Extension(alice.id))
            .with_state(state);
        let server = TestServer::try_new(app).expect("Could not create test server.");

        let response = server.get("/api/expenses").await;

        response.assert_status_ok();
        let body: Vec<Value> = response.json();
        let descriptions: Vec<&str> = body
            .iter()
            .map(|transaction| transaction["description"].as_str().unwrap())
            .collect();
        assert_eq!(descriptions, vec!["newer", "older"]);
    }
}
