//! Records new expenses, splitting them with another user when the description mentions one.

use std::str::FromStr;

use rusqlite::Connection;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::User,
    database_id::SplitId,
    transaction::{
        Transaction, TransactionKind, core::create_transaction, counterparty::resolve_counterparty,
        parse_mention,
    },
};

/// Create the table that links the two halves of a shared expense.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_split_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS split (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn create_split(created_at: OffsetDateTime, connection: &Connection) -> Result<SplitId, Error> {
    connection
        .prepare("INSERT INTO split (created_at) VALUES (?1) RETURNING id")?
        .query_row((created_at,), |row| row.get(0))
        .map_err(|error| error.into())
}

/// A request to record a new expense, as sent by the client.
///
/// Fields are kept loose so that missing or mistyped fields are reported as
/// [Error::InvalidRequest] instead of a JSON rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseRequest {
    /// A positive number, either a JSON number or a numeric string.
    pub amount: Option<Value>,
    /// Free text, may mention another user.
    pub description: Option<String>,
    /// Either "give" or "take".
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// What [record_expense] stored.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpenseOutcome {
    /// The description did not mention anyone, one transaction was stored for the requester.
    Solo(Transaction),
    /// The expense was shared with the mentioned user.
    Split {
        /// Links the two transactions.
        split_id: SplitId,
        /// The requester's half, a `take`.
        requester: Transaction,
        /// The mentioned user's half, a `give`.
        counterparty: Transaction,
    },
}

fn invalid(reason: &str) -> Error {
    Error::InvalidRequest(format!("Invalid transaction data: {reason}"))
}

/// Parse a positive amount from a JSON number or a numeric string.
pub(crate) fn parse_amount(value: &Value) -> Result<Decimal, Error> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_owned(),
        _ => return Err(invalid("amount must be a number")),
    };

    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| invalid("amount must be a number"))?;

    if amount <= Decimal::ZERO {
        return Err(invalid("amount must be greater than zero"));
    }

    Ok(amount)
}

/// Halve `amount`, rounding half away from zero to the cent.
pub(crate) fn split_amount(amount: Decimal) -> Decimal {
    (amount / Decimal::TWO).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Record an expense for `requester`.
///
/// If the description mentions another registered user, the amount is split evenly: the
/// requester gets a `take` for half the amount and the mentioned user gets a `give` for the
/// other half, linked by a new split. Both transactions are written in one SQLite transaction.
/// The `type` of the request only applies to expenses that are not shared.
///
/// Otherwise a single transaction is stored for the requester.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidRequest] if the amount or type is missing or invalid, the requester mentions
///   themselves, or half the amount rounds to zero,
/// - [Error::CounterpartyNotFound] if nobody matches the mention,
/// - or [Error::StorageFailure] if a write fails, in which case nothing is stored.
pub fn record_expense(
    requester: &User,
    request: &ExpenseRequest,
    connection: &Connection,
) -> Result<ExpenseOutcome, Error> {
    let amount = parse_amount(
        request
            .amount
            .as_ref()
            .ok_or_else(|| invalid("amount is required"))?,
    )?;
    let kind: TransactionKind = request
        .kind
        .as_deref()
        .ok_or_else(|| invalid("type is required"))?
        .parse()?;
    let description = request.description.as_deref().unwrap_or_default();

    let Some(mention) = parse_mention(description) else {
        let transaction = create_transaction(
            Transaction::build(requester.id, amount, kind, description),
            connection,
        )?;

        return Ok(ExpenseOutcome::Solo(transaction));
    };

    let counterparty =
        resolve_counterparty(mention, connection)?.ok_or(Error::CounterpartyNotFound)?;

    if counterparty.id == requester.id {
        return Err(invalid("you cannot share an expense with yourself"));
    }

    let share = split_amount(amount);
    if share <= Decimal::ZERO {
        return Err(invalid("amount is too small to split"));
    }

    let sql_transaction = connection.unchecked_transaction()?;
    let created_at = OffsetDateTime::now_utc();

    let split_id = create_split(created_at, &sql_transaction)?;
    let requester_half = create_transaction(
        Transaction::build(requester.id, share, TransactionKind::Take, description)
            .person(&counterparty.email)
            .split_id(split_id)
            .created_at(created_at),
        &sql_transaction,
    )?;
    let counterparty_half = create_transaction(
        Transaction::build(counterparty.id, share, TransactionKind::Give, description)
            .person(&requester.email)
            .split_id(split_id)
            .created_at(created_at),
        &sql_transaction,
    )?;

    sql_transaction.commit()?;

    tracing::debug!(
        "Split {amount} between users {} and {} as split {split_id}",
        requester.id,
        counterparty.id
    );

    Ok(ExpenseOutcome::Split {
        split_id,
        requester: requester_half,
        counterparty: counterparty_half,
    })
}
