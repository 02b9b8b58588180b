//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    database_id::{SplitId, TransactionId},
    transaction::parse_mention,
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether the owner of a transaction gave money away or is owed money back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money the owner paid or owes.
    Give,
    /// Money the owner is to receive.
    Take,
}

impl TransactionKind {
    /// The name used in JSON and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Give => "give",
            TransactionKind::Take => "take",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    /// Parse exactly `give` or `take`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "give" => Ok(TransactionKind::Give),
            "take" => Ok(TransactionKind::Take),
            other => Err(Error::InvalidRequest(format!(
                "Invalid transaction data: type must be \"give\" or \"take\", got \"{other}\""
            ))),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// A record of money given or taken by one user.
///
/// The two halves of a shared expense are separate transactions, one owned by each user, that
/// carry the same `split_id`.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    #[serde(rename = "_id")]
    pub id: TransactionId,
    /// The user that owns the transaction.
    #[serde(rename = "user")]
    pub user_id: UserID,
    /// How much money changed hands, always greater than zero.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Whether the money was given or is to be taken.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Free text describing what the transaction was for.
    pub description: String,
    /// The email address or name of the other user involved, or an empty string.
    pub person: String,
    /// Links the two halves of a shared expense.
    #[serde(rename = "splitGroup")]
    pub split_id: Option<SplitId>,
    /// When the transaction was recorded, in UTC.
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [NewTransaction] for discoverability.
    pub fn build(
        user_id: UserID,
        amount: Decimal,
        kind: TransactionKind,
        description: &str,
    ) -> NewTransaction {
        NewTransaction {
            user_id,
            amount,
            kind,
            description: description.to_owned(),
            person: String::new(),
            split_id: None,
            created_at: None,
        }
    }
}

/// A transaction that has not been stored yet.
///
/// ```ignore
/// let transaction = Transaction::build(user.id, dec!(12.50), TransactionKind::Take, "Taxi to bob")
///     .person("bob@example.com")
///     .split_id(split_id);
/// create_transaction(transaction, &connection)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The user that will own the transaction.
    pub user_id: UserID,
    /// Must be greater than zero.
    pub amount: Decimal,
    /// Whether the money was given or is to be taken.
    pub kind: TransactionKind,
    /// Free text describing what the transaction was for.
    pub description: String,
    /// The email address or name of the other user involved.
    pub person: String,
    /// The split this transaction is one half of.
    pub split_id: Option<SplitId>,
    /// Defaults to the time of insertion.
    pub created_at: Option<OffsetDateTime>,
}

impl NewTransaction {
    /// Set the label for the other user involved.
    pub fn person(mut self, person: &str) -> Self {
        self.person = person.to_owned();
        self
    }

    /// Mark the transaction as one half of a split.
    pub fn split_id(mut self, split_id: SplitId) -> Self {
        self.split_id = Some(split_id);
        self
    }

    /// Record the transaction as created at `created_at` instead of now.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// The fields of a transaction that the owner may change.
///
/// `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionChanges {
    /// The new amount, must be greater than zero.
    pub amount: Option<Decimal>,
    /// The new kind.
    pub kind: Option<TransactionKind>,
    /// The new description. The `person` label is derived again from the new text.
    pub description: Option<String>,
}

fn ensure_positive(amount: Decimal) -> Result<(), Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidRequest(
            "Invalid transaction data: amount must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const SELECT_COLUMNS: &str =
    "id, user_id, amount, kind, description, person, split_id, created_at";

/// Store a new transaction and return it with its ID and timestamp.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidRequest] if the amount is not greater than zero or the owner does not exist,
/// - or [Error::StorageFailure] if there is some other SQL error.
pub fn create_transaction(
    transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    ensure_positive(transaction.amount)?;
    let created_at = transaction
        .created_at
        .unwrap_or_else(OffsetDateTime::now_utc)
        .to_offset(time::UtcOffset::UTC);

    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, amount, kind, description, person, split_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {SELECT_COLUMNS}"
        ))?
        .query_row(
            (
                transaction.user_id.as_i64(),
                transaction.amount.to_string(),
                transaction.kind,
                &transaction.description,
                &transaction.person,
                transaction.split_id,
                created_at,
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidRequest(format!(
                "Invalid transaction data: user {} does not exist",
                transaction.user_id
            )),
            error => error.into(),
        })
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::StorageFailure] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Get the transactions owned by `user_id`, most recent first.
///
/// # Errors
/// Returns [Error::StorageFailure] if the query fails.
pub fn get_transactions_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM \"transaction\"
             WHERE user_id = :user_id
             ORDER BY created_at DESC, id DESC"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_transaction_row)?
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// Get every transaction of every user, most recent first.
///
/// # Errors
/// Returns [Error::StorageFailure] if the query fails.
pub fn get_all_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM \"transaction\" ORDER BY created_at DESC, id DESC"
        ))?
        .query_map([], map_transaction_row)?
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// Apply `changes` to the transaction `id` if it is owned by `user_id`.
///
/// If the description changes, `person` is set to the mention in the new description, or an
/// empty string if there is none.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if there is no transaction `id` owned by `user_id`,
/// - [Error::InvalidRequest] if the new amount is not greater than zero,
/// - or [Error::StorageFailure] there is some other SQL error.
pub fn update_transaction(
    user_id: UserID,
    id: TransactionId,
    changes: &TransactionChanges,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if let Some(amount) = changes.amount {
        ensure_positive(amount)?;
    }

    let person = changes
        .description
        .as_deref()
        .map(|description| parse_mention(description).unwrap_or_default());

    let transaction = connection
        .prepare(&format!(
            "UPDATE \"transaction\" SET
                amount = COALESCE(?1, amount),
                kind = COALESCE(?2, kind),
                description = COALESCE(?3, description),
                person = COALESCE(?4, person)
             WHERE id = ?5 AND user_id = ?6
             RETURNING {SELECT_COLUMNS}"
        ))?
        .query_row(
            (
                changes.amount.map(|amount| amount.to_string()),
                changes.kind,
                changes.description.as_deref(),
                person,
                id,
                user_id.as_i64(),
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Delete the transaction `id` if it is owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if there is no transaction `id` owned by `user_id`,
/// - or [Error::StorageFailure] there is some other SQL error.
pub fn delete_transaction(
    user_id: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::StorageFailure] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// The split table must exist first.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('give', 'take')),
                description TEXT NOT NULL DEFAULT '',
                person TEXT NOT NULL DEFAULT '',
                split_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(split_id) REFERENCES split(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_created
        ON \"transaction\"(user_id, created_at);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let raw_amount: String = row.get(2)?;
    let amount = raw_amount
        .parse::<Decimal>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error)))?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        amount,
        kind: row.get(3)?,
        description: row.get(4)?,
        person: row.get(5)?,
        split_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
