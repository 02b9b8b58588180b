//! Groups transactions by local calendar month.

use std::collections::BTreeMap;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    timezone::to_local_date_time,
    transaction::{Transaction, TransactionKind, get_all_transactions},
};

/// A calendar month in the local timezone.
///
/// Ordered by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    /// The calendar year, e.g. 2025.
    pub year: i32,
    /// The month of the year, 1 for January through 12 for December.
    pub month: u8,
}

/// One transaction as it appears in a monthly summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    /// The amount of the transaction. No sign is applied for the kind.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    /// Whether the money was given or is to be taken.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The description of the transaction.
    pub description: String,
    /// When the transaction was recorded, in UTC.
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Transaction> for SummaryEntry {
    fn from(transaction: &Transaction) -> Self {
        Self {
            total: transaction.amount,
            kind: transaction.kind,
            description: transaction.description.clone(),
            created_at: transaction.created_at,
        }
    }
}

/// The transactions recorded in a single month, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// The month the entries were recorded in.
    #[serde(rename = "_id")]
    pub month: YearMonth,
    /// The transactions recorded in `month`, newest first.
    pub summary: Vec<SummaryEntry>,
}

impl MonthlySummary {
    /// The sum of the amounts of all entries, regardless of their kind.
    pub fn total(&self) -> Decimal {
        self.summary.iter().map(|entry| entry.total).sum()
    }
}

/// Get the transactions of all users grouped by the month they were recorded in.
///
/// Months are decided in `local_timezone`, a canonical timezone name such as
/// "Pacific/Auckland". The most recent month comes first.
///
/// # Errors
/// Returns [Error::InvalidTimezoneError] if `local_timezone` is not a known timezone, or an
/// [Error::StorageFailure] if the transactions could not be read.
pub fn get_monthly_summary(
    connection: &Connection,
    local_timezone: &str,
) -> Result<Vec<MonthlySummary>, Error> {
    let transactions = get_all_transactions(connection)?;

    group_by_month(&transactions, local_timezone)
}

/// Group `transactions` by local calendar month, newest month first.
///
/// Entries keep the relative order they have in `transactions`, so callers should pass them
/// in newest first order.
pub(crate) fn group_by_month(
    transactions: &[Transaction],
    local_timezone: &str,
) -> Result<Vec<MonthlySummary>, Error> {
    let mut months: BTreeMap<YearMonth, Vec<SummaryEntry>> = BTreeMap::new();

    for transaction in transactions {
        let local = to_local_date_time(transaction.created_at, local_timezone)
            .ok_or_else(|| Error::InvalidTimezoneError(local_timezone.to_owned()))?;
        let month = YearMonth {
            year: local.year(),
            month: local.month() as u8,
        };

        months
            .entry(month)
            .or_default()
            .push(SummaryEntry::from(transaction));
    }

    Ok(months
        .into_iter()
        .rev()
        .map(|(month, summary)| MonthlySummary { month, summary })
        .collect())
}
