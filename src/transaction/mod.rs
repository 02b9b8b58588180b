//! Transactions and shared expenses.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the database functions of the ledger
//! - Finding and resolving mentions of other users in descriptions
//! - Recording expenses, split evenly with a mentioned user
//! - The route handlers for the expense API

mod core;
mod counterparty;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod list_endpoint;
mod mention;
mod split;

pub use core::{
    NewTransaction, Transaction, TransactionChanges, TransactionKind, count_transactions,
    create_transaction, create_transaction_table, delete_transaction, get_all_transactions,
    get_transaction, get_transactions_for_user, update_transaction,
};
pub use counterparty::resolve_counterparty;
pub use create_endpoint::create_expense_endpoint;
pub use delete_endpoint::delete_expense_endpoint;
pub use edit_endpoint::edit_expense_endpoint;
pub use list_endpoint::get_expenses_endpoint;
pub use mention::parse_mention;
pub(crate) use mention::is_mentionable_name;
pub use split::{ExpenseOutcome, ExpenseRequest, create_split_table, record_expense};
