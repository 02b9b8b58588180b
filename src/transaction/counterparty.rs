//! Looks up the registered user behind a mention.

use rusqlite::{Connection, OptionalExtension};

use crate::{
    Error,
    auth::{User, map_user_row},
};

/// Find the user whose email address or display name is exactly `mention`.
///
/// Matching is case-sensitive. Returns `Ok(None)` when nobody matches. If more than one user
/// matches, the one with the lowest ID is returned.
///
/// # Errors
///
/// Returns [Error::StorageFailure] if the query fails.
pub fn resolve_counterparty(mention: &str, connection: &Connection) -> Result<Option<User>, Error> {
    connection
        .prepare(
            "SELECT id, name, email, password FROM user
            WHERE email = :mention OR name = :mention
            ORDER BY id
            LIMIT 1",
        )?
        .query_row(&[(":mention", &mention)], map_user_row)
        .optional()
        .map_err(|error| error.into())
}
