//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::PasswordHash, transaction::is_mentionable_name};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from transaction and split IDs, leading to better compile
/// time errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The display name other users can mention the user by.
    pub name: String,
    /// The email address the user logs in with.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The public part of a [User] that is sent back to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    /// The user's ID.
    #[serde(rename = "_id")]
    pub id: UserID,
    /// The user's display name.
    pub name: String,
    /// The user's email address.
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// The caller is responsible for validating `email`.
///
/// # Errors
///
/// Returns:
/// - [Error::InvalidName] if `name` could not be mentioned in full,
/// - [Error::DuplicateEmail] if another user already has `email`,
/// - [Error::DuplicateName] if another user already has `name`,
/// - [Error::StorageFailure] if any other SQL error occurred.
pub fn create_user(
    name: &str,
    email: &str,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    if !is_mentionable_name(name) {
        return Err(Error::InvalidName(format!(
            "\"{name}\" may only contain letters, digits, '.', '_' and '-'"
        )));
    }

    connection
        .prepare(
            "INSERT INTO user (name, email, password) VALUES (?1, ?2, ?3)
            RETURNING id, name, email, password",
        )?
        .query_row((name, email, password_hash.as_str()), map_user_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user,
/// - there was an error trying to access the database.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, name, email, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with the email address `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user is registered with `email`.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, name, email, password FROM user WHERE email = :email")?
        .query_row(&[(":email", &email)], map_user_row)
        .map_err(|error| error.into())
}

/// Replace the password hash of the user with `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered user.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_str(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::StorageFailure] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Map a row with the columns `id, name, email, password` to a [User].
pub(crate) fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(3)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::{PasswordHash, UserID, UserProfile},
    };

    use super::{
        count_users, create_user, create_user_table, get_user_by_email, get_user_by_id,
        update_password,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    #[test]
    fn insert_user_succeeds() {
        let conn = get_db_connection();
        let password_hash = PasswordHash::new_unchecked("hunter2");

        let user = create_user("alice", "alice@example.com", password_hash.clone(), &conn).unwrap();

        assert!(user.id.as_i64() > 0);
        assert_eq!(user.name, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.password_hash, password_hash);
    }

    #[test]
    fn insert_user_fails_on_duplicate_email() {
        let conn = get_db_connection();
        create_user("alice", "alice@example.com", PasswordHash::new_unchecked("a"), &conn).unwrap();

        let result = create_user("alicia", "alice@example.com", PasswordHash::new_unchecked("b"), &conn);

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn insert_user_fails_on_duplicate_name() {
        let conn = get_db_connection();
        create_user("alice", "alice@example.com", PasswordHash::new_unchecked("a"), &conn).unwrap();

        let result = create_user("alice", "alice@example.org", PasswordHash::new_unchecked("b"), &conn);

        assert_eq!(result, Err(Error::DuplicateName));
    }

    #[test]
    fn insert_user_fails_on_name_with_space() {
        let conn = get_db_connection();

        let result = create_user(
            "Alice Smith",
            "alice@example.com",
            PasswordHash::new_unchecked("a"),
            &conn,
        );

        assert!(matches!(result, Err(Error::InvalidName(_))));
        assert_eq!(count_users(&conn), Ok(0));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let conn = get_db_connection();

        assert_eq!(get_user_by_id(UserID::new(42), &conn), Err(Error::NotFound));
    }

    #[test]
    fn get_user_by_id_and_email_return_same_user() {
        let conn = get_db_connection();
        let user = create_user("bob", "bob@example.com", PasswordHash::new_unchecked("h"), &conn).unwrap();

        assert_eq!(get_user_by_id(user.id, &conn), Ok(user.clone()));
        assert_eq!(get_user_by_email("bob@example.com", &conn), Ok(user));
    }

    #[test]
    fn get_user_by_email_fails_for_unknown_email() {
        let conn = get_db_connection();

        assert_eq!(
            get_user_by_email("nobody@example.com", &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn update_password_replaces_hash() {
        let conn = get_db_connection();
        let user = create_user("bob", "bob@example.com", PasswordHash::new_unchecked("old"), &conn).unwrap();
        let new_hash = PasswordHash::new_unchecked("new");

        update_password(user.id, &new_hash, &conn).unwrap();

        assert_eq!(get_user_by_id(user.id, &conn).unwrap().password_hash, new_hash);
    }

    #[test]
    fn update_password_fails_for_unknown_user() {
        let conn = get_db_connection();

        let result = update_password(UserID::new(7), &PasswordHash::new_unchecked("x"), &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn returns_correct_count() {
        let conn = get_db_connection();
        assert_eq!(count_users(&conn), Ok(0));

        create_user("carol", "carol@example.com", PasswordHash::new_unchecked("h"), &conn).unwrap();

        assert_eq!(count_users(&conn), Ok(1));
    }

    #[test]
    fn profile_omits_password_hash() {
        let conn = get_db_connection();
        let user = create_user("dave", "dave@example.com", PasswordHash::new_unchecked("h"), &conn).unwrap();

        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"_id": user.id.as_i64(), "name": "dave", "email": "dave@example.com"})
        );
    }
}
