use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use serde_json::json;

use tabby_rs::{
    ExpenseOutcome, ExpenseRequest, PasswordHash, ValidatedPassword, count_users, create_user,
    initialize_db, record_expense,
};

/// A utility for creating a test database for the REST API server of tabby_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// The database has two users, alice and bob, who both use the password "test", and one
/// expense that alice shared with bob.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    if output_path.extension().is_none_or(|extension| extension.is_empty()) {
        eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
        exit(1);
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test users...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;
    let alice = create_user("alice", "alice@example.com", password_hash.clone(), &conn)?;
    create_user("bob", "bob@example.com", password_hash, &conn)?;

    println!("Creating a shared expense...");

    let request = ExpenseRequest {
        amount: Some(json!(42.5)),
        description: Some("Groceries @bob@example.com".to_owned()),
        kind: Some("give".to_owned()),
    };
    if let ExpenseOutcome::Split { split_id, .. } = record_expense(&alice, &request, &conn)? {
        println!("Created split {split_id}");
    }

    println!("Success! The database has {} users.", count_users(&conn)?);

    Ok(())
}
