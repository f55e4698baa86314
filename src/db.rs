//! Sets up the SQLite database that stands in for the app's document store.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{transaction::create_transaction_table, user::create_user_table};

/// Create all of the database tables for the application.
///
/// Foreign keys are switched on for `connection` so that deleting a user also
/// deletes their transactions.
///
/// # Errors
/// Returns an error if the tables cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
