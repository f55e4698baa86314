//! Defines the transaction model and the database queries the summary notifier needs.

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, notifier::Window, user::UserId};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was spent or earned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money was spent.
    Expense,
    /// Money was earned.
    Income,
}

impl TransactionType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            other => Err(FromSqlError::Other(
                format!("unknown transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID the app assigned to the transaction.
    pub id: String,
    /// The user the transaction belongs to.
    pub user_id: UserId,
    /// The amount of money spent or earned, never negative.
    ///
    /// The app may omit the amount, in which case it counts as zero.
    pub amount: Option<f64>,
    /// Whether the money was spent or earned.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The ID of the category the transaction belongs to.
    pub category_id: String,
    /// A short name for the transaction.
    pub name: String,
    /// A free text note.
    pub note: Option<String>,
    /// When the transaction happened, in milliseconds since the Unix epoch.
    pub date: i64,
    /// When the app last changed the transaction, in milliseconds since the Unix epoch.
    pub updated_at: i64,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                amount REAL CHECK (amount IS NULL OR amount >= 0),
                type TEXT NOT NULL CHECK (type IN ('expense', 'income')),
                category_id TEXT NOT NULL,
                name TEXT NOT NULL,
                note TEXT,
                date INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, id),
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Range queries always filter on the owner first.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date)",
        (),
    )?;

    Ok(())
}

/// Create or replace a transaction in the database.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the owning user does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(transaction: &Transaction, connection: &Connection) -> Result<(), Error> {
    connection
        .execute(
            "INSERT OR REPLACE INTO \"transaction\"
                (id, user_id, amount, type, category_id, name, note, date, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            (
                &transaction.id,
                transaction.user_id.as_ref(),
                transaction.amount,
                transaction.kind,
                &transaction.category_id,
                &transaction.name,
                &transaction.note,
                transaction.date,
                transaction.updated_at,
            ),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    Ok(())
}

/// Get a user's transactions dated within `window`, both ends inclusive.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_transactions_in_window(
    user_id: &UserId,
    window: Window,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut statement = connection.prepare(
        "SELECT id, user_id, amount, type, category_id, name, note, date, updated_at
         FROM \"transaction\"
         WHERE user_id = ?1 AND date >= ?2 AND date <= ?3",
    )?;

    let transactions = statement
        .query_map(
            (user_id.as_ref(), window.start, window.end),
            map_transaction_row,
        )?
        .collect::<Result<Vec<Transaction>, rusqlite::Error>>()?;

    Ok(transactions)
}

/// Map a database row to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let user_id: String = row.get(1)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserId::new(&user_id),
        amount: row.get(2)?,
        kind: row.get(3)?,
        category_id: row.get(4)?,
        name: row.get(5)?,
        note: row.get(6)?,
        date: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::{
        transaction::{Transaction, TransactionType},
        user::UserId,
    };

    /// A transaction with filler values for the fields summaries ignore.
    pub fn transaction(
        id: &str,
        user_id: &str,
        amount: Option<f64>,
        kind: TransactionType,
        date: i64,
    ) -> Transaction {
        Transaction {
            id: id.to_owned(),
            user_id: UserId::new(user_id),
            amount,
            kind,
            category_id: "groceries".to_owned(),
            name: format!("Transaction {id}"),
            note: None,
            date,
            updated_at: date,
        }
    }
}
