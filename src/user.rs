//! Code for creating the user table and reading and updating users in the database.
//!
//! A user record mirrors the user document the mobile app writes: an opaque ID,
//! some profile fields, the device's push delivery token and which periodic
//! summary the user wants to receive.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A newtype wrapper for the opaque user IDs issued by the authentication provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Which periodic spending summary, if any, a user wants to receive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagePreference {
    /// The user does not want any summaries.
    #[default]
    None,
    /// A summary of the previous week, sent once a week.
    Weekly,
    /// A summary of the previous month, sent once a month.
    Monthly,
}

impl MessagePreference {
    /// The name of the preference as stored in the database and sent by the app.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }
}

impl FromStr for MessagePreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Weekly" => Ok(Self::Weekly),
            "Monthly" => Ok(Self::Monthly),
            other => Err(Error::InvalidMessagePreference(other.to_owned())),
        }
    }
}

impl Display for MessagePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID from the authentication provider.
    pub id: UserId,
    /// The user's email address, if known.
    pub email: Option<String>,
    /// The user's display name, if known.
    pub display_name: Option<String>,
    /// The push delivery token for the user's device.
    ///
    /// `None` if the app has not registered a token yet or the token was
    /// removed after the push service reported it as no longer registered.
    pub fcm_token: Option<String>,
    /// Which periodic summary the user wants to receive.
    pub message_preference: MessagePreference,
}

impl User {
    /// Create a user with no profile fields, no token and no summaries.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            display_name: None,
            fcm_token: None,
            message_preference: MessagePreference::None,
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
                id TEXT PRIMARY KEY,
                email TEXT,
                display_name TEXT,
                fcm_token TEXT,
                message_preference TEXT
                )",
        (),
    )?;

    Ok(())
}

/// Insert `user`, replacing every field of an existing user with the same ID.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn upsert_user(user: &User, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO user (id, email, display_name, fcm_token, message_preference)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            display_name = excluded.display_name,
            fcm_token = excluded.fcm_token,
            message_preference = excluded.message_preference",
        (
            user.id.as_ref(),
            &user.email,
            &user.display_name,
            &user.fcm_token,
            user.message_preference.as_str(),
        ),
    )?;

    Ok(())
}

/// Set the push delivery token for a user, creating the user if they do not exist yet.
///
/// Other fields of an existing user are left untouched.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn set_fcm_token(
    user_id: &UserId,
    fcm_token: &str,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO user (id, fcm_token) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET fcm_token = excluded.fcm_token",
        (user_id.as_ref(), fcm_token),
    )?;

    Ok(())
}

/// Set the summary preference for a user, creating the user if they do not exist yet.
///
/// Other fields of an existing user are left untouched.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn set_message_preference(
    user_id: &UserId,
    preference: MessagePreference,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO user (id, message_preference) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET message_preference = excluded.message_preference",
        (user_id.as_ref(), preference.as_str()),
    )?;

    Ok(())
}

/// Remove the push delivery token from a user.
///
/// # Errors
///
/// This function will return a:
/// - [Error::NotFound] if `user_id` does not belong to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn clear_fcm_token(user_id: &UserId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET fcm_token = NULL WHERE id = ?1",
        (user_id.as_ref(),),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: &UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, email, display_name, fcm_token, message_preference
             FROM user WHERE id = :id",
        )?
        .query_row(&[(":id", user_id.as_ref())], map_user_row)
        .map_err(|error| error.into())
}

/// Get every user in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_all_users(connection: &Connection) -> Result<Vec<User>, Error> {
    let mut statement = connection
        .prepare("SELECT id, email, display_name, fcm_token, message_preference FROM user")?;

    let users = statement
        .query_map([], map_user_row)?
        .collect::<Result<Vec<User>, rusqlite::Error>>()?;

    Ok(users)
}

/// Map a database row to a [User].
///
/// A missing or unrecognised preference is read as [MessagePreference::None]
/// so that stray values never opt a user in to summaries.
fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let id: String = row.get(0)?;
    let raw_preference: Option<String> = row.get(4)?;

    let message_preference = raw_preference
        .as_deref()
        .and_then(|preference| preference.parse().ok())
        .unwrap_or_default();

    Ok(User {
        id: UserId(id),
        email: row.get(1)?,
        display_name: row.get(2)?,
        fcm_token: row.get(3)?,
        message_preference,
    })
}
