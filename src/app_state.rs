//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use time_tz::Tz;

use crate::{
    Error,
    db::initialize,
    notifier::{PushDelivery, SQLiteStore, SummaryNotifier},
    timezone::get_timezone,
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// Sends spending summaries, both on schedule and on request.
    pub notifier: SummaryNotifier,

    /// The timezone summaries are scheduled in, e.g. "America/Toronto".
    pub local_timezone: &'static Tz,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "America/Toronto".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone is unknown.
    pub fn new(
        db_connection: Connection,
        push: Arc<dyn PushDelivery>,
        local_timezone: &str,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;
        let timezone = get_timezone(local_timezone)?;

        let connection = Arc::new(Mutex::new(db_connection));
        let store = Arc::new(SQLiteStore::new(connection.clone()));

        Ok(Self {
            db_connection: connection,
            notifier: SummaryNotifier::new(store.clone(), store, push, timezone),
            local_timezone: timezone,
        })
    }

    /// Let summary runs process up to `concurrency` users at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.notifier = self.notifier.with_concurrency(concurrency);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rusqlite::Connection;

    use crate::{AppState, Error, notifier::test_utils::RecordingPush};

    #[test]
    fn rejects_unknown_timezone() {
        let connection = Connection::open_in_memory().unwrap();

        let result = AppState::new(connection, Arc::new(RecordingPush::default()), "Mars/Olympus");

        let Err(error) = result else {
            panic!("expected an invalid timezone error");
        };
        assert_eq!(error, Error::InvalidTimezoneError("Mars/Olympus".to_owned()));
    }

    #[test]
    fn initializes_database() {
        let connection = Connection::open_in_memory().unwrap();

        let state = AppState::new(
            connection,
            Arc::new(RecordingPush::default()),
            "America/Toronto",
        )
        .unwrap();

        let count: i64 = state
            .db_connection
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM user", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
