//! Implements the notifier's user and transaction services on top of SQLite.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::{
    Error,
    notifier::{
        ports::{TransactionSource, UserDirectory},
        window::Window,
    },
    transaction::{Transaction, get_transactions_in_window},
    user::{User, UserId, clear_fcm_token, get_all_users, get_user_by_id},
};

/// Reads users and transactions from the application database.
#[derive(Debug, Clone)]
pub struct SQLiteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteStore {
    /// Create a new store over a shared connection.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl UserDirectory for SQLiteStore {
    async fn all_users(&self) -> Result<Vec<User>, Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_all_users(&connection)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_user_by_id(user_id, &connection)
    }

    async fn clear_fcm_token(&self, user_id: &UserId) -> Result<(), Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        clear_fcm_token(user_id, &connection)
    }
}

#[async_trait]
impl TransactionSource for SQLiteStore {
    async fn transactions_in_window(
        &self,
        user_id: &UserId,
        window: Window,
    ) -> Result<Vec<Transaction>, Error> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_transactions_in_window(user_id, window, &connection)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        notifier::{
            ports::{TransactionSource, UserDirectory},
            sqlite_store::SQLiteStore,
            window::Window,
        },
        transaction::{TransactionType, create_transaction, test_utils::transaction},
        user::{MessagePreference, User, UserId, upsert_user},
    };

    fn get_store() -> SQLiteStore {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let user = User {
            fcm_token: Some("token-a".to_owned()),
            message_preference: MessagePreference::Weekly,
            ..User::new(UserId::new("alice"))
        };
        upsert_user(&user, &connection).unwrap();
        create_transaction(
            &transaction("1", "alice", Some(5.0), TransactionType::Expense, 100),
            &connection,
        )
        .unwrap();
        create_transaction(
            &transaction("2", "alice", Some(6.0), TransactionType::Income, 300),
            &connection,
        )
        .unwrap();

        SQLiteStore::new(Arc::new(Mutex::new(connection)))
    }

    #[tokio::test]
    async fn lists_and_gets_users() {
        let store = get_store();

        let users = store.all_users().await.unwrap();
        let alice = store.get_user(&UserId::new("alice")).await.unwrap();

        assert_eq!(users, vec![alice.clone()]);
        assert_eq!(alice.fcm_token.as_deref(), Some("token-a"));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let store = get_store();

        let result = store.get_user(&UserId::new("ghost")).await;

        assert_eq!(result, Err(Error::NotFound));
    }

    #[tokio::test]
    async fn clears_token() {
        let store = get_store();
        let alice = UserId::new("alice");

        store.clear_fcm_token(&alice).await.unwrap();

        let user = store.get_user(&alice).await.unwrap();
        assert_eq!(user.fcm_token, None);
        assert_eq!(user.message_preference, MessagePreference::Weekly);
    }

    #[tokio::test]
    async fn reads_transactions_in_window() {
        let store = get_store();

        let got = store
            .transactions_in_window(&UserId::new("alice"), Window { start: 0, end: 200 })
            .await
            .unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "1");
    }
}
