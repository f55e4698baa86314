//! In-memory stand-ins for the platform services.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    Error,
    notifier::{
        ports::{DeliveryError, PushDelivery, PushMessage, TransactionSource, UserDirectory},
        window::Window,
    },
    transaction::Transaction,
    user::{MessagePreference, User, UserId},
};

/// A user with the given token and preference.
pub fn user(id: &str, fcm_token: Option<&str>, message_preference: MessagePreference) -> User {
    User {
        fcm_token: fcm_token.map(str::to_owned),
        message_preference,
        ..User::new(UserId::new(id))
    }
}

/// A fixed list of users that records which tokens were cleared.
#[derive(Default)]
pub struct FakeDirectory {
    users: Mutex<Vec<User>>,
    cleared: Mutex<Vec<UserId>>,
    listing_failures: AtomicUsize,
    fail_token_removal: bool,
}

impl FakeDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Default::default()
        }
    }

    /// Make [UserDirectory::all_users] fail.
    pub fn failing_listing(self) -> Self {
        self.listing_failures.store(usize::MAX, Ordering::SeqCst);
        self
    }

    /// Make only the first call to [UserDirectory::all_users] fail.
    pub fn failing_listing_once(self) -> Self {
        self.listing_failures.store(1, Ordering::SeqCst);
        self
    }

    /// Make [UserDirectory::clear_fcm_token] fail after recording the attempt.
    pub fn failing_token_removal(mut self) -> Self {
        self.fail_token_removal = true;
        self
    }

    /// The users whose token removal was attempted, in order.
    pub fn cleared(&self) -> Vec<UserId> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn get(&self, user_id: &UserId) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| &user.id == user_id)
            .cloned()
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn all_users(&self) -> Result<Vec<User>, Error> {
        let failing = self
            .listing_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();

        if failing {
            return Err(Error::DatabaseLockError);
        }

        Ok(self.users.lock().unwrap().clone())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, Error> {
        self.get(user_id).ok_or(Error::NotFound)
    }

    async fn clear_fcm_token(&self, user_id: &UserId) -> Result<(), Error> {
        self.cleared.lock().unwrap().push(user_id.clone());

        if self.fail_token_removal {
            return Err(Error::DatabaseLockError);
        }

        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|user| &user.id == user_id)
            .ok_or(Error::NotFound)?;
        user.fcm_token = None;

        Ok(())
    }
}

/// A fixed list of transactions, optionally failing for some users.
#[derive(Default)]
pub struct FakeTransactions {
    transactions: Vec<Transaction>,
    failing_users: HashSet<UserId>,
}

impl FakeTransactions {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            ..Default::default()
        }
    }

    pub fn failing_for(mut self, user_id: &str) -> Self {
        self.failing_users.insert(UserId::new(user_id));
        self
    }
}

#[async_trait]
impl TransactionSource for FakeTransactions {
    async fn transactions_in_window(
        &self,
        user_id: &UserId,
        window: Window,
    ) -> Result<Vec<Transaction>, Error> {
        if self.failing_users.contains(user_id) {
            return Err(Error::DatabaseLockError);
        }

        Ok(self
            .transactions
            .iter()
            .filter(|transaction| &transaction.user_id == user_id && window.contains(transaction.date))
            .cloned()
            .collect())
    }
}

/// Records every message and fails for chosen tokens.
#[derive(Default)]
pub struct RecordingPush {
    attempts: Mutex<Vec<PushMessage>>,
    sent: Mutex<Vec<PushMessage>>,
    failures: HashMap<String, DeliveryError>,
}

impl RecordingPush {
    pub fn failing(mut self, token: &str, error: DeliveryError) -> Self {
        self.failures.insert(token.to_owned(), error);
        self
    }

    /// The messages that were delivered, in order.
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// The tokens of the messages that were delivered, in order.
    pub fn tokens(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|message| message.token)
            .collect()
    }

    /// How many times a send to `token` was attempted.
    pub fn attempts_for(&self, token: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|message| message.token == token)
            .count()
    }
}

#[async_trait]
impl PushDelivery for RecordingPush {
    async fn send(&self, message: &PushMessage) -> Result<String, DeliveryError> {
        self.attempts.lock().unwrap().push(message.clone());

        if let Some(error) = self.failures.get(&message.token) {
            return Err(error.clone());
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());

        Ok(format!("projects/test/messages/{}", sent.len()))
    }
}
