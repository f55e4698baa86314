//! The platform services the notifier reads from and writes to.
//!
//! Each service is a trait so the notifier can be handed the real SQLite and
//! FCM clients in production and in-memory fakes in tests.

use async_trait::async_trait;

use crate::{
    Error,
    notifier::window::Window,
    transaction::Transaction,
    user::{User, UserId},
};

/// Read access to users, plus the one write the notifier performs.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Get every user.
    async fn all_users(&self) -> Result<Vec<User>, Error>;

    /// Get a single user, or [Error::NotFound] if they do not exist.
    async fn get_user(&self, user_id: &UserId) -> Result<User, Error>;

    /// Remove a user's push delivery token.
    async fn clear_fcm_token(&self, user_id: &UserId) -> Result<(), Error>;
}

/// Range queries over a user's transactions.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Get the transactions owned by `user_id` dated within `window`, both ends inclusive.
    async fn transactions_in_window(
        &self,
        user_id: &UserId,
        window: Window,
    ) -> Result<Vec<Transaction>, Error>;
}

/// A notification addressed to a single device.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    /// The notification title.
    pub title: String,
    /// The notification text.
    pub body: String,
    /// The delivery token of the receiving device.
    pub token: String,
}

/// Why a push message could not be delivered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
    /// The delivery token is permanently invalid, e.g. the app was uninstalled.
    ///
    /// Callers should stop using the token.
    #[error("the delivery token is no longer registered: {0}")]
    Unregistered(String),

    /// Any other failure. Trying again later may succeed.
    #[error("{0}")]
    Other(String),
}

/// Sends push notifications to devices.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    /// Send `message`, returning the ID the push service assigned to it.
    async fn send(&self, message: &PushMessage) -> Result<String, DeliveryError>;
}
