//! Sends spending summaries to users and records what happened for each of them.

use std::sync::Arc;

use futures::{StreamExt, stream};
use time::OffsetDateTime;
use time_tz::Tz;

use crate::{
    Error,
    notifier::{
        ports::{DeliveryError, PushDelivery, PushMessage, TransactionSource, UserDirectory},
        summary::{Campaign, Summary},
        window::{SummaryPeriod, Window},
    },
    user::{MessagePreference, User, UserId},
};

/// Why a user was not sent a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The user has no push delivery token.
    NoToken,
    /// The user did not opt in to this summary.
    PreferenceMismatch,
}

/// Why sending a summary to a user failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FailureReason {
    /// The user's transactions could not be read.
    #[error("could not read transactions: {0}")]
    Transactions(String),

    /// The push service reported the user's token as no longer registered.
    ///
    /// `token_removed` is false if removing the token from the user also failed.
    #[error("the delivery token is no longer registered")]
    TokenUnregistered {
        /// Whether the stale token was removed from the user.
        token_removed: bool,
    },

    /// The push service failed to deliver the summary.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// What happened when trying to send one user their summary.
#[derive(Debug, Clone, PartialEq)]
pub enum UserOutcome {
    /// The push service accepted the summary.
    Delivered,
    /// The user was not eligible for the summary.
    Skipped(SkipReason),
    /// The user was eligible but the summary was not delivered.
    Failed(FailureReason),
}

/// The outcome of a batch run, one entry per user in no particular order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Which summary was sent.
    pub period: SummaryPeriod,
    /// The window the summary covered.
    pub window: Window,
    /// Every user that was considered and what happened to them.
    pub outcomes: Vec<(UserId, UserOutcome)>,
}

impl BatchReport {
    /// The number of users the summary was delivered to.
    pub fn delivered(&self) -> usize {
        self.count(|outcome| matches!(outcome, UserOutcome::Delivered))
    }

    /// The number of users that were not eligible.
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, UserOutcome::Skipped(_)))
    }

    /// The number of eligible users whose summary was not delivered.
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, UserOutcome::Failed(_)))
    }

    /// The outcome for `user_id`, if they were part of the run.
    pub fn outcome_for(&self, user_id: &UserId) -> Option<&UserOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, predicate: impl Fn(&UserOutcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .count()
    }
}

/// Sends weekly, monthly and one-off spending summaries.
///
/// The platform clients are injected so that tests can substitute fakes.
#[derive(Clone)]
pub struct SummaryNotifier {
    users: Arc<dyn UserDirectory>,
    transactions: Arc<dyn TransactionSource>,
    push: Arc<dyn PushDelivery>,
    timezone: &'static Tz,
    concurrency: usize,
}

impl SummaryNotifier {
    /// Create a notifier that processes one user at a time.
    ///
    /// `timezone` decides which day it is when working out last week.
    pub fn new(
        users: Arc<dyn UserDirectory>,
        transactions: Arc<dyn TransactionSource>,
        push: Arc<dyn PushDelivery>,
        timezone: &'static Tz,
    ) -> Self {
        Self {
            users,
            transactions,
            push,
            timezone,
            concurrency: 1,
        }
    }

    /// Process up to `concurrency` users at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The timezone the notifier works out dates in.
    pub fn timezone(&self) -> &'static Tz {
        self.timezone
    }

    /// Send the `period` summary to every user that opted in to it.
    ///
    /// A failure for one user never stops the others; it is logged and
    /// recorded in the returned report.
    ///
    /// # Errors
    ///
    /// Returns an error, and sends nothing, if the users cannot be listed.
    pub async fn run(&self, period: SummaryPeriod, now: OffsetDateTime) -> Result<BatchReport, Error> {
        let window = period.window(now, self.timezone);
        let campaign = Campaign::for_period(period, window);
        let preference = period.preference();

        let users = self
            .users
            .all_users()
            .await
            .inspect_err(|error| tracing::error!("Error sending {period} summaries: {error}"))?;

        tracing::debug!(
            "Sending {period} summaries for {} to {} to up to {} users",
            window.start,
            window.end,
            users.len()
        );

        let campaign = &campaign;
        let outcomes = stream::iter(users)
            .map(|user| async move {
                let outcome = self.notify_user(&user, Some(preference), campaign).await;
                (user.id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = BatchReport {
            period,
            window,
            outcomes,
        };

        tracing::info!(
            "Finished {period} summaries: {} delivered, {} skipped, {} failed",
            report.delivered(),
            report.skipped(),
            report.failed()
        );

        Ok(report)
    }

    /// Send `campaign` to a single user regardless of their summary preference.
    ///
    /// # Errors
    ///
    /// This function will return a:
    /// - [Error::NotFound] if the user does not exist,
    /// - [Error::MissingFcmToken] if the user has no delivery token,
    /// - or [Error::NotificationFailed] if the summary could not be delivered.
    pub async fn send_to_user(&self, user_id: &UserId, campaign: &Campaign) -> Result<(), Error> {
        let user = self.users.get_user(user_id).await?;

        match self.notify_user(&user, None, campaign).await {
            UserOutcome::Delivered => Ok(()),
            UserOutcome::Skipped(_) => Err(Error::MissingFcmToken),
            UserOutcome::Failed(reason) => Err(Error::NotificationFailed(reason.to_string())),
        }
    }

    /// Build and send one user's summary.
    ///
    /// `required_preference` of `None` sends regardless of the user's preference.
    async fn notify_user(
        &self,
        user: &User,
        required_preference: Option<MessagePreference>,
        campaign: &Campaign,
    ) -> UserOutcome {
        let Some(token) = user.fcm_token.as_deref() else {
            tracing::warn!("No FCM token for user {}", user.id);
            return UserOutcome::Skipped(SkipReason::NoToken);
        };

        if required_preference.is_some_and(|required| user.message_preference != required) {
            return UserOutcome::Skipped(SkipReason::PreferenceMismatch);
        }

        let transactions = match self
            .transactions
            .transactions_in_window(&user.id, campaign.window)
            .await
        {
            Ok(transactions) => transactions,
            Err(error) => {
                tracing::error!("Could not get transactions for user {}: {error}", user.id);
                return UserOutcome::Failed(FailureReason::Transactions(error.to_string()));
            }
        };

        let summary = Summary::from_transactions(&transactions);
        let message = PushMessage {
            title: campaign.title.clone(),
            body: summary.body(&campaign.period_phrase),
            token: token.to_owned(),
        };

        match self.push.send(&message).await {
            Ok(message_id) => {
                tracing::info!("{} sent to user {} ({message_id})", campaign.title, user.id);
                UserOutcome::Delivered
            }
            Err(DeliveryError::Unregistered(reason)) => {
                tracing::warn!("Invalid FCM token for user {}: {reason}", user.id);

                let token_removed = match self.users.clear_fcm_token(&user.id).await {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::error!("Could not remove FCM token for user {}: {error}", user.id);
                        false
                    }
                };

                UserOutcome::Failed(FailureReason::TokenUnregistered { token_removed })
            }
            Err(DeliveryError::Other(reason)) => {
                tracing::error!("Error sending {} to user {}: {reason}", campaign.title, user.id);
                UserOutcome::Failed(FailureReason::Delivery(reason))
            }
        }
    }
}
