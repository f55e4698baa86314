//! Periodic spending summaries pushed to users' devices.
//!
//! A [SummaryNotifier] works out the summary window, totals each opted-in
//! user's transactions and sends the result through a [PushDelivery] service.
//! [run_schedule] drives it on a recurring [Schedule].

mod auth;
mod dispatcher;
mod fcm;
mod ports;
mod schedule;
mod sqlite_store;
mod summary;
#[cfg(test)]
pub(crate) mod test_utils;
mod window;

pub use auth::{
    AccessTokenProvider, AuthError, ServiceAccountKey, ServiceAccountTokens, StaticToken,
    token_provider_from_env,
};
pub use dispatcher::{BatchReport, FailureReason, SkipReason, SummaryNotifier, UserOutcome};
pub use fcm::{FCM_ENDPOINT, FcmClient};
pub use ports::{DeliveryError, PushDelivery, PushMessage, TransactionSource, UserDirectory};
pub use schedule::{Schedule, run_schedule};
pub use sqlite_store::SQLiteStore;
pub use summary::{Campaign, Summary};
pub use window::{SummaryPeriod, Window, epoch_millis};
