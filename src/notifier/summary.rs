//! Totals up a user's transactions and turns them into notification text.

use time::Month;

use crate::{
    notifier::window::{SummaryPeriod, Window},
    transaction::{Transaction, TransactionType},
};

/// How much a user spent and earned over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    /// The sum of all expense amounts.
    pub total_spent: f64,
    /// The sum of all income amounts.
    pub total_earned: f64,
}

impl Summary {
    /// Sum expenses and income separately. Missing amounts count as zero.
    pub fn from_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        transactions
            .into_iter()
            .fold(Self::default(), |mut summary, transaction| {
                let amount = transaction.amount.unwrap_or(0.0);

                match transaction.kind {
                    TransactionType::Expense => summary.total_spent += amount,
                    TransactionType::Income => summary.total_earned += amount,
                }

                summary
            })
    }

    /// The notification body, e.g. "You spent $12.50 and earned $0.00 last week."
    pub fn body(&self, period_phrase: &str) -> String {
        format!(
            "You spent ${:.2} and earned ${:.2} {period_phrase}.",
            self.total_spent, self.total_earned
        )
    }
}

/// What a notification run summarises: the window plus the wording used for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    /// The notification title, e.g. "Weekly Summary".
    pub title: String,
    /// How the body refers to the window, e.g. "last week".
    pub period_phrase: String,
    /// The transactions to summarise.
    pub window: Window,
}

impl Campaign {
    /// The campaign for a periodic summary covering `window`.
    pub fn for_period(period: SummaryPeriod, window: Window) -> Self {
        let (title, period_phrase) = match period {
            SummaryPeriod::Weekly => ("Weekly Summary", "last week"),
            SummaryPeriod::Monthly => ("Monthly Summary", "last month"),
        };

        Self {
            title: title.to_owned(),
            period_phrase: period_phrase.to_owned(),
            window,
        }
    }

    /// A one-off summary of a single calendar month, e.g. "June Summary".
    ///
    /// # Errors
    ///
    /// Returns an error if `year` is outside the range of supported dates.
    pub fn for_month(year: i32, month: Month) -> Result<Self, time::error::ComponentRange> {
        Ok(Self {
            title: format!("{month} Summary"),
            period_phrase: format!("in {month}"),
            window: Window::calendar_month(year, month)?,
        })
    }
}
