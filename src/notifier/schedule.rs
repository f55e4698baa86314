//! When the periodic summaries go out, and the loop that sends them.

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, Weekday, macros::time};
use time_tz::Tz;
use tokio::sync::watch;

use crate::{
    notifier::{dispatcher::SummaryNotifier, window::SummaryPeriod},
    timezone::{from_local, to_local},
};

/// A recurring local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Once a week on `weekday` at `time`.
    Weekly {
        /// The day of the week to run on.
        weekday: Weekday,
        /// The local time to run at.
        time: Time,
    },
    /// Once a month on `day` at `time`.
    ///
    /// Months shorter than `day` run on their last day.
    Monthly {
        /// The day of the month to run on, starting from 1.
        day: u8,
        /// The local time to run at.
        time: Time,
    },
}

impl Schedule {
    /// Tuesdays at 23:00.
    pub const WEEKLY: Self = Self::Weekly {
        weekday: Weekday::Tuesday,
        time: time!(23:00),
    };

    /// The first of the month at 08:00.
    pub const MONTHLY: Self = Self::Monthly {
        day: 1,
        time: time!(08:00),
    };

    /// The default schedule for `period`.
    pub fn for_period(period: SummaryPeriod) -> Self {
        match period {
            SummaryPeriod::Weekly => Self::WEEKLY,
            SummaryPeriod::Monthly => Self::MONTHLY,
        }
    }

    /// The first scheduled instant strictly after `now`, reading wall-clock
    /// times in `timezone`.
    ///
    /// Returns `None` if the next run falls outside the range of supported dates.
    pub fn next_after(&self, now: OffsetDateTime, timezone: &Tz) -> Option<OffsetDateTime> {
        let today = to_local(timezone, now).date();

        match *self {
            Self::Weekly { weekday, time } => {
                let days_ahead = (i64::from(weekday.number_days_from_monday())
                    - i64::from(today.weekday().number_days_from_monday()))
                .rem_euclid(7);
                let date = today.checked_add(Duration::days(days_ahead))?;
                let candidate = from_local(timezone, PrimitiveDateTime::new(date, time));

                if candidate > now {
                    return Some(candidate);
                }

                let date = date.checked_add(Duration::weeks(1))?;
                Some(from_local(timezone, PrimitiveDateTime::new(date, time)))
            }
            Self::Monthly { day, time } => {
                let candidate =
                    monthly_occurrence(today.year(), today.month(), day, time, timezone)?;

                if candidate > now {
                    return Some(candidate);
                }

                let month = today.month().next();
                let year = if month == Month::January {
                    today.year() + 1
                } else {
                    today.year()
                };

                monthly_occurrence(year, month, day, time, timezone)
            }
        }
    }
}

fn monthly_occurrence(
    year: i32,
    month: Month,
    day: u8,
    time: Time,
    timezone: &Tz,
) -> Option<OffsetDateTime> {
    let day = day.clamp(1, month.length(year));
    let date = Date::from_calendar_date(year, month, day).ok()?;

    Some(from_local(timezone, PrimitiveDateTime::new(date, time)))
}

/// Send the `period` summary every time `schedule` comes around until
/// `shutdown` changes or its sender is dropped.
///
/// Failed runs are logged and the loop carries on with the next occurrence.
pub async fn run_schedule(
    notifier: SummaryNotifier,
    period: SummaryPeriod,
    schedule: Schedule,
    shutdown: watch::Receiver<bool>,
) {
    run_schedule_with_clock(notifier, period, schedule, shutdown, OffsetDateTime::now_utc).await;
}

async fn run_schedule_with_clock(
    notifier: SummaryNotifier,
    period: SummaryPeriod,
    schedule: Schedule,
    mut shutdown: watch::Receiver<bool>,
    now: fn() -> OffsetDateTime,
) {
    let mut after = now();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let Some(next) = schedule.next_after(after, notifier.timezone()) else {
            tracing::error!("Could not work out the next {period} summary run after {after}");
            break;
        };

        tracing::info!("Next {period} summary run at {next}");

        let wait = std::time::Duration::try_from(next - now())
            .unwrap_or(std::time::Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {},
            _ = shutdown.changed() => break,
        }

        // Windows are computed from the scheduled time so a late wake-up
        // still summarises the intended period.
        if let Err(error) = notifier.run(period, next).await {
            tracing::error!("The {period} summary run at {next} failed: {error}");
        }

        after = next.max(now());
    }

    tracing::info!("Stopped the {period} summary schedule");
}
