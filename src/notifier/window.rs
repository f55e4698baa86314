//! Works out which stretch of time a summary covers.
//!
//! Windows are closed ranges of epoch milliseconds because that is how the app
//! stores transaction dates.

use std::fmt::Display;

use time::{
    Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, macros::time,
};
use time_tz::Tz;

use crate::{timezone::to_local, user::MessagePreference};

/// The last millisecond of a day.
const END_OF_DAY: Time = time!(23:59:59.999);

/// The two periodic summaries users can opt in to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPeriod {
    /// A summary of the most recently completed Monday to Sunday week.
    Weekly,
    /// A summary of the previous calendar month.
    Monthly,
}

impl SummaryPeriod {
    /// The preference a user must have to receive this summary.
    pub fn preference(self) -> MessagePreference {
        match self {
            Self::Weekly => MessagePreference::Weekly,
            Self::Monthly => MessagePreference::Monthly,
        }
    }

    /// The window this summary covers when it is sent at `now`.
    pub fn window(self, now: OffsetDateTime, timezone: &Tz) -> Window {
        match self {
            Self::Weekly => Window::last_week(now, timezone),
            Self::Monthly => Window::last_month(now),
        }
    }
}

impl Display for SummaryPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weekly => f.write_str("weekly"),
            Self::Monthly => f.write_str("monthly"),
        }
    }
}

/// A closed range of instants in milliseconds since the Unix epoch.
///
/// Both `start` and `end` are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// The first millisecond in the window.
    pub start: i64,
    /// The last millisecond in the window.
    pub end: i64,
}

impl Window {
    /// The most recently completed Monday to Sunday week before `now`.
    ///
    /// Today's date is read in `timezone`. Counting Sunday as day 0, the window
    /// starts 13 days back on a Sunday and `6 + day` days back on any other day.
    /// The window's days start and end at midnight UTC.
    pub fn last_week(now: OffsetDateTime, timezone: &Tz) -> Self {
        let today = to_local(timezone, now).date();
        let day = i64::from(today.weekday().number_days_from_sunday());
        let days_back = if day == 0 { 13 } else { 6 + day };

        let monday = today - Duration::days(days_back);
        let sunday = monday + Duration::days(6);

        Self::from_dates(monday, sunday)
    }

    /// The calendar month before the UTC month containing `now`.
    pub fn last_month(now: OffsetDateTime) -> Self {
        let today = now.to_offset(UtcOffset::UTC).date();
        let last = today - Duration::days(i64::from(today.day()));
        let first = last - Duration::days(i64::from(last.day()) - 1);

        Self::from_dates(first, last)
    }

    /// Every millisecond of `month` in `year`, in UTC.
    ///
    /// # Errors
    ///
    /// Returns an error if `year` is outside the range of dates [time] supports.
    pub fn calendar_month(year: i32, month: Month) -> Result<Self, time::error::ComponentRange> {
        let first = Date::from_calendar_date(year, month, 1)?;
        let last = Date::from_calendar_date(year, month, month.length(year))?;

        Ok(Self::from_dates(first, last))
    }

    /// Whether `millis` falls inside the window.
    pub fn contains(&self, millis: i64) -> bool {
        self.start <= millis && millis <= self.end
    }

    fn from_dates(first: Date, last: Date) -> Self {
        let start = PrimitiveDateTime::new(first, Time::MIDNIGHT).assume_utc();
        let end = PrimitiveDateTime::new(last, END_OF_DAY).assume_utc();

        Self {
            start: epoch_millis(start),
            end: epoch_millis(end),
        }
    }
}

/// Milliseconds since the Unix epoch for `date_time`.
pub fn epoch_millis(date_time: OffsetDateTime) -> i64 {
    (date_time.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use time::{Month, macros::datetime};

    use crate::{
        notifier::window::{SummaryPeriod, Window, epoch_millis},
        timezone::{DEFAULT_TIMEZONE, get_timezone},
        user::MessagePreference,
    };

    fn week_of(now: time::OffsetDateTime) -> Window {
        Window::last_week(now, get_timezone(DEFAULT_TIMEZONE).unwrap())
    }

    #[test]
    fn wednesday_covers_previous_monday_to_sunday() {
        let got = week_of(datetime!(2024-03-13 16:00 UTC));

        assert_eq!(got.start, epoch_millis(datetime!(2024-03-04 00:00 UTC)));
        assert_eq!(got.end, epoch_millis(datetime!(2024-03-10 23:59:59.999 UTC)));
    }

    #[test]
    fn window_spans_seven_days_inclusive() {
        let got = week_of(datetime!(2024-03-13 16:00 UTC));

        assert_eq!(got.end - got.start + 1, 7 * 24 * 60 * 60 * 1000);
    }

    #[test]
    fn sunday_backs_up_thirteen_days() {
        let got = week_of(datetime!(2024-03-17 16:00 UTC));

        assert_eq!(got.start, epoch_millis(datetime!(2024-03-04 00:00 UTC)));
        assert_eq!(got.end, epoch_millis(datetime!(2024-03-10 23:59:59.999 UTC)));
    }

    #[test]
    fn monday_backs_up_seven_days() {
        let got = week_of(datetime!(2024-03-18 16:00 UTC));

        assert_eq!(got.start, epoch_millis(datetime!(2024-03-11 00:00 UTC)));
        assert_eq!(got.end, epoch_millis(datetime!(2024-03-17 23:59:59.999 UTC)));
    }

    #[test]
    fn weekday_is_read_in_local_timezone() {
        // Monday in UTC but still Sunday evening in Toronto.
        let got = week_of(datetime!(2024-03-18 02:00 UTC));

        assert_eq!(got.start, epoch_millis(datetime!(2024-03-04 00:00 UTC)));
    }

    #[test]
    fn tuesday_night_run_covers_previous_week() {
        // The weekly schedule fires at 23:00 on Tuesdays in Toronto.
        let got = week_of(datetime!(2024-06-04 23:00 -4));

        assert_eq!(got.start, epoch_millis(datetime!(2024-05-27 00:00 UTC)));
        assert_eq!(got.end, epoch_millis(datetime!(2024-06-02 23:59:59.999 UTC)));
    }

    #[test]
    fn march_covers_leap_february() {
        let got = Window::last_month(datetime!(2024-03-15 12:00 UTC));

        assert_eq!(got.start, epoch_millis(datetime!(2024-02-01 00:00 UTC)));
        assert_eq!(got.end, epoch_millis(datetime!(2024-02-29 23:59:59.999 UTC)));
    }

    #[test]
    fn march_covers_common_february() {
        let got = Window::last_month(datetime!(2023-03-01 08:00 UTC));

        assert_eq!(got.start, epoch_millis(datetime!(2023-02-01 00:00 UTC)));
        assert_eq!(got.end, epoch_millis(datetime!(2023-02-28 23:59:59.999 UTC)));
    }

    #[test]
    fn january_covers_previous_december() {
        let got = Window::last_month(datetime!(2025-01-01 13:00 UTC));

        assert_eq!(got.start, epoch_millis(datetime!(2024-12-01 00:00 UTC)));
        assert_eq!(got.end, epoch_millis(datetime!(2024-12-31 23:59:59.999 UTC)));
    }

    #[test]
    fn calendar_month_covers_june() {
        let got = Window::calendar_month(2024, Month::June).unwrap();

        assert_eq!(got.start, epoch_millis(datetime!(2024-06-01 00:00 UTC)));
        assert_eq!(got.end, epoch_millis(datetime!(2024-06-30 23:59:59.999 UTC)));
    }

    #[test]
    fn calendar_month_covers_leap_february() {
        let got = Window::calendar_month(2024, Month::February).unwrap();

        assert_eq!(got.end, epoch_millis(datetime!(2024-02-29 23:59:59.999 UTC)));
    }

    #[test]
    fn calendar_month_rejects_unsupported_year() {
        assert!(Window::calendar_month(1_000_000, Month::June).is_err());
    }

    #[test]
    fn contains_is_inclusive() {
        let window = Window { start: 10, end: 20 };

        assert!(!window.contains(9));
        assert!(window.contains(10));
        assert!(window.contains(20));
        assert!(!window.contains(21));
    }

    #[test]
    fn periods_match_preferences() {
        assert_eq!(SummaryPeriod::Weekly.preference(), MessagePreference::Weekly);
        assert_eq!(SummaryPeriod::Monthly.preference(), MessagePreference::Monthly);
    }
}
