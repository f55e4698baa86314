//! Helpers for working with the canonical timezone the summaries are scheduled in.

use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use time_tz::{Offset, OffsetResult, PrimitiveDateTimeExt, TimeZone, Tz};

use crate::Error;

/// The timezone used for scheduling and for deciding what "today" is.
pub const DEFAULT_TIMEZONE: &str = "America/Toronto";

/// Look up a timezone by its canonical name, e.g. "America/Toronto".
///
/// # Errors
///
/// Returns an [Error::InvalidTimezoneError] if `canonical_timezone` is not a known timezone.
pub fn get_timezone(canonical_timezone: &str) -> Result<&'static Tz, Error> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))
}

/// The UTC offset of `timezone` at the instant `date_time`.
pub fn get_offset_at(timezone: &Tz, date_time: &OffsetDateTime) -> UtcOffset {
    timezone.get_offset_utc(date_time).to_utc()
}

/// Convert `date_time` to the wall clock time in `timezone`.
pub fn to_local(timezone: &Tz, date_time: OffsetDateTime) -> OffsetDateTime {
    date_time.to_offset(get_offset_at(timezone, &date_time))
}

/// Interpret a wall clock time in `timezone` as an absolute instant.
///
/// A time that occurs twice when the clocks go back resolves to the first
/// occurrence. A time skipped when the clocks go forward keeps the offset from
/// before the change, landing just after the jump.
pub fn from_local(timezone: &Tz, local: PrimitiveDateTime) -> OffsetDateTime {
    match local.assume_timezone(timezone) {
        OffsetResult::Some(instant) => instant,
        OffsetResult::Ambiguous(first, second) => first.min(second),
        OffsetResult::None => {
            let before_gap = local.assume_utc() - time::Duration::days(1);
            local.assume_offset(get_offset_at(timezone, &before_gap))
        }
    }
}
