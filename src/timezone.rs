//! Conversions between UTC timestamps and the configured local timezone.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Get the current UTC offset of `canonical_timezone`, e.g. "Pacific/Auckland".
///
/// Returns `None` if the timezone name is not known.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// Convert `date_time` to the wall-clock time of `canonical_timezone` at that instant.
///
/// Unlike [get_local_offset], the offset is taken at `date_time` so that daylight saving
/// transitions are handled correctly for historical timestamps.
///
/// Returns `None` if the timezone name is not known.
pub fn to_local_date_time(
    date_time: OffsetDateTime,
    canonical_timezone: &str,
) -> Option<OffsetDateTime> {
    time_tz::timezones::get_by_name(canonical_timezone).map(|tz| {
        let offset = tz.get_offset_utc(&date_time).to_utc();
        date_time.to_offset(offset)
    })
}
