//! Filename timestamp extraction
//!
//! Two encodings are recognised, tried in order:
//!
//! 1. A civil date-time token `YYYYMMDD-HHMMSS` or `YYYYMMDD_HHMMSS`
//!    (`sensorA_20240101-090000.xml`).
//! 2. A 100ns tick count since 0001-01-01 right before a `.xml` extension
//!    (`sensorB_133742000000000.xml`).
//!
//! Both are read as wall-clock time in [`FIXED_ZONE`].

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;
use tsimport_common::{IngestError, Result};

/// Civil zone every extracted timestamp is normalised to.
pub const FIXED_ZONE: Tz = chrono_tz::US::Eastern;

/// Ticks per microsecond for the tick encoding.
const TICKS_PER_MICRO: i64 = 10;

fn civil_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // The token may not touch other digits on either side.
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9])([0-9]{8})[-_]([0-9]{6})(?:[^0-9]|$)")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

fn tick_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"_([0-9]+)\.xml$").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Extract the timestamp encoded in `filename`.
///
/// Fails with [`IngestError::TimestampNotFound`] when neither encoding matches
/// or the matched digits do not form a valid instant.
pub fn extract(filename: &str) -> Result<DateTime<Tz>> {
    if let Some(caps) = civil_pattern().captures(filename) {
        let token = format!("{}{}", &caps[1], &caps[2]);
        let naive = NaiveDateTime::parse_from_str(&token, "%Y%m%d%H%M%S")
            .map_err(|_| IngestError::TimestampNotFound(filename.to_string()))?;
        return Ok(localize(naive));
    }

    if let Some(caps) = tick_pattern().captures(filename) {
        let naive = caps[1]
            .parse::<i64>()
            .ok()
            .and_then(from_ticks)
            .ok_or_else(|| IngestError::TimestampNotFound(filename.to_string()))?;
        return Ok(localize(naive));
    }

    Err(IngestError::TimestampNotFound(filename.to_string()))
}

/// Convert a tick count to the naive wall time it denotes, truncated to microseconds.
pub fn from_ticks(ticks: i64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)?;
    epoch.checked_add_signed(Duration::microseconds(ticks / TICKS_PER_MICRO))
}

/// Interpret `naive` as wall-clock time in [`FIXED_ZONE`].
///
/// Ambiguous fall-back times resolve to the standard-time instant; times in the
/// spring-forward gap are read with the standard offset, which lands them one
/// wall-clock hour later.
pub fn localize(naive: NaiveDateTime) -> DateTime<Tz> {
    match FIXED_ZONE.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(_, standard) => standard,
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            FIXED_ZONE
                .from_local_datetime(&shifted)
                .earliest()
                .unwrap_or_else(|| FIXED_ZONE.from_utc_datetime(&naive))
        }
    }
}

/// Midnight of `date` in [`FIXED_ZONE`].
pub fn start_of_day(date: NaiveDate) -> DateTime<Tz> {
    localize(date.and_time(chrono::NaiveTime::MIN))
}
