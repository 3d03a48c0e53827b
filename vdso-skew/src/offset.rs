/*
 * Copyright (c) 2018-2019, Trustees of Indiana University
 *     ("University Works" via Baojun Wang)
 * Copyright (c) 2018-2019, Ryan Newton
 *     ("Traditional Works of Scholarship")
 *
 *  All rights reserved.
 *
 *  This source code is licensed under the BSD-style license found in the
 *  LICENSE file in the root directory of this source tree.
 */

//! `CalculateOffset`: turns a human-supplied string into a signed
//! [`chrono::Duration`] -- either the gap between now and an absolute date,
//! or a signed integer with an `s`/`m`/`h`/`d`/`y` suffix (seconds by
//! default).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{Result, SkewError};

/// Layouts tried in order against an unsuffixed, non-numeric string before
/// falling back to the relative-duration grammar.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
];

fn parse_date_any(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
        }
    }
    None
}

pub fn calculate_offset(offset_str: &str) -> Result<Duration> {
    if offset_str.is_empty() || offset_str == "0" || offset_str == "null" {
        return Ok(Duration::zero());
    }

    if let Some(target) = parse_date_any(offset_str) {
        return Ok(target - Utc::now());
    }

    let lower = offset_str.to_lowercase();
    let (digits, unit) = match lower.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&lower[..lower.len() - 1], Some(c)),
        _ => (lower.as_str(), None),
    };
    let value: i64 = digits
        .parse()
        .map_err(|e| SkewError::Input(format!("unable to parse offset {:?}: {}", offset_str, e)))?;

    Ok(match unit {
        Some('s') | None => Duration::seconds(value),
        Some('m') => Duration::minutes(value),
        Some('h') => Duration::hours(value),
        Some('d') => Duration::days(value),
        Some('y') => Duration::days(value * 365),
        Some(other) => return Err(SkewError::Input(format!("unknown offset unit {:?}", other))),
    })
}

/// Splits a [`Duration`] into whole seconds and the nanosecond remainder,
/// the two values the arch backend pokes into `TV_SEC_DELTA`/
/// `TV_NSEC_DELTA`. Falls back to a zero remainder if the duration is too
/// large for `num_nanoseconds` to represent exactly.
pub fn split_seconds_nanos(d: Duration) -> (i64, i64) {
    let seconds = d.num_seconds();
    let remainder_nanos = d
        .checked_sub(&Duration::seconds(seconds))
        .and_then(|r| r.num_nanoseconds())
        .unwrap_or(0);
    (seconds, remainder_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_zero_are_zero() {
        assert_eq!(calculate_offset("").unwrap(), Duration::zero());
        assert_eq!(calculate_offset("0").unwrap(), Duration::zero());
    }

    #[test]
    fn seconds_default_and_suffixed() {
        assert_eq!(calculate_offset("5s").unwrap(), Duration::nanoseconds(5_000_000_000));
        assert_eq!(calculate_offset("5").unwrap(), Duration::seconds(5));
    }

    #[test]
    fn negative_hours() {
        assert_eq!(
            calculate_offset("-1h").unwrap(),
            Duration::nanoseconds(-3_600_000_000_000)
        );
    }

    #[test]
    fn days() {
        assert_eq!(calculate_offset("2d").unwrap(), Duration::seconds(172_800));
    }

    #[test]
    fn minutes() {
        assert_eq!(calculate_offset("10m").unwrap(), Duration::seconds(600));
    }

    #[test]
    fn bogus_is_input_error() {
        assert!(matches!(calculate_offset("bogus"), Err(SkewError::Input(_))));
    }

    #[test]
    fn split_handles_negative_sub_second_remainder() {
        let d = Duration::nanoseconds(-3_600_000_000_000 - 500_000_000);
        let (secs, nanos) = split_seconds_nanos(d);
        assert_eq!(secs, -3600);
        assert_eq!(nanos, -500_000_000);
    }
}
