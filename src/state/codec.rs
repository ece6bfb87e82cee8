//! Field codecs for the persisted queue document.
//!
//! `elapsed_time` is stored in the `"<h>h:<m>m:<s>s"` display form that
//! existing queue files use. The seconds field carries a fraction down to
//! microseconds when one is present (`"0h:0m:0.3s"`); legacy whole-second
//! values and bare integer seconds are accepted on read.
//! `start_time` is written as RFC 3339; legacy `ctime` strings
//! (`"Mon Oct 19 12:00:00 2026"`, local time) are accepted on read.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;

const CTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Format a duration as `"<h>h:<m>m:<s>s"`, truncated to microseconds.
///
/// Whole-second durations keep the legacy form (`"1h:2m:5s"`); otherwise
/// the seconds field carries a fraction without trailing zeros.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    let micros = elapsed.subsec_micros();
    if micros == 0 {
        return format!("{}h:{}m:{}s", hours, minutes, seconds);
    }

    let fraction = format!("{:06}", micros);
    format!(
        "{}h:{}m:{}.{}s",
        hours,
        minutes,
        seconds,
        fraction.trim_end_matches('0')
    )
}

/// Format a duration as `"<h>h:<m>m:<s>s"` in whole seconds, for display.
pub fn format_elapsed_secs(elapsed: Duration) -> String {
    format_elapsed(Duration::from_secs(elapsed.as_secs()))
}

/// Parse `"<h>h:<m>m:<s>s"` (fractional seconds allowed) or a bare number
/// of seconds.
pub fn parse_elapsed(text: &str) -> Option<Duration> {
    let text = text.trim();
    if let Some(secs) = parse_seconds(text) {
        return Some(secs);
    }

    let mut parts = text.split(':');
    let hours = parts.next()?.strip_suffix('h')?.parse::<u64>().ok()?;
    let minutes = parts.next()?.strip_suffix('m')?.parse::<u64>().ok()?;
    let seconds = parse_seconds(parts.next()?.strip_suffix('s')?)?;
    if parts.next().is_some() || minutes >= 60 || seconds.as_secs() >= 60 {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60) + seconds)
}

/// `"<s>"` or `"<s>.<fraction>"`, fraction up to nanoseconds.
fn parse_seconds(text: &str) -> Option<Duration> {
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs = whole.parse::<u64>().ok()?;

    let nanos = match fraction {
        None => 0,
        Some(digits) => {
            if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let padded = format!("{:0<9}", digits);
            padded.parse::<u32>().ok()?
        }
    };
    Some(Duration::new(secs, nanos))
}

/// Parse an RFC 3339 timestamp or a legacy local-time `ctime` string.
pub fn parse_start_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    // ctime pads single-digit days with a space; collapse runs of spaces
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, CTIME_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

pub(crate) mod elapsed {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_elapsed(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        struct ElapsedVisitor;

        impl<'de> Visitor<'de> for ElapsedVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("elapsed time as \"<h>h:<m>m:<s>s\" or seconds")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
                Ok(Duration::from_secs(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
                u64::try_from(v)
                    .map(Duration::from_secs)
                    .map_err(|_| E::custom(format!("negative elapsed time: {}", v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Duration, E> {
                Duration::try_from_secs_f64(v)
                    .map_err(|_| E::custom(format!("invalid elapsed time: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
                parse_elapsed(v).ok_or_else(|| E::custom(format!("invalid elapsed time: {:?}", v)))
            }
        }

        deserializer.deserialize_any(ElapsedVisitor)
    }
}

pub(crate) mod start_time {
    use super::*;
    use serde::Deserialize;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_start_time(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid start time: {:?}", text)))
    }
}
