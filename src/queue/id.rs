//! Submission id generation
//!
//! Ids are 20-digit UTC timestamps `YYYYMMDDhhmmssffffff` (microsecond
//! resolution), so lexicographic order equals creation order. A process-wide
//! high-water mark keeps issued ids strictly increasing even when several
//! submissions are created within the same microsecond or the wall clock
//! steps backwards.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const ID_FORMAT: &str = "%Y%m%d%H%M%S%6f";
const ID_LEN: usize = 20;

/// Highest timestamp (in microseconds) issued by this process
static LAST_ISSUED_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Opaque, sortable submission identifier.
///
/// Ids order by length, then lexicographically: shorter legacy-format ids
/// sort before every 20-digit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl Ord for SubmissionId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for SubmissionId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl SubmissionId {
    /// Wrap an existing id (e.g. one read back from a queue file)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the id for a microsecond timestamp
    pub fn from_micros(micros: i64) -> Option<Self> {
        let timestamp = DateTime::<Utc>::from_timestamp_micros(micros)?;
        let id = timestamp.format(ID_FORMAT).to_string();
        (id.len() == ID_LEN).then_some(Self(id))
    }

    /// Timestamp encoded in the id, `None` for ids in another format
    pub fn micros(&self) -> Option<i64> {
        if self.0.len() != ID_LEN || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (seconds, fraction) = self.0.split_at(14);
        let naive = NaiveDateTime::parse_from_str(seconds, "%Y%m%d%H%M%S").ok()?;
        let fraction: i64 = fraction.parse().ok()?;
        Some(naive.and_utc().timestamp_micros() + fraction)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubmissionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Issue a fresh id strictly greater than `floor` and every id issued before.
///
/// Returns `None` only if the clock is outside the representable range.
pub fn next_submission_id(floor: Option<&SubmissionId>) -> Option<SubmissionId> {
    let now = Utc::now().timestamp_micros();
    let floor = floor.and_then(SubmissionId::micros).unwrap_or(i64::MIN);

    let mut issued = now;
    LAST_ISSUED_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            issued = now
                .max(last.saturating_add(1))
                .max(floor.saturating_add(1));
            Some(issued)
        })
        .ok()?;

    SubmissionId::from_micros(issued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_id_format() {
        let id = next_submission_id(None).unwrap();
        assert_eq!(id.as_str().len(), ID_LEN);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_digit()), "id: {}", id);
    }

    #[test]
    fn test_micros_roundtrip() {
        let id = SubmissionId::from_micros(1_792_000_000_123_456).unwrap();
        assert_eq!(id.micros(), Some(1_792_000_000_123_456));
    }

    #[test]
    fn test_legacy_ids_sort_first() {
        let legacy = SubmissionId::from("310804130201818647");
        let current = next_submission_id(None).unwrap();
        assert!(legacy < current);
    }

    #[test]
    fn test_legacy_id_has_no_micros() {
        assert_eq!(SubmissionId::from("040804130201818647").micros(), None);
    }

    #[test]
    fn test_ids_strictly_increasing() {
        let mut previous = next_submission_id(None).unwrap();
        for _ in 0..1000 {
            let next = next_submission_id(None).unwrap();
            assert!(next > previous, "{} should sort after {}", next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_floor_is_respected() {
        let future = SubmissionId::from_micros(Utc::now().timestamp_micros() + 3_600_000_000).unwrap();
        let id = next_submission_id(Some(&future)).unwrap();
        assert!(id > future);
    }

    #[test]
    fn test_concurrent_ids_unique() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(|| {
                    (0..200)
                        .map(|_| next_submission_id(None).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all_ids = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("Thread panicked") {
                assert!(all_ids.insert(id.clone()), "Duplicate id generated: {}", id);
            }
        }
        assert_eq!(all_ids.len(), 1600);
    }
}
