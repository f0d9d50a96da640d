use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::{poisoned, ExError, GuardError, Result};

/// Width of the zero-padded millisecond component
const MILLIS_WIDTH: usize = 13;
/// Width of the zero-padded sequence component
const SEQ_WIDTH: usize = 10;

/// Sortable snapshot identifier: `{millis:013}-{seq:010}`
///
/// Lexicographic order of the string equals creation order, so the id can be
/// used directly as a storage key and `ORDER BY` column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(String);

impl SnapshotId {
    fn from_parts(millis: i64, seq: u64) -> Self {
        Self(format!(
            "{:0mw$}-{:0sw$}",
            millis,
            seq,
            mw = MILLIS_WIDTH,
            sw = SEQ_WIDTH
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Millisecond timestamp component
    pub fn millis(&self) -> i64 {
        self.parts().0
    }

    /// Monotonic sequence component
    pub fn seq(&self) -> u64 {
        self.parts().1
    }

    fn parts(&self) -> (i64, u64) {
        // Validated on construction.
        let (millis, seq) = self.0.split_at(MILLIS_WIDTH);
        (
            millis.parse().unwrap_or_default(),
            seq[1..].parse().unwrap_or_default(),
        )
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = ExError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || -> ExError {
            GuardError::InvalidInput {
                reason: format!("'{}' is not a snapshot id", s),
            }
            .into()
        };

        if s.len() != MILLIS_WIDTH + 1 + SEQ_WIDTH {
            return Err(invalid());
        }
        let (millis, rest) = s.split_at(MILLIS_WIDTH);
        let seq = rest.strip_prefix('-').ok_or_else(invalid)?;
        if !millis.bytes().all(|b| b.is_ascii_digit()) || !seq.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = ExError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.0
    }
}

/// Process-local generator of unique, totally ordered snapshot ids
///
/// The millisecond component never moves backwards (a wall clock stepping
/// back reuses the last seen value) and the sequence counter never resets,
/// so ids stay unique under rapid creation and clock skew.
#[derive(Debug, Default)]
pub struct SnapshotIdGenerator {
    last: Mutex<(i64, u64)>,
}

impl SnapshotIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id using the current wall clock
    pub fn next(&self) -> Result<SnapshotId> {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }

    /// Next id for an explicit clock reading
    pub fn next_at(&self, now_millis: i64) -> Result<SnapshotId> {
        let mut last = self.last.lock().map_err(|_| poisoned("next_snapshot_id"))?;
        let millis = now_millis.max(last.0).max(0);
        let seq = last.1 + 1;
        *last = (millis, seq);
        Ok(SnapshotId::from_parts(millis, seq))
    }

    /// Advance past an id loaded from storage so new ids sort after it
    pub fn observe(&self, id: &SnapshotId) -> Result<()> {
        let mut last = self
            .last
            .lock()
            .map_err(|_| poisoned("observe_snapshot_id"))?;
        last.0 = last.0.max(id.millis());
        last.1 = last.1.max(id.seq());
        Ok(())
    }
}
