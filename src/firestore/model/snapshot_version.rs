use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::firestore::model::Timestamp;

/// Logical time at which a document's remote-derived content was last known
/// to be correct.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SnapshotVersion {
    timestamp: Timestamp,
}

impl SnapshotVersion {
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Sentinel for "no version known"; sorts before every real version.
    pub fn none() -> Self {
        Self {
            timestamp: Timestamp::new(0, 0),
        }
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self::new(Timestamp::new(seconds, 0))
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn is_none(&self) -> bool {
        *self == Self::none()
    }
}

impl Display for SnapshotVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "SnapshotVersion(none)")
        } else {
            write!(f, "SnapshotVersion({})", self.timestamp.to_rfc3339())
        }
    }
}
