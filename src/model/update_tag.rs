//! Sync-run identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Value;

/// Identifies one sync run. Anything not re-stamped with the current tag is
/// stale once the run has loaded its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateTag(pub i64);

impl UpdateTag {
    /// Conventional tag: seconds since the Unix epoch.
    pub fn now() -> Self {
        UpdateTag(chrono::Utc::now().timestamp())
    }
}

impl fmt::Display for UpdateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UpdateTag {
    fn from(v: i64) -> Self { UpdateTag(v) }
}

impl From<UpdateTag> for Value {
    fn from(tag: UpdateTag) -> Self { Value::Int(tag.0) }
}
