use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// UUID v5 namespace for job descriptions
const JOB_NS: Uuid = Uuid::from_bytes([
    0x3f, 0x1a, 0x6d, 0x42, 0x8c, 0x57, 0x4e, 0x0b,
    0x9a, 0x21, 0x5e, 0x7d, 0xc4, 0x18, 0xb3, 0x06,
]);

/// Stable identifier of a job, derived from its canonical description.
///
/// Identical descriptions always map to the same id, across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn for_description(description: &str) -> Self {
        Self(Uuid::new_v5(&JOB_NS, description.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
