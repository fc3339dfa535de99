use std::fmt;

use serde::{Deserialize, Serialize};

/// Version token issued on every tiddler mutation.
///
/// Tokens come from a single store-wide counter, so they are strictly
/// increasing across all bags and never reused. `Version::ZERO` precedes
/// every issued token and is the cursor of a client that has seen nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub const ZERO: Version = Version(0);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(v: Version) -> Self {
        v.0
    }
}
