use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Permission held by a role on a recipe or a bag.
///
/// Levels are totally ordered, `Read < Write < Admin`, and a higher level
/// satisfies any requirement for a lower one. The persisted integer encoding
/// preserves that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read = 1,
    Write = 2,
    Admin = 3,
}

impl Permission {
    pub const ALL: [Permission; 3] = [Permission::Read, Permission::Write, Permission::Admin];

    /// Returns true if this permission meets or exceeds `required`.
    #[must_use]
    pub fn satisfies(self, required: Permission) -> bool {
        self >= required
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    /// Converts a permission string to its level.
    pub fn parse(s: &str) -> Option<Permission> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Highest level among `perms`, or `None` when empty.
pub fn max_permission<I>(perms: I) -> Option<Permission>
where
    I: IntoIterator<Item = Permission>,
{
    perms.into_iter().max()
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidPermission(s.to_string()))
    }
}

impl From<Permission> for i64 {
    fn from(p: Permission) -> Self {
        p as i64
    }
}

impl TryFrom<i64> for Permission {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            3 => Ok(Self::Admin),
            other => Err(Error::InvalidPermission(other.to_string())),
        }
    }
}
