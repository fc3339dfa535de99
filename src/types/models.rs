use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Permission, Version};

/// Free-form tiddler fields: any field name, string value.
pub type Fields = BTreeMap<String, String>;

/// Plugin names a recipe requires.
pub type PluginSet = BTreeSet<String>;

/// Role ids held by a caller.
pub type RoleSet = BTreeSet<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bag {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// SHA-256 digest (lowercase hex) of an out-of-line attachment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttachmentRef(String);

impl AttachmentRef {
    /// Accepts a 64 character lowercase hex digest.
    pub fn parse(hash: &str) -> Option<Self> {
        let valid = hash.len() == 64
            && hash
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
        valid.then(|| Self(hash.to_string()))
    }

    pub(crate) fn from_digest(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AttachmentRef {
    type Error = crate::error::Error;

    fn try_from(hash: String) -> Result<Self, Self::Error> {
        Self::parse(&hash).ok_or_else(|| {
            crate::error::Error::BadRequest(format!("invalid attachment hash '{hash}'"))
        })
    }
}

impl From<AttachmentRef> for String {
    fn from(hash: AttachmentRef) -> Self {
        hash.0
    }
}

impl fmt::Display for AttachmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub hash: AttachmentRef,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// Current state of one (bag, title) slot.
///
/// A tombstoned tiddler keeps its slot and version but carries no fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tiddler {
    pub bag_id: String,
    pub title: String,
    pub version: Version,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    pub fields: Fields,
    pub modified: DateTime<Utc>,
}

impl Tiddler {
    #[must_use]
    pub fn head(&self) -> TiddlerHead {
        TiddlerHead {
            bag_id: self.bag_id.clone(),
            title: self.title.clone(),
            version: self.version,
            is_deleted: self.is_deleted,
        }
    }
}

/// Title, version and tombstone flag, without fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiddlerHead {
    pub bag_id: String,
    pub title: String,
    pub version: Version,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub required_plugins: PluginSet,
    pub skip_required_plugins: bool,
    pub skip_core: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLayer {
    pub recipe_id: String,
    pub bag_id: String,
    pub position: i64,
    pub with_acl: bool,
    pub load_modules: bool,
}

/// A recipe layer joined with the bag it stacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackLayer {
    pub layer: RecipeLayer,
    pub bag: Bag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeAcl {
    pub role_id: String,
    pub recipe_id: String,
    pub permission: Permission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagAcl {
    pub role_id: String,
    pub bag_id: String,
    pub permission: Permission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(skip)]
    pub session_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}
