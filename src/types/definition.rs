use serde::{Deserialize, Serialize};

use super::{Permission, PluginSet};

/// Portable form of a recipe, keyed by bag and role names rather than ids.
///
/// Layer flags are carried verbatim; dropping `with_acl` or `load_modules`
/// on a round trip would change both access control and module loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub required_plugins: PluginSet,
    #[serde(default)]
    pub skip_required_plugins: bool,
    #[serde(default)]
    pub skip_core: bool,
    #[serde(default)]
    pub layers: Vec<LayerDefinition>,
    #[serde(default)]
    pub acl: Vec<RecipeAclDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub bag: String,
    pub position: i64,
    pub with_acl: bool,
    pub load_modules: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeAclDefinition {
    pub role: String,
    pub permission: Permission,
}

impl RecipeDefinition {
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
