mod definition;
mod models;
mod permission;
mod version;

pub use definition::{LayerDefinition, RecipeAclDefinition, RecipeDefinition};
pub use models::*;
pub use permission::{Permission, max_permission};
pub use version::Version;
