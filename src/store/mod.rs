mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// A single tiddler rewrite: fields, attachment and tombstone flag replace
/// whatever the (bag, title) slot held before.
#[derive(Debug, Clone)]
pub struct TiddlerWrite<'a> {
    pub bag_id: &'a str,
    pub title: &'a str,
    pub fields: &'a Fields,
    pub attachment: Option<&'a AttachmentRef>,
    pub deleted: bool,
    /// Fails with `Error::NotFound` unless the slot currently holds a live
    /// tiddler. Checked inside the write transaction.
    pub require_live: bool,
    /// When set, the write fails with `Error::Conflict` unless the slot
    /// currently holds exactly this version.
    pub expected: Option<Version>,
}

/// Store defines the persistence interface.
///
/// Every method is a single atomic unit against the backing database;
/// multi-layer reads are composed by the engine without holding locks.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Bag operations
    fn create_bag(&self, bag: &Bag) -> Result<()>;
    fn get_bag(&self, id: &str) -> Result<Option<Bag>>;
    fn get_bag_by_name(&self, name: &str) -> Result<Option<Bag>>;
    fn list_bags(&self) -> Result<Vec<Bag>>;
    fn delete_bag(&self, id: &str) -> Result<bool>;

    // Tiddler operations
    fn get_tiddler(&self, bag_id: &str, title: &str) -> Result<Option<Tiddler>>;
    fn write_tiddler(&self, write: &TiddlerWrite<'_>) -> Result<Version>;
    fn list_tiddler_heads(&self, bag_id: &str) -> Result<Vec<TiddlerHead>>;
    fn list_changes(&self, bag_ids: &[String], since: Version) -> Result<Vec<TiddlerHead>>;

    // Attachment operations (content-addressed, shared across bags)
    fn record_attachment(&self, attachment: &Attachment) -> Result<()>;
    fn get_attachment(&self, hash: &AttachmentRef) -> Result<Option<Attachment>>;

    // Recipe operations
    fn create_recipe(&self, recipe: &Recipe) -> Result<()>;
    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>>;
    fn get_recipe_by_name(&self, name: &str) -> Result<Option<Recipe>>;
    fn list_recipes(&self) -> Result<Vec<Recipe>>;
    fn delete_recipe(&self, id: &str) -> Result<bool>;

    // Recipe layer operations
    fn set_recipe_layers(&self, recipe_id: &str, layers: &[RecipeLayer]) -> Result<()>;
    /// Creates or updates the recipe row, plugins, layers and ACL in one
    /// transaction. Nothing is written if any part fails.
    fn replace_recipe(&self, recipe: &Recipe, layers: &[RecipeLayer], acl: &[RecipeAcl])
    -> Result<()>;
    fn list_recipe_stack(&self, recipe_id: &str) -> Result<Vec<StackLayer>>;

    // Role and membership operations
    fn create_role(&self, role: &Role) -> Result<()>;
    fn get_role(&self, id: &str) -> Result<Option<Role>>;
    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    fn delete_role(&self, id: &str) -> Result<bool>;
    fn add_user_role(&self, user_id: &str, role_id: &str) -> Result<()>;
    fn remove_user_role(&self, user_id: &str, role_id: &str) -> Result<bool>;
    fn list_user_role_ids(&self, user_id: &str) -> Result<Vec<String>>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn update_user_last_login(&self, id: &str) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<bool>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_key(&self, key: &str) -> Result<Option<Session>>;
    fn touch_session(&self, id: &str) -> Result<()>;
    fn delete_session(&self, id: &str) -> Result<bool>;

    // Recipe ACL operations
    fn upsert_recipe_acl(&self, acl: &RecipeAcl) -> Result<()>;
    fn delete_recipe_acl(&self, role_id: &str, recipe_id: &str) -> Result<bool>;
    fn list_recipe_acl(&self, recipe_id: &str) -> Result<Vec<RecipeAcl>>;

    // Bag ACL operations
    fn upsert_bag_acl(&self, acl: &BagAcl) -> Result<()>;
    fn delete_bag_acl(&self, role_id: &str, bag_id: &str) -> Result<bool>;
    fn list_bag_acl(&self, bag_id: &str) -> Result<Vec<BagAcl>>;

    fn close(&self) -> Result<()>;
}
