mod admin;
mod commands;
mod recipe;

pub use admin::{run_bag_create, run_init, run_role_create};
pub use commands::{BagCommands, Commands, Format, RecipeCommands, RoleCommands};
pub use recipe::{run_recipe_export, run_recipe_import};

use crate::config::EngineConfig;
use crate::engine::Engine;

/// Opens the engine for an initialized data directory.
pub fn open_engine(config: &EngineConfig) -> anyhow::Result<Engine> {
    let db_path = config.db_path();
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'wikistack init' first.",
            db_path.display()
        );
    }

    Engine::open(config).map_err(Into::into)
}
