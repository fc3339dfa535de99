use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and database
    Init,

    /// Manage bags
    Bag {
        #[command(subcommand)]
        command: BagCommands,
    },

    /// Manage roles
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Export and import recipe definitions
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
}

#[derive(Subcommand)]
pub enum BagCommands {
    /// Create an empty bag
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        owner: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RoleCommands {
    /// Create a role
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RecipeCommands {
    /// Print a recipe definition, layer flags and ACL included
    Export {
        name: String,

        #[arg(long, value_enum, default_value_t = Format::Toml)]
        format: Format,
    },

    /// Create or replace a recipe from a definition file
    Import {
        /// TOML or JSON file, chosen by extension
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Toml,
    Json,
}
