use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wikistack::cli::{
    BagCommands, Commands, RecipeCommands, RoleCommands, open_engine, run_bag_create, run_init,
    run_recipe_export, run_recipe_import, run_role_create,
};
use wikistack::config::EngineConfig;

#[derive(Parser)]
#[command(name = "wikistack")]
#[command(about = "Administrative tooling for a wikistack data directory", long_about = None)]
struct Cli {
    /// Config file (TOML). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "wikistack.toml")]
    config: PathBuf,

    /// Data directory; overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = EngineConfig::load(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let directive = config.log_filter.as_deref().unwrap_or("wikistack=info");
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => run_init(&config)?,
        Commands::Bag { command } => {
            let engine = open_engine(&config)?;
            match command {
                BagCommands::Create {
                    name,
                    description,
                    owner,
                } => run_bag_create(&engine, &name, description.as_deref(), owner.as_deref())?,
            }
        }
        Commands::Role { command } => {
            let engine = open_engine(&config)?;
            match command {
                RoleCommands::Create { name, description } => {
                    run_role_create(&engine, &name, description.as_deref())?;
                }
            }
        }
        Commands::Recipe { command } => {
            let engine = open_engine(&config)?;
            match command {
                RecipeCommands::Export { name, format } => {
                    run_recipe_export(&engine, &name, format)?;
                }
                RecipeCommands::Import { file } => run_recipe_import(&engine, &file)?,
            }
        }
    }

    Ok(())
}
