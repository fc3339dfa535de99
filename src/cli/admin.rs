use crate::config::EngineConfig;
use crate::engine::Engine;

pub fn run_init(config: &EngineConfig) -> anyhow::Result<()> {
    let existed = config.db_path().exists();
    Engine::open(config)?;

    if existed {
        println!("Already initialized at {}", config.data_dir.display());
    } else {
        println!("Initialized {}", config.db_path().display());
    }
    Ok(())
}

pub fn run_bag_create(
    engine: &Engine,
    name: &str,
    description: Option<&str>,
    owner: Option<&str>,
) -> anyhow::Result<()> {
    let bag = engine.bags().create(name, description, owner)?;
    println!("Created bag '{}' ({})", bag.name, bag.id);
    Ok(())
}

pub fn run_role_create(
    engine: &Engine,
    name: &str,
    description: Option<&str>,
) -> anyhow::Result<()> {
    let role = engine.create_role(name, description)?;
    println!("Created role '{}' ({})", role.name, role.id);
    Ok(())
}
