use std::path::Path;

use anyhow::Context;

use super::commands::Format;
use crate::engine::Engine;
use crate::types::RecipeDefinition;

pub fn run_recipe_export(engine: &Engine, name: &str, format: Format) -> anyhow::Result<()> {
    let def = engine
        .recipes()
        .export(name)
        .with_context(|| format!("recipe '{name}'"))?;

    let rendered = match format {
        Format::Toml => def.to_toml()?,
        Format::Json => serde_json::to_string_pretty(&def)?,
    };
    println!("{rendered}");
    Ok(())
}

pub fn run_recipe_import(engine: &Engine, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let def = if file.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<RecipeDefinition>(&text)?
    } else {
        RecipeDefinition::from_toml(&text)?
    };

    let recipe = engine
        .recipes()
        .import(&def)
        .with_context(|| format!("failed to import recipe '{}'", def.name))?;

    println!(
        "Imported recipe '{}' ({} layers, {} acl entries)",
        recipe.name,
        def.layers.len(),
        def.acl.len()
    );
    Ok(())
}
