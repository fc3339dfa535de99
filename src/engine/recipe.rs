use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{
    LayerDefinition, PluginSet, Recipe, RecipeAcl, RecipeAclDefinition, RecipeDefinition,
    RecipeLayer, StackLayer,
};
use crate::validation::validate_recipe_name;

/// What an external module loader should load for a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModulePlan {
    pub recipe: String,
    pub include_core: bool,
    pub required_plugins: PluginSet,
    /// Names of bags flagged `load_modules`, bottom of the stack first.
    pub module_bags: Vec<String>,
}

/// Orders a recipe's layers bottom to top: ascending position, ties broken
/// by bag id.
pub fn sort_stack(stack: &mut [StackLayer]) {
    stack.sort_by(|a, b| {
        a.layer
            .position
            .cmp(&b.layer.position)
            .then_with(|| a.layer.bag_id.cmp(&b.layer.bag_id))
    });
}

/// Recipe definitions and their layer stacks.
#[derive(Clone)]
pub struct RecipeIndex {
    store: Arc<dyn Store>,
}

impl RecipeIndex {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Looks up a recipe by name.
    pub fn recipe(&self, name: &str) -> Result<Recipe> {
        self.find(name)?.ok_or(Error::NotFound)
    }

    pub fn find(&self, name: &str) -> Result<Option<Recipe>> {
        self.store.get_recipe_by_name(name)
    }

    pub fn create(
        &self,
        name: &str,
        description: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Recipe> {
        validate_recipe_name(name)?;
        let recipe = Recipe {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            owner: owner.map(str::to_string),
            required_plugins: PluginSet::new(),
            skip_required_plugins: false,
            skip_core: false,
            created_at: Utc::now(),
        };
        self.store.create_recipe(&recipe)?;
        tracing::info!(recipe = %recipe.name, "created recipe");
        Ok(recipe)
    }

    /// Layers of `recipe`, bottom of the stack first.
    pub fn stack(&self, recipe: &Recipe) -> Result<Vec<StackLayer>> {
        let mut stack = self.store.list_recipe_stack(&recipe.id)?;
        sort_stack(&mut stack);
        Ok(stack)
    }

    /// Replaces the recipe's layers. Bags are referenced by name.
    pub fn set_layers(&self, recipe: &Recipe, layers: &[LayerDefinition]) -> Result<()> {
        let rows = self.layer_rows(recipe, layers)?;
        self.store.set_recipe_layers(&recipe.id, &rows)?;
        tracing::info!(recipe = %recipe.name, layers = rows.len(), "updated recipe layers");
        Ok(())
    }

    pub fn module_plan(&self, recipe_name: &str) -> Result<ModulePlan> {
        let recipe = self.recipe(recipe_name)?;
        let module_bags = self
            .stack(&recipe)?
            .into_iter()
            .filter(|entry| entry.layer.load_modules)
            .map(|entry| entry.bag.name)
            .collect();

        let required_plugins = if recipe.skip_required_plugins {
            PluginSet::new()
        } else {
            recipe.required_plugins
        };

        Ok(ModulePlan {
            recipe: recipe.name,
            include_core: !recipe.skip_core,
            required_plugins,
            module_bags,
        })
    }

    pub fn export(&self, recipe_name: &str) -> Result<RecipeDefinition> {
        let recipe = self.recipe(recipe_name)?;

        let layers = self
            .stack(&recipe)?
            .into_iter()
            .map(|entry| LayerDefinition {
                bag: entry.bag.name,
                position: entry.layer.position,
                with_acl: entry.layer.with_acl,
                load_modules: entry.layer.load_modules,
            })
            .collect();

        let mut acl = Vec::new();
        for row in self.store.list_recipe_acl(&recipe.id)? {
            let role = self.store.get_role(&row.role_id)?.ok_or(Error::NotFound)?;
            acl.push(RecipeAclDefinition {
                role: role.name,
                permission: row.permission,
            });
        }
        acl.sort_by(|a, b| a.role.cmp(&b.role));

        Ok(RecipeDefinition {
            name: recipe.name,
            description: recipe.description,
            owner: recipe.owner,
            required_plugins: recipe.required_plugins,
            skip_required_plugins: recipe.skip_required_plugins,
            skip_core: recipe.skip_core,
            layers,
            acl,
        })
    }

    /// Creates the recipe or replaces an existing one of the same name.
    /// Bag and role names are resolved first; the row, layers and ACL are
    /// then written in a single store transaction.
    pub fn import(&self, def: &RecipeDefinition) -> Result<Recipe> {
        validate_recipe_name(&def.name)?;

        let existing = self.find(&def.name)?;
        let recipe = Recipe {
            id: existing
                .as_ref()
                .map_or_else(|| Uuid::new_v4().to_string(), |r| r.id.clone()),
            name: def.name.clone(),
            description: def.description.clone(),
            owner: def.owner.clone(),
            required_plugins: def.required_plugins.clone(),
            skip_required_plugins: def.skip_required_plugins,
            skip_core: def.skip_core,
            created_at: existing.as_ref().map_or_else(Utc::now, |r| r.created_at),
        };

        let layers = self.layer_rows(&recipe, &def.layers)?;

        let mut seen_roles = BTreeSet::new();
        let mut acl = Vec::with_capacity(def.acl.len());
        for entry in &def.acl {
            if !seen_roles.insert(entry.role.as_str()) {
                return Err(Error::BadRequest(format!(
                    "role '{}' appears more than once",
                    entry.role
                )));
            }
            let role = self
                .store
                .get_role_by_name(&entry.role)?
                .ok_or(Error::NotFound)?;
            acl.push(RecipeAcl {
                role_id: role.id,
                recipe_id: recipe.id.clone(),
                permission: entry.permission,
            });
        }

        self.store.replace_recipe(&recipe, &layers, &acl)?;

        tracing::info!(
            recipe = %recipe.name,
            layers = layers.len(),
            acl = acl.len(),
            replaced = existing.is_some(),
            "imported recipe"
        );
        Ok(recipe)
    }

    fn layer_rows(&self, recipe: &Recipe, layers: &[LayerDefinition]) -> Result<Vec<RecipeLayer>> {
        let mut seen = BTreeSet::new();
        let mut rows = Vec::with_capacity(layers.len());
        for layer in layers {
            if !seen.insert(layer.bag.as_str()) {
                return Err(Error::BadRequest(format!(
                    "bag '{}' appears more than once in recipe '{}'",
                    layer.bag, recipe.name
                )));
            }
            let bag = self
                .store
                .get_bag_by_name(&layer.bag)?
                .ok_or(Error::NotFound)?;
            rows.push(RecipeLayer {
                recipe_id: recipe.id.clone(),
                bag_id: bag.id,
                position: layer.position,
                with_acl: layer.with_acl,
                load_modules: layer.load_modules,
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{Bag, Permission, Role};

    fn setup() -> (RecipeIndex, Arc<dyn Store>) {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        for (id, name) in [("bag-b", "core"), ("bag-a", "plugins"), ("bag-c", "overrides")] {
            store
                .create_bag(&Bag {
                    id: id.to_string(),
                    name: name.to_string(),
                    description: None,
                    owner: None,
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        store
            .create_role(&Role {
                id: "role-1".to_string(),
                name: "editors".to_string(),
                description: None,
            })
            .unwrap();
        let store: Arc<dyn Store> = Arc::new(store);
        (RecipeIndex::new(store.clone()), store)
    }

    fn layer(bag: &str, position: i64, with_acl: bool, load_modules: bool) -> LayerDefinition {
        LayerDefinition {
            bag: bag.to_string(),
            position,
            with_acl,
            load_modules,
        }
    }

    #[test]
    fn test_stack_orders_by_position_then_bag_id() {
        let (index, _) = setup();
        let recipe = index.create("docs", None, None).unwrap();
        index
            .set_layers(
                &recipe,
                &[
                    layer("overrides", 10, false, false),
                    layer("core", 0, false, false),
                    layer("plugins", 0, false, true),
                ],
            )
            .unwrap();

        let names: Vec<String> = index
            .stack(&recipe)
            .unwrap()
            .into_iter()
            .map(|e| e.bag.name)
            .collect();
        // "plugins" (bag-a) and "core" (bag-b) tie at 0; bag id decides.
        assert_eq!(names, vec!["plugins", "core", "overrides"]);
    }

    #[test]
    fn test_duplicate_bag_rejected() {
        let (index, _) = setup();
        let recipe = index.create("docs", None, None).unwrap();
        let result = index.set_layers(
            &recipe,
            &[layer("core", 0, false, false), layer("core", 5, true, false)],
        );
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_module_plan_honours_skip_flags() {
        let (index, _) = setup();
        let def = RecipeDefinition {
            name: "app".to_string(),
            description: None,
            owner: None,
            required_plugins: ["markdown".to_string()].into_iter().collect(),
            skip_required_plugins: true,
            skip_core: true,
            layers: vec![
                layer("core", 0, false, true),
                layer("plugins", 5, false, true),
                layer("overrides", 10, false, false),
            ],
            acl: Vec::new(),
        };
        index.import(&def).unwrap();

        let plan = index.module_plan("app").unwrap();
        assert!(!plan.include_core);
        assert!(plan.required_plugins.is_empty());
        assert_eq!(plan.module_bags, vec!["core", "plugins"]);
    }

    #[test]
    fn test_export_import_preserves_flags() {
        let (index, _) = setup();
        let def = RecipeDefinition {
            name: "docs".to_string(),
            description: Some("Documentation site".to_string()),
            owner: Some("alice".to_string()),
            required_plugins: ["katex".to_string(), "markdown".to_string()]
                .into_iter()
                .collect(),
            skip_required_plugins: false,
            skip_core: true,
            layers: vec![
                layer("core", 0, true, true),
                layer("overrides", 10, false, false),
            ],
            acl: vec![RecipeAclDefinition {
                role: "editors".to_string(),
                permission: Permission::Write,
            }],
        };

        let created = index.import(&def).unwrap();
        assert_eq!(index.export("docs").unwrap(), def);

        let mut changed = def.clone();
        changed.layers[1].with_acl = true;
        changed.acl.clear();
        let replaced = index.import(&changed).unwrap();
        assert_eq!(replaced.id, created.id);
        assert_eq!(index.export("docs").unwrap(), changed);
    }

    #[test]
    fn test_import_with_unknown_bag_writes_nothing() {
        let (index, store) = setup();
        let def = RecipeDefinition {
            name: "broken".to_string(),
            description: None,
            owner: None,
            required_plugins: PluginSet::new(),
            skip_required_plugins: false,
            skip_core: false,
            layers: vec![layer("core", 0, false, false), layer("ghost", 1, false, false)],
            acl: Vec::new(),
        };

        assert!(matches!(index.import(&def), Err(Error::NotFound)));
        assert!(store.get_recipe_by_name("broken").unwrap().is_none());
    }
}
