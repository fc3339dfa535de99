use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::store::Store;
use crate::types::{
    Bag, BagAcl, Permission, Recipe, RecipeAcl, Role, RoleSet, StackLayer, max_permission,
};

/// The object an ACL lookup is evaluated against. Recipes and bags keep
/// separate ACL tables; this only selects which one to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclTarget<'a> {
    Recipe(&'a str),
    Bag(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeniedTarget {
    Recipe(String),
    Bag(String),
}

/// Why an access check failed: which object, what was needed, what the
/// caller's roles actually hold there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub target: DeniedTarget,
    pub required: Permission,
    pub held: Option<Permission>,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, name) = match &self.target {
            DeniedTarget::Recipe(name) => ("recipe", name),
            DeniedTarget::Bag(name) => ("bag", name),
        };
        match self.held {
            Some(held) => write!(
                f,
                "{kind} '{name}' requires {} but roles hold {held}",
                self.required
            ),
            None => write!(
                f,
                "{kind} '{name}' requires {} but roles hold no permission",
                self.required
            ),
        }
    }
}

/// Role-based permission evaluation for recipes, bags and recipe layers.
#[derive(Clone)]
pub struct AclEngine {
    store: Arc<dyn Store>,
}

impl AclEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Highest permission any of `roles` holds on `target`. No matching row
    /// means no permission.
    pub fn effective_permission(
        &self,
        roles: &RoleSet,
        target: AclTarget<'_>,
    ) -> Result<Option<Permission>> {
        if roles.is_empty() {
            return Ok(None);
        }

        let held = match target {
            AclTarget::Recipe(recipe_id) => max_permission(
                self.store
                    .list_recipe_acl(recipe_id)?
                    .into_iter()
                    .filter(|row| roles.contains(&row.role_id))
                    .map(|row| row.permission),
            ),
            AclTarget::Bag(bag_id) => max_permission(
                self.store
                    .list_bag_acl(bag_id)?
                    .into_iter()
                    .filter(|row| roles.contains(&row.role_id))
                    .map(|row| row.permission),
            ),
        };

        Ok(held)
    }

    pub fn check_recipe(
        &self,
        roles: &RoleSet,
        recipe: &Recipe,
        required: Permission,
    ) -> Result<Option<Denial>> {
        let held = self.effective_permission(roles, AclTarget::Recipe(&recipe.id))?;
        Ok(deny_unless(
            held,
            required,
            DeniedTarget::Recipe(recipe.name.clone()),
        ))
    }

    pub fn check_bag(
        &self,
        roles: &RoleSet,
        bag: &Bag,
        required: Permission,
    ) -> Result<Option<Denial>> {
        let held = self.effective_permission(roles, AclTarget::Bag(&bag.id))?;
        Ok(deny_unless(held, required, DeniedTarget::Bag(bag.name.clone())))
    }

    /// Bag-level check for one layer of a recipe whose recipe-level check
    /// already passed. Layers without `with_acl` delegate to the recipe and
    /// never read the bag's ACL.
    pub fn check_layer(
        &self,
        roles: &RoleSet,
        entry: &StackLayer,
        required: Permission,
    ) -> Result<Option<Denial>> {
        if !entry.layer.with_acl {
            return Ok(None);
        }
        let denial = self.check_bag(roles, &entry.bag, required)?;
        if let Some(denial) = &denial {
            tracing::debug!(layer = %entry.bag.name, "layer acl denied: {denial}");
        }
        Ok(denial)
    }

    pub fn grant_recipe(&self, role: &Role, recipe: &Recipe, permission: Permission) -> Result<()> {
        self.store.upsert_recipe_acl(&RecipeAcl {
            role_id: role.id.clone(),
            recipe_id: recipe.id.clone(),
            permission,
        })?;
        tracing::info!(role = %role.name, recipe = %recipe.name, %permission, "granted recipe permission");
        Ok(())
    }

    pub fn grant_bag(&self, role: &Role, bag: &Bag, permission: Permission) -> Result<()> {
        self.store.upsert_bag_acl(&BagAcl {
            role_id: role.id.clone(),
            bag_id: bag.id.clone(),
            permission,
        })?;
        tracing::info!(role = %role.name, bag = %bag.name, %permission, "granted bag permission");
        Ok(())
    }

    pub fn revoke_recipe(&self, role: &Role, recipe: &Recipe) -> Result<bool> {
        self.store.delete_recipe_acl(&role.id, &recipe.id)
    }

    pub fn revoke_bag(&self, role: &Role, bag: &Bag) -> Result<bool> {
        self.store.delete_bag_acl(&role.id, &bag.id)
    }
}

fn deny_unless(
    held: Option<Permission>,
    required: Permission,
    target: DeniedTarget,
) -> Option<Denial> {
    match held {
        Some(p) if p.satisfies(required) => None,
        _ => Some(Denial {
            target,
            required,
            held,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::RecipeLayer;
    use chrono::Utc;

    fn setup() -> (AclEngine, Bag, Recipe, Role, Role) {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();

        let bag = Bag {
            id: "bag-1".to_string(),
            name: "private".to_string(),
            description: None,
            owner: None,
            created_at: Utc::now(),
        };
        store.create_bag(&bag).unwrap();

        let recipe = Recipe {
            id: "recipe-1".to_string(),
            name: "docs".to_string(),
            description: None,
            owner: None,
            required_plugins: Default::default(),
            skip_required_plugins: false,
            skip_core: false,
            created_at: Utc::now(),
        };
        store.create_recipe(&recipe).unwrap();

        let readers = Role {
            id: "role-r".to_string(),
            name: "readers".to_string(),
            description: None,
        };
        let admins = Role {
            id: "role-a".to_string(),
            name: "admins".to_string(),
            description: None,
        };
        store.create_role(&readers).unwrap();
        store.create_role(&admins).unwrap();

        (AclEngine::new(Arc::new(store)), bag, recipe, readers, admins)
    }

    fn roles(ids: &[&str]) -> RoleSet {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_effective_permission_is_maximum() {
        let (acl, bag, _recipe, readers, admins) = setup();
        acl.grant_bag(&readers, &bag, Permission::Read).unwrap();
        acl.grant_bag(&admins, &bag, Permission::Admin).unwrap();

        let target = AclTarget::Bag(&bag.id);
        assert_eq!(
            acl.effective_permission(&roles(&["role-r"]), target).unwrap(),
            Some(Permission::Read)
        );
        assert_eq!(
            acl.effective_permission(&roles(&["role-r", "role-a"]), target)
                .unwrap(),
            Some(Permission::Admin)
        );
        assert_eq!(
            acl.effective_permission(&roles(&["someone"]), target).unwrap(),
            None
        );
        assert_eq!(acl.effective_permission(&RoleSet::new(), target).unwrap(), None);
    }

    #[test]
    fn test_recipe_and_bag_tables_are_independent() {
        let (acl, bag, recipe, readers, _admins) = setup();
        acl.grant_recipe(&readers, &recipe, Permission::Write).unwrap();

        let caller = roles(&["role-r"]);
        assert!(acl.check_recipe(&caller, &recipe, Permission::Write).unwrap().is_none());

        let denial = acl.check_bag(&caller, &bag, Permission::Read).unwrap().unwrap();
        assert_eq!(denial.target, DeniedTarget::Bag("private".to_string()));
        assert_eq!(denial.held, None);
    }

    #[test]
    fn test_insufficient_level_is_denied() {
        let (acl, _bag, recipe, readers, _admins) = setup();
        acl.grant_recipe(&readers, &recipe, Permission::Read).unwrap();

        let denial = acl
            .check_recipe(&roles(&["role-r"]), &recipe, Permission::Write)
            .unwrap()
            .unwrap();
        assert_eq!(denial.held, Some(Permission::Read));
        assert_eq!(
            denial.to_string(),
            "recipe 'docs' requires write but roles hold read"
        );
    }

    #[test]
    fn test_layer_check_respects_with_acl() {
        let (acl, bag, recipe, _readers, _admins) = setup();
        let mut entry = StackLayer {
            layer: RecipeLayer {
                recipe_id: recipe.id.clone(),
                bag_id: bag.id.clone(),
                position: 0,
                with_acl: false,
                load_modules: false,
            },
            bag,
        };

        let caller = roles(&["role-r"]);
        assert!(acl.check_layer(&caller, &entry, Permission::Write).unwrap().is_none());

        entry.layer.with_acl = true;
        assert!(acl.check_layer(&caller, &entry, Permission::Write).unwrap().is_some());
    }

    #[test]
    fn test_revoke() {
        let (acl, bag, _recipe, readers, _admins) = setup();
        acl.grant_bag(&readers, &bag, Permission::Write).unwrap();
        assert!(acl.revoke_bag(&readers, &bag).unwrap());
        assert!(!acl.revoke_bag(&readers, &bag).unwrap());
        assert!(
            acl.check_bag(&roles(&["role-r"]), &bag, Permission::Read)
                .unwrap()
                .is_some()
        );
    }
}
