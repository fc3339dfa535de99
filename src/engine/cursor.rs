use std::collections::HashMap;

use serde::Serialize;

use super::acl::AclEngine;
use super::bag::BagService;
use super::recipe::RecipeIndex;
use super::resolve::Access;
use crate::error::Result;
use crate::types::{Bag, Permission, RoleSet, StackLayer, TiddlerHead, Version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub bag: String,
    pub title: String,
    pub version: Version,
    pub is_deleted: bool,
}

/// One page of a change feed. Pass `cursor` back to continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
    pub cursor: Version,
}

impl ChangeSet {
    fn collect(heads: Vec<TiddlerHead>, bags: &[&Bag], since: Version) -> Self {
        let names: HashMap<&str, &str> = bags
            .iter()
            .map(|bag| (bag.id.as_str(), bag.name.as_str()))
            .collect();

        let cursor = heads.iter().map(|h| h.version).max().unwrap_or(since).max(since);
        let changes = heads
            .into_iter()
            .map(|head| Change {
                bag: names
                    .get(head.bag_id.as_str())
                    .map_or_else(|| head.bag_id.clone(), |name| (*name).to_string()),
                title: head.title,
                version: head.version,
                is_deleted: head.is_deleted,
            })
            .collect();

        Self { changes, cursor }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// "Everything changed since X" over bags and recipes.
///
/// Each slot reports its latest state only; a title rewritten twice since
/// the cursor appears once, at its newest version. Tombstones are included.
#[derive(Clone)]
pub struct ChangeCursor {
    bags: BagService,
    recipes: RecipeIndex,
    acl: AclEngine,
}

impl ChangeCursor {
    pub fn new(bags: BagService, recipes: RecipeIndex, acl: AclEngine) -> Self {
        Self { bags, recipes, acl }
    }

    pub fn changes_since(&self, bag: &str, cursor: Version) -> Result<ChangeSet> {
        let bag = self.bags.bag(bag)?;
        let heads = self.bags.changes_in(&[&bag], cursor)?;
        Ok(ChangeSet::collect(heads, &[&bag], cursor))
    }

    /// Union of the feeds of every bag in the recipe, in version order.
    /// Shadowing is not applied; clients re-resolve the titles they see.
    pub fn recipe_changes_since(&self, recipe: &str, cursor: Version) -> Result<ChangeSet> {
        let recipe = self.recipes.recipe(recipe)?;
        let stack = self.recipes.stack(&recipe)?;
        self.stack_changes(&stack, cursor)
    }

    pub fn visible_changes_since(
        &self,
        roles: &RoleSet,
        recipe: &str,
        cursor: Version,
    ) -> Result<Access<ChangeSet>> {
        let Some(recipe) = self.recipes.find(recipe)? else {
            return Ok(Access::NotFound);
        };
        if let Some(denial) = self.acl.check_recipe(roles, &recipe, Permission::Read)? {
            return Ok(Access::Denied(denial));
        }

        let stack = self.recipes.stack(&recipe)?;
        for entry in &stack {
            if let Some(denial) = self.acl.check_layer(roles, entry, Permission::Read)? {
                return Ok(Access::Denied(denial));
            }
        }

        self.stack_changes(&stack, cursor).map(Access::Granted)
    }

    fn stack_changes(&self, stack: &[StackLayer], cursor: Version) -> Result<ChangeSet> {
        let bags: Vec<&Bag> = stack.iter().map(|entry| &entry.bag).collect();
        let heads = self.bags.changes_in(&bags, cursor)?;
        tracing::debug!(bags = bags.len(), changes = heads.len(), %cursor, "collected changes");
        Ok(ChangeSet::collect(heads, &bags, cursor))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::acl::DeniedTarget;
    use crate::store::{SqliteStore, Store};
    use crate::types::{Fields, LayerDefinition, Role};
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (ChangeCursor, BagService, RecipeIndex, AclEngine, Arc<dyn Store>) {
        let store: Arc<dyn Store> =
            Arc::new(SqliteStore::new(&dir.path().join("feed.db")).unwrap());
        store.initialize().unwrap();
        let bags = BagService::new(store.clone());
        let recipes = RecipeIndex::new(store.clone());
        let acl = AclEngine::new(store.clone());
        let cursor = ChangeCursor::new(bags.clone(), recipes.clone(), acl.clone());
        (cursor, bags, recipes, acl, store)
    }

    fn text(body: &str) -> Fields {
        Fields::from([("text".to_string(), body.to_string())])
    }

    #[test]
    fn test_feed_converges() {
        let dir = TempDir::new().unwrap();
        let (feed, bags, _, _, _) = setup(&dir);
        bags.create("core", None, None).unwrap();
        bags.put("core", "A", &text("1"), None).unwrap();
        bags.put("core", "B", &text("1"), None).unwrap();

        let first = feed.changes_since("core", Version::ZERO).unwrap();
        assert_eq!(first.changes.len(), 2);

        let second = feed.changes_since("core", first.cursor).unwrap();
        assert!(second.is_empty());
        assert_eq!(second.cursor, first.cursor);
    }

    #[test]
    fn test_feed_reports_deletions_and_rewrites_once() {
        let dir = TempDir::new().unwrap();
        let (feed, bags, _, _, _) = setup(&dir);
        bags.create("core", None, None).unwrap();
        bags.put("core", "A", &text("1"), None).unwrap();
        let start = feed.changes_since("core", Version::ZERO).unwrap().cursor;

        bags.put("core", "A", &text("2"), None).unwrap();
        bags.put("core", "B", &text("1"), None).unwrap();
        let deleted = bags.delete("core", "A").unwrap();

        let set = feed.changes_since("core", start).unwrap();
        let titles: Vec<(&str, bool)> = set
            .changes
            .iter()
            .map(|c| (c.title.as_str(), c.is_deleted))
            .collect();
        assert_eq!(titles, vec![("B", false), ("A", true)]);
        assert_eq!(set.cursor, deleted);
    }

    #[test]
    fn test_recipe_feed_is_union_of_bags() {
        let dir = TempDir::new().unwrap();
        let (feed, bags, recipes, _, _) = setup(&dir);
        bags.create("core", None, None).unwrap();
        bags.create("overrides", None, None).unwrap();
        bags.create("elsewhere", None, None).unwrap();
        let recipe = recipes.create("docs", None, None).unwrap();
        recipes
            .set_layers(
                &recipe,
                &[
                    LayerDefinition {
                        bag: "core".to_string(),
                        position: 0,
                        with_acl: false,
                        load_modules: false,
                    },
                    LayerDefinition {
                        bag: "overrides".to_string(),
                        position: 10,
                        with_acl: false,
                        load_modules: false,
                    },
                ],
            )
            .unwrap();

        bags.put("core", "Home", &text("A"), None).unwrap();
        bags.put("elsewhere", "Stray", &text("x"), None).unwrap();
        bags.put("overrides", "Home", &text("B"), None).unwrap();

        let set = feed.recipe_changes_since("docs", Version::ZERO).unwrap();
        let seen: Vec<&str> = set.changes.iter().map(|c| c.bag.as_str()).collect();
        assert_eq!(seen, vec!["core", "overrides"]);
        assert!(feed.recipe_changes_since("docs", set.cursor).unwrap().is_empty());
    }

    #[test]
    fn test_visible_feed_requires_read() {
        let dir = TempDir::new().unwrap();
        let (feed, bags, recipes, acl, store) = setup(&dir);
        bags.create("core", None, None).unwrap();
        let recipe = recipes.create("docs", None, None).unwrap();
        recipes
            .set_layers(
                &recipe,
                &[LayerDefinition {
                    bag: "core".to_string(),
                    position: 0,
                    with_acl: false,
                    load_modules: false,
                }],
            )
            .unwrap();
        bags.put("core", "Home", &text("A"), None).unwrap();

        let role = Role {
            id: "role-1".to_string(),
            name: "readers".to_string(),
            description: None,
        };
        store.create_role(&role).unwrap();
        let caller: RoleSet = ["role-1".to_string()].into_iter().collect();

        assert!(matches!(
            feed.visible_changes_since(&caller, "docs", Version::ZERO).unwrap(),
            Access::Denied(_)
        ));

        acl.grant_recipe(&role, &recipe, Permission::Read).unwrap();
        let set = feed
            .visible_changes_since(&caller, "docs", Version::ZERO)
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(set.changes.len(), 1);
    }

    #[test]
    fn test_visible_feed_checks_guarded_bag() {
        let dir = TempDir::new().unwrap();
        let (feed, bags, recipes, acl, store) = setup(&dir);
        bags.create("core", None, None).unwrap();
        let drafts = bags.create("drafts", None, None).unwrap();
        let recipe = recipes.create("docs", None, None).unwrap();
        recipes
            .set_layers(
                &recipe,
                &[
                    LayerDefinition {
                        bag: "core".to_string(),
                        position: 0,
                        with_acl: false,
                        load_modules: false,
                    },
                    LayerDefinition {
                        bag: "drafts".to_string(),
                        position: 10,
                        with_acl: true,
                        load_modules: false,
                    },
                ],
            )
            .unwrap();
        bags.put("core", "Home", &text("A"), None).unwrap();
        bags.put("drafts", "Plan", &text("B"), None).unwrap();

        let role = Role {
            id: "role-1".to_string(),
            name: "readers".to_string(),
            description: None,
        };
        store.create_role(&role).unwrap();
        acl.grant_recipe(&role, &recipe, Permission::Read).unwrap();
        let caller: RoleSet = ["role-1".to_string()].into_iter().collect();

        match feed
            .visible_changes_since(&caller, "docs", Version::ZERO)
            .unwrap()
        {
            Access::Denied(denial) => {
                assert_eq!(denial.target, DeniedTarget::Bag("drafts".to_string()));
                assert_eq!(denial.held, None);
            }
            other => panic!("expected denial, got {other:?}"),
        }

        acl.grant_bag(&role, &drafts, Permission::Read).unwrap();
        let set = feed
            .visible_changes_since(&caller, "docs", Version::ZERO)
            .unwrap()
            .into_result()
            .unwrap();
        let seen: Vec<&str> = set.changes.iter().map(|c| c.bag.as_str()).collect();
        assert_eq!(seen, vec!["core", "drafts"]);
    }
}
