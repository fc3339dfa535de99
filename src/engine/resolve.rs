use std::collections::BTreeMap;

use serde::Serialize;

use super::acl::{AclEngine, Denial};
use super::bag::BagService;
use super::recipe::RecipeIndex;
use crate::error::{Error, Result};
use crate::types::{
    AttachmentRef, Bag, Fields, Permission, RecipeLayer, RoleSet, StackLayer, Tiddler, Version,
};

/// Outcome of an access-checked operation. `NotFound` and `Denied` are
/// expected results, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Access<T> {
    Granted(T),
    NotFound,
    Denied(Denial),
}

impl<T> Access<T> {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    pub fn granted(self) -> Option<T> {
        match self {
            Self::Granted(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Access<U> {
        match self {
            Self::Granted(value) => Access::Granted(f(value)),
            Self::NotFound => Access::NotFound,
            Self::Denied(denial) => Access::Denied(denial),
        }
    }

    /// Reports a denial as `NotFound`, for callers that must not reveal
    /// whether restricted content exists.
    pub fn conceal_denied(self) -> Access<T> {
        match self {
            Self::Denied(_) => Self::NotFound,
            other => other,
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Granted(value) => Ok(value),
            Self::NotFound => Err(Error::NotFound),
            Self::Denied(denial) => Err(Error::PermissionDenied(denial.to_string())),
        }
    }
}

/// The tiddler a recipe exposes for a title, and the layer it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub bag: Bag,
    pub layer: RecipeLayer,
    pub tiddler: Tiddler,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleTitle {
    pub title: String,
    pub bag: String,
    pub version: Version,
}

/// Merges a recipe's layers into one view.
///
/// Layers are walked from the top of the stack down. The first layer that
/// holds a row for the title decides: a live row is the result, a tombstone
/// hides the title from every layer beneath it.
#[derive(Clone)]
pub struct ResolutionEngine {
    recipes: RecipeIndex,
    bags: BagService,
    acl: AclEngine,
}

impl ResolutionEngine {
    pub fn new(recipes: RecipeIndex, bags: BagService, acl: AclEngine) -> Self {
        Self { recipes, bags, acl }
    }

    /// Resolves without access checks. An unknown recipe is `Error::NotFound`.
    pub fn resolve(&self, recipe: &str, title: &str) -> Result<Option<Resolved>> {
        let recipe = self.recipes.recipe(recipe)?;
        let stack = self.recipes.stack(&recipe)?;
        let found = self.walk(&stack, title, |_| Ok(None))?;
        Ok(found.granted())
    }

    /// Resolves on behalf of `roles`, requiring `required` on the recipe and,
    /// for every `with_acl` layer the walk visits, on that layer's bag.
    ///
    /// The recipe check runs first. Bag checks run lazily as layers are
    /// visited, and the first failing one ends the walk.
    pub fn read(
        &self,
        roles: &RoleSet,
        recipe: &str,
        title: &str,
        required: Permission,
    ) -> Result<Access<Resolved>> {
        let Some(recipe) = self.recipes.find(recipe)? else {
            return Ok(Access::NotFound);
        };
        if let Some(denial) = self.acl.check_recipe(roles, &recipe, required)? {
            return Ok(Access::Denied(denial));
        }

        let stack = self.recipes.stack(&recipe)?;
        self.walk(&stack, title, |entry| {
            self.acl.check_layer(roles, entry, required)
        })
    }

    /// Every title the recipe exposes, with the bag that supplies it.
    pub fn list_titles(&self, recipe: &str) -> Result<Vec<VisibleTitle>> {
        let recipe = self.recipes.recipe(recipe)?;
        let stack = self.recipes.stack(&recipe)?;
        let listed = self.merge_titles(&stack, |_| Ok(None))?;
        Ok(listed.granted().unwrap_or_default())
    }

    /// `list_titles` under the same two-tier check as `read`. Listing visits
    /// every layer, so every `with_acl` layer must pass.
    pub fn list_visible(
        &self,
        roles: &RoleSet,
        recipe: &str,
        required: Permission,
    ) -> Result<Access<Vec<VisibleTitle>>> {
        let Some(recipe) = self.recipes.find(recipe)? else {
            return Ok(Access::NotFound);
        };
        if let Some(denial) = self.acl.check_recipe(roles, &recipe, required)? {
            return Ok(Access::Denied(denial));
        }

        let stack = self.recipes.stack(&recipe)?;
        self.merge_titles(&stack, |entry| {
            self.acl.check_layer(roles, entry, required)
        })
    }

    /// Writes into the top layer of the recipe. Requires WRITE on the recipe
    /// and, if the top layer has `with_acl`, WRITE on its bag.
    pub fn write(
        &self,
        roles: &RoleSet,
        recipe: &str,
        title: &str,
        fields: &Fields,
        attachment: Option<&AttachmentRef>,
    ) -> Result<Access<Version>> {
        let Some(recipe) = self.recipes.find(recipe)? else {
            return Ok(Access::NotFound);
        };
        if let Some(denial) = self.acl.check_recipe(roles, &recipe, Permission::Write)? {
            return Ok(Access::Denied(denial));
        }

        let stack = self.recipes.stack(&recipe)?;
        let Some(top) = stack.last() else {
            return Err(Error::BadRequest(format!(
                "recipe '{}' has no layers to write to",
                recipe.name
            )));
        };
        if let Some(denial) = self.acl.check_layer(roles, top, Permission::Write)? {
            return Ok(Access::Denied(denial));
        }

        let version = self.bags.put_in(&top.bag, title, fields, attachment, None)?;
        Ok(Access::Granted(version))
    }

    /// Tombstones the title in the bag that currently supplies it.
    pub fn remove(&self, roles: &RoleSet, recipe: &str, title: &str) -> Result<Access<Version>> {
        match self.read(roles, recipe, title, Permission::Write)? {
            Access::Granted(resolved) => {
                let version = self.bags.delete_in(&resolved.bag, title)?;
                Ok(Access::Granted(version))
            }
            Access::NotFound => Ok(Access::NotFound),
            Access::Denied(denial) => Ok(Access::Denied(denial)),
        }
    }

    fn walk<F>(&self, stack: &[StackLayer], title: &str, mut gate: F) -> Result<Access<Resolved>>
    where
        F: FnMut(&StackLayer) -> Result<Option<Denial>>,
    {
        for entry in stack.iter().rev() {
            if let Some(denial) = gate(entry)? {
                return Ok(Access::Denied(denial));
            }

            match self.bags.get_in(&entry.bag, title)? {
                Some(tiddler) if tiddler.is_deleted => {
                    tracing::debug!(bag = %entry.bag.name, title, "title shadowed by tombstone");
                    return Ok(Access::NotFound);
                }
                Some(tiddler) => {
                    tracing::debug!(bag = %entry.bag.name, title, version = %tiddler.version, "resolved");
                    return Ok(Access::Granted(Resolved {
                        bag: entry.bag.clone(),
                        layer: entry.layer.clone(),
                        tiddler,
                    }));
                }
                None => continue,
            }
        }

        Ok(Access::NotFound)
    }

    fn merge_titles<F>(
        &self,
        stack: &[StackLayer],
        mut gate: F,
    ) -> Result<Access<Vec<VisibleTitle>>>
    where
        F: FnMut(&StackLayer) -> Result<Option<Denial>>,
    {
        // First row seen per title wins; `None` marks a shadowing tombstone.
        let mut merged: BTreeMap<String, Option<VisibleTitle>> = BTreeMap::new();

        for entry in stack.iter().rev() {
            if let Some(denial) = gate(entry)? {
                return Ok(Access::Denied(denial));
            }

            for head in self.bags.list_heads_in(&entry.bag)? {
                merged.entry(head.title.clone()).or_insert_with(|| {
                    (!head.is_deleted).then(|| VisibleTitle {
                        title: head.title,
                        bag: entry.bag.name.clone(),
                        version: head.version,
                    })
                });
            }
        }

        Ok(Access::Granted(merged.into_values().flatten().collect()))
    }
}
