mod acl;
mod bag;
mod cursor;
mod recipe;
mod resolve;

pub use acl::{AclEngine, AclTarget, Denial, DeniedTarget};
pub use bag::BagService;
pub use cursor::{Change, ChangeCursor, ChangeSet};
pub use recipe::{ModulePlan, RecipeIndex, sort_stack};
pub use resolve::{Access, ResolutionEngine, Resolved, VisibleTitle};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::attachments::AttachmentStorage;
use crate::auth::StoreSessionAuth;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::store::{SqliteStore, Store};
use crate::types::{Attachment, AttachmentRef, Role};
use crate::validation::validate_role_name;

/// The services of the engine wired over one store.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    attachments: Arc<AttachmentStorage>,
    session_ttl: Option<Duration>,
    bags: BagService,
    recipes: RecipeIndex,
    acl: AclEngine,
    resolver: ResolutionEngine,
    cursor: ChangeCursor,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, attachments_dir: &Path) -> Self {
        let bags = BagService::new(store.clone());
        let recipes = RecipeIndex::new(store.clone());
        let acl = AclEngine::new(store.clone());
        let resolver = ResolutionEngine::new(recipes.clone(), bags.clone(), acl.clone());
        let cursor = ChangeCursor::new(bags.clone(), recipes.clone(), acl.clone());

        Self {
            store,
            attachments: Arc::new(AttachmentStorage::new(attachments_dir)),
            session_ttl: None,
            bags,
            recipes,
            acl,
            resolver,
            cursor,
        }
    }

    /// Opens (creating if needed) the database and attachment directory
    /// under `config.data_dir`.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(config.attachments_dir())?;

        let store = SqliteStore::new(config.db_path())?;
        store.initialize()?;
        tracing::info!(db = %config.db_path().display(), "opened store");

        let mut engine = Self::new(Arc::new(store), &config.attachments_dir());
        engine.session_ttl = config.session_ttl();
        Ok(engine)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn bags(&self) -> &BagService {
        &self.bags
    }

    pub fn recipes(&self) -> &RecipeIndex {
        &self.recipes
    }

    pub fn acl(&self) -> &AclEngine {
        &self.acl
    }

    pub fn resolver(&self) -> &ResolutionEngine {
        &self.resolver
    }

    pub fn cursor(&self) -> &ChangeCursor {
        &self.cursor
    }

    pub fn attachments(&self) -> &AttachmentStorage {
        &self.attachments
    }

    /// Session authenticator over this engine's store, honouring the
    /// configured session lifetime.
    pub fn session_auth(&self) -> StoreSessionAuth {
        StoreSessionAuth::new(self.store.clone(), self.session_ttl)
    }

    pub fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role> {
        validate_role_name(name)?;
        let role = Role {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        self.store.create_role(&role)?;
        tracing::info!(role = %role.name, "created role");
        Ok(role)
    }

    pub fn role(&self, name: &str) -> Result<Role> {
        self.store.get_role_by_name(name)?.ok_or(Error::NotFound)
    }

    /// Writes `data` to attachment storage and records it so tiddlers may
    /// reference it.
    pub async fn store_attachment(&self, data: &[u8]) -> Result<AttachmentRef> {
        let hash = self.attachments.put(data).await?;
        self.store.record_attachment(&Attachment {
            hash: hash.clone(),
            size: data.len() as i64,
            created_at: Utc::now(),
        })?;
        Ok(hash)
    }

    pub async fn read_attachment(&self, hash: &AttachmentRef) -> Result<Vec<u8>> {
        if self.store.get_attachment(hash)?.is_none() {
            return Err(Error::NotFound);
        }
        Ok(self.attachments.get(hash).await?)
    }
}
