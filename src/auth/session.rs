use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{RoleSet, Session};

/// Who a session belongs to and which roles they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub roles: RoleSet,
}

/// Resolves an opaque session key to an identity.
///
/// Implementations return `Error::InvalidSession` for unknown or expired
/// keys and reserve other errors for infrastructure failures.
pub trait SessionAuth: Send + Sync {
    fn authenticate(&self, session_key: &str) -> Result<Identity>;
}

/// Session lookup against the `sessions` and `user_roles` tables.
pub struct StoreSessionAuth {
    store: Arc<dyn Store>,
    ttl: Option<Duration>,
}

impl StoreSessionAuth {
    pub fn new(store: Arc<dyn Store>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    fn is_expired(&self, session: &Session) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => session.last_accessed + ttl < Utc::now(),
            Err(_) => false,
        }
    }
}

impl SessionAuth for StoreSessionAuth {
    fn authenticate(&self, session_key: &str) -> Result<Identity> {
        let session = self
            .store
            .get_session_by_key(session_key)?
            .ok_or(Error::InvalidSession)?;

        if self.is_expired(&session) {
            return Err(Error::InvalidSession);
        }

        if let Err(e) = self.store.touch_session(&session.id) {
            tracing::warn!("Failed to update session last_accessed: {e}");
        }

        let roles = self
            .store
            .list_user_role_ids(&session.user_id)?
            .into_iter()
            .collect();

        Ok(Identity {
            user_id: session.user_id,
            roles,
        })
    }
}

/// Role set for an optional session key.
///
/// Anonymous callers and invalid or expired sessions get the empty role set,
/// which no ACL row matches. Storage failures still propagate.
pub fn roles_for_session(auth: &dyn SessionAuth, session_key: Option<&str>) -> Result<RoleSet> {
    let Some(key) = session_key else {
        return Ok(RoleSet::new());
    };

    match auth.authenticate(key) {
        Ok(identity) => Ok(identity.roles),
        Err(Error::InvalidSession) => {
            tracing::warn!("Rejected invalid or expired session; continuing with no roles");
            Ok(RoleSet::new())
        }
        Err(e) => Err(e),
    }
}

/// Creates a session for `user_id` and returns it with its raw key.
pub fn open_session(store: &dyn Store, user_id: &str) -> Result<(Session, String)> {
    let key = Uuid::new_v4().simple().to_string();
    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        session_key: Some(key.clone()),
        created_at: now,
        last_accessed: now,
    };

    store.create_session(&session)?;
    store.update_user_last_login(user_id)?;

    Ok((session, key))
}
