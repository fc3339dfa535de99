use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{Store, TiddlerWrite};
use crate::types::{AttachmentRef, Bag, Fields, Tiddler, TiddlerHead, Version};
use crate::validation::{validate_bag_name, validate_title};

/// Tiddler reads and writes within a single bag.
#[derive(Clone)]
pub struct BagService {
    store: Arc<dyn Store>,
}

impl BagService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn create(
        &self,
        name: &str,
        description: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Bag> {
        validate_bag_name(name)?;
        let bag = Bag {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            owner: owner.map(str::to_string),
            created_at: Utc::now(),
        };
        self.store.create_bag(&bag)?;
        tracing::info!(bag = %bag.name, "created bag");
        Ok(bag)
    }

    /// Looks up a bag by name.
    pub fn bag(&self, name: &str) -> Result<Bag> {
        self.store.get_bag_by_name(name)?.ok_or(Error::NotFound)
    }

    /// Live tiddler, or `None` when absent or tombstoned.
    pub fn get(&self, bag: &str, title: &str) -> Result<Option<Tiddler>> {
        let bag = self.bag(bag)?;
        Ok(self.get_in(&bag, title)?.filter(|t| !t.is_deleted))
    }

    /// Like `get`, but tombstones are returned too.
    pub fn get_including_deleted(&self, bag: &str, title: &str) -> Result<Option<Tiddler>> {
        let bag = self.bag(bag)?;
        self.get_in(&bag, title)
    }

    pub fn put(
        &self,
        bag: &str,
        title: &str,
        fields: &Fields,
        attachment: Option<&AttachmentRef>,
    ) -> Result<Version> {
        let bag = self.bag(bag)?;
        self.put_in(&bag, title, fields, attachment, None)
    }

    /// Writes only if the slot currently holds `expected`; otherwise
    /// `Error::Conflict`.
    pub fn put_expecting(
        &self,
        bag: &str,
        title: &str,
        fields: &Fields,
        attachment: Option<&AttachmentRef>,
        expected: Version,
    ) -> Result<Version> {
        let bag = self.bag(bag)?;
        self.put_in(&bag, title, fields, attachment, Some(expected))
    }

    /// Tombstones a live tiddler. Absent or already deleted titles are
    /// `Error::NotFound`.
    pub fn delete(&self, bag: &str, title: &str) -> Result<Version> {
        let bag = self.bag(bag)?;
        self.delete_in(&bag, title)
    }

    /// Live tiddlers of the bag, ordered by title.
    pub fn list(&self, bag: &str) -> Result<Vec<TiddlerHead>> {
        let bag = self.bag(bag)?;
        let mut heads = self.list_heads_in(&bag)?;
        heads.retain(|h| !h.is_deleted);
        Ok(heads)
    }

    pub(crate) fn get_in(&self, bag: &Bag, title: &str) -> Result<Option<Tiddler>> {
        self.store.get_tiddler(&bag.id, title)
    }

    /// Every slot in the bag, tombstones included.
    pub(crate) fn list_heads_in(&self, bag: &Bag) -> Result<Vec<TiddlerHead>> {
        self.store.list_tiddler_heads(&bag.id)
    }

    /// Slots in any of `bags` written after `since`, in version order.
    pub(crate) fn changes_in(&self, bags: &[&Bag], since: Version) -> Result<Vec<TiddlerHead>> {
        let ids: Vec<String> = bags.iter().map(|bag| bag.id.clone()).collect();
        self.store.list_changes(&ids, since)
    }

    pub(crate) fn put_in(
        &self,
        bag: &Bag,
        title: &str,
        fields: &Fields,
        attachment: Option<&AttachmentRef>,
        expected: Option<Version>,
    ) -> Result<Version> {
        validate_title(title)?;

        if let Some(hash) = attachment {
            if self.store.get_attachment(hash)?.is_none() {
                return Err(Error::NotFound);
            }
        }

        let version = self.store.write_tiddler(&TiddlerWrite {
            bag_id: &bag.id,
            title,
            fields,
            attachment,
            deleted: false,
            require_live: false,
            expected,
        })?;

        tracing::debug!(bag = %bag.name, title, %version, "wrote tiddler");
        Ok(version)
    }

    pub(crate) fn delete_in(&self, bag: &Bag, title: &str) -> Result<Version> {
        let empty = Fields::new();
        let version = self.store.write_tiddler(&TiddlerWrite {
            bag_id: &bag.id,
            title,
            fields: &empty,
            attachment: None,
            deleted: true,
            require_live: true,
            expected: None,
        })?;

        tracing::debug!(bag = %bag.name, title, %version, "tombstoned tiddler");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::Attachment;

    fn service() -> BagService {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        let service = BagService::new(Arc::new(store));
        service.create("core", Some("shipped content"), None).unwrap();
        service
    }

    fn text(body: &str) -> Fields {
        Fields::from([("text".to_string(), body.to_string())])
    }

    #[test]
    fn test_identical_puts_still_advance_version() {
        let bags = service();
        let v1 = bags.put("core", "Home", &text("A"), None).unwrap();
        let v2 = bags.put("core", "Home", &text("A"), None).unwrap();
        assert!(v2 > v1);
    }

    #[test]
    fn test_delete_hides_from_get_but_keeps_tombstone() {
        let bags = service();
        let put = bags.put("core", "Home", &text("A"), None).unwrap();
        let deleted = bags.delete("core", "Home").unwrap();
        assert!(deleted > put);

        assert!(bags.get("core", "Home").unwrap().is_none());
        let tombstone = bags.get_including_deleted("core", "Home").unwrap().unwrap();
        assert!(tombstone.is_deleted);
        assert_eq!(tombstone.version, deleted);
        assert!(bags.list("core").unwrap().is_empty());
    }

    #[test]
    fn test_put_after_delete_restores() {
        let bags = service();
        bags.put("core", "Home", &text("A"), None).unwrap();
        let deleted = bags.delete("core", "Home").unwrap();
        let restored = bags.put("core", "Home", &text("B"), None).unwrap();
        assert!(restored > deleted);

        let tiddler = bags.get("core", "Home").unwrap().unwrap();
        assert_eq!(tiddler.fields.get("text").map(String::as_str), Some("B"));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let bags = service();
        assert!(matches!(bags.delete("core", "Nope"), Err(Error::NotFound)));

        bags.put("core", "Home", &text("A"), None).unwrap();
        bags.delete("core", "Home").unwrap();
        assert!(matches!(bags.delete("core", "Home"), Err(Error::NotFound)));
    }

    #[test]
    fn test_unknown_bag_is_not_found() {
        let bags = service();
        assert!(matches!(bags.get("missing", "Home"), Err(Error::NotFound)));
        assert!(matches!(
            bags.put("missing", "Home", &text("A"), None),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_put_expecting_detects_lost_update() {
        let bags = service();
        let v1 = bags.put("core", "Home", &text("A"), None).unwrap();
        let v2 = bags
            .put_expecting("core", "Home", &text("B"), None, v1)
            .unwrap();

        let result = bags.put_expecting("core", "Home", &text("C"), None, v1);
        assert!(matches!(
            result,
            Err(Error::Conflict { actual: Some(actual), .. }) if actual == v2
        ));
    }

    #[test]
    fn test_invalid_title_rejected() {
        let bags = service();
        assert!(matches!(
            bags.put("core", "  ", &text("A"), None),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_attachment_must_be_recorded() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.initialize().unwrap();
        let bags = BagService::new(store.clone());
        bags.create("files", None, None).unwrap();

        let hash = crate::attachments::digest(b"binary");
        assert!(matches!(
            bags.put("files", "logo.png", &Fields::new(), Some(&hash)),
            Err(Error::NotFound)
        ));

        store
            .record_attachment(&Attachment {
                hash: hash.clone(),
                size: 6,
                created_at: Utc::now(),
            })
            .unwrap();
        bags.put("files", "logo.png", &Fields::new(), Some(&hash))
            .unwrap();

        let tiddler = bags.get("files", "logo.png").unwrap().unwrap();
        assert_eq!(tiddler.attachment, Some(hash));
    }
}
