//! In-memory reference implementation of the store traits.
//!
//! Mutations are staged on a copy of the annotation map; dropping the write
//! transaction without committing discards them. Suitable for tests and as a
//! template for durable implementations.

use std::collections::BTreeMap;

use crate::store::{
    Annotation, AnnotationStore, AnnotationValue, MailboxId, ReadTx, Scope, StoreError, WriteTx,
};

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    mailboxes: BTreeMap<String, MailboxId>,
    next_mailbox_id: u32,
    annotations: BTreeMap<(Scope, String), AnnotationValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a mailbox. Mailbox creation is not part of the metadata
    /// commands; a missing mailbox is reported with TRYCREATE instead.
    pub fn add_mailbox(&mut self, name: impl Into<String>) -> MailboxId {
        let id = MailboxId(self.next_mailbox_id + 1);
        self.next_mailbox_id += 1;
        self.mailboxes.insert(name.into(), id);
        id
    }
}

fn rows(map: &BTreeMap<(Scope, String), AnnotationValue>) -> Vec<Annotation> {
    map.iter()
        .map(|((scope, key), value)| Annotation {
            scope: *scope,
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

impl AnnotationStore for MemoryStore {
    type Read<'a> = MemoryRead<'a>;
    type Write<'a> = MemoryWrite<'a>;

    fn begin_read(&self) -> Result<Self::Read<'_>, StoreError> {
        Ok(MemoryRead { store: self })
    }

    fn begin_write(&mut self) -> Result<Self::Write<'_>, StoreError> {
        let staged = self.annotations.clone();
        Ok(MemoryWrite {
            store: self,
            staged,
        })
    }
}

#[derive(Debug)]
pub struct MemoryRead<'a> {
    store: &'a MemoryStore,
}

impl ReadTx for MemoryRead<'_> {
    fn mailbox(&self, name: &str) -> Result<Option<MailboxId>, StoreError> {
        Ok(self.store.mailboxes.get(name).copied())
    }

    fn scan_scope(&self, scope: Scope) -> Result<Vec<Annotation>, StoreError> {
        Ok(rows(&self.store.annotations)
            .into_iter()
            .filter(|a| a.scope == scope)
            .collect())
    }
}

#[derive(Debug)]
pub struct MemoryWrite<'a> {
    store: &'a mut MemoryStore,
    staged: BTreeMap<(Scope, String), AnnotationValue>,
}

impl ReadTx for MemoryWrite<'_> {
    fn mailbox(&self, name: &str) -> Result<Option<MailboxId>, StoreError> {
        Ok(self.store.mailboxes.get(name).copied())
    }

    fn scan_scope(&self, scope: Scope) -> Result<Vec<Annotation>, StoreError> {
        Ok(rows(&self.staged)
            .into_iter()
            .filter(|a| a.scope == scope)
            .collect())
    }
}

impl WriteTx for MemoryWrite<'_> {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Annotation>, StoreError> {
        Ok(self
            .staged
            .get(&(scope, key.to_owned()))
            .map(|value| Annotation {
                scope,
                key: key.to_owned(),
                value: value.clone(),
            }))
    }

    fn insert(&mut self, annotation: Annotation) -> Result<(), StoreError> {
        let Annotation { scope, key, value } = annotation;
        if self.staged.insert((scope, key.clone()), value).is_some() {
            return Err(StoreError::Internal(format!(
                "insert of existing key {key:?}"
            )));
        }

        Ok(())
    }

    fn update(&mut self, annotation: Annotation) -> Result<(), StoreError> {
        let Annotation { scope, key, value } = annotation;
        if self.staged.insert((scope, key.clone()), value).is_none() {
            return Err(StoreError::Internal(format!(
                "update of missing key {key:?}"
            )));
        }

        Ok(())
    }

    fn delete(&mut self, scope: Scope, key: &str) -> Result<bool, StoreError> {
        Ok(self.staged.remove(&(scope, key.to_owned())).is_some())
    }

    fn scan_all(&self) -> Result<Vec<Annotation>, StoreError> {
        Ok(rows(&self.staged))
    }

    fn commit(self) -> Result<(), StoreError> {
        self.store.annotations = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(scope: Scope, key: &str, value: &str) -> Annotation {
        Annotation {
            scope,
            key: key.to_owned(),
            value: AnnotationValue::text(value),
        }
    }

    #[test]
    fn test_commit_makes_mutations_visible() {
        let mut store = MemoryStore::new();

        let mut tx = store.begin_write().unwrap();
        tx.insert(annotation(Scope::Account, "/private/comment", "hello"))
            .unwrap();
        tx.commit().unwrap();

        let tx = store.begin_read().unwrap();
        let rows = tx.scan_scope(Scope::Account).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "/private/comment");
    }

    #[test]
    fn test_drop_rolls_back() {
        let mut store = MemoryStore::new();

        let mut tx = store.begin_write().unwrap();
        tx.insert(annotation(Scope::Account, "/private/comment", "hello"))
            .unwrap();
        drop(tx);

        let tx = store.begin_read().unwrap();
        assert!(tx.scan_scope(Scope::Account).unwrap().is_empty());
    }

    #[test]
    fn test_scopes_are_disjoint() {
        let mut store = MemoryStore::new();
        let inbox = store.add_mailbox("INBOX");

        let mut tx = store.begin_write().unwrap();
        tx.insert(annotation(Scope::Account, "/private/comment", "account"))
            .unwrap();
        tx.insert(annotation(
            Scope::Mailbox(inbox),
            "/private/comment",
            "mailbox",
        ))
        .unwrap();
        tx.commit().unwrap();

        let tx = store.begin_read().unwrap();
        let account = tx.scan_scope(Scope::Account).unwrap();
        assert_eq!(account.len(), 1);
        assert_eq!(account[0].value, AnnotationValue::text("account"));

        let mailbox = tx.scan_scope(Scope::Mailbox(inbox)).unwrap();
        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox[0].value, AnnotationValue::text("mailbox"));
    }

    #[test]
    fn test_delete_absent_is_not_an_error() {
        let mut store = MemoryStore::new();

        let mut tx = store.begin_write().unwrap();
        assert_eq!(tx.delete(Scope::Account, "/private/none"), Ok(false));
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let mut store = MemoryStore::new();

        let mut tx = store.begin_write().unwrap();
        tx.insert(annotation(Scope::Account, "/private/a", "x"))
            .unwrap();
        assert!(tx
            .insert(annotation(Scope::Account, "/private/a", "y"))
            .is_err());
    }
}
