//! The transactional annotation store contract.
//!
//! The engine only depends on the narrow traits in this module; the durable
//! store of a real server implements them, and [`MemoryStore`](crate::memory::MemoryStore)
//! is the in-tree reference implementation used in tests.

use thiserror::Error;

/// Identifies a mailbox within one account.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MailboxId(pub u32);

/// What an annotation is attached to: one mailbox, or the account as a whole.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Scope {
    Account,
    Mailbox(MailboxId),
}

/// An annotation value as stored and as carried on the wire.
///
/// `text` selects the wire encoding (quoted string vs literal); it does not
/// restrict the bytes.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AnnotationValue {
    pub data: Vec<u8>,
    pub text: bool,
}

impl AnnotationValue {
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            text: true,
        }
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            text: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A persisted annotation row.
///
/// At most one row exists per `(scope, key)` pair. A delete removes the row;
/// no "empty marker" value is ever stored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Annotation {
    pub scope: Scope,
    pub key: String,
    pub value: AnnotationValue,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StoreError {
    #[error("store failure: {0}")]
    Internal(String),
}

/// A store that can open transactions over one account's annotations.
pub trait AnnotationStore {
    type Read<'a>: ReadTx
    where
        Self: 'a;
    type Write<'a>: WriteTx
    where
        Self: 'a;

    fn begin_read(&self) -> Result<Self::Read<'_>, StoreError>;

    fn begin_write(&mut self) -> Result<Self::Write<'_>, StoreError>;
}

/// Read access within one transaction.
pub trait ReadTx {
    /// Look up a mailbox by name. `Ok(None)` means the mailbox does not
    /// exist; per the TRYCREATE contract the caller reports that to the
    /// client rather than treating it as a store failure.
    fn mailbox(&self, name: &str) -> Result<Option<MailboxId>, StoreError>;

    /// All annotations in one scope, in stable key order.
    fn scan_scope(&self, scope: Scope) -> Result<Vec<Annotation>, StoreError>;
}

/// Mutation access within one transaction.
///
/// Mutations are only visible through this transaction until [`WriteTx::commit`];
/// dropping the transaction without committing rolls everything back.
pub trait WriteTx: ReadTx {
    /// Point lookup on the `(scope, key)` uniqueness pair.
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Annotation>, StoreError>;

    fn insert(&mut self, annotation: Annotation) -> Result<(), StoreError>;

    fn update(&mut self, annotation: Annotation) -> Result<(), StoreError>;

    /// Delete the row if present. Returns whether a row was removed;
    /// deleting an absent key is not an error.
    fn delete(&mut self, scope: Scope, key: &str) -> Result<bool, StoreError>;

    /// Every annotation of the account, across all scopes, as staged in this
    /// transaction. This is the input to the quota check and must reflect
    /// all mutations applied so far.
    fn scan_all(&self) -> Result<Vec<Annotation>, StoreError>;

    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}
