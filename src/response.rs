//! Server responses for the metadata commands.

use crate::command::{EntryValue, Mailbox, Tag};

/// A response code carried inside `[` and `]` in a status response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Code {
    /// `METADATA LONGENTRIES <n>`
    ///
    /// Sent in an untagged OK when MAXSIZE excluded at least one value;
    /// `n` is the size of the largest excluded value.
    MetadataLongEntries(u32),

    /// `METADATA MAXSIZE <n>`
    ///
    /// The account-wide total size ceiling for annotations would be
    /// exceeded; `n` names that ceiling so the client can see the limit.
    MetadataMaxSize(u32),

    /// `METADATA TOOMANY`
    ///
    /// The annotation count limit for the account would be exceeded.
    MetadataTooMany,

    /// `TRYCREATE`
    ///
    /// The mailbox does not exist but could be created.
    TryCreate,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusKind {
    Ok,
    No,
    Bad,
}

/// A tagged or untagged status line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Status {
    /// `None` encodes as the `*` token.
    pub tag: Option<Tag>,
    pub kind: StatusKind,
    pub code: Option<Code>,
    pub text: String,
}

impl Status {
    pub fn ok(tag: Tag, text: impl Into<String>) -> Self {
        Self {
            tag: Some(tag),
            kind: StatusKind::Ok,
            code: None,
            text: text.into(),
        }
    }

    pub fn ok_with_code(tag: Tag, code: Code, text: impl Into<String>) -> Self {
        Self {
            tag: Some(tag),
            kind: StatusKind::Ok,
            code: Some(code),
            text: text.into(),
        }
    }

    pub fn no(tag: Tag, code: Option<Code>, text: impl Into<String>) -> Self {
        Self {
            tag: Some(tag),
            kind: StatusKind::No,
            code,
            text: text.into(),
        }
    }

    pub fn bad(tag: Option<Tag>, text: impl Into<String>) -> Self {
        Self {
            tag,
            kind: StatusKind::Bad,
            code: None,
            text: text.into(),
        }
    }
}

/// An untagged data response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Data {
    /// `* METADATA <mailbox> (<entry> <value> ...)`
    Metadata {
        mailbox: Mailbox,
        entry_values: Vec<EntryValue>,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    Data(Data),
    Status(Status),
    /// `+ <text>`, requesting the remainder of a synchronizing literal.
    CommandContinuationRequest { text: String },
}

impl From<Data> for Response {
    fn from(value: Data) -> Self {
        Self::Data(value)
    }
}

impl From<Status> for Response {
    fn from(value: Status) -> Self {
        Self::Status(value)
    }
}
