//! The parsed command model.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::{
    entry::{Depth, Entry},
    store::AnnotationValue,
};

/// A command tag.
///
/// "A tag consists of one or more non-special characters" and must not
/// contain `+` (that would collide with continuation requests).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Tag(pub(crate) String);

impl Tag {
    pub fn verify(value: impl AsRef<str>) -> Result<(), TagError> {
        let value = value.as_ref();

        if value.is_empty() {
            return Err(TagError::Empty);
        }

        if let Some(position) = value
            .bytes()
            .position(|b| !crate::core::indicators::is_astring_char(b) || b == b'+')
        {
            return Err(TagError::ByteNotAllowed {
                found: value.as_bytes()[position],
                position,
            });
        }

        Ok(())
    }

    pub fn inner(&self) -> &str {
        &self.0
    }

    pub(crate) fn unvalidated(inner: String) -> Self {
        #[cfg(debug_assertions)]
        Self::verify(&inner).unwrap();

        Self(inner)
    }
}

impl TryFrom<&str> for Tag {
    type Error = TagError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value)?;

        Ok(Self(value.to_owned()))
    }
}

#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum TagError {
    #[error("must not be empty")]
    Empty,
    #[error("invalid byte b'\\x{found:02x}' at index {position}")]
    ByteNotAllowed { found: u8, position: usize },
}

/// The mailbox a command targets.
///
/// The empty name addresses the account itself (server annotations). `INBOX`
/// is case-insensitive on the wire and normalized to upper case; every other
/// name is kept verbatim.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Mailbox(pub(crate) String);

impl Mailbox {
    pub fn account() -> Self {
        Self(String::new())
    }

    /// Whether this addresses the account-global scope.
    pub fn is_account(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Mailbox {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("inbox") {
            Self("INBOX".to_owned())
        } else {
            Self(value.to_owned())
        }
    }
}

impl From<String> for Mailbox {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("inbox") {
            Self("INBOX".to_owned())
        } else {
            Self(value)
        }
    }
}

/// One `entry value` pair of a SETMETADATA command.
///
/// `value: None` is the wire NIL and requests removal of the entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryValue {
    pub entry: Entry,
    pub value: Option<AnnotationValue>,
}

/// A single option as it appears on the wire, before duplicate resolution.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum GetMetadataOption {
    /// Only return values that are less than or equal in octet size to the
    /// specified limit.
    MaxSize(u32),
    /// Extend the result with entries below each requested entry name, up to
    /// the specified depth.
    Depth(Depth),
}

/// The resolved option set of a GETMETADATA command.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GetOptions {
    pub max_size: Option<u32>,
    pub depth: Depth,
}

impl GetOptions {
    /// Collapse the wire option list, rejecting repeated options.
    ///
    /// Unknown options never reach this point; the grammar already fails on
    /// them.
    pub fn resolve(options: Vec<GetMetadataOption>) -> Result<Self, OptionsError> {
        let mut max_size = None;
        let mut depth = None;

        for option in options {
            match option {
                GetMetadataOption::MaxSize(n) => {
                    if max_size.replace(n).is_some() {
                        return Err(OptionsError::DuplicateMaxSize);
                    }
                }
                GetMetadataOption::Depth(d) => {
                    if depth.replace(d).is_some() {
                        return Err(OptionsError::DuplicateDepth);
                    }
                }
            }
        }

        Ok(Self {
            max_size,
            depth: depth.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum OptionsError {
    #[error("only a single MAXSIZE option accepted")]
    DuplicateMaxSize,
    #[error("only a single DEPTH option accepted")]
    DuplicateDepth,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Command {
    pub tag: Tag,
    pub body: CommandBody,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandBody {
    GetMetadata {
        options: GetOptions,
        mailbox: Mailbox,
        /// Requested entry names, deduplicated; order carries no meaning for
        /// matching.
        entries: BTreeSet<Entry>,
    },
    SetMetadata {
        mailbox: Mailbox,
        /// At least one pair; the grammar rejects an empty list.
        entry_values: Vec<EntryValue>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_verify() {
        assert!(Tag::try_from("A1").is_ok());
        assert!(Tag::try_from("").is_err());
        assert!(Tag::try_from("A+1").is_err());
        assert!(Tag::try_from("A 1").is_err());
    }

    #[test]
    fn test_mailbox_inbox_normalization() {
        assert_eq!(Mailbox::from("inbox").as_str(), "INBOX");
        assert_eq!(Mailbox::from("InBoX").as_str(), "INBOX");
        assert_eq!(Mailbox::from("Archive").as_str(), "Archive");
        assert!(Mailbox::from("").is_account());
    }

    #[test]
    fn test_options_resolve() {
        assert_eq!(
            GetOptions::resolve(vec![]),
            Ok(GetOptions {
                max_size: None,
                depth: Depth::Null
            })
        );

        assert_eq!(
            GetOptions::resolve(vec![
                GetMetadataOption::MaxSize(10),
                GetMetadataOption::Depth(Depth::Infinity),
            ]),
            Ok(GetOptions {
                max_size: Some(10),
                depth: Depth::Infinity
            })
        );

        assert_eq!(
            GetOptions::resolve(vec![
                GetMetadataOption::MaxSize(10),
                GetMetadataOption::MaxSize(10),
            ]),
            Err(OptionsError::DuplicateMaxSize)
        );

        assert_eq!(
            GetOptions::resolve(vec![
                GetMetadataOption::Depth(Depth::One),
                GetMetadataOption::Depth(Depth::One),
            ]),
            Err(OptionsError::DuplicateDepth)
        );
    }
}
