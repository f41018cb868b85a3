//! Annotation entry names and their validation.

use std::borrow::Borrow;

use thiserror::Error;

/// Slash-delimited path naming an annotation, e.g. `/private/comment`.
///
/// Entry names are case-sensitive and are stored without normalization.
/// Construction only requires a non-empty name; the private-namespace rules
/// enforced on mutation live in [`Entry::validate_private`].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Entry(String);

impl Entry {
    pub fn verify(value: impl AsRef<str>) -> Result<(), EntryError> {
        if value.as_ref().is_empty() {
            return Err(EntryError::Empty);
        }

        Ok(())
    }

    /// Enforce the rules for entry names that are about to be stored.
    ///
    /// Only `/private/*` names are accepted (there is no access model for
    /// shared annotations), and names in the `/private/vendor` subtree must
    /// carry a vendor token and at least one sub-key. Nothing else is
    /// restricted: arbitrary segment names, lengths, and repeated slashes
    /// pass through.
    pub fn validate_private(&self) -> Result<(), EntryError> {
        if !self.0.starts_with("/private/") {
            return Err(EntryError::Namespace);
        }

        if self.0 == "/private/vendor" || self.0.starts_with("/private/vendor/") {
            if self.0[1..].splitn(4, '/').count() < 4 {
                return Err(EntryError::VendorDepth);
            }
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Construct from a name that is known to be non-empty, e.g. a stored key.
    pub(crate) fn unvalidated(inner: String) -> Self {
        #[cfg(debug_assertions)]
        Self::verify(&inner).unwrap();

        Self(inner)
    }
}

impl TryFrom<&str> for Entry {
    type Error = EntryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value)?;

        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Entry {
    type Error = EntryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::verify(&value)?;

        Ok(Self(value))
    }
}

impl AsRef<str> for Entry {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Entry {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
pub enum EntryError {
    #[error("entry name must not be empty")]
    Empty,
    #[error("only /private/* entry names allowed")]
    Namespace,
    #[error("entry names starting with /private/vendor must have at least 4 components")]
    VendorDepth,
}

/// How many hierarchy levels below a requested entry name also match.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Depth {
    /// No entries below the specified entry are returned.
    ///
    /// This is the behavior when no DEPTH option is given at all.
    #[default]
    Null,
    /// Only entries immediately below the specified entry are returned.
    One,
    /// All entries below the specified entry are returned.
    Infinity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_verify() {
        assert_eq!(Entry::try_from(""), Err(EntryError::Empty));
        assert!(Entry::try_from("/private/comment").is_ok());
        // Construction does not police the namespace.
        assert!(Entry::try_from("/shared/comment").is_ok());
    }

    #[test]
    fn test_validate_private_namespace() {
        let tests = [
            ("/private/comment", Ok(())),
            ("/private/x", Ok(())),
            ("/shared/comment", Err(EntryError::Namespace)),
            ("private/comment", Err(EntryError::Namespace)),
            ("/PRIVATE/comment", Err(EntryError::Namespace)),
            ("/other", Err(EntryError::Namespace)),
        ];

        for (name, expected) in tests {
            let entry = Entry::try_from(name).unwrap();
            assert_eq!(entry.validate_private(), expected, "{name}");
        }
    }

    #[test]
    fn test_validate_private_vendor_depth() {
        let tests = [
            ("/private/vendor", Err(EntryError::VendorDepth)),
            ("/private/vendor/acme", Err(EntryError::VendorDepth)),
            ("/private/vendor/acme/", Ok(())),
            ("/private/vendor/acme/comment", Ok(())),
            ("/private/vendor/acme/a/b/c", Ok(())),
            // Not in the vendor subtree.
            ("/private/vendors", Ok(())),
        ];

        for (name, expected) in tests {
            let entry = Entry::try_from(name).unwrap();
            assert_eq!(entry.validate_private(), expected, "{name}");
        }
    }
}
