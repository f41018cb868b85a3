//! Account-wide limits on annotation count and total size.

use thiserror::Error;

use crate::store::Annotation;

/// Limits applied to the whole account, mailbox and account annotations
/// combined. There is no per-entry size limit, only the total.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MetadataLimits {
    pub max_keys: usize,
    pub max_total_size: usize,
}

impl Default for MetadataLimits {
    fn default() -> Self {
        Self {
            max_keys: 1000,
            max_total_size: 1000 * 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum QuotaError {
    #[error("too many metadata entries, {allowed} allowed in total")]
    TooMany { allowed: usize },
    #[error("metadata entry values too large, total maximum size is {limit} bytes")]
    TotalSize { limit: usize },
}

impl MetadataLimits {
    /// Walk every annotation of the account after a mutation batch and fail
    /// if a limit is exceeded. Size accounts both key and value bytes. When a
    /// single row trips both limits, the count check wins.
    pub fn check<'a>(
        &self,
        annotations: impl IntoIterator<Item = &'a Annotation>,
    ) -> Result<(), QuotaError> {
        let mut count = 0usize;
        let mut size = 0usize;

        for annotation in annotations {
            count += 1;
            if count > self.max_keys {
                return Err(QuotaError::TooMany {
                    allowed: self.max_keys,
                });
            }

            size += annotation.key.len() + annotation.value.len();
            if size > self.max_total_size {
                return Err(QuotaError::TotalSize {
                    limit: self.max_total_size,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AnnotationValue, Scope};

    fn annotation(key: &str, value: &[u8]) -> Annotation {
        Annotation {
            scope: Scope::Account,
            key: key.to_owned(),
            value: AnnotationValue::text(value.to_vec()),
        }
    }

    #[test]
    fn test_within_limits() {
        let limits = MetadataLimits::default();
        let rows = vec![
            annotation("/private/a", b"xx"),
            annotation("/private/b", b"yy"),
        ];

        assert_eq!(limits.check(&rows), Ok(()));
    }

    #[test]
    fn test_too_many_keys() {
        let limits = MetadataLimits {
            max_keys: 2,
            max_total_size: 1000,
        };
        let rows = vec![
            annotation("/private/a", b""),
            annotation("/private/b", b""),
            annotation("/private/c", b""),
        ];

        assert_eq!(limits.check(&rows), Err(QuotaError::TooMany { allowed: 2 }));
    }

    #[test]
    fn test_total_size_includes_keys() {
        let limits = MetadataLimits {
            max_keys: 100,
            max_total_size: 24,
        };

        // 10 bytes key + 2 bytes value, twice: 24 bytes total is allowed.
        let rows = vec![
            annotation("/private/a", b"xx"),
            annotation("/private/b", b"yy"),
        ];
        assert_eq!(limits.check(&rows), Ok(()));

        // One more value byte trips the limit.
        let rows = vec![
            annotation("/private/a", b"xx"),
            annotation("/private/b", b"yyy"),
        ];
        assert_eq!(limits.check(&rows), Err(QuotaError::TotalSize { limit: 24 }));
    }

    #[test]
    fn test_count_check_wins_over_size() {
        let limits = MetadataLimits {
            max_keys: 1,
            max_total_size: 5,
        };
        let rows = vec![
            annotation("/private/a", b"xxxxxxxx"),
            annotation("/private/b", b"xxxxxxxx"),
        ];

        assert_eq!(limits.check(&rows), Err(QuotaError::TooMany { allowed: 1 }));
    }
}
