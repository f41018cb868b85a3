//! Hierarchical matching of stored annotation keys against requested entries.

use std::collections::BTreeSet;

use crate::entry::{Depth, Entry};

/// Decides which stored keys a GETMETADATA request selects.
///
/// An exact key match always selects, regardless of depth. With depth 1 the
/// direct children of a requested entry also match; with depth infinity all
/// descendants do. Children are determined by the `/` hierarchy: the matcher
/// appends a `/` to the requested entry before prefix-testing, except for the
/// entry `"/"` which already ends in its separator.
#[derive(Clone, Copy, Debug)]
pub struct EntryMatcher<'a> {
    entries: &'a BTreeSet<Entry>,
    depth: Depth,
}

impl<'a> EntryMatcher<'a> {
    pub fn new(entries: &'a BTreeSet<Entry>, depth: Depth) -> Self {
        Self { entries, depth }
    }

    pub fn matches(&self, key: &str) -> bool {
        if self.entries.contains(key) {
            return true;
        }

        if self.depth == Depth::Null {
            return false;
        }

        self.entries.iter().any(|entry| {
            let entry = entry.as_ref();

            let suffix = if entry == "/" {
                match key.strip_prefix('/') {
                    Some(suffix) => suffix,
                    None => return false,
                }
            } else {
                match key.strip_prefix(entry).and_then(|s| s.strip_prefix('/')) {
                    Some(suffix) => suffix,
                    None => return false,
                }
            };

            match self.depth {
                Depth::Null => false,
                Depth::One => !suffix.contains('/'),
                Depth::Infinity => true,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(names: &[&str]) -> BTreeSet<Entry> {
        names
            .iter()
            .map(|name| Entry::try_from(*name).unwrap())
            .collect()
    }

    #[test]
    fn test_depth_null_is_exact() {
        let entries = entries(&["/private/comment"]);
        let matcher = EntryMatcher::new(&entries, Depth::Null);

        assert!(matcher.matches("/private/comment"));
        assert!(!matcher.matches("/private/comment/child"));
        assert!(!matcher.matches("/private/commentary"));
        assert!(!matcher.matches("/private"));
    }

    #[test]
    fn test_depth_one_matches_direct_children() {
        let entries = entries(&["/private/filters"]);
        let matcher = EntryMatcher::new(&entries, Depth::One);

        assert!(matcher.matches("/private/filters"));
        assert!(matcher.matches("/private/filters/values"));
        assert!(!matcher.matches("/private/filters/values/nested"));
        // A sibling sharing the name as a string prefix is not a child.
        assert!(!matcher.matches("/private/filtersextra"));
    }

    #[test]
    fn test_depth_infinity_matches_descendants() {
        let entries = entries(&["/private/filters"]);
        let matcher = EntryMatcher::new(&entries, Depth::Infinity);

        assert!(matcher.matches("/private/filters"));
        assert!(matcher.matches("/private/filters/values/nested/deep"));
        assert!(!matcher.matches("/private/other"));
    }

    #[test]
    fn test_root_entry_does_not_double_separator() {
        let entries = entries(&["/"]);

        let matcher = EntryMatcher::new(&entries, Depth::One);
        assert!(matcher.matches("/private"));
        assert!(!matcher.matches("/private/comment"));

        let matcher = EntryMatcher::new(&entries, Depth::Infinity);
        assert!(matcher.matches("/private/comment"));
    }

    #[test]
    fn test_multiple_requested_entries() {
        let entries = entries(&["/private/a", "/private/b"]);
        let matcher = EntryMatcher::new(&entries, Depth::One);

        assert!(matcher.matches("/private/a/x"));
        assert!(matcher.matches("/private/b/y"));
        assert!(!matcher.matches("/private/c/z"));
    }
}
