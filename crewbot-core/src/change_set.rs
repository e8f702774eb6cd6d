use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File edits to commit: repository-relative path to full UTF-8 content.
///
/// Paths are unique and iterate in sorted order, so the blob stage of the
/// commit transaction is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, String>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the content for `path`.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.0.insert(path.into(), content.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(path, content)| (path.as_str(), content.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(path, content)| (path.into(), content.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterates_in_path_order() {
        let changes = ChangeSet::new()
            .with_file("src/z.rs", "z")
            .with_file("README.md", "readme")
            .with_file("src/a.rs", "a");

        let paths: Vec<&str> = changes.iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["README.md", "src/a.rs", "src/z.rs"]);
    }

    #[test]
    fn test_same_path_keeps_last_content() {
        let changes: ChangeSet = [("a.txt", "one"), ("a.txt", "two")].into_iter().collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.iter().next(), Some(("a.txt", "two")));
    }
}
