//! Reserved words that can never be used as generated aliases.

use std::collections::HashSet;
use std::path::Path;

use crate::error::QueryResult;

const BUILTIN: &str = include_str!("reserved_words.txt");

/// Immutable, case-insensitive reserved-word registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedWords {
    words: HashSet<String>,
}

impl Default for ReservedWords {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReservedWords {
    /// The built-in SQL keyword list.
    pub fn builtin() -> Self {
        Self::from_words(BUILTIN.lines())
    }

    pub fn from_words<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            words: words
                .into_iter()
                .map(str::trim)
                .filter(|w| !w.is_empty() && !w.starts_with('#'))
                .map(str::to_uppercase)
                .collect(),
        }
    }

    /// Built-ins plus additional words.
    pub fn with_extra<'a>(mut self, extra: impl IntoIterator<Item = &'a str>) -> Self {
        self.words.extend(Self::from_words(extra).words);
        self
    }

    /// Built-ins plus one word per line of `path`.
    pub fn with_file(self, path: &Path) -> QueryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.with_extra(content.lines()))
    }

    pub fn is_reserved(&self, word: &str) -> bool {
        self.words.contains(&word.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        let words = ReservedWords::builtin();
        assert!(words.is_reserved("select"));
        assert!(words.is_reserved("Order"));
        assert!(!words.is_reserved("Person"));
    }

    #[test]
    fn test_extra_words() {
        let words = ReservedWords::builtin().with_extra(["person", "", "# comment"]);
        assert!(words.is_reserved("PERSON"));
        assert!(!words.is_reserved("# comment"));
    }
}
