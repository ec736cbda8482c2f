use serde::Serialize;
use std::collections::HashMap;
use url::Url;

/// Original resolved URL to new store URL, for end-to-end successes only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlMappings {
    entries: HashMap<String, String>,
}

impl UrlMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a mapping; a second insert for the same original replaces the first
    pub fn insert(&mut self, original: &Url, new_url: impl Into<String>) {
        self.entries.insert(original.as_str().to_string(), new_url.into());
    }

    /// Looks up the new URL for a resolved original
    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates mappings in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the originals ordered longest first, ties broken lexically
    ///
    /// Any prefix-sensitive consumer must walk this order so that
    /// `https://x/a/b` is considered before `https://x/a`.
    pub fn longest_first(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        keys
    }
}
