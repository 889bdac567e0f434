//! Content-derived line-item identity.
//!
//! A line item's identity is a SHA-256 digest over the canonical JSON
//! encoding of its three identity-bearing fields (category, selector,
//! description). The encoding serializes the field names in sorted order,
//! so the digest never depends on input ordering. Two items with identical
//! fields collide to the same id; that is deliberate deduplication, not a
//! defect.
//!
//! The estimate-ingestion path reuses the digest but keeps colliding items
//! apart with a suffix counter (see [`suffix_duplicates`]).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Stable identity of a line item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wraps a caller-supplied identity verbatim.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derives the identity of an item from its content.
    ///
    /// Deterministic: equal field triples always produce the same id.
    #[must_use]
    pub fn derive(category: &str, selector: &str, description: &str) -> Self {
        let canonical = serde_json::json!({
            "category": category,
            "selector": selector,
            "description": description,
        })
        .to_string();
        let digest = Sha256::digest(canonical.as_bytes());
        Self(hex::encode(digest))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}_{n}", self.0))
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keeps colliding ids apart within one list.
///
/// The first occurrence of an id stays bare; every later occurrence gets a
/// `_1`, `_2`, ... suffix in encounter order, so all ids end up distinct
/// while remaining traceable to their content hash.
#[must_use]
pub fn suffix_duplicates(ids: Vec<ItemId>) -> Vec<ItemId> {
    let mut seen: HashMap<ItemId, usize> = HashMap::new();
    ids.into_iter()
        .map(|id| {
            let count = seen.entry(id.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                id
            } else {
                id.with_suffix(*count - 1)
            }
        })
        .collect()
}
