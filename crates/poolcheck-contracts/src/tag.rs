//! Tag queries and the matching rules a pool applies to them.
//!
//! A `TagQuery` pairs an ordered list of tag names with a `TagStrategy`.
//! Every conforming pool must apply the same set relation between the
//! query's tags and an item's tags, whatever its storage looks like.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a pool relates the query's tag set to an item's tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagStrategy {
    /// Item is returned when it carries every tag of the query.
    All,
    /// Item is returned when its tag set is exactly the query's tag set:
    /// no tag outside the query, no query tag missing from the item.
    Only,
    /// Item is returned when it carries at least one tag of the query.
    One,
}

impl TagStrategy {
    /// Return true if an item tagged with `item_tags` answers a query for
    /// `query_tags` under this strategy.
    ///
    /// Duplicates and ordering in `query_tags` are irrelevant.
    pub fn matches<I, Q>(self, item_tags: I, query_tags: Q) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        Q: IntoIterator,
        Q::Item: AsRef<str>,
    {
        let item: BTreeSet<String> = item_tags.into_iter().map(|t| t.as_ref().to_string()).collect();
        let query: BTreeSet<String> = query_tags.into_iter().map(|t| t.as_ref().to_string()).collect();

        match self {
            TagStrategy::All => !query.is_empty() && query.is_subset(&item),
            TagStrategy::Only => !query.is_empty() && item == query,
            TagStrategy::One => !item.is_disjoint(&query),
        }
    }

    /// Upper-case label used in harness output (e.g. `ALL`).
    pub fn label(self) -> &'static str {
        match self {
            TagStrategy::All => "ALL",
            TagStrategy::Only => "ONLY",
            TagStrategy::One => "ONE",
        }
    }
}

impl fmt::Display for TagStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A multi-key retrieval request addressed by tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagQuery {
    /// Tag names in the order the caller supplied them.
    pub tags: Vec<String>,
    /// The matching rule to apply.
    pub strategy: TagStrategy,
}

impl TagQuery {
    pub fn new<T: Into<String>>(tags: impl IntoIterator<Item = T>, strategy: TagStrategy) -> Self {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            strategy,
        }
    }

    /// Apply this query to an item's tag set.
    pub fn matches<I>(&self, item_tags: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.strategy.matches(item_tags, &self.tags)
    }
}
