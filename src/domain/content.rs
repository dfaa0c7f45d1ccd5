//! Content items as the invalidation side sees them.

use std::collections::HashMap;
use std::sync::RwLock;

use time::Date;

use crate::cache::lock::{rw_read, rw_write};

const SOURCE: &str = "domain::content";

/// Post type of regular blog posts; only these appear on the front and blog pages.
pub const POST_CLASS: &str = "post";
/// Post type of static pages.
pub const PAGE_CLASS: &str = "page";

/// A term of a custom taxonomy attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaxonomyTerm {
    pub taxonomy: String,
    pub term_id: u64,
}

/// Everything about an item that decides which aggregate pages list it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub id: u64,
    pub post_type: String,
    pub author_id: u64,
    pub published_on: Date,
    pub categories: Vec<u64>,
    pub tags: Vec<u64>,
    pub terms: Vec<TaxonomyTerm>,
}

impl ContentItem {
    pub fn is_post_class(&self) -> bool {
        self.post_type == POST_CLASS
    }

    pub fn is_static_page(&self) -> bool {
        self.post_type == PAGE_CLASS
    }
}

/// The site's knowledge of how content is filed.
pub trait ContentTaxonomy: Send + Sync {
    /// Look up an item by id; `None` when the host no longer knows it.
    fn describe(&self, item_id: u64) -> Option<ContentItem>;
}

/// Map-backed taxonomy for embedders that push item metadata themselves.
#[derive(Default)]
pub struct InMemoryTaxonomy {
    items: RwLock<HashMap<u64, ContentItem>>,
}

impl InMemoryTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, item: ContentItem) {
        rw_write(&self.items, SOURCE, "upsert").insert(item.id, item);
    }

    pub fn remove(&self, item_id: u64) -> Option<ContentItem> {
        rw_write(&self.items, SOURCE, "remove").remove(&item_id)
    }
}

impl ContentTaxonomy for InMemoryTaxonomy {
    fn describe(&self, item_id: u64) -> Option<ContentItem> {
        rw_read(&self.items, SOURCE, "describe")
            .get(&item_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn item(id: u64, post_type: &str) -> ContentItem {
        ContentItem {
            id,
            post_type: post_type.to_string(),
            author_id: 1,
            published_on: date!(2024 - 03 - 09),
            categories: vec![],
            tags: vec![],
            terms: vec![],
        }
    }

    #[test]
    fn classes_follow_post_type() {
        assert!(item(1, "post").is_post_class());
        assert!(!item(1, "book").is_post_class());
        assert!(item(2, "page").is_static_page());
    }

    #[test]
    fn in_memory_taxonomy_roundtrip() {
        let taxonomy = InMemoryTaxonomy::new();
        assert!(taxonomy.describe(7).is_none());

        taxonomy.upsert(item(7, "post"));
        assert_eq!(taxonomy.describe(7).map(|i| i.id), Some(7));

        taxonomy.remove(7);
        assert!(taxonomy.describe(7).is_none());
    }
}
