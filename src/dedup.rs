//! Splitting freshly parsed items into "new" and "already delivered".
//!
//! Filtering never touches the store: it returns a [`Batch`] whose keys are
//! only written by [`Batch::commit`] (or per item with [`Batch::commit_item`])
//! once delivery of the rendered output has succeeded. A failed delivery
//! therefore leaves the items eligible for the next run.

use crate::models::CandidateItem;
use crate::store::SeenSet;
use std::collections::HashSet;
use tracing::debug;

/// An item not yet present in the seen-set, with the key it will be
/// recorded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem<'a> {
    pub key: String,
    pub item: &'a CandidateItem,
}

/// New items of one feed, in feed order, with their staged store writes.
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    items: Vec<NewItem<'a>>,
    seen_at: String,
}

impl<'a> Batch<'a> {
    pub fn items(&self) -> &[NewItem<'a>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Record every staged key.
    pub fn commit(&self, store: &mut SeenSet) {
        for new in &self.items {
            store.record(new.key.clone(), self.seen_at.clone());
        }
    }

    /// Record a single staged key.
    pub fn commit_item(&self, store: &mut SeenSet, new: &NewItem<'_>) {
        store.record(new.key.clone(), self.seen_at.clone());
    }
}

/// Dedup key of a plain feed item: its permalink, or its id when the item
/// carries no link.
pub fn link_key(item: &CandidateItem) -> String {
    if item.link.is_empty() {
        item.id.clone()
    } else {
        item.link.clone()
    }
}

/// Dedup key composed of a per-source prefix and the item id.
pub fn composite_key(prefix: &str, item: &CandidateItem) -> String {
    format!("{prefix}{}", item.id)
}

/// Collect the items of `items` whose key is absent from `store`.
///
/// An item repeated within the same feed is only taken once.
///
/// # Arguments
///
/// * `items` - Feed items in document order
/// * `store` - Seen-set consulted but not modified
/// * `seen_at` - Timestamp staged for every new key
/// * `key_of` - Dedup key of one item
///
/// # Returns
///
/// A [`Batch`] of the new items in feed order. Nothing is recorded until
/// [`Batch::commit`] or [`Batch::commit_item`] is called.
pub fn filter_new<'a, F>(
    items: &'a [CandidateItem],
    store: &SeenSet,
    seen_at: &str,
    key_of: F,
) -> Batch<'a>
where
    F: Fn(&CandidateItem) -> String,
{
    let mut taken = HashSet::new();
    let mut new_items = Vec::new();

    for item in items {
        let key = key_of(item);
        if store.contains(&key) || !taken.insert(key.clone()) {
            continue;
        }
        new_items.push(NewItem { key, item });
    }

    debug!(candidates = items.len(), new = new_items.len(), "Filtered feed items");
    Batch {
        items: new_items,
        seen_at: seen_at.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(link: &str) -> CandidateItem {
        CandidateItem {
            id: format!("id-{link}"),
            title: link.to_uppercase(),
            link: link.to_string(),
            published: None,
            description: String::new(),
            enclosures: vec![],
        }
    }

    fn store() -> (tempfile::TempDir, SeenSet) {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenSet::open(&dir.path().join("seen")).unwrap();
        (dir, store)
    }

    const NOW: &str = "2026/10/14 08:00:00";

    #[test]
    fn test_seen_items_are_skipped_in_feed_order() {
        let (_dir, mut store) = store();
        store.record("a", NOW);
        let items = vec![item("a"), item("b"), item("c")];

        let batch = filter_new(&items, &store, NOW, link_key);
        let links: Vec<_> = batch.items().iter().map(|n| n.item.link.as_str()).collect();
        assert_eq!(links, ["b", "c"]);
        store.close().unwrap();
    }

    #[test]
    fn test_filter_is_idempotent_without_commit() {
        let (_dir, store) = store();
        let items = vec![item("a"), item("b")];

        let first = filter_new(&items, &store, NOW, link_key);
        let second = filter_new(&items, &store, NOW, link_key);
        assert_eq!(first.items(), second.items());
        assert_eq!(first.len(), 2);
        store.close().unwrap();
    }

    #[test]
    fn test_commit_marks_items_seen() {
        let (_dir, mut store) = store();
        let items = vec![item("https://x/1")];

        let batch = filter_new(&items, &store, NOW, link_key);
        assert_eq!(batch.len(), 1);
        batch.commit(&mut store);

        assert!(store.contains("https://x/1"));
        assert!(filter_new(&items, &store, NOW, link_key).is_empty());
        store.close().unwrap();
    }

    #[test]
    fn test_duplicate_within_feed_taken_once() {
        let (_dir, store) = store();
        let items = vec![item("a"), item("a")];
        assert_eq!(filter_new(&items, &store, NOW, link_key).len(), 1);
        store.close().unwrap();
    }

    #[test]
    fn test_linkless_items_are_keyed_by_id() {
        let (_dir, store) = store();
        let mut first = item("");
        first.id = "episode-1".into();
        let mut second = item("");
        second.id = "episode-2".into();
        let items = vec![first, second];

        let batch = filter_new(&items, &store, NOW, link_key);
        let keys: Vec<_> = batch.items().iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, ["episode-1", "episode-2"]);
        store.close().unwrap();
    }

    #[test]
    fn test_composite_key() {
        let (_dir, mut store) = store();
        let items = vec![item("a")];

        let batch = filter_new(&items, &store, NOW, |i| composite_key("p1-", i));
        assert_eq!(batch.items()[0].key, "p1-id-a");
        batch.commit_item(&mut store, &batch.items()[0]);
        assert!(store.contains("p1-id-a"));
        assert!(!store.contains("a"));
        store.close().unwrap();
    }
}
