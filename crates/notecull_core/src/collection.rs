//! Pure transformations over fetched item collections.
//!
//! # Responsibility
//! - Drop repeated identifiers and tombstoned items before predicates run.
//! - Provide reference and label projections that never touch body content.
//!
//! # Invariants
//! - No function here performs I/O or mutates its input.
//! - Surviving items keep their original relative order.

use crate::model::item::{Item, ItemId, ItemReference};
use std::collections::HashSet;

/// Removes items whose identifier was already seen, keeping first occurrences.
pub fn deduplicate(items: &[Item]) -> Vec<Item> {
    let mut seen: HashSet<&ItemId> = HashSet::with_capacity(items.len());
    items
        .iter()
        .filter(|item| seen.insert(&item.id))
        .cloned()
        .collect()
}

/// Returns only live items.
pub fn filter_tombstoned(items: &[Item]) -> Vec<Item> {
    items.iter().filter(|item| item.is_live()).cloned().collect()
}

/// Deduplicates, then drops tombstones. This is the view every predicate sees.
pub fn live_unique(items: &[Item]) -> Vec<Item> {
    let mut seen: HashSet<&ItemId> = HashSet::with_capacity(items.len());
    items
        .iter()
        .filter(|item| seen.insert(&item.id) && item.is_live())
        .cloned()
        .collect()
}

pub fn project_references(items: &[Item]) -> Vec<ItemReference> {
    items.iter().map(Item::reference).collect()
}

/// Labels of the given items; items without a label are skipped.
pub fn labels(items: &[Item]) -> Vec<&str> {
    items.iter().filter_map(Item::label).collect()
}

/// Splits a comma separated flag value, trimming each entry.
///
/// Blank input yields an empty list rather than a single empty entry.
pub fn comma_split(input: &str) -> Vec<String> {
    let parts: Vec<String> = input.split(',').map(|part| part.trim().to_string()).collect();
    if parts.len() == 1 && parts[0].is_empty() {
        return Vec::new();
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::{comma_split, deduplicate, filter_tombstoned, live_unique, project_references};
    use crate::model::item::{Item, ItemId, ItemType};

    fn note(id: &str, label: &str) -> Item {
        Item::new(ItemId::from(id), ItemType::note()).with_label(label)
    }

    #[test]
    fn deduplicate_keeps_first_occurrence() {
        let items = vec![note("a", "first"), note("b", "b"), note("a", "second")];
        let deduped = deduplicate(&items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].label(), Some("first"));
        assert_eq!(deduped[1].id.as_str(), "b");
    }

    #[test]
    fn deduplicate_is_idempotent() {
        let items = vec![note("a", "1"), note("a", "2"), note("c", "3"), note("c", "4")];
        let once = deduplicate(&items);
        assert_eq!(deduplicate(&once), once);
    }

    #[test]
    fn filter_tombstoned_preserves_order_and_input() {
        let items = vec![
            note("a", "a"),
            note("b", "b").tombstoned(),
            note("c", "c"),
        ];
        let live = filter_tombstoned(&items);
        let ids: Vec<&str> = live.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(items.len(), 3);
        assert!(items[1].is_deleted());
    }

    #[test]
    fn live_unique_hides_live_duplicate_of_tombstone_seen_first() {
        // The first fetched copy wins, even when it is the tombstoned one.
        let items = vec![note("a", "a").tombstoned(), note("a", "a"), note("b", "b")];
        let live = live_unique(&items);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id.as_str(), "b");
    }

    #[test]
    fn project_references_keeps_ids_and_types() {
        let refs = project_references(&[note("a", "x"), note("b", "y")]);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].id.as_str(), "b");
        assert_eq!(refs[1].item_type, ItemType::note());
    }

    #[test]
    fn comma_split_trims_and_handles_blank() {
        assert_eq!(comma_split(" a, b ,c"), vec!["a", "b", "c"]);
        assert!(comma_split("").is_empty());
        assert!(comma_split("  ").is_empty());
    }
}
