//! Duplicate-identifier removal for incoming snapshots

use std::collections::HashSet;

use crate::models::Identified;

/// Drop every item whose id was already seen, keeping first occurrences in
/// their original order. Returns the unique items and how many were removed.
pub fn dedupe<T: Identified>(items: Vec<T>) -> (Vec<T>, usize) {
    let total = items.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<T> = items
        .into_iter()
        .filter(|item| seen.insert(item.id().to_owned()))
        .collect();
    let removed = total - unique.len();
    (unique, removed)
}
