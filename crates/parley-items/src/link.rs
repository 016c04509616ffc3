// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Insert validation and cursor linking shared by both backends.

use std::collections::BTreeMap;
use std::ops::Bound;

use parley_core::{Item, ItemId, ParleyError};

/// Reject items a store must never hold.
///
/// Thread markers with id 0 are reported before the generic id check so the
/// caller learns why the root id was refused.
pub fn validate(item: &Item) -> Result<(), ParleyError> {
    if matches!(item, Item::Thread(_)) && item.id().is_root() {
        return Err(ParleyError::CannotAddThreadZero);
    }
    if item.id().0 <= 0 {
        return Err(ParleyError::InvalidItem);
    }
    Ok(())
}

/// Point `item` at its neighbours and point the neighbours back at it.
///
/// `prev` and `next` are the items immediately below and above `item`'s id in
/// its thread, if any.
pub fn link(item: &mut Item, prev: Option<&mut Item>, next: Option<&mut Item>) {
    let cursor = item.cursor();
    item.set_prev(prev.as_ref().map(|p| p.cursor()));
    item.set_next(next.as_ref().map(|n| n.cursor()));
    if let Some(p) = prev {
        p.set_next(Some(cursor));
    }
    if let Some(n) = next {
        n.set_prev(Some(cursor));
    }
}

/// Insert into an id-ordered set, rewriting the neighbours' cursors.
///
/// Returns the stored copy with its own cursors set.
pub fn insert_sorted(set: &mut BTreeMap<ItemId, Item>, mut item: Item) -> Item {
    let id = item.id();
    let prev_id = set.range(..id).next_back().map(|(k, _)| *k);
    let next_id = set
        .range((Bound::Excluded(id), Bound::Unbounded))
        .next()
        .map(|(k, _)| *k);

    let mut prev = prev_id.and_then(|k| set.remove(&k));
    let mut next = next_id.and_then(|k| set.remove(&k));
    link(&mut item, prev.as_mut(), next.as_mut());

    if let Some(p) = prev {
        set.insert(p.id(), p);
    }
    if let Some(n) = next {
        set.insert(n.id(), n);
    }
    set.insert(id, item.clone());
    item
}

/// A thread marker may take the place of the message it was opened on.
pub fn is_promotion(stored: &Item, incoming: &Item) -> bool {
    matches!((stored, incoming), (Item::Message(_), Item::Thread(_)))
}

/// Put `item` where the entry with the same id sits, keeping that entry's
/// links and retyping the neighbours' cursors.
pub fn promote_in_place(set: &mut BTreeMap<ItemId, Item>, mut item: Item) -> Item {
    let id = item.id();
    let cursor = item.cursor();
    if let Some(stored) = set.get(&id) {
        item.set_prev(stored.prev());
        item.set_next(stored.next());
    }
    if let Some(p) = item.prev().and_then(|c| set.get_mut(&c.id)) {
        p.set_next(Some(cursor));
    }
    if let Some(n) = item.next().and_then(|c| set.get_mut(&c.id)) {
        n.set_prev(Some(cursor));
    }
    set.insert(id, item.clone());
    item
}

/// Replace `stored`'s content with `incoming`, keeping `stored`'s links.
pub fn replace_content(stored: &Item, incoming: Item) -> Item {
    let mut updated = incoming.into_stored();
    updated.set_prev(stored.prev());
    updated.set_next(stored.next());
    updated
}
