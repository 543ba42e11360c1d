use crate::block::Block;
use crate::coordinates::{BlockIndex, TileId};
use crate::core::SmallKeyHashMap;

use itertools::Itertools;
use std::sync::Arc;

/// Addresses one block slot of the world. Orders by tile, then by block index.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct BlockKey {
    pub tile: TileId,
    pub block: BlockIndex,
}

impl BlockKey {
    pub fn new(tile: TileId, block: BlockIndex) -> Self {
        Self { tile, block }
    }
}

/// The contents of one block slot before and after an edit. `None` means the block was (or becomes) absent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockChange {
    pub key: BlockKey,
    pub before: Option<Arc<Block>>,
    pub after: Option<Arc<Block>>,
}

impl BlockChange {
    /// The change that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            key: self.key,
            before: self.after.clone(),
            after: self.before.clone(),
        }
    }

    /// Visited pixels gained (positive) or lost (negative).
    pub fn pixel_delta(&self) -> i64 {
        let count = |b: &Option<Arc<Block>>| b.as_ref().map_or(0, |b| b.count() as i64);
        count(&self.after) - count(&self.before)
    }
}

/// Which way to replay a [`Patch`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PatchDirection {
    Forward,
    Reverse,
}

/// A reversible record of one edit: the before and after contents of every block it touched.
///
/// Should be created with a [`PatchEncoder`], which keeps one change per key and sorts them by key. Applying a patch
/// costs time proportional to its length, not to the size of the map.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Patch {
    changes: Vec<BlockChange>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[BlockChange] {
        &self.changes
    }

    pub fn inverse(&self) -> Patch {
        Patch {
            changes: self.changes.iter().map(BlockChange::inverse).collect(),
        }
    }

    /// Each tile with at least one changed block, in order.
    pub fn touched_tiles(&self) -> impl Iterator<Item = TileId> + '_ {
        self.changes.iter().map(|c| c.key.tile).dedup()
    }

    pub fn pixel_delta(&self) -> i64 {
        self.changes.iter().map(BlockChange::pixel_delta).sum()
    }
}

/// Creates a [`Patch`].
///
/// Repeated changes to the same key collapse into one that keeps the earliest `before` and the latest `after`.
/// Changes whose endpoints are equal are dropped.
#[derive(Default)]
pub struct PatchEncoder {
    added_changes: SmallKeyHashMap<BlockKey, BlockChange>,
}

impl PatchEncoder {
    pub fn add_change(
        &mut self,
        key: BlockKey,
        before: Option<Arc<Block>>,
        after: Option<Arc<Block>>,
    ) {
        self.added_changes
            .entry(key)
            .and_modify(|change| change.after = after.clone())
            .or_insert(BlockChange { key, before, after });
    }

    pub fn is_empty(&self) -> bool {
        self.added_changes.is_empty()
    }

    pub fn encode(self) -> Patch {
        let mut changes: Vec<_> = self
            .added_changes
            .into_values()
            .filter(|c| !same_block(&c.before, &c.after))
            .collect();
        changes.sort_by_key(|c| c.key);
        Patch { changes }
    }
}

pub(crate) fn same_block(a: &Option<Arc<Block>>, b: &Option<Arc<Block>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
        _ => false,
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
