use crate::block::Block;
use crate::coordinates::{BlockIndex, BLOCKS_PER_TILE};

use std::sync::Arc;

/// A fixed grid of optional blocks covering one `TILE_SIDE_DEGREES` square.
///
/// Blocks are shared between snapshots through [`Arc`], so cloning a tile only bumps reference counts. A block that
/// is present always has at least one visited pixel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tile {
    blocks: [Option<Arc<Block>>; BLOCKS_PER_TILE],
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            blocks: std::array::from_fn(|_| None),
        }
    }
}

impl Tile {
    pub fn block(&self, index: BlockIndex) -> Option<&Block> {
        self.blocks[index.get()].as_deref()
    }

    pub fn block_arc(&self, index: BlockIndex) -> Option<&Arc<Block>> {
        self.blocks[index.get()].as_ref()
    }

    /// Replaces the block at `index`, returning the old one. An empty block is stored as absent.
    pub fn set_block(&mut self, index: BlockIndex, block: Option<Arc<Block>>) -> Option<Arc<Block>> {
        let block = block.filter(|b| !b.is_empty());
        std::mem::replace(&mut self.blocks[index.get()], block)
    }

    pub fn insert_block(&mut self, index: BlockIndex, block: Block) -> Option<Arc<Block>> {
        self.set_block(index, Some(Arc::new(block)))
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Option::is_none)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    /// Bit `i` is set when block `i` is present.
    pub fn presence_mask(&self) -> u64 {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .fold(0u64, |mask, (i, _)| mask | (1u64 << i))
    }

    pub fn iter_blocks(&self) -> impl Iterator<Item = (BlockIndex, &Arc<Block>)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (BlockIndex::new(i), b)))
    }

    pub fn visited_pixels(&self) -> u64 {
        self.iter_blocks().map(|(_, b)| b.count() as u64).sum()
    }

    /// ORs every block of `other` into `self`. Blocks only one side has are shared rather than copied. Returns
    /// `true` if anything changed.
    pub fn merge_in(&mut self, other: &Tile) -> bool {
        let mut changed = false;
        for (index, theirs) in other.iter_blocks() {
            let slot = &mut self.blocks[index.get()];
            match slot {
                None => {
                    *slot = Some(theirs.clone());
                    changed = true;
                }
                Some(ours) if Arc::ptr_eq(ours, theirs) => {}
                Some(ours) => {
                    let mut merged = **ours;
                    merged.union_with(theirs);
                    if merged != **ours {
                        // The other side may already hold exactly the union.
                        *ours = if merged == **theirs {
                            theirs.clone()
                        } else {
                            Arc::new(merged)
                        };
                        changed = true;
                    }
                }
            }
        }
        changed
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
