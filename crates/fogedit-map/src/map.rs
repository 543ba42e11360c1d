use crate::block::Block;
use crate::coordinates::{
    block_min_pixel, in_block, in_block_pixel, in_tile, is_pixel_on_world, pixel_of, BlockIndex,
    Coordinate, TileId, PIXELS_PER_TILE_SIDE_LOG2, TILE_X_MIN,
};
use crate::core::SmallKeyHashMap;
use crate::edit::{EditBuffer, PaintMode};
use crate::patch::{BlockKey, Patch, PatchDirection};
use crate::region::{PixelSpan, Region};
use crate::tile::Tile;
use crate::units::PixelUnits;

use crate::core::glam::IVec2;
use itertools::Itertools;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An immutable snapshot of everywhere that has been visited.
///
/// Cloning is O(1): snapshots share columns of tiles, columns share tiles, and tiles share blocks, through reference
/// counting. Every mutation goes through [`Arc::make_mut`], so a snapshot held elsewhere (e.g. in an undo history)
/// never observes the change, and an edit copies only the columns, tiles and blocks on its path.
///
/// The map is always pruned: no stored column, tile or block is empty. Equality compares content.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FogMap {
    columns: Arc<BTreeMap<i32, Arc<TileColumn>>>,
    num_tiles: usize,
}

/// The tiles sharing one `x`, keyed by `y`.
type TileColumn = BTreeMap<i32, Arc<Tile>>;

impl FogMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from whole tiles, dropping empty ones. Tiles with the same ID are merged.
    pub fn from_tiles(tiles: impl IntoIterator<Item = (TileId, Tile)>) -> Self {
        let mut map = Self::new();
        for (id, tile) in tiles {
            map.merge_tile_in(id, tile);
        }
        map
    }

    /// Builds a map from individual blocks, dropping empty ones. Blocks with the same key are ORed together.
    pub fn from_blocks(blocks: impl IntoIterator<Item = (BlockKey, Block)>) -> Self {
        let mut tiles: BTreeMap<TileId, Tile> = BTreeMap::new();
        for (key, block) in blocks {
            if block.is_empty() {
                continue;
            }
            let tile = tiles.entry(key.tile).or_default();
            let merged = match tile.block(key.block) {
                Some(existing) => {
                    let mut merged = *existing;
                    merged.union_with(&block);
                    merged
                }
                None => block,
            };
            tile.insert_block(key.block, merged);
        }
        let mut columns: BTreeMap<i32, TileColumn> = BTreeMap::new();
        let mut num_tiles = 0;
        for (id, tile) in tiles.into_iter().filter(|(_, tile)| !tile.is_empty()) {
            columns.entry(id.x).or_default().insert(id.y, Arc::new(tile));
            num_tiles += 1;
        }
        Self {
            columns: Arc::new(
                columns
                    .into_iter()
                    .map(|(x, column)| (x, Arc::new(column)))
                    .collect(),
            ),
            num_tiles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_tiles == 0
    }

    pub fn num_tiles(&self) -> usize {
        self.num_tiles
    }

    /// `true` if both handles refer to the very same snapshot, which implies equal content.
    pub fn same_snapshot(&self, other: &FogMap) -> bool {
        Arc::ptr_eq(&self.columns, &other.columns)
    }

    pub fn tile(&self, id: TileId) -> Option<&Arc<Tile>> {
        self.columns.get(&id.x)?.get(&id.y)
    }

    /// Tiles in ascending ID order.
    pub fn tiles(&self) -> impl Iterator<Item = (TileId, &Arc<Tile>)> {
        self.columns.iter().flat_map(|(&x, column)| {
            column
                .iter()
                .map(move |(&y, tile)| (TileId { x, y }, tile))
        })
    }

    pub fn tile_ids(&self) -> impl Iterator<Item = TileId> + '_ {
        self.tiles().map(|(id, _)| id)
    }

    pub fn block(&self, key: BlockKey) -> Option<&Arc<Block>> {
        self.tile(key.tile)?.block_arc(key.block)
    }

    pub fn is_tile_present(&self, id: TileId) -> bool {
        self.tile(id).is_some()
    }

    pub fn is_block_present(&self, id: TileId, block: BlockIndex) -> bool {
        self.block(BlockKey::new(id, block)).is_some()
    }

    /// Whether global pixel `p` is visited. Pixels off the world never are.
    pub fn is_pixel_set(&self, p: PixelUnits<IVec2>) -> bool {
        if !is_pixel_on_world(p) {
            return false;
        }
        self.block(BlockKey::new(in_tile(p), in_block(p)))
            .map_or(false, |block| block.get(in_block_pixel(p)))
    }

    pub fn is_pixel_visited(&self, c: Coordinate) -> bool {
        self.is_pixel_set(pixel_of(c))
    }

    /// Every visited pixel of the map, tile by tile.
    pub fn visited_pixels(&self) -> impl Iterator<Item = PixelUnits<IVec2>> + '_ {
        self.tiles().flat_map(|(id, tile)| {
            tile.iter_blocks()
                .flat_map(move |(index, block)| global_visited_pixels(id, index, block))
        })
    }

    /// The visited pixels of one block in global pixel space. Empty if the block is absent.
    pub fn visited_pixels_in_block(
        &self,
        id: TileId,
        block: BlockIndex,
    ) -> impl Iterator<Item = PixelUnits<IVec2>> + '_ {
        self.block(BlockKey::new(id, block))
            .into_iter()
            .flat_map(move |b| global_visited_pixels(id, block, b))
    }

    /// Union of `self` and `other`. Commutative and idempotent up to content equality.
    pub fn merge(&self, other: &FogMap) -> FogMap {
        let mut merged = self.clone();
        merged.merge_in(other);
        merged
    }

    pub fn merge_in(&mut self, other: &FogMap) {
        if self.same_snapshot(other) || other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        for (id, tile) in other.tiles() {
            self.merge_tile_arc(id, tile);
        }
    }

    /// ORs a single tile into the map. An empty tile changes nothing.
    pub fn merge_tile_in(&mut self, id: TileId, tile: Tile) {
        if !tile.is_empty() {
            self.merge_tile_arc(id, &Arc::new(tile));
        }
    }

    fn merge_tile_arc(&mut self, id: TileId, theirs: &Arc<Tile>) {
        let merged = match self.tile(id) {
            None => theirs.clone(),
            Some(ours) if Arc::ptr_eq(ours, theirs) => return,
            Some(ours) => {
                let mut merged = Tile::clone(ours);
                if !merged.merge_in(theirs) {
                    return;
                }
                if merged == **theirs {
                    theirs.clone()
                } else {
                    Arc::new(merged)
                }
            }
        };
        let column = Arc::make_mut(Arc::make_mut(&mut self.columns).entry(id.x).or_default());
        if column.insert(id.y, merged).is_none() {
            self.num_tiles += 1;
        }
    }

    /// Replays `patch`, forward to redo it or in reverse to undo it. Costs time proportional to the patch: besides the
    /// touched blocks, only the root and the touched columns and tiles are copied, and those are bounded by the grid.
    pub fn apply_patch(&self, patch: &Patch, direction: PatchDirection) -> FogMap {
        let mut map = self.clone();
        map.apply_patch_in(patch, direction);
        map
    }

    pub fn apply_patch_in(&mut self, patch: &Patch, direction: PatchDirection) {
        if patch.is_empty() {
            return;
        }
        let columns = Arc::make_mut(&mut self.columns);
        let by_tile = patch.changes().iter().group_by(|change| change.key.tile);
        for (tile_id, changes) in &by_tile {
            let column = Arc::make_mut(columns.entry(tile_id.x).or_default());
            let was_present = column.contains_key(&tile_id.y);
            let tile = Arc::make_mut(column.entry(tile_id.y).or_default());
            for change in changes {
                let target = match direction {
                    PatchDirection::Forward => &change.after,
                    PatchDirection::Reverse => &change.before,
                };
                tile.set_block(change.key.block, target.clone());
            }
            if tile.is_empty() {
                column.remove(&tile_id.y);
                if was_present {
                    self.num_tiles -= 1;
                }
            } else if !was_present {
                self.num_tiles += 1;
            }
            if column.is_empty() {
                columns.remove(&tile_id.x);
            }
        }
    }

    /// Paints `region` and returns the new snapshot with the patch that produced it. The patch is empty when
    /// nothing changed, in which case the returned map is this same snapshot.
    pub fn paint_region(&self, region: &(impl Region + ?Sized), mode: PaintMode) -> (FogMap, Patch) {
        let mut buffer = EditBuffer::new(self);
        buffer.paint(region, mode);
        let patch = buffer.into_patch();
        (self.apply_patch(&patch, PatchDirection::Forward), patch)
    }

    /// Marks every pixel of `region` as visited.
    pub fn set_region(&self, region: &(impl Region + ?Sized)) -> (FogMap, Patch) {
        self.paint_region(region, PaintMode::Mark)
    }

    /// Marks every pixel of `region` as unvisited. Blocks emptied by the edit are dropped, and so are emptied tiles.
    pub fn clear_region(&self, region: &(impl Region + ?Sized)) -> (FogMap, Patch) {
        self.paint_region(region, PaintMode::Clear)
    }

    /// Only the visited pixels that lie inside `region`.
    pub fn crop(&self, region: &(impl Region + ?Sized)) -> FogMap {
        let present = TileRows::new(self.tile_ids());
        let mut cropped: SmallKeyHashMap<BlockKey, Block> = SmallKeyHashMap::default();
        region.visit_spans(&mut |span| {
            for part in present.split(&span) {
                for run in part.block_runs() {
                    if let Some(source) = self.block(run.key) {
                        cropped
                            .entry(run.key)
                            .or_default()
                            .copy_row_span(source, run.row, run.columns);
                    }
                }
            }
        });
        Self::from_blocks(cropped)
    }
}

fn global_visited_pixels(
    id: TileId,
    index: BlockIndex,
    block: &Block,
) -> impl Iterator<Item = PixelUnits<IVec2>> + '_ {
    let min = block_min_pixel(id, index);
    block
        .visited_pixels()
        .map(move |[x, y]| min.map(|m| m + IVec2::new(x as i32, y as i32)))
}

/// Tile columns present in each tile row. Lets span-based passes skip straight over empty stretches of the world.
pub(crate) struct TileRows {
    columns_by_row: SmallKeyHashMap<i32, Vec<i32>>,
}

impl TileRows {
    pub fn new(ids: impl IntoIterator<Item = TileId>) -> Self {
        let mut columns_by_row: SmallKeyHashMap<i32, Vec<i32>> = SmallKeyHashMap::default();
        for id in ids {
            columns_by_row.entry(id.y).or_default().push(id.x);
        }
        for columns in columns_by_row.values_mut() {
            columns.sort_unstable();
            columns.dedup();
        }
        Self { columns_by_row }
    }

    /// The parts of `span` that lie in present tiles.
    pub fn split(&self, span: &PixelSpan) -> SmallVec<[PixelSpan; 4]> {
        let mut parts = SmallVec::new();
        let columns = match self.columns_by_row.get(&span.tile_row()) {
            Some(columns) => columns,
            None => return parts,
        };
        let range = span.tile_columns();
        let start = columns.partition_point(|x| x < range.start());
        for &x in columns[start..].iter().take_while(|x| *x <= range.end()) {
            let tile_first = (x - TILE_X_MIN) << PIXELS_PER_TILE_SIDE_LOG2;
            let tile_last = tile_first + (1 << PIXELS_PER_TILE_SIDE_LOG2) - 1;
            parts.extend(span.clipped(tile_first, tile_last));
        }
        parts
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
