use crate::coordinates::{
    block_min_pixel, pixel_area_km2, tile_bounds, GeoBounds, TileId, PIXELS_PER_BLOCK_SIDE,
};
use crate::map::FogMap;
use crate::region::Region;

use float_ord::FloatOrd;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeSet;

/// Resolves a geographic area to a human-readable place name.
pub trait RegionLookup {
    fn region_name(&self, bounds: &GeoBounds) -> Option<String>;
}

/// A lookup that never knows any names.
pub struct NoRegions;

impl RegionLookup for NoRegions {
    fn region_name(&self, _bounds: &GeoBounds) -> Option<String> {
        None
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MapStatistics {
    pub total_tiles: usize,
    pub total_blocks: usize,
    pub total_visited_pixels: u64,
    pub coverage_area_km2: f64,
    /// Union of the bounds of every present tile.
    pub bounds: Option<GeoBounds>,
    /// Bounds of each group of 8-connected tiles, largest area first.
    pub clusters: Vec<GeoBounds>,
    /// Distinct place names of the clusters, in cluster order.
    pub regions: Vec<String>,
}

impl FogMap {
    pub fn statistics(&self) -> MapStatistics {
        self.statistics_with_regions(&NoRegions)
    }

    pub fn statistics_with_regions(&self, lookup: &dyn RegionLookup) -> MapStatistics {
        let mut total_blocks = 0;
        let mut total_visited_pixels = 0;
        let mut coverage_area_km2 = 0.0;
        for (id, tile) in self.tiles() {
            for (index, block) in tile.iter_blocks() {
                total_blocks += 1;
                let min_row = block_min_pixel(id, index).0.y;
                for row in 0..PIXELS_PER_BLOCK_SIDE as u32 {
                    let count = block.row_count(row);
                    if count > 0 {
                        total_visited_pixels += count as u64;
                        coverage_area_km2 += count as f64 * pixel_area_km2(min_row + row as i32);
                    }
                }
            }
        }

        let clusters = tile_clusters(self.tile_ids());
        let regions = clusters
            .iter()
            .filter_map(|bounds| lookup.region_name(bounds))
            .unique()
            .collect();

        MapStatistics {
            total_tiles: self.num_tiles(),
            total_blocks,
            total_visited_pixels,
            coverage_area_km2,
            bounds: clusters.iter().copied().reduce(GeoBounds::union),
            clusters,
            regions,
        }
    }

    /// Statistics of only the visited pixels inside `region`.
    pub fn region_statistics(&self, region: &(impl Region + ?Sized)) -> MapStatistics {
        self.crop(region).statistics()
    }
}

/// Groups tiles into 8-connected components and returns the bounds of each, largest area first.
pub fn tile_clusters(ids: impl IntoIterator<Item = TileId>) -> Vec<GeoBounds> {
    let mut unvisited: BTreeSet<TileId> = ids.into_iter().collect();
    let mut clusters = Vec::new();
    while let Some(seed) = unvisited.pop_first() {
        let mut bounds = tile_bounds(seed);
        let mut stack = vec![seed];
        while let Some(id) = stack.pop() {
            for neighbor in id.neighbors() {
                if unvisited.remove(&neighbor) {
                    bounds = bounds.union(tile_bounds(neighbor));
                    stack.push(neighbor);
                }
            }
        }
        clusters.push(bounds);
    }
    clusters.sort_by_key(|b| std::cmp::Reverse(FloatOrd(b.area_km2())));
    clusters
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
