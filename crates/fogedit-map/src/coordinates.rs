//! Grid geometry: exact mappings between geographic coordinates and tile, block, and pixel indices.
//!
//! Every index is derived from a single floor of the continuous pixel position; after that, tile, block and pixel
//! indices are shifts and masks of the same global pixel, so repeated conversions never drift.

use crate::core::glam::{DVec2, IVec2};
use crate::core::static_assertions::const_assert_eq;
use crate::units::PixelUnits;

use ndshape::{ConstPow2Shape2u32, ConstShape};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Edge length of a tile in degrees.
pub const TILE_SIDE_DEGREES: f64 = 1.0;

pub const BLOCKS_PER_TILE_SIDE_LOG2: u32 = 3;
pub const PIXELS_PER_BLOCK_SIDE_LOG2: u32 = 7;
pub const PIXELS_PER_TILE_SIDE_LOG2: u32 = BLOCKS_PER_TILE_SIDE_LOG2 + PIXELS_PER_BLOCK_SIDE_LOG2;

pub const BLOCKS_PER_TILE_SIDE: i32 = 1 << BLOCKS_PER_TILE_SIDE_LOG2;
pub const PIXELS_PER_BLOCK_SIDE: i32 = 1 << PIXELS_PER_BLOCK_SIDE_LOG2;
pub const PIXELS_PER_TILE_SIDE: i32 = 1 << PIXELS_PER_TILE_SIDE_LOG2;
pub const PIXELS_PER_DEGREE: f64 = PIXELS_PER_TILE_SIDE as f64 / TILE_SIDE_DEGREES;

/// The layout of blocks inside a tile.
pub type TileShape = ConstPow2Shape2u32<BLOCKS_PER_TILE_SIDE_LOG2, BLOCKS_PER_TILE_SIDE_LOG2>;
/// The layout of pixels inside a block.
pub type BlockShape = ConstPow2Shape2u32<PIXELS_PER_BLOCK_SIDE_LOG2, PIXELS_PER_BLOCK_SIDE_LOG2>;

pub const BLOCKS_PER_TILE: usize = TileShape::SIZE as usize;
pub const PIXELS_PER_BLOCK: usize = BlockShape::SIZE as usize;
const_assert_eq!(BLOCKS_PER_TILE, 64);
const_assert_eq!(PIXELS_PER_BLOCK, 128 * 128);

pub const WORLD_TILES_X: i32 = 360;
pub const WORLD_TILES_Y: i32 = 180;
pub const TILE_X_MIN: i32 = -180;
pub const TILE_Y_MIN: i32 = -90;
pub const WORLD_PIXELS_X: i32 = WORLD_TILES_X << PIXELS_PER_TILE_SIDE_LOG2;
pub const WORLD_PIXELS_Y: i32 = WORLD_TILES_Y << PIXELS_PER_TILE_SIDE_LOG2;

/// Mean earth radius (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180)")]
    LongitudeOutOfRange(f64),
}

/// A validated geographic position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeometryError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeometryError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..180.0).contains(&lng) {
            return Err(GeometryError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Like [`Coordinate::new`], but wraps any finite longitude into `[-180, 180)` first. Pointer input from an
    /// interactive map may run past the antimeridian.
    pub fn wrapped(lat: f64, lng: f64) -> Result<Self, GeometryError> {
        if !lng.is_finite() {
            return Err(GeometryError::LongitudeOutOfRange(lng));
        }
        let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
        // rem_euclid can round up to exactly 360.
        let wrapped = if wrapped >= 180.0 { -180.0 } else { wrapped };
        Self::new(lat, wrapped)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

/// A geographic rectangle in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    pub fn union(self, other: Self) -> Self {
        Self {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    pub fn contains(&self, c: Coordinate) -> bool {
        self.west <= c.lng && c.lng <= self.east && self.south <= c.lat && c.lat <= self.north
    }

    /// Spherical area of the rectangle.
    pub fn area_km2(&self) -> f64 {
        let d_lng = (self.east - self.west).to_radians();
        EARTH_RADIUS_KM
            * EARTH_RADIUS_KM
            * d_lng
            * (self.north.to_radians().sin() - self.south.to_radians().sin())
    }
}

/// Identifies one tile of the world grid. `x` grows eastward from `TILE_X_MIN`, `y` northward from `TILE_Y_MIN`.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize,
)]
pub struct TileId {
    pub x: i32,
    pub y: i32,
}

impl TileId {
    /// Panics if `(x, y)` is outside the grid. Use [`TileId::try_new`] for untrusted input.
    pub fn new(x: i32, y: i32) -> Self {
        Self::try_new(x as i64, y as i64)
            .unwrap_or_else(|| panic!("tile ({}, {}) is outside the grid", x, y))
    }

    pub fn try_new(x: i64, y: i64) -> Option<Self> {
        let x_ok = (TILE_X_MIN as i64..(TILE_X_MIN + WORLD_TILES_X) as i64).contains(&x);
        let y_ok = (TILE_Y_MIN as i64..(TILE_Y_MIN + WORLD_TILES_Y) as i64).contains(&y);
        (x_ok && y_ok).then(|| Self {
            x: x as i32,
            y: y as i32,
        })
    }

    pub fn bounds(&self) -> GeoBounds {
        tile_bounds(*self)
    }

    pub fn min_pixel(&self) -> PixelUnits<IVec2> {
        tile_min_pixel(*self)
    }

    /// The 8-neighborhood of this tile, excluding tiles off the grid.
    pub fn neighbors(&self) -> impl Iterator<Item = TileId> + '_ {
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&d| d != (0, 0))
            .filter_map(move |(dx, dy)| TileId::try_new((self.x + dx) as i64, (self.y + dy) as i64))
    }
}

/// Which of the `BLOCKS_PER_TILE` block slots inside a tile. Linearized row-major, rows south to north.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct BlockIndex(u8);

impl BlockIndex {
    /// Panics if `index >= BLOCKS_PER_TILE`.
    pub fn new(index: usize) -> Self {
        assert!(
            index < BLOCKS_PER_TILE,
            "block index {} is outside the tile",
            index
        );
        Self(index as u8)
    }

    /// Panics if `local` is outside the tile.
    pub fn from_local(local: [u32; 2]) -> Self {
        assert!(
            local[0] < BLOCKS_PER_TILE_SIDE as u32 && local[1] < BLOCKS_PER_TILE_SIDE as u32,
            "block {:?} is outside the tile",
            local
        );
        Self(TileShape::linearize(local) as u8)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// `[column, row]` inside the tile.
    pub fn local(self) -> [u32; 2] {
        TileShape::delinearize(self.0 as u32)
    }

    pub fn all() -> impl Iterator<Item = BlockIndex> {
        (0..BLOCKS_PER_TILE).map(BlockIndex::new)
    }
}

/// Which pixel inside a block. Linearized row-major, rows south to north.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct PixelIndex(u16);

impl PixelIndex {
    /// Panics if `index >= PIXELS_PER_BLOCK`.
    pub fn new(index: usize) -> Self {
        assert!(
            index < PIXELS_PER_BLOCK,
            "pixel index {} is outside the block",
            index
        );
        Self(index as u16)
    }

    /// Panics if `local` is outside the block.
    pub fn from_local(local: [u32; 2]) -> Self {
        assert!(
            local[0] < PIXELS_PER_BLOCK_SIDE as u32 && local[1] < PIXELS_PER_BLOCK_SIDE as u32,
            "pixel {:?} is outside the block",
            local
        );
        Self(BlockShape::linearize(local) as u16)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// `[column, row]` inside the block.
    pub fn local(self) -> [u32; 2] {
        BlockShape::delinearize(self.0 as u32)
    }
}

/// Position of `c` in continuous global pixel space. Pixel `(i, j)` covers `[i, i + 1) x [j, j + 1)`.
pub fn to_pixel_space(c: Coordinate) -> PixelUnits<DVec2> {
    PixelUnits(DVec2::new(
        (c.lng - TILE_X_MIN as f64 * TILE_SIDE_DEGREES) * PIXELS_PER_DEGREE,
        (c.lat - TILE_Y_MIN as f64 * TILE_SIDE_DEGREES) * PIXELS_PER_DEGREE,
    ))
}

/// The inverse of [`to_pixel_space`]. Panics if `p` is off the world.
pub fn from_pixel_space(p: PixelUnits<DVec2>) -> Coordinate {
    let lng = p.0.x / PIXELS_PER_DEGREE + TILE_X_MIN as f64 * TILE_SIDE_DEGREES;
    let lat = p.0.y / PIXELS_PER_DEGREE + TILE_Y_MIN as f64 * TILE_SIDE_DEGREES;
    Coordinate::new(lat, lng).unwrap_or_else(|e| panic!("{:?} is off the world: {}", p, e))
}

/// The global pixel containing `c`.
///
/// The north pole and longitudes that round up to the antimeridian close onto the last row and column.
pub fn pixel_of(c: Coordinate) -> PixelUnits<IVec2> {
    let p = to_pixel_space(c).0.floor();
    PixelUnits(IVec2::new(
        (p.x as i32).min(WORLD_PIXELS_X - 1),
        (p.y as i32).min(WORLD_PIXELS_Y - 1),
    ))
}

/// The geographic center of global pixel `p`.
pub fn pixel_center(p: PixelUnits<IVec2>) -> Coordinate {
    from_pixel_space(PixelUnits(p.0.as_dvec2() + DVec2::splat(0.5)))
}

pub fn is_pixel_on_world(p: PixelUnits<IVec2>) -> bool {
    (0..WORLD_PIXELS_X).contains(&p.0.x) && (0..WORLD_PIXELS_Y).contains(&p.0.y)
}

/// The tile containing global pixel `p`. Panics if `p` is off the world.
pub fn in_tile(p: PixelUnits<IVec2>) -> TileId {
    assert!(is_pixel_on_world(p), "pixel {:?} is off the world", p);
    TileId {
        x: (p.0.x >> PIXELS_PER_TILE_SIDE_LOG2) + TILE_X_MIN,
        y: (p.0.y >> PIXELS_PER_TILE_SIDE_LOG2) + TILE_Y_MIN,
    }
}

/// The block slot containing global pixel `p` inside its tile.
pub fn in_block(p: PixelUnits<IVec2>) -> BlockIndex {
    let mask = BLOCKS_PER_TILE_SIDE - 1;
    BlockIndex::from_local([
        ((p.0.x >> PIXELS_PER_BLOCK_SIDE_LOG2) & mask) as u32,
        ((p.0.y >> PIXELS_PER_BLOCK_SIDE_LOG2) & mask) as u32,
    ])
}

/// The position of global pixel `p` inside its block.
pub fn in_block_pixel(p: PixelUnits<IVec2>) -> PixelIndex {
    let mask = PIXELS_PER_BLOCK_SIDE - 1;
    PixelIndex::from_local([(p.0.x & mask) as u32, (p.0.y & mask) as u32])
}

pub fn tile_id_of(c: Coordinate) -> TileId {
    in_tile(pixel_of(c))
}

pub fn tile_bounds(tile: TileId) -> GeoBounds {
    let west = tile.x as f64 * TILE_SIDE_DEGREES;
    let south = tile.y as f64 * TILE_SIDE_DEGREES;
    GeoBounds {
        west,
        south,
        east: west + TILE_SIDE_DEGREES,
        north: south + TILE_SIDE_DEGREES,
    }
}

/// Panics if `c` is not inside `tile`.
pub fn block_index_of(c: Coordinate, tile: TileId) -> BlockIndex {
    let p = pixel_of(c);
    assert_eq!(in_tile(p), tile, "{:?} is not inside {:?}", c, tile);
    in_block(p)
}

/// Panics if `c` is not inside `block` of `tile`.
pub fn pixel_index_of(c: Coordinate, tile: TileId, block: BlockIndex) -> PixelIndex {
    let p = pixel_of(c);
    assert_eq!(in_tile(p), tile, "{:?} is not inside {:?}", c, tile);
    assert_eq!(in_block(p), block, "{:?} is not inside {:?}", c, block);
    in_block_pixel(p)
}

pub fn tile_min_pixel(tile: TileId) -> PixelUnits<IVec2> {
    PixelUnits(IVec2::new(
        (tile.x - TILE_X_MIN) << PIXELS_PER_TILE_SIDE_LOG2,
        (tile.y - TILE_Y_MIN) << PIXELS_PER_TILE_SIDE_LOG2,
    ))
}

pub fn block_min_pixel(tile: TileId, block: BlockIndex) -> PixelUnits<IVec2> {
    let [bx, by] = block.local();
    tile_min_pixel(tile).map(|min| {
        min + IVec2::new(
            (bx as i32) << PIXELS_PER_BLOCK_SIDE_LOG2,
            (by as i32) << PIXELS_PER_BLOCK_SIDE_LOG2,
        )
    })
}

/// The inverse of `(in_tile, in_block, in_block_pixel)`.
pub fn global_pixel(tile: TileId, block: BlockIndex, pixel: PixelIndex) -> PixelUnits<IVec2> {
    let [px, py] = pixel.local();
    block_min_pixel(tile, block).map(|min| min + IVec2::new(px as i32, py as i32))
}

/// Spherical area of any pixel in global pixel row `row`. Shrinks toward the poles; summing consecutive rows gives
/// exactly the area of the band they span.
pub fn pixel_area_km2(row: i32) -> f64 {
    let lat_of_row = |r: i32| (r as f64 / PIXELS_PER_DEGREE + TILE_Y_MIN as f64 * TILE_SIDE_DEGREES).to_radians();
    let d_lng = (1.0 / PIXELS_PER_DEGREE).to_radians();
    EARTH_RADIUS_KM * EARTH_RADIUS_KM * d_lng * (lat_of_row(row + 1).sin() - lat_of_row(row).sin())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use approx::assert_relative_eq;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn rejects_invalid_coordinates() {
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(GeometryError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinate::new(0.0, 180.0),
            Err(GeometryError::LongitudeOutOfRange(180.0))
        );
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn wraps_longitude() {
        let c = Coordinate::wrapped(10.0, 190.0).unwrap();
        assert_relative_eq!(c.lng(), -170.0);
        let c = Coordinate::wrapped(10.0, 180.0).unwrap();
        assert_relative_eq!(c.lng(), -180.0);
        assert!(Coordinate::wrapped(10.0, f64::INFINITY).is_err());
    }

    #[test]
    fn tile_of_coordinate_and_bounds() {
        let c = coord(48.8566, 2.3522);
        let tile = tile_id_of(c);
        assert_eq!(tile, TileId::new(2, 48));
        assert!(tile.bounds().contains(c));

        assert_eq!(tile_id_of(coord(-0.5, -0.5)), TileId::new(-1, -1));
        assert_eq!(tile_id_of(coord(-90.0, -180.0)), TileId::new(-180, -90));
        // The north pole closes onto the northmost tile row.
        assert_eq!(tile_id_of(coord(90.0, 179.999)), TileId::new(179, 89));
    }

    #[test]
    fn indices_round_trip_through_global_pixel() {
        let c = coord(-33.8688, 151.2093);
        let tile = tile_id_of(c);
        let block = block_index_of(c, tile);
        let pixel = pixel_index_of(c, tile, block);
        assert_eq!(global_pixel(tile, block, pixel), pixel_of(c));

        let center = pixel_center(pixel_of(c));
        assert_eq!(pixel_of(center), pixel_of(c));
        assert_eq!(tile_id_of(center), tile);
    }

    #[test]
    fn block_and_pixel_layout_is_row_major() {
        assert_eq!(BlockIndex::from_local([1, 0]).get(), 1);
        assert_eq!(BlockIndex::from_local([0, 1]).get(), 8);
        assert_eq!(BlockIndex::new(63).local(), [7, 7]);
        assert_eq!(PixelIndex::from_local([0, 1]).get(), 128);
        assert_eq!(PixelIndex::new(129).local(), [1, 1]);
    }

    #[test]
    #[should_panic]
    fn block_index_out_of_bounds_panics() {
        BlockIndex::new(BLOCKS_PER_TILE);
    }

    #[test]
    #[should_panic]
    fn tile_out_of_grid_panics() {
        TileId::new(180, 0);
    }

    #[test]
    fn try_new_tile_bounds() {
        assert!(TileId::try_new(-180, -90).is_some());
        assert!(TileId::try_new(179, 89).is_some());
        assert!(TileId::try_new(180, 0).is_none());
        assert!(TileId::try_new(0, -91).is_none());
    }

    #[test]
    fn neighbors_skip_off_grid_tiles() {
        assert_eq!(TileId::new(0, 0).neighbors().count(), 8);
        assert_eq!(TileId::new(-180, -90).neighbors().count(), 3);
    }

    #[test]
    fn pixel_area_shrinks_toward_poles() {
        let equator = pixel_area_km2(WORLD_PIXELS_Y / 2);
        let mid = pixel_area_km2(WORLD_PIXELS_Y * 3 / 4);
        let polar = pixel_area_km2(WORLD_PIXELS_Y - 1);
        assert!(equator > mid && mid > polar && polar > 0.0);

        // Area is continuous across a tile boundary.
        let below = pixel_area_km2(PIXELS_PER_TILE_SIDE * 100 - 1);
        let above = pixel_area_km2(PIXELS_PER_TILE_SIDE * 100);
        assert_relative_eq!(below, above, max_relative = 1e-3);
    }

    #[test]
    fn pixel_areas_sum_to_sphere() {
        let total: f64 = (0..WORLD_PIXELS_Y).map(pixel_area_km2).sum::<f64>() * WORLD_PIXELS_X as f64;
        let sphere = 4.0 * std::f64::consts::PI * EARTH_RADIUS_KM * EARTH_RADIUS_KM;
        assert_relative_eq!(total, sphere, max_relative = 1e-6);
    }

    #[test]
    fn tile_bounds_area_matches_pixels() {
        let tile = TileId::new(10, 45);
        let min_row = tile.min_pixel().0.y;
        let by_pixels: f64 = (min_row..min_row + PIXELS_PER_TILE_SIDE)
            .map(pixel_area_km2)
            .sum::<f64>()
            * PIXELS_PER_TILE_SIDE as f64;
        assert_relative_eq!(by_pixels, tile.bounds().area_km2(), max_relative = 1e-9);
    }
}
