//! Shapes that cover pixels.
//!
//! A pixel is covered when its center lies inside the shape. Every shape rasterizes to horizontal [`PixelSpan`]s in
//! global pixel space, which the editing and cropping code then splits along block boundaries.
//!
//! Shapes built from coordinate paths are unwrapped across the antimeridian, so a stroke from 179.9°E to 179.9°W is
//! short rather than spanning the globe. Spans that run off either side of the world wrap around to the other.

use crate::coordinates::{
    to_pixel_space, BlockIndex, Coordinate, GeoBounds, TileId, BLOCKS_PER_TILE_SIDE_LOG2,
    PIXELS_PER_BLOCK_SIDE, PIXELS_PER_BLOCK_SIDE_LOG2, PIXELS_PER_DEGREE, PIXELS_PER_TILE_SIDE_LOG2,
    TILE_SIDE_DEGREES, TILE_X_MIN, TILE_Y_MIN, WORLD_PIXELS_X, WORLD_PIXELS_Y,
};
use crate::core::geometry::{Aabb2, Capsule, Polygon};
use crate::core::glam::DVec2;
use crate::patch::BlockKey;
use crate::units::PixelUnits;

use std::ops::RangeInclusive;

/// The pixels `first..=last` of global pixel row `row`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PixelSpan {
    pub row: i32,
    pub first: i32,
    pub last: i32,
}

impl PixelSpan {
    pub fn len(&self) -> u32 {
        (self.last - self.first + 1) as u32
    }

    /// The part of this span inside columns `first..=last`.
    pub fn clipped(&self, first: i32, last: i32) -> Option<PixelSpan> {
        let first = self.first.max(first);
        let last = self.last.min(last);
        (first <= last).then(|| PixelSpan {
            row: self.row,
            first,
            last,
        })
    }

    /// Tile `x` coordinates this span passes through.
    pub fn tile_columns(&self) -> RangeInclusive<i32> {
        ((self.first >> PIXELS_PER_TILE_SIDE_LOG2) + TILE_X_MIN)
            ..=((self.last >> PIXELS_PER_TILE_SIDE_LOG2) + TILE_X_MIN)
    }

    /// The tile row this span lies in.
    pub fn tile_row(&self) -> i32 {
        (self.row >> PIXELS_PER_TILE_SIDE_LOG2) + TILE_Y_MIN
    }

    /// Splits the span at block boundaries.
    pub fn block_runs(&self) -> impl Iterator<Item = BlockRun> {
        let span = *self;
        let block_mask = (1 << BLOCKS_PER_TILE_SIDE_LOG2) - 1;
        let pixel_mask = PIXELS_PER_BLOCK_SIDE - 1;
        let tile_y = self.tile_row();
        let block_y = ((self.row >> PIXELS_PER_BLOCK_SIDE_LOG2) & block_mask) as u32;
        let local_row = (self.row & pixel_mask) as u32;
        ((span.first >> PIXELS_PER_BLOCK_SIDE_LOG2)..=(span.last >> PIXELS_PER_BLOCK_SIDE_LOG2)).map(
            move |global_block_x| {
                let block_min = global_block_x << PIXELS_PER_BLOCK_SIDE_LOG2;
                let first = span.first.max(block_min) - block_min;
                let last = span.last.min(block_min + pixel_mask) - block_min;
                BlockRun {
                    key: BlockKey::new(
                        TileId::new(
                            (global_block_x >> BLOCKS_PER_TILE_SIDE_LOG2) + TILE_X_MIN,
                            tile_y,
                        ),
                        BlockIndex::from_local([(global_block_x & block_mask) as u32, block_y]),
                    ),
                    row: local_row,
                    columns: first as u32..=last as u32,
                }
            },
        )
    }
}

/// The part of a [`PixelSpan`] inside one block, in block-local pixel coordinates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockRun {
    pub key: BlockKey,
    pub row: u32,
    pub columns: RangeInclusive<u32>,
}

/// A set of pixels.
pub trait Region {
    /// Calls `visitor` with spans that together cover exactly the pixels of this region. Spans are inside the world
    /// but may overlap, so consumers must treat them as a set.
    fn visit_spans(&self, visitor: &mut dyn FnMut(PixelSpan));

    fn spans(&self) -> Vec<PixelSpan> {
        let mut spans = Vec::new();
        self.visit_spans(&mut |s| spans.push(s));
        spans
    }
}

/// Visits the covered pixels of a shape given by its bounding box and its `[min_x, max_x]` extent along each
/// horizontal line.
fn rasterize_rows(
    aabb: Aabb2,
    row_span: impl Fn(f64) -> Option<[f64; 2]>,
    visitor: &mut dyn FnMut(PixelSpan),
) {
    rasterize_row_intervals(
        aabb,
        |y, emit| {
            if let Some(span) = row_span(y) {
                emit(span);
            }
        },
        visitor,
    )
}

fn rasterize_row_intervals(
    aabb: Aabb2,
    row_intervals: impl Fn(f64, &mut dyn FnMut([f64; 2])),
    visitor: &mut dyn FnMut(PixelSpan),
) {
    let first_row = ((aabb.min.y - 0.5).ceil() as i64).max(0);
    let last_row = ((aabb.max.y - 0.5).floor() as i64).min(WORLD_PIXELS_Y as i64 - 1);
    for row in first_row..=last_row {
        row_intervals(row as f64 + 0.5, &mut |[lo, hi]: [f64; 2]| {
            let first = (lo - 0.5).ceil() as i64;
            let last = (hi - 0.5).floor() as i64;
            emit_wrapped(row as i32, first, last, visitor);
        });
    }
}

/// Emits the columns `first..=last` of `row`, wrapping columns off the world around the antimeridian.
fn emit_wrapped(row: i32, first: i64, last: i64, visitor: &mut dyn FnMut(PixelSpan)) {
    if first > last {
        return;
    }
    let width = WORLD_PIXELS_X as i64;
    if last - first + 1 >= width {
        visitor(PixelSpan {
            row,
            first: 0,
            last: WORLD_PIXELS_X - 1,
        });
        return;
    }
    let start = first.rem_euclid(width);
    let end = start + (last - first);
    if end < width {
        visitor(PixelSpan {
            row,
            first: start as i32,
            last: end as i32,
        });
    } else {
        visitor(PixelSpan {
            row,
            first: start as i32,
            last: WORLD_PIXELS_X - 1,
        });
        visitor(PixelSpan {
            row,
            first: 0,
            last: (end - width) as i32,
        });
    }
}

impl Region for Capsule {
    fn visit_spans(&self, visitor: &mut dyn FnMut(PixelSpan)) {
        rasterize_rows(self.aabb(), |y| self.row_span(y), visitor);
    }
}

impl Region for Aabb2 {
    fn visit_spans(&self, visitor: &mut dyn FnMut(PixelSpan)) {
        rasterize_rows(*self, |y| self.row_span(y), visitor);
    }
}

impl Region for Polygon {
    fn visit_spans(&self, visitor: &mut dyn FnMut(PixelSpan)) {
        rasterize_row_intervals(
            self.aabb(),
            |y, emit| {
                for pair in self.row_crossings(y).chunks_exact(2) {
                    emit([pair[0], pair[1]]);
                }
            },
            visitor,
        );
    }
}

/// Pixel-space positions of `path`, with longitudes unwrapped so consecutive points are never more than half the
/// world apart.
pub fn unwrapped_path(path: &[Coordinate]) -> Vec<PixelUnits<DVec2>> {
    let width = WORLD_PIXELS_X as f64;
    let mut points: Vec<PixelUnits<DVec2>> = Vec::with_capacity(path.len());
    for &c in path {
        let mut p = to_pixel_space(c).0;
        if let Some(prev) = points.last() {
            p.x -= ((p.x - prev.0.x) / width).round() * width;
        }
        points.push(PixelUnits(p));
    }
    points
}

/// The area swept by a disc moving along a path: one capsule per segment, or a single disc for a one-point path.
#[derive(Clone, Debug, PartialEq)]
pub struct Sweep {
    capsules: Vec<Capsule>,
}

impl Sweep {
    /// `None` for an empty path.
    pub fn along(path: &[Coordinate], radius: PixelUnits<f64>) -> Option<Self> {
        let points = unwrapped_path(path);
        let capsules = match points.as_slice() {
            [] => return None,
            [p] => vec![Capsule::disc(p.0, radius.0)],
            points => points
                .windows(2)
                .map(|w| Capsule::new(w[0].0, w[1].0, radius.0))
                .collect(),
        };
        Some(Self { capsules })
    }

    pub fn capsules(&self) -> &[Capsule] {
        &self.capsules
    }
}

impl Region for Sweep {
    fn visit_spans(&self, visitor: &mut dyn FnMut(PixelSpan)) {
        for capsule in &self.capsules {
            capsule.visit_spans(visitor);
        }
    }
}

/// The area chosen by the select tool.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// Spanned by one or two points.
    Rect(Aabb2),
    /// Three or more points, closed back to the first.
    Polygon(Polygon),
}

impl Selection {
    /// `None` for an empty path.
    pub fn from_path(path: &[Coordinate]) -> Option<Self> {
        let points: Vec<DVec2> = unwrapped_path(path).into_iter().map(PixelUnits::into_inner).collect();
        match points.len() {
            0 => None,
            1 | 2 => Aabb2::from_points(points).map(Selection::Rect),
            _ => Polygon::new(points).map(Selection::Polygon),
        }
    }

    pub fn pixel_aabb(&self) -> Aabb2 {
        match self {
            Selection::Rect(aabb) => *aabb,
            Selection::Polygon(polygon) => polygon.aabb(),
        }
    }

    /// Geographic bounds. When the selection crosses the antimeridian, one longitude lies outside `[-180, 180)`.
    pub fn bounds(&self) -> GeoBounds {
        let aabb = self.pixel_aabb();
        let lng = |x: f64| x / PIXELS_PER_DEGREE + TILE_X_MIN as f64 * TILE_SIDE_DEGREES;
        let lat = |y: f64| (y / PIXELS_PER_DEGREE + TILE_Y_MIN as f64 * TILE_SIDE_DEGREES).clamp(-90.0, 90.0);
        GeoBounds {
            west: lng(aabb.min.x),
            south: lat(aabb.min.y),
            east: lng(aabb.max.x),
            north: lat(aabb.max.y),
        }
    }
}

impl Region for Selection {
    fn visit_spans(&self, visitor: &mut dyn FnMut(PixelSpan)) {
        match self {
            Selection::Rect(aabb) => aabb.visit_spans(visitor),
            Selection::Polygon(polygon) => polygon.visit_spans(visitor),
        }
    }
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
    use crate::coordinates::pixel_of;

    use approx::assert_relative_eq;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn covered(region: &dyn Region) -> Vec<(i32, i32)> {
        let mut pixels: Vec<_> = region
            .spans()
            .into_iter()
            .flat_map(|s| (s.first..=s.last).map(move |x| (x, s.row)))
            .collect();
        pixels.sort_unstable();
        pixels.dedup();
        pixels
    }

    #[test]
    fn rect_covers_pixel_centers_inside() {
        let rect = Aabb2::from_corners(DVec2::new(10.0, 20.0), DVec2::new(13.0, 22.0));
        let pixels = covered(&rect);
        assert_eq!(pixels.len(), 3 * 2);
        assert_eq!(pixels[0], (10, 20));
        assert_eq!(pixels[5], (12, 21));
    }

    #[test]
    fn disc_covers_its_center_pixel() {
        let c = coord(51.5, -0.12);
        let p = pixel_of(c);
        let sweep = Sweep::along(&[c], PixelUnits(1.0)).unwrap();
        assert!(covered(&sweep).contains(&(p.0.x, p.0.y)));
    }

    #[test]
    fn zero_radius_sweep_may_cover_nothing() {
        let c = coord(10.0, 10.0);
        let sweep = Sweep::along(&[c], PixelUnits(0.0)).unwrap();
        assert!(covered(&sweep).len() <= 1);
        assert!(Sweep::along(&[], PixelUnits(1.0)).is_none());
    }

    #[test]
    fn span_wraps_across_antimeridian() {
        let mut spans = Vec::new();
        emit_wrapped(7, -3, 2, &mut |s| spans.push(s));
        assert_eq!(
            spans,
            vec![
                PixelSpan { row: 7, first: WORLD_PIXELS_X - 3, last: WORLD_PIXELS_X - 1 },
                PixelSpan { row: 7, first: 0, last: 2 },
            ]
        );
    }

    #[test]
    fn stroke_across_antimeridian_stays_short() {
        let path = [coord(0.0, 179.999), coord(0.0, -179.999)];
        let sweep = Sweep::along(&path, PixelUnits(2.0)).unwrap();
        let total: u32 = sweep.spans().iter().map(PixelSpan::len).sum();
        // About 0.002 degrees long and 4 pixels wide, far from the world width.
        assert!(total < 100, "{}", total);
        assert!(covered(&sweep).iter().any(|&(x, _)| x == 0));
        assert!(covered(&sweep).iter().any(|&(x, _)| x == WORLD_PIXELS_X - 1));
    }

    #[test]
    fn block_runs_split_at_block_and_tile_boundaries() {
        let span = PixelSpan {
            row: 130,
            first: 1000,
            last: 1200,
        };
        let runs: Vec<_> = span.block_runs().collect();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].key, BlockKey::new(TileId::new(-180, -90), BlockIndex::from_local([7, 1])));
        assert_eq!(runs[0].columns, 1000 - 896..=127);
        assert_eq!(runs[0].row, 2);
        assert_eq!(runs[1].key, BlockKey::new(TileId::new(-179, -90), BlockIndex::from_local([0, 1])));
        assert_eq!(runs[1].columns, 0..=127);
        assert_eq!(runs[2].columns, 0..=1200 - 1152);
        let total: u32 = runs.iter().map(|r| r.columns.end() - r.columns.start() + 1).sum();
        assert_eq!(total, span.len());
    }

    #[test]
    fn selection_from_path() {
        assert!(Selection::from_path(&[]).is_none());
        assert!(matches!(
            Selection::from_path(&[coord(1.0, 1.0), coord(2.0, 2.0)]),
            Some(Selection::Rect(_))
        ));
        let triangle = Selection::from_path(&[coord(0.0, 0.0), coord(0.0, 1.0), coord(1.0, 0.0)]).unwrap();
        assert!(matches!(triangle, Selection::Polygon(_)));

        // A right triangle covers about half of its bounding square.
        let pixels = covered(&triangle).len() as f64;
        let square = PIXELS_PER_DEGREE * PIXELS_PER_DEGREE;
        assert_relative_eq!(pixels / square, 0.5, max_relative = 1e-2);
    }

    #[test]
    fn selection_bounds() {
        let selection = Selection::from_path(&[coord(10.0, 20.0), coord(12.5, 22.0)]).unwrap();
        let bounds = selection.bounds();
        assert_relative_eq!(bounds.west, 20.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.south, 10.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.east, 22.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.north, 12.5, epsilon = 1e-9);

        let across = Selection::from_path(&[coord(0.0, 179.0), coord(1.0, -179.0)]).unwrap();
        let bounds = across.bounds();
        assert_relative_eq!(bounds.west, 179.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.east, 181.0, epsilon = 1e-9);
    }
}
