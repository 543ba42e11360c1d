use crate::block::Block;
use crate::config::ToolConfig;
use crate::coordinates::Coordinate;
use crate::core::geometry::Capsule;
use crate::core::SmallKeyHashMap;
use crate::map::{FogMap, TileRows};
use crate::patch::{BlockKey, Patch, PatchEncoder};
use crate::region::{unwrapped_path, Region, Sweep};
use crate::units::PixelUnits;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Whether painting visits or unvisits pixels.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaintMode {
    Mark,
    Clear,
}

/// All edits are first written out of place here, on copies of the touched blocks. The source snapshot is never
/// modified; [`EditBuffer::into_patch`] turns the copies into a [`Patch`] against it.
pub struct EditBuffer<'a> {
    source: &'a FogMap,
    edited_blocks: SmallKeyHashMap<BlockKey, Block>,
}

impl<'a> EditBuffer<'a> {
    pub fn new(source: &'a FogMap) -> Self {
        Self {
            source,
            edited_blocks: Default::default(),
        }
    }

    pub fn source(&self) -> &FogMap {
        self.source
    }

    /// Read-modify-write of every pixel in `region`. A block missing from the buffer is copied from the source before
    /// being written.
    ///
    /// Clearing never allocates: blocks that are absent both here and in the source are already clear.
    pub fn paint(&mut self, region: &(impl Region + ?Sized), mode: PaintMode) {
        let source: &FogMap = self.source;
        let edited_blocks = &mut self.edited_blocks;
        match mode {
            PaintMode::Mark => region.visit_spans(&mut |span| {
                for run in span.block_runs() {
                    copy_on_write(source, edited_blocks, run.key).fill_row_span(run.row, run.columns, true);
                }
            }),
            PaintMode::Clear => {
                let present =
                    TileRows::new(source.tile_ids().chain(edited_blocks.keys().map(|k| k.tile)));
                region.visit_spans(&mut |span| {
                    for part in present.split(&span) {
                        for run in part.block_runs() {
                            if source.block(run.key).is_none() && !edited_blocks.contains_key(&run.key) {
                                continue;
                            }
                            copy_on_write(source, edited_blocks, run.key).fill_row_span(
                                run.row,
                                run.columns,
                                false,
                            );
                        }
                    }
                });
            }
        }
    }

    pub fn num_edited_blocks(&self) -> usize {
        self.edited_blocks.len()
    }

    /// The changes against the source. Blocks that ended up unchanged are left out, and blocks that ended up empty
    /// become removals.
    pub fn into_patch(self) -> Patch {
        let mut encoder = PatchEncoder::default();
        for (key, block) in self.edited_blocks {
            let before = self.source.block(key).cloned();
            let after = (!block.is_empty()).then(|| Arc::new(block));
            encoder.add_change(key, before, after);
        }
        encoder.encode()
    }
}

fn copy_on_write<'b>(
    source: &FogMap,
    edited_blocks: &'b mut SmallKeyHashMap<BlockKey, Block>,
    key: BlockKey,
) -> &'b mut Block {
    edited_blocks
        .entry(key)
        .or_insert_with(|| source.block(key).map(|b| **b).unwrap_or_default())
}

/// The freehand and line tools.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawTool {
    /// Clears a swept disc along the path.
    Eraser,
    /// Marks a swept disc along the path.
    Brush,
    /// Paints a straight segment from the first to the last point, in the configured line mode.
    Line,
}

/// The region and paint mode of one stroke. `None` for an empty path.
pub fn stroke_region(
    tool: DrawTool,
    path: &[Coordinate],
    config: &ToolConfig,
) -> Option<(Sweep, PaintMode)> {
    match tool {
        DrawTool::Eraser => Sweep::along(path, PixelUnits(config.eraser_radius)).map(|s| (s, PaintMode::Clear)),
        DrawTool::Brush => Sweep::along(path, PixelUnits(config.brush_radius)).map(|s| (s, PaintMode::Mark)),
        DrawTool::Line => {
            let first = *path.first()?;
            let last = *path.last()?;
            Sweep::along(&[first, last], PixelUnits(config.line_width / 2.0)).map(|s| (s, config.line_mode))
        }
    }
}

/// The patch for one completed stroke, or `None` if it would change nothing.
pub fn stroke_patch(
    map: &FogMap,
    tool: DrawTool,
    path: &[Coordinate],
    config: &ToolConfig,
) -> Option<Patch> {
    let (region, mode) = stroke_region(tool, path, config)?;
    let mut buffer = EditBuffer::new(map);
    buffer.paint(&region, mode);
    let patch = buffer.into_patch();
    log::debug!(
        "{:?} stroke of {} points touched {} blocks",
        tool,
        path.len(),
        patch.len()
    );
    (!patch.is_empty()).then(|| patch)
}

/// A capsule between the first and last points of `path`, for previewing a line before it is committed.
pub fn line_preview(path: &[Coordinate], config: &ToolConfig) -> Option<Capsule> {
    let points = unwrapped_path(&[*path.first()?, *path.last()?]);
    Some(Capsule::new(points[0].0, points[1].0, config.line_width / 2.0))
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
    use crate::coordinates::{pixel_of, tile_id_of};
    use crate::patch::PatchDirection;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn visited(map: &FogMap) -> u64 {
        map.tiles().map(|(_, t)| t.visited_pixels()).sum()
    }

    #[test]
    fn brush_marks_and_eraser_clears() {
        let config = ToolConfig::default();
        let path = [coord(10.0, 10.0), coord(10.01, 10.02), coord(10.0, 10.04)];

        let patch = stroke_patch(&FogMap::new(), DrawTool::Brush, &path, &config).unwrap();
        let drawn = FogMap::new().apply_patch(&patch, PatchDirection::Forward);
        for c in path {
            assert!(drawn.is_pixel_visited(c));
        }

        let patch = stroke_patch(&drawn, DrawTool::Eraser, &path, &config).unwrap();
        let erased = drawn.apply_patch(&patch, PatchDirection::Forward);
        // The eraser is wider than the brush.
        assert!(erased.is_empty());
    }

    #[test]
    fn eraser_over_empty_area_is_no_op() {
        let config = ToolConfig::default();
        let path = [coord(-20.0, 30.0), coord(-20.5, 30.5)];
        assert!(stroke_patch(&FogMap::new(), DrawTool::Eraser, &path, &config).is_none());
        assert!(stroke_patch(&FogMap::new(), DrawTool::Brush, &[], &config).is_none());
    }

    #[test]
    fn line_uses_only_endpoints() {
        let config = ToolConfig::default();
        let path = [coord(0.0, 0.0), coord(0.5, 0.0), coord(0.0, 0.2)];
        let patch = stroke_patch(&FogMap::new(), DrawTool::Line, &path, &config).unwrap();
        let map = FogMap::new().apply_patch(&patch, PatchDirection::Forward);
        assert!(map.is_pixel_visited(coord(0.0, 0.1)));
        assert!(!map.is_pixel_visited(coord(0.5, 0.0)));
    }

    #[test]
    fn line_in_clear_mode_erases() {
        let mut config = ToolConfig::default();
        let path = [coord(0.0, 0.0), coord(0.0, 0.2)];
        let patch = stroke_patch(&FogMap::new(), DrawTool::Line, &path, &config).unwrap();
        let map = FogMap::new().apply_patch(&patch, PatchDirection::Forward);

        config.line_mode = PaintMode::Clear;
        let patch = stroke_patch(&map, DrawTool::Line, &path, &config).unwrap();
        assert!(map.apply_patch(&patch, PatchDirection::Forward).is_empty());
    }

    #[test]
    fn mark_then_clear_in_one_buffer() {
        let map = FogMap::new();
        let c = coord(45.0, 45.0);
        let sweep = Sweep::along(&[c], PixelUnits(5.0)).unwrap();
        let mut buffer = EditBuffer::new(&map);
        buffer.paint(&sweep, PaintMode::Mark);
        assert!(buffer.num_edited_blocks() > 0);
        buffer.paint(&sweep, PaintMode::Clear);
        assert!(buffer.into_patch().is_empty());
    }

    #[test]
    fn edit_leaves_source_untouched() {
        let c = coord(35.6, 139.7);
        let sweep = Sweep::along(&[c], PixelUnits(3.0)).unwrap();
        let (map, _) = FogMap::new().set_region(&sweep);
        let before = visited(&map);

        let mut buffer = EditBuffer::new(&map);
        buffer.paint(&sweep, PaintMode::Clear);
        let patch = buffer.into_patch();
        assert_eq!(visited(&map), before);
        assert_eq!(patch.pixel_delta(), -(before as i64));
        assert!(map.is_tile_present(tile_id_of(c)));
        assert!(map.is_pixel_set(pixel_of(c)));
    }

    #[test]
    fn line_preview_spans_endpoints() {
        let config = ToolConfig::default();
        let capsule = line_preview(&[coord(0.0, 0.0), coord(1.0, 1.0), coord(0.0, 1.0)], &config).unwrap();
        assert!(capsule.contains(crate::coordinates::to_pixel_space(coord(0.0, 1.0)).0));
        assert!(line_preview(&[], &config).is_none());
    }
}
