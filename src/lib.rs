//! The fogedit map controller.
//!
//! [`MapController`] owns the live [`FogMap`](fogedit_map::FogMap) and its undo history, routes pointer gestures to the
//! active [`ControlMode`], runs imports and exports, and forwards drawing [`Preferences`] to a [`RenderSurface`]. The
//! data engine itself lives in [`fogedit_map`].

mod config;
mod control_mode;
mod controller;
mod error;
mod import;
mod preferences;
mod surface;

pub use config::{Config, ConfigError, ImportConfig};
pub use control_mode::ControlMode;
pub use controller::{GestureEvent, GestureOutcome, GesturePhase, MapController};
pub use error::EditorError;
pub use import::{ImportProgress, ImportSession};
pub use preferences::{FogConcentration, MapProjection, MapStyle, ParsePreferenceError, Preferences};
pub use surface::{NullSurface, RenderSurface};

// Re-exports.
pub use fogedit_map;

#[cfg(test)]
mod test_util {
    use fogedit_map::{encode_tile, Block, BlockIndex, CodecConfig, PixelIndex, Tile, TileId};

    /// A tile file with one visited pixel in block 0.
    pub fn single_pixel_file(id: TileId, pixel: [u32; 2]) -> Vec<u8> {
        let mut block = Block::default();
        block.set(PixelIndex::from_local(pixel), true);
        let mut tile = Tile::default();
        tile.insert_block(BlockIndex::new(0), block);
        encode_tile(id, &tile, &CodecConfig::default()).unwrap()
    }
}
