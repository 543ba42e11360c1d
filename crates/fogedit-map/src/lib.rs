//! The fogedit map data model.
//!
//! # Grid
//!
//! The world is an equirectangular grid of [`Tile`]s, each covering one degree of longitude by one degree of latitude.
//! A tile is an 8x8 grid of optional [`Block`]s, and a block is a 128x128 bitmap of visited pixels. A pixel is
//! therefore `1 / 1024` degrees on a side. Tiles and blocks that hold no visited pixels are never stored.
//!
//! # Snapshots
//!
//! A [`FogMap`] is an immutable, cheaply cloned snapshot. Tiles and blocks are shared between snapshots through
//! reference counting, and an edit copies only the blocks it touches. Edits are expressed as [`Patch`]es of block
//! changes, which is what the undo/redo [`History`] records.
//!
//! # Regions
//!
//! Anything that can be painted, cleared, or cropped implements [`Region`] by rasterizing itself into rows of pixels.
//! Pen strokes are [`Sweep`]s of capsules along an unwrapped path, so strokes that cross the antimeridian paint on
//! both edges of the world.
//!
//! # Files
//!
//! Each tile is stored as one file named `tile_{x}_{y}`, in the format described by the codec. A whole map is exchanged
//! as a zip archive of tile files.

mod archive;
mod block;
mod codec;
mod config;
mod coordinates;
mod edit;
mod history;
mod map;
mod patch;
mod region;
mod stats;
mod tile;
mod units;

pub use archive::*;
pub use block::*;
pub use codec::*;
pub use config::*;
pub use coordinates::*;
pub use edit::*;
pub use history::*;
pub use map::*;
pub use patch::*;
pub use region::*;
pub use stats::*;
pub use tile::*;
pub use units::*;

// Re-exports.
pub use fogedit_core as core;
