//! The per-tile binary format.
//!
//! ```text
//! [version: u8]
//! [tile x: zigzag LEB128]
//! [tile y: zigzag LEB128]
//! [presence: u64 little-endian, bit i set when block i is present]
//! [one payload per present block, in ascending block index]
//! ```
//!
//! In [`FORMAT_VERSION_RAW`] a payload is the raw `BLOCK_BYTES` bitmap. In [`FORMAT_VERSION_LZ4`] a payload is
//! `[length: LEB128][LZ4 frame]`, where the frame decompresses to exactly `BLOCK_BYTES`.
//!
//! A zero-byte file is valid and holds nothing, as does a tile whose blocks are all empty.

use crate::block::{Block, CompressedBlock, BLOCK_BYTES};
use crate::config::CodecConfig;
use crate::coordinates::{BlockIndex, TileId, BLOCKS_PER_TILE};
use crate::tile::Tile;

use std::io;
use thiserror::Error;

pub const FORMAT_VERSION_RAW: u8 = 1;
pub const FORMAT_VERSION_LZ4: u8 = 2;

pub const TILE_FILE_PREFIX: &str = "tile_";

/// LEB128 of a `u64` never needs more than this many bytes.
const MAX_VARINT_BYTES: usize = 10;

/// No well-formed tile file is longer than this, whatever its version.
pub const MAX_TILE_FILE_BYTES: usize =
    1 + 2 * MAX_VARINT_BYTES + 8 + BLOCKS_PER_TILE * (MAX_VARINT_BYTES + 2 * BLOCK_BYTES);

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported tile format version {0}")]
    UnsupportedVersion(u8),
    #[error("tile data ends early while reading the {0}")]
    Truncated(&'static str),
    #[error("varint is longer than {} bytes", MAX_VARINT_BYTES)]
    VarintOverflow,
    #[error("tile ({x}, {y}) is outside the grid")]
    TileOutOfRange { x: i64, y: i64 },
    #[error("block {block} payload length {len} is not {}", BLOCK_BYTES)]
    BlockSizeMismatch { block: usize, len: usize },
    #[error("block {block} failed to decompress: {source}")]
    Decompression { block: usize, source: io::Error },
    #[error("{0} bytes left over after the last block")]
    TrailingBytes(usize),
    #[error("archive is unreadable: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Decodes one tile file. `Ok(None)` means the file is well formed but contributes nothing.
pub fn decode_tile(bytes: &[u8]) -> Result<Option<(TileId, Tile)>, FormatError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let mut reader = ByteReader::new(bytes);
    let version = reader.u8("version")?;
    if version != FORMAT_VERSION_RAW && version != FORMAT_VERSION_LZ4 {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let x = zigzag_decode(reader.varint("tile x")?);
    let y = zigzag_decode(reader.varint("tile y")?);
    let id = TileId::try_new(x, y).ok_or(FormatError::TileOutOfRange { x, y })?;

    let mut presence = [0; 8];
    presence.copy_from_slice(reader.take(8, "presence mask")?);
    let presence = u64::from_le_bytes(presence);

    let mut tile = Tile::default();
    for i in (0..BLOCKS_PER_TILE).filter(|&i| presence & (1u64 << i) != 0) {
        let block = match version {
            FORMAT_VERSION_RAW => {
                let raw = reader.take(BLOCK_BYTES, "block bitmap")?;
                Block::from_bytes(raw).ok_or(FormatError::BlockSizeMismatch {
                    block: i,
                    len: raw.len(),
                })?
            }
            _ => {
                let len = reader.varint("block length")?;
                let len = usize::try_from(len).map_err(|_| FormatError::Truncated("block payload"))?;
                let payload = reader.take(len, "block payload")?;
                Block::from_compressed_bytes(payload)
                    .map_err(|source| FormatError::Decompression { block: i, source })?
            }
        };
        tile.insert_block(BlockIndex::new(i), block);
    }
    if reader.remaining() > 0 {
        return Err(FormatError::TrailingBytes(reader.remaining()));
    }

    log::debug!(
        "decoded tile {:?} v{} with {} blocks",
        id,
        version,
        tile.num_blocks()
    );
    Ok((!tile.is_empty()).then(|| (id, tile)))
}

/// Encodes one tile. The output is a pure function of `(id, tile, config)`.
pub fn encode_tile(id: TileId, tile: &Tile, config: &CodecConfig) -> io::Result<Vec<u8>> {
    let version = if config.compress_blocks {
        FORMAT_VERSION_LZ4
    } else {
        FORMAT_VERSION_RAW
    };
    let mut out = vec![version];
    write_varint(&mut out, zigzag_encode(id.x as i64));
    write_varint(&mut out, zigzag_encode(id.y as i64));
    out.extend_from_slice(&tile.presence_mask().to_le_bytes());
    for (_, block) in tile.iter_blocks() {
        if config.compress_blocks {
            let CompressedBlock { bytes } = block.compress()?;
            write_varint(&mut out, bytes.len() as u64);
            out.extend_from_slice(&bytes);
        } else {
            out.extend_from_slice(block.as_bytes());
        }
    }
    Ok(out)
}

impl TileId {
    /// The name of this tile's file, `tile_{x}_{y}`.
    pub fn file_name(&self) -> String {
        format!("{}{}_{}", TILE_FILE_PREFIX, self.x, self.y)
    }

    /// Parses a tile file name after stripping any directory prefix. `None` if the name doesn't name a tile on the grid.
    pub fn from_file_name(name: &str) -> Option<TileId> {
        let (x, y) = strip_path_prefix(name)
            .strip_prefix(TILE_FILE_PREFIX)?
            .split_once('_')?;
        TileId::try_new(x.parse().ok()?, y.parse().ok()?)
    }
}

/// The last component of a `/` or `\` separated path.
pub fn strip_path_prefix(name: &str) -> &str {
    name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name)
}

pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        if n > self.remaining() {
            return Err(FormatError::Truncated(what));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, FormatError> {
        Ok(self.take(1, what)?[0])
    }

    fn varint(&mut self, what: &'static str) -> Result<u64, FormatError> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.u8(what)?;
            let bits = (byte & 0x7f) as u64;
            if i == MAX_VARINT_BYTES - 1 && bits > 1 {
                return Err(FormatError::VarintOverflow);
            }
            value |= bits << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(FormatError::VarintOverflow)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
