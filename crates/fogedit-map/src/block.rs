use crate::coordinates::{PixelIndex, BlockShape, PIXELS_PER_BLOCK, PIXELS_PER_BLOCK_SIDE};
use crate::core::static_assertions::const_assert_eq;

use bytemuck::{bytes_of, Pod, Zeroable};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use ndshape::ConstShape;
use std::fmt;
use std::io::{self, Read};
use std::mem;
use std::ops::RangeInclusive;

pub const BLOCK_ROW_BYTES: usize = PIXELS_PER_BLOCK_SIDE as usize / 8;
pub const BLOCK_BYTES: usize = PIXELS_PER_BLOCK / 8;

/// The fundamental unit of fog storage: one bit per pixel, 1 meaning visited.
///
/// Rows run south to north and each row is `BLOCK_ROW_BYTES` bytes. Within a row the westmost pixel is the most
/// significant bit of the first byte.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct Block {
    bits: [u8; BLOCK_BYTES],
}

unsafe impl Zeroable for Block {}
unsafe impl Pod for Block {}

const_assert_eq!(mem::size_of::<Block>(), 2048);
const_assert_eq!(BLOCK_ROW_BYTES, mem::size_of::<u128>());

impl Default for Block {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("visited", &self.count())
            .finish()
    }
}

impl Block {
    /// Interprets exactly `BLOCK_BYTES` of raw bitmap.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        (bytes.len() == BLOCK_BYTES).then(|| {
            let mut block = Self::zeroed();
            block.bits.copy_from_slice(bytes);
            block
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytes_of(self)
    }

    /// A block with every pixel visited.
    pub fn full() -> Self {
        Self {
            bits: [u8::MAX; BLOCK_BYTES],
        }
    }

    pub fn get(&self, pixel: PixelIndex) -> bool {
        let i = pixel.get();
        self.bits[i >> 3] & (0x80 >> (i & 7)) != 0
    }

    pub fn set(&mut self, pixel: PixelIndex, visited: bool) {
        let i = pixel.get();
        let mask = 0x80 >> (i & 7);
        if visited {
            self.bits[i >> 3] |= mask;
        } else {
            self.bits[i >> 3] &= !mask;
        }
    }

    /// Row `row` as an integer whose most significant bit is column 0.
    pub fn row_bits(&self, row: u32) -> u128 {
        let start = row as usize * BLOCK_ROW_BYTES;
        let mut bytes = [0; BLOCK_ROW_BYTES];
        bytes.copy_from_slice(&self.bits[start..start + BLOCK_ROW_BYTES]);
        u128::from_be_bytes(bytes)
    }

    fn set_row_bits(&mut self, row: u32, bits: u128) {
        let start = row as usize * BLOCK_ROW_BYTES;
        self.bits[start..start + BLOCK_ROW_BYTES].copy_from_slice(&bits.to_be_bytes());
    }

    /// Sets or clears the inclusive column range `columns` of `row`. Returns `true` if any bit changed.
    pub fn fill_row_span(&mut self, row: u32, columns: RangeInclusive<u32>, visited: bool) -> bool {
        let mask = span_mask(columns);
        let old = self.row_bits(row);
        let new = if visited { old | mask } else { old & !mask };
        self.set_row_bits(row, new);
        new != old
    }

    /// ORs the pixels of `source` in `columns` of `row` into `self`.
    pub fn copy_row_span(&mut self, source: &Block, row: u32, columns: RangeInclusive<u32>) {
        let bits = source.row_bits(row) & span_mask(columns);
        self.set_row_bits(row, self.row_bits(row) | bits);
    }

    pub fn row_count(&self, row: u32) -> u32 {
        self.row_bits(row).count_ones()
    }

    /// Number of visited pixels.
    pub fn count(&self) -> u32 {
        (0..PIXELS_PER_BLOCK_SIDE as u32)
            .map(|row| self.row_count(row))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// Bitwise OR of `other` into `self`.
    pub fn union_with(&mut self, other: &Block) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= b;
        }
    }

    /// Bitwise AND of `other` into `self`.
    pub fn intersect_with(&mut self, other: &Block) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a &= b;
        }
    }

    /// Every visited pixel as a block-local `[column, row]`.
    pub fn visited_pixels(&self) -> impl Iterator<Item = [u32; 2]> + '_ {
        (0..BlockShape::SIZE)
            .map(|i| PixelIndex::new(i as usize))
            .filter(move |&p| self.get(p))
            .map(PixelIndex::local)
    }

    pub fn compress(&self) -> io::Result<CompressedBlock> {
        let mut encoder = FrameEncoder::new(Vec::new());
        let mut reader = bytes_of(self);
        io::copy(&mut reader, &mut encoder)?;
        let bytes = encoder
            .finish()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(CompressedBlock {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Fails unless `bytes` is an LZ4 frame of exactly `BLOCK_BYTES`.
    pub fn from_compressed_bytes(bytes: &[u8]) -> io::Result<Block> {
        let mut decoder = FrameDecoder::new(bytes).take(BLOCK_BYTES as u64 + 1);
        let mut raw = Vec::with_capacity(BLOCK_BYTES);
        decoder.read_to_end(&mut raw)?;
        Self::from_bytes(&raw).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "block decompressed to {}{} bytes, expected {}",
                    raw.len(),
                    if raw.len() > BLOCK_BYTES { "+" } else { "" },
                    BLOCK_BYTES
                ),
            )
        })
    }
}

/// Row bits for the inclusive column range, column 0 being the most significant bit.
fn span_mask(columns: RangeInclusive<u32>) -> u128 {
    let (first, last) = (*columns.start(), *columns.end());
    debug_assert!(first <= last && last < PIXELS_PER_BLOCK_SIDE as u32);
    let width = last - first + 1;
    if width == 128 {
        u128::MAX
    } else {
        ((1u128 << width) - 1) << (127 - last)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompressedBlock {
    pub bytes: Box<[u8]>,
}

impl CompressedBlock {
    pub fn decompress(&self) -> io::Result<Block> {
        Block::from_compressed_bytes(&self.bytes)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
