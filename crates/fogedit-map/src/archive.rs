//! Importing tile files into a [`FogMap`] and bundling a map into a zip archive.
//!
//! Imports are best effort: a file that doesn't decode is skipped and counted, never fatal. [`TileImporter`] exposes
//! the decode-one/merge-in step so hosts can spread a large import over several frames.

use crate::codec::{decode_tile, encode_tile, strip_path_prefix, FormatError, MAX_TILE_FILE_BYTES};
use crate::config::CodecConfig;
use crate::coordinates::TileId;
use crate::map::FogMap;
use crate::tile::Tile;

use std::io::{self, Cursor, Read, Write};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Why one file of an import was left out.
#[derive(Debug, Error)]
pub enum ImportSkip {
    #[error("{0:?} is not a tile file name")]
    Misnamed(String),
    #[error("file {name:?} holds tile {header:?}")]
    Mismatch { name: String, header: TileId },
    #[error("file {name:?} is malformed: {source}")]
    Format { name: String, source: FormatError },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ImportReport {
    /// Files that contributed a tile.
    pub imported: usize,
    /// Well-formed files that hold no visited pixels.
    pub empty: usize,
    pub skipped: usize,
}

/// Decodes one named tile file. The name must parse as a tile, and a non-empty payload must name the same tile.
pub fn decode_tile_file(name: &str, bytes: &[u8]) -> Result<Option<(TileId, Tile)>, ImportSkip> {
    let named = TileId::from_file_name(name).ok_or_else(|| ImportSkip::Misnamed(name.to_owned()))?;
    match decode_tile(bytes) {
        Ok(Some((header, _))) if header != named => Err(ImportSkip::Mismatch {
            name: name.to_owned(),
            header,
        }),
        Ok(decoded) => Ok(decoded),
        Err(source) => Err(ImportSkip::Format {
            name: name.to_owned(),
            source,
        }),
    }
}

/// Incrementally merges tile files into a base map. Every intermediate [`TileImporter::map`] is a valid map, so
/// stopping early leaves a consistent partial import.
#[derive(Clone, Debug)]
pub struct TileImporter {
    map: FogMap,
    report: ImportReport,
}

impl TileImporter {
    pub fn new(base: FogMap) -> Self {
        Self {
            map: base,
            report: ImportReport::default(),
        }
    }

    pub fn import_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), ImportSkip> {
        match decode_tile_file(name, bytes) {
            Ok(Some((id, tile))) => {
                self.map.merge_tile_in(id, tile);
                self.report.imported += 1;
                Ok(())
            }
            Ok(None) => {
                self.report.empty += 1;
                Ok(())
            }
            Err(skip) => {
                log::warn!("skipping import file: {}", skip);
                self.report.skipped += 1;
                Err(skip)
            }
        }
    }

    pub fn map(&self) -> &FogMap {
        &self.map
    }

    pub fn report(&self) -> ImportReport {
        self.report
    }

    pub fn finish(self) -> (FogMap, ImportReport) {
        log::info!(
            "import finished: {} files imported, {} empty, {} skipped, {} tiles",
            self.report.imported,
            self.report.empty,
            self.report.skipped,
            self.map.num_tiles()
        );
        (self.map, self.report)
    }
}

/// Merges every decodable file into `base`.
pub fn import_files<N, B>(base: &FogMap, files: impl IntoIterator<Item = (N, B)>) -> (FogMap, ImportReport)
where
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let mut importer = TileImporter::new(base.clone());
    for (name, bytes) in files {
        // Skips are logged and counted by the importer.
        let _ = importer.import_file(name.as_ref(), bytes.as_ref());
    }
    importer.finish()
}

/// The files of a zip archive, named by their last path component. Directories and entries with an empty name are
/// left out, and so are entries that fail to read or are too large to be a tile file.
pub fn archive_entries(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, FormatError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = strip_path_prefix(file.name()).to_owned();
        if name.is_empty() {
            continue;
        }
        // The declared size can lie, so the read is capped as well.
        let limit = MAX_TILE_FILE_BYTES as u64;
        if file.size() > limit {
            log::warn!("skipping oversized archive entry {:?}: {} bytes", file.name(), file.size());
            continue;
        }
        let mut data = Vec::new();
        let read = (&mut file).take(limit + 1).read_to_end(&mut data);
        match read {
            Ok(len) if len as u64 > limit => {
                log::warn!("skipping oversized archive entry {:?}", file.name());
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("skipping unreadable archive entry {:?}: {}", file.name(), e);
                continue;
            }
        }
        entries.push((name, data));
    }
    Ok(entries)
}

/// Merges every tile file in a zip archive into `base`. Fails only if the archive itself is unreadable.
pub fn import_archive(base: &FogMap, bytes: &[u8]) -> Result<(FogMap, ImportReport), FormatError> {
    Ok(import_files(base, archive_entries(bytes)?))
}

/// One file per present tile, named so that [`import_archive`] reproduces `map`. The archive bytes are a pure
/// function of `map` and `config`.
pub fn export_archive(map: &FogMap, config: &CodecConfig) -> Result<Vec<u8>, ExportError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // Blocks are already compressed, and a fixed timestamp keeps the output reproducible.
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default());
    for (id, tile) in map.tiles() {
        writer.start_file(id.file_name(), options)?;
        writer.write_all(&encode_tile(id, tile, config)?)?;
    }
    let bytes = writer.finish()?.into_inner();
    log::info!(
        "exported {} tiles into a {} byte archive",
        map.num_tiles(),
        bytes.len()
    );
    Ok(bytes)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
