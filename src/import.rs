use crate::config::ImportConfig;
use crate::error::EditorError;

use fogedit_map::core::frame_budget::FrameBudget;
use fogedit_map::{archive_entries, FogMap, ImportReport, TileImporter};
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ImportProgress {
    pub files_done: usize,
    pub files_total: usize,
}

impl ImportProgress {
    pub fn is_finished(&self) -> bool {
        self.files_done >= self.files_total
    }
}

/// An import spread over many short steps, so the host can keep drawing frames in between.
///
/// Each [`ImportSession::step`] decodes and merges as many files as the [`FrameBudget`] predicts will fit in the
/// configured step time. Dropping the session cancels the import and leaves the live map untouched.
pub struct ImportSession {
    files: std::vec::IntoIter<(String, Vec<u8>)>,
    progress: ImportProgress,
    importer: TileImporter,
    budget: FrameBudget,
}

impl ImportSession {
    pub fn new(base: FogMap, files: Vec<(String, Vec<u8>)>, config: &ImportConfig) -> Self {
        Self {
            progress: ImportProgress {
                files_done: 0,
                files_total: files.len(),
            },
            files: files.into_iter(),
            importer: TileImporter::new(base),
            budget: FrameBudget::new(
                config.target_step_time_us,
                config.initial_file_time_estimate_us,
            ),
        }
    }

    /// Lists the archive's tile files up front, so the steps never re-read the container.
    pub fn from_archive(
        base: FogMap,
        bytes: &[u8],
        config: &ImportConfig,
    ) -> Result<Self, EditorError> {
        let entries = archive_entries(bytes).map_err(|e| {
            log::warn!("archive import failed: {}", e);
            EditorError::InvalidFormat
        })?;
        Ok(Self::new(base, entries, config))
    }

    pub fn step(&mut self) -> ImportProgress {
        self.budget.reset_timer();
        for (name, bytes) in self.files.by_ref().take(self.budget.items_per_step()) {
            let start = Instant::now();
            // Skips are logged and counted by the importer.
            let _ = self.importer.import_file(&name, &bytes);
            self.budget.complete_item(start.elapsed());
            self.progress.files_done += 1;
        }
        self.budget.update_estimate();
        log::debug!(
            "import step: {}/{} files",
            self.progress.files_done,
            self.progress.files_total
        );
        self.progress
    }

    pub fn progress(&self) -> ImportProgress {
        self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.progress.is_finished()
    }

    /// The map with every file imported so far. Always a valid map, even mid-import.
    pub fn map(&self) -> &FogMap {
        self.importer.map()
    }

    pub fn report(&self) -> ImportReport {
        self.importer.report()
    }

    /// Runs the remaining steps back to back.
    pub fn run_to_end(mut self) -> Result<(FogMap, ImportReport), EditorError> {
        while !self.is_finished() {
            self.step();
        }
        self.finish()
    }

    /// Ends the import with whatever has been merged so far. Fails if no file contributed a tile.
    pub fn finish(self) -> Result<(FogMap, ImportReport), EditorError> {
        let (map, report) = self.importer.finish();
        if report.imported == 0 {
            return Err(EditorError::InvalidFormat);
        }
        Ok((map, report))
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
