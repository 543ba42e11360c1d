use crate::config::Config;
use crate::control_mode::ControlMode;
use crate::error::EditorError;
use crate::import::ImportSession;
use crate::preferences::{FogConcentration, MapProjection, MapStyle};
use crate::surface::{NullSurface, RenderSurface};

use fogedit_map::core::geometry::Capsule;
use fogedit_map::{
    export_archive, line_preview, stroke_patch, Coordinate, FogMap, History, HistoryStatus,
    ImportReport, MapStatistics, RegionLookup, SelectAction, Selection,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GesturePhase {
    Start,
    Move,
    End,
}

/// One pointer sample from the input layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureEvent {
    pub coordinate: Coordinate,
    pub phase: GesturePhase,
}

impl GestureEvent {
    pub fn new(coordinate: Coordinate, phase: GesturePhase) -> Self {
        Self { coordinate, phase }
    }
}

/// What [`MapController::handle_gesture`] did with an event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GestureOutcome {
    /// No tool is active, or the event arrived outside a stroke.
    Ignored,
    /// The stroke continues.
    Pending,
    /// The finished stroke covered no pixel that it could change, so nothing was recorded.
    NoChange,
    /// The finished stroke was committed as a single undo step.
    Committed,
    /// A selection replaced the previous one. `erased` is set when the selection was also cleared.
    Selected { erased: bool },
}

/// Owns the live map and its history, routes gestures to the active tool, and passes preferences through to the
/// [`RenderSurface`].
///
/// This is the only place edits and imports happen, so they are naturally serialized.
pub struct MapController<S = NullSurface> {
    config: Config,
    history: History,
    mode: ControlMode,
    stroke: Option<Vec<Coordinate>>,
    selection: Option<Selection>,
    surface: S,
}

impl Default for MapController<NullSurface> {
    fn default() -> Self {
        Self::new(Config::default(), NullSurface)
    }
}

impl<S: RenderSurface> MapController<S> {
    pub fn new(config: Config, mut surface: S) -> Self {
        let prefs = config.preferences;
        surface.set_map_style(prefs.style);
        surface.set_map_projection(prefs.projection);
        surface.set_fog_concentration(prefs.fog_concentration);
        Self {
            config,
            history: History::default(),
            mode: ControlMode::View,
            stroke: None,
            selection: None,
            surface,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn fog_map(&self) -> &FogMap {
        self.history.fog_map()
    }

    pub fn history_status(&self) -> HistoryStatus {
        self.history.status()
    }

    pub fn control_mode(&self) -> ControlMode {
        self.mode
    }

    /// Switching modes abandons any stroke in progress.
    pub fn set_control_mode(&mut self, mode: ControlMode) {
        if mode != self.mode {
            log::debug!("control mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
        self.stroke = None;
    }

    /// Activates `mode`, or returns to [`ControlMode::View`] if `mode` is already active.
    pub fn toggle_control_mode(&mut self, mode: ControlMode) {
        self.set_control_mode(self.mode.toggled(mode));
    }

    pub fn cancel(&mut self) {
        self.set_control_mode(ControlMode::View);
    }

    /// Accumulates a stroke between `Start` and `End` and resolves it to at most one history entry at `End`.
    pub fn handle_gesture(&mut self, event: GestureEvent) -> GestureOutcome {
        if !self.mode.collects_strokes() {
            return GestureOutcome::Ignored;
        }
        match event.phase {
            GesturePhase::Start => {
                self.stroke = Some(vec![event.coordinate]);
                GestureOutcome::Pending
            }
            GesturePhase::Move => match self.stroke.as_mut() {
                Some(stroke) => {
                    stroke.push(event.coordinate);
                    GestureOutcome::Pending
                }
                None => GestureOutcome::Ignored,
            },
            GesturePhase::End => match self.stroke.take() {
                Some(mut path) => {
                    path.push(event.coordinate);
                    self.finish_stroke(&path)
                }
                None => GestureOutcome::Ignored,
            },
        }
    }

    /// The segment the line tool would draw if the current stroke ended now.
    pub fn line_preview(&self) -> Option<Capsule> {
        if self.mode != ControlMode::DrawLine {
            return None;
        }
        line_preview(self.stroke.as_deref()?, &self.config.engine.tools)
    }

    fn finish_stroke(&mut self, path: &[Coordinate]) -> GestureOutcome {
        let tools = &self.config.engine.tools;
        if let Some(tool) = self.mode.draw_tool() {
            return match stroke_patch(self.history.fog_map(), tool, path, tools) {
                Some(patch) => {
                    self.commit(patch);
                    GestureOutcome::Committed
                }
                None => GestureOutcome::NoChange,
            };
        }

        // Only the select mode collects strokes without a draw tool.
        let selection = match Selection::from_path(path) {
            Some(selection) => selection,
            None => return GestureOutcome::NoChange,
        };
        let mut erased = false;
        if tools.select_action == SelectAction::Erase {
            let (_, patch) = self.history.fog_map().clear_region(&selection);
            erased = self.commit(patch);
        }
        log::debug!("selected {:?}", selection.bounds());
        self.selection = Some(selection);
        GestureOutcome::Selected { erased }
    }

    fn commit(&mut self, patch: fogedit_map::Patch) -> bool {
        let committed = self.history.commit(patch);
        if committed {
            self.surface.redraw(self.history.fog_map());
        }
        committed
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Statistics of only the selected area.
    pub fn selection_statistics(&self) -> Option<MapStatistics> {
        Some(self.fog_map().region_statistics(self.selection.as_ref()?))
    }

    /// An archive of only the visited pixels inside the selection. `None` without a selection.
    pub fn export_selection(&self) -> Option<Result<Vec<u8>, EditorError>> {
        let cropped = self.fog_map().crop(self.selection.as_ref()?);
        Some(self.export_map(&cropped))
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo();
        if undone {
            self.surface.redraw(self.history.fog_map());
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.history.redo();
        if redone {
            self.surface.redraw(self.history.fog_map());
        }
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Registering under a key that is already taken replaces that callback.
    pub fn register_on_change_callback(
        &mut self,
        key: impl Into<String>,
        callback: impl FnMut(&HistoryStatus) + 'static,
    ) {
        self.history.register_observer(key, callback);
    }

    pub fn unregister_on_change_callback(&mut self, key: &str) -> bool {
        self.history.unregister_observer(key)
    }

    /// Installs `map` as a new baseline. This is not an undoable edit.
    pub fn replace_fog_map(&mut self, map: FogMap) {
        self.stroke = None;
        self.history.replace_fog_map(map);
        self.surface.redraw(self.history.fog_map());
    }

    /// Starts a cooperative import on top of the current map. Feed it with [`ImportSession::step`], then hand it to
    /// [`MapController::finish_import`].
    pub fn import_session(&self, files: Vec<(String, Vec<u8>)>) -> ImportSession {
        ImportSession::new(self.fog_map().clone(), files, &self.config.import)
    }

    pub fn archive_import_session(&self, bytes: &[u8]) -> Result<ImportSession, EditorError> {
        ImportSession::from_archive(self.fog_map().clone(), bytes, &self.config.import)
    }

    /// Installs the session's result, even if it was stopped early. On failure the live map is untouched.
    pub fn finish_import(&mut self, session: ImportSession) -> Result<ImportReport, EditorError> {
        let (map, report) = session.finish()?;
        self.replace_fog_map(map);
        Ok(report)
    }

    /// Imports every file in one go.
    pub fn import_files(&mut self, files: Vec<(String, Vec<u8>)>) -> Result<ImportReport, EditorError> {
        let (map, report) = self.import_session(files).run_to_end()?;
        self.replace_fog_map(map);
        Ok(report)
    }

    pub fn import_archive(&mut self, bytes: &[u8]) -> Result<ImportReport, EditorError> {
        let (map, report) = self.archive_import_session(bytes)?.run_to_end()?;
        self.replace_fog_map(map);
        Ok(report)
    }

    pub fn export_archive(&self) -> Result<Vec<u8>, EditorError> {
        self.export_map(self.fog_map())
    }

    fn export_map(&self, map: &FogMap) -> Result<Vec<u8>, EditorError> {
        export_archive(map, &self.config.engine.codec).map_err(|e| {
            log::warn!("export failed: {}", e);
            EditorError::ExportFailed
        })
    }

    pub fn statistics(&self) -> MapStatistics {
        self.fog_map().statistics()
    }

    pub fn statistics_with_regions(&self, lookup: &dyn RegionLookup) -> MapStatistics {
        self.fog_map().statistics_with_regions(lookup)
    }

    pub fn map_style(&self) -> MapStyle {
        self.config.preferences.style
    }

    pub fn set_map_style(&mut self, style: MapStyle) {
        self.config.preferences.style = style;
        self.surface.set_map_style(style);
    }

    pub fn map_projection(&self) -> MapProjection {
        self.config.preferences.projection
    }

    pub fn set_map_projection(&mut self, projection: MapProjection) {
        self.config.preferences.projection = projection;
        self.surface.set_map_projection(projection);
    }

    pub fn fog_concentration(&self) -> FogConcentration {
        self.config.preferences.fog_concentration
    }

    pub fn set_fog_concentration(&mut self, level: FogConcentration) {
        self.config.preferences.fog_concentration = level;
        self.surface.set_fog_concentration(level);
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
    use crate::test_util::single_pixel_file;

    use fogedit_map::core::glam::IVec2;
    use fogedit_map::{pixel_center, tile_min_pixel, PixelUnits, TileId};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingSurface {
        styles: Vec<MapStyle>,
        projections: Vec<MapProjection>,
        fog_levels: Vec<FogConcentration>,
        redraws: usize,
    }

    impl RenderSurface for RecordingSurface {
        fn set_map_style(&mut self, style: MapStyle) {
            self.styles.push(style);
        }
        fn set_map_projection(&mut self, projection: MapProjection) {
            self.projections.push(projection);
        }
        fn set_fog_concentration(&mut self, level: FogConcentration) {
            self.fog_levels.push(level);
        }
        fn redraw(&mut self, _map: &FogMap) {
            self.redraws += 1;
        }
    }

    fn pixel(tile: TileId, x: i32, y: i32) -> Coordinate {
        pixel_center(PixelUnits(tile_min_pixel(tile).0 + IVec2::new(x, y)))
    }

    fn stroke(controller: &mut MapController<impl RenderSurface>, path: &[Coordinate]) -> GestureOutcome {
        let (last, rest) = path.split_last().unwrap();
        for (i, c) in rest.iter().enumerate() {
            let phase = if i == 0 {
                GesturePhase::Start
            } else {
                GesturePhase::Move
            };
            assert_eq!(controller.handle_gesture(GestureEvent::new(*c, phase)), GestureOutcome::Pending);
        }
        controller.handle_gesture(GestureEvent::new(*last, GesturePhase::End))
    }

    fn two_pixel_controller(tile: TileId) -> MapController {
        let mut controller: MapController = MapController::default();
        controller
            .import_files(vec![
                (tile.file_name(), single_pixel_file(tile, [0, 0])),
                (tile.file_name(), single_pixel_file(tile, [3, 0])),
            ])
            .unwrap();
        controller
    }

    #[test]
    fn mode_switching() {
        let mut controller: MapController = MapController::default();
        assert_eq!(controller.control_mode(), ControlMode::View);
        controller.toggle_control_mode(ControlMode::DrawBrush);
        assert_eq!(controller.control_mode(), ControlMode::DrawBrush);
        controller.toggle_control_mode(ControlMode::DrawBrush);
        assert_eq!(controller.control_mode(), ControlMode::View);
        controller.set_control_mode(ControlMode::Select);
        controller.cancel();
        assert_eq!(controller.control_mode(), ControlMode::View);
    }

    #[test]
    fn view_mode_ignores_gestures() {
        let tile = TileId::new(5, 5);
        let mut controller: MapController = MapController::default();
        let c = pixel(tile, 0, 0);
        assert_eq!(
            controller.handle_gesture(GestureEvent::new(c, GesturePhase::Start)),
            GestureOutcome::Ignored
        );
        assert_eq!(
            controller.handle_gesture(GestureEvent::new(c, GesturePhase::End)),
            GestureOutcome::Ignored
        );
        assert!(controller.fog_map().is_empty());
    }

    #[test]
    fn release_without_press_is_ignored() {
        let tile = TileId::new(5, 5);
        let c = pixel(tile, 0, 0);
        let mut controller: MapController = MapController::default();
        controller.set_control_mode(ControlMode::DrawBrush);
        assert_eq!(
            controller.handle_gesture(GestureEvent::new(c, GesturePhase::Move)),
            GestureOutcome::Ignored
        );
        assert_eq!(
            controller.handle_gesture(GestureEvent::new(c, GesturePhase::End)),
            GestureOutcome::Ignored
        );

        // A mode switch mid-drag abandons the stroke, release included.
        controller.set_control_mode(ControlMode::Eraser);
        assert_eq!(
            controller.handle_gesture(GestureEvent::new(c, GesturePhase::Start)),
            GestureOutcome::Pending
        );
        controller.set_control_mode(ControlMode::DrawBrush);
        assert_eq!(
            controller.handle_gesture(GestureEvent::new(c, GesturePhase::End)),
            GestureOutcome::Ignored
        );
        assert!(controller.fog_map().is_empty());
        assert!(!controller.can_undo());
    }

    #[test]
    fn a_whole_stroke_is_one_undo_step() {
        let tile = TileId::new(-3, 12);
        let mut controller: MapController = MapController::default();
        controller.set_control_mode(ControlMode::DrawBrush);
        let path: Vec<_> = (0..20).map(|i| pixel(tile, 10 + i * 5, 10)).collect();
        assert_eq!(stroke(&mut controller, &path), GestureOutcome::Committed);
        assert_eq!(controller.history_status().len, 1);
        assert!(controller.statistics().total_visited_pixels > 0);

        assert!(controller.undo());
        assert!(controller.fog_map().is_empty());
        assert!(!controller.undo());
        assert!(controller.redo());
        assert!(!controller.fog_map().is_empty());
    }

    #[test]
    fn erasing_nothing_records_nothing() {
        let tile = TileId::new(0, 0);
        let mut controller: MapController = MapController::default();
        controller.set_control_mode(ControlMode::Eraser);
        assert_eq!(
            stroke(&mut controller, &[pixel(tile, 0, 0), pixel(tile, 100, 0)]),
            GestureOutcome::NoChange
        );
        assert!(!controller.can_undo());
    }

    #[test]
    fn eraser_removes_imported_pixels_and_undo_restores_them() {
        let tile = TileId::new(139, 35);
        let mut controller = two_pixel_controller(tile);
        assert_eq!(controller.statistics().total_visited_pixels, 2);
        assert!(!controller.can_undo());

        controller.config.engine.tools.eraser_radius = 0.75;
        controller.set_control_mode(ControlMode::Eraser);
        assert_eq!(
            stroke(&mut controller, &[pixel(tile, 0, 0), pixel(tile, 3, 0)]),
            GestureOutcome::Committed
        );
        assert_eq!(controller.statistics().total_visited_pixels, 0);
        assert_eq!(controller.statistics().total_tiles, 0);

        assert!(controller.undo());
        assert_eq!(controller.statistics().total_visited_pixels, 2);
    }

    #[test]
    fn line_uses_only_its_endpoints() {
        let tile = TileId::new(20, 20);
        let mut controller: MapController = MapController::default();
        controller.config.engine.tools.line_width = 1.0;
        controller.set_control_mode(ControlMode::DrawLine);

        let start = pixel(tile, 10, 10);
        controller.handle_gesture(GestureEvent::new(start, GesturePhase::Start));
        controller.handle_gesture(GestureEvent::new(pixel(tile, 15, 300), GesturePhase::Move));
        let preview = controller.line_preview().unwrap();
        assert_eq!(preview.radius, 0.5);

        let outcome = controller.handle_gesture(GestureEvent::new(pixel(tile, 19, 10), GesturePhase::End));
        assert_eq!(outcome, GestureOutcome::Committed);
        assert_eq!(controller.statistics().total_visited_pixels, 10);
        assert!(controller.line_preview().is_none());
    }

    #[test]
    fn empty_selection_makes_no_patch() {
        let tile = TileId::new(40, -40);
        let mut controller = two_pixel_controller(TileId::new(0, 0));
        controller.set_control_mode(ControlMode::Select);
        let outcome = stroke(&mut controller, &[pixel(tile, 0, 0), pixel(tile, 50, 50)]);
        assert_eq!(outcome, GestureOutcome::Selected { erased: false });
        assert!(controller.selection().is_some());
        assert_eq!(controller.selection_statistics().unwrap().total_visited_pixels, 0);
        assert!(!controller.can_undo());
    }

    #[test]
    fn select_and_erase_is_undoable() {
        let tile = TileId::new(0, 0);
        let mut controller = two_pixel_controller(tile);
        controller.config.engine.tools.select_action = SelectAction::Erase;
        controller.set_control_mode(ControlMode::Select);
        let outcome = stroke(&mut controller, &[pixel(tile, 0, 0), pixel(tile, 1, 1)]);
        assert_eq!(outcome, GestureOutcome::Selected { erased: true });
        assert_eq!(controller.statistics().total_visited_pixels, 1);
        assert!(controller.undo());
        assert_eq!(controller.statistics().total_visited_pixels, 2);
    }

    #[test]
    fn selection_export_holds_only_the_selection() {
        let tile = TileId::new(0, 0);
        let mut controller = two_pixel_controller(tile);
        assert!(controller.export_selection().is_none());

        controller.set_control_mode(ControlMode::Select);
        stroke(&mut controller, &[pixel(tile, 2, 0), pixel(tile, 10, 10)]);
        let bytes = controller.export_selection().unwrap().unwrap();

        let mut other: MapController = MapController::default();
        other.import_archive(&bytes).unwrap();
        assert_eq!(other.statistics().total_visited_pixels, 1);
    }

    #[test]
    fn archive_round_trip_through_controllers() {
        let tile = TileId::new(-77, 40);
        let controller = two_pixel_controller(tile);
        let bytes = controller.export_archive().unwrap();
        let mut other: MapController = MapController::default();
        let report = other.import_archive(&bytes).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(other.fog_map(), controller.fog_map());
    }

    #[test]
    fn failed_import_leaves_map_untouched() {
        let tile = TileId::new(1, 1);
        let mut controller = two_pixel_controller(tile);
        let before = controller.fog_map().clone();
        assert_eq!(controller.import_files(Vec::new()), Err(EditorError::InvalidFormat));
        assert_eq!(
            controller.import_archive(b"not an archive"),
            Err(EditorError::InvalidFormat)
        );
        assert!(controller.fog_map().same_snapshot(&before));
    }

    #[test]
    fn chunked_import_merges_into_current_map() {
        let mut controller = two_pixel_controller(TileId::new(0, 0));
        let other = TileId::new(1, 0);
        let mut session =
            controller.import_session(vec![(other.file_name(), single_pixel_file(other, [1, 1]))]);
        while !session.step().is_finished() {}
        let report = controller.finish_import(session).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(controller.statistics().total_tiles, 2);
        assert_eq!(controller.statistics().total_visited_pixels, 3);
    }

    #[test]
    fn callbacks_see_history_changes() {
        let tile = TileId::new(9, 9);
        let statuses = Rc::new(RefCell::new(Vec::new()));
        let mut controller: MapController = MapController::default();
        let log = statuses.clone();
        controller.register_on_change_callback("editor", move |s| log.borrow_mut().push(*s));

        controller.set_control_mode(ControlMode::DrawBrush);
        stroke(&mut controller, &[pixel(tile, 5, 5)]);
        controller.undo();
        assert_eq!(statuses.borrow().len(), 2);
        assert!(statuses.borrow()[0].can_undo);
        assert!(statuses.borrow()[1].can_redo);

        assert!(controller.unregister_on_change_callback("editor"));
        controller.redo();
        assert_eq!(statuses.borrow().len(), 2);
    }

    #[test]
    fn preferences_are_forwarded() {
        let mut controller = MapController::new(Config::default(), RecordingSurface::default());
        controller.set_map_style(MapStyle::Dark);
        controller.set_map_projection(MapProjection::Globe);
        controller.set_fog_concentration(FogConcentration::High);
        assert_eq!(controller.map_style(), MapStyle::Dark);
        assert_eq!(controller.map_projection(), MapProjection::Globe);
        assert_eq!(controller.fog_concentration(), FogConcentration::High);

        let surface = controller.surface();
        assert_eq!(surface.styles, vec![MapStyle::Standard, MapStyle::Dark]);
        assert_eq!(surface.projections, vec![MapProjection::Mercator, MapProjection::Globe]);
        assert_eq!(surface.fog_levels, vec![FogConcentration::Medium, FogConcentration::High]);
        assert_eq!(surface.redraws, 0);
    }

    #[test]
    fn edits_trigger_redraws() {
        let tile = TileId::new(2, 2);
        let mut controller = MapController::new(Config::default(), RecordingSurface::default());
        controller.set_control_mode(ControlMode::DrawBrush);
        stroke(&mut controller, &[pixel(tile, 5, 5), pixel(tile, 50, 5)]);
        controller.undo();
        controller.replace_fog_map(FogMap::new());
        assert_eq!(controller.surface().redraws, 3);
        assert!(!controller.can_redo());
    }
}
