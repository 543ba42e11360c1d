use crate::map::FogMap;
use crate::patch::{Patch, PatchDirection};

use std::collections::BTreeMap;
use std::fmt;

/// What observers learn after every change to the [`History`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
    /// Number of patches currently applied.
    pub position: usize,
    /// Number of patches recorded, applied or not.
    pub len: usize,
    /// Incremented on every change to the live map.
    pub revision: u64,
}

pub type HistoryObserver = Box<dyn FnMut(&HistoryStatus)>;

/// A linear undo/redo log of [`Patch`]es on top of a baseline snapshot.
///
/// The live map is always the baseline with the first `position` patches applied forward. Committing a new patch
/// after some undos discards the redo tail. Undo and redo cost time proportional to one patch.
pub struct History {
    live: FogMap,
    patches: Vec<Patch>,
    position: usize,
    revision: u64,
    /// Notified in key order. Registering under an existing key replaces that observer.
    observers: BTreeMap<String, HistoryObserver>,
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("num_tiles", &self.live.num_tiles())
            .field("position", &self.position)
            .field("len", &self.patches.len())
            .field("revision", &self.revision)
            .field("observers", &self.observers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(FogMap::default())
    }
}

impl History {
    pub fn new(baseline: FogMap) -> Self {
        Self {
            live: baseline,
            patches: Vec::new(),
            position: 0,
            revision: 0,
            observers: BTreeMap::new(),
        }
    }

    /// The live snapshot. Clone it to keep a view that later edits won't affect.
    pub fn fog_map(&self) -> &FogMap {
        &self.live
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.patches.len()
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            position: self.position,
            len: self.patches.len(),
            revision: self.revision,
        }
    }

    /// Applies `patch` to the live map and records it. Returns `false` for an empty patch, which is not recorded.
    pub fn commit(&mut self, patch: Patch) -> bool {
        if patch.is_empty() {
            return false;
        }
        self.patches.truncate(self.position);
        self.live.apply_patch_in(&patch, PatchDirection::Forward);
        self.patches.push(patch);
        self.position = self.patches.len();
        self.changed();
        true
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.position -= 1;
        self.live
            .apply_patch_in(&self.patches[self.position], PatchDirection::Reverse);
        self.changed();
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.live
            .apply_patch_in(&self.patches[self.position], PatchDirection::Forward);
        self.position += 1;
        self.changed();
        true
    }

    /// Makes `map` the new baseline and forgets every recorded patch.
    pub fn replace_fog_map(&mut self, map: FogMap) {
        self.live = map;
        self.patches.clear();
        self.position = 0;
        self.changed();
    }

    pub fn register_observer(
        &mut self,
        key: impl Into<String>,
        observer: impl FnMut(&HistoryStatus) + 'static,
    ) {
        self.observers.insert(key.into(), Box::new(observer));
    }

    /// Returns `false` if no observer was registered under `key`.
    pub fn unregister_observer(&mut self, key: &str) -> bool {
        self.observers.remove(key).is_some()
    }

    fn changed(&mut self) {
        self.revision += 1;
        let status = self.status();
        log::debug!("history changed: {:?}", status);
        for observer in self.observers.values_mut() {
            observer(&status);
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
    use crate::coordinates::{tile_min_pixel, TileId};
    use crate::core::geometry::Aabb2;
    use crate::core::glam::DVec2;

    use std::cell::RefCell;
    use std::rc::Rc;

    fn square(tile: TileId, offset: f64, side: f64) -> Aabb2 {
        let min = tile_min_pixel(tile).0.as_dvec2() + DVec2::splat(offset);
        Aabb2::from_corners(min, min + DVec2::splat(side))
    }

    fn patch_on(map: &FogMap, region: &Aabb2) -> Patch {
        map.set_region(region).1
    }

    #[test]
    fn undo_redo_walks_the_log() {
        let tile = TileId::new(7, 7);
        let mut history = History::default();
        assert!(!history.can_undo() && !history.can_redo());
        assert!(!history.undo());

        let p1 = patch_on(history.fog_map(), &square(tile, 0.0, 10.0));
        assert!(history.commit(p1));
        let after_one = history.fog_map().clone();
        let p2 = patch_on(history.fog_map(), &square(tile, 20.0, 10.0));
        assert!(history.commit(p2));
        let after_two = history.fog_map().clone();

        assert!(history.undo());
        assert_eq!(history.fog_map(), &after_one);
        assert!(history.undo());
        assert!(history.fog_map().is_empty());
        assert!(!history.undo());

        assert!(history.redo());
        assert!(history.redo());
        assert_eq!(history.fog_map(), &after_two);
        assert!(!history.redo());
    }

    #[test]
    fn commit_after_undo_drops_redo_tail() {
        let tile = TileId::new(0, 0);
        let mut history = History::default();
        history.commit(patch_on(history.fog_map(), &square(tile, 0.0, 10.0)));
        history.commit(patch_on(history.fog_map(), &square(tile, 20.0, 10.0)));
        history.undo();
        assert!(history.can_redo());

        history.commit(patch_on(history.fog_map(), &square(tile, 40.0, 10.0)));
        assert!(!history.can_redo());
        assert_eq!(history.status().len, 2);
        assert_eq!(history.status().position, 2);
    }

    #[test]
    fn empty_patch_is_not_recorded() {
        let mut history = History::default();
        assert!(!history.commit(Patch::default()));
        assert!(!history.can_undo());
        assert_eq!(history.status().revision, 0);
    }

    #[test]
    fn snapshot_survives_later_edits() {
        let tile = TileId::new(-5, 5);
        let mut history = History::default();
        history.commit(patch_on(history.fog_map(), &square(tile, 0.0, 10.0)));
        let snapshot = history.fog_map().clone();
        history.commit(patch_on(history.fog_map(), &square(tile, 100.0, 10.0)));
        history.undo();
        history.undo();
        assert_eq!(snapshot.tiles().map(|(_, t)| t.visited_pixels()).sum::<u64>(), 100);
    }

    #[test]
    fn observers_are_keyed_and_replaceable() {
        let tile = TileId::new(1, 2);
        let seen: Rc<RefCell<Vec<(&str, HistoryStatus)>>> = Default::default();
        let mut history = History::default();

        let log = seen.clone();
        history.register_observer("panel", move |s| log.borrow_mut().push(("first", *s)));
        let log = seen.clone();
        history.register_observer("panel", move |s| log.borrow_mut().push(("second", *s)));

        history.commit(patch_on(history.fog_map(), &square(tile, 0.0, 4.0)));
        {
            let seen = seen.borrow();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].0, "second");
            assert!(seen[0].1.can_undo);
            assert!(!seen[0].1.can_redo);
        }

        history.undo();
        assert!(!seen.borrow()[1].1.can_undo);
        assert!(seen.borrow()[1].1.can_redo);

        assert!(history.unregister_observer("panel"));
        assert!(!history.unregister_observer("panel"));
        history.redo();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn replace_resets_and_notifies() {
        let tile = TileId::new(3, 3);
        let count = Rc::new(RefCell::new(0));
        let mut history = History::default();
        let c = count.clone();
        history.register_observer("count", move |_| *c.borrow_mut() += 1);

        history.commit(patch_on(history.fog_map(), &square(tile, 0.0, 4.0)));
        let replacement = FogMap::new().set_region(&square(tile, 50.0, 4.0)).0;
        history.replace_fog_map(replacement.clone());

        assert!(!history.can_undo() && !history.can_redo());
        assert!(history.fog_map().same_snapshot(&replacement));
        assert_eq!(*count.borrow(), 2);
    }
}
