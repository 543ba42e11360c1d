use crate::preferences::{FogConcentration, MapProjection, MapStyle};

use fogedit_map::FogMap;

/// Whatever draws the map. The controller forwards preferences and the live map here and never reads anything back.
pub trait RenderSurface {
    fn set_map_style(&mut self, style: MapStyle);
    fn set_map_projection(&mut self, projection: MapProjection);
    fn set_fog_concentration(&mut self, level: FogConcentration);
    /// Called after every change to the live map.
    fn redraw(&mut self, map: &FogMap);
}

/// A surface that draws nothing, for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn set_map_style(&mut self, _style: MapStyle) {}
    fn set_map_projection(&mut self, _projection: MapProjection) {}
    fn set_fog_concentration(&mut self, _level: FogConcentration) {}
    fn redraw(&mut self, _map: &FogMap) {}
}
