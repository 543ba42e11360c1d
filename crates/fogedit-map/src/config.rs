use crate::edit::PaintMode;

use serde::{Deserialize, Serialize};

/// What the select tool does with a finished selection.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectAction {
    /// Only report statistics for the selection.
    Inspect,
    /// Clear every visited pixel inside the selection.
    Erase,
}

impl Default for SelectAction {
    fn default() -> Self {
        Self::Inspect
    }
}

/// Tool dimensions, all in pixel units.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub eraser_radius: f64,
    pub brush_radius: f64,
    /// Full width of a drawn line.
    pub line_width: f64,
    pub line_mode: PaintMode,
    pub select_action: SelectAction,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            eraser_radius: 8.0,
            brush_radius: 4.0,
            line_width: 3.0,
            line_mode: PaintMode::Mark,
            select_action: SelectAction::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Write blocks LZ4-compressed (format version 2) instead of raw (version 1).
    pub compress_blocks: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compress_blocks: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tools: ToolConfig,
    pub codec: CodecConfig,
}
