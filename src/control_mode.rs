use fogedit_map::DrawTool;

/// Which tool, if any, pointer gestures are routed to.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ControlMode {
    /// Gestures pan the map and never edit it.
    #[default]
    View,
    Eraser,
    DrawLine,
    DrawBrush,
    Select,
}

impl ControlMode {
    /// Selecting the active mode again turns it off.
    pub fn toggled(self, mode: ControlMode) -> ControlMode {
        if self == mode {
            ControlMode::View
        } else {
            mode
        }
    }

    /// The drawing tool behind this mode, if it edits the map.
    pub fn draw_tool(self) -> Option<DrawTool> {
        match self {
            ControlMode::Eraser => Some(DrawTool::Eraser),
            ControlMode::DrawLine => Some(DrawTool::Line),
            ControlMode::DrawBrush => Some(DrawTool::Brush),
            ControlMode::View | ControlMode::Select => None,
        }
    }

    /// Whether gestures in this mode accumulate a stroke.
    pub fn collects_strokes(self) -> bool {
        self != ControlMode::View
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
