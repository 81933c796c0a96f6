use crate::config::QuizConfig;
use crate::dataset::LatLng;
use crate::session::SessionState;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelMode {
    /// Continent panel always visible.
    Visible,
    /// Continent panel hidden behind a toggle button.
    Collapsed,
}

/// Presentation chosen for the current viewport width while a game runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub panel: PanelMode,
    pub locator_map: bool,
}

impl Layout {
    /// `None` outside a running game, where layout is not shown.
    pub fn for_width(width_px: u32, state: SessionState, config: &QuizConfig) -> Option<Self> {
        if state != SessionState::Running {
            return None;
        }
        let narrow = width_px < config.narrow_width_px;
        Some(Self {
            panel: if narrow {
                PanelMode::Collapsed
            } else {
                PanelMode::Visible
            },
            locator_map: !narrow,
        })
    }

    pub fn is_narrow(&self) -> bool {
        self.panel == PanelMode::Collapsed
    }
}

/// Centre and zoom of the main map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
}

impl Viewport {
    pub fn default_world(config: &QuizConfig) -> Self {
        Self {
            center: config.default_center,
            zoom: config.default_zoom,
        }
    }
}

/// Label size interpolated between `min` and `max` over the zoom window.
pub fn label_font_size(min: f64, max: f64, zoom: f64, config: &QuizConfig) -> f64 {
    let t = if config.label_zoom_span > 0.0 {
        ((zoom - config.label_zoom_min) / config.label_zoom_span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    min + (max - min) * t
}
