use crate::dataset::{Bounds, LatLng};
use crate::index::EntityId;
use crate::layout::Layout;
use crate::reveal::ContinentTally;
use serde::Serialize;
use std::collections::BTreeMap;

/// Progress counters pushed to the display after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub revealed: usize,
    pub total: usize,
    pub per_continent: BTreeMap<String, ContinentTally>,
}

impl ProgressSnapshot {
    pub fn label(&self) -> String {
        format!("{} / {}", self.revealed, self.total)
    }
}

/// End-of-game figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub time: String,
    pub guessed: usize,
    pub missed: usize,
    pub accuracy: u32,
    pub continents: Vec<ContinentLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinentLine {
    pub label: String,
    pub guessed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealStyle {
    Revealed,
    Missed,
}

/// Text label drawn over a revealed or missed entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPlacement {
    pub text: String,
    pub at: Option<LatLng>,
    pub font_px: f64,
    pub font_min: f64,
    pub font_max: f64,
}

/// A request for the rendering layer. The core never touches a map or a DOM.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    ShowEntity {
        entity: EntityId,
        name: String,
        style: RevealStyle,
        label: LabelPlacement,
    },
    ClearOverlays,
    FitBounds {
        bounds: Bounds,
        padding_px: u32,
        max_zoom: f64,
    },
    SetView {
        center: LatLng,
        zoom: f64,
        animate_secs: Option<f64>,
    },
    UpdateProgress(ProgressSnapshot),
    UpdateTimer {
        text: String,
    },
    SetInputEnabled {
        enabled: bool,
    },
    ClearInput,
    FocusInput,
    SetLayout {
        layout: Option<Layout>,
    },
    SetPanelOpen {
        open: bool,
    },
    RefreshLocator,
    SyncLocator {
        bounds: Bounds,
    },
    ShowSummary(Summary),
    HideSummary,
    ShowPlayAgain {
        visible: bool,
    },
    Notice {
        message: String,
    },
}
