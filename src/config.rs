use crate::dataset::LatLng;
use serde::Deserialize;

/// Gameplay and presentation tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Maximum autocomplete suggestions rendered under the input.
    pub suggestion_limit: usize,
    /// Viewports strictly narrower than this use the narrow layout.
    pub narrow_width_px: u32,
    /// Delay between the final reveal and the summary.
    pub end_delay_ms: u64,
    pub tick_ms: u64,
    /// Delay before the locator map is recalculated after a layout change.
    pub layout_settle_ms: u64,
    pub default_center: LatLng,
    pub default_zoom: f64,
    pub abandon_view_animation_secs: f64,
    pub fit_padding_px: u32,
    pub fit_max_zoom: f64,
    pub label_zoom_min: f64,
    pub label_zoom_span: f64,
    pub label_font_min: f64,
    pub label_font_max: f64,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            suggestion_limit: 8,
            narrow_width_px: 700,
            end_delay_ms: 1_000,
            tick_ms: 1_000,
            layout_settle_ms: 0,
            default_center: LatLng { lat: 20.0, lng: 0.0 },
            default_zoom: 2.6,
            abandon_view_animation_secs: 1.2,
            fit_padding_px: 20,
            fit_max_zoom: 5.0,
            label_zoom_min: 3.0,
            label_zoom_span: 4.0,
            label_font_min: 10.0,
            label_font_max: 22.0,
        }
    }
}
