use crate::autocomplete::{Suggestion, SuggestionCursor, suggest};
use crate::config::QuizConfig;
use crate::dataset::{Bounds, LoadError};
use crate::index::{EntityId, GeographicEntity, NameIndex};
use crate::intent::{
    ContinentLine, Intent, LabelPlacement, ProgressSnapshot, RevealStyle, Summary,
};
use crate::layout::{Layout, Viewport, label_font_size};
use crate::normalize::{format_clock, normalize_name};
use crate::reveal::{ContinentCounters, RevealState};
use crate::session::{Session, SessionState, TaskKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const LOADING_NOTICE: &str = "Map is still loading, please wait…";

/// Result of feeding one input to the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealOutcome {
    pub revealed: Option<EntityId>,
    pub intents: Vec<Intent>,
}

impl RevealOutcome {
    fn noop() -> Self {
        Self {
            revealed: None,
            intents: Vec::new(),
        }
    }

    pub fn is_reveal(&self) -> bool {
        self.revealed.is_some()
    }
}

/// Drill-down view of one continent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinentDetail {
    pub label: String,
    pub guessed: usize,
    pub total: usize,
    /// Revealed names in display order.
    pub revealed: Vec<String>,
}

/// The whole state of one quiz: index, reveals, counters and lifecycle.
///
/// Every operation runs to completion before returning and yields the
/// [`Intent`]s a rendering layer should apply, in order.
pub struct Game {
    config: QuizConfig,
    index: Option<Arc<NameIndex>>,
    load_error: Option<String>,
    reveal: RevealState,
    counters: ContinentCounters,
    session: Session,
    cursor: SuggestionCursor,
    viewport: Viewport,
    elapsed_ms: u64,
}

impl Game {
    /// A game waiting for its dataset.
    pub fn new(config: QuizConfig, width_px: u32) -> Self {
        let viewport = Viewport::default_world(&config);
        Self {
            config,
            index: None,
            load_error: None,
            reveal: RevealState::default(),
            counters: ContinentCounters::default(),
            session: Session::new(width_px),
            cursor: SuggestionCursor::default(),
            viewport,
            elapsed_ms: 0,
        }
    }

    pub fn with_index(config: QuizConfig, index: Arc<NameIndex>, width_px: u32) -> Self {
        let mut game = Self::new(config, width_px);
        game.finish_loading(Ok(index));
        game
    }

    /// Completes the one-time dataset load. A failure leaves the game
    /// unstartable and surfaces the error.
    pub fn finish_loading(&mut self, result: Result<Arc<NameIndex>, &LoadError>) -> Vec<Intent> {
        match result {
            Ok(index) => {
                self.counters = ContinentCounters::from_index(&index);
                self.index = Some(index);
                self.load_error = None;
                vec![Intent::UpdateProgress(self.snapshot())]
            }
            Err(err) => {
                warn!(error = %err, "dataset load failed");
                let message = format!("Map failed to load: {err}");
                self.load_error = Some(message.clone());
                vec![Intent::Notice { message }]
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn index(&self) -> Option<&NameIndex> {
        self.index.as_deref()
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn reveal_state(&self) -> &RevealState {
        &self.reveal
    }

    pub fn counters(&self) -> &ContinentCounters {
        &self.counters
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn timer_text(&self) -> String {
        format_clock(self.session.elapsed_secs)
    }

    fn total(&self) -> usize {
        self.index.as_ref().map(|index| index.len()).unwrap_or(0)
    }

    pub fn start(&mut self) -> Vec<Intent> {
        let Some(index) = self.index.clone() else {
            let message = self
                .load_error
                .clone()
                .unwrap_or_else(|| LOADING_NOTICE.to_string());
            return vec![Intent::Notice { message }];
        };
        if self.session.state != SessionState::NotStarted {
            return vec![Intent::Notice {
                message: format!("Cannot start a game that is {}", self.session.state),
            }];
        }

        self.session.scheduler.cancel_all();
        self.reveal.clear();
        self.counters.reset();
        self.cursor.clear();
        self.elapsed_ms = 0;
        self.session.elapsed_secs = 0;
        self.session.state = SessionState::Running;
        self.session.input_enabled = true;
        self.session.summary_visible = false;
        self.session.panel_open = false;
        self.session.selected_continent = None;
        self.session.layout =
            Layout::for_width(self.session.width_px, SessionState::Running, &self.config);
        self.session
            .scheduler
            .schedule_repeating(TaskKind::Tick, self.config.tick_ms);
        if self.session.layout.is_some_and(|layout| layout.locator_map) {
            self.session
                .scheduler
                .schedule_once(TaskKind::RefreshLocator, self.config.layout_settle_ms);
        }
        info!(entities = index.len(), "game started");

        vec![
            Intent::ClearOverlays,
            Intent::ShowPlayAgain { visible: false },
            Intent::SetInputEnabled { enabled: true },
            Intent::FocusInput,
            Intent::SetLayout {
                layout: self.session.layout,
            },
            Intent::UpdateTimer {
                text: self.timer_text(),
            },
            Intent::UpdateProgress(self.snapshot()),
        ]
    }

    /// Matches free text against the index and reveals a new entity.
    ///
    /// Unknown text, text for an already revealed entity, and any input
    /// while the input is disabled are silent no-ops.
    pub fn try_reveal(&mut self, raw: &str) -> RevealOutcome {
        if self.session.state != SessionState::Running || !self.session.input_enabled {
            return RevealOutcome::noop();
        }
        let Some(index) = self.index.clone() else {
            return RevealOutcome::noop();
        };
        let Some(entity) = index.lookup(&normalize_name(raw)) else {
            return RevealOutcome::noop();
        };
        // The match may have come through an alias.
        let canonical = normalize_name(&entity.name);
        if self.reveal.contains(&canonical) {
            return RevealOutcome::noop();
        }

        self.reveal.insert(entity);
        self.counters.record(&entity.continent);
        debug!(
            name = %entity.name,
            continent = %entity.continent,
            revealed = self.reveal.len(),
            "entity revealed"
        );

        let mut intents = vec![
            self.show_entity(entity, RevealStyle::Revealed),
            Intent::UpdateProgress(self.snapshot()),
        ];
        if let Some(bounds) = entity.bounds {
            intents.push(Intent::FitBounds {
                bounds,
                padding_px: self.config.fit_padding_px,
                max_zoom: self.config.fit_max_zoom,
            });
        }
        intents.push(Intent::ClearInput);
        self.cursor.clear();

        if self.reveal.len() == index.len() {
            self.session
                .scheduler
                .schedule_once(TaskKind::EndAfterFinalReveal, self.config.end_delay_ms);
        }
        RevealOutcome {
            revealed: Some(entity.id),
            intents,
        }
    }

    /// Suggestions for the current input, also kept for keyboard navigation.
    pub fn suggest(&mut self, raw_prefix: &str) -> Vec<Suggestion> {
        self.suggest_with_limit(raw_prefix, self.config.suggestion_limit)
    }

    pub fn suggest_with_limit(&mut self, raw_prefix: &str, limit: usize) -> Vec<Suggestion> {
        let items = match &self.index {
            Some(index) => suggest(index, &self.reveal, raw_prefix, limit),
            None => Vec::new(),
        };
        self.cursor.replace(items.clone());
        items
    }

    pub fn cursor(&self) -> &SuggestionCursor {
        &self.cursor
    }

    pub fn cursor_next(&mut self) {
        self.cursor.next();
    }

    pub fn cursor_previous(&mut self) {
        self.cursor.previous();
    }

    /// Picks the highlighted suggestion; a no-op when nothing is highlighted.
    pub fn confirm_cursor(&mut self) -> RevealOutcome {
        match self.cursor.confirm().map(|item| item.entity) {
            Some(entity) => self.select_suggestion(entity),
            None => RevealOutcome::noop(),
        }
    }

    /// Picks a suggestion as if its canonical name had been typed, then
    /// clears the input.
    pub fn select_suggestion(&mut self, entity: EntityId) -> RevealOutcome {
        let Some(name) = self
            .index
            .as_ref()
            .and_then(|index| index.entity(entity))
            .map(|entity| entity.name.clone())
        else {
            return RevealOutcome::noop();
        };
        let mut outcome = self.try_reveal(&name);
        if self.session.input_enabled && !outcome.intents.contains(&Intent::ClearInput) {
            outcome.intents.push(Intent::ClearInput);
        }
        self.cursor.clear();
        outcome
    }

    pub fn clear_input(&mut self) -> Vec<Intent> {
        self.cursor.clear();
        if !self.session.input_enabled {
            return Vec::new();
        }
        vec![Intent::ClearInput, Intent::FocusInput]
    }

    /// Moves the logical clock forward, firing whatever comes due.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<Intent> {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let until = self.session.scheduler.now_ms().saturating_add(elapsed_ms);
        let mut intents = Vec::new();
        while let Some((task, runs)) = self.session.scheduler.pop_due_run(until) {
            match task {
                TaskKind::Tick => {
                    self.elapsed_ms = self
                        .elapsed_ms
                        .saturating_add(self.config.tick_ms.saturating_mul(runs));
                    self.session.elapsed_secs = self.elapsed_ms / 1_000;
                    // Idle periods collapse into one display update.
                    match intents.last_mut() {
                        Some(Intent::UpdateTimer { text }) => *text = self.timer_text(),
                        _ => intents.push(Intent::UpdateTimer {
                            text: self.timer_text(),
                        }),
                    }
                }
                TaskKind::EndAfterFinalReveal => {
                    info!(time = %self.timer_text(), "every entity revealed");
                    intents.extend(self.end_game());
                }
                TaskKind::RefreshLocator => intents.push(Intent::RefreshLocator),
            }
        }
        self.session.scheduler.settle(until);
        intents
    }

    /// Gives up: freezes the score and paints every entity as revealed or
    /// missed.
    pub fn abandon(&mut self) -> Vec<Intent> {
        if self.session.state != SessionState::Running {
            return Vec::new();
        }
        let Some(index) = self.index.clone() else {
            return Vec::new();
        };
        self.reveal.freeze();
        info!(
            guessed = self.reveal.guessed_count(),
            total = index.len(),
            "game abandoned"
        );

        let mut intents = vec![Intent::ClearOverlays];
        for entity in index.entities() {
            let style = if self.reveal.contains(&entity.key) {
                RevealStyle::Revealed
            } else {
                RevealStyle::Missed
            };
            intents.push(self.show_entity(entity, style));
        }
        intents.push(Intent::UpdateProgress(self.snapshot()));
        self.viewport = Viewport::default_world(&self.config);
        intents.push(Intent::SetView {
            center: self.viewport.center,
            zoom: self.viewport.zoom,
            animate_secs: Some(self.config.abandon_view_animation_secs),
        });
        intents.extend(self.end_game());
        intents
    }

    fn end_game(&mut self) -> Vec<Intent> {
        self.session.scheduler.cancel_all();
        self.session.state = SessionState::Ended;
        self.session.input_enabled = false;
        self.session.summary_visible = true;
        self.session.panel_open = false;
        self.session.layout = None;
        self.cursor.clear();
        vec![
            Intent::SetInputEnabled { enabled: false },
            Intent::SetLayout { layout: None },
            Intent::ShowSummary(self.summary()),
        ]
    }

    /// Hides the summary but keeps the finished board visible.
    pub fn close_summary(&mut self) -> Vec<Intent> {
        if self.session.state != SessionState::Ended || !self.session.summary_visible {
            return Vec::new();
        }
        self.session.summary_visible = false;
        vec![Intent::HideSummary, Intent::ShowPlayAgain { visible: true }]
    }

    /// Returns a finished game to its freshly loaded state.
    pub fn reset(&mut self) -> Vec<Intent> {
        if self.session.state != SessionState::Ended {
            return Vec::new();
        }
        self.session.scheduler.cancel_all();
        self.reveal.clear();
        self.counters.reset();
        self.cursor.clear();
        self.elapsed_ms = 0;
        self.session.elapsed_secs = 0;
        self.session.state = SessionState::NotStarted;
        self.session.input_enabled = false;
        self.session.summary_visible = false;
        self.session.panel_open = false;
        self.session.selected_continent = None;
        self.session.layout = None;
        self.viewport = Viewport::default_world(&self.config);
        info!("game reset");

        vec![
            Intent::ClearOverlays,
            Intent::HideSummary,
            Intent::ShowPlayAgain { visible: false },
            Intent::ClearInput,
            Intent::SetInputEnabled { enabled: false },
            Intent::SetLayout { layout: None },
            Intent::SetView {
                center: self.viewport.center,
                zoom: self.viewport.zoom,
                animate_secs: None,
            },
            Intent::UpdateTimer {
                text: self.timer_text(),
            },
            Intent::UpdateProgress(self.snapshot()),
        ]
    }

    /// Recomputes the presentation for a new viewport width.
    pub fn resize(&mut self, width_px: u32) -> Vec<Intent> {
        self.session.width_px = width_px;
        if self.session.state != SessionState::Running {
            return Vec::new();
        }
        let layout = Layout::for_width(width_px, SessionState::Running, &self.config);
        if layout == self.session.layout {
            return Vec::new();
        }
        self.session.layout = layout;
        let mut intents = vec![Intent::SetLayout { layout }];
        if layout.is_some_and(|layout| layout.is_narrow()) && self.session.panel_open {
            self.session.panel_open = false;
            intents.push(Intent::SetPanelOpen { open: false });
        }
        self.session.scheduler.cancel(TaskKind::RefreshLocator);
        if layout.is_some_and(|layout| layout.locator_map) {
            self.session
                .scheduler
                .schedule_once(TaskKind::RefreshLocator, self.config.layout_settle_ms);
        }
        intents
    }

    /// Opens or closes the continent panel behind the narrow-layout toggle.
    pub fn toggle_panel(&mut self) -> Vec<Intent> {
        let narrow = self.session.layout.is_some_and(|layout| layout.is_narrow());
        if self.session.state != SessionState::Running || !narrow {
            return Vec::new();
        }
        self.session.panel_open = !self.session.panel_open;
        vec![Intent::SetPanelOpen {
            open: self.session.panel_open,
        }]
    }

    /// Records the main map's current extent and zoom.
    pub fn observe_viewport(&mut self, bounds: Bounds, zoom: f64) -> Vec<Intent> {
        self.viewport = Viewport {
            center: bounds.center(),
            zoom,
        };
        let locator = self.session.layout.is_some_and(|layout| layout.locator_map);
        if self.session.state == SessionState::Running && locator {
            vec![Intent::SyncLocator { bounds }]
        } else {
            Vec::new()
        }
    }

    /// Selects a continent for drill-down; `None` or an unknown label
    /// clears the selection.
    pub fn select_continent(&mut self, label: Option<&str>) -> Option<ContinentDetail> {
        let detail = label.and_then(|label| self.continent_detail(label));
        self.session.selected_continent = detail.as_ref().map(|detail| detail.label.clone());
        detail
    }

    pub fn continent_detail(&self, label: &str) -> Option<ContinentDetail> {
        let index = self.index.as_ref()?;
        let tally = self.counters.get(label);
        if tally.total == 0 {
            return None;
        }
        let revealed = index
            .sorted_by_display()
            .filter(|entity| entity.continent == label && self.reveal.contains(&entity.key))
            .map(|entity| entity.name.clone())
            .collect();
        Some(ContinentDetail {
            label: label.to_string(),
            guessed: tally.guessed,
            total: tally.total,
            revealed,
        })
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            revealed: self.reveal.len(),
            total: self.total(),
            per_continent: self
                .counters
                .all()
                .map(|(label, tally)| (label.to_string(), tally))
                .collect(),
        }
    }

    pub fn summary(&self) -> Summary {
        let total = self.total();
        let guessed = self.reveal.guessed_count().min(total);
        let accuracy = if total == 0 {
            0
        } else {
            (guessed as f64 / total as f64 * 100.0).round() as u32
        };
        Summary {
            time: self.timer_text(),
            guessed,
            missed: total - guessed,
            accuracy,
            continents: self
                .counters
                .panel()
                .map(|(label, tally)| ContinentLine {
                    label: label.to_string(),
                    guessed: tally.guessed,
                    total: tally.total,
                })
                .collect(),
        }
    }

    fn show_entity(&self, entity: &GeographicEntity, style: RevealStyle) -> Intent {
        let font_min = entity.label_font_min.unwrap_or(self.config.label_font_min);
        let font_max = entity.label_font_max.unwrap_or(self.config.label_font_max);
        Intent::ShowEntity {
            entity: entity.id,
            name: entity.name.clone(),
            style,
            label: LabelPlacement {
                text: entity.name.clone(),
                at: entity.label_point(),
                font_px: label_font_size(font_min, font_max, self.viewport.zoom, &self.config),
                font_min,
                font_max,
            },
        }
    }
}
