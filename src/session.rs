use crate::layout::Layout;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NotStarted,
    Running,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::NotStarted => write!(f, "not started"),
            SessionState::Running => write!(f, "running"),
            SessionState::Ended => write!(f, "ended"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Repeating elapsed-time tick.
    Tick,
    /// Summary shown after the last entity is revealed.
    EndAfterFinalReveal,
    /// Locator map resize after a layout change.
    RefreshLocator,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    due_ms: u64,
    seq: u64,
    period_ms: Option<u64>,
    kind: TaskKind,
}

/// Deferred work on a logical millisecond clock.
///
/// Nothing here reads wall time; callers move the clock with
/// [`Scheduler::pop_due`] and [`Scheduler::settle`].
#[derive(Debug, Default, Clone)]
pub struct Scheduler {
    now_ms: u64,
    next_seq: u64,
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule_once(&mut self, kind: TaskKind, delay_ms: u64) {
        self.push(kind, delay_ms, None);
    }

    /// A zero period is treated as one millisecond.
    pub fn schedule_repeating(&mut self, kind: TaskKind, period_ms: u64) {
        let period_ms = period_ms.max(1);
        self.push(kind, period_ms, Some(period_ms));
    }

    fn push(&mut self, kind: TaskKind, delay_ms: u64, period_ms: Option<u64>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.push(ScheduledTask {
            due_ms: self.now_ms.saturating_add(delay_ms),
            seq,
            period_ms,
            kind,
        });
    }

    pub fn cancel(&mut self, kind: TaskKind) {
        self.tasks.retain(|task| task.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_pending(&self, kind: TaskKind) -> bool {
        self.tasks.iter().any(|task| task.kind == kind)
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    fn earliest_due(&self, until_ms: u64) -> Option<(usize, ScheduledTask)> {
        self.tasks
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, task)| task.due_ms <= until_ms)
            .min_by_key(|(_, task)| (task.due_ms, task.seq))
    }

    fn reschedule(&mut self, position: usize, due_ms: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = &mut self.tasks[position];
        slot.due_ms = due_ms;
        slot.seq = seq;
    }

    /// Fires the earliest task due at or before `until_ms`, moving the clock
    /// to its due time. Ties fire in scheduling order.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<TaskKind> {
        let (position, task) = self.earliest_due(until_ms)?;
        self.now_ms = self.now_ms.max(task.due_ms);
        match task.period_ms {
            Some(period) => self.reschedule(position, task.due_ms.saturating_add(period)),
            None => {
                self.tasks.remove(position);
            }
        }
        Some(task.kind)
    }

    /// Like [`Scheduler::pop_due`], but a repeating task fires every period
    /// that falls due before any other pending task in one step.
    ///
    /// Returns the task and how many periods fired.
    pub fn pop_due_run(&mut self, until_ms: u64) -> Option<(TaskKind, u64)> {
        let (position, task) = self.earliest_due(until_ms)?;
        let Some(period) = task.period_ms else {
            self.now_ms = self.now_ms.max(task.due_ms);
            self.tasks.remove(position);
            return Some((task.kind, 1));
        };
        // Periods landing on another task's due time go through tie ordering.
        let horizon = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != position)
            .map(|(_, other)| other.due_ms.saturating_sub(1))
            .fold(until_ms, u64::min);
        let runs = if horizon > task.due_ms {
            (horizon - task.due_ms) / period + 1
        } else {
            1
        };
        let last_due = task
            .due_ms
            .saturating_add(period.saturating_mul(runs - 1));
        self.now_ms = self.now_ms.max(last_due);
        self.reschedule(position, last_due.saturating_add(period));
        Some((task.kind, runs))
    }

    /// Moves the clock to `until_ms` once every due task has fired.
    pub fn settle(&mut self, until_ms: u64) {
        self.now_ms = self.now_ms.max(until_ms);
    }
}

/// Lifecycle, timer and panel state of one game.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) elapsed_secs: u64,
    pub(crate) input_enabled: bool,
    pub(crate) selected_continent: Option<String>,
    pub(crate) panel_open: bool,
    pub(crate) summary_visible: bool,
    pub(crate) width_px: u32,
    pub(crate) layout: Option<Layout>,
    pub(crate) scheduler: Scheduler,
}

impl Session {
    pub fn new(width_px: u32) -> Self {
        Self {
            state: SessionState::NotStarted,
            elapsed_secs: 0,
            input_enabled: false,
            selected_continent: None,
            panel_open: false,
            summary_visible: false,
            width_px,
            layout: None,
            scheduler: Scheduler::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn selected_continent(&self) -> Option<&str> {
        self.selected_continent.as_deref()
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn summary_visible(&self) -> bool {
        self.summary_visible
    }

    pub fn width_px(&self) -> u32 {
        self.width_px
    }

    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_once(TaskKind::EndAfterFinalReveal, 1_000);
        assert_eq!(scheduler.pop_due(999), None);
        assert_eq!(scheduler.pop_due(1_000), Some(TaskKind::EndAfterFinalReveal));
        assert_eq!(scheduler.pop_due(5_000), None);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn repeating_task_fires_per_period() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_repeating(TaskKind::Tick, 1_000);
        let mut fired = 0;
        while scheduler.pop_due(3_500).is_some() {
            fired += 1;
        }
        scheduler.settle(3_500);
        assert_eq!(fired, 3);
        assert_eq!(scheduler.now_ms(), 3_500);
        assert_eq!(scheduler.pop_due(4_000), Some(TaskKind::Tick));
    }

    #[test]
    fn due_order_then_schedule_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_repeating(TaskKind::Tick, 1_000);
        scheduler.schedule_once(TaskKind::EndAfterFinalReveal, 1_000);
        scheduler.schedule_once(TaskKind::RefreshLocator, 0);
        assert_eq!(scheduler.pop_due(2_000), Some(TaskKind::RefreshLocator));
        assert_eq!(scheduler.pop_due(2_000), Some(TaskKind::Tick));
        assert_eq!(scheduler.pop_due(2_000), Some(TaskKind::EndAfterFinalReveal));
        assert_eq!(scheduler.pop_due(2_000), Some(TaskKind::Tick));
        assert_eq!(scheduler.pop_due(2_000), None);
    }

    #[test]
    fn repeating_run_collapses_idle_periods() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_repeating(TaskKind::Tick, 1_000);
        assert_eq!(scheduler.pop_due_run(86_400_500), Some((TaskKind::Tick, 86_400)));
        assert_eq!(scheduler.pop_due_run(86_400_500), None);
        scheduler.settle(86_400_500);
        assert_eq!(scheduler.pop_due(86_401_000), Some(TaskKind::Tick));
    }

    #[test]
    fn repeating_run_stops_before_other_tasks() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_repeating(TaskKind::Tick, 1_000);
        scheduler.schedule_once(TaskKind::EndAfterFinalReveal, 3_000);
        assert_eq!(scheduler.pop_due_run(10_000), Some((TaskKind::Tick, 2)));
        assert_eq!(scheduler.now_ms(), 2_000);
        assert_eq!(
            scheduler.pop_due_run(10_000),
            Some((TaskKind::EndAfterFinalReveal, 1))
        );
        assert_eq!(scheduler.pop_due_run(10_000), Some((TaskKind::Tick, 8)));
        assert_eq!(scheduler.now_ms(), 10_000);
        assert_eq!(scheduler.pop_due_run(10_000), None);
    }

    #[test]
    fn cancel_drops_pending_work() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_repeating(TaskKind::Tick, 1_000);
        scheduler.schedule_once(TaskKind::RefreshLocator, 0);
        scheduler.cancel(TaskKind::RefreshLocator);
        assert!(!scheduler.is_pending(TaskKind::RefreshLocator));
        assert!(scheduler.is_pending(TaskKind::Tick));
        scheduler.cancel_all();
        assert_eq!(scheduler.pop_due(u64::MAX), None);
    }
}
