use crate::game::Game;
use crate::intent::Intent;
use parking_lot::RwLock;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const MAX_SESSION_COUNT: usize = 4096;

/// Live games keyed by visitor session id.
#[derive(Clone)]
pub struct SessionStore {
    shared: Arc<RwLock<SessionMap>>,
    capacity: usize,
}

#[derive(Default)]
struct SessionMap {
    slots: HashMap<String, SessionSlot>,
    next_touch: u64,
}

impl SessionMap {
    fn touch(&mut self) -> u64 {
        self.next_touch += 1;
        self.next_touch
    }
}

struct SessionSlot {
    game: Game,
    last_seen: Instant,
    touched: u64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSION_COUNT)
    }
}

impl SessionStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(RwLock::new(SessionMap::default())),
            capacity: capacity.max(1),
        }
    }

    /// Stores a new game, evicting the least recently used one when full.
    pub fn create(&self, game: Game) -> String {
        let session_id = generate_session_id();
        let mut guard = self.shared.write();
        while guard.slots.len() >= self.capacity {
            let Some(oldest) = oldest_session_key(&guard.slots) else {
                break;
            };
            debug!(session = %oldest, "evicting idle quiz session");
            guard.slots.remove(&oldest);
        }
        let touched = guard.touch();
        guard.slots.insert(
            session_id.clone(),
            SessionSlot {
                game,
                last_seen: Instant::now(),
                touched,
            },
        );
        session_id
    }

    /// Runs `f` against a session after catching its clock up to wall time.
    ///
    /// `f` receives the intents produced by timers that fired in the
    /// meantime so they can be returned ahead of its own.
    pub fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Game, Vec<Intent>) -> R,
    ) -> Option<R> {
        let mut guard = self.shared.write();
        let touched = guard.touch();
        let slot = guard.slots.get_mut(session_id)?;
        let now = Instant::now();
        let pending = slot.game.advance(now.saturating_duration_since(slot.last_seen));
        slot.last_seen = now;
        slot.touched = touched;
        Some(f(&mut slot.game, pending))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.shared.read().slots.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.shared.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.read().slots.is_empty()
    }
}

fn oldest_session_key(sessions: &HashMap<String, SessionSlot>) -> Option<String> {
    sessions
        .iter()
        .min_by_key(|(_, slot)| slot.touched)
        .map(|(key, _)| key.clone())
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}
