use crate::index::{EntityId, NameIndex};
use crate::normalize::normalize_name;
use crate::reveal::RevealState;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub entity: EntityId,
    pub name: String,
    /// Display hint only; revealed entities are still suggested.
    pub revealed: bool,
}

/// Entities whose canonical key starts with the normalized prefix, in
/// display-name order, at most `limit` of them.
///
/// Aliases and mid-word matches are never considered, so the result for a
/// given prefix does not depend on call history.
pub fn suggest(
    index: &NameIndex,
    reveal: &RevealState,
    raw_prefix: &str,
    limit: usize,
) -> Vec<Suggestion> {
    let prefix = normalize_name(raw_prefix);
    if prefix.is_empty() || limit == 0 {
        return Vec::new();
    }
    index
        .canonical_prefix_matches(&prefix)
        .into_iter()
        .filter_map(|id| index.entity(id))
        .take(limit)
        .map(|entity| Suggestion {
            entity: entity.id,
            name: entity.name.clone(),
            revealed: reveal.contains(&entity.key),
        })
        .collect()
}

/// Keyboard highlight over the rendered suggestion list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionCursor {
    items: Vec<Suggestion>,
    position: Option<usize>,
}

impl SuggestionCursor {
    /// Replaces the list and clears the highlight.
    pub fn replace(&mut self, items: Vec<Suggestion>) {
        self.items = items;
        self.position = None;
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    pub fn items(&self) -> &[Suggestion] {
        &self.items
    }

    /// Highlighted position, `-1` when nothing is highlighted.
    pub fn index(&self) -> isize {
        self.position.map(|p| p as isize).unwrap_or(-1)
    }

    pub fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let last = self.items.len() - 1;
        self.position = Some(match self.position {
            None => 0,
            Some(p) => (p + 1).min(last),
        });
    }

    pub fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.position = Some(self.position.map(|p| p.saturating_sub(1)).unwrap_or(0));
    }

    /// The highlighted suggestion, if any.
    pub fn confirm(&self) -> Option<&Suggestion> {
        self.position.and_then(|p| self.items.get(p))
    }
}
