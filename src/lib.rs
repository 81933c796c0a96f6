//! Country-naming map quiz engine.
//!
//! The engine owns a [`NameIndex`] built from a GeoJSON feature collection and
//! a [`Game`] that tracks reveals, continent progress and the session
//! lifecycle. Rendering is left to callers: every [`Game`] operation returns
//! the [`Intent`]s a map/DOM layer should apply.

pub mod autocomplete;
pub mod config;
pub mod dataset;
pub mod game;
pub mod index;
pub mod intent;
pub mod layout;
pub mod normalize;
pub mod reveal;
pub mod session;

#[cfg(feature = "web")]
pub mod sessions;
#[cfg(feature = "web")]
pub mod web;

pub use autocomplete::{Suggestion, SuggestionCursor, suggest};
pub use config::QuizConfig;
pub use dataset::{Bounds, Dataset, LatLng, LoadError};
pub use game::{ContinentDetail, Game, RevealOutcome};
pub use index::{AliasCollision, EntityId, GeographicEntity, NameIndex};
pub use intent::{Intent, ProgressSnapshot, RevealStyle, Summary};
pub use layout::{Layout, PanelMode, Viewport};
pub use normalize::normalize_name;
pub use reveal::{CONTINENTS, ContinentCounters, ContinentTally, RevealState};
pub use session::SessionState;
