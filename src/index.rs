use crate::dataset::{Bounds, Dataset, LatLng, LoadError, geometry_bounds};
use crate::normalize::{collation_key, normalize_name};
use fst::automaton::Str;
use fst::{Automaton, IntoStreamer, Map, Streamer};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type EntityId = u32;

/// Group label for features without a continent.
pub const UNKNOWN_CONTINENT: &str = "Unknown";

static SAMPLE_WORLD_GEOJSON: &str = include_str!("../data/sample_world.geojson");

static SAMPLE_WORLD: Lazy<Arc<NameIndex>> = Lazy::new(|| {
    Arc::new(
        NameIndex::from_geojson_str(SAMPLE_WORLD_GEOJSON).expect("bundled sample world is valid"),
    )
});

/// One country or territory, immutable after load.
#[derive(Debug, Clone, Serialize)]
pub struct GeographicEntity {
    pub id: EntityId,
    pub name: String,
    pub key: String,
    pub continent: String,
    pub aliases: Vec<String>,
    #[serde(skip)]
    pub geometry: Value,
    pub bounds: Option<Bounds>,
    pub label_anchor: Option<LatLng>,
    pub label_font_min: Option<f64>,
    pub label_font_max: Option<f64>,
}

impl GeographicEntity {
    /// Configured anchor, falling back to the centre of the geometry bounds.
    pub fn label_point(&self) -> Option<LatLng> {
        self.label_anchor
            .or_else(|| self.bounds.map(|bounds| bounds.center()))
    }
}

/// A key claimed by more than one entity during load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasCollision {
    pub key: String,
    pub kept: String,
    pub ignored: String,
}

#[derive(Debug, Clone, Copy)]
struct KeySlot {
    id: EntityId,
    canonical: bool,
}

/// Normalized name (canonical or alias) to entity lookup, built once per
/// dataset and read-only afterwards.
pub struct NameIndex {
    entities: Vec<GeographicEntity>,
    keys: HashMap<String, KeySlot>,
    by_display: Vec<EntityId>,
    display_rank: Vec<usize>,
    canonical_keys: Map<Vec<u8>>,
    continent_totals: BTreeMap<String, usize>,
    collisions: Vec<AliasCollision>,
}

impl NameIndex {
    /// Small embedded world used when no dataset path is supplied.
    pub fn bundled() -> Arc<NameIndex> {
        Arc::clone(&SAMPLE_WORLD)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::build(Dataset::from_path(path)?)
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, LoadError> {
        Self::build(Dataset::from_geojson_str(payload)?)
    }

    /// Indexes every named feature.
    ///
    /// Nameless features are skipped. A canonical key always resolves to its
    /// own entity: an alias never displaces a canonical key, even one loaded
    /// earlier, and among aliases the last registration wins. A repeated
    /// display name replaces the earlier feature along with its aliases.
    /// Every displaced claim is logged and kept in [`NameIndex::collisions`].
    pub fn build(dataset: Dataset) -> Result<Self, LoadError> {
        let mut entities: Vec<GeographicEntity> = Vec::with_capacity(dataset.features.len());
        let mut keys: HashMap<String, KeySlot> = HashMap::new();
        let mut collisions = Vec::new();
        let mut skipped = 0usize;

        for feature in dataset.features {
            let props = &feature.properties;
            let Some(name) = props.display_name() else {
                skipped += 1;
                debug!("skipping feature without a display name");
                continue;
            };
            let key = normalize_name(name);
            if key.is_empty() {
                skipped += 1;
                debug!(name, "skipping feature whose name normalizes to nothing");
                continue;
            }
            let continent = props
                .continent
                .as_deref()
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .unwrap_or(UNKNOWN_CONTINENT)
                .to_string();
            let aliases: Vec<String> = props.alias_list().map(str::to_string).collect();
            let bounds = feature.geometry.as_ref().and_then(geometry_bounds);

            let id = match keys.get(&key).copied() {
                Some(slot) if slot.canonical => {
                    let previous = &entities[slot.id as usize];
                    warn!(
                        key = %key,
                        replaced = %previous.name,
                        by = name,
                        "duplicate display name, keeping the later feature"
                    );
                    collisions.push(AliasCollision {
                        key: key.clone(),
                        kept: name.to_string(),
                        ignored: previous.name.clone(),
                    });
                    keys.retain(|_, other| other.canonical || other.id != slot.id);
                    slot.id
                }
                _ => entities.len() as EntityId,
            };

            let entity = GeographicEntity {
                id,
                name: name.to_string(),
                key: key.clone(),
                continent,
                aliases,
                geometry: feature.geometry.unwrap_or(Value::Null),
                bounds,
                label_anchor: props.label_anchor(),
                label_font_min: props.label_min.filter(|v| v.is_finite()),
                label_font_max: props.label_max.filter(|v| v.is_finite()),
            };

            if let Some(displaced) = keys.insert(key.clone(), KeySlot { id, canonical: true }) {
                if !displaced.canonical && displaced.id != id {
                    warn!(
                        key = %key,
                        alias_of = %entities[displaced.id as usize].name,
                        canonical = name,
                        "alias shadowed by a canonical name"
                    );
                    collisions.push(AliasCollision {
                        key: key.clone(),
                        kept: name.to_string(),
                        ignored: entities[displaced.id as usize].name.clone(),
                    });
                }
            }

            for alias in &entity.aliases {
                let alias_key = normalize_name(alias);
                if alias_key.is_empty() {
                    continue;
                }
                match keys.get(&alias_key).copied() {
                    Some(slot) if slot.id == id => {}
                    Some(slot) if slot.canonical => {
                        let owner = entities[slot.id as usize].name.as_str();
                        warn!(
                            key = %alias_key,
                            owner,
                            alias_of = name,
                            "alias collides with a canonical name, ignoring alias"
                        );
                        collisions.push(AliasCollision {
                            key: alias_key,
                            kept: owner.to_string(),
                            ignored: name.to_string(),
                        });
                    }
                    Some(slot) => {
                        let previous = entities[slot.id as usize].name.as_str();
                        warn!(
                            key = %alias_key,
                            previous,
                            now = name,
                            "alias claimed by two features, last one wins"
                        );
                        collisions.push(AliasCollision {
                            key: alias_key.clone(),
                            kept: name.to_string(),
                            ignored: previous.to_string(),
                        });
                        keys.insert(alias_key, KeySlot { id, canonical: false });
                    }
                    None => {
                        keys.insert(alias_key, KeySlot { id, canonical: false });
                    }
                }
            }

            if (id as usize) < entities.len() {
                entities[id as usize] = entity;
            } else {
                entities.push(entity);
            }
        }

        if entities.is_empty() {
            return Err(LoadError::Empty);
        }

        let mut continent_totals = BTreeMap::new();
        for entity in &entities {
            *continent_totals.entry(entity.continent.clone()).or_insert(0) += 1;
        }

        let mut by_display: Vec<EntityId> = entities.iter().map(|entity| entity.id).collect();
        by_display.sort_by_cached_key(|&id| {
            let name = &entities[id as usize].name;
            (collation_key(name), name.clone())
        });
        let mut display_rank = vec![0usize; entities.len()];
        for (rank, &id) in by_display.iter().enumerate() {
            display_rank[id as usize] = rank;
        }

        let mut sorted_keys: Vec<(&str, u64)> = entities
            .iter()
            .map(|entity| (entity.key.as_str(), entity.id as u64))
            .collect();
        sorted_keys.sort_unstable();
        let canonical_keys = Map::from_iter(sorted_keys)?;

        info!(
            entities = entities.len(),
            keys = keys.len(),
            skipped,
            collisions = collisions.len(),
            "name index built"
        );

        Ok(Self {
            entities,
            keys,
            by_display,
            display_rank,
            canonical_keys,
            continent_totals,
            collisions,
        })
    }

    /// Exact lookup of an already-normalized key.
    pub fn lookup(&self, key: &str) -> Option<&GeographicEntity> {
        self.keys
            .get(key)
            .map(|slot| &self.entities[slot.id as usize])
    }

    /// Normalizes free text, then looks it up.
    pub fn resolve(&self, raw: &str) -> Option<&GeographicEntity> {
        self.lookup(&normalize_name(raw))
    }

    pub fn entity(&self, id: EntityId) -> Option<&GeographicEntity> {
        self.entities.get(id as usize)
    }

    /// Entities in load order.
    pub fn entities(&self) -> &[GeographicEntity] {
        &self.entities
    }

    /// Entities in display-name order.
    pub fn sorted_by_display(&self) -> impl Iterator<Item = &GeographicEntity> {
        self.by_display
            .iter()
            .map(|&id| &self.entities[id as usize])
    }

    pub fn display_rank(&self, id: EntityId) -> Option<usize> {
        self.display_rank.get(id as usize).copied()
    }

    /// Entities whose canonical key starts with `prefix`, in display order.
    pub fn canonical_prefix_matches(&self, prefix: &str) -> Vec<EntityId> {
        let automaton = Str::new(prefix).starts_with();
        let mut stream = self.canonical_keys.search(automaton).into_stream();
        let mut ids = Vec::new();
        while let Some((_, value)) = stream.next() {
            ids.push(value as EntityId);
        }
        ids.sort_by_key(|&id| self.display_rank[id as usize]);
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of distinct lookup keys, canonical and alias.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn continent_totals(&self) -> &BTreeMap<String, usize> {
        &self.continent_totals
    }

    pub fn continent_total(&self, label: &str) -> usize {
        self.continent_totals.get(label).copied().unwrap_or(0)
    }

    pub fn collisions(&self) -> &[AliasCollision] {
        &self.collisions
    }
}
