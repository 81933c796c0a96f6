use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    NotFeatureCollection,
    Empty,
    Index(fst::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "dataset read failed: {err}"),
            LoadError::Parse(err) => write!(f, "dataset parse failed: {err}"),
            LoadError::NotFeatureCollection => {
                write!(f, "dataset is not a GeoJSON FeatureCollection")
            }
            LoadError::Empty => write!(f, "dataset contains no named features"),
            LoadError::Index(err) => write!(f, "prefix index build failed: {err}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(value: std::io::Error) -> Self {
        LoadError::Io(value)
    }
}

impl From<fst::Error> for LoadError {
    fn from(value: fst::Error) -> Self {
        LoadError::Index(value)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(value: serde_json::Error) -> Self {
        LoadError::Parse(value)
    }
}

/// A parsed feature collection, prior to indexing.
#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    pub features: Vec<RawFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFeature {
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: FeatureProperties,
    #[serde(default)]
    pub geometry: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureProperties {
    #[serde(default)]
    pub country_name: Option<String>,
    /// Comma-delimited alternate names.
    #[serde(default)]
    pub aliases: Option<String>,
    #[serde(default)]
    pub continent: Option<String>,
    #[serde(default)]
    pub label_x: Option<f64>,
    #[serde(default)]
    pub label_y: Option<f64>,
    #[serde(default)]
    pub label_min: Option<f64>,
    #[serde(default)]
    pub label_max: Option<f64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Dataset {
    pub fn from_geojson_str(payload: &str) -> Result<Self, LoadError> {
        let dataset: Dataset = serde_json::from_str(payload)?;
        if dataset.kind != "FeatureCollection" {
            return Err(LoadError::NotFeatureCollection);
        }
        Ok(dataset)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let payload = fs::read_to_string(path)?;
        Self::from_geojson_str(&payload)
    }
}

impl FeatureProperties {
    /// The display name, or `None` when absent or blank.
    pub fn display_name(&self) -> Option<&str> {
        self.country_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn alias_list(&self) -> impl Iterator<Item = &str> {
        self.aliases
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
    }

    /// Explicit label anchor, only when both coordinates are finite.
    pub fn label_anchor(&self) -> Option<LatLng> {
        match (self.label_y, self.label_x) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(LatLng { lat, lng })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Axis-aligned geographic bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.south + self.north) / 2.0,
            lng: (self.west + self.east) / 2.0,
        }
    }

    fn point(lng: f64, lat: f64) -> Self {
        Self {
            south: lat,
            west: lng,
            north: lat,
            east: lng,
        }
    }

    fn extend(&mut self, other: Bounds) {
        self.south = self.south.min(other.south);
        self.west = self.west.min(other.west);
        self.north = self.north.max(other.north);
        self.east = self.east.max(other.east);
    }
}

/// Bounds of every `[lng, lat]` position in a GeoJSON geometry.
///
/// Walks `coordinates` at any nesting depth, so every geometry type is
/// covered, including `GeometryCollection`.
pub fn geometry_bounds(geometry: &Value) -> Option<Bounds> {
    if let Some(children) = geometry.get("geometries").and_then(Value::as_array) {
        return children.iter().filter_map(geometry_bounds).reduce(|mut acc, next| {
            acc.extend(next);
            acc
        });
    }
    coordinate_bounds(geometry.get("coordinates")?)
}

fn coordinate_bounds(coords: &Value) -> Option<Bounds> {
    let items = coords.as_array()?;
    if let [lng, lat, ..] = items.as_slice() {
        if let (Some(lng), Some(lat)) = (lng.as_f64(), lat.as_f64()) {
            return Some(Bounds::point(lng, lat));
        }
    }
    items.iter().filter_map(coordinate_bounds).reduce(|mut acc, next| {
        acc.extend(next);
        acc
    })
}
