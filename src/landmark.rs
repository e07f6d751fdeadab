//! Named scene objects and the filter that keeps only usable landmarks.

use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Point3};

/// Type assigned to names with no leading non-digit characters.
pub const UNKNOWN_TYPE: &str = "unknown";

/// A named, typed 3D object from a room or floor snapshot.
///
/// Landmarks are plain values: the engine reads their positions and never writes back to
/// the scene they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub kind: String,
    pub position: Point3,
    pub bounding_box: Aabb,
}

impl Landmark {
    /// Builds a landmark, deriving its type from the name with the default clone prefixes.
    pub fn new(name: impl Into<String>, position: Point3, bounding_box: Aabb) -> Self {
        let name = name.into();
        let kind = derive_type(&name, &LandmarkFilter::default().clone_prefixes);
        Self {
            name,
            kind,
            position,
            bounding_box,
        }
    }

    /// A landmark with a zero-sized bounding box at `position`.
    pub fn at(name: impl Into<String>, position: Point3) -> Self {
        Self::new(name, position, Aabb::new(position, position))
    }

    pub fn volume(&self) -> f64 {
        self.bounding_box.volume()
    }
}

/// Derives an object type from its name.
///
/// The name is lower-cased, a leading clone prefix (e.g. `clone_`) is dropped, and the
/// longest leading run of non-digit characters is kept: `"Door12"` becomes `"door"`.
pub fn derive_type(name: &str, clone_prefixes: &[String]) -> String {
    let lower = name.trim().to_lowercase();
    let mut stem = lower.as_str();
    loop {
        let current = stem;
        let stripped = clone_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .find_map(|prefix| current.strip_prefix(prefix.to_lowercase().as_str()));
        match stripped {
            Some(rest) => stem = rest,
            None => break,
        }
    }

    let kind: String = stem.chars().take_while(|c| !c.is_ascii_digit()).collect();
    if kind.is_empty() {
        UNKNOWN_TYPE.to_string()
    } else {
        kind
    }
}

/// Keeps the landmarks likely to have a recognizable counterpart on the other side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkFilter {
    /// Types that survive filtering.
    pub allowed_types: Vec<String>,
    /// Prefixes stripped from names before the type is derived.
    pub clone_prefixes: Vec<String>,
    /// Objects with a smaller bounding-box volume are dropped. Zero disables the check.
    pub min_volume: f64,
}

impl Default for LandmarkFilter {
    fn default() -> Self {
        Self {
            allowed_types: vec!["door".into(), "opening".into(), "window".into()],
            clone_prefixes: vec!["clone_".into(), "copy_".into()],
            min_volume: 0.0,
        }
    }
}

impl LandmarkFilter {
    pub fn with_allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_volume(mut self, volume: f64) -> Self {
        self.min_volume = volume;
        self
    }

    pub fn accepts(&self, landmark: &Landmark) -> bool {
        let kind = derive_type(&landmark.name, &self.clone_prefixes);
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&kind))
            && (self.min_volume <= 0.0 || landmark.volume() >= self.min_volume)
    }

    /// Returns the accepted landmarks with their type re-derived under this filter's
    /// prefixes.
    pub fn extract(&self, objects: &[Landmark]) -> Vec<Landmark> {
        objects
            .iter()
            .filter(|l| self.accepts(l))
            .map(|l| Landmark {
                kind: derive_type(&l.name, &self.clone_prefixes),
                ..l.clone()
            })
            .collect()
    }
}
