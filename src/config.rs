//! Registration configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::estimator::MIN_CORRESPONDENCES;
use crate::landmark::LandmarkFilter;

/// Largest supported cluster size. Matching tries every ordering of a cluster, so the cost
/// grows with `k!`.
pub const MAX_CLUSTER_SIZE: usize = 6;

/// Parameters for cluster matching and automatic positioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Landmarks per cluster.
    /// Default: 3
    pub cluster_size: usize,

    /// Room landmarks kept before clustering; larger inputs are randomly sampled.
    /// Default: 20
    pub max_sampled_room_landmarks: usize,

    /// Floor landmarks kept before clustering.
    /// Default: 40
    pub max_sampled_floor_landmarks: usize,

    /// Default: 1000
    pub max_room_clusters: usize,

    /// Default: 10000
    pub max_floor_clusters: usize,

    /// Candidate pairs handed to the rigid estimator, best first.
    /// Default: 1000
    pub max_pairs: usize,

    /// Weight of the shape compatibility error in the total error.
    /// Default: 1.0
    pub compatibility_weight: f64,

    /// Weight of the post-transform residual in the total error.
    /// Default: 1.0
    pub transformation_error_weight: f64,

    pub landmark_filter: LandmarkFilter,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            cluster_size: 3,
            max_sampled_room_landmarks: 20,
            max_sampled_floor_landmarks: 40,
            max_room_clusters: 1000,
            max_floor_clusters: 10_000,
            max_pairs: 1000,
            compatibility_weight: 1.0,
            transformation_error_weight: 1.0,
            landmark_filter: LandmarkFilter::default(),
        }
    }
}

impl RegistrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster_size(mut self, size: usize) -> Self {
        self.cluster_size = size;
        self
    }

    pub fn with_max_sampled_landmarks(mut self, room: usize, floor: usize) -> Self {
        self.max_sampled_room_landmarks = room;
        self.max_sampled_floor_landmarks = floor;
        self
    }

    pub fn with_max_clusters(mut self, room: usize, floor: usize) -> Self {
        self.max_room_clusters = room;
        self.max_floor_clusters = floor;
        self
    }

    pub fn with_max_pairs(mut self, pairs: usize) -> Self {
        self.max_pairs = pairs;
        self
    }

    pub fn with_error_weights(mut self, compatibility: f64, transformation: f64) -> Self {
        self.compatibility_weight = compatibility;
        self.transformation_error_weight = transformation;
        self
    }

    pub fn with_landmark_filter(mut self, filter: LandmarkFilter) -> Self {
        self.landmark_filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_CORRESPONDENCES..=MAX_CLUSTER_SIZE).contains(&self.cluster_size) {
            return Err(Error::InvalidConfig(format!(
                "cluster_size must be between {MIN_CORRESPONDENCES} and {MAX_CLUSTER_SIZE}, got {}",
                self.cluster_size
            )));
        }
        if self.max_sampled_room_landmarks < self.cluster_size
            || self.max_sampled_floor_landmarks < self.cluster_size
        {
            return Err(Error::InvalidConfig(
                "landmark sampling caps must be at least cluster_size".into(),
            ));
        }
        if self.max_room_clusters == 0 || self.max_floor_clusters == 0 || self.max_pairs == 0 {
            return Err(Error::InvalidConfig(
                "cluster and pair limits must be positive".into(),
            ));
        }
        for (name, weight) in [
            ("compatibility_weight", self.compatibility_weight),
            ("transformation_error_weight", self.transformation_error_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {weight}"
                )));
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::parse("<config>", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| Error::parse(path, e))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RegistrationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cluster_size, 3);
        assert_eq!(config.max_pairs, 1000);
    }

    #[test]
    fn rejects_small_clusters() {
        let err = RegistrationConfig::default()
            .with_cluster_size(2)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_negative_weights() {
        let config = RegistrationConfig::default().with_error_weights(-1.0, 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = RegistrationConfig::from_json_str(
            r#"{"cluster_size": 4, "landmark_filter": {"allowed_types": ["door"]}}"#,
        )
        .expect("valid config");
        assert_eq!(config.cluster_size, 4);
        assert_eq!(config.max_floor_clusters, 10_000);
        assert_eq!(config.landmark_filter.allowed_types, vec!["door".to_string()]);
        assert_eq!(config.landmark_filter.clone_prefixes.len(), 2);
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        assert!(matches!(
            RegistrationConfig::from_json_str(r#"{"cluster_size": 9}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            RegistrationConfig::from_json_str("not json"),
            Err(Error::Parse { .. })
        ));
    }
}
