//! Room-to-floor registration.
//!
//! Rooms and floors are scanned as independent 3D models. This crate places a room inside
//! its floor's coordinate space with a rotation about the vertical (Y) axis and a planar
//! translation. It defines:
//! - [`find_best_alignment`]: automatic positioning from matched clusters of landmarks
//!   (doors, openings, windows).
//! - [`TransformRecord`]: a room's placement, with incremental manual adjustment.
//! - [`load_association_matrix`] / [`save_association_matrix`]: the per-floor JSON
//!   document of room placements.
//! - [`Floor`] and [`PositioningSession`]: the lifecycle around those pieces.
//!
//! The engine works on value snapshots of landmark positions and never touches scene
//! geometry. Displaying a placed room goes through the [`SceneNode`] trait.

pub mod alignment;
pub mod cluster;
pub mod config;
pub mod error;
pub mod estimator;
pub mod floor;
pub mod geometry;
pub mod landmark;
pub mod persistence;
pub mod transform;

pub use alignment::{
    align_scene_objects, align_scene_objects_async, find_best_alignment, spawn_alignment,
    AlignmentResult,
};
pub use cluster::{compatibility_error, rank_cluster_pairs, Cluster, ClusterPair};
pub use config::RegistrationConfig;
pub use error::{Error, Result};
pub use estimator::{estimate_rigid_transform, transformation_error, RigidEstimate};
pub use floor::{apply_record, Floor, PositioningSession, SceneNode};
pub use geometry::{Aabb, Point3, Vector3, YawRotation};
pub use landmark::{derive_type, Landmark, LandmarkFilter};
pub use persistence::{
    load_association_matrix, remove_rooms, room_has_position, save_association_matrix,
    save_room, AssociationMatrix,
};
pub use transform::{has_position, TransformRecord};

// Re-export so callers can build points and matrices without a direct `nalgebra` dependency.
pub use nalgebra;

/// File name of a floor's room placement document, inside the floor directory.
pub const ASSOCIATION_FILE_NAME: &str = "association_matrix.json";

/// Placement with a plain translation applied on top of an existing record.
pub fn compose_translation(record: TransformRecord, dx: f64, dz: f64) -> TransformRecord {
    record.compose_translation(dx, dz)
}

/// Placement with one more rotation accumulated onto an existing record.
pub fn compose_rotation(record: TransformRecord, angle: f64) -> TransformRecord {
    record.compose_rotation(angle)
}
