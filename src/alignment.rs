//! Automatic positioning: search all ranked cluster pairs for the best rigid alignment.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::{self, JoinHandle};

use crate::cluster::rank_cluster_pairs;
use crate::config::RegistrationConfig;
use crate::error::Result;
use crate::estimator::estimate_rigid_transform;
use crate::geometry::Vector3;
use crate::landmark::Landmark;

/// Best alignment of a room onto a floor.
///
/// Applying `rotation_angle` (about Y) and then `translation` to room coordinates places
/// the room in floor coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    pub rotation_angle: f64,
    /// X/Z offset; Y is always zero.
    pub translation: Vector3,
    /// Weighted sum of `compatibility_error` and `transformation_error`.
    pub error: f64,
    pub compatibility_error: f64,
    pub transformation_error: f64,
    /// Room landmarks of the winning pair, in correspondence order with `floor_landmarks`.
    pub room_landmarks: Vec<String>,
    pub floor_landmarks: Vec<String>,
}

/// Finds the lowest-error alignment of `room` landmarks onto `floor` landmarks.
///
/// Returns `Ok(None)` when either side has fewer than `cluster_size` landmarks. That is
/// the normal "cannot auto-position" outcome and callers should fall back to manual
/// positioning. A `config` that fails [`RegistrationConfig::validate`] is an
/// [`Error::InvalidConfig`](crate::Error::InvalidConfig).
#[tracing::instrument(level = "debug", skip_all, fields(room = room.len(), floor = floor.len()))]
pub fn find_best_alignment<R: Rng + ?Sized>(
    room: &[Landmark],
    floor: &[Landmark],
    config: &RegistrationConfig,
    rng: &mut R,
) -> Result<Option<AlignmentResult>> {
    let pairs = rank_cluster_pairs(room, floor, config, rng)?;

    let mut best: Option<AlignmentResult> = None;
    for pair in &pairs {
        let estimate = estimate_rigid_transform(&pair.room.points, &pair.floor.points);
        let error = config.compatibility_weight * pair.compatibility_error
            + config.transformation_error_weight * estimate.error;

        if best.as_ref().map_or(true, |b| error < b.error) {
            best = Some(AlignmentResult {
                rotation_angle: estimate.rotation_angle,
                translation: estimate.translation,
                error,
                compatibility_error: pair.compatibility_error,
                transformation_error: estimate.error,
                room_landmarks: pair.room.names.clone(),
                floor_landmarks: pair.floor.names.clone(),
            });
        }
    }

    match &best {
        Some(result) => tracing::debug!(
            candidates = pairs.len(),
            error = result.error,
            angle = result.rotation_angle,
            "best alignment found"
        ),
        None => tracing::debug!("no cluster pair available for alignment"),
    }
    Ok(best)
}

/// Extracts landmarks from raw scene objects with the configured filter, then searches.
pub fn align_scene_objects<R: Rng + ?Sized>(
    room_objects: &[Landmark],
    floor_objects: &[Landmark],
    config: &RegistrationConfig,
    rng: &mut R,
) -> Result<Option<AlignmentResult>> {
    let room = config.landmark_filter.extract(room_objects);
    let floor = config.landmark_filter.extract(floor_objects);
    find_best_alignment(&room, &floor, config, rng)
}

/// Runs [`align_scene_objects`] on the blocking thread pool.
///
/// The search has no cancellation points. Dropping the handle abandons the result, while
/// the search itself still runs to completion under the sampling caps. `seed` makes the
/// sampling reproducible; `None` seeds from the OS.
pub fn spawn_alignment(
    room_objects: Vec<Landmark>,
    floor_objects: Vec<Landmark>,
    config: RegistrationConfig,
    seed: Option<u64>,
) -> JoinHandle<Result<Option<AlignmentResult>>> {
    task::spawn_blocking(move || {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        align_scene_objects(&room_objects, &floor_objects, &config, &mut rng)
    })
}

/// Awaits [`spawn_alignment`], surfacing a panicked search as [`crate::Error::Join`].
pub async fn align_scene_objects_async(
    room_objects: Vec<Landmark>,
    floor_objects: Vec<Landmark>,
    config: RegistrationConfig,
    seed: Option<u64>,
) -> Result<Option<AlignmentResult>> {
    spawn_alignment(room_objects, floor_objects, config, seed).await?
}
