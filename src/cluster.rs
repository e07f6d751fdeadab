//! Landmark clusters and cross-side cluster matching.
//!
//! A cluster is a small unordered group of landmarks from one side. Candidate pairs (one
//! room cluster, one floor cluster) are scored by how similar their internal shapes are,
//! which does not depend on where either cluster sits or how it is rotated.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::RegistrationConfig;
use crate::error::Result;
use crate::geometry::{centroid, Point3};
use crate::landmark::Landmark;

/// A fixed-size group of landmarks drawn from one side.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub names: Vec<String>,
    pub points: Vec<Point3>,
}

impl Cluster {
    pub fn from_landmarks(landmarks: &[&Landmark]) -> Self {
        Self {
            names: landmarks.iter().map(|l| l.name.clone()).collect(),
            points: landmarks.iter().map(|l| l.position).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.points.len()
    }

    pub fn centroid(&self) -> Point3 {
        centroid(&self.points)
    }

    /// The same cluster with members listed in `order`.
    pub fn reordered(&self, order: &[usize]) -> Self {
        Self {
            names: order.iter().map(|&i| self.names[i].clone()).collect(),
            points: order.iter().map(|&i| self.points[i]).collect(),
        }
    }

    /// Row-major `k × k` matrix of pairwise distances.
    fn distance_matrix(&self) -> Vec<f64> {
        let k = self.size();
        let mut d = vec![0.0; k * k];
        for i in 0..k {
            for j in (i + 1)..k {
                let dist = (self.points[i] - self.points[j]).norm();
                d[i * k + j] = dist;
                d[j * k + i] = dist;
            }
        }
        d
    }
}

/// Shape mismatch between two clusters under their current member order.
///
/// Sum of squared differences of the pairwise-distance matrices. Zero means the two
/// clusters are congruent with members listed in corresponding order.
pub fn compatibility_error(a: &Cluster, b: &Cluster) -> f64 {
    assert_eq!(a.size(), b.size(), "clusters must have the same size");
    let k = a.size();
    let identity: Vec<usize> = (0..k).collect();
    permuted_error(&a.distance_matrix(), &b.distance_matrix(), k, &identity)
}

fn permuted_error(a: &[f64], b: &[f64], k: usize, order: &[usize]) -> f64 {
    let mut error = 0.0;
    for i in 0..k {
        for j in 0..k {
            let diff = a[i * k + j] - b[order[i] * k + order[j]];
            error += diff * diff;
        }
    }
    error
}

/// A candidate correspondence between a room cluster and a floor cluster.
///
/// `floor` is ordered so that `floor.points[i]` corresponds to `room.points[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPair {
    pub room: Cluster,
    pub floor: Cluster,
    pub compatibility_error: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    error: f64,
    room: usize,
    floor: usize,
    order: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error
            .total_cmp(&other.error)
            .then(self.room.cmp(&other.room))
            .then(self.floor.cmp(&other.floor))
            .then(self.order.cmp(&other.order))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Ranks room/floor cluster pairs by ascending compatibility error.
///
/// Each pair is listed once per ordering of the floor cluster, so `max_pairs` bounds the
/// number of ordered correspondences handed on.
///
/// Returns an empty list when either side has fewer than `cluster_size` landmarks. When a
/// side exceeds its sampling cap a random subset is drawn from `rng`; below the caps the
/// result is exhaustive and does not depend on input order.
///
/// Fails with [`Error::InvalidConfig`](crate::Error::InvalidConfig) when `config` does not
/// pass [`RegistrationConfig::validate`].
pub fn rank_cluster_pairs<R: Rng + ?Sized>(
    room: &[Landmark],
    floor: &[Landmark],
    config: &RegistrationConfig,
    rng: &mut R,
) -> Result<Vec<ClusterPair>> {
    config.validate()?;

    let k = config.cluster_size;
    if room.len() < k || floor.len() < k {
        tracing::debug!(
            room = room.len(),
            floor = floor.len(),
            cluster_size = k,
            "not enough landmarks to form clusters"
        );
        return Ok(Vec::new());
    }

    let room = sample_landmarks(room, config.max_sampled_room_landmarks, rng);
    let floor = sample_landmarks(floor, config.max_sampled_floor_landmarks, rng);
    let room_clusters = build_clusters(&room, k, config.max_room_clusters);
    let floor_clusters = build_clusters(&floor, k, config.max_floor_clusters);

    let room_distances: Vec<_> = room_clusters.iter().map(Cluster::distance_matrix).collect();
    let floor_distances: Vec<_> = floor_clusters.iter().map(Cluster::distance_matrix).collect();
    let orders = permutations(k);

    let mut best: BinaryHeap<Candidate> = BinaryHeap::with_capacity(config.max_pairs + 1);
    for (ri, rd) in room_distances.iter().enumerate() {
        for (fi, fd) in floor_distances.iter().enumerate() {
            // Every ordering is its own candidate: symmetric clusters have several
            // orderings with the same shape error, and only the rigid fit tells them apart.
            for (oi, order) in orders.iter().enumerate() {
                let candidate = Candidate {
                    error: permuted_error(rd, fd, k, order),
                    room: ri,
                    floor: fi,
                    order: oi,
                };
                if best.len() < config.max_pairs {
                    best.push(candidate);
                } else if best.peek().is_some_and(|worst| candidate < *worst) {
                    best.pop();
                    best.push(candidate);
                }
            }
        }
    }

    tracing::debug!(
        room_landmarks = room.len(),
        floor_landmarks = floor.len(),
        room_clusters = room_clusters.len(),
        floor_clusters = floor_clusters.len(),
        pairs = best.len(),
        "ranked cluster pairs"
    );

    Ok(best
        .into_sorted_vec()
        .into_iter()
        .map(|c| ClusterPair {
            room: room_clusters[c.room].clone(),
            floor: floor_clusters[c.floor].reordered(&orders[c.order]),
            compatibility_error: c.error,
        })
        .collect())
}

fn canonical_order(a: &&Landmark, b: &&Landmark) -> Ordering {
    a.name
        .cmp(&b.name)
        .then(a.position.x.total_cmp(&b.position.x))
        .then(a.position.y.total_cmp(&b.position.y))
        .then(a.position.z.total_cmp(&b.position.z))
}

/// Canonically ordered landmarks, randomly capped at `cap` entries.
fn sample_landmarks<'a, R: Rng + ?Sized>(
    landmarks: &'a [Landmark],
    cap: usize,
    rng: &mut R,
) -> Vec<&'a Landmark> {
    let mut sampled: Vec<&Landmark> = landmarks.iter().collect();
    sampled.sort_by(canonical_order);
    if sampled.len() > cap {
        sampled.shuffle(rng);
        sampled.truncate(cap);
        sampled.sort_by(canonical_order);
    }
    sampled
}

fn build_clusters(landmarks: &[&Landmark], k: usize, limit: usize) -> Vec<Cluster> {
    combinations(landmarks.len(), k, limit)
        .iter()
        .map(|indices| {
            let members: Vec<&Landmark> = indices.iter().map(|&i| landmarks[i]).collect();
            Cluster::from_landmarks(&members)
        })
        .collect()
}

/// Lexicographic `k`-combinations of `0..n`, at most `limit` of them.
fn combinations(n: usize, k: usize, limit: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k == 0 || k > n {
        return out;
    }

    let mut indices: Vec<usize> = (0..k).collect();
    while out.len() < limit {
        out.push(indices.clone());

        // Advance the rightmost index that still has room.
        let Some(i) = (0..k).rev().find(|&i| indices[i] < n - k + i) else {
            break;
        };
        indices[i] += 1;
        for j in (i + 1)..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
    out
}

/// All orderings of `0..k` in lexicographic order.
fn permutations(k: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                extend(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }

    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(k), &mut vec![false; k], &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::geometry::{Vector3, YawRotation};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn doors(points: &[(f64, f64, f64)]) -> Vec<Landmark> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(x, y, z))| Landmark::at(format!("Door{i}"), Point3::new(x, y, z)))
            .collect()
    }

    #[test]
    fn combinations_are_lexicographic_and_capped() {
        assert_eq!(
            combinations(4, 3, usize::MAX),
            vec![vec![0, 1, 2], vec![0, 1, 3], vec![0, 2, 3], vec![1, 2, 3]]
        );
        assert_eq!(combinations(20, 3, 1000).len(), 1000);
        assert_eq!(combinations(10, 3, usize::MAX).len(), 120);
        assert!(combinations(2, 3, 10).is_empty());
    }

    #[test]
    fn permutations_cover_all_orderings() {
        let perms = permutations(3);
        assert_eq!(perms.len(), 6);
        assert_eq!(perms[0], vec![0, 1, 2]);
        assert_eq!(perms[5], vec![2, 1, 0]);
        assert_eq!(permutations(4).len(), 24);
    }

    #[test]
    fn compatibility_is_rigid_invariant() {
        let a = Cluster::from_landmarks(&[
            &Landmark::at("a", Point3::new(0.0, 0.0, 0.0)),
            &Landmark::at("b", Point3::new(4.0, 0.0, 1.0)),
            &Landmark::at("c", Point3::new(1.0, 0.5, 3.0)),
        ]);
        let r = YawRotation::from_angle(1.1);
        let shift = Vector3::new(-3.0, 0.0, 7.0);
        let moved = Cluster {
            names: a.names.clone(),
            points: a.points.iter().map(|p| r.rotate_point(p) + shift).collect(),
        };
        assert_relative_eq!(compatibility_error(&a, &moved), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn too_few_landmarks_yield_no_pairs() {
        let config = RegistrationConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let room = doors(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)]);
        let floor = doors(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 0.0, 1.0)]);
        assert!(rank_cluster_pairs(&room, &floor, &config, &mut rng)
            .expect("valid config")
            .is_empty());
        assert!(rank_cluster_pairs(&floor, &room, &config, &mut rng)
            .expect("valid config")
            .is_empty());
    }

    #[test]
    fn pairs_are_sorted_and_matched_in_order() {
        let config = RegistrationConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let floor = doors(&[(0.0, 0.0, 0.0), (5.0, 0.0, 0.0), (0.0, 0.0, 2.0), (3.0, 0.0, 6.0)]);
        let r = YawRotation::from_angle(0.4);
        let room: Vec<Landmark> = floor
            .iter()
            .map(|l| Landmark::at(l.name.clone(), r.rotate_point(&l.position)))
            .collect();

        let pairs = rank_cluster_pairs(&room, &floor, &config, &mut rng).expect("valid config");
        // 4 clusters per side, 6 orderings each.
        assert_eq!(pairs.len(), 96);
        assert!(pairs
            .windows(2)
            .all(|w| w[0].compatibility_error <= w[1].compatibility_error));

        let best = &pairs[0];
        assert_relative_eq!(best.compatibility_error, 0.0, epsilon = 1e-9);
        assert_eq!(best.room.names, best.floor.names);
    }

    #[test]
    fn max_pairs_bounds_the_result() {
        let config = RegistrationConfig::default().with_max_pairs(5);
        let mut rng = StdRng::seed_from_u64(3);
        let side = doors(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 0.0, 2.0),
            (3.0, 0.0, 3.0),
            (5.0, 0.0, 1.0),
        ]);
        let pairs = rank_cluster_pairs(&side, &side, &config, &mut rng).expect("valid config");
        assert_eq!(pairs.len(), 5);
        assert!(pairs.iter().all(|p| p.compatibility_error < 1e-9));
    }

    #[test]
    fn ranking_ignores_input_order_below_caps() {
        let config = RegistrationConfig::default();
        let floor = doors(&[(0.0, 0.0, 0.0), (5.0, 0.0, 0.0), (0.0, 0.0, 2.0), (3.0, 0.0, 6.0)]);
        let room = doors(&[(1.0, 0.0, 1.0), (4.0, 0.0, 0.0), (2.0, 0.0, 5.0)]);
        let mut reversed = floor.clone();
        reversed.reverse();

        let a = rank_cluster_pairs(&room, &floor, &config, &mut StdRng::seed_from_u64(1))
            .expect("valid config");
        let b = rank_cluster_pairs(&room, &reversed, &config, &mut StdRng::seed_from_u64(2))
            .expect("valid config");
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_cluster_size_is_rejected_before_enumeration() {
        let mut rng = StdRng::seed_from_u64(4);
        let side = doors(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 0.0, 2.0)]);
        let wide: Vec<Landmark> = (0..20)
            .map(|i| Landmark::at(format!("Door{i}"), Point3::new(i as f64, 0.0, 0.0)))
            .collect();

        let two = RegistrationConfig::default().with_cluster_size(2);
        let err = rank_cluster_pairs(&side, &side, &two, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        // 15! orderings would never finish; validation fails first.
        let fifteen = RegistrationConfig::default().with_cluster_size(15);
        let err = rank_cluster_pairs(&wide, &wide, &fifteen, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn sampling_above_cap_is_reproducible_with_a_seed() {
        let config = RegistrationConfig::default()
            .with_max_sampled_landmarks(4, 4)
            .with_max_pairs(50);
        let side: Vec<Landmark> = (0..12)
            .map(|i| {
                let t = i as f64;
                Landmark::at(format!("Window{i}"), Point3::new(t, 0.0, (t * 1.7) % 5.0))
            })
            .collect();

        let a = rank_cluster_pairs(&side, &side, &config, &mut StdRng::seed_from_u64(11))
            .expect("valid config");
        let b = rank_cluster_pairs(&side, &side, &config, &mut StdRng::seed_from_u64(11))
            .expect("valid config");
        assert_eq!(a, b);
        // 4 sampled landmarks per side give 4 clusters each, 96 ordered pairs in total.
        assert_eq!(a.len(), 50);
    }
}
