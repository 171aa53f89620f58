//! Contact manifolds and the cross-step impulse cache
//!
//! Manifolds are rebuilt from scratch by every narrowphase pass. What
//! survives between sub-steps is the accumulated impulse of each point,
//! stored in a [`ManifoldCache`] keyed by the body pair, so the solver can
//! warm-start from last step's answer.

use crate::arena::BodyHandle;
use crate::material::CombinedMaterial;
use crate::narrowphase::BoxContact;
use glam::Vec3;
use std::collections::HashMap;

/// Unordered body pair, stored lower handle first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    first: BodyHandle,
    second: BodyHandle,
}

impl PairKey {
    /// Build a key; argument order does not matter
    #[inline]
    pub fn new(a: BodyHandle, b: BodyHandle) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// Lower handle
    #[inline]
    pub fn first(&self) -> BodyHandle {
        self.first
    }

    /// Higher handle
    #[inline]
    pub fn second(&self) -> BodyHandle {
        self.second
    }

    /// Whether either side is `body`
    #[inline]
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.first == body || self.second == body
    }
}

/// A single contact point within a manifold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManifoldPoint {
    /// World contact position
    pub point: Vec3,
    /// Penetration depth
    pub penetration: f32,
    /// Accumulated normal impulse
    pub normal_impulse: f32,
    /// Accumulated friction impulse (world space, perpendicular to the normal)
    pub tangent_impulse: Vec3,
}

/// Contact between two bodies for one sub-step
#[derive(Debug, Clone, PartialEq)]
pub struct ContactManifold {
    /// First body
    pub body_a: BodyHandle,
    /// Second body
    pub body_b: BodyHandle,
    /// Unit normal from A to B
    pub normal: Vec3,
    /// One to four points
    pub points: Vec<ManifoldPoint>,
    /// Combined friction and restitution
    pub material: CombinedMaterial,
}

impl ContactManifold {
    /// Wrap a narrowphase result
    pub fn from_contact(
        body_a: BodyHandle,
        body_b: BodyHandle,
        contact: BoxContact,
        material: CombinedMaterial,
    ) -> Self {
        let points = contact
            .points
            .into_iter()
            .map(|p| ManifoldPoint {
                point: p.point,
                penetration: p.penetration,
                normal_impulse: 0.0,
                tangent_impulse: Vec3::ZERO,
            })
            .collect();
        Self {
            body_a,
            body_b,
            normal: contact.normal,
            points,
            material,
        }
    }

    /// Cache key for this pair
    #[inline]
    pub fn key(&self) -> PairKey {
        PairKey::new(self.body_a, self.body_b)
    }

    /// Sum of normal impulses
    pub fn total_normal_impulse(&self) -> f32 {
        self.points.iter().map(|p| p.normal_impulse).sum()
    }
}

/// Warm-start matching rules
#[derive(Debug, Clone, Copy)]
pub struct WarmStartParams {
    /// Max distance between a new point and its cached match
    pub distance: f32,
    /// Min dot product between the new and cached normal
    pub normal_similarity: f32,
    /// Scale applied to matched impulses
    pub factor: f32,
}

#[derive(Debug, Clone, Copy)]
struct CachedPoint {
    point: Vec3,
    normal_impulse: f32,
    tangent_impulse: Vec3,
}

/// Persisted state of one body pair
#[derive(Debug, Clone)]
pub struct ManifoldCacheEntry {
    normal: Vec3,
    points: Vec<CachedPoint>,
    stale_frames: u32,
    touching: bool,
    seen: bool,
}

impl ManifoldCacheEntry {
    /// Whether the pair had contact points on its last update
    #[inline]
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    /// Sub-steps since contact was last reported
    #[inline]
    pub fn stale_frames(&self) -> u32 {
        self.stale_frames
    }
}

/// Accumulated impulses keyed by body pair
#[derive(Debug, Default)]
pub struct ManifoldCache {
    entries: HashMap<PairKey, ManifoldCacheEntry>,
}

impl ManifoldCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached pairs
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a pair
    #[inline]
    pub fn get(&self, key: &PairKey) -> Option<&ManifoldCacheEntry> {
        self.entries.get(key)
    }

    /// Seed a fresh manifold's impulses from the cache.
    ///
    /// Each point takes the impulses of the nearest cached point within
    /// `params.distance`, provided the normals agree.
    pub fn warm_start(&self, manifold: &mut ContactManifold, params: &WarmStartParams) {
        let Some(entry) = self.entries.get(&manifold.key()) else {
            return;
        };
        if entry.normal.dot(manifold.normal) < params.normal_similarity {
            return;
        }
        let max_dist_sq = params.distance * params.distance;
        for point in &mut manifold.points {
            let nearest = entry
                .points
                .iter()
                .map(|cached| (cached, cached.point.distance_squared(point.point)))
                .filter(|(_, d)| *d <= max_dist_sq)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((cached, _)) = nearest {
                point.normal_impulse = cached.normal_impulse * params.factor;
                point.tangent_impulse = cached.tangent_impulse * params.factor;
            }
        }
    }

    /// Record a solved manifold. Returns true when the pair just started
    /// touching.
    pub fn store(&mut self, manifold: &ContactManifold) -> bool {
        let points = manifold
            .points
            .iter()
            .map(|p| CachedPoint {
                point: p.point,
                normal_impulse: p.normal_impulse,
                tangent_impulse: p.tangent_impulse,
            })
            .collect();

        match self.entries.get_mut(&manifold.key()) {
            Some(entry) => {
                let started = !entry.touching;
                entry.normal = manifold.normal;
                entry.points = points;
                entry.stale_frames = 0;
                entry.touching = true;
                entry.seen = true;
                started
            }
            None => {
                self.entries.insert(
                    manifold.key(),
                    ManifoldCacheEntry {
                        normal: manifold.normal,
                        points,
                        stale_frames: 0,
                        touching: true,
                        seen: true,
                    },
                );
                true
            }
        }
    }

    /// Keep a pair that was not solved this sub-step (both bodies asleep)
    pub fn keep_alive(&mut self, key: &PairKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.seen = true;
        }
    }

    /// Age every pair not stored or kept alive since the last call, drop
    /// pairs stale for more than `prune_frames` sub-steps, and return the
    /// pairs that stopped touching, sorted.
    pub fn end_sub_step(&mut self, prune_frames: u32) -> Vec<PairKey> {
        let mut stopped = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if entry.seen {
                entry.seen = false;
                continue;
            }
            if entry.touching {
                entry.touching = false;
                stopped.push(*key);
            }
            entry.stale_frames += 1;
        }
        self.entries
            .retain(|_, entry| entry.stale_frames <= prune_frames);
        stopped.sort_unstable();
        stopped
    }

    /// Forget every pair involving `body`. Returns the pairs that were still
    /// touching, sorted.
    pub fn remove_body(&mut self, body: BodyHandle) -> Vec<PairKey> {
        let mut stopped = Vec::new();
        self.entries.retain(|key, entry| {
            if !key.involves(body) {
                return true;
            }
            if entry.touching {
                stopped.push(*key);
            }
            false
        });
        stopped.sort_unstable();
        stopped
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrowphase::ContactPoint;
    use approx::assert_relative_eq;

    fn handles() -> (BodyHandle, BodyHandle) {
        (BodyHandle::new(0, 0), BodyHandle::new(1, 0))
    }

    fn manifold(points: &[Vec3]) -> ContactManifold {
        let (a, b) = handles();
        let contact = BoxContact {
            normal: Vec3::Y,
            depth: 0.01,
            points: points
                .iter()
                .map(|&point| ContactPoint {
                    point,
                    penetration: 0.01,
                })
                .collect(),
        };
        ContactManifold::from_contact(a, b, contact, CombinedMaterial::default())
    }

    const PARAMS: WarmStartParams = WarmStartParams {
        distance: 0.05,
        normal_similarity: 0.95,
        factor: 0.5,
    };

    #[test]
    fn test_pair_key_is_unordered() {
        let (a, b) = handles();
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        assert_eq!(PairKey::new(b, a).first(), a);
    }

    #[test]
    fn test_warm_start_matches_nearest_point() {
        let mut cache = ManifoldCache::new();
        let mut solved = manifold(&[Vec3::ZERO, Vec3::X]);
        solved.points[0].normal_impulse = 2.0;
        solved.points[1].normal_impulse = 4.0;
        solved.points[1].tangent_impulse = Vec3::Z;
        assert!(cache.store(&solved));

        let mut fresh = manifold(&[Vec3::new(1.01, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0)]);
        cache.warm_start(&mut fresh, &PARAMS);
        assert_relative_eq!(fresh.points[0].normal_impulse, 2.0);
        assert_relative_eq!(fresh.points[0].tangent_impulse.z, 0.5);
        // Too far from any cached point
        assert_eq!(fresh.points[1].normal_impulse, 0.0);
    }

    #[test]
    fn test_warm_start_rejects_flipped_normal() {
        let mut cache = ManifoldCache::new();
        let mut solved = manifold(&[Vec3::ZERO]);
        solved.points[0].normal_impulse = 1.0;
        cache.store(&solved);

        let mut fresh = manifold(&[Vec3::ZERO]);
        fresh.normal = -Vec3::Y;
        cache.warm_start(&mut fresh, &PARAMS);
        assert_eq!(fresh.points[0].normal_impulse, 0.0);
    }

    #[test]
    fn test_prune_after_stale_frames() {
        let mut cache = ManifoldCache::new();
        let m = manifold(&[Vec3::ZERO]);
        assert!(cache.store(&m));
        assert!(!cache.store(&m));
        assert!(cache.end_sub_step(3).is_empty());

        // First missed sub-step reports the stop
        assert_eq!(cache.end_sub_step(3), vec![m.key()]);
        assert!(cache.end_sub_step(3).is_empty());
        cache.end_sub_step(3);
        assert_eq!(cache.len(), 1);
        cache.end_sub_step(3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keep_alive_holds_entry() {
        let mut cache = ManifoldCache::new();
        let m = manifold(&[Vec3::ZERO]);
        cache.store(&m);
        cache.end_sub_step(3);
        for _ in 0..10 {
            cache.keep_alive(&m.key());
            assert!(cache.end_sub_step(3).is_empty());
        }
        assert!(cache.get(&m.key()).unwrap().is_touching());

        assert_eq!(cache.remove_body(m.body_a), vec![m.key()]);
        assert!(cache.is_empty());
        assert!(cache.remove_body(m.body_a).is_empty());
    }
}
