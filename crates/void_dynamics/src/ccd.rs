//! Continuous collision detection
//!
//! Conservative swept-sphere test over one sub-step. Each box is replaced by
//! its bounding sphere and both spheres move linearly from their previous to
//! their current position. A CCD body whose sphere would have touched a
//! neighbour is rewound to the time of impact.

use crate::arena::{BodyHandle, BodySet};
use crate::body::RigidBody;
use crate::broadphase::{Aabb, DynamicTree};
use crate::math::{safe_normalize, LENGTH_SQ_EPSILON};
use glam::Vec3;
use std::collections::BTreeMap;

/// Earliest `t` in `[0, 1)` at which two spheres touch.
///
/// `start` is the separation of the centers at `t = 0`, `motion` the change
/// of that separation over the interval. Spheres already touching at the
/// start, parallel motion, or a root outside the interval give `None`.
pub fn sphere_time_of_impact(start: Vec3, motion: Vec3, radius_sum: f32) -> Option<f32> {
    let a = motion.length_squared();
    let b = 2.0 * start.dot(motion);
    let c = start.length_squared() - radius_sum * radius_sum;
    if c <= 0.0 || a < LENGTH_SQ_EPSILON {
        return None;
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (0.0..1.0).contains(&t).then_some(t)
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    toi: f32,
    normal_sum: Vec3,
}

fn wants_ccd(body: &RigidBody) -> bool {
    body.enable_ccd && body.is_dynamic() && body.is_awake()
}

/// Box around the path of a body's center over the last sub-step, grown by
/// `margin`
pub fn swept_bounds(body: &RigidBody, margin: f32) -> Aabb {
    Aabb::new(
        body.previous_position.min(body.position),
        body.previous_position.max(body.position),
    )
    .expanded(margin)
}

/// Pairs a CCD body may have swept into during the last sub-step.
///
/// The broadphase pairs only cover fat boxes, which reach far less than a
/// large partner's bounding sphere. Each CCD body's path is therefore boxed
/// and grown by its own radius plus the largest radius and displacement of
/// any body, so every sphere the path can touch has its leaf inside the box.
/// Pairs come back as `(lower, higher)` handle, sorted and unique.
pub fn candidate_pairs(bodies: &BodySet, tree: &DynamicTree) -> Vec<(BodyHandle, BodyHandle)> {
    let reach = bodies
        .iter()
        .map(|(_, body)| body.bounding_radius() + body.position.distance(body.previous_position))
        .fold(0.0f32, f32::max);

    let mut pairs = Vec::new();
    for (handle, body) in bodies.iter() {
        if !wants_ccd(body) {
            continue;
        }
        let bounds = swept_bounds(body, body.bounding_radius() + reach);
        tree.query(&bounds, |other| {
            if other != handle {
                pairs.push((handle.min(other), handle.max(other)));
            }
        });
    }
    pairs.sort_unstable();
    pairs.dedup();
    pairs
}

/// Sweep `body` against `other`. Returns the impact time and the direction
/// from `body` toward `other` at that time.
fn sweep(body: &RigidBody, other: &RigidBody) -> Option<(f32, Vec3)> {
    let start = other.previous_position - body.previous_position;
    let motion = (other.position - other.previous_position) - (body.position - body.previous_position);
    let radius_sum = body.bounding_radius() + other.bounding_radius();
    let toi = sphere_time_of_impact(start, motion, radius_sum)?;
    let at_impact = start + motion * toi;
    Some((toi, safe_normalize(at_impact, safe_normalize(motion, Vec3::Y))))
}

/// Rewind CCD bodies that tunnelled through a partner this sub-step.
///
/// Returns the bodies that were moved, in handle order.
pub fn resolve(bodies: &mut BodySet, pairs: &[(BodyHandle, BodyHandle)]) -> Vec<BodyHandle> {
    let mut hits: BTreeMap<BodyHandle, Hit> = BTreeMap::new();

    for &(ha, hb) in pairs {
        let (Some(a), Some(b)) = (bodies.get(ha), bodies.get(hb)) else {
            continue;
        };
        for (handle, body, other) in [(ha, a, b), (hb, b, a)] {
            if !wants_ccd(body) {
                continue;
            }
            let Some((toi, normal)) = sweep(body, other) else {
                continue;
            };
            hits.entry(handle)
                .and_modify(|hit| {
                    hit.toi = hit.toi.min(toi);
                    hit.normal_sum += normal;
                })
                .or_insert(Hit {
                    toi,
                    normal_sum: normal,
                });
        }
    }

    let mut rewound = Vec::with_capacity(hits.len());
    for (handle, hit) in hits {
        let Some(body) = bodies.get_mut(handle) else {
            continue;
        };
        body.position = body.previous_position.lerp(body.position, hit.toi);
        body.orientation = body.previous_orientation.slerp(body.orientation, hit.toi);
        body.normalize_orientation();

        let normal = safe_normalize(hit.normal_sum, Vec3::ZERO);
        let approach = body.velocity.dot(normal);
        if approach > 0.0 {
            body.velocity -= normal * approach;
        }
        body.wake_up();

        log::trace!("CCD rewound {} to t = {:.3}", handle, hit.toi);
        rewound.push(handle);
    }
    rewound
}
