//! Physics queries (raycasting)

use crate::arena::{BodyHandle, BodySet};
use crate::body::RigidBody;
use crate::math::LENGTH_SQ_EPSILON;
use glam::Vec3;

/// Result of a raycast query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// The body that was hit
    pub body: BodyHandle,
    /// Hit point in world space
    pub point: Vec3,
    /// Outward face normal at the hit point
    pub normal: Vec3,
    /// Distance from ray origin
    pub distance: f32,
}

/// Ray against one body's oriented box.
///
/// Returns `(distance, normal)`. A ray starting inside the box does not hit
/// it. `direction` must be unit length.
pub fn ray_box(body: &RigidBody, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(f32, Vec3)> {
    let inv_rotation = body.orientation.inverse();
    let o = inv_rotation * (origin - body.world_center());
    let d = inv_rotation * direction;
    let h = body.half_extents();

    if o.abs().cmple(h).all() {
        return None;
    }

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_axis = 0;

    for axis in 0..3 {
        if d[axis].abs() < 1.0e-8 {
            // Parallel to this slab: must already be between its planes
            if o[axis].abs() > h[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[axis];
        let mut t1 = (-h[axis] - o[axis]) * inv;
        let mut t2 = (h[axis] - o[axis]) * inv;
        if t1 > t2 {
            core::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_enter {
            t_enter = t1;
            enter_axis = axis;
        }
        t_exit = t_exit.min(t2);
        if t_enter > t_exit {
            return None;
        }
    }

    if t_enter < 0.0 || t_enter > max_distance {
        return None;
    }

    let mut local_normal = Vec3::ZERO;
    local_normal[enter_axis] = -d[enter_axis].signum();
    Some((t_enter, body.orientation * local_normal))
}

/// Closest hit among all bodies, ties going to the lower handle
pub fn raycast(bodies: &BodySet, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
    let len_sq = direction.length_squared();
    if len_sq <= LENGTH_SQ_EPSILON || !len_sq.is_finite() || !(max_distance > 0.0) {
        return None;
    }
    let direction = direction / len_sq.sqrt();

    let mut best: Option<RaycastHit> = None;
    for (handle, body) in bodies.iter() {
        let limit = best.map_or(max_distance, |hit| hit.distance);
        let Some((distance, normal)) = ray_box(body, origin, direction, limit) else {
            continue;
        };
        if best.map_or(true, |hit| distance < hit.distance) {
            best = Some(RaycastHit {
                body: handle,
                point: origin + direction * distance,
                normal,
                distance,
            });
        }
    }
    best
}
