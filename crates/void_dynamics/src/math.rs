//! Numeric guards shared by every stage of the pipeline.
//!
//! Everything that divides or normalizes goes through here so that
//! degenerate geometry degrades to a safe default instead of NaN.

use glam::{Quat, Vec3};

/// Squared lengths below this are treated as zero.
pub const LENGTH_SQ_EPSILON: f32 = 1.0e-8;

/// Effective-mass denominators are clamped to at least this value.
pub const MASS_EPSILON: f32 = 1.0e-4;

/// Normalize `v`, or return `fallback` when `v` is (nearly) zero or not finite.
#[inline]
pub fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    let len_sq = v.length_squared();
    if len_sq <= LENGTH_SQ_EPSILON || !len_sq.is_finite() {
        return fallback;
    }
    v / len_sq.sqrt()
}

/// Normalize a quaternion, falling back to identity.
#[inline]
pub fn safe_normalize_quat(q: Quat) -> Quat {
    let len_sq = q.length_squared();
    if len_sq <= 1.0e-12 || !len_sq.is_finite() {
        return Quat::IDENTITY;
    }
    q * (1.0 / len_sq.sqrt())
}

/// A unit vector perpendicular to `n` (assumed unit length).
///
/// Deterministic: always crosses with the world axis least aligned with `n`.
#[inline]
pub fn any_perpendicular(n: Vec3) -> Vec3 {
    let a = n.abs();
    let axis = if a.x <= a.y && a.x <= a.z {
        Vec3::X
    } else if a.y <= a.z {
        Vec3::Y
    } else {
        Vec3::Z
    };
    safe_normalize(n.cross(axis), Vec3::X)
}

/// Multiply `v` by a world-space inverse inertia tensor that is diagonal in
/// the body frame given by `orientation`.
#[inline]
pub fn mul_inv_inertia(orientation: Quat, inv_inertia: Vec3, v: Vec3) -> Vec3 {
    let local = orientation.inverse() * v;
    orientation * (local * inv_inertia)
}

/// `1 / k`, with `k` clamped away from zero.
#[inline]
pub fn inv_effective_mass(k: f32) -> f32 {
    1.0 / k.max(MASS_EPSILON)
}
