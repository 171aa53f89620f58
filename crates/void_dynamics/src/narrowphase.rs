//! Narrowphase: oriented box vs oriented box
//!
//! Separating-axis test over the 15 candidate axes followed by a small
//! contact point generator. Normals always point from box A to box B.

use crate::body::RigidBody;
use crate::math::{any_perpendicular, safe_normalize};
use glam::Vec3;

/// Cross-product axes shorter than this (squared) are parallel edges
const DEGENERATE_AXIS_SQ: f32 = 1.0e-6;

/// An edge axis must beat the best face axis by this factor to be chosen
const EDGE_PREFERENCE: f32 = 0.95;

/// Tolerance for point-in-box tests
const CONTAINMENT_TOLERANCE: f32 = 0.005;

/// Points closer than this are merged
const MERGE_DISTANCE: f32 = 0.01;

/// Most points kept per manifold
pub const MAX_MANIFOLD_POINTS: usize = 4;

/// Oriented bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    /// World center
    pub center: Vec3,
    /// Unit local axes in world space
    pub axes: [Vec3; 3],
    /// Half extents along each axis
    pub half: Vec3,
}

impl Obb {
    /// The scaled, rotated local box of a body
    pub fn from_body(body: &RigidBody) -> Self {
        let q = body.orientation;
        Self {
            center: body.world_center(),
            axes: [q * Vec3::X, q * Vec3::Y, q * Vec3::Z],
            half: body.half_extents(),
        }
    }

    /// Projected radius onto a unit axis
    #[inline]
    pub fn project_radius(&self, axis: Vec3) -> f32 {
        self.half.x * self.axes[0].dot(axis).abs()
            + self.half.y * self.axes[1].dot(axis).abs()
            + self.half.z * self.axes[2].dot(axis).abs()
    }

    /// The eight corners
    pub fn vertices(&self) -> [Vec3; 8] {
        let ex = self.axes[0] * self.half.x;
        let ey = self.axes[1] * self.half.y;
        let ez = self.axes[2] * self.half.z;
        let c = self.center;
        [
            c - ex - ey - ez,
            c + ex - ey - ez,
            c - ex + ey - ez,
            c + ex + ey - ez,
            c - ex - ey + ez,
            c + ex - ey + ez,
            c - ex + ey + ez,
            c + ex + ey + ez,
        ]
    }

    /// Point-in-box test with a small tolerance
    pub fn contains_point(&self, p: Vec3, tolerance: f32) -> bool {
        let d = p - self.center;
        (0..3).all(|i| d.dot(self.axes[i]).abs() <= self.half[i] + tolerance)
    }

    /// Average of the corners furthest along `dir`
    fn support_average(&self, dir: Vec3) -> Vec3 {
        let verts = self.vertices();
        let best = verts
            .iter()
            .map(|v| v.dot(dir))
            .fold(f32::NEG_INFINITY, f32::max);
        let mut sum = Vec3::ZERO;
        let mut count = 0.0;
        for v in verts {
            if v.dot(dir) >= best - CONTAINMENT_TOLERANCE {
                sum += v;
                count += 1.0;
            }
        }
        sum / count
    }
}

/// One generated contact point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// World position, midway between the surfaces
    pub point: Vec3,
    /// Penetration depth along the normal (>= 0)
    pub penetration: f32,
}

/// Result of a box-box test
#[derive(Debug, Clone, PartialEq)]
pub struct BoxContact {
    /// Unit normal from A to B
    pub normal: Vec3,
    /// Overlap along the normal
    pub depth: f32,
    /// Up to [`MAX_MANIFOLD_POINTS`] points
    pub points: Vec<ContactPoint>,
}

impl BoxContact {
    /// Deepest point penetration
    pub fn max_penetration(&self) -> f32 {
        self.points
            .iter()
            .map(|p| p.penetration)
            .fold(0.0, f32::max)
    }
}

/// Separating axis with the smallest overlap
#[derive(Debug, Clone, Copy)]
struct AxisCandidate {
    normal: Vec3,
    overlap: f32,
}

/// Test two boxes, returning `None` when they are separated
pub fn collide(a: &Obb, b: &Obb) -> Option<BoxContact> {
    let axis = find_min_axis(a, b)?;
    let normal = axis.normal;
    let depth = axis.overlap;

    let ra = a.project_radius(normal);
    let rb = b.project_radius(normal);
    let max_a = a.center.dot(normal) + ra;
    let min_b = b.center.dot(normal) - rb;

    let mut candidates: Vec<ContactPoint> = Vec::with_capacity(17);

    for p in a.vertices() {
        if b.contains_point(p, CONTAINMENT_TOLERANCE) {
            let pen = (p.dot(normal) - min_b).clamp(0.0, depth);
            candidates.push(ContactPoint {
                point: p - normal * (pen * 0.5),
                penetration: pen,
            });
        }
    }
    for q in b.vertices() {
        if a.contains_point(q, CONTAINMENT_TOLERANCE) {
            let pen = (max_a - q.dot(normal)).clamp(0.0, depth);
            candidates.push(ContactPoint {
                point: q + normal * (pen * 0.5),
                penetration: pen,
            });
        }
    }

    // Edge-edge and other cases with no contained corner still get a point
    let support_a = a.support_average(normal);
    let support_b = b.support_average(-normal);
    candidates.push(ContactPoint {
        point: (support_a + support_b) * 0.5,
        penetration: depth,
    });

    let merged = merge_points(candidates);
    let points = reduce_points(merged, normal);

    Some(BoxContact {
        normal,
        depth,
        points,
    })
}

/// Run SAT over all 15 axes
fn find_min_axis(a: &Obb, b: &Obb) -> Option<AxisCandidate> {
    let d = b.center - a.center;

    let test = |axis: Vec3| -> Option<AxisCandidate> {
        let dist = d.dot(axis);
        let overlap = a.project_radius(axis) + b.project_radius(axis) - dist.abs();
        if overlap < 0.0 {
            return None;
        }
        let normal = if dist < 0.0 { -axis } else { axis };
        Some(AxisCandidate { normal, overlap })
    };

    let mut best_face: Option<AxisCandidate> = None;
    for axis in a.axes.iter().chain(b.axes.iter()) {
        let candidate = test(*axis)?;
        if best_face.map_or(true, |best| candidate.overlap < best.overlap) {
            best_face = Some(candidate);
        }
    }
    let mut best = best_face?;
    let face_overlap = best.overlap;

    for ea in a.axes {
        for eb in b.axes {
            let cross = ea.cross(eb);
            if cross.length_squared() < DEGENERATE_AXIS_SQ {
                continue;
            }
            let candidate = test(cross.normalize())?;
            if candidate.overlap < face_overlap * EDGE_PREFERENCE
                && candidate.overlap < best.overlap
            {
                best = candidate;
            }
        }
    }

    Some(best)
}

/// Merge near-identical points, keeping the deeper one
fn merge_points(points: Vec<ContactPoint>) -> Vec<ContactPoint> {
    let mut merged: Vec<ContactPoint> = Vec::with_capacity(points.len());
    for p in points {
        match merged
            .iter_mut()
            .find(|m| m.point.distance_squared(p.point) < MERGE_DISTANCE * MERGE_DISTANCE)
        {
            Some(existing) => {
                if p.penetration > existing.penetration {
                    *existing = p;
                }
            }
            None => merged.push(p),
        }
    }
    merged
}

/// Keep at most four well-spread points
fn reduce_points(points: Vec<ContactPoint>, normal: Vec3) -> Vec<ContactPoint> {
    if points.len() <= MAX_MANIFOLD_POINTS {
        return points;
    }

    let centroid = points.iter().map(|p| p.point).sum::<Vec3>() / points.len() as f32;
    let t1 = any_perpendicular(normal);
    let t2 = safe_normalize(normal.cross(t1), Vec3::Z);

    let extreme = |dir: Vec3| -> usize {
        let mut best = 0;
        let mut best_d = f32::NEG_INFINITY;
        for (i, p) in points.iter().enumerate() {
            let d = (p.point - centroid).dot(dir);
            if d > best_d {
                best_d = d;
                best = i;
            }
        }
        best
    };

    let mut chosen: Vec<usize> = Vec::with_capacity(MAX_MANIFOLD_POINTS);
    for dir in [t1, -t1, t2, -t2] {
        let i = extreme(dir);
        if !chosen.contains(&i) {
            chosen.push(i);
        }
    }

    // Farthest-point fill when extremes coincide
    while chosen.len() < MAX_MANIFOLD_POINTS {
        let next = (0..points.len())
            .filter(|i| !chosen.contains(i))
            .map(|i| {
                let d = chosen
                    .iter()
                    .map(|&c| points[c].point.distance_squared(points[i].point))
                    .fold(f32::INFINITY, f32::min);
                (i, d)
            })
            .fold(None, |acc: Option<(usize, f32)>, (i, d)| match acc {
                Some((_, best)) if best >= d => acc,
                _ => Some((i, d)),
            });
        match next {
            Some((i, _)) => chosen.push(i),
            None => break,
        }
    }

    chosen.sort_unstable();
    chosen.into_iter().map(|i| points[i]).collect()
}
