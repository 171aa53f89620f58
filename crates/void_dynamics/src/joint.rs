//! Distance joints

use crate::arena::BodyHandle;
use crate::body::RigidBody;
use crate::math::safe_normalize;
use core::fmt;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Identifier of a joint in a world. Never reused within one world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JointId(pub(crate) u32);

impl JointId {
    /// Raw value
    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JointId({})", self.0)
    }
}

/// Description for creating a distance joint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceJointDesc {
    /// First body
    pub body_a: BodyHandle,
    /// Second body
    pub body_b: BodyHandle,
    /// Anchor in A's local frame
    pub local_anchor_a: Vec3,
    /// Anchor in B's local frame
    pub local_anchor_b: Vec3,
    /// Target anchor distance; `None` (or negative) uses the current distance
    pub rest_length: Option<f32>,
    /// How hard the joint pulls toward its rest length (0..=1)
    pub stiffness: f32,
    /// Damping of the restoring speed along the joint axis (>= 0). Zero
    /// keeps the joint rigid and undamped.
    pub damping: f32,
}

impl DistanceJointDesc {
    /// Join the two body origins at their current distance
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: Vec3::ZERO,
            local_anchor_b: Vec3::ZERO,
            rest_length: None,
            stiffness: 1.0,
            damping: 0.2,
        }
    }

    /// Set the local anchors
    pub fn with_anchors(mut self, local_anchor_a: Vec3, local_anchor_b: Vec3) -> Self {
        self.local_anchor_a = local_anchor_a;
        self.local_anchor_b = local_anchor_b;
        self
    }

    /// Set an explicit rest length
    pub fn with_rest_length(mut self, rest_length: f32) -> Self {
        self.rest_length = Some(rest_length);
        self
    }

    /// Set stiffness
    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Set damping
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }
}

/// Keeps two anchor points at a fixed distance
#[derive(Debug, Clone)]
pub struct DistanceJoint {
    id: JointId,
    body_a: BodyHandle,
    body_b: BodyHandle,
    local_anchor_a: Vec3,
    local_anchor_b: Vec3,
    rest_length: f32,
    stiffness: f32,
    damping: f32,

    // Per-sub-step solver state
    pub(crate) axis: Vec3,
    pub(crate) r_a: Vec3,
    pub(crate) r_b: Vec3,
    pub(crate) effective_mass: f32,
    pub(crate) bias: f32,
    pub(crate) impulse: f32,
}

impl DistanceJoint {
    /// Build from a description, resolving a missing rest length against the
    /// bodies' current poses
    pub fn new(id: JointId, desc: &DistanceJointDesc, a: &RigidBody, b: &RigidBody) -> Self {
        let mut joint = Self {
            id,
            body_a: desc.body_a,
            body_b: desc.body_b,
            local_anchor_a: desc.local_anchor_a,
            local_anchor_b: desc.local_anchor_b,
            rest_length: 0.0,
            stiffness: 1.0,
            damping: 0.0,
            axis: Vec3::Y,
            r_a: Vec3::ZERO,
            r_b: Vec3::ZERO,
            effective_mass: 0.0,
            bias: 0.0,
            impulse: 0.0,
        };
        joint.set_stiffness(desc.stiffness);
        joint.set_damping(desc.damping);
        joint.rest_length = match desc.rest_length {
            Some(length) if length >= 0.0 && length.is_finite() => length,
            _ => joint.current_length(a, b),
        };
        joint
    }

    /// Joint id
    #[inline]
    pub fn id(&self) -> JointId {
        self.id
    }

    /// First body
    #[inline]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    /// Second body
    #[inline]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// Whether either end is `body`
    #[inline]
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.body_a == body || self.body_b == body
    }

    /// Target distance
    #[inline]
    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    /// Change the target distance (negative values clamp to zero)
    pub fn set_rest_length(&mut self, rest_length: f32) {
        self.rest_length = rest_length.max(0.0);
    }

    /// Stiffness in 0..=1
    #[inline]
    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    /// Set stiffness, clamped to 0..=1
    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = if stiffness.is_finite() {
            stiffness.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    /// Axial damping
    #[inline]
    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Set damping, clamped to be non-negative
    pub fn set_damping(&mut self, damping: f32) {
        self.damping = if damping.is_finite() { damping.max(0.0) } else { 0.0 };
    }

    /// Impulse accumulated during the last solve
    #[inline]
    pub fn impulse(&self) -> f32 {
        self.impulse
    }

    /// World-space anchor points
    pub fn world_anchors(&self, a: &RigidBody, b: &RigidBody) -> (Vec3, Vec3) {
        (
            a.position + a.orientation * self.local_anchor_a,
            b.position + b.orientation * self.local_anchor_b,
        )
    }

    /// Current anchor distance
    pub fn current_length(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let (pa, pb) = self.world_anchors(a, b);
        pa.distance(pb)
    }

    /// Unit axis from anchor A to anchor B and the signed length error
    pub(crate) fn axis_and_error(&self, a: &RigidBody, b: &RigidBody) -> (Vec3, f32, Vec3, Vec3) {
        let (pa, pb) = self.world_anchors(a, b);
        let d = pb - pa;
        let axis = safe_normalize(d, Vec3::Y);
        (axis, d.length() - self.rest_length, pa - a.position, pb - b.position)
    }
}
