//! Rigid body types
//!
//! A [`RigidBody`] is plain simulation state: pose, velocity, mass
//! properties, material and sleep bookkeeping. Its only behavior is applying
//! forces and impulses; everything else happens inside the world step.

use crate::material::PhysicsMaterial;
use crate::math::{mul_inv_inertia, safe_normalize_quat};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Smallest box extent used when deriving inertia.
const MIN_EXTENT: f32 = 0.001;

/// Principal moments at or below this get an inverse inertia of zero.
const MIN_INERTIA: f32 = 1.0e-6;

/// Type of rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RigidBodyType {
    /// Never moves, infinite mass
    Static,
    /// Fully simulated
    #[default]
    Dynamic,
    /// Moved by the caller, pushes dynamic bodies but is never pushed back
    Kinematic,
}

/// A simulated box-shaped rigid body
#[derive(Debug, Clone)]
pub struct RigidBody {
    /// World position of the body origin (also its center of mass)
    pub position: Vec3,
    /// Orientation (kept unit length by the integrator)
    pub orientation: Quat,
    /// Linear velocity
    pub velocity: Vec3,
    /// Angular velocity in world space
    pub angular_velocity: Vec3,
    /// Surface and damping properties
    pub material: PhysicsMaterial,
    /// Sweep this body against its neighbours to stop tunnelling
    pub enable_ccd: bool,
    /// Allow this body to fall asleep when it comes to rest
    pub enable_sleep: bool,

    body_type: RigidBodyType,
    scale: Vec3,
    local_bounds_min: Vec3,
    local_bounds_max: Vec3,
    force: Vec3,
    torque: Vec3,
    mass: f32,
    inv_mass: f32,
    inv_inertia: Vec3,
    is_awake: bool,
    sleep_timer: f32,

    pub(crate) previous_position: Vec3,
    pub(crate) previous_orientation: Quat,
}

impl RigidBody {
    /// Create a unit box of the given type at the origin.
    ///
    /// Dynamic bodies start with a mass of 1, everything else with zero.
    pub fn new(body_type: RigidBodyType) -> Self {
        let mut body = Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            material: PhysicsMaterial::default(),
            enable_ccd: false,
            enable_sleep: true,
            body_type,
            scale: Vec3::ONE,
            local_bounds_min: Vec3::splat(-0.5),
            local_bounds_max: Vec3::splat(0.5),
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass: 0.0,
            inv_mass: 0.0,
            inv_inertia: Vec3::ZERO,
            is_awake: true,
            sleep_timer: 0.0,
            previous_position: Vec3::ZERO,
            previous_orientation: Quat::IDENTITY,
        };
        let mass = if body_type == RigidBodyType::Dynamic { 1.0 } else { 0.0 };
        body.set_mass(mass);
        body
    }

    /// Create a dynamic unit box
    pub fn dynamic() -> Self {
        Self::new(RigidBodyType::Dynamic)
    }

    /// Create a static unit box
    pub fn fixed() -> Self {
        Self::new(RigidBodyType::Static)
    }

    /// Create a kinematic unit box
    pub fn kinematic() -> Self {
        Self::new(RigidBodyType::Kinematic)
    }

    // ==================== Mass properties ====================

    /// Body type
    #[inline]
    pub fn body_type(&self) -> RigidBodyType {
        self.body_type
    }

    /// Change the body type, re-deriving mass properties.
    ///
    /// Turning a body static or kinematic zeroes its inverse mass and inertia.
    pub fn set_body_type(&mut self, body_type: RigidBodyType) {
        self.body_type = body_type;
        self.set_mass(self.mass);
        if body_type != RigidBodyType::Dynamic {
            self.is_awake = true;
            self.sleep_timer = 0.0;
        }
    }

    /// Mass as last set
    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Inverse mass (zero for anything not dynamic)
    #[inline]
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Diagonal inverse inertia in the body frame
    #[inline]
    pub fn inv_inertia(&self) -> Vec3 {
        self.inv_inertia
    }

    /// Set the mass and refresh the inertia tensor
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = if mass.is_finite() { mass.max(0.0) } else { 0.0 };
        self.inv_mass = if self.body_type == RigidBodyType::Dynamic && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        };
        self.update_inertia_tensor();
    }

    /// Derive the diagonal inverse inertia from the scaled local box.
    pub fn update_inertia_tensor(&mut self) {
        if self.body_type != RigidBodyType::Dynamic || self.mass <= 0.0 {
            self.inv_inertia = Vec3::ZERO;
            return;
        }

        let size = ((self.local_bounds_max - self.local_bounds_min) * self.scale)
            .abs()
            .max(Vec3::splat(MIN_EXTENT));
        let (w2, h2, d2) = (size.x * size.x, size.y * size.y, size.z * size.z);
        let k = self.mass / 12.0;
        let inertia = Vec3::new(k * (h2 + d2), k * (w2 + d2), k * (w2 + h2));

        let invert = |i: f32| if i > MIN_INERTIA { 1.0 / i } else { 0.0 };
        self.inv_inertia = Vec3::new(invert(inertia.x), invert(inertia.y), invert(inertia.z));
    }

    /// World-space inverse inertia applied to `v`
    #[inline]
    pub fn mul_inv_inertia(&self, v: Vec3) -> Vec3 {
        mul_inv_inertia(self.orientation, self.inv_inertia, v)
    }

    /// True for dynamic bodies with a positive mass
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == RigidBodyType::Dynamic && self.inv_mass > 0.0
    }

    // ==================== Shape ====================

    /// Per-axis scale applied to the local box
    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set the scale and refresh the inertia tensor
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.update_inertia_tensor();
    }

    /// Unscaled local box corners
    #[inline]
    pub fn local_bounds(&self) -> (Vec3, Vec3) {
        (self.local_bounds_min, self.local_bounds_max)
    }

    /// Set the unscaled local box and refresh the inertia tensor
    pub fn set_local_bounds(&mut self, min: Vec3, max: Vec3) {
        self.local_bounds_min = min.min(max);
        self.local_bounds_max = min.max(max);
        self.update_inertia_tensor();
    }

    /// Half extents of the scaled box
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        ((self.local_bounds_max - self.local_bounds_min) * self.scale * 0.5).abs()
    }

    /// World-space center of the scaled box
    #[inline]
    pub fn world_center(&self) -> Vec3 {
        let offset = (self.local_bounds_max + self.local_bounds_min) * 0.5 * self.scale;
        self.position + self.orientation * offset
    }

    /// Radius of the sphere enclosing the box (its half diagonal)
    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.half_extents().length()
    }

    // ==================== Forces ====================

    /// Accumulated force for the next integration
    #[inline]
    pub fn force(&self) -> Vec3 {
        self.force
    }

    /// Accumulated torque for the next integration
    #[inline]
    pub fn torque(&self) -> Vec3 {
        self.torque
    }

    /// Add a force through the center of mass
    pub fn apply_force(&mut self, force: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.wake_up();
        self.force += force;
    }

    /// Add a torque
    pub fn apply_torque(&mut self, torque: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.wake_up();
        self.torque += torque;
    }

    /// Change linear velocity by `impulse / mass`
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.wake_up();
        self.velocity += impulse * self.inv_mass;
    }

    /// Change angular velocity by the world inverse inertia times `impulse`
    pub fn apply_angular_impulse(&mut self, impulse: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.wake_up();
        self.angular_velocity += self.mul_inv_inertia(impulse);
    }

    /// Apply an impulse at a world-space point, affecting both velocities
    pub fn apply_impulse_at_point(&mut self, impulse: Vec3, world_point: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.wake_up();
        self.velocity += impulse * self.inv_mass;
        let r = world_point - self.position;
        self.angular_velocity += self.mul_inv_inertia(r.cross(impulse));
    }

    /// Solver-side impulse: no wake-up unless the impulse is significant.
    ///
    /// Returns true when a sleeping body was woken.
    pub(crate) fn apply_solver_impulse(&mut self, impulse: Vec3, r: Vec3, wake_threshold: f32) -> bool {
        if !self.is_dynamic() {
            return false;
        }
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity += self.mul_inv_inertia(r.cross(impulse));
        if !self.is_awake && impulse.length_squared() > wake_threshold * wake_threshold {
            self.wake_up();
            return true;
        }
        false
    }

    pub(crate) fn clear_accumulators(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    // ==================== Sleep ====================

    /// Whether the body is being simulated
    #[inline]
    pub fn is_awake(&self) -> bool {
        self.is_awake
    }

    /// Seconds spent below the sleep thresholds
    #[inline]
    pub fn sleep_timer(&self) -> f32 {
        self.sleep_timer
    }

    /// Wake the body and restart its sleep timer
    pub fn wake_up(&mut self) {
        self.is_awake = true;
        self.sleep_timer = 0.0;
    }

    /// Put the body to sleep, zeroing its velocities
    pub fn sleep(&mut self) {
        if self.body_type != RigidBodyType::Dynamic {
            return;
        }
        self.is_awake = false;
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }

    pub(crate) fn set_sleep_timer(&mut self, timer: f32) {
        self.sleep_timer = timer;
    }

    /// Pose at the start of the current sub-step
    pub(crate) fn store_previous_pose(&mut self) {
        self.previous_position = self.position;
        self.previous_orientation = self.orientation;
    }

    pub(crate) fn normalize_orientation(&mut self) {
        self.orientation = safe_normalize_quat(self.orientation);
    }
}

impl Default for RigidBody {
    fn default() -> Self {
        Self::dynamic()
    }
}

/// Description for creating a rigid body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodyDesc {
    /// Type of rigid body
    pub body_type: RigidBodyType,
    /// Initial position
    pub position: Vec3,
    /// Initial rotation
    pub rotation: Quat,
    /// Scale applied to the local box
    pub scale: Vec3,
    /// Unscaled local box minimum
    pub local_bounds_min: Vec3,
    /// Unscaled local box maximum
    pub local_bounds_max: Vec3,
    /// Initial linear velocity
    pub linear_velocity: Vec3,
    /// Initial angular velocity
    pub angular_velocity: Vec3,
    /// Mass (ignored for static and kinematic bodies)
    pub mass: f32,
    /// Surface properties
    pub material: PhysicsMaterial,
    /// Enable continuous collision detection
    pub ccd_enabled: bool,
    /// Can this body sleep when inactive
    pub can_sleep: bool,
}

impl Default for RigidBodyDesc {
    fn default() -> Self {
        Self {
            body_type: RigidBodyType::Dynamic,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            local_bounds_min: Vec3::splat(-0.5),
            local_bounds_max: Vec3::splat(0.5),
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
            material: PhysicsMaterial::default(),
            ccd_enabled: false,
            can_sleep: true,
        }
    }
}

impl RigidBodyDesc {
    /// Create a static body description
    pub fn fixed() -> Self {
        Self {
            body_type: RigidBodyType::Static,
            ..Default::default()
        }
    }

    /// Create a dynamic body description
    pub fn dynamic() -> Self {
        Self {
            body_type: RigidBodyType::Dynamic,
            ..Default::default()
        }
    }

    /// Create a kinematic body description
    pub fn kinematic() -> Self {
        Self {
            body_type: RigidBodyType::Kinematic,
            ..Default::default()
        }
    }

    /// Set position
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    /// Set rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set rotation from euler angles in degrees, the way the scene stores them
    pub fn with_rotation_euler_degrees(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = euler_degrees_to_quat(Vec3::new(x, y, z));
        self
    }

    /// Set scale
    pub fn with_scale(mut self, x: f32, y: f32, z: f32) -> Self {
        self.scale = Vec3::new(x, y, z);
        self
    }

    /// Use a box centered on the body origin with the given half extents
    pub fn with_half_extents(mut self, x: f32, y: f32, z: f32) -> Self {
        let h = Vec3::new(x, y, z).abs();
        self.local_bounds_min = -h;
        self.local_bounds_max = h;
        self
    }

    /// Set linear velocity
    pub fn with_linear_velocity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.linear_velocity = Vec3::new(x, y, z);
        self
    }

    /// Set angular velocity
    pub fn with_angular_velocity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.angular_velocity = Vec3::new(x, y, z);
        self
    }

    /// Set mass
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Set material
    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = material;
        self
    }

    /// Enable CCD
    pub fn with_ccd(mut self, enabled: bool) -> Self {
        self.ccd_enabled = enabled;
        self
    }

    /// Allow or forbid sleeping
    pub fn with_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }

    /// Build the rigid body
    pub fn build(&self) -> RigidBody {
        let mut body = RigidBody::new(self.body_type);
        body.position = self.position;
        body.orientation = safe_normalize_quat(self.rotation);
        body.scale = self.scale;
        body.local_bounds_min = self.local_bounds_min.min(self.local_bounds_max);
        body.local_bounds_max = self.local_bounds_min.max(self.local_bounds_max);
        body.material = self.material;
        body.enable_ccd = self.ccd_enabled;
        body.enable_sleep = self.can_sleep;
        if self.body_type == RigidBodyType::Dynamic {
            body.velocity = self.linear_velocity;
            body.angular_velocity = self.angular_velocity;
        }
        body.set_mass(self.mass);
        body.store_previous_pose();
        body
    }
}

/// Convert scene euler angles (degrees, XYZ order) to a quaternion
pub fn euler_degrees_to_quat(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::XYZ,
        degrees.x.to_radians(),
        degrees.y.to_radians(),
        degrees.z.to_radians(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_non_dynamic_has_no_inverse_mass() {
        for body in [RigidBody::fixed(), RigidBody::kinematic()] {
            assert_eq!(body.inv_mass(), 0.0);
            assert_eq!(body.inv_inertia(), Vec3::ZERO);
        }

        let mut body = RigidBody::dynamic();
        body.set_mass(5.0);
        body.set_body_type(RigidBodyType::Kinematic);
        assert_eq!(body.inv_mass(), 0.0);
        assert_eq!(body.inv_inertia(), Vec3::ZERO);
    }

    #[test]
    fn test_unit_cube_inertia() {
        let mut body = RigidBody::dynamic();
        body.set_mass(12.0);
        // I = m/12 * (1 + 1) = 2 for a unit cube of mass 12
        assert_relative_eq!(body.inv_inertia().x, 0.5, epsilon = 1e-6);
        assert_relative_eq!(body.inv_inertia().y, 0.5, epsilon = 1e-6);
        assert_relative_eq!(body.inv_inertia().z, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_scale_updates_inertia() {
        let mut body = RigidBody::dynamic();
        let before = body.inv_inertia();
        body.set_scale(Vec3::new(2.0, 1.0, 1.0));
        let after = body.inv_inertia();
        assert_relative_eq!(after.x, before.x, epsilon = 1e-6);
        assert!(after.y < before.y);
        assert!(after.z < before.z);
    }

    #[test]
    fn test_forces_ignored_on_static() {
        let mut body = RigidBody::fixed();
        body.apply_force(Vec3::X);
        body.apply_impulse(Vec3::X);
        body.apply_torque(Vec3::Y);
        body.apply_angular_impulse(Vec3::Y);
        body.apply_impulse_at_point(Vec3::X, Vec3::Y);
        assert_eq!(body.force(), Vec3::ZERO);
        assert_eq!(body.torque(), Vec3::ZERO);
        assert_eq!(body.velocity, Vec3::ZERO);
        assert_eq!(body.angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_impulse_wakes_body() {
        let mut body = RigidBody::dynamic();
        body.sleep();
        assert!(!body.is_awake());

        body.apply_impulse(Vec3::new(2.0, 0.0, 0.0));
        assert!(body.is_awake());
        assert_relative_eq!(body.velocity.x, 2.0);
    }

    #[test]
    fn test_impulse_at_point_spins() {
        let mut body = RigidBody::dynamic();
        body.apply_impulse_at_point(Vec3::X, Vec3::new(0.0, 0.5, 0.0));
        // r = +Y, J = +X  =>  r x J = -Z
        assert!(body.angular_velocity.z < 0.0);
        assert_relative_eq!(body.velocity.x, 1.0);
    }

    #[test]
    fn test_desc_build() {
        let body = RigidBodyDesc::dynamic()
            .with_position(1.0, 2.0, 3.0)
            .with_half_extents(1.0, 0.5, 0.25)
            .with_mass(4.0)
            .with_ccd(true)
            .build();

        assert_eq!(body.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(body.half_extents(), Vec3::new(1.0, 0.5, 0.25));
        assert_relative_eq!(body.inv_mass(), 0.25);
        assert!(body.enable_ccd);
    }

    #[test]
    fn test_euler_degrees() {
        let q = euler_degrees_to_quat(Vec3::new(0.0, 90.0, 0.0));
        let v = q * Vec3::X;
        assert_relative_eq!(v.z, -1.0, epsilon = 1e-5);
    }
}
