//! Physics world - main simulation container

use crate::arena::{BodyHandle, BodySet};
use crate::body::{RigidBody, RigidBodyDesc};
use crate::broadphase::{Aabb, DynamicTree, FatMargin};
use crate::ccd;
use crate::config::{PhysicsConfig, MAX_SUBSTEPS_LIMIT};
use crate::contact::{ContactManifold, ManifoldCache, PairKey, WarmStartParams};
use crate::error::Result;
use crate::events::{CollisionEvent, EventCollector};
use crate::joint::{DistanceJoint, DistanceJointDesc, JointId};
use crate::narrowphase::{collide, Obb};
use crate::query::{self, RaycastHit};
use crate::sleep::{self, SleepParams};
use crate::solver::{self, Constraint, ContactConstraint, SolverContext};
use glam::{Quat, Vec3};
use std::collections::BTreeMap;

/// Smallest half extent used when sizing sub-steps
const MIN_SUBSTEP_EXTENT: f32 = 0.01;

/// The main physics world containing all simulation state
pub struct PhysicsWorld {
    /// Configuration
    config: PhysicsConfig,

    /// Gravity
    gravity: Vec3,

    /// Body storage
    bodies: BodySet,

    /// Broadphase
    tree: DynamicTree,

    /// Impulses carried between sub-steps
    manifold_cache: ManifoldCache,

    /// Distance joints, iterated in id order
    joints: BTreeMap<JointId, DistanceJoint>,

    /// Next joint id to hand out
    next_joint_id: u32,

    /// Event collector
    events: EventCollector,

    /// Events raised between steps, reported by the next step
    pending_events: Vec<CollisionEvent>,

    /// Accumulated time for fixed timestep
    accumulated_time: f32,

    /// Sub-steps used by the last fixed step
    last_sub_steps: u32,

    /// Manifolds solved in the last sub-step
    contact_count: usize,
}

impl PhysicsWorld {
    /// Create a new physics world.
    ///
    /// Iteration counts below one and sub-step limits outside `1..=16` are
    /// clamped rather than rejected; use [`PhysicsWorld::try_new`] to validate.
    pub fn new(mut config: PhysicsConfig) -> Self {
        config.velocity_iterations = config.velocity_iterations.max(1);
        config.position_iterations = config.position_iterations.max(1);
        config.max_substeps = config.max_substeps.clamp(1, MAX_SUBSTEPS_LIMIT);
        config.max_fixed_steps_per_frame = config.max_fixed_steps_per_frame.max(1);
        let gravity = config.gravity_vec();

        Self {
            config,
            gravity,
            bodies: BodySet::new(),
            tree: DynamicTree::new(),
            manifold_cache: ManifoldCache::new(),
            joints: BTreeMap::new(),
            next_joint_id: 1,
            events: EventCollector::new(),
            pending_events: Vec::new(),
            accumulated_time: 0.0,
            last_sub_steps: 0,
            contact_count: 0,
        }
    }

    /// Create a world after validating the configuration
    pub fn try_new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Get the physics configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Set gravity
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
        self.config.gravity = gravity.to_array();
    }

    /// Get gravity
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Set velocity and position iteration counts (each at least 1)
    pub fn set_solver_iterations(&mut self, velocity: usize, position: usize) {
        self.config.velocity_iterations = velocity.max(1);
        self.config.position_iterations = position.max(1);
    }

    /// Set the sub-step limit, clamped to `1..=16`
    pub fn set_max_sub_steps(&mut self, max_sub_steps: u32) {
        self.config.max_substeps = max_sub_steps.clamp(1, MAX_SUBSTEPS_LIMIT);
    }

    // ==================== Rigid Bodies ====================

    /// Move a body into the world
    pub fn add_body(&mut self, mut body: RigidBody) -> BodyHandle {
        body.normalize_orientation();
        body.store_previous_pose();
        let tight = Aabb::from_body(&body);
        let fat = self.fat_margin(self.config.timestep).fatten(&body, tight);
        let handle = self.bodies.insert(body);
        self.tree.insert(handle, fat);
        log::debug!("Added body {}", handle);
        handle
    }

    /// Build a body from a description and add it
    pub fn create_body(&mut self, desc: &RigidBodyDesc) -> BodyHandle {
        self.add_body(desc.build())
    }

    /// Remove a body, handing it back. Joints attached to it are removed too.
    ///
    /// Contacts the body still had are reported as stopped by the next
    /// [`PhysicsWorld::step`].
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let body = self.bodies.remove(handle)?;
        self.tree.remove(handle);
        for key in self.manifold_cache.remove_body(handle) {
            self.pending_events.push(CollisionEvent::stopped(key));
        }

        let before = self.joints.len();
        self.joints.retain(|_, joint| !joint.involves(handle));
        let pruned = before - self.joints.len();
        if pruned > 0 {
            log::debug!("Removed body {} and {} attached joint(s)", handle, pruned);
        } else {
            log::debug!("Removed body {}", handle);
        }
        Some(body)
    }

    /// Borrow a body
    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Mutably borrow a body. Pose changes are picked up by the next step.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    /// Whether the handle refers to a live body
    pub fn contains_body(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    /// Iterate over all bodies in handle order
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.bodies.iter()
    }

    // ==================== Joints ====================

    /// Add a distance joint.
    ///
    /// Returns `None` when either body is missing or both ends are the same
    /// body.
    pub fn add_distance_joint(&mut self, desc: DistanceJointDesc) -> Option<JointId> {
        if desc.body_a == desc.body_b {
            return None;
        }
        let joint = {
            let a = self.bodies.get(desc.body_a)?;
            let b = self.bodies.get(desc.body_b)?;
            DistanceJoint::new(JointId(self.next_joint_id), &desc, a, b)
        };
        let id = joint.id();
        self.next_joint_id += 1;

        for handle in [desc.body_a, desc.body_b] {
            if let Some(body) = self.bodies.get_mut(handle) {
                if body.is_dynamic() {
                    body.wake_up();
                }
            }
        }
        log::debug!(
            "Added distance joint {:?} between {} and {} (rest length {:.3})",
            id,
            desc.body_a,
            desc.body_b,
            joint.rest_length()
        );
        self.joints.insert(id, joint);
        Some(id)
    }

    /// Remove a joint. Returns false for unknown ids.
    pub fn remove_distance_joint(&mut self, id: JointId) -> bool {
        let removed = self.joints.remove(&id).is_some();
        if removed {
            log::debug!("Removed distance joint {:?}", id);
        }
        removed
    }

    /// Remove every joint
    pub fn clear_distance_joints(&mut self) {
        self.joints.clear();
    }

    /// Borrow a joint
    pub fn distance_joint(&self, id: JointId) -> Option<&DistanceJoint> {
        self.joints.get(&id)
    }

    /// Mutably borrow a joint
    pub fn distance_joint_mut(&mut self, id: JointId) -> Option<&mut DistanceJoint> {
        self.joints.get_mut(&id)
    }

    // ==================== Simulation ====================

    /// Advance the simulation by `delta_time` seconds of frame time.
    ///
    /// Time is accumulated and consumed in fixed steps. Non-positive or
    /// non-finite deltas are ignored.
    pub fn step(&mut self, delta_time: f32) {
        self.events.clear();
        for event in self.pending_events.drain(..) {
            self.events.push(event);
        }
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return;
        }

        let fixed = self.config.timestep;
        self.accumulated_time += delta_time.min(self.config.max_frame_step);

        let cap = self.config.max_fixed_steps_per_frame;
        let mut steps = 0;
        while self.accumulated_time >= fixed && steps < cap {
            self.simulate(fixed);
            self.accumulated_time -= fixed;
            steps += 1;
        }

        // A frame that used the whole budget drops whatever is left
        if steps == cap {
            if self.accumulated_time > 0.0 {
                log::warn!(
                    "Physics fell behind: dropping {:.4}s after {} fixed steps",
                    self.accumulated_time,
                    steps
                );
            }
            self.accumulated_time = 0.0;
        }
    }

    /// One fixed step, split into adaptive sub-steps
    fn simulate(&mut self, dt: f32) {
        let sub_steps = self.sub_step_count(dt);
        self.last_sub_steps = sub_steps;
        let h = dt / sub_steps as f32;
        if sub_steps > 1 {
            log::trace!("Fixed step split into {} sub-steps", sub_steps);
        }
        for _ in 0..sub_steps {
            self.sub_step(h);
        }
    }

    /// Worst-case motion of any awake dynamic body over the smallest half
    /// extent of any body, clamped to `1..=max_substeps`
    fn sub_step_count(&self, dt: f32) -> u32 {
        let mut motion = 0.0f32;
        let mut extent = f32::INFINITY;
        for (_, body) in self.bodies.iter() {
            extent = extent.min(body.half_extents().min_element());
            if !body.is_dynamic() || !body.is_awake() {
                continue;
            }
            let linear = (body.velocity + self.gravity * dt).length();
            let angular = body.angular_velocity.length() * body.bounding_radius();
            motion = motion.max(linear + angular);
        }
        let ratio = motion * dt / extent.max(MIN_SUBSTEP_EXTENT);
        if !ratio.is_finite() {
            return self.config.max_substeps;
        }
        (ratio.ceil() as u32).clamp(1, self.config.max_substeps)
    }

    fn sub_step(&mut self, h: f32) {
        self.integrate(h);

        self.refit_tree(h);
        let mut pairs = self.candidate_pairs();

        if self.config.ccd_enabled {
            let sweeps = ccd::candidate_pairs(&self.bodies, &self.tree);
            let rewound = ccd::resolve(&mut self.bodies, &sweeps);
            if !rewound.is_empty() {
                let margin = self.fat_margin(h);
                for handle in rewound {
                    if let Some(body) = self.bodies.get(handle) {
                        let tight = Aabb::from_body(body);
                        self.tree.update(handle, tight, margin.fatten(body, tight));
                    }
                }
                pairs = self.candidate_pairs();
            }
        }

        let mut contacts = self.build_contacts(&pairs);
        self.contact_count = contacts.len();

        let ctx = SolverContext::from_config(&self.config, h);
        {
            let bodies = &self.bodies;
            let mut constraints: Vec<&mut dyn Constraint> =
                Vec::with_capacity(contacts.len() + self.joints.len());
            for contact in contacts.iter_mut() {
                constraints.push(contact);
            }
            for joint in self.joints.values_mut() {
                if has_awake_dynamic(bodies, joint.body_a(), joint.body_b()) {
                    constraints.push(joint);
                }
            }
            solver::solve(
                &mut constraints,
                &mut self.bodies,
                &ctx,
                self.config.velocity_iterations,
                self.config.position_iterations,
            );
        }

        for contact in contacts {
            let manifold = contact.into_manifold();
            if self.manifold_cache.store(&manifold) {
                self.events.push(CollisionEvent::started(&manifold));
            }
        }
        for key in self.manifold_cache.end_sub_step(self.config.manifold_prune_frames) {
            self.events.push(CollisionEvent::stopped(key));
        }

        sleep::update(&mut self.bodies, &SleepParams::from_config(&self.config), h);
    }

    /// Semi-implicit Euler for awake dynamic bodies
    fn integrate(&mut self, h: f32) {
        let gravity = self.gravity;
        let sleep_params = SleepParams::from_config(&self.config);

        for (_, body) in self.bodies.iter_mut() {
            body.store_previous_pose();
            if !body.is_dynamic() || !body.is_awake() {
                body.clear_accumulators();
                continue;
            }
            sleep::note_applied_load(body, &sleep_params);

            body.velocity += (gravity + body.force() * body.inv_mass()) * h;
            body.angular_velocity += body.mul_inv_inertia(body.torque()) * h;

            body.velocity *= 1.0 / (1.0 + h * body.material.linear_damping);
            body.angular_velocity *= 1.0 / (1.0 + h * body.material.angular_damping);

            body.position += body.velocity * h;
            let w = body.angular_velocity;
            let spin = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * body.orientation;
            body.orientation = body.orientation + spin * (0.5 * h);
            body.normalize_orientation();

            body.clear_accumulators();
        }
    }

    fn fat_margin(&self, h: f32) -> FatMargin {
        FatMargin {
            margin: self.config.broadphase_margin,
            velocity_scale: self.config.velocity_padding,
            dt: h,
        }
    }

    fn refit_tree(&mut self, h: f32) {
        let margin = self.fat_margin(h);
        for (handle, body) in self.bodies.iter() {
            let tight = Aabb::from_body(body);
            self.tree.update(handle, tight, margin.fatten(body, tight));
        }
    }

    /// Overlapping pairs with at least one dynamic body
    fn candidate_pairs(&self) -> Vec<(BodyHandle, BodyHandle)> {
        let mut pairs = self.tree.query_pairs();
        pairs.retain(|&(a, b)| {
            match (self.bodies.get(a), self.bodies.get(b)) {
                (Some(a), Some(b)) => a.is_dynamic() || b.is_dynamic(),
                _ => false,
            }
        });
        pairs
    }

    /// Narrowphase over candidate pairs. Pairs with no awake dynamic body are
    /// kept alive in the cache but not solved.
    fn build_contacts(&mut self, pairs: &[(BodyHandle, BodyHandle)]) -> Vec<ContactConstraint> {
        let warm_start = WarmStartParams {
            distance: self.config.warm_start_distance,
            normal_similarity: self.config.warm_start_normal_similarity,
            factor: self.config.warm_start_factor,
        };

        let mut contacts = Vec::new();
        for &(ha, hb) in pairs {
            let (Some(a), Some(b)) = (self.bodies.get(ha), self.bodies.get(hb)) else {
                continue;
            };
            if !has_awake_dynamic(&self.bodies, ha, hb) {
                self.manifold_cache.keep_alive(&PairKey::new(ha, hb));
                continue;
            }
            let Some(contact) = collide(&Obb::from_body(a), &Obb::from_body(b)) else {
                continue;
            };

            let material = a.material.combine(&b.material);
            let mut manifold = ContactManifold::from_contact(ha, hb, contact, material);
            if self.config.warm_starting {
                self.manifold_cache.warm_start(&mut manifold, &warm_start);
            }
            contacts.push(ContactConstraint::new(manifold));
        }
        contacts
    }

    // ==================== Queries ====================

    /// Closest body hit by a ray, if any.
    ///
    /// Bodies containing the origin are skipped. A zero direction or a
    /// non-positive `max_distance` never hits.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        query::raycast(&self.bodies, origin, direction, max_distance)
    }

    // ==================== Events ====================

    /// Get collision events from the last step
    pub fn collision_events(&self) -> &[CollisionEvent] {
        &self.events.collision_events
    }

    /// Get collision start events
    pub fn collision_started(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.events.started_collisions()
    }

    /// Get collision end events
    pub fn collision_stopped(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.events.stopped_collisions()
    }

    // ==================== Debug ====================

    /// Get number of rigid bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Get number of awake dynamic bodies
    pub fn awake_body_count(&self) -> usize {
        self.bodies
            .iter()
            .filter(|(_, body)| body.is_dynamic() && body.is_awake())
            .count()
    }

    /// Get number of joints
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Contact manifolds solved in the last sub-step
    pub fn contact_count(&self) -> usize {
        self.contact_count
    }

    /// Sub-steps used by the last fixed step
    pub fn last_sub_step_count(&self) -> u32 {
        self.last_sub_steps
    }
}

/// True when either body is dynamic and awake
fn has_awake_dynamic(bodies: &BodySet, a: BodyHandle, b: BodyHandle) -> bool {
    [a, b].into_iter().any(|handle| {
        bodies
            .get(handle)
            .is_some_and(|body| body.is_dynamic() && body.is_awake())
    })
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhysicsError;
    use crate::material::PhysicsMaterial;

    fn ground() -> RigidBodyDesc {
        RigidBodyDesc::fixed()
            .with_position(0.0, -0.5, 0.0)
            .with_half_extents(10.0, 0.5, 10.0)
    }

    #[test]
    fn test_create_world() {
        let world = PhysicsWorld::new(PhysicsConfig::default());
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.joint_count(), 0);
        assert_eq!(world.gravity(), Vec3::new(0.0, -9.81, 0.0));
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let config = PhysicsConfig::default().with_timestep(-1.0);
        assert!(matches!(
            PhysicsWorld::try_new(config),
            Err(PhysicsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_gravity_fall() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default());

        let body = world.create_body(&RigidBodyDesc::dynamic().with_position(0.0, 10.0, 0.0));
        let initial_y = world.body(body).unwrap().position.y;

        // Step simulation
        for _ in 0..60 {
            world.step(1.0 / 60.0);
        }

        let final_y = world.body(body).unwrap().position.y;
        assert!(final_y < initial_y, "Body should fall due to gravity");
    }

    #[test]
    fn test_invalid_delta_ignored() {
        let mut world = PhysicsWorld::default();
        let body = world.create_body(&RigidBodyDesc::dynamic().with_position(0.0, 10.0, 0.0));

        for dt in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            world.step(dt);
        }
        assert_eq!(world.body(body).unwrap().position.y, 10.0);
        assert_eq!(world.accumulated_time, 0.0);
    }

    #[test]
    fn test_large_delta_is_clamped() {
        let mut world = PhysicsWorld::default();
        let body = world.create_body(&RigidBodyDesc::dynamic().with_position(0.0, 100.0, 0.0));
        world.step(10.0);

        // At most max_frame_step of simulated time: free fall of 0.1s
        let y = world.body(body).unwrap().position.y;
        assert!(y > 100.0 - 0.5 * 9.81 * 0.2 * 0.2);
        assert!(world.accumulated_time < world.config().timestep);
    }

    #[test]
    fn test_fixed_step_cap_drops_accumulator() {
        let config = PhysicsConfig {
            timestep: 0.001,
            max_fixed_steps_per_frame: 3,
            ..Default::default()
        };
        let mut world = PhysicsWorld::new(config);
        world.step(0.05);
        assert_eq!(world.accumulated_time, 0.0);
    }

    #[test]
    fn test_full_budget_frame_drops_remainder() {
        let config = PhysicsConfig {
            timestep: 0.01,
            max_fixed_steps_per_frame: 2,
            ..Default::default()
        };
        let mut world = PhysicsWorld::new(config);
        world.step(0.025);
        assert_eq!(world.accumulated_time, 0.0);

        // Below the budget the remainder carries over
        world.step(0.015);
        assert!(world.accumulated_time > 0.0);
    }

    #[test]
    fn test_smallest_body_sets_sub_steps() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default().with_gravity(0.0, 0.0, 0.0));
        world.create_body(
            &RigidBodyDesc::dynamic()
                .with_half_extents(1.0, 1.0, 1.0)
                .with_linear_velocity(27.0, 0.0, 0.0),
        );
        world.create_body(
            &RigidBodyDesc::fixed()
                .with_position(0.0, 50.0, 0.0)
                .with_half_extents(0.1, 0.1, 0.1),
        );
        world.step(1.0 / 60.0);
        assert_eq!(world.last_sub_step_count(), 5);
    }

    #[test]
    fn test_removed_body_reports_stopped_contact() {
        let mut world = PhysicsWorld::default();
        let floor = world.create_body(&ground());
        let cube = world.create_body(&RigidBodyDesc::dynamic().with_position(0.0, 0.5, 0.0));
        for _ in 0..30 {
            world.step(1.0 / 60.0);
        }

        world.remove_body(cube);
        world.step(1.0 / 60.0);
        let stopped: Vec<_> = world.collision_stopped().collect();
        assert_eq!(stopped.len(), 1);
        assert!(stopped[0].involves(floor) && stopped[0].involves(cube));

        world.step(1.0 / 60.0);
        assert_eq!(world.collision_stopped().count(), 0);
    }

    #[test]
    fn test_stale_handle_after_remove() {
        let mut world = PhysicsWorld::default();
        let a = world.create_body(&RigidBodyDesc::dynamic());
        assert!(world.remove_body(a).is_some());
        assert!(world.remove_body(a).is_none());
        assert!(world.body(a).is_none());

        let b = world.create_body(&RigidBodyDesc::dynamic());
        assert_eq!(a.index(), b.index());
        assert!(world.body(a).is_none());
        assert!(world.body(b).is_some());
    }

    #[test]
    fn test_joint_lifecycle() {
        let mut world = PhysicsWorld::default();
        let a = world.create_body(&RigidBodyDesc::dynamic());
        let b = world.create_body(&RigidBodyDesc::dynamic().with_position(2.0, 0.0, 0.0));
        let c = world.create_body(&RigidBodyDesc::dynamic().with_position(4.0, 0.0, 0.0));

        assert!(world.add_distance_joint(DistanceJointDesc::new(a, a)).is_none());

        let ab = world.add_distance_joint(DistanceJointDesc::new(a, b)).unwrap();
        let bc = world.add_distance_joint(DistanceJointDesc::new(b, c)).unwrap();
        assert_ne!(ab, bc);
        assert_eq!(world.joint_count(), 2);
        assert!((world.distance_joint(ab).unwrap().rest_length() - 2.0).abs() < 1e-6);

        // Removing a body prunes its joints
        world.remove_body(a);
        assert_eq!(world.joint_count(), 1);
        assert!(world.distance_joint(ab).is_none());
        assert!(world.add_distance_joint(DistanceJointDesc::new(a, c)).is_none());

        assert!(world.remove_distance_joint(bc));
        assert!(!world.remove_distance_joint(bc));

        world.add_distance_joint(DistanceJointDesc::new(b, c));
        world.clear_distance_joints();
        assert_eq!(world.joint_count(), 0);
    }

    #[test]
    fn test_settings_are_clamped() {
        let mut world = PhysicsWorld::default();
        world.set_solver_iterations(0, 0);
        assert_eq!(world.config().velocity_iterations, 1);
        assert_eq!(world.config().position_iterations, 1);
        world.set_max_sub_steps(100);
        assert_eq!(world.config().max_substeps, 16);
        world.set_max_sub_steps(0);
        assert_eq!(world.config().max_substeps, 1);
    }

    #[test]
    fn test_box_lands_and_reports_contact() {
        let mut world = PhysicsWorld::default();
        let floor = world.create_body(&ground());
        let cube = world.create_body(&RigidBodyDesc::dynamic().with_position(0.0, 1.0, 0.0));

        let mut started = false;
        for _ in 0..120 {
            world.step(1.0 / 60.0);
            started |= world
                .collision_started()
                .any(|e| e.involves(floor) && e.involves(cube));
        }
        assert!(started);

        let y = world.body(cube).unwrap().position.y;
        assert!((y - 0.5).abs() < 0.05, "resting height {y}");
    }

    #[test]
    fn test_fast_body_uses_more_sub_steps() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default().with_gravity(0.0, 0.0, 0.0));
        world.create_body(
            &RigidBodyDesc::dynamic()
                .with_half_extents(0.1, 0.1, 0.1)
                .with_linear_velocity(40.0, 0.0, 0.0),
        );
        world.step(1.0 / 60.0);
        assert_eq!(world.last_sub_step_count(), 6);

        world.set_max_sub_steps(2);
        world.step(1.0 / 60.0);
        assert_eq!(world.last_sub_step_count(), 2);
    }

    #[test]
    fn test_kinematic_pushes_dynamic() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default().with_gravity(0.0, 0.0, 0.0));
        let pusher = world.create_body(&RigidBodyDesc::kinematic().with_position(-1.0, 0.0, 0.0));
        let cube = world.create_body(
            &RigidBodyDesc::dynamic()
                .with_position(0.05, 0.0, 0.0)
                .with_material(PhysicsMaterial::new(0.0, 0.0)),
        );

        for i in 0..30 {
            world.body_mut(pusher).unwrap().position.x = -1.0 + 0.02 * (i + 1) as f32;
            world.step(1.0 / 60.0);
        }
        let pusher = world.body(pusher).unwrap();
        assert_eq!(pusher.inv_mass(), 0.0);
        assert!(world.body(cube).unwrap().position.x > 0.05);
    }
}
