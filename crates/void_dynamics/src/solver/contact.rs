//! Contact constraint: non-penetration plus Coulomb friction

use super::{Constraint, SolverContext};
use crate::arena::BodySet;
use crate::body::RigidBody;
use crate::contact::ContactManifold;
use crate::math::{any_perpendicular, inv_effective_mass, safe_normalize};
use crate::narrowphase::{collide, Obb};
use glam::{Vec2, Vec3};

/// Displacement that counts as moving a sleeping body
const POSITION_WAKE_DISTANCE: f32 = 1.0e-3;

#[derive(Debug, Clone, Copy, Default)]
struct PointState {
    r_a: Vec3,
    r_b: Vec3,
    normal_mass: f32,
    tangents: [Vec3; 2],
    tangent_mass: [f32; 2],
    tangent_impulse: Vec2,
    velocity_bias: f32,
}

/// Solver view of one contact manifold
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    manifold: ContactManifold,
    states: Vec<PointState>,
}

impl ContactConstraint {
    /// Wrap a manifold whose impulses may already be warm-started
    pub fn new(manifold: ContactManifold) -> Self {
        Self {
            manifold,
            states: Vec::new(),
        }
    }

    /// The manifold with its current accumulated impulses
    #[inline]
    pub fn manifold(&self) -> &ContactManifold {
        &self.manifold
    }

    /// Hand the manifold back for caching
    pub fn into_manifold(self) -> ContactManifold {
        self.manifold
    }
}

#[inline]
fn velocity_at(body: &RigidBody, r: Vec3) -> Vec3 {
    body.velocity + body.angular_velocity.cross(r)
}

#[inline]
fn angular_mass(body: &RigidBody, r: Vec3, dir: Vec3) -> f32 {
    body.mul_inv_inertia(r.cross(dir)).cross(r).dot(dir)
}

/// Apply `impulse` to B and its negation to A
#[inline]
fn apply_pair(
    a: &mut RigidBody,
    b: &mut RigidBody,
    impulse: Vec3,
    r_a: Vec3,
    r_b: Vec3,
    wake_threshold: f32,
) {
    a.apply_solver_impulse(-impulse, r_a, wake_threshold);
    b.apply_solver_impulse(impulse, r_b, wake_threshold);
}

impl Constraint for ContactConstraint {
    fn prepare(&mut self, bodies: &BodySet, ctx: &SolverContext) {
        self.states.clear();
        let (Some(a), Some(b)) = (
            bodies.get(self.manifold.body_a),
            bodies.get(self.manifold.body_b),
        ) else {
            return;
        };

        let n = self.manifold.normal;
        let inv_mass_sum = a.inv_mass() + b.inv_mass();
        let restitution = self.manifold.material.restitution;

        for point in &self.manifold.points {
            let r_a = point.point - a.position;
            let r_b = point.point - b.position;

            let k_normal = inv_mass_sum + angular_mass(a, r_a, n) + angular_mass(b, r_b, n);

            let dv = velocity_at(b, r_b) - velocity_at(a, r_a);
            let vn = dv.dot(n);
            let vt = dv - n * vn;
            let t1 = safe_normalize(vt, any_perpendicular(n));
            let t2 = safe_normalize(n.cross(t1), any_perpendicular(t1));

            let tangent_mass = [t1, t2].map(|t| {
                inv_effective_mass(inv_mass_sum + angular_mass(a, r_a, t) + angular_mass(b, r_b, t))
            });

            let bounce = if vn < -ctx.restitution_velocity_threshold {
                -restitution * vn
            } else {
                0.0
            };
            let push_out = ctx.bias_rate() * (point.penetration - ctx.penetration_slop).max(0.0);

            self.states.push(PointState {
                r_a,
                r_b,
                normal_mass: inv_effective_mass(k_normal),
                tangents: [t1, t2],
                tangent_mass,
                tangent_impulse: Vec2::new(
                    point.tangent_impulse.dot(t1),
                    point.tangent_impulse.dot(t2),
                ),
                velocity_bias: bounce.max(push_out),
            });
        }

        // Keep the world-space friction impulse in the new tangent basis
        for (point, state) in self.manifold.points.iter_mut().zip(&self.states) {
            point.tangent_impulse = state.tangents[0] * state.tangent_impulse.x
                + state.tangents[1] * state.tangent_impulse.y;
        }
    }

    fn warm_start(&mut self, bodies: &mut BodySet, ctx: &SolverContext) {
        if self.states.is_empty() {
            return;
        }
        let Some((a, b)) = bodies.get_pair_mut(self.manifold.body_a, self.manifold.body_b) else {
            return;
        };
        let n = self.manifold.normal;
        for (point, state) in self.manifold.points.iter().zip(&self.states) {
            let impulse = n * point.normal_impulse + point.tangent_impulse;
            if impulse != Vec3::ZERO {
                apply_pair(a, b, impulse, state.r_a, state.r_b, ctx.wake_impulse_threshold);
            }
        }
    }

    fn solve_velocity(&mut self, bodies: &mut BodySet, ctx: &SolverContext) -> f32 {
        if self.states.is_empty() {
            return 0.0;
        }
        let Some((a, b)) = bodies.get_pair_mut(self.manifold.body_a, self.manifold.body_b) else {
            return 0.0;
        };
        let n = self.manifold.normal;
        let material = self.manifold.material;
        let mut largest = 0.0f32;

        for (point, state) in self.manifold.points.iter_mut().zip(self.states.iter_mut()) {
            // Normal
            let dv = velocity_at(b, state.r_b) - velocity_at(a, state.r_a);
            let vn = dv.dot(n);
            let lambda = -state.normal_mass * (vn - state.velocity_bias);
            let old = point.normal_impulse;
            point.normal_impulse = (old + lambda).max(0.0);
            let applied = point.normal_impulse - old;
            if applied != 0.0 {
                apply_pair(a, b, n * applied, state.r_a, state.r_b, ctx.wake_impulse_threshold);
            }
            largest = largest.max(applied.abs());

            // Friction
            let dv = velocity_at(b, state.r_b) - velocity_at(a, state.r_a);
            let delta = Vec2::new(
                -state.tangent_mass[0] * dv.dot(state.tangents[0]),
                -state.tangent_mass[1] * dv.dot(state.tangents[1]),
            );
            let old = state.tangent_impulse;
            let mut accumulated = old + delta;
            let magnitude = accumulated.length();
            let static_limit = material.static_friction * point.normal_impulse;
            if magnitude > static_limit {
                // Sliding: fall back to the dynamic cone
                let dynamic_limit = material.dynamic_friction * point.normal_impulse;
                accumulated *= dynamic_limit / magnitude;
            }
            state.tangent_impulse = accumulated;
            let applied = accumulated - old;
            if applied != Vec2::ZERO {
                let impulse = state.tangents[0] * applied.x + state.tangents[1] * applied.y;
                apply_pair(a, b, impulse, state.r_a, state.r_b, ctx.wake_impulse_threshold);
            }
            point.tangent_impulse =
                state.tangents[0] * accumulated.x + state.tangents[1] * accumulated.y;
            largest = largest.max(applied.abs().max_element());
        }

        largest
    }

    fn solve_position(&mut self, bodies: &mut BodySet, ctx: &SolverContext) -> f32 {
        let Some((a, b)) = bodies.get_pair_mut(self.manifold.body_a, self.manifold.body_b) else {
            return 0.0;
        };
        let inv_sum = a.inv_mass() + b.inv_mass();
        if inv_sum <= 0.0 {
            return 0.0;
        }
        let Some(contact) = collide(&Obb::from_body(a), &Obb::from_body(b)) else {
            return 0.0;
        };

        let penetration = contact.max_penetration();
        let correction = (ctx.position_correction * (penetration - ctx.penetration_slop))
            .min(ctx.max_position_correction);
        if correction <= 0.0 {
            return 0.0;
        }

        let n = contact.normal;
        let move_a = correction * a.inv_mass() / inv_sum;
        let move_b = correction * b.inv_mass() / inv_sum;
        a.position -= n * move_a;
        b.position += n * move_b;
        if !a.is_awake() && move_a > POSITION_WAKE_DISTANCE {
            a.wake_up();
        }
        if !b.is_awake() && move_b > POSITION_WAKE_DISTANCE {
            b.wake_up();
        }
        correction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::BodyHandle;
    use crate::body::RigidBodyDesc;
    use crate::config::PhysicsConfig;
    use crate::contact::{ManifoldCache, WarmStartParams};
    use crate::solver::{begin, solve, solve_velocities};

    const DT: f32 = 1.0 / 60.0;

    /// Unit box resting on a wide static slab, moving down at one step of gravity
    fn resting_pair() -> (BodySet, BodyHandle, BodyHandle, ContactManifold) {
        let mut bodies = BodySet::new();
        let ground = bodies.insert(
            RigidBodyDesc::fixed()
                .with_position(0.0, -0.5, 0.0)
                .with_half_extents(5.0, 0.5, 5.0)
                .build(),
        );
        let cube = bodies.insert(
            RigidBodyDesc::dynamic()
                .with_position(0.0, 0.495, 0.0)
                .with_linear_velocity(0.0, -9.81 * DT, 0.0)
                .build(),
        );

        let (g, c) = (bodies.get(ground).unwrap(), bodies.get(cube).unwrap());
        let contact = collide(&Obb::from_body(g), &Obb::from_body(c)).unwrap();
        let material = g.material.combine(&c.material);
        let manifold = ContactManifold::from_contact(ground, cube, contact, material);
        (bodies, ground, cube, manifold)
    }

    fn context() -> SolverContext {
        SolverContext::from_config(&PhysicsConfig::default(), DT)
    }

    #[test]
    fn test_contact_stops_approach() {
        let (mut bodies, ground, cube, manifold) = resting_pair();
        let mut constraint = ContactConstraint::new(manifold);
        let ctx = context();
        solve(&mut [&mut constraint], &mut bodies, &ctx, 50, 4);

        let body = bodies.get(cube).unwrap();
        assert!(body.velocity.y > -1.0e-3, "vy = {}", body.velocity.y);
        assert!(constraint.manifold().total_normal_impulse() > 0.0);

        let ground = bodies.get(ground).unwrap();
        assert_eq!(ground.velocity, Vec3::ZERO);
        assert_eq!(ground.position, Vec3::new(0.0, -0.5, 0.0));
    }

    fn warm_start_params() -> WarmStartParams {
        let config = PhysicsConfig::default();
        WarmStartParams {
            distance: config.warm_start_distance,
            normal_similarity: config.warm_start_normal_similarity,
            factor: config.warm_start_factor,
        }
    }

    /// The resting pair with the cube slid sideways by `offset`
    fn shifted_pair(offset: f32) -> (BodySet, ContactManifold) {
        let (mut bodies, ground, cube, _) = resting_pair();
        bodies.get_mut(cube).unwrap().position.x += offset;
        let (g, c) = (bodies.get(ground).unwrap(), bodies.get(cube).unwrap());
        let contact = collide(&Obb::from_body(g), &Obb::from_body(c)).unwrap();
        let manifold = ContactManifold::from_contact(ground, cube, contact, g.material.combine(&c.material));
        (bodies, manifold)
    }

    #[test]
    fn test_warm_start_converges_faster() {
        let ctx = context();
        let tolerance = 1.0e-5;
        let mut cache = ManifoldCache::new();

        let (mut bodies, _, _, manifold) = resting_pair();
        let mut cold = ContactConstraint::new(manifold);
        begin(&mut [&mut cold], &mut bodies, &ctx);
        let (cold_iterations, _) = solve_velocities(&mut [&mut cold], &mut bodies, &ctx, 200, tolerance);
        assert!(cache.store(&cold.into_manifold()));

        // Next sub-step the box has drifted a little; points still match
        let (mut bodies, mut manifold) = shifted_pair(0.03);
        cache.warm_start(&mut manifold, &warm_start_params());
        assert!(manifold.points.iter().all(|p| p.normal_impulse > 0.0));

        let mut warm = ContactConstraint::new(manifold);
        begin(&mut [&mut warm], &mut bodies, &ctx);
        let (warm_iterations, _) = solve_velocities(&mut [&mut warm], &mut bodies, &ctx, 200, tolerance);

        assert!(cold_iterations > 1);
        assert!(
            warm_iterations < cold_iterations,
            "warm {warm_iterations} vs cold {cold_iterations}"
        );
    }

    #[test]
    fn test_warm_start_skips_distant_points() {
        let ctx = context();
        let mut cache = ManifoldCache::new();

        let (mut bodies, _, _, manifold) = resting_pair();
        let mut solved = ContactConstraint::new(manifold);
        solve(&mut [&mut solved], &mut bodies, &ctx, 10, 1);
        cache.store(&solved.into_manifold());

        let (_, mut manifold) = shifted_pair(0.2);
        cache.warm_start(&mut manifold, &warm_start_params());
        assert!(manifold.points.iter().all(|p| p.normal_impulse == 0.0));
    }

    #[test]
    fn test_friction_slows_sliding_box() {
        let (mut bodies, _, cube, manifold) = resting_pair();
        bodies.get_mut(cube).unwrap().velocity.x = 1.0;
        let mut constraint = ContactConstraint::new(manifold);
        let ctx = context();
        solve(&mut [&mut constraint], &mut bodies, &ctx, 10, 1);

        let vx = bodies.get(cube).unwrap().velocity.x;
        assert!(vx < 1.0);
        assert!(vx >= 0.0);
    }

    #[test]
    fn test_position_pass_pushes_out() {
        let (mut bodies, _, cube, manifold) = resting_pair();
        bodies.get_mut(cube).unwrap().position.y = 0.3;
        let mut constraint = ContactConstraint::new(manifold);
        let ctx = context();
        let moved = constraint.solve_position(&mut bodies, &ctx);

        assert!(moved > 0.0);
        assert!(bodies.get(cube).unwrap().position.y > 0.3);
    }
}
