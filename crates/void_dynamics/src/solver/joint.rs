//! Distance joint constraint

use super::{Constraint, SolverContext};
use crate::arena::BodySet;
use crate::body::RigidBody;
use crate::joint::DistanceJoint;
use crate::math::inv_effective_mass;
use glam::Vec3;

/// Largest correction one position iteration may apply
const MAX_JOINT_CORRECTION: f32 = 0.2;

#[inline]
fn angular_mass(body: &RigidBody, r: Vec3, axis: Vec3) -> f32 {
    body.mul_inv_inertia(r.cross(axis)).cross(r).dot(axis)
}

impl Constraint for DistanceJoint {
    fn prepare(&mut self, bodies: &BodySet, ctx: &SolverContext) {
        let (Some(a), Some(b)) = (bodies.get(self.body_a()), bodies.get(self.body_b())) else {
            self.effective_mass = 0.0;
            self.impulse = 0.0;
            return;
        };
        let (axis, error, r_a, r_b) = self.axis_and_error(a, b);
        let k = a.inv_mass() + b.inv_mass() + angular_mass(a, r_a, axis) + angular_mass(b, r_b, axis);

        self.axis = axis;
        self.r_a = r_a;
        self.r_b = r_b;
        self.effective_mass = inv_effective_mass(k);
        // Damping slows the axial speed at which the error is fed back
        self.bias = self.stiffness() * ctx.bias_rate() * error / (1.0 + self.damping());
        self.impulse *= ctx.warm_start_factor;
    }

    fn warm_start(&mut self, bodies: &mut BodySet, ctx: &SolverContext) {
        if self.impulse == 0.0 {
            return;
        }
        let Some((a, b)) = bodies.get_pair_mut(self.body_a(), self.body_b()) else {
            return;
        };
        let p = self.axis * self.impulse;
        a.apply_solver_impulse(-p, self.r_a, ctx.wake_impulse_threshold);
        b.apply_solver_impulse(p, self.r_b, ctx.wake_impulse_threshold);
    }

    fn solve_velocity(&mut self, bodies: &mut BodySet, ctx: &SolverContext) -> f32 {
        let Some((a, b)) = bodies.get_pair_mut(self.body_a(), self.body_b()) else {
            return 0.0;
        };
        let va = a.velocity + a.angular_velocity.cross(self.r_a);
        let vb = b.velocity + b.angular_velocity.cross(self.r_b);
        let c_dot = (vb - va).dot(self.axis);

        let lambda = -self.effective_mass * (c_dot + self.bias);
        self.impulse += lambda;

        let p = self.axis * lambda;
        a.apply_solver_impulse(-p, self.r_a, ctx.wake_impulse_threshold);
        b.apply_solver_impulse(p, self.r_b, ctx.wake_impulse_threshold);
        lambda.abs()
    }

    fn solve_position(&mut self, bodies: &mut BodySet, _ctx: &SolverContext) -> f32 {
        let Some((a, b)) = bodies.get_pair_mut(self.body_a(), self.body_b()) else {
            return 0.0;
        };
        let inv_sum = a.inv_mass() + b.inv_mass();
        if inv_sum <= 0.0 {
            return 0.0;
        }
        let (axis, error, _, _) = self.axis_and_error(a, b);
        let correction = (self.stiffness() * error).clamp(-MAX_JOINT_CORRECTION, MAX_JOINT_CORRECTION);
        if correction == 0.0 {
            return 0.0;
        }

        // Positive error: anchors too far apart, pull them together
        a.position += axis * (correction * a.inv_mass() / inv_sum);
        b.position -= axis * (correction * b.inv_mass() / inv_sum);
        if !a.is_awake() && a.inv_mass() > 0.0 {
            a.wake_up();
        }
        if !b.is_awake() && b.inv_mass() > 0.0 {
            b.wake_up();
        }
        correction.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::BodyHandle;
    use crate::body::RigidBodyDesc;
    use crate::config::PhysicsConfig;
    use crate::joint::{DistanceJointDesc, JointId};
    use crate::solver::solve;
    use approx::assert_relative_eq;

    fn setup(distance: f32, rest: f32) -> (BodySet, BodyHandle, BodyHandle, DistanceJoint) {
        let mut bodies = BodySet::new();
        let a = bodies.insert(RigidBodyDesc::dynamic().build());
        let b = bodies.insert(RigidBodyDesc::dynamic().with_position(distance, 0.0, 0.0).build());
        let desc = DistanceJointDesc::new(a, b).with_rest_length(rest);
        let joint = DistanceJoint::new(
            JointId(1),
            &desc,
            bodies.get(a).unwrap(),
            bodies.get(b).unwrap(),
        );
        (bodies, a, b, joint)
    }

    #[test]
    fn test_stretched_joint_pulls_together() {
        let (mut bodies, a, b, mut joint) = setup(3.0, 2.0);
        let ctx = SolverContext::from_config(&PhysicsConfig::default(), 1.0 / 60.0);
        solve(&mut [&mut joint], &mut bodies, &ctx, 10, 4);

        let (ba, bb) = (bodies.get(a).unwrap(), bodies.get(b).unwrap());
        assert!(ba.velocity.x > 0.0);
        assert!(bb.velocity.x < 0.0);
        assert_relative_eq!(ba.velocity.x, -bb.velocity.x, epsilon = 1e-4);
        assert!(bb.position.x - ba.position.x < 3.0);
    }

    #[test]
    fn test_undamped_joint_shares_axial_momentum() {
        let (mut bodies, a, b, mut joint) = setup(2.0, 2.0);
        joint.set_damping(0.0);
        bodies.get_mut(b).unwrap().velocity = Vec3::new(10.0, 0.0, 0.0);
        let ctx = SolverContext::from_config(&PhysicsConfig::default(), 1.0 / 60.0);
        solve(&mut [&mut joint], &mut bodies, &ctx, 10, 4);

        let (ba, bb) = (bodies.get(a).unwrap(), bodies.get(b).unwrap());
        assert_relative_eq!(ba.velocity.x, 5.0, epsilon = 1e-3);
        assert_relative_eq!(bb.velocity.x, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_damping_softens_restoring_speed() {
        let ctx = SolverContext::from_config(&PhysicsConfig::default(), 1.0 / 60.0);
        let mut closing = [0.0; 2];
        for (slot, damping) in closing.iter_mut().zip([0.0, 4.0]) {
            let (mut bodies, a, b, mut joint) = setup(3.0, 2.0);
            joint.set_damping(damping);
            solve(&mut [&mut joint], &mut bodies, &ctx, 10, 1);
            *slot = bodies.get(a).unwrap().velocity.x - bodies.get(b).unwrap().velocity.x;
        }
        assert!(closing[0] > 0.0);
        assert!(closing[1] > 0.0);
        assert!(closing[1] < closing[0]);
    }

    #[test]
    fn test_joint_to_static_body_moves_only_dynamic_end() {
        let mut bodies = BodySet::new();
        let anchor = bodies.insert(RigidBodyDesc::fixed().build());
        let bob = bodies.insert(RigidBodyDesc::dynamic().with_position(0.0, -1.5, 0.0).build());
        let desc = DistanceJointDesc::new(anchor, bob).with_rest_length(1.0);
        let mut joint = DistanceJoint::new(
            JointId(1),
            &desc,
            bodies.get(anchor).unwrap(),
            bodies.get(bob).unwrap(),
        );
        let ctx = SolverContext::from_config(&PhysicsConfig::default(), 1.0 / 60.0);
        solve(&mut [&mut joint], &mut bodies, &ctx, 10, 4);

        assert_eq!(bodies.get(anchor).unwrap().position, Vec3::ZERO);
        assert!(bodies.get(bob).unwrap().position.y > -1.5);
    }
}
