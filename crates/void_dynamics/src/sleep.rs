//! Sleep management
//!
//! A dynamic body that stays slow for `delay` seconds is put to sleep: it
//! keeps its place in the broadphase but is no longer integrated or solved
//! unless something wakes it.

use crate::arena::BodySet;
use crate::body::RigidBody;
use crate::config::PhysicsConfig;

/// Sleep thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepParams {
    /// Global switch
    pub enabled: bool,
    /// Linear speed below which a body counts as resting
    pub linear_threshold: f32,
    /// Angular speed below which a body counts as resting
    pub angular_threshold: f32,
    /// Force or torque magnitude that keeps a body awake
    pub force_threshold: f32,
    /// Seconds of rest before sleeping
    pub delay: f32,
}

impl SleepParams {
    /// Read thresholds from the world configuration
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            enabled: config.sleeping_enabled,
            linear_threshold: config.sleep_linear_threshold,
            angular_threshold: config.sleep_angular_threshold,
            force_threshold: config.sleep_force_threshold,
            delay: config.sleep_delay,
        }
    }
}

/// Restart the sleep timer of a body carrying a real force or torque.
/// Called before the accumulators are cleared.
pub fn note_applied_load(body: &mut RigidBody, params: &SleepParams) {
    let limit = params.force_threshold * params.force_threshold;
    if body.force().length_squared() > limit || body.torque().length_squared() > limit {
        body.set_sleep_timer(0.0);
    }
}

/// Advance one body's sleep state. Returns true when it fell asleep.
pub fn update_body(body: &mut RigidBody, params: &SleepParams, dt: f32) -> bool {
    if !body.is_dynamic() || !params.enabled || !body.enable_sleep {
        if !body.is_awake() {
            body.wake_up();
        }
        body.set_sleep_timer(0.0);
        return false;
    }

    if !body.is_awake() {
        // Drop anything sub-threshold solver impulses left behind
        body.sleep();
        return false;
    }

    let resting = body.velocity.length_squared() < params.linear_threshold * params.linear_threshold
        && body.angular_velocity.length_squared()
            < params.angular_threshold * params.angular_threshold;
    if !resting {
        body.set_sleep_timer(0.0);
        return false;
    }

    let timer = body.sleep_timer() + dt;
    body.set_sleep_timer(timer);
    if timer >= params.delay {
        body.sleep();
        return true;
    }
    false
}

/// Update every body. Returns how many fell asleep.
pub fn update(bodies: &mut BodySet, params: &SleepParams, dt: f32) -> usize {
    let mut slept = 0;
    for (handle, body) in bodies.iter_mut() {
        if update_body(body, params, dt) {
            log::trace!("Body {} fell asleep", handle);
            slept += 1;
        }
    }
    slept
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn params() -> SleepParams {
        SleepParams::from_config(&PhysicsConfig::default())
    }

    #[test]
    fn test_resting_body_falls_asleep_after_delay() {
        let mut body = RigidBody::dynamic();
        let p = params();
        let dt = 0.1;
        let mut steps = 0;
        while !update_body(&mut body, &p, dt) {
            steps += 1;
            assert!(steps < 100);
        }
        assert!(!body.is_awake());
        assert!(steps as f32 * dt >= p.delay - dt - 1e-4);
    }

    #[test]
    fn test_moving_body_stays_awake() {
        let mut body = RigidBody::dynamic();
        body.velocity = Vec3::new(1.0, 0.0, 0.0);
        for _ in 0..100 {
            assert!(!update_body(&mut body, &params(), 0.1));
        }
        assert_eq!(body.sleep_timer(), 0.0);
    }

    #[test]
    fn test_sleep_disabled_keeps_awake() {
        let mut body = RigidBody::dynamic();
        body.enable_sleep = false;
        for _ in 0..100 {
            update_body(&mut body, &params(), 0.1);
        }
        assert!(body.is_awake());

        let mut body = RigidBody::dynamic();
        let off = SleepParams {
            enabled: false,
            ..params()
        };
        for _ in 0..100 {
            update_body(&mut body, &off, 0.1);
        }
        assert!(body.is_awake());
    }

    #[test]
    fn test_static_never_sleeps() {
        let mut body = RigidBody::fixed();
        for _ in 0..100 {
            assert!(!update_body(&mut body, &params(), 0.1));
        }
        assert!(body.is_awake());
    }

    #[test]
    fn test_applied_force_resets_timer() {
        let mut body = RigidBody::dynamic();
        update_body(&mut body, &params(), 0.2);
        assert!(body.sleep_timer() > 0.0);

        body.apply_force(Vec3::new(0.0, 5.0, 0.0));
        note_applied_load(&mut body, &params());
        assert_eq!(body.sleep_timer(), 0.0);
    }
}
