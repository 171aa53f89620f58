//! Physics configuration

use crate::error::{PhysicsError, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Upper bound for [`PhysicsConfig::max_substeps`]
pub const MAX_SUBSTEPS_LIMIT: u32 = 16;

/// Physics world configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity vector (default: -9.81 in Y)
    pub gravity: [f32; 3],

    /// Fixed timestep for physics simulation
    pub timestep: f32,

    /// Largest frame delta accepted by `step`; anything above is clamped
    pub max_frame_step: f32,

    /// Fixed steps allowed per `step` call before the accumulator is dropped
    pub max_fixed_steps_per_frame: u32,

    /// Maximum number of adaptive substeps per fixed step (1..=16)
    pub max_substeps: u32,

    /// Solver iterations for velocity
    pub velocity_iterations: usize,

    /// Solver iterations for position
    pub position_iterations: usize,

    /// Re-apply cached impulses at the start of each solve
    pub warm_starting: bool,

    /// Scale on cached impulses when warm starting
    pub warm_start_factor: f32,

    /// Max distance between a contact point and its cached match
    pub warm_start_distance: f32,

    /// Min normal dot product for a cached manifold to be reused
    pub warm_start_normal_similarity: f32,

    /// Sub-steps a pair may go without contact before its cache entry is dropped
    pub manifold_prune_frames: u32,

    /// Velocity bias factor for penetration recovery
    pub baumgarte: f32,

    /// Penetration allowed before any correction kicks in
    pub penetration_slop: f32,

    /// Fraction of remaining penetration removed per position iteration
    pub position_correction: f32,

    /// Cap on a single position correction
    pub max_position_correction: f32,

    /// Approach speeds below this do not bounce
    pub restitution_velocity_threshold: f32,

    /// Solver impulses above this wake a sleeping body
    pub wake_impulse_threshold: f32,

    /// Fixed margin added to every fat AABB
    pub broadphase_margin: f32,

    /// Multiplier on the velocity sweep of fat AABBs
    pub velocity_padding: f32,

    /// Enable continuous collision detection
    pub ccd_enabled: bool,

    /// Enable sleeping for inactive bodies
    pub sleeping_enabled: bool,

    /// Linear velocity threshold for sleeping
    pub sleep_linear_threshold: f32,

    /// Angular velocity threshold for sleeping
    pub sleep_angular_threshold: f32,

    /// Applied force or torque above this keeps a body awake
    pub sleep_force_threshold: f32,

    /// Seconds a body must stay below the thresholds before sleeping
    pub sleep_delay: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            timestep: 1.0 / 60.0,
            max_frame_step: 0.1,
            max_fixed_steps_per_frame: 8,
            max_substeps: 6,
            velocity_iterations: 10,
            position_iterations: 4,
            warm_starting: true,
            warm_start_factor: 0.9,
            warm_start_distance: 0.05,
            warm_start_normal_similarity: 0.95,
            manifold_prune_frames: 3,
            baumgarte: 0.2,
            penetration_slop: 0.01,
            position_correction: 0.4,
            max_position_correction: 0.2,
            restitution_velocity_threshold: 1.0,
            wake_impulse_threshold: 0.05,
            broadphase_margin: 0.05,
            velocity_padding: 1.0,
            ccd_enabled: true,
            sleeping_enabled: true,
            sleep_linear_threshold: 0.1,
            sleep_angular_threshold: 0.1,
            sleep_force_threshold: 1.0e-3,
            sleep_delay: 0.5,
        }
    }
}

impl PhysicsConfig {
    /// Create a configuration for high-precision simulation
    pub fn high_precision() -> Self {
        Self {
            velocity_iterations: 20,
            position_iterations: 8,
            max_substeps: 12,
            ..Default::default()
        }
    }

    /// Create a configuration for fast simulation (lower quality)
    pub fn fast() -> Self {
        Self {
            velocity_iterations: 4,
            position_iterations: 1,
            max_substeps: 2,
            ccd_enabled: false,
            ..Default::default()
        }
    }

    /// Set gravity
    pub fn with_gravity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.gravity = [x, y, z];
        self
    }

    /// Set timestep
    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Set solver iterations (each at least 1)
    pub fn with_iterations(mut self, velocity: usize, position: usize) -> Self {
        self.velocity_iterations = velocity.max(1);
        self.position_iterations = position.max(1);
        self
    }

    /// Enable or disable continuous collision detection
    pub fn with_ccd(mut self, enabled: bool) -> Self {
        self.ccd_enabled = enabled;
        self
    }

    /// Enable or disable sleeping
    pub fn with_sleeping(mut self, enabled: bool) -> Self {
        self.sleeping_enabled = enabled;
        self
    }

    /// Gravity as a vector
    #[inline]
    pub fn gravity_vec(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    /// Check that every value is usable by the world
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f32) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(PhysicsError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )))
            }
        }
        fn non_negative(name: &str, value: f32) -> Result<()> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(PhysicsError::InvalidConfig(format!(
                    "{name} must be non-negative and finite, got {value}"
                )))
            }
        }

        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }
        positive("timestep", self.timestep)?;
        positive("max_frame_step", self.max_frame_step)?;
        if self.max_fixed_steps_per_frame == 0 {
            return Err(PhysicsError::InvalidConfig(
                "max_fixed_steps_per_frame must be at least 1".into(),
            ));
        }
        if !(1..=MAX_SUBSTEPS_LIMIT).contains(&self.max_substeps) {
            return Err(PhysicsError::InvalidConfig(format!(
                "max_substeps must be in 1..={MAX_SUBSTEPS_LIMIT}, got {}",
                self.max_substeps
            )));
        }
        if self.velocity_iterations == 0 || self.position_iterations == 0 {
            return Err(PhysicsError::InvalidConfig(
                "solver iterations must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("warm_start_factor", self.warm_start_factor),
            ("baumgarte", self.baumgarte),
            ("position_correction", self.position_correction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PhysicsError::InvalidConfig(format!(
                    "{name} must be in 0..=1, got {value}"
                )));
            }
        }
        non_negative("warm_start_distance", self.warm_start_distance)?;
        non_negative("penetration_slop", self.penetration_slop)?;
        non_negative("max_position_correction", self.max_position_correction)?;
        non_negative(
            "restitution_velocity_threshold",
            self.restitution_velocity_threshold,
        )?;
        non_negative("wake_impulse_threshold", self.wake_impulse_threshold)?;
        non_negative("broadphase_margin", self.broadphase_margin)?;
        non_negative("velocity_padding", self.velocity_padding)?;
        non_negative("sleep_linear_threshold", self.sleep_linear_threshold)?;
        non_negative("sleep_angular_threshold", self.sleep_angular_threshold)?;
        non_negative("sleep_force_threshold", self.sleep_force_threshold)?;
        non_negative("sleep_delay", self.sleep_delay)?;
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PhysicsConfig::default().validate().is_ok());
        assert!(PhysicsConfig::high_precision().validate().is_ok());
        assert!(PhysicsConfig::fast().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PhysicsConfig::from_toml_str(
            r#"
            gravity = [0.0, -1.62, 0.0]
            velocity_iterations = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.gravity, [0.0, -1.62, 0.0]);
        assert_eq!(config.velocity_iterations, 16);
        assert_eq!(config.position_iterations, 4);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PhysicsConfig::fast().with_gravity(0.0, 0.0, -3.0);
        let text = config.to_toml_string().unwrap();
        assert_eq!(PhysicsConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = PhysicsConfig {
            max_substeps: 40,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(PhysicsError::InvalidConfig(_))));

        let bad = PhysicsConfig::default().with_timestep(0.0);
        assert!(bad.validate().is_err());

        assert!(matches!(
            PhysicsConfig::from_toml_str("velocity_iterations = \"many\""),
            Err(PhysicsError::ConfigParse(_))
        ));
    }
}
