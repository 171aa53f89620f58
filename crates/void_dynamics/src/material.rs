//! Surface and damping properties of a rigid body

use serde::{Deserialize, Serialize};

/// Physics material defining friction, restitution and damping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsMaterial {
    /// Restitution/bounciness (0 = no bounce, 1 = perfect bounce)
    pub restitution: f32,
    /// Friction coefficient while contacts stick
    pub static_friction: f32,
    /// Friction coefficient once contacts slide
    pub dynamic_friction: f32,
    /// Linear velocity damping per second
    pub linear_damping: f32,
    /// Angular velocity damping per second
    pub angular_damping: f32,
    /// How friction is combined between two bodies
    pub friction_combine: CombineRule,
    /// How restitution is combined between two bodies
    pub restitution_combine: CombineRule,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            restitution: 0.2,
            static_friction: 0.6,
            dynamic_friction: 0.4,
            linear_damping: 0.01,
            angular_damping: 0.05,
            friction_combine: CombineRule::Average,
            restitution_combine: CombineRule::Average,
        }
    }
}

impl PhysicsMaterial {
    /// Create a material with a single friction value for both regimes
    pub fn new(friction: f32, restitution: f32) -> Self {
        Self {
            static_friction: friction.max(0.0),
            dynamic_friction: friction.max(0.0),
            restitution: restitution.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    /// Material for one of the stock surfaces
    pub fn preset(surface: Surface) -> Self {
        let (restitution, static_friction, dynamic_friction) = surface.coefficients();
        Self {
            restitution,
            static_friction,
            dynamic_friction,
            ..Default::default()
        }
    }

    /// Set both friction coefficients
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.static_friction = friction.max(0.0);
        self.dynamic_friction = friction.max(0.0);
        self
    }

    /// Set static and dynamic friction separately. Dynamic friction never
    /// exceeds static friction.
    pub fn with_friction_pair(mut self, static_friction: f32, dynamic_friction: f32) -> Self {
        self.static_friction = static_friction.max(0.0);
        self.dynamic_friction = dynamic_friction.max(0.0).min(self.static_friction);
        self
    }

    /// Set restitution, clamped to `0..=1`
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Set linear and angular damping
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear.max(0.0);
        self.angular_damping = angular.max(0.0);
        self
    }

    /// Coefficients for a contact between `self` and `other`.
    ///
    /// Each side names a rule; the stricter rule wins.
    pub fn combine(&self, other: &PhysicsMaterial) -> CombinedMaterial {
        let friction = self.friction_combine.dominant(other.friction_combine);
        let bounce = self.restitution_combine.dominant(other.restitution_combine);

        let static_friction = friction.apply(self.static_friction, other.static_friction);
        CombinedMaterial {
            static_friction,
            dynamic_friction: friction
                .apply(self.dynamic_friction, other.dynamic_friction)
                .min(static_friction),
            restitution: bounce.apply(self.restitution, other.restitution).clamp(0.0, 1.0),
        }
    }
}

/// Stock surfaces with tuned friction and bounce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    Ice,
    Rubber,
    Metal,
    Wood,
    Stone,
}

impl Surface {
    /// `(restitution, static_friction, dynamic_friction)`
    fn coefficients(self) -> (f32, f32, f32) {
        match self {
            Surface::Ice => (0.05, 0.05, 0.02),
            Surface::Rubber => (0.8, 0.9, 0.8),
            Surface::Metal => (0.2, 0.4, 0.3),
            Surface::Wood => (0.3, 0.6, 0.45),
            Surface::Stone => (0.1, 0.8, 0.65),
        }
    }
}

/// Per-pair coefficients after combining both bodies' materials
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CombinedMaterial {
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub restitution: f32,
}

/// How two bodies' coefficients merge into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombineRule {
    /// Arithmetic mean
    #[default]
    Average,
    /// Larger of the two
    Max,
    /// Product
    Multiply,
    /// Smaller of the two
    Min,
}

impl CombineRule {
    /// Precedence when the two sides disagree: Min > Multiply > Max > Average
    #[inline]
    fn rank(self) -> u8 {
        match self {
            CombineRule::Average => 0,
            CombineRule::Max => 1,
            CombineRule::Multiply => 2,
            CombineRule::Min => 3,
        }
    }

    /// The rule that applies when one body asks for `self` and the other for
    /// `other`
    pub fn dominant(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    /// Merge two coefficients
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            CombineRule::Average => 0.5 * (a + b),
            CombineRule::Max => a.max(b),
            CombineRule::Multiply => a * b,
            CombineRule::Min => a.min(b),
        }
    }
}
