//! Sequential-impulse constraint solver
//!
//! Contacts and joints both implement [`Constraint`]. A solve is four
//! phases over the same list:
//!
//! ```text
//! prepare ──► warm_start ──► velocity iterations ──► position iterations
//!   (r, K⁻¹, bias)  (cached λ)    (clamped Δλ, Gauss-Seidel)   (pose nudges, NGS)
//! ```
//!
//! The velocity phase reports the largest impulse change per iteration so
//! callers can tell how far from convergence a solve ended.

pub mod contact;
pub mod joint;

pub use contact::ContactConstraint;

use crate::arena::BodySet;
use crate::config::PhysicsConfig;

/// Per-sub-step solver parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverContext {
    /// Sub-step duration
    pub dt: f32,
    /// Velocity bias factor for penetration and joint error
    pub baumgarte: f32,
    /// Allowed penetration
    pub penetration_slop: f32,
    /// Approach speed below which restitution is ignored
    pub restitution_velocity_threshold: f32,
    /// Fraction of penetration removed per position iteration
    pub position_correction: f32,
    /// Cap on a single position correction
    pub max_position_correction: f32,
    /// Impulse magnitude that wakes a sleeping body
    pub wake_impulse_threshold: f32,
    /// Scale on impulses carried over from the previous sub-step
    pub warm_start_factor: f32,
}

impl SolverContext {
    /// Derive from the world configuration
    pub fn from_config(config: &PhysicsConfig, dt: f32) -> Self {
        Self {
            dt,
            baumgarte: config.baumgarte,
            penetration_slop: config.penetration_slop,
            restitution_velocity_threshold: config.restitution_velocity_threshold,
            position_correction: config.position_correction,
            max_position_correction: config.max_position_correction,
            wake_impulse_threshold: config.wake_impulse_threshold,
            warm_start_factor: if config.warm_starting {
                config.warm_start_factor
            } else {
                0.0
            },
        }
    }

    /// `baumgarte / dt`, zero for a degenerate step
    #[inline]
    pub fn bias_rate(&self) -> f32 {
        if self.dt > 0.0 {
            self.baumgarte / self.dt
        } else {
            0.0
        }
    }
}

/// A constraint between bodies, solved by sequential impulses
pub trait Constraint {
    /// Compute lever arms, effective masses and bias for this sub-step
    fn prepare(&mut self, bodies: &BodySet, ctx: &SolverContext);

    /// Apply the impulses carried over from the previous sub-step
    fn warm_start(&mut self, bodies: &mut BodySet, ctx: &SolverContext);

    /// One velocity iteration. Returns the largest absolute impulse change.
    fn solve_velocity(&mut self, bodies: &mut BodySet, ctx: &SolverContext) -> f32;

    /// One position iteration. Returns the largest correction applied.
    fn solve_position(&mut self, bodies: &mut BodySet, ctx: &SolverContext) -> f32;
}

/// What a solve did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveStats {
    /// Velocity iterations actually run
    pub velocity_iterations: usize,
    /// Largest impulse change in the last velocity iteration
    pub velocity_residual: f32,
    /// Position iterations actually run
    pub position_iterations: usize,
}

/// Prepare and warm start every constraint
pub fn begin(constraints: &mut [&mut dyn Constraint], bodies: &mut BodySet, ctx: &SolverContext) {
    for constraint in constraints.iter_mut() {
        constraint.prepare(bodies, ctx);
    }
    for constraint in constraints.iter_mut() {
        constraint.warm_start(bodies, ctx);
    }
}

/// Run velocity iterations until `max_iterations` or until the largest
/// impulse change drops to `tolerance`.
pub fn solve_velocities(
    constraints: &mut [&mut dyn Constraint],
    bodies: &mut BodySet,
    ctx: &SolverContext,
    max_iterations: usize,
    tolerance: f32,
) -> (usize, f32) {
    let mut residual = 0.0;
    for iteration in 0..max_iterations {
        residual = 0.0f32;
        for constraint in constraints.iter_mut() {
            residual = residual.max(constraint.solve_velocity(bodies, ctx));
        }
        if residual <= tolerance {
            return (iteration + 1, residual);
        }
    }
    (max_iterations, residual)
}

/// Run position iterations, stopping early once nothing moves
pub fn solve_positions(
    constraints: &mut [&mut dyn Constraint],
    bodies: &mut BodySet,
    ctx: &SolverContext,
    iterations: usize,
) -> usize {
    for iteration in 0..iterations {
        let mut largest = 0.0f32;
        for constraint in constraints.iter_mut() {
            largest = largest.max(constraint.solve_position(bodies, ctx));
        }
        if largest <= 0.0 {
            return iteration + 1;
        }
    }
    iterations
}

/// Full solve with fixed iteration counts
pub fn solve(
    constraints: &mut [&mut dyn Constraint],
    bodies: &mut BodySet,
    ctx: &SolverContext,
    velocity_iterations: usize,
    position_iterations: usize,
) -> SolveStats {
    if constraints.is_empty() {
        return SolveStats::default();
    }
    begin(constraints, bodies, ctx);
    let (velocity_iterations, velocity_residual) =
        solve_velocities(constraints, bodies, ctx, velocity_iterations.max(1), -1.0);
    let position_iterations =
        solve_positions(constraints, bodies, ctx, position_iterations.max(1));
    SolveStats {
        velocity_iterations,
        velocity_residual,
        position_iterations,
    }
}
