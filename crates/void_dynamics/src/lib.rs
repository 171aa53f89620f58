//! Void Dynamics - Native Rigid-Body Simulation
//!
//! A self-contained 3D rigid-body engine for the Void Engine. Every body is an
//! oriented box; the world advances them over a fixed timestep while
//! resolving contacts, friction, restitution and distance joints.
//!
//! # Features
//!
//! - Rigid body dynamics (static, dynamic, kinematic)
//! - Dynamic AABB tree broadphase with fat boxes
//! - Separating-axis box contacts with up to four points per pair
//! - Sequential-impulse solver with warm starting and position correction
//! - Distance joints sharing the contact solver
//! - Swept-sphere continuous collision detection
//! - Sleeping for bodies at rest
//! - Raycasting and collision events
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     PhysicsWorld                      │
//! │  ┌─────────┐  ┌─────────────┐  ┌───────────────────┐ │
//! │  │ BodySet │  │ DynamicTree │  │ ManifoldCache     │ │
//! │  └─────────┘  └─────────────┘  └───────────────────┘ │
//! │  ┌──────────────────────────────────────────────────┐│
//! │  │ sub-step: integrate → refit → pairs → CCD        ││
//! │  │           → narrowphase → solve → cache → sleep  ││
//! │  └──────────────────────────────────────────────────┘│
//! └──────────────────────────────────────────────────────┘
//!                          │
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!   ┌────────────┐  ┌──────────────┐  ┌─────────────┐
//!   │ RigidBody  │  │ContactManifold│ │DistanceJoint│
//!   └────────────┘  └──────────────┘  └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use void_dynamics::prelude::*;
//!
//! // Create physics world
//! let mut physics = PhysicsWorld::new(PhysicsConfig::default());
//!
//! // Static ground and a falling box
//! physics.create_body(
//!     &RigidBodyDesc::fixed()
//!         .with_position(0.0, -0.5, 0.0)
//!         .with_half_extents(10.0, 0.5, 10.0),
//! );
//! let crate_box = physics.create_body(&RigidBodyDesc::dynamic().with_position(0.0, 5.0, 0.0));
//!
//! // Step simulation
//! for _ in 0..60 {
//!     physics.step(1.0 / 60.0);
//! }
//! assert!(physics.body(crate_box).unwrap().position.y < 5.0);
//! ```

pub mod arena;
pub mod body;
pub mod broadphase;
pub mod ccd;
pub mod config;
pub mod contact;
pub mod error;
pub mod events;
pub mod joint;
pub mod material;
pub mod math;
pub mod narrowphase;
pub mod query;
pub mod sleep;
pub mod solver;
pub mod world;

pub mod prelude {
    //! Common imports for physics functionality
    pub use crate::arena::{BodyHandle, BodySet};
    pub use crate::body::{RigidBody, RigidBodyDesc, RigidBodyType};
    pub use crate::config::PhysicsConfig;
    pub use crate::error::{PhysicsError, Result};
    pub use crate::events::{CollisionEvent, CollisionEventType, ContactData};
    pub use crate::joint::{DistanceJoint, DistanceJointDesc, JointId};
    pub use crate::material::{CombineRule, PhysicsMaterial, Surface};
    pub use crate::query::RaycastHit;
    pub use crate::world::PhysicsWorld;

    // Re-export math types
    pub use glam::{Quat, Vec3};
}

pub use prelude::*;
