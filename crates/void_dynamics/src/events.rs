//! Physics events (contact begin/end)

use crate::arena::BodyHandle;
use crate::contact::{ContactManifold, PairKey};
use glam::Vec3;

/// Contact data from a collision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactData {
    /// Contact point in world space
    pub point: Vec3,
    /// Contact normal (pointing from body1 to body2)
    pub normal: Vec3,
    /// Penetration depth
    pub depth: f32,
    /// Normal impulse applied at this contact
    pub impulse: f32,
}

/// Type of collision event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionEventType {
    /// Collision started
    Started,
    /// Collision ended
    Stopped,
}

/// A collision event between two bodies
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    /// Lower handle of the pair
    pub body1: BodyHandle,
    /// Higher handle of the pair
    pub body2: BodyHandle,
    /// Event type
    pub event_type: CollisionEventType,
    /// Contact points (empty for stopped events)
    pub contacts: Vec<ContactData>,
}

impl CollisionEvent {
    /// Start event carrying the solved contact points
    pub fn started(manifold: &ContactManifold) -> Self {
        let key = manifold.key();
        // Report the normal from body1 to body2
        let sign = if key.first() == manifold.body_a { 1.0 } else { -1.0 };
        let contacts = manifold
            .points
            .iter()
            .map(|p| ContactData {
                point: p.point,
                normal: manifold.normal * sign,
                depth: p.penetration,
                impulse: p.normal_impulse,
            })
            .collect();
        Self {
            body1: key.first(),
            body2: key.second(),
            event_type: CollisionEventType::Started,
            contacts,
        }
    }

    /// Stop event for a pair
    pub fn stopped(key: PairKey) -> Self {
        Self {
            body1: key.first(),
            body2: key.second(),
            event_type: CollisionEventType::Stopped,
            contacts: Vec::new(),
        }
    }

    /// Check if this is a start event
    pub fn is_started(&self) -> bool {
        self.event_type == CollisionEventType::Started
    }

    /// Check if this is a stop event
    pub fn is_stopped(&self) -> bool {
        self.event_type == CollisionEventType::Stopped
    }

    /// Whether `body` is part of the pair
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.body1 == body || self.body2 == body
    }

    /// Get the average contact point
    pub fn average_contact_point(&self) -> Option<Vec3> {
        if self.contacts.is_empty() {
            return None;
        }
        let sum: Vec3 = self.contacts.iter().map(|c| c.point).sum();
        Some(sum / self.contacts.len() as f32)
    }

    /// Get the average contact normal
    pub fn average_normal(&self) -> Option<Vec3> {
        let sum: Vec3 = self.contacts.iter().map(|c| c.normal).sum();
        sum.try_normalize()
    }

    /// Get total impulse from all contacts
    pub fn total_impulse(&self) -> f32 {
        self.contacts.iter().map(|c| c.impulse).sum()
    }
}

/// Collects the collision events of one `step`
#[derive(Debug, Default)]
pub struct EventCollector {
    /// Collision events in the order they happened
    pub collision_events: Vec<CollisionEvent>,
}

impl EventCollector {
    /// Create a new event collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all collected events
    pub fn clear(&mut self) {
        self.collision_events.clear();
    }

    /// Record an event
    pub fn push(&mut self, event: CollisionEvent) {
        self.collision_events.push(event);
    }

    /// Get collision start events
    pub fn started_collisions(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.collision_events.iter().filter(|e| e.is_started())
    }

    /// Get collision end events
    pub fn stopped_collisions(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.collision_events.iter().filter(|e| e.is_stopped())
    }
}
