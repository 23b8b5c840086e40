//! Physics event protocol
//!
//! The world reports back to gameplay code through a closed set of events,
//! each carrying its own payload, dispatched to the handler attached to the
//! entity at spawn. Handlers may freely mutate the receiving entity, but
//! membership-list ordering effects only take hold on the next frame.

use ledge_math::Vec2;

use crate::entity::{Entity, EntityKey};

/// Payload for a collision about to be applied
#[derive(Clone, Copy, Debug)]
pub struct ImpactEvent {
    /// The other party to the collision
    pub other: EntityKey,
    /// Impact direction from the receiving entity's frame; the sign flips
    /// between the two recipients
    pub dir: Vec2,
    /// Velocity along the normal times mass. A reporting quantity for
    /// damage/gib decisions, not an internal force unit. Zero for the
    /// start-solid correction.
    pub impulse: f32,
}

/// Events delivered to an entity's handler
///
/// The meaning of the handler's return value depends on the event:
/// - [`Event::Kill`]: `true` means the handler did its own cleanup and the
///   registry must not auto-remove the entity
/// - [`Event::Impact`]: `true` vetoes the collision; no velocity change is
///   applied to either party
/// - all other events ignore the return value
#[derive(Clone, Copy, Debug)]
pub enum Event {
    /// Physics for this entity is about to run
    Physics,
    /// Physics for this entity has finished
    PhysicsDone,
    /// The entity is about to participate in a collision
    Impact(ImpactEvent),
    /// The entity has been killed and will be removed from the world
    Kill,
    /// The entity's slot is being reclaimed
    Free,
    /// The entity should render itself and update game mechanics
    Update,
}

/// Owner-side reaction to physics events
///
/// Every entity supplies a handler before it is spawned; spawning without
/// one is a programming error. The handler owns the gameplay state for its
/// entity (sprite, health, timers) and receives the entity by mutable
/// reference at each event checkpoint.
pub trait EventHandler {
    fn on_event(&mut self, entity: &mut Entity, event: &Event) -> bool;
}

/// Handler that ignores every event; suitable for plain fixtures
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreEvents;

impl EventHandler for IgnoreEvents {
    fn on_event(&mut self, _entity: &mut Entity, _event: &Event) -> bool {
        false
    }
}
