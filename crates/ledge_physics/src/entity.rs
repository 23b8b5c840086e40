//! Physics entity record and collision classes

use bitflags::bitflags;
use ledge_math::{Aabb, Vec2};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::event::EventHandler;

new_key_type! {
    /// Key to an entity in the physics world
    ///
    /// Uses generational indexing so a stale key resolves to `None` instead
    /// of aliasing whatever entity reused the slot.
    pub struct EntityKey;
}

/// Collision class of an entity
///
/// The class plays a dual role, as in the membership-list model it maps to:
/// it decides which membership lists the entity joins (class >= `Entity`
/// joins the entity list, class >= `World` joins the world list, everything
/// joins the all list) and it selects which list the entity's own movement
/// is traced against.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ImpactClass {
    /// Collides with nothing; traces return full travel
    #[default]
    None,
    /// Collides with other entities only
    Entity,
    /// Collides with world fixtures
    World,
    /// Collides with everything, including class-`None` entities
    All,
}

bitflags! {
    /// Transient entity behavior flags
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntityFlags: u8 {
        /// Immune to gravity
        const FLY = 1 << 0;
        /// Temporarily excluded as a trace obstacle (self-traces,
        /// projectile parent exclusion)
        const IGNORE = 1 << 1;
        /// The owner advances this entity instead of the per-frame update
        const MANUAL_UPDATE = 1 << 2;
    }
}

/// The unit of simulation: an axis-aligned box with kinematic state
///
/// The registry owns the entity from spawn until its slot is reclaimed;
/// gameplay state lives in the entity's [`EventHandler`].
pub struct Entity {
    /// Diagnostic label, assigned at spawn
    pub name: String,
    /// Top-left corner in world units
    pub origin: Vec2,
    /// Width and height
    pub size: Vec2,
    pub velocity: Vec2,
    /// Acceleration applied this frame; consumed and reset every update
    pub accel: Vec2,
    /// Zero or negative marks an immovable fixture
    pub mass: f32,
    /// Horizontal velocity decay per second while grounded
    pub friction: f32,
    /// Velocity decay per second, grounded or not
    pub drag: f32,
    /// Restitution fraction in [0, 1]
    pub elasticity: f32,
    /// Tallest obstacle stepped over while moving horizontally
    pub step_size: f32,
    /// Update at most once per this many maximum-length frames
    pub frame_skip: u32,
    /// Simulated time owed to this entity
    pub lag_sec: f32,
    pub collide: ImpactClass,
    pub flags: EntityFlags,
    /// Frames left until the slot is reclaimed; zero means alive
    pub(crate) dead: u32,
    /// Entity resting flush against this one's bottom edge
    pub ground: Option<EntityKey>,
    pub ceiling: Option<EntityKey>,
    pub left_wall: Option<EntityKey>,
    pub right_wall: Option<EntityKey>,
    pub(crate) handler: Option<Box<dyn EventHandler>>,
}

impl Entity {
    /// Create an entity with unit mass and no handler. A handler must be
    /// attached before the entity is spawned.
    pub fn new(origin: Vec2, size: Vec2) -> Self {
        Self {
            name: String::new(),
            origin,
            size,
            velocity: Vec2::ZERO,
            accel: Vec2::ZERO,
            mass: 1.0,
            friction: 0.0,
            drag: 0.0,
            elasticity: 0.0,
            step_size: 0.0,
            frame_skip: 0,
            lag_sec: 0.0,
            collide: ImpactClass::None,
            flags: EntityFlags::empty(),
            dead: 0,
            ground: None,
            ceiling: None,
            left_wall: None,
            right_wall: None,
            handler: None,
        }
    }

    /// Create an immovable world fixture
    pub fn fixture(origin: Vec2, size: Vec2) -> Self {
        let mut entity = Self::new(origin, size);
        entity.mass = 0.0;
        entity.collide = ImpactClass::World;
        entity
    }

    /// Set the velocity of this entity
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the mass of this entity; zero makes it a fixture
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Set the ground friction coefficient
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Set the drag coefficient
    pub fn with_drag(mut self, drag: f32) -> Self {
        self.drag = drag;
        self
    }

    /// Set the restitution fraction, clamped to [0, 1]
    pub fn with_elasticity(mut self, elasticity: f32) -> Self {
        self.elasticity = elasticity.clamp(0.0, 1.0);
        self
    }

    /// Set the tallest obstacle this entity steps over
    pub fn with_step_size(mut self, step_size: f32) -> Self {
        self.step_size = step_size;
        self
    }

    /// Update this entity once per `frame_skip` maximum-length frames
    pub fn with_frame_skip(mut self, frame_skip: u32) -> Self {
        self.frame_skip = frame_skip;
        self
    }

    /// Set the collision class
    pub fn with_collide(mut self, collide: ImpactClass) -> Self {
        self.collide = collide;
        self
    }

    /// Set behavior flags
    pub fn with_flags(mut self, flags: EntityFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attach the event handler that owns this entity's gameplay state
    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// The entity's box
    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.origin, self.size)
    }

    /// Center of the entity's box
    #[inline]
    pub fn center(&self) -> Vec2 {
        self.origin + self.size * 0.5
    }

    /// True once the entity is scheduled for removal
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead > 0
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("size", &self.size)
            .field("velocity", &self.velocity)
            .field("mass", &self.mass)
            .field("collide", &self.collide)
            .field("flags", &self.flags)
            .field("dead", &self.dead)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::IgnoreEvents;

    #[test]
    fn test_new_entity_defaults() {
        let entity = Entity::new(Vec2::new(1.0, 2.0), Vec2::new(10.0, 20.0));
        assert_eq!(entity.origin, Vec2::new(1.0, 2.0));
        assert_eq!(entity.velocity, Vec2::ZERO);
        assert_eq!(entity.mass, 1.0);
        assert_eq!(entity.collide, ImpactClass::None);
        assert!(!entity.is_dead());
        assert!(entity.ground.is_none());
    }

    #[test]
    fn test_fixture() {
        let fixture = Entity::fixture(Vec2::ZERO, Vec2::new(100.0, 10.0));
        assert_eq!(fixture.mass, 0.0);
        assert_eq!(fixture.collide, ImpactClass::World);
    }

    #[test]
    fn test_builder_methods() {
        let entity = Entity::new(Vec2::ZERO, Vec2::ONE)
            .with_velocity(Vec2::new(5.0, 0.0))
            .with_mass(3.0)
            .with_friction(2.0)
            .with_drag(0.5)
            .with_elasticity(0.8)
            .with_step_size(4.0)
            .with_frame_skip(2)
            .with_collide(ImpactClass::All)
            .with_flags(EntityFlags::FLY)
            .with_handler(IgnoreEvents);
        assert_eq!(entity.velocity, Vec2::new(5.0, 0.0));
        assert_eq!(entity.mass, 3.0);
        assert_eq!(entity.elasticity, 0.8);
        assert_eq!(entity.frame_skip, 2);
        assert_eq!(entity.collide, ImpactClass::All);
        assert!(entity.flags.contains(EntityFlags::FLY));
        assert!(entity.handler.is_some());
    }

    #[test]
    fn test_elasticity_clamping() {
        let entity = Entity::new(Vec2::ZERO, Vec2::ONE).with_elasticity(1.5);
        assert_eq!(entity.elasticity, 1.0);
        let entity = Entity::new(Vec2::ZERO, Vec2::ONE).with_elasticity(-0.5);
        assert_eq!(entity.elasticity, 0.0);
    }

    #[test]
    fn test_impact_class_ordering() {
        // Membership rules rely on this ordering
        assert!(ImpactClass::None < ImpactClass::Entity);
        assert!(ImpactClass::Entity < ImpactClass::World);
        assert!(ImpactClass::World < ImpactClass::All);
    }

    #[test]
    fn test_bounds_and_center() {
        let entity = Entity::new(Vec2::new(10.0, 20.0), Vec2::new(4.0, 8.0));
        assert_eq!(entity.bounds().max(), Vec2::new(14.0, 28.0));
        assert_eq!(entity.center(), Vec2::new(12.0, 24.0));
    }
}
