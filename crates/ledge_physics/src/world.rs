//! Physics world: entity registry, frame update loop and world queries
//!
//! The world owns every live entity in a slotmap and keeps three membership
//! lists in spawn order: the all list (update iteration and `All` traces),
//! the entity list and the world list. Lists are mutated only by spawn,
//! reclassification and the deferred-free pass, never mid-sweep.

use ledge_math::{Aabb, Vec2};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::entity::{Entity, EntityKey, ImpactClass};
use crate::event::Event;
use crate::trace::Trace;

/// Longest stretch of time one frame will simulate. Lag spikes are clamped
/// to this to bound worst-case integration error.
pub const FRAME_SEC_MAX: f32 = 1.0 / 30.0;

/// Velocity at which an entity is judged to be broken
pub const SPEED_LIMIT: f32 = 10_000.0;

/// Positions outside of this limit are assumed to be broken entities
pub const POSITION_LIMIT: f32 = 100_000.0;

/// Distance within which two edges still count as touching
pub(crate) const GROUND_DIST: f32 = 0.003125;

/// Configuration for the physics simulation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Gravity in world units per second squared; positive pulls down
    pub gravity: f32,
    /// Time scale applied to every frame
    pub speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 500.0,
            speed: 1.0,
        }
    }
}

impl PhysicsConfig {
    /// Create a new physics config with the given gravity
    pub fn new(gravity: f32) -> Self {
        Self {
            gravity,
            ..Self::default()
        }
    }
}

/// The physics world containing all entities
pub struct PhysicsWorld {
    /// All entities in the world (using generational keys)
    pub(crate) entities: SlotMap<EntityKey, Entity>,
    /// Every spawned entity, in spawn order
    pub(crate) all: Vec<EntityKey>,
    /// Entities of class `Entity` and above
    pub(crate) entity_list: Vec<EntityKey>,
    /// Entities of class `World` and above
    pub(crate) world_list: Vec<EntityKey>,
    /// Physics configuration
    pub config: PhysicsConfig,
    /// Simulated length of the frame being updated
    frame_sec: f32,
    /// Total simulated time
    time_sec: f32,
    /// Running spawn counter for debug names
    spawned: u64,
}

impl PhysicsWorld {
    /// Create a new physics world with default configuration
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    /// Create a new physics world with custom configuration
    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            entities: SlotMap::with_key(),
            all: Vec::new(),
            entity_list: Vec::new(),
            world_list: Vec::new(),
            config,
            frame_sec: 0.0,
            time_sec: 0.0,
            spawned: 0,
        }
    }

    /// Spawn an entity into the world and return its key
    ///
    /// Panics if the entity was not given an event handler; every entity
    /// must be reachable through the event protocol.
    pub fn spawn(&mut self, mut entity: Entity, class_name: &str) -> EntityKey {
        assert!(
            entity.handler.is_some(),
            "entity spawned without an event handler"
        );
        self.spawned += 1;
        entity.name = format!("#{} ({})", self.spawned, class_name);
        entity.dead = 0;
        let collide = entity.collide;
        let key = self.entities.insert(entity);
        self.all.push(key);
        self.set_impact(key, collide);
        key
    }

    /// Change what an entity collides with, updating list membership
    pub fn set_impact(&mut self, key: EntityKey, class: ImpactClass) {
        let Some(entity) = self.entities.get_mut(key) else {
            return;
        };
        entity.collide = class;
        // Cannot impact anything so it cannot have a ground entity
        if class == ImpactClass::None {
            entity.ground = None;
        }
        Self::set_membership(&mut self.entity_list, key, class >= ImpactClass::Entity);
        Self::set_membership(&mut self.world_list, key, class >= ImpactClass::World);
    }

    fn set_membership(list: &mut Vec<EntityKey>, key: EntityKey, member: bool) {
        let present = list.contains(&key);
        if member && !present {
            list.push(key);
        } else if !member && present {
            list.retain(|&k| k != key);
        }
    }

    /// Get an immutable reference to an entity by key
    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Get a mutable reference to an entity by key
    pub fn entity_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    /// Get the number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate over all entity keys in spawn order
    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.all.iter().copied()
    }

    /// Simulated length of the current frame in seconds
    pub fn frame_sec(&self) -> f32 {
        self.frame_sec
    }

    /// Total simulated time in seconds
    pub fn time_sec(&self) -> f32 {
        self.time_sec
    }

    /// The membership list scanned for a given collision class
    pub(crate) fn scan_list(&self, class: ImpactClass) -> &[EntityKey] {
        match class {
            ImpactClass::None => &[],
            ImpactClass::Entity => &self.entity_list,
            ImpactClass::World => &self.world_list,
            ImpactClass::All => &self.all,
        }
    }

    /// Deliver an event to an entity's handler and return its reply.
    /// Returns false if the entity no longer exists.
    pub fn dispatch(&mut self, key: EntityKey, event: Event) -> bool {
        let Some(entity) = self.entities.get_mut(key) else {
            return false;
        };
        let mut handler = entity
            .handler
            .take()
            .expect("entity has no event handler");
        let reply = handler.on_event(entity, &event);
        entity.handler = Some(handler);
        reply
    }

    /// Kill an entity
    ///
    /// The owner receives a cancelable [`Event::Kill`] first; returning true
    /// means the owner took over cleanup. Otherwise the entity is flagged
    /// for removal and its slot is reclaimed after one more frame so a final
    /// update pass can run. Killing a stale key is a no-op.
    pub fn kill(&mut self, key: EntityKey) {
        if !self.entities.contains_key(key) {
            return;
        }
        if !self.dispatch(key, Event::Kill) {
            self.cleanup_entity(key);
        }
    }

    /// Flag an entity for removal without delivering a kill event
    pub fn cleanup_entity(&mut self, key: EntityKey) {
        match self.entities.get_mut(key) {
            Some(entity) => entity.dead = 2,
            None => return,
        }
        // Nobody may keep resting against a dead entity
        for &other_key in &self.all {
            if other_key == key {
                continue;
            }
            if let Some(other) = self.entities.get_mut(other_key) {
                if other.ground == Some(key) {
                    other.ground = None;
                }
                if other.ceiling == Some(key) {
                    other.ceiling = None;
                }
                if other.left_wall == Some(key) {
                    other.left_wall = None;
                }
                if other.right_wall == Some(key) {
                    other.right_wall = None;
                }
            }
        }
    }

    /// Advance the simulation by one frame of `dt` real seconds
    pub fn update(&mut self, dt: f32) {
        let mut frame = dt * self.config.speed;
        if frame > FRAME_SEC_MAX {
            frame = FRAME_SEC_MAX;
        }
        self.frame_sec = frame;
        self.time_sec += frame;

        // Update every entity in spawn order
        for key in self.all.clone() {
            let manual = match self.entities.get(key) {
                Some(entity) => entity.flags.contains(crate::entity::EntityFlags::MANUAL_UPDATE),
                None => continue,
            };
            if manual {
                continue;
            }
            self.update_entity(key);
        }

        // Remove any entities that died this frame
        self.free_dead(false);
    }

    /// Advance a single entity: physics events, integration, update event
    ///
    /// Public so owners of manual-update entities can order parent-before-
    /// child updates themselves.
    pub fn update_entity(&mut self, key: EntityKey) {
        match self.entities.get(key) {
            Some(entity) if entity.dead == 0 => {}
            _ => return,
        }

        self.dispatch(key, Event::Physics);
        let frame_sec = self.frame_sec;
        self.step_entity(key, frame_sec);
        self.dispatch(key, Event::PhysicsDone);

        // Acceleration vector is reset every frame
        match self.entities.get_mut(key) {
            Some(entity) => {
                entity.accel = Vec2::ZERO;
                // Entity might have died during physics
                if entity.dead > 0 {
                    return;
                }
            }
            None => return,
        }

        // During updates entities draw themselves and can change their
        // parameters, including setting a new accel vector
        self.dispatch(key, Event::Update);
    }

    /// Kill every entity and reclaim all slots immediately
    pub fn cleanup(&mut self) {
        for key in self.all.clone() {
            self.kill(key);
        }
        self.free_dead(true);
        self.frame_sec = 0.0;
        self.time_sec = 0.0;
        self.spawned = 0;
    }

    /// Reclaim slots of entities whose countdown has expired
    fn free_dead(&mut self, force: bool) {
        let mut i = 0;
        while i < self.all.len() {
            let key = self.all[i];
            if !force {
                let entity = &mut self.entities[key];
                if entity.dead == 0 {
                    i += 1;
                    continue;
                }
                entity.dead -= 1;
                if entity.dead > 0 {
                    i += 1;
                    continue;
                }
            }

            // Out of every membership list before the slot goes away
            self.all.remove(i);
            self.entity_list.retain(|&k| k != key);
            self.world_list.retain(|&k| k != key);

            self.dispatch(key, Event::Free);
            self.entities.remove(key);
        }
    }

    /// Sweep an entity's own box toward `to`, ignoring the entity itself
    pub fn trace_entity(&mut self, key: EntityKey, to: Vec2) -> Trace {
        use crate::entity::EntityFlags;

        let Some(entity) = self.entities.get_mut(key) else {
            return Trace::full(to);
        };
        let (from, size, class) = (entity.origin, entity.size, entity.collide);
        entity.flags.insert(EntityFlags::IGNORE);
        let trace = self.trace(from, to, size, class);
        if let Some(entity) = self.entities.get_mut(key) {
            entity.flags.remove(EntityFlags::IGNORE);
        }
        trace
    }

    /// Collect live entities overlapping a box, up to `limit` of them
    ///
    /// A zero limit returns an empty result; overflow truncates quietly.
    pub fn ents_in_box(
        &self,
        origin: Vec2,
        size: Vec2,
        class: ImpactClass,
        limit: usize,
    ) -> Vec<EntityKey> {
        let mut found = Vec::new();
        if limit == 0 {
            return found;
        }
        let query = Aabb::new(origin, size);
        for &key in self.scan_list(class) {
            let Some(other) = self.entities.get(key) else {
                continue;
            };
            if other.dead > 0 {
                continue;
            }
            if !query.intersects(other.bounds()) {
                continue;
            }
            found.push(key);
            if found.len() >= limit {
                break;
            }
        }
        found
    }

    /// Push entities away from a point
    ///
    /// Every live, massive entity closer than `dist_max` gets a velocity
    /// delta directed away from `origin`, scaled by
    /// `speed * (1/dist - 1/dist_max)` so the push fades to zero exactly at
    /// `dist_max`. Entities at the point itself are unaffected. A
    /// non-positive `dist_max` is a no-op.
    pub fn push_radius(&mut self, origin: Vec2, class: ImpactClass, speed: f32, dist_max: f32) {
        if dist_max <= 0.0 {
            return;
        }
        for key in self.scan_list(class).to_vec() {
            let Some(entity) = self.entities.get_mut(key) else {
                continue;
            };
            if entity.dead > 0 || entity.mass <= 0.0 {
                continue;
            }
            let dir = entity.origin - origin;
            let dist = dir.length();
            if dist >= dist_max || dist <= 0.0 {
                continue;
            }
            entity.velocity += dir * (speed * (1.0 / dist - 1.0 / dist_max));
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}
