//! Per-entity integration and collision response
//!
//! One entity moves at most once per frame. When a trace cuts the path
//! short, the time of impact is solved from the kinematic equations and the
//! unsimulated remainder is banked as lag, paid back on the next frame.

use ledge_math::Vec2;
use log::warn;

use crate::entity::{EntityFlags, EntityKey};
use crate::event::{Event, ImpactEvent};
use crate::world::{PhysicsWorld, FRAME_SEC_MAX, GROUND_DIST, POSITION_LIMIT, SPEED_LIMIT};

impl PhysicsWorld {
    /// Integrate one entity over `del_t` simulated seconds
    pub(crate) fn step_entity(&mut self, key: EntityKey, mut del_t: f32) {
        let Some(entity) = self.entities.get(key) else {
            return;
        };

        // Fixed entity, doesn't move
        if entity.mass <= 0.0 || entity.dead > 0 {
            return;
        }

        // Time traveled since last frame
        del_t += entity.lag_sec;
        if del_t <= 0.0 {
            return;
        }

        // Low priority entities must rack up a large deficit before moving
        if entity.frame_skip as f32 * FRAME_SEC_MAX > del_t {
            self.entities[key].lag_sec = del_t;
            return;
        }

        let gravity = self.config.gravity;
        {
            let entity = &mut self.entities[key];
            entity.lag_sec = 0.0;
            if !entity.flags.contains(EntityFlags::FLY) {
                entity.accel.y += gravity;
            }
        }

        // Clip acceleration so resting contacts don't build up velocity
        self.clip_accel(key);

        // Accelerate, then decay
        let last_v;
        {
            let entity = &mut self.entities[key];
            last_v = entity.velocity;
            entity.velocity += entity.accel * del_t;

            // On ground, apply friction
            if entity.ground.is_some() {
                let prop = (1.0 - entity.friction * del_t).max(0.0);
                entity.velocity.x *= prop;
            }

            // Apply air drag
            let prop = (1.0 - entity.drag * del_t).max(0.0);
            entity.velocity *= prop;
        }

        // Bad entity broke the speed limit
        let velocity = self.entities[key].velocity;
        if velocity.x.abs() > SPEED_LIMIT || velocity.y.abs() > SPEED_LIMIT {
            warn!("{} broke the speed limit", self.entities[key].name);
            self.kill(key);
            return;
        }

        // Not moving
        let avg_v = (velocity + last_v) * 0.5;
        if avg_v.x == 0.0 && avg_v.y == 0.0 {
            return;
        }

        // Trace to the new position
        let from = self.entities[key].origin;
        let to = from + avg_v * del_t;
        let trace = self.trace_entity(key, to);
        self.entities[key].origin = trace.end;

        // Entity started out stuck in something
        if trace.start_solid {
            if let Some(other_key) = trace.other {
                // Correction direction points from the obstacle's center
                // toward the stuck entity's center
                let other_center = self.entities[other_key].center();
                let dir = (self.entities[key].center() - other_center).normalized();
                self.dispatch(
                    key,
                    Event::Impact(ImpactEvent {
                        other: other_key,
                        dir,
                        impulse: 0.0,
                    }),
                );
                self.dispatch(
                    other_key,
                    Event::Impact(ImpactEvent {
                        other: key,
                        dir: -dir,
                        impulse: 0.0,
                    }),
                );
                self.unstick(key, other_key);
            }
            let entity = &mut self.entities[key];
            entity.lag_sec = del_t;
            entity.velocity = last_v;
            return;
        }

        // Entity has bad coordinates
        let origin = self.entities[key].origin;
        if !origin.is_finite() {
            warn!("{} has bad coordinates", self.entities[key].name);
            self.kill(key);
            return;
        }

        // Bad entity flew out of bounds
        if origin.x.abs() > POSITION_LIMIT || origin.y.abs() > POSITION_LIMIT {
            warn!("{} out of bounds", self.entities[key].name);
            self.kill(key);
            return;
        }

        // No impact
        if trace.prop >= 1.0 {
            return;
        }

        // Solve for the velocity and time at the moment of impact. The
        // effective acceleration includes friction and drag, recovered from
        // the velocity change over the full frame. Solving along the axis
        // with the larger velocity keeps the division well conditioned.
        {
            let entity = &mut self.entities[key];
            entity.accel = (entity.velocity - last_v) / del_t;
            let del_s = entity.origin - from;
            let mut prop;
            if entity.velocity.x.abs() <= entity.velocity.y.abs() {
                entity.velocity.y =
                    (last_v.y * last_v.y + 2.0 * entity.accel.y * del_s.y).sqrt();
                prop = 2.0 * del_s.y / (entity.velocity.y + last_v.y);
            } else {
                entity.velocity.x =
                    (last_v.x * last_v.x + 2.0 * entity.accel.x * del_s.x).sqrt();
                prop = 2.0 * del_s.x / (entity.velocity.x + last_v.x);
            }

            // Numeric error
            if prop < 0.0 {
                prop = 0.0;
            }
            if prop > del_t || !prop.is_finite() {
                prop = del_t;
            }

            // The entity freezes in time for the rest of the frame so the
            // motion is traced only once; the deficit is made up next frame
            entity.lag_sec = del_t - prop;
            del_t = prop;

            // Corrected velocity at the impact time
            entity.velocity = last_v + entity.accel * del_t;
        }

        let Some(other_key) = trace.other else {
            return;
        };

        // Try to avoid the impact by stepping over the obstacle
        if self.step_over(key, other_key) {
            return;
        }

        // Handle impact physics
        let other_mass = match self.entities.get(other_key) {
            Some(other) => other.mass,
            None => return,
        };
        if other_mass > 0.0 {
            self.bounce_mobile(key, other_key, trace.dir);
        } else {
            self.bounce_fixture(key, other_key, trace.dir);
        }
    }

    /// Refresh resting contacts and clip the acceleration vector so the
    /// entity does not accelerate into ground or walls
    fn clip_accel(&mut self, key: EntityKey) {
        let (origin, size, class) = {
            let entity = &self.entities[key];
            (entity.origin, entity.size, entity.collide)
        };

        let mut ground = None;
        let mut ceiling = None;
        let mut left_wall = None;
        let mut right_wall = None;
        for &other_key in self.scan_list(class) {
            if other_key == key {
                continue;
            }
            let Some(other) = self.entities.get(other_key) else {
                continue;
            };
            if other.dead > 0 {
                continue;
            }

            // Horizontal contacts need strict vertical overlap so a box
            // diagonally adjacent at a corner does not count
            if other.origin.y < origin.y + size.y && other.origin.y + other.size.y > origin.y {
                if (origin.x - other.origin.x - other.size.x).abs() <= GROUND_DIST {
                    left_wall = Some(other_key);
                }
                if (origin.x + size.x - other.origin.x).abs() <= GROUND_DIST {
                    right_wall = Some(other_key);
                }
            }

            // Vertical contacts need strict horizontal overlap
            if other.origin.x < origin.x + size.x && other.origin.x + other.size.x > origin.x {
                if (origin.y - other.origin.y - other.size.y).abs() <= GROUND_DIST {
                    ceiling = Some(other_key);
                }
                if (origin.y + size.y - other.origin.y).abs() <= GROUND_DIST {
                    ground = Some(other_key);
                }
            }
        }

        let entity = &mut self.entities[key];
        entity.ground = ground;
        entity.ceiling = ceiling;
        entity.left_wall = left_wall;
        entity.right_wall = right_wall;
        if (entity.accel.x < 0.0 && left_wall.is_some())
            || (entity.accel.x > 0.0 && right_wall.is_some())
        {
            entity.accel.x = 0.0;
        }
        if (entity.accel.y < 0.0 && ceiling.is_some())
            || (entity.accel.y > 0.0 && ground.is_some())
        {
            entity.accel.y = 0.0;
        }
    }

    /// Try to step over an obstacle, returns true if it succeeded
    fn step_over(&mut self, key: EntityKey, other_key: EntityKey) -> bool {
        let (origin, size, vel_x, step_size) = {
            let entity = &self.entities[key];
            (
                entity.origin,
                entity.size,
                entity.velocity.x,
                entity.step_size,
            )
        };
        if vel_x == 0.0 {
            return false;
        }

        // Check the step height
        let Some(other) = self.entities.get(other_key) else {
            return false;
        };
        let step_height = origin.y + size.y - other.origin.y;
        if step_height <= 0.0 || step_height > step_size {
            return false;
        }

        // Trace to the raised position
        let mut to = Vec2::new(origin.x, origin.y - step_height);
        if self.trace_entity(key, to).prop < 1.0 {
            return false;
        }
        self.entities[key].origin = to;

        // Trace forward a little bit
        to.x += if vel_x > 0.0 { GROUND_DIST } else { -GROUND_DIST };
        if self.trace_entity(key, to).prop < 1.0 {
            self.entities[key].origin = origin;
            return false;
        }

        // Step committed, cut vertical velocity
        let entity = &mut self.entities[key];
        entity.velocity.y = 0.0;
        entity.origin = to;
        true
    }

    /// Shove an entity out of another along the axis with the smaller
    /// center offset
    fn unstick(&mut self, key: EntityKey, other_key: EntityKey) {
        let (other_origin, other_size) = match self.entities.get(other_key) {
            Some(other) => (other.origin, other.size),
            None => return,
        };
        let entity = &mut self.entities[key];
        let center = entity.origin + entity.size * 0.5;
        let other_center = other_origin + other_size * 0.5;
        let diff = other_center - center;
        if diff.x.abs() < diff.y.abs() {
            entity.origin.x = if center.x > other_center.x {
                other_origin.x + other_size.x
            } else {
                other_origin.x - entity.size.x
            };
        } else {
            entity.origin.y = if center.y > other_center.y {
                other_origin.y + other_size.y
            } else {
                other_origin.y - entity.size.y
            };
        }
    }

    /// Elastic collision with a mobile entity
    ///
    /// One-dimensional elastic collision along the impact normal; motion
    /// perpendicular to the normal is untouched. Either party may veto the
    /// collision through its impact event.
    fn bounce_mobile(&mut self, key: EntityKey, other_key: EntityKey, dir: Vec2) {
        let (vel_a, mass_a, elasticity_a) = {
            let entity = &self.entities[key];
            (entity.velocity.dot(dir), entity.mass, entity.elasticity)
        };
        let (vel_b, mass_b, elasticity_b) = match self.entities.get(other_key) {
            Some(other) => (other.velocity.dot(dir), other.mass, other.elasticity),
            None => return,
        };
        debug_assert!(mass_a > 0.0 && mass_b > 0.0);

        // Check if either entity does not want the impact
        let impulse = vel_a * mass_a + vel_b * mass_b;
        let vetoed = self.dispatch(
            key,
            Event::Impact(ImpactEvent {
                other: other_key,
                dir,
                impulse,
            }),
        );
        if vetoed {
            return;
        }
        let vetoed = self.dispatch(
            other_key,
            Event::Impact(ImpactEvent {
                other: key,
                dir: -dir,
                impulse,
            }),
        );
        if vetoed {
            return;
        }

        // New velocities along the normal, scaled by each party's own
        // elasticity
        let vel_a_new =
            (vel_a * (mass_a - mass_b) + 2.0 * mass_b * vel_b) / (mass_a + mass_b);
        let vel_b_new = vel_a_new + vel_a - vel_b;
        let vel_a_new = vel_a_new * elasticity_a;
        let vel_b_new = vel_b_new * elasticity_b;

        // Apply bounce impulses
        self.entities[key].velocity += dir * (vel_a_new - vel_a);
        if let Some(other) = self.entities.get_mut(other_key) {
            other.velocity += dir * (vel_b_new - vel_b);
        }
    }

    /// Elastic collision with an immovable fixture
    fn bounce_fixture(&mut self, key: EntityKey, other_key: EntityKey, dir: Vec2) {
        let (vel, mass, elasticity) = {
            let entity = &self.entities[key];
            (entity.velocity.dot(dir), entity.mass, entity.elasticity)
        };

        // Check if either entity does not want the impact
        let impulse = mass * vel;
        let vetoed = self.dispatch(
            key,
            Event::Impact(ImpactEvent {
                other: other_key,
                dir,
                impulse,
            }),
        );
        if vetoed {
            return;
        }
        let vetoed = self.dispatch(
            other_key,
            Event::Impact(ImpactEvent {
                other: key,
                dir: -dir,
                impulse,
            }),
        );
        if vetoed {
            return;
        }

        // Reflect the normal component
        let vel_new = -vel * elasticity;
        self.entities[key].velocity += dir * (vel_new - vel);
    }
}
