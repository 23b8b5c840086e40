//! Swept box traces
//!
//! A trace slides a box from one point to another and reports how far it got
//! before touching something. Diagonal paths are handled exactly rather than
//! by stepping: obstacles outside the diagonal corridor swept by the box are
//! rejected analytically, so a fast mover cannot tunnel through a thin wall.

use ledge_math::{Aabb, Vec2};

use crate::entity::{EntityFlags, EntityKey, ImpactClass};
use crate::world::PhysicsWorld;

/// Result of sweeping a box through the world
#[derive(Clone, Copy, Debug)]
pub struct Trace {
    /// First obstacle hit, if any
    pub other: Option<EntityKey>,
    /// Where the swept box stopped
    pub end: Vec2,
    /// Unit normal of the face that was hit, pointing along the direction
    /// of travel; zero when nothing was hit or the trace started solid
    pub dir: Vec2,
    /// Fraction of the requested path that was traveled, in [0, 1]
    pub prop: f32,
    /// The box already overlapped an obstacle at the start
    pub start_solid: bool,
}

impl Trace {
    /// A trace that traveled its whole path unobstructed
    pub fn full(end: Vec2) -> Self {
        Self {
            other: None,
            end,
            dir: Vec2::ZERO,
            prop: 1.0,
            start_solid: false,
        }
    }
}

/// Slope and intercepts of a diagonal path. The intercepts describe the two
/// lines swept by the box's leading corners; together they bound the
/// corridor every reachable obstacle must cross.
struct DiagonalPath {
    slope: f32,
    /// Moving toward the upper-right or lower-left quadrant
    ne: bool,
    i_a: f32,
    i_b: f32,
    i_c: f32,
}

impl DiagonalPath {
    fn new(from: Vec2, to: Vec2, size: Vec2) -> Self {
        let slope = (to - from).slope();
        let ne = (to.x >= from.x) != (to.y >= from.y);
        let (i_a, i_b, i_c);
        if ne {
            i_a = from.y - from.x * slope;
            i_b = from.y + size.y - (from.x + size.x) * slope;
            i_c = if to.x > from.x {
                from.y - (from.x + size.x) * slope
            } else {
                from.y + size.y - from.x * slope
            };
        } else {
            i_a = from.y - (from.x + size.x) * slope;
            i_b = from.y + size.y - from.x * slope;
            i_c = if to.x > from.x {
                from.y + size.y - (from.x + size.x) * slope
            } else {
                from.y - from.x * slope
            };
        }
        Self {
            slope,
            ne,
            i_a,
            i_b,
            i_c,
        }
    }
}

/// Which face of an obstacle the swept box reaches first
enum Side {
    /// Moving right into the obstacle's left face
    Left,
    /// Moving left into the obstacle's right face
    Right,
    /// Moving up into the obstacle's bottom face
    Bottom,
    /// Moving down into the obstacle's top face
    Top,
}

impl PhysicsWorld {
    /// Sweep a box of `size` from `from` to `to` against the membership list
    /// selected by `class`
    ///
    /// Every obstacle on the list is tested and the path is shortened at
    /// each hit, so the result reports the nearest obstacle. Entities that
    /// are dead or flagged [`EntityFlags::IGNORE`] are skipped. A box that
    /// starts inside an obstacle returns immediately with `start_solid`
    /// set, zero travel and a zero direction.
    pub fn trace(&self, from: Vec2, mut to: Vec2, size: Vec2, class: ImpactClass) -> Trace {
        let mut trace = Trace::full(to);

        // Can't impact anything or didn't go anywhere
        if class == ImpactClass::None || from == to {
            return trace;
        }

        let diagonal = if to.x != from.x && to.y != from.y {
            Some(DiagonalPath::new(from, to, size))
        } else {
            None
        };

        // Collision area bounding box, fixed for the whole scan
        let swept = Aabb::sweep(from, to, size);
        let start = Aabb::new(from, size);

        for &key in self.scan_list(class) {
            let Some(other) = self.entities.get(key) else {
                continue;
            };
            if other.flags.contains(EntityFlags::IGNORE) || other.dead > 0 {
                continue;
            }
            let bounds = other.bounds();
            if !swept.intersects(bounds) {
                continue;
            }

            // Started within this entity
            if start.intersects(bounds) {
                trace.end = from;
                trace.other = Some(key);
                trace.start_solid = true;
                trace.prop = 0.0;
                trace.dir = Vec2::ZERO;
                return trace;
            }

            // Must intersect the diagonal corridor
            if let Some(diag) = &diagonal {
                let (a, b) = if diag.ne {
                    (bounds.max(), bounds.origin)
                } else {
                    (
                        Vec2::new(bounds.origin.x, bounds.origin.y + bounds.size.y),
                        Vec2::new(bounds.origin.x + bounds.size.x, bounds.origin.y),
                    )
                };
                if a.x * diag.slope + diag.i_a > a.y || b.x * diag.slope + diag.i_b <= b.y {
                    continue;
                }
            }

            let side = match &diagonal {
                None => {
                    if to.y == from.y {
                        if to.x < from.x {
                            Side::Right
                        } else {
                            Side::Left
                        }
                    } else if to.y > from.y {
                        Side::Top
                    } else {
                        Side::Bottom
                    }
                }
                Some(diag) => {
                    // Corner of the obstacle closest to the start point;
                    // which side of the leading-corner line it falls on
                    // decides whether the box arrives on the x or the y face
                    let mut c = bounds.origin;
                    if to.x < from.x {
                        c.x += bounds.size.x;
                    }
                    if to.y < from.y {
                        c.y += bounds.size.y;
                    }
                    let fcx = diag.slope * c.x + diag.i_c > c.y;
                    if (to.y < from.y) == fcx {
                        if fcx {
                            Side::Bottom
                        } else {
                            Side::Top
                        }
                    } else if to.x < from.x {
                        Side::Right
                    } else {
                        Side::Left
                    }
                }
            };

            // Distance to the face, with a sanity check per side that skips
            // obstacles already behind the box due to numerical error
            let dist = match side {
                Side::Left => {
                    if bounds.origin.x < from.x + size.x {
                        continue;
                    }
                    trace.dir = Vec2::new(1.0, 0.0);
                    (bounds.origin.x - size.x - from.x) / (to.x - from.x)
                }
                Side::Right => {
                    if bounds.origin.x + bounds.size.x > from.x {
                        continue;
                    }
                    trace.dir = Vec2::new(-1.0, 0.0);
                    (from.x - bounds.origin.x - bounds.size.x) / (from.x - to.x)
                }
                Side::Bottom => {
                    if bounds.origin.y + bounds.size.y > from.y {
                        continue;
                    }
                    trace.dir = Vec2::new(0.0, -1.0);
                    (from.y - bounds.origin.y - bounds.size.y) / (from.y - to.y)
                }
                Side::Top => {
                    if bounds.origin.y < from.y + size.y {
                        continue;
                    }
                    trace.dir = Vec2::new(0.0, 1.0);
                    (bounds.origin.y - size.y - from.y) / (to.y - from.y)
                }
            };
            let dist = dist.clamp(0.0, 1.0);

            trace.prop *= dist;
            to = from.lerp(to, dist);
            trace.other = Some(key);

            if trace.prop <= 0.0 {
                break;
            }
        }

        trace.end = to;
        trace
    }

    /// Sweep a single pixel from `from` to `to`
    ///
    /// The pixel has unit size so a line skimming along an obstacle's edge
    /// still registers the contact, which a zero-size box would miss under
    /// the strict overlap rule.
    pub fn trace_line(&self, from: Vec2, to: Vec2, class: ImpactClass) -> Trace {
        self.trace(from, to, Vec2::ONE, class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::event::IgnoreEvents;

    const SIZE: Vec2 = Vec2::new(10.0, 10.0);

    fn world_with_fixture(origin: Vec2, size: Vec2) -> PhysicsWorld {
        let mut world = PhysicsWorld::new();
        world.spawn(
            Entity::fixture(origin, size).with_handler(IgnoreEvents),
            "wall",
        );
        world
    }

    #[test]
    fn test_trace_none_class_travels_fully() {
        let world = world_with_fixture(Vec2::new(20.0, 0.0), SIZE);
        let trace = world.trace(Vec2::ZERO, Vec2::new(40.0, 0.0), SIZE, ImpactClass::None);
        assert_eq!(trace.prop, 1.0);
        assert_eq!(trace.end, Vec2::new(40.0, 0.0));
        assert!(trace.other.is_none());
    }

    #[test]
    fn test_trace_zero_length_path() {
        let world = world_with_fixture(Vec2::new(20.0, 0.0), SIZE);
        let trace = world.trace(Vec2::ZERO, Vec2::ZERO, SIZE, ImpactClass::World);
        assert_eq!(trace.prop, 1.0);
        assert!(!trace.start_solid);
    }

    #[test]
    fn test_trace_axis_hit() {
        let world = world_with_fixture(Vec2::new(20.0, 0.0), SIZE);
        let trace = world.trace(Vec2::ZERO, Vec2::new(20.0, 0.0), SIZE, ImpactClass::World);
        assert!((trace.prop - 0.5).abs() < 0.0001);
        assert_eq!(trace.end, Vec2::new(10.0, 0.0));
        assert_eq!(trace.dir, Vec2::new(1.0, 0.0));
        assert!(trace.other.is_some());
        assert!(!trace.start_solid);
    }

    #[test]
    fn test_trace_axis_miss() {
        // Obstacle fully below the swept corridor
        let world = world_with_fixture(Vec2::new(20.0, 30.0), SIZE);
        let trace = world.trace(Vec2::ZERO, Vec2::new(40.0, 0.0), SIZE, ImpactClass::World);
        assert_eq!(trace.prop, 1.0);
        assert_eq!(trace.dir, Vec2::ZERO);
        assert!(trace.other.is_none());
    }

    #[test]
    fn test_trace_start_solid() {
        let world = world_with_fixture(Vec2::new(5.0, 5.0), SIZE);
        let trace = world.trace(Vec2::ZERO, Vec2::new(40.0, 0.0), SIZE, ImpactClass::World);
        assert!(trace.start_solid);
        assert_eq!(trace.prop, 0.0);
        assert_eq!(trace.end, Vec2::ZERO);
        assert_eq!(trace.dir, Vec2::ZERO);
        assert!(trace.other.is_some());
    }

    #[test]
    fn test_trace_flush_start_is_not_solid() {
        // Resting exactly on top of a floor shares an edge only
        let world = world_with_fixture(Vec2::new(0.0, 10.0), Vec2::new(100.0, 10.0));
        let trace = world.trace(
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 20.0),
            SIZE,
            ImpactClass::World,
        );
        assert!(!trace.start_solid);
        assert_eq!(trace.prop, 0.0);
        assert_eq!(trace.end, Vec2::ZERO);
        assert_eq!(trace.dir, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_trace_diagonal_hit_top_face() {
        let world = world_with_fixture(Vec2::new(10.0, 18.0), Vec2::new(20.0, 10.0));
        let trace = world.trace(Vec2::ZERO, Vec2::new(20.0, 20.0), SIZE, ImpactClass::World);
        assert!((trace.prop - 0.4).abs() < 0.0001);
        assert!((trace.end.x - 8.0).abs() < 0.0001);
        assert!((trace.end.y - 8.0).abs() < 0.0001);
        assert_eq!(trace.dir, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_trace_diagonal_hit_left_face() {
        // Tall obstacle mostly beside the path, so the box reaches its
        // left face before its top face
        let world = world_with_fixture(Vec2::new(18.0, 10.0), Vec2::new(10.0, 20.0));
        let trace = world.trace(Vec2::ZERO, Vec2::new(20.0, 20.0), SIZE, ImpactClass::World);
        assert!((trace.prop - 0.4).abs() < 0.0001);
        assert!((trace.end.x - 8.0).abs() < 0.0001);
        assert!((trace.end.y - 8.0).abs() < 0.0001);
        assert_eq!(trace.dir, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_trace_diagonal_corridor_miss() {
        // Obstacle overlaps the swept bounding box but sits off the
        // diagonal corridor
        let world = world_with_fixture(Vec2::new(25.0, 0.0), Vec2::new(5.0, 5.0));
        let trace = world.trace(Vec2::ZERO, Vec2::new(30.0, 30.0), SIZE, ImpactClass::World);
        assert_eq!(trace.prop, 1.0);
        assert!(trace.other.is_none());
    }

    #[test]
    fn test_trace_stops_at_nearest_of_several() {
        let mut world = world_with_fixture(Vec2::new(60.0, 0.0), SIZE);
        world.spawn(
            Entity::fixture(Vec2::new(30.0, 0.0), SIZE).with_handler(IgnoreEvents),
            "near wall",
        );
        let trace = world.trace(Vec2::ZERO, Vec2::new(80.0, 0.0), SIZE, ImpactClass::World);
        assert!((trace.prop - 0.25).abs() < 0.0001);
        assert_eq!(trace.end, Vec2::new(20.0, 0.0));
    }

    #[test]
    fn test_trace_skips_ignored_and_dead() {
        let mut world = PhysicsWorld::new();
        let wall = world.spawn(
            Entity::fixture(Vec2::new(20.0, 0.0), SIZE).with_handler(IgnoreEvents),
            "wall",
        );
        world
            .entity_mut(wall)
            .unwrap()
            .flags
            .insert(EntityFlags::IGNORE);
        let trace = world.trace(Vec2::ZERO, Vec2::new(40.0, 0.0), SIZE, ImpactClass::World);
        assert_eq!(trace.prop, 1.0);

        world.entity_mut(wall).unwrap().flags.remove(EntityFlags::IGNORE);
        world.kill(wall);
        let trace = world.trace(Vec2::ZERO, Vec2::new(40.0, 0.0), SIZE, ImpactClass::World);
        assert_eq!(trace.prop, 1.0);
    }

    #[test]
    fn test_trace_entity_ignores_self() {
        let mut world = PhysicsWorld::new();
        let mover = world.spawn(
            Entity::new(Vec2::ZERO, SIZE)
                .with_collide(ImpactClass::All)
                .with_handler(IgnoreEvents),
            "mover",
        );
        let trace = world.trace_entity(mover, Vec2::new(40.0, 0.0));
        assert_eq!(trace.prop, 1.0);
        // The ignore flag is restored afterwards
        assert!(!world
            .entity(mover)
            .unwrap()
            .flags
            .contains(EntityFlags::IGNORE));
    }

    #[test]
    fn test_trace_line() {
        let world = world_with_fixture(Vec2::new(20.0, 0.0), SIZE);
        let trace = world.trace_line(
            Vec2::new(0.0, 5.0),
            Vec2::new(40.0, 5.0),
            ImpactClass::World,
        );
        // The pixel's leading edge stops against the wall's left face
        assert_eq!(trace.end, Vec2::new(19.0, 5.0));
        assert!((trace.prop - 0.475).abs() < 0.0001);
        assert_eq!(trace.dir, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_trace_line_catches_edge_graze() {
        // A line running exactly along the obstacle's top edge must still
        // collide; the pixel's unit height keeps it overlapping the face
        let world = world_with_fixture(Vec2::new(20.0, 0.0), SIZE);
        let trace = world.trace_line(Vec2::ZERO, Vec2::new(40.0, 0.0), ImpactClass::World);
        assert!(trace.prop < 1.0);
        assert_eq!(trace.end, Vec2::new(19.0, 0.0));
        assert!(trace.other.is_some());
    }

    #[test]
    fn test_trace_line_starts_solid_inside_obstacle() {
        let world = world_with_fixture(Vec2::new(20.0, 0.0), SIZE);
        let trace = world.trace_line(
            Vec2::new(25.0, 5.0),
            Vec2::new(40.0, 5.0),
            ImpactClass::World,
        );
        assert!(trace.start_solid);
        assert_eq!(trace.prop, 0.0);
    }

    #[test]
    fn test_trace_is_deterministic() {
        let world = world_with_fixture(Vec2::new(13.0, 7.0), Vec2::new(9.0, 21.0));
        let first = world.trace(
            Vec2::new(-3.0, 1.0),
            Vec2::new(27.0, 19.0),
            SIZE,
            ImpactClass::World,
        );
        for _ in 0..10 {
            let again = world.trace(
                Vec2::new(-3.0, 1.0),
                Vec2::new(27.0, 19.0),
                SIZE,
                ImpactClass::World,
            );
            assert_eq!(again.prop, first.prop);
            assert_eq!(again.end, first.end);
            assert_eq!(again.dir, first.dir);
        }
    }
}
