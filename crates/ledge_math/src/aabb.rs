//! Axis-aligned boxes

use serde::{Deserialize, Serialize};

use crate::Vec2;

/// Axis-aligned box described by its top-left corner and size
///
/// Boxes never rotate. The intersection test is strict: two boxes that
/// merely share an edge do not intersect, so an entity resting flush on a
/// floor does not count as overlapping it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Top-left corner in world units
    pub origin: Vec2,
    /// Width and height
    pub size: Vec2,
}

impl Aabb {
    /// Create a new box
    #[inline]
    pub const fn new(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    /// Smallest box covering a box of `size` swept from `from` to `to`
    #[inline]
    pub fn sweep(from: Vec2, to: Vec2, size: Vec2) -> Self {
        Self {
            origin: from.min_components(to),
            size: size + (to - from).abs(),
        }
    }

    /// Bottom-right corner
    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    /// Center point
    #[inline]
    pub fn center(self) -> Vec2 {
        self.origin + self.size * 0.5
    }

    /// Strict overlap test; shared edges do not count
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        self.origin.x < other.origin.x + other.size.x
            && self.origin.y < other.origin.y + other.size.y
            && self.origin.x + self.size.x > other.origin.x
            && self.origin.y + self.size.y > other.origin.y
    }

    /// True when the point falls inside the box. The top and left edges are
    /// inclusive, the bottom and right edges exclusive.
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        p.x >= self.origin.x
            && p.y >= self.origin.y
            && p.x < self.origin.x + self.size.x
            && p.y < self.origin.y + self.size.y
    }
}
