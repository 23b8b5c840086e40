//! 2D math for the Ledge engine
//!
//! This crate provides the vector and box types the physics core is built on.
//!
//! ## Core Types
//!
//! - [`Vec2`] - 2D vector with x, y components
//! - [`Aabb`] - axis-aligned box described by top-left corner and size

mod aabb;
mod vec2;

pub use aabb::Aabb;
pub use vec2::Vec2;
