//! 2D platformer physics for the Ledge engine
//!
//! This crate provides the simulation core for axis-aligned box entities:
//! - Swept (continuous) collision detection with diagonal-path support
//! - Entity registry with spawn/kill/deferred-free lifecycle
//! - Per-frame integration: gravity, friction, drag, resting contacts
//! - Elastic collision response, step-up traversal and unstick recovery
//! - Box queries and radial push impulses for gameplay code
//!
//! Entities report back to their owners through the [`Event`] protocol;
//! every entity supplies an [`EventHandler`] before it is spawned.

pub mod entity;
pub mod event;
mod step;
pub mod trace;
pub mod world;

// Re-export commonly used types
pub use entity::{Entity, EntityFlags, EntityKey, ImpactClass};
pub use event::{Event, EventHandler, IgnoreEvents, ImpactEvent};
pub use trace::Trace;
pub use world::{PhysicsConfig, PhysicsWorld, FRAME_SEC_MAX, POSITION_LIMIT, SPEED_LIMIT};
