//! Wreckage Simulation Library
//!
//! Destructible ships of points, springs and triangles floating on a
//! shallow-water ocean. Exposes simulation components for testing and reuse.

pub mod error;
pub mod render;
pub mod resources;
pub mod simulation;

pub use error::WreckageError;
