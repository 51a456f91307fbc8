//! Deterministic simulation module
//!
//! All physics lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (dense registry order)
//! - No allocation in the tick beyond the frame scratch arena
//! - No rendering or platform dependencies

pub mod aabb;
pub mod collision;
pub mod mover;
pub mod registry;
pub mod rope;
pub mod scratch;
pub mod state;
pub mod tick;
pub mod tile;

pub use aabb::Aabb;
pub use collision::{
    CollisionQuery, CollisionResult, Ground, Solid, Support, Sweep, query_with_solids,
};
pub use mover::{Actor, ActorFlags, ActorMover, StepReport, gather_candidates};
pub use registry::{ObjectHandle, ObjectRegistry};
pub use rope::{HookState, RopeNode, RopeSolver};
pub use scratch::{FrameScratch, ScratchError, ScratchScope};
pub use state::{HERO_HALF_EXTENTS, SimContext};
pub use tick::{FixedStep, TickInput, TickReport, tick};
pub use tile::{Cell, TileGrid, TileKind};
