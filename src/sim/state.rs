//! Simulation context and core simulation types
//!
//! Everything a tick reads or writes lives in `SimContext`, passed by `&mut`:
//! - The current map's tile grid
//! - Solids registered by the object system
//! - The hero actor and its grappling rope
//! - The frame scratch arena

use glam::Vec2;

use super::collision::{CollisionQuery, Solid};
use super::mover::{Actor, ActorMover};
use super::registry::{ObjectHandle, ObjectRegistry};
use super::rope::RopeSolver;
use super::scratch::FrameScratch;
use super::tile::TileGrid;
use crate::consts::*;
use crate::settings::PhysicsSettings;

/// Hero collision box half extents
pub const HERO_HALF_EXTENTS: Vec2 = Vec2::new(HERO_HALF_WIDTH, HERO_HALF_HEIGHT);

/// Complete simulation state for one running map
#[derive(Debug)]
pub struct SimContext {
    pub settings: PhysicsSettings,
    pub grid: TileGrid,
    pub solids: ObjectRegistry<Solid>,
    pub rope: RopeSolver,
    pub scratch: FrameScratch,
    pub hero: Actor,
    pub mover: ActorMover,
    /// Where the hero appears on map load and respawn
    pub spawn: Vec2,
    /// Simulation tick counter
    pub time_ticks: u64,
}

impl SimContext {
    pub fn new(settings: PhysicsSettings, grid: TileGrid, spawn: Vec2) -> Self {
        log::info!(
            "Simulation context: {}x{} map, {} profile, {} byte scratch",
            grid.width(),
            grid.height(),
            settings.profile.as_str(),
            settings.scratch_bytes
        );
        Self {
            solids: ObjectRegistry::with_capacity(settings.registry_capacity),
            rope: RopeSolver::from_settings(&settings),
            scratch: FrameScratch::new(settings.scratch_bytes),
            hero: Actor::new(spawn, HERO_HALF_EXTENTS),
            mover: ActorMover::from_settings(&settings),
            settings,
            grid,
            spawn,
            time_ticks: 0,
        }
    }

    /// Swap in a new map between ticks. Solids belong to the old map and are
    /// dropped; the hero respawns at `spawn`.
    pub fn load_map(&mut self, grid: TileGrid, spawn: Vec2) {
        log::info!("Loading {}x{} map", grid.width(), grid.height());
        self.grid = grid;
        self.solids.clear();
        self.spawn = spawn;
        self.respawn_hero();
    }

    /// Put the hero back at the spawn point and drop the rope
    pub fn respawn_hero(&mut self) {
        self.hero = Actor::new(self.spawn, HERO_HALF_EXTENTS);
        self.rope.reset();
    }

    /// Register a solid on behalf of the object system
    pub fn add_solid(&mut self, handle: ObjectHandle, solid: Solid) -> bool {
        self.solids.add(handle, solid)
    }

    pub fn remove_solid(&mut self, handle: ObjectHandle) -> bool {
        let removed = self.solids.remove(handle);
        if removed && self.hero.carrier == handle {
            self.hero.carrier = ObjectHandle::NONE;
        }
        removed
    }

    /// Query over the whole map and every live solid
    pub fn query(&self) -> CollisionQuery<'_> {
        CollisionQuery::new(&self.grid, &self.solids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::aabb::Aabb;
    use crate::sim::rope::HookState;

    fn context() -> SimContext {
        let grid = TileGrid::from_ascii(&["........", "........", "########"], Vec2::ZERO);
        SimContext::new(PhysicsSettings::default(), grid, Vec2::new(24.0, 24.0))
    }

    #[test]
    fn test_respawn_resets_hero_and_rope() {
        let mut ctx = context();
        ctx.hero.pos = Vec2::new(90.0, 10.0);
        ctx.hero.vel = Vec2::new(5.0, 5.0);
        assert!(ctx.rope.attach(ctx.hero.pos, Vec2::new(100.0, 10.0)));

        ctx.respawn_hero();
        assert_eq!(ctx.hero.pos, Vec2::new(24.0, 24.0));
        assert_eq!(ctx.hero.vel, Vec2::ZERO);
        assert_eq!(ctx.rope.state(), HookState::Idle);
    }

    #[test]
    fn test_load_map_swaps_grid_and_drops_solids() {
        let mut ctx = context();
        assert!(ctx.add_solid(ObjectHandle(1), Solid::fixed(Aabb::from_xywh(0.0, 0.0, 8.0, 8.0))));

        let next = TileGrid::new(4, 4, Vec2::new(100.0, 100.0));
        ctx.load_map(next, Vec2::new(120.0, 120.0));
        assert_eq!(ctx.grid.width(), 4);
        assert!(ctx.solids.is_empty());
        assert_eq!(ctx.hero.pos, Vec2::new(120.0, 120.0));
    }

    #[test]
    fn test_removing_carrier_clears_it() {
        let mut ctx = context();
        let handle = ObjectHandle(2);
        ctx.add_solid(handle, Solid::fixed(Aabb::from_xywh(0.0, 32.0, 8.0, 8.0)));
        ctx.hero.carrier = handle;
        assert!(ctx.remove_solid(handle));
        assert!(ctx.hero.carrier.is_none());
        assert!(!ctx.remove_solid(handle));
    }
}
