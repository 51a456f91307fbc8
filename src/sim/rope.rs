//! Grappling hook and rope chain
//!
//! The hook tip flies in a straight line until it touches solid tiles, then a
//! Verlet chain is laid from the hero to the anchor. Node 0 is pinned to the
//! hero and the last node to the anchor. Each update integrates the free
//! nodes, relaxes the links for a fixed number of passes, pushes nodes out of
//! tiles and reports the pull on the hero from the first link's stretch.
//!
//! Links only resist stretching; a slack chain sags freely.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::scratch::ScratchScope;
use super::tile::TileGrid;
use crate::clamp_length;
use crate::consts::TILE_SIZE;
use crate::settings::PhysicsSettings;

/// Distance a pushed-out node is placed beyond the cell face
const PUSH_MARGIN: f32 = 0.01;

/// Grappling hook lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HookState {
    #[default]
    Idle,
    /// Tip in flight
    Shooting,
    /// Chain anchored; tension is live
    Attached,
    /// Chain being reeled in from the hook end
    Retracting,
}

impl HookState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookState::Idle => "idle",
            HookState::Shooting => "shooting",
            HookState::Attached => "attached",
            HookState::Retracting => "retracting",
        }
    }
}

/// One chain node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RopeNode {
    pub pos: Vec2,
    /// Position last update (Verlet velocity is `pos - prev`)
    pub prev: Vec2,
    pub pinned: bool,
}

impl RopeNode {
    fn at(pos: Vec2, pinned: bool) -> Self {
        Self {
            pos,
            prev: pos,
            pinned,
        }
    }

    fn pin_to(&mut self, pos: Vec2) {
        self.pos = pos;
        self.prev = pos;
        self.pinned = true;
    }
}

/// Hook and chain simulation
#[derive(Debug, Clone)]
pub struct RopeSolver {
    state: HookState,
    nodes: Vec<RopeNode>,
    tip: Vec2,
    tip_dir: Vec2,
    anchor: Vec2,
    tension: Vec2,

    pub segment_length: f32,
    pub max_nodes: usize,
    pub iterations: u32,
    pub damping: f32,
    pub gravity: f32,
    pub hook_speed: f32,
    pub stiffness: f32,
    pub max_tension: f32,
    pub retract_per_tick: usize,
}

impl Default for RopeSolver {
    fn default() -> Self {
        Self::from_settings(&PhysicsSettings::default())
    }
}

impl RopeSolver {
    pub fn from_settings(settings: &PhysicsSettings) -> Self {
        Self {
            state: HookState::Idle,
            nodes: Vec::with_capacity(settings.max_rope_nodes),
            tip: Vec2::ZERO,
            tip_dir: Vec2::ZERO,
            anchor: Vec2::ZERO,
            tension: Vec2::ZERO,

            segment_length: settings.rope_segment_length,
            max_nodes: settings.max_rope_nodes,
            iterations: settings.rope_iterations,
            damping: settings.rope_damping,
            gravity: settings.gravity,
            hook_speed: settings.hook_speed,
            stiffness: settings.tension_stiffness,
            max_tension: settings.max_tension,
            retract_per_tick: settings.retract_nodes_per_tick.max(1),
        }
    }

    #[inline]
    pub fn state(&self) -> HookState {
        self.state
    }

    #[inline]
    pub fn nodes(&self) -> &[RopeNode] {
        &self.nodes
    }

    /// Pull on the hero from the last update (units/s²)
    #[inline]
    pub fn tension(&self) -> Vec2 {
        self.tension
    }

    /// Hook tip while shooting
    pub fn tip(&self) -> Option<Vec2> {
        (self.state == HookState::Shooting).then_some(self.tip)
    }

    /// Anchor point while the chain is attached
    pub fn anchor(&self) -> Option<Vec2> {
        (self.state == HookState::Attached).then_some(self.anchor)
    }

    /// Longest chain that can be materialised
    pub fn max_reach(&self) -> f32 {
        self.max_nodes.saturating_sub(1) as f32 * self.segment_length
    }

    /// Drop the hook and chain
    pub fn reset(&mut self) {
        self.state = HookState::Idle;
        self.nodes.clear();
        self.tension = Vec2::ZERO;
    }

    /// Fire the hook from `hero_pos`. Only valid while idle.
    pub fn start(&mut self, hero_pos: Vec2, direction: Vec2) -> bool {
        if self.state != HookState::Idle {
            return false;
        }
        let Some(dir) = direction.try_normalize() else {
            return false;
        };
        self.tip = hero_pos;
        self.tip_dir = dir;
        self.state = HookState::Shooting;
        log::debug!("Hook fired toward ({:.2}, {:.2})", dir.x, dir.y);
        true
    }

    /// Lay a chain from `hero` to `anchor`. Rejects (and returns to idle)
    /// when the chain would need more than `max_nodes` nodes.
    pub fn attach(&mut self, hero: Vec2, anchor: Vec2) -> bool {
        let length = hero.distance(anchor);
        let count = (length / self.segment_length).ceil() as usize + 1;
        let count = count.max(2);
        if count > self.max_nodes {
            log::warn!(
                "Hook cast rejected: {:.1} units needs {} nodes (max {})",
                length,
                count,
                self.max_nodes
            );
            self.reset();
            return false;
        }

        self.nodes.clear();
        let last = count - 1;
        for i in 0..count {
            let t = i as f32 / last as f32;
            self.nodes
                .push(RopeNode::at(hero.lerp(anchor, t), i == 0 || i == last));
        }
        self.anchor = anchor;
        self.tension = Vec2::ZERO;
        self.state = HookState::Attached;
        log::debug!("Hook attached at ({:.1}, {:.1}) with {} nodes", anchor.x, anchor.y, count);
        true
    }

    /// Release: a flying hook is dropped, an attached chain starts reeling in
    pub fn cancel(&mut self) {
        match self.state {
            HookState::Shooting => self.reset(),
            HookState::Attached => {
                self.state = HookState::Retracting;
                self.tension = Vec2::ZERO;
                if let Some(end) = self.nodes.last_mut() {
                    end.pinned = false;
                }
            }
            HookState::Idle | HookState::Retracting => {}
        }
    }

    /// Advance one tick and return the tension to apply to the hero
    pub fn update(
        &mut self,
        dt: f32,
        grid: &TileGrid,
        hero_pos: Vec2,
        scratch: &mut ScratchScope<'_>,
    ) -> Vec2 {
        match self.state {
            HookState::Idle => {}
            HookState::Shooting => self.fly(dt, grid, hero_pos),
            HookState::Attached => {
                self.simulate(dt, grid, hero_pos, scratch);
                self.tension = self.first_link_pull();
            }
            HookState::Retracting => {
                let keep = self.nodes.len().saturating_sub(self.retract_per_tick);
                self.nodes.truncate(keep);
                if self.nodes.len() <= 1 {
                    log::debug!("Hook retracted");
                    self.reset();
                } else {
                    self.simulate(dt, grid, hero_pos, scratch);
                }
            }
        }
        self.tension
    }

    /// Move the tip, sampling at half-tile spacing so it cannot skip a tile
    fn fly(&mut self, dt: f32, grid: &TileGrid, hero_pos: Vec2) {
        let travel = self.hook_speed * dt;
        let samples = (travel / (TILE_SIZE * 0.5)).ceil().max(1.0) as u32;
        let reach = self.max_reach();

        for i in 1..=samples {
            let p = self.tip + self.tip_dir * (travel * i as f32 / samples as f32);
            if grid.point_solid(p) {
                self.tip = p;
                self.attach(hero_pos, p);
                return;
            }
            if p.distance(hero_pos) > reach {
                log::warn!("Hook missed: nothing within {:.0} units", reach);
                self.reset();
                return;
            }
        }
        self.tip += self.tip_dir * travel;
    }

    fn simulate(
        &mut self,
        dt: f32,
        grid: &TileGrid,
        hero_pos: Vec2,
        scratch: &mut ScratchScope<'_>,
    ) {
        if let Some(first) = self.nodes.first_mut() {
            first.pin_to(hero_pos);
        }

        // Verlet
        let accel = Vec2::new(0.0, self.gravity) * dt * dt;
        for node in self.nodes.iter_mut().filter(|n| !n.pinned) {
            let vel = (node.pos - node.prev) * self.damping;
            node.prev = node.pos;
            node.pos += vel + accel;
        }

        let mut scope = scratch.scope();
        let mut saved = scope.alloc::<Vec2>(self.nodes.len());
        if let Some(saved) = saved.as_deref_mut() {
            for (slot, node) in saved.iter_mut().zip(&self.nodes) {
                *slot = node.pos;
            }
        }

        for _ in 0..self.iterations {
            self.relax();
        }

        for (i, node) in self.nodes.iter_mut().enumerate() {
            if node.pinned || !grid.point_solid(node.pos) {
                continue;
            }
            match push_out(grid, node.pos) {
                Some(p) => {
                    node.pos = p;
                    node.prev = p;
                }
                None => {
                    let fallback = saved.as_deref().and_then(|s| s.get(i).copied());
                    node.pos = fallback.unwrap_or(node.prev);
                }
            }
        }
    }

    /// One Gauss-Seidel pass over every link. Links only resist stretching.
    /// A pinned end stays put and its free neighbour takes the whole correction.
    fn relax(&mut self) {
        let rest = self.segment_length;
        for i in 0..self.nodes.len().saturating_sub(1) {
            let a = self.nodes[i];
            let b = self.nodes[i + 1];
            let delta = b.pos - a.pos;
            let dist = delta.length();
            if dist <= rest || dist <= f32::EPSILON {
                continue;
            }
            let correction = delta * ((dist - rest) / dist);
            match (a.pinned, b.pinned) {
                (true, true) => {}
                (true, false) => self.nodes[i + 1].pos -= correction,
                (false, true) => self.nodes[i].pos += correction,
                (false, false) => {
                    self.nodes[i].pos += correction * 0.5;
                    self.nodes[i + 1].pos -= correction * 0.5;
                }
            }
        }
    }

    fn first_link_pull(&self) -> Vec2 {
        let [hero, next, ..] = self.nodes.as_slice() else {
            return Vec2::ZERO;
        };
        let delta = next.pos - hero.pos;
        let stretch = delta.length() - self.segment_length;
        if stretch <= 0.0 {
            return Vec2::ZERO;
        }
        clamp_length(delta.normalize_or_zero() * stretch * self.stiffness, self.max_tension)
    }
}

/// Nearest point outside the solid cell containing `p`, trying the
/// shallowest face first
fn push_out(grid: &TileGrid, p: Vec2) -> Option<Vec2> {
    let cell = grid.cell_of(p);
    let rect = grid.cell_rect(cell.x, cell.y);
    let mut exits = [
        (p.x - rect.min.x, Vec2::new(rect.min.x - PUSH_MARGIN, p.y)),
        (rect.max.x - p.x, Vec2::new(rect.max.x + PUSH_MARGIN, p.y)),
        (p.y - rect.min.y, Vec2::new(p.x, rect.min.y - PUSH_MARGIN)),
        (rect.max.y - p.y, Vec2::new(p.x, rect.max.y + PUSH_MARGIN)),
    ];
    exits.sort_by(|a, b| a.0.total_cmp(&b.0));
    exits
        .into_iter()
        .map(|(_, q)| q)
        .find(|q| !grid.point_solid(*q))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::scratch::FrameScratch;

    fn solver() -> RopeSolver {
        let mut rope = RopeSolver::default();
        rope.gravity = 0.0;
        rope.segment_length = 8.0;
        rope.max_nodes = 24;
        rope
    }

    fn open_grid() -> TileGrid {
        TileGrid::new(40, 40, Vec2::splat(-320.0))
    }

    #[test]
    fn test_taut_chain_stays_colinear() {
        let grid = open_grid();
        let mut scratch = FrameScratch::new(1024);
        let mut rope = solver();

        assert!(rope.attach(Vec2::ZERO, Vec2::new(32.0, 0.0)));
        assert_eq!(rope.nodes().len(), 5);
        for _ in 0..10 {
            let mut scope = scratch.scope();
            rope.update(SIM_DT, &grid, Vec2::ZERO, &mut scope);
        }

        for (i, node) in rope.nodes().iter().enumerate() {
            assert!(node.pos.y.abs() < 1e-4);
            assert!((node.pos.x - 8.0 * i as f32).abs() < 1e-3);
        }
        for pair in rope.nodes().windows(2) {
            assert!((pair[0].pos.distance(pair[1].pos) - 8.0).abs() < 1e-3);
        }
        assert_eq!(rope.tension(), Vec2::ZERO);
    }

    #[test]
    fn test_slack_chain_sags_to_rest_length() {
        let grid = open_grid();
        let mut scratch = FrameScratch::new(1024);
        let mut rope = solver();
        rope.gravity = 900.0;
        rope.damping = 0.9;
        rope.iterations = 8;

        assert!(rope.attach(Vec2::ZERO, Vec2::new(20.0, 0.0)));
        assert_eq!(rope.nodes().len(), 4);
        for _ in 0..300 {
            let mut scope = scratch.scope();
            rope.update(SIM_DT, &grid, Vec2::ZERO, &mut scope);
        }

        // Hangs below the line between the pins with links at rest length
        assert!(rope.nodes()[1].pos.y > 1.0);
        for pair in rope.nodes().windows(2) {
            let len = pair[0].pos.distance(pair[1].pos);
            assert!((len - 8.0).abs() < 0.3, "link length {}", len);
        }
    }

    #[test]
    fn test_stretched_chain_pulls_hero_toward_anchor() {
        let grid = open_grid();
        let mut scratch = FrameScratch::new(1024);
        let mut rope = solver();
        assert!(rope.attach(Vec2::ZERO, Vec2::new(32.0, 0.0)));

        let mut scope = scratch.scope();
        let pull = rope.update(SIM_DT, &grid, Vec2::new(-16.0, 0.0), &mut scope);
        assert!(pull.x > 0.0);
        assert!(pull.y.abs() < 1e-4);
        assert!(pull.length() <= rope.max_tension + 1e-3);
        assert_eq!(rope.tension(), pull);
    }

    #[test]
    fn test_tension_capped() {
        let grid = open_grid();
        let mut scratch = FrameScratch::new(1024);
        let mut rope = solver();
        rope.max_tension = 10.0;
        assert!(rope.attach(Vec2::ZERO, Vec2::new(32.0, 0.0)));

        let mut scope = scratch.scope();
        let pull = rope.update(SIM_DT, &grid, Vec2::new(-200.0, 0.0), &mut scope);
        assert!((pull.length() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_over_long_cast_rejected() {
        let mut rope = solver();
        assert!(rope.start(Vec2::ZERO, Vec2::X));
        assert!(!rope.attach(Vec2::ZERO, Vec2::new(400.0, 0.0)));
        assert_eq!(rope.state(), HookState::Idle);
        assert!(rope.nodes().is_empty());
    }

    #[test]
    fn test_start_only_from_idle_with_direction() {
        let mut rope = solver();
        assert!(!rope.start(Vec2::ZERO, Vec2::ZERO));
        assert!(rope.start(Vec2::ZERO, Vec2::new(3.0, 4.0)));
        assert_eq!(rope.state(), HookState::Shooting);
        assert!(!rope.start(Vec2::ZERO, Vec2::X));

        rope.cancel();
        assert_eq!(rope.state(), HookState::Idle);
    }

    #[test]
    fn test_hook_flies_into_wall_and_attaches() {
        let grid = TileGrid::from_ascii(&["........#", "........#", "........#"], Vec2::ZERO);
        let mut scratch = FrameScratch::new(1024);
        let mut rope = solver();
        let hero = Vec2::new(8.0, 24.0);
        assert!(rope.start(hero, Vec2::X));

        for _ in 0..30 {
            let mut scope = scratch.scope();
            rope.update(SIM_DT, &grid, hero, &mut scope);
            if rope.state() != HookState::Shooting {
                break;
            }
        }

        assert_eq!(rope.state(), HookState::Attached);
        let anchor = rope.anchor().unwrap();
        assert!(anchor.x >= 128.0 && anchor.x < 136.0);
        // 120 units of chain at 8 per link
        assert!((16..=17).contains(&rope.nodes().len()));
        assert!(rope.nodes()[0].pinned && rope.nodes().last().unwrap().pinned);
    }

    #[test]
    fn test_hook_misses_beyond_reach() {
        let grid = TileGrid::new(40, 4, Vec2::ZERO);
        let mut scratch = FrameScratch::new(1024);
        let mut rope = solver();
        let hero = Vec2::new(8.0, 24.0);
        assert!(rope.start(hero, Vec2::X));

        for _ in 0..60 {
            let mut scope = scratch.scope();
            rope.update(SIM_DT, &grid, hero, &mut scope);
        }
        assert_eq!(rope.state(), HookState::Idle);
    }

    #[test]
    fn test_retraction_returns_to_idle() {
        let grid = open_grid();
        let mut scratch = FrameScratch::new(1024);
        let mut rope = solver();
        assert!(rope.attach(Vec2::ZERO, Vec2::new(32.0, 0.0)));

        rope.cancel();
        assert_eq!(rope.state(), HookState::Retracting);
        for expected in [4, 3, 2] {
            let mut scope = scratch.scope();
            rope.update(SIM_DT, &grid, Vec2::ZERO, &mut scope);
            assert_eq!(rope.nodes().len(), expected);
            assert_eq!(rope.state(), HookState::Retracting);
        }
        let mut scope = scratch.scope();
        rope.update(SIM_DT, &grid, Vec2::ZERO, &mut scope);
        assert_eq!(rope.state(), HookState::Idle);
        assert!(rope.nodes().is_empty());
    }

    #[test]
    fn test_nodes_pushed_out_of_tiles() {
        let grid = TileGrid::from_ascii(&["..#..", "....."], Vec2::ZERO);
        let mut scratch = FrameScratch::new(1024);
        let mut rope = solver();
        let hero = Vec2::new(8.0, 8.0);
        assert!(rope.attach(hero, Vec2::new(72.0, 8.0)));
        assert!(rope.nodes().iter().any(|n| grid.point_solid(n.pos)));

        let mut scope = scratch.scope();
        rope.update(SIM_DT, &grid, hero, &mut scope);
        for node in rope.nodes() {
            assert!(!grid.point_solid(node.pos), "node stuck at {:?}", node.pos);
        }
    }

    #[test]
    fn test_push_out_prefers_shallow_free_face() {
        let grid = TileGrid::from_ascii(&["....", ".##.", "...."], Vec2::ZERO);
        // Just inside the top face of the left block
        let p = push_out(&grid, Vec2::new(20.0, 17.0)).unwrap();
        assert!((p.y - (16.0 - PUSH_MARGIN)).abs() < 1e-4);
        // Right face is shallower but leads into the neighbouring block
        let p = push_out(&grid, Vec2::new(30.0, 24.0)).unwrap();
        assert!(p.x < 16.0 || p.y < 16.0 || p.y > 32.0);
        assert!(!grid.point_solid(p));
    }
}
