//! Collision queries over tiles and dynamic solids
//!
//! The mover never asks "where is the wall", only "how far can I go". Every
//! sweep here returns the largest displacement along one axis that does not
//! push the leading edge past a surface. Obstacles the box already overlaps are
//! ignored by sweeps; the mover decides separately whether it is embedded.
//!
//! Floor ramps are not treated as boxes. Their diagonal sides never block
//! horizontal motion, and downward contact with them comes only from a sensor
//! at the box's horizontal center. That keeps feet glued to the ramp surface
//! while corners overhang it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::registry::{ObjectHandle, ObjectRegistry};
use super::tile::{TileGrid, TileKind};
use crate::consts::{CONTACT_EPSILON, TILE_SIZE};

/// A static or moving box collider supplied by the object system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    pub rect: Aabb,
    /// Imparted velocity (units/s); zero for static solids
    pub velocity: Vec2,
}

impl Solid {
    pub fn fixed(rect: Aabb) -> Self {
        Self {
            rect,
            velocity: Vec2::ZERO,
        }
    }

    pub fn moving(rect: Aabb, velocity: Vec2) -> Self {
        Self { rect, velocity }
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.velocity != Vec2::ZERO
    }

    /// Displacement over one tick
    #[inline]
    pub fn displacement(&self, dt: f32) -> Vec2 {
        self.velocity * dt
    }

    pub fn advance(&mut self, dt: f32) {
        self.rect = self.rect.translated(self.displacement(dt));
    }
}

/// Result of an overlap query
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether anything overlaps the query box
    pub hit: bool,
    /// Separating direction, pointing from the obstacle toward the box
    pub normal: Vec2,
    /// Depth along `normal` needed to separate
    pub penetration: f32,
    /// Solid responsible, if the deepest overlap was not a tile
    pub solid: Option<ObjectHandle>,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec2::ZERO,
            penetration: 0.0,
            solid: None,
        }
    }

    fn consider(&mut self, normal: Vec2, penetration: f32, solid: Option<ObjectHandle>) {
        if !self.hit || penetration > self.penetration {
            *self = Self {
                hit: true,
                normal,
                penetration,
                solid,
            };
        }
    }
}

/// Outcome of a single-axis sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    /// Resolved signed displacement along the axis
    pub distance: f32,
    /// Whether the full displacement was cut short
    pub hit: bool,
    /// Solid that stopped the sweep
    pub solid: Option<ObjectHandle>,
}

impl Sweep {
    fn free(distance: f32) -> Self {
        Self {
            distance,
            hit: false,
            solid: None,
        }
    }

    /// Keep the shorter stop in the direction of travel
    fn clamp(&mut self, dist: f32, positive: bool, solid: Option<ObjectHandle>) {
        let shorter = if positive {
            dist < self.distance
        } else {
            dist > self.distance
        };
        if shorter {
            self.distance = if positive { dist.max(0.0) } else { dist.min(0.0) };
            self.hit = true;
            self.solid = solid;
        }
    }
}

/// What an actor is standing on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Support {
    Tile(TileKind),
    Solid(ObjectHandle),
}

/// Supporting surface under a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ground {
    /// World y of the surface
    pub y: f32,
    pub support: Support,
}

impl Ground {
    #[inline]
    pub fn is_slope(&self) -> bool {
        matches!(self.support, Support::Tile(kind) if kind.is_floor_slope())
    }

    #[inline]
    pub fn solid(&self) -> Option<ObjectHandle> {
        match self.support {
            Support::Solid(h) => Some(h),
            Support::Tile(_) => None,
        }
    }
}

/// Tile grid plus the live solids a query may hit
#[derive(Clone, Copy)]
pub struct CollisionQuery<'a> {
    pub grid: &'a TileGrid,
    pub solids: &'a ObjectRegistry<Solid>,
    /// Broad-phase subset of `solids`; `None` scans the whole registry
    candidates: Option<&'a [ObjectHandle]>,
    /// Solid skipped by every query (e.g. the platform carrying the actor)
    ignore: ObjectHandle,
}

impl<'a> CollisionQuery<'a> {
    pub fn new(grid: &'a TileGrid, solids: &'a ObjectRegistry<Solid>) -> Self {
        Self {
            grid,
            solids,
            candidates: None,
            ignore: ObjectHandle::NONE,
        }
    }

    /// Restrict solid enumeration to a pre-gathered candidate list
    pub fn with_candidates(self, candidates: &'a [ObjectHandle]) -> Self {
        Self {
            candidates: Some(candidates),
            ..self
        }
    }

    pub fn ignoring(self, handle: ObjectHandle) -> Self {
        Self {
            ignore: handle,
            ..self
        }
    }

    /// Visit every live solid this query considers
    pub fn for_each_solid(&self, mut f: impl FnMut(ObjectHandle, &Solid)) {
        match self.candidates {
            Some(list) => {
                for &h in list {
                    if h != self.ignore {
                        if let Some(s) = self.solids.get(h) {
                            f(h, s);
                        }
                    }
                }
            }
            None => {
                for (h, s) in self.solids.iter() {
                    if h != self.ignore {
                        f(h, s);
                    }
                }
            }
        }
    }

    /// Write handles of solids overlapping `rect` into `out`; returns how many
    /// were written (stops when `out` is full)
    pub fn overlapping_solids(&self, rect: &Aabb, out: &mut [ObjectHandle]) -> usize {
        let mut n = 0;
        self.for_each_solid(|h, s| {
            if n < out.len() && s.rect.intersects(rect) {
                out[n] = h;
                n += 1;
            }
        });
        n
    }

    /// Whether tiles or solids overlap `rect`
    pub fn area_blocked(&self, rect: &Aabb) -> bool {
        if self.grid.area_blocked(rect) {
            return true;
        }
        let mut blocked = false;
        self.for_each_solid(|_, s| blocked |= s.rect.intersects(rect));
        blocked
    }

    /// Like `area_blocked` but floor ramps are ignored and contact within
    /// `CONTACT_EPSILON` is forgiven (the mover's notion of "inside a wall")
    pub fn hard_blocked(&self, rect: &Aabb) -> bool {
        if self
            .grid
            .area_blocked_where(rect, |kind| !kind.is_floor_slope())
        {
            return true;
        }
        let mut blocked = false;
        self.for_each_solid(|_, s| {
            blocked |= s.rect.intersects_with_slack(rect, CONTACT_EPSILON)
        });
        blocked
    }

    /// Deepest overlap of `rect` with tiles or solids
    pub fn query(&self, rect: &Aabb) -> CollisionResult {
        let mut result = CollisionResult::miss();

        self.grid.for_each_cell(rect, |_, kind, cell| {
            if let Some((normal, depth)) = tile_penetration(kind, &cell, rect) {
                result.consider(normal, depth, None);
            }
        });

        self.for_each_solid(|h, s| {
            if let Some(push) = rect.penetration(&s.rect) {
                result.consider(push.normalize_or_zero(), push.length(), Some(h));
            }
        });

        result
    }

    /// Sweep `rect` horizontally by `dx`. The bottom `step_up` units of the box
    /// are ignored so feet can ride up a ramp onto the next tile.
    pub fn sweep_x(&self, rect: &Aabb, dx: f32, step_up: f32) -> Sweep {
        let mut sweep = Sweep::free(dx);
        if dx == 0.0 {
            return sweep;
        }
        let right = dx > 0.0;
        let body = rect.trim_bottom(step_up);
        if body.height() <= CONTACT_EPSILON {
            return sweep;
        }
        let lead = if right { body.max.x } else { body.min.x };
        let swept = body.swept(Vec2::new(dx, 0.0));
        let eps = CONTACT_EPSILON;

        self.grid.for_each_cell(&swept, |_, kind, cell| {
            if kind.is_empty() {
                return;
            }
            // Climbable ramp diagonals
            if (right && kind == TileKind::SlopeBottomRight)
                || (!right && kind == TileKind::SlopeBottomLeft)
            {
                return;
            }
            let y0 = (body.min.y - cell.min.y).max(0.0);
            let y1 = (body.max.y - cell.min.y).min(TILE_SIZE);
            if y1 - y0 <= eps {
                return;
            }
            let face = if right {
                kind.left_surface(y0, y1)
            } else {
                kind.right_surface(y0, y1)
            };
            if let Some(face) = face {
                let dist = cell.min.x + face - lead;
                if (right && dist >= -eps) || (!right && dist <= eps) {
                    sweep.clamp(dist, right, None);
                }
            }
        });

        self.for_each_solid(|h, s| {
            if s.rect.min.y >= body.max.y - eps || s.rect.max.y <= body.min.y + eps {
                return;
            }
            let dist = if right {
                s.rect.min.x - lead
            } else {
                s.rect.max.x - lead
            };
            if (right && dist >= -eps && s.rect.min.x < swept.max.x)
                || (!right && dist <= eps && s.rect.max.x > swept.min.x)
            {
                sweep.clamp(dist, right, Some(h));
            }
        });

        sweep
    }

    /// Sweep `rect` vertically by `dy`. Moving down, a floor ramp under the
    /// box center may pull the feet up by as much as `slope_reach`.
    pub fn sweep_y(&self, rect: &Aabb, dy: f32, slope_reach: f32) -> Sweep {
        let mut sweep = Sweep::free(dy);
        if dy == 0.0 {
            return sweep;
        }
        let down = dy > 0.0;
        let eps = CONTACT_EPSILON;
        let swept = rect.swept(Vec2::new(0.0, dy));

        if down {
            let feet = rect.max.y;
            let sensor = self.grid.floor_in_column(
                rect.center().x,
                feet - slope_reach.max(eps),
                feet + dy,
            );
            match sensor {
                // Ramp footing may pull the feet up. Block tops the box
                // overlaps near the high end of the ramp still win.
                Some((surface, kind)) if kind.is_floor_slope() => {
                    let mut nearest = |dist: f32| {
                        if dist < sweep.distance {
                            sweep.distance = dist;
                            sweep.hit = true;
                        }
                    };
                    nearest(surface - feet);
                    let ledge = surface - rect.half_extents().x;
                    let lo = feet - slope_reach.max(eps);
                    self.for_each_tile_top(rect, lo, feet + dy, |top, _| {
                        if top >= ledge - eps {
                            nearest(top - feet);
                        }
                    });
                }
                _ => self.for_each_tile_top(rect, feet - eps, feet + dy, |top, _| {
                    sweep.clamp(top - feet, true, None);
                }),
            }
        } else {
            let head = rect.min.y;
            self.grid.for_each_cell(&swept, |_, kind, cell| {
                if kind.is_empty() {
                    return;
                }
                let x0 = (rect.min.x - cell.min.x).max(0.0);
                let x1 = (rect.max.x - cell.min.x).min(TILE_SIZE);
                if x1 - x0 <= eps {
                    return;
                }
                if let Some(bottom) = kind.bottom_surface(x0, x1) {
                    let dist = cell.min.y + bottom - head;
                    if dist <= eps {
                        sweep.clamp(dist, false, None);
                    }
                }
            });
        }

        self.for_each_solid(|h, s| {
            if s.rect.min.x >= rect.max.x - eps || s.rect.max.x <= rect.min.x + eps {
                return;
            }
            if down {
                let dist = s.rect.min.y - rect.max.y;
                if dist >= -eps && s.rect.min.y < swept.max.y {
                    sweep.clamp(dist, true, Some(h));
                }
            } else {
                let dist = s.rect.max.y - rect.min.y;
                if dist <= eps && s.rect.max.y > swept.min.y {
                    sweep.clamp(dist, false, Some(h));
                }
            }
        });

        sweep
    }

    /// Visit the world y of every non-ramp tile top between `lo` and `hi`
    /// under the horizontal span of `rect`
    fn for_each_tile_top(&self, rect: &Aabb, lo: f32, hi: f32, mut f: impl FnMut(f32, TileKind)) {
        let eps = CONTACT_EPSILON;
        let region = Aabb::new(Vec2::new(rect.min.x, lo - eps), Vec2::new(rect.max.x, hi + eps));
        self.grid.for_each_cell(&region, |_, kind, cell| {
            if kind.is_empty() || kind.is_floor_slope() {
                return;
            }
            let x0 = (rect.min.x - cell.min.x).max(0.0);
            let x1 = (rect.max.x - cell.min.x).min(TILE_SIZE);
            if x1 - x0 <= eps {
                return;
            }
            if let Some(top) = kind.top_surface(x0, x1) {
                let y = cell.min.y + top;
                if y >= lo - eps && y <= hi + eps {
                    f(y, kind);
                }
            }
        });
    }

    /// Find the surface supporting `rect`, looking `up` above and `down` below
    /// the feet. A ramp under the box center wins over tile contact elsewhere,
    /// unless a ledge it runs into is higher and within half the box width of
    /// the ramp surface. A solid wins when it is higher.
    pub fn ground_probe(&self, rect: &Aabb, up: f32, down: f32) -> Option<Ground> {
        let feet = rect.max.y;
        let lo = feet - up;
        let hi = feet + down;
        let eps = CONTACT_EPSILON;
        let mut best: Option<Ground> = None;
        let mut offer = |y: f32, support: Support| {
            if best.is_none_or(|g| y < g.y) {
                best = Some(Ground { y, support });
            }
        };

        match self.grid.floor_in_column(rect.center().x, lo, hi) {
            Some((y, kind)) if kind.is_floor_slope() => {
                offer(y, Support::Tile(kind));
                // A ledge the ramp runs into may sit under the box's edge
                let ledge = y - rect.half_extents().x;
                self.for_each_tile_top(rect, lo, hi, |top, kind| {
                    if top >= ledge - eps {
                        offer(top, Support::Tile(kind));
                    }
                });
            }
            _ => self.for_each_tile_top(rect, lo, hi, |top, kind| {
                offer(top, Support::Tile(kind));
            }),
        }

        self.for_each_solid(|h, s| {
            if s.rect.min.x >= rect.max.x - eps || s.rect.max.x <= rect.min.x + eps {
                return;
            }
            let y = s.rect.min.y;
            if y >= lo - eps && y <= hi + eps {
                offer(y, Support::Solid(h));
            }
        });

        best
    }
}

/// Separating normal and depth of `rect` inside one tile cell
fn tile_penetration(kind: TileKind, cell: &Aabb, rect: &Aabb) -> Option<(Vec2, f32)> {
    if kind.is_empty() || !rect.intersects_with_slack(cell, CONTACT_EPSILON) {
        return None;
    }
    let x0 = (rect.min.x - cell.min.x).max(0.0);
    let x1 = (rect.max.x - cell.min.x).min(TILE_SIZE);
    let y0 = (rect.min.y - cell.min.y).max(0.0);
    let y1 = (rect.max.y - cell.min.y).min(TILE_SIZE);
    if !kind.box_overlaps(x0, x1, y0, y1) {
        return None;
    }
    let diag = std::f32::consts::FRAC_1_SQRT_2;
    match kind {
        TileKind::Block => rect
            .penetration(cell)
            .map(|push| (push.normalize_or_zero(), push.length())),
        TileKind::SlopeBottomRight => {
            Some((Vec2::new(-diag, -diag), (x1 + y1 - TILE_SIZE) * diag))
        }
        TileKind::SlopeBottomLeft => Some((Vec2::new(diag, -diag), (y1 - x0) * diag)),
        TileKind::SlopeTopRight => Some((Vec2::new(-diag, diag), (x1 - y0) * diag)),
        TileKind::SlopeTopLeft => Some((Vec2::new(diag, diag), (TILE_SIZE - x0 - y0) * diag)),
        TileKind::Empty => None,
    }
}

/// Overlap test of `rect` against the grid and every registered solid
pub fn query_with_solids(
    grid: &TileGrid,
    rect: &Aabb,
    registry: &ObjectRegistry<Solid>,
) -> CollisionResult {
    CollisionQuery::new(grid, registry).query(rect)
}
