//! Tile grid collision representation
//!
//! The grid is built once per map by the external loader and swapped whole on
//! map transition. Every query treats cells outside the map as `Block`, so an
//! actor can never fall off the edge of the world into undefined space.
//!
//! Slopes are 45° triangles named after the corner they fill. In local cell
//! coordinates (`0..TILE_SIZE`, y-down):
//!
//! | kind               | solid where        | walkable surface |
//! |--------------------|--------------------|------------------|
//! | `SlopeBottomRight` | `x + y >= T`       | rises to the right |
//! | `SlopeBottomLeft`  | `y >= x`           | rises to the left  |
//! | `SlopeTopRight`    | `y <= x`           | ceiling            |
//! | `SlopeTopLeft`     | `x + y <= T`       | ceiling            |

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use crate::consts::{CONTACT_EPSILON, TILE_SIZE};

/// Collision kind of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileKind {
    #[default]
    Empty = 0,
    Block = 1,
    /// Floor ramp, solid bottom-right half (ascends to the right)
    SlopeBottomRight = 2,
    /// Floor ramp, solid bottom-left half (ascends to the left)
    SlopeBottomLeft = 3,
    /// Ceiling ramp, solid top-right half
    SlopeTopRight = 4,
    /// Ceiling ramp, solid top-left half
    SlopeTopLeft = 5,
}

impl TileKind {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' | ' ' => Some(TileKind::Empty),
            '#' => Some(TileKind::Block),
            '/' => Some(TileKind::SlopeBottomRight),
            '\\' => Some(TileKind::SlopeBottomLeft),
            '7' => Some(TileKind::SlopeTopRight),
            'F' => Some(TileKind::SlopeTopLeft),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            TileKind::Empty => '.',
            TileKind::Block => '#',
            TileKind::SlopeBottomRight => '/',
            TileKind::SlopeBottomLeft => '\\',
            TileKind::SlopeTopRight => '7',
            TileKind::SlopeTopLeft => 'F',
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self == TileKind::Empty
    }

    #[inline]
    pub fn is_floor_slope(self) -> bool {
        matches!(self, TileKind::SlopeBottomRight | TileKind::SlopeBottomLeft)
    }

    #[inline]
    pub fn is_ceiling_slope(self) -> bool {
        matches!(self, TileKind::SlopeTopRight | TileKind::SlopeTopLeft)
    }

    /// Whether a local point lies in the solid part of the cell
    pub fn solid_at(self, local: Vec2) -> bool {
        let Vec2 { x, y } = local;
        match self {
            TileKind::Empty => false,
            TileKind::Block => true,
            TileKind::SlopeBottomRight => x + y >= TILE_SIZE,
            TileKind::SlopeBottomLeft => y >= x,
            TileKind::SlopeTopRight => y <= x,
            TileKind::SlopeTopLeft => x + y <= TILE_SIZE,
        }
    }

    /// Whether a local box `[x0, x1] × [y0, y1]` (already clipped to the cell)
    /// reaches past the slope diagonal. Touching does not count.
    pub fn box_overlaps(self, x0: f32, x1: f32, y0: f32, y1: f32) -> bool {
        let eps = CONTACT_EPSILON;
        match self {
            TileKind::Empty => false,
            TileKind::Block => true,
            // Test the corner that reaches deepest into each triangle
            TileKind::SlopeBottomRight => x1 + y1 > TILE_SIZE + eps,
            TileKind::SlopeBottomLeft => y1 > x0 + eps,
            TileKind::SlopeTopRight => y0 < x1 - eps,
            TileKind::SlopeTopLeft => x0 + y0 < TILE_SIZE - eps,
        }
    }

    /// Walkable surface height (local y) at local `x`, if the cell has one
    pub fn floor_height(self, x: f32) -> Option<f32> {
        let x = x.clamp(0.0, TILE_SIZE);
        match self {
            TileKind::Empty => None,
            TileKind::SlopeBottomRight => Some(TILE_SIZE - x),
            TileKind::SlopeBottomLeft => Some(x),
            TileKind::Block | TileKind::SlopeTopRight | TileKind::SlopeTopLeft => Some(0.0),
        }
    }

    /// First solid local y met by a box bottom spanning `[x0, x1]` moving down
    pub fn top_surface(self, x0: f32, x1: f32) -> Option<f32> {
        match self {
            TileKind::Empty => None,
            TileKind::SlopeBottomRight => Some(TILE_SIZE - x1),
            TileKind::SlopeBottomLeft => Some(x0),
            _ => Some(0.0),
        }
    }

    /// First solid local y met by a box top spanning `[x0, x1]` moving up
    pub fn bottom_surface(self, x0: f32, x1: f32) -> Option<f32> {
        match self {
            TileKind::Empty => None,
            TileKind::SlopeTopRight => Some(x1),
            TileKind::SlopeTopLeft => Some(TILE_SIZE - x0),
            _ => Some(TILE_SIZE),
        }
    }

    /// First solid local x met by a box right edge spanning `[y0, y1]` moving right
    pub fn left_surface(self, y0: f32, y1: f32) -> Option<f32> {
        match self {
            TileKind::Empty => None,
            TileKind::SlopeBottomRight => Some(TILE_SIZE - y1),
            TileKind::SlopeTopRight => Some(y0),
            _ => Some(0.0),
        }
    }

    /// First solid local x met by a box left edge spanning `[y0, y1]` moving left
    pub fn right_surface(self, y0: f32, y1: f32) -> Option<f32> {
        match self {
            TileKind::Empty => None,
            TileKind::SlopeBottomLeft => Some(y1),
            TileKind::SlopeTopLeft => Some(TILE_SIZE - y0),
            _ => Some(TILE_SIZE),
        }
    }
}

/// Integer cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

/// Immutable per-map tile collision grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    width: u32,
    height: u32,
    /// World position of cell (0, 0)'s top-left corner
    origin: Vec2,
    tiles: Vec<TileKind>,
}

impl TileGrid {
    /// Create an all-empty grid
    pub fn new(width: u32, height: u32, origin: Vec2) -> Self {
        Self {
            width,
            height,
            origin,
            tiles: vec![TileKind::Empty; width as usize * height as usize],
        }
    }

    /// Build a grid from ASCII rows (see `TileKind::from_char`); unknown
    /// characters are treated as empty and short rows are padded
    pub fn from_ascii(rows: &[&str], origin: Vec2) -> Self {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let mut grid = Self::new(width, height, origin);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let kind = TileKind::from_char(c).unwrap_or_else(|| {
                    log::warn!("Unknown tile char {:?} at ({}, {}), using empty", c, x, y);
                    TileKind::Empty
                });
                grid.set(x as i32, y as i32, kind);
            }
        }
        grid
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// World-space bounds of the whole map
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            self.origin,
            self.origin + Vec2::new(self.width as f32, self.height as f32) * TILE_SIZE,
        )
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            None
        } else {
            Some(y as usize * self.width as usize + x as usize)
        }
    }

    /// Set a cell; out-of-range writes are ignored
    pub fn set(&mut self, x: i32, y: i32, kind: TileKind) {
        if let Some(i) = self.index(x, y) {
            self.tiles[i] = kind;
        }
    }

    /// Kind of a cell by cell coordinate (outside the map is `Block`)
    #[inline]
    pub fn kind(&self, x: i32, y: i32) -> TileKind {
        self.index(x, y).map(|i| self.tiles[i]).unwrap_or(TileKind::Block)
    }

    /// Cell containing a world point
    #[inline]
    pub fn cell_of(&self, p: Vec2) -> Cell {
        let local = (p - self.origin) / TILE_SIZE;
        Cell {
            x: local.x.floor() as i32,
            y: local.y.floor() as i32,
        }
    }

    /// World-space box of a cell
    #[inline]
    pub fn cell_rect(&self, x: i32, y: i32) -> Aabb {
        let min = self.origin + Vec2::new(x as f32, y as f32) * TILE_SIZE;
        Aabb::new(min, min + Vec2::splat(TILE_SIZE))
    }

    /// Tile kind under a world-space point (outside the map is `Block`)
    pub fn tile_at(&self, x: f32, y: f32) -> TileKind {
        let cell = self.cell_of(Vec2::new(x, y));
        self.kind(cell.x, cell.y)
    }

    /// Whether a world-space point lies in solid geometry
    pub fn point_solid(&self, p: Vec2) -> bool {
        let cell = self.cell_of(p);
        let kind = self.kind(cell.x, cell.y);
        if kind.is_empty() {
            return false;
        }
        let local = p - self.cell_rect(cell.x, cell.y).min;
        kind.solid_at(local)
    }

    /// Inclusive cell range overlapped by `rect` (edges within epsilon excluded)
    pub fn cell_range(&self, rect: &Aabb) -> (Cell, Cell) {
        let eps = CONTACT_EPSILON;
        let lo = (rect.min + Vec2::splat(eps) - self.origin) / TILE_SIZE;
        let hi = (rect.max - Vec2::splat(eps) - self.origin) / TILE_SIZE;
        (
            Cell {
                x: lo.x.floor() as i32,
                y: lo.y.floor() as i32,
            },
            Cell {
                x: hi.x.ceil() as i32 - 1,
                y: hi.y.ceil() as i32 - 1,
            },
        )
    }

    /// Visit every cell overlapped by `rect` with its kind and world box
    pub fn for_each_cell(&self, rect: &Aabb, mut f: impl FnMut(Cell, TileKind, Aabb)) {
        let (lo, hi) = self.cell_range(rect);
        for y in lo.y..=hi.y {
            for x in lo.x..=hi.x {
                f(Cell { x, y }, self.kind(x, y), self.cell_rect(x, y));
            }
        }
    }

    /// Whether any solid geometry overlaps `rect`, honouring slope diagonals
    pub fn area_blocked(&self, rect: &Aabb) -> bool {
        self.area_blocked_where(rect, |_| true)
    }

    /// `area_blocked` restricted to tile kinds accepted by `filter`
    pub fn area_blocked_where(&self, rect: &Aabb, filter: impl Fn(TileKind) -> bool) -> bool {
        let (lo, hi) = self.cell_range(rect);
        for y in lo.y..=hi.y {
            for x in lo.x..=hi.x {
                let kind = self.kind(x, y);
                if kind.is_empty() || !filter(kind) {
                    continue;
                }
                let cell = self.cell_rect(x, y);
                let x0 = (rect.min.x - cell.min.x).max(0.0);
                let x1 = (rect.max.x - cell.min.x).min(TILE_SIZE);
                let y0 = (rect.min.y - cell.min.y).max(0.0);
                let y1 = (rect.max.y - cell.min.y).min(TILE_SIZE);
                if kind.box_overlaps(x0, x1, y0, y1) {
                    return true;
                }
            }
        }
        false
    }

    /// Highest walkable surface in the column at world `x`, scanning world
    /// `y_from..=y_to` downward. Returns `(world_y, kind)`.
    pub fn floor_in_column(&self, x: f32, y_from: f32, y_to: f32) -> Option<(f32, TileKind)> {
        let top = self.cell_of(Vec2::new(x, y_from));
        let bottom = self.cell_of(Vec2::new(x, y_to));
        for cy in top.y..=bottom.y {
            let kind = self.kind(top.x, cy);
            let cell = self.cell_rect(top.x, cy);
            let Some(h) = kind.floor_height(x - cell.min.x) else {
                continue;
            };
            let surface = cell.min.y + h;
            if surface > y_to {
                return None;
            }
            if surface >= y_from {
                return Some((surface, kind));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_grid() -> TileGrid {
        TileGrid::from_ascii(
            &[
                "......", //
                "...../", //
                "..../#", //
                "######", //
            ],
            Vec2::ZERO,
        )
    }

    #[test]
    fn test_out_of_bounds_is_block() {
        let grid = TileGrid::new(4, 4, Vec2::ZERO);
        assert_eq!(grid.tile_at(-1.0, 5.0), TileKind::Block);
        assert_eq!(grid.tile_at(5.0, 64.5), TileKind::Block);
        assert_eq!(grid.tile_at(5.0, 5.0), TileKind::Empty);
        assert!(grid.area_blocked(&Aabb::from_xywh(-4.0, 0.0, 8.0, 8.0)));
    }

    #[test]
    fn test_origin_offset() {
        let mut grid = TileGrid::new(4, 4, Vec2::new(0.0, 8.0));
        grid.set(0, 0, TileKind::Block);
        assert_eq!(grid.tile_at(1.0, 7.0), TileKind::Block); // above the map
        assert_eq!(grid.tile_at(1.0, 8.0), TileKind::Block);
        assert_eq!(grid.tile_at(1.0, 24.0), TileKind::Empty);
        assert_eq!(grid.cell_rect(1, 1).min, Vec2::new(16.0, 24.0));
    }

    #[test]
    fn test_flush_box_is_not_blocked() {
        let grid = ramp_grid();
        // Resting exactly on top of the bottom row
        let rect = Aabb::from_xywh(2.0, 32.0, 12.0, 16.0);
        assert!(!grid.area_blocked(&rect));
        assert!(grid.area_blocked(&rect.translated(Vec2::new(0.0, 0.5))));
    }

    #[test]
    fn test_slope_diagonal_area() {
        let grid = ramp_grid();
        // Cell (4, 2) is a bottom-right ramp spanning x 64..80, y 32..48
        // Small box near the low-left corner above the diagonal
        let above = Aabb::from_xywh(64.0, 40.0, 2.0, 2.0);
        assert!(!grid.area_blocked(&above));
        // Same height, further right, reaches below the diagonal
        let below = Aabb::from_xywh(76.0, 40.0, 2.0, 2.0);
        assert!(grid.area_blocked(&below));
    }

    #[test]
    fn test_point_solid_slopes() {
        let grid = TileGrid::from_ascii(&["/\\7F"], Vec2::ZERO);
        // bottom-right ramp: solid near bottom-right corner only
        assert!(grid.point_solid(Vec2::new(14.0, 14.0)));
        assert!(!grid.point_solid(Vec2::new(2.0, 2.0)));
        // bottom-left ramp
        assert!(grid.point_solid(Vec2::new(18.0, 14.0)));
        assert!(!grid.point_solid(Vec2::new(30.0, 2.0)));
        // top-right ceiling ramp
        assert!(grid.point_solid(Vec2::new(46.0, 2.0)));
        assert!(!grid.point_solid(Vec2::new(34.0, 14.0)));
        // top-left ceiling ramp
        assert!(grid.point_solid(Vec2::new(50.0, 2.0)));
        assert!(!grid.point_solid(Vec2::new(62.0, 14.0)));
    }

    #[test]
    fn test_floor_in_column_on_ramp() {
        let grid = ramp_grid();
        // Column x = 68 is 4 units into the bottom-right ramp (surface y = 32 + 12)
        let (y, kind) = grid.floor_in_column(68.0, 30.0, 60.0).unwrap();
        assert_eq!(kind, TileKind::SlopeBottomRight);
        assert!((y - 44.0).abs() < 1e-4);
        // Flat ground further left
        let (y, kind) = grid.floor_in_column(20.0, 30.0, 60.0).unwrap();
        assert_eq!(kind, TileKind::Block);
        assert_eq!(y, 48.0);
        // Nothing within range
        assert!(grid.floor_in_column(20.0, 0.0, 20.0).is_none());
    }

    #[test]
    fn test_ascii_round_trip_chars() {
        for c in ['.', '#', '/', '\\', '7', 'F'] {
            assert_eq!(TileKind::from_char(c).unwrap().to_char(), c);
        }
    }
}
