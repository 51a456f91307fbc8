//! Axis-aligned bounding boxes
//!
//! Boxes are half-open in practice: two boxes that only share an edge do not
//! overlap, so an actor resting flush on a tile is not "inside" it.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned box in world space (y-down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(x + w, y + h),
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Strict overlap test (shared edges do not count)
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Overlap test with `eps` of forgiveness on every side
    #[inline]
    pub fn intersects_with_slack(&self, other: &Aabb, eps: f32) -> bool {
        self.min.x < other.max.x - eps
            && self.max.x > other.min.x + eps
            && self.min.y < other.max.y - eps
            && self.max.y > other.min.y + eps
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    #[inline]
    pub fn translated(&self, offset: Vec2) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box covering every position between here and `self + offset`
    pub fn swept(&self, offset: Vec2) -> Aabb {
        self.union(&self.translated(offset))
    }

    /// Raise the bottom edge by `amount` (never past the top)
    pub fn trim_bottom(&self, amount: f32) -> Aabb {
        Aabb {
            min: self.min,
            max: Vec2::new(self.max.x, (self.max.y - amount).max(self.min.y)),
        }
    }

    /// Penetration vector that pushes `self` out of `other` along the
    /// shallowest axis, or `None` when they do not overlap
    pub fn penetration(&self, other: &Aabb) -> Option<Vec2> {
        if !self.intersects(other) {
            return None;
        }
        let push_left = other.min.x - self.max.x;
        let push_right = other.max.x - self.min.x;
        let push_up = other.min.y - self.max.y;
        let push_down = other.max.y - self.min.y;

        let px = if push_right < -push_left { push_right } else { push_left };
        let py = if push_down < -push_up { push_down } else { push_up };
        if px.abs() < py.abs() {
            Some(Vec2::new(px, 0.0))
        } else {
            Some(Vec2::new(0.0, py))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_edge_is_not_overlap() {
        let a = Aabb::from_xywh(0.0, 0.0, 16.0, 16.0);
        let b = Aabb::from_xywh(16.0, 0.0, 16.0, 16.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&b.translated(Vec2::new(-0.5, 0.0))));
    }

    #[test]
    fn test_center_round_trip() {
        let a = Aabb::from_center(Vec2::new(100.0, 112.0), Vec2::splat(8.0));
        assert_eq!(a.min, Vec2::new(92.0, 104.0));
        assert_eq!(a.center(), Vec2::new(100.0, 112.0));
        assert_eq!(a.half_extents(), Vec2::splat(8.0));
    }

    #[test]
    fn test_swept_covers_both_ends() {
        let a = Aabb::from_xywh(0.0, 0.0, 4.0, 4.0);
        let s = a.swept(Vec2::new(10.0, -2.0));
        assert_eq!(s.min, Vec2::new(0.0, -2.0));
        assert_eq!(s.max, Vec2::new(14.0, 4.0));
    }

    #[test]
    fn test_penetration_picks_shallow_axis() {
        let a = Aabb::from_xywh(0.0, 0.0, 10.0, 10.0);
        let floor = Aabb::from_xywh(-50.0, 8.0, 100.0, 10.0);
        let push = a.penetration(&floor).unwrap();
        assert_eq!(push, Vec2::new(0.0, -2.0));
        assert!(a.penetration(&floor.translated(Vec2::new(0.0, 5.0))).is_none());
    }

    #[test]
    fn test_trim_bottom_never_inverts() {
        let a = Aabb::from_xywh(0.0, 0.0, 4.0, 4.0);
        assert_eq!(a.trim_bottom(1.0).max.y, 3.0);
        assert_eq!(a.trim_bottom(10.0).max.y, 0.0);
    }
}
