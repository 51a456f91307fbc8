//! Actor movement integrator
//!
//! Resolves one tick of actor velocity against the tile grid and live solids:
//! - X then Y, each axis swept to first contact (contact zeroes that axis)
//! - Sub-stepping when the displacement is longer than `max_step_distance`
//! - Feet follow floor ramps at the box's horizontal center
//! - Riding moving platforms (carry applied after resolution)
//!
//! The mover never fails. An actor that starts the step inside geometry is
//! left where it is so gameplay can decide what to do with it.

use bitflags::bitflags;
use glam::Vec2;

use super::aabb::Aabb;
use super::collision::{CollisionQuery, Ground, Solid, Support};
use super::registry::{ObjectHandle, ObjectRegistry};
use super::scratch::ScratchScope;
use crate::settings::PhysicsSettings;

/// How far above/below the feet the end-of-step probe looks for support
const GROUND_PROBE: f32 = 0.05;

bitflags! {
    /// Contact and mode flags of an actor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActorFlags: u8 {
        const GROUNDED = 1 << 0;
        const CLIMBING = 1 << 1;
        const SWIMMING = 1 << 2;
        const CARRIED = 1 << 3;
        const ON_SLOPE = 1 << 4;
    }
}

impl ActorFlags {
    /// Flags the mover derives from contact state; the rest belong to gameplay
    pub const CONTACT: ActorFlags = ActorFlags::GROUNDED
        .union(ActorFlags::CARRIED)
        .union(ActorFlags::ON_SLOPE);
}

/// A moving box driven by the mover
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    /// Box center
    pub pos: Vec2,
    pub half: Vec2,
    /// Units per second
    pub vel: Vec2,
    pub flags: ActorFlags,
    /// Solid the actor is riding, `NONE` when not carried
    pub carrier: ObjectHandle,
    /// Acceleration consumed by the next step (rope tension)
    pub pending_force: Vec2,
}

impl Actor {
    pub fn new(pos: Vec2, half: Vec2) -> Self {
        Self {
            pos,
            half,
            vel: Vec2::ZERO,
            flags: ActorFlags::empty(),
            carrier: ObjectHandle::NONE,
            pending_force: Vec2::ZERO,
        }
    }

    #[inline]
    pub fn rect(&self) -> Aabb {
        Aabb::from_center(self.pos, self.half)
    }

    /// World y of the bottom edge
    #[inline]
    pub fn feet(&self) -> f32 {
        self.pos.y + self.half.y
    }

    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.flags.contains(ActorFlags::GROUNDED)
    }

    /// Queue an acceleration for the next step
    pub fn apply_force(&mut self, force: Vec2) {
        self.pending_force += force;
    }

    fn clear_contact(&mut self) {
        self.flags.remove(ActorFlags::CONTACT);
        self.carrier = ObjectHandle::NONE;
    }
}

/// Contact events from one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub hit_wall: bool,
    pub hit_ceiling: bool,
    /// Became grounded this step
    pub landed: bool,
    /// Started inside geometry; nothing moved
    pub embedded: bool,
    pub substeps: u32,
}

/// Per-tick integrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorMover {
    pub max_step_distance: f32,
    pub max_substeps: u32,
    pub slope_tolerance: f32,
}

impl Default for ActorMover {
    fn default() -> Self {
        Self::from_settings(&PhysicsSettings::default())
    }
}

impl ActorMover {
    pub fn from_settings(settings: &PhysicsSettings) -> Self {
        Self {
            max_step_distance: settings.max_step_distance,
            max_substeps: settings.max_substeps.max(1),
            slope_tolerance: settings.slope_tolerance,
        }
    }

    /// Height at the bottom of the box that slope footing may overlap
    #[inline]
    fn slope_allowance(&self, actor: &Actor) -> f32 {
        actor.half.x + self.slope_tolerance
    }

    /// Box covering everything a step of `actor` can touch
    pub fn broad_bounds(&self, actor: &Actor, solids: &ObjectRegistry<Solid>, dt: f32) -> Aabb {
        let mut reach = (actor.vel + actor.pending_force * dt) * dt;
        if let Some(carrier) = solids.get(actor.carrier) {
            reach += carrier.displacement(dt);
        }
        let margin = Vec2::splat(self.max_step_distance + self.slope_allowance(actor));
        let swept = actor.rect().swept(reach);
        Aabb::new(swept.min - margin, swept.max + margin)
    }

    /// Whether any part of `actor` overlaps blocks or solids. Floor ramp
    /// cells do not count; feet sink into them while corners overhang.
    pub fn is_embedded(&self, actor: &Actor, query: &CollisionQuery<'_>) -> bool {
        query.hard_blocked(&actor.rect())
    }

    /// Advance `actor` by one tick
    pub fn step(&self, actor: &mut Actor, query: &CollisionQuery<'_>, dt: f32) -> StepReport {
        let mut report = StepReport::default();

        if self.is_embedded(actor, query) {
            log::debug!("Actor embedded at ({:.1}, {:.1})", actor.pos.x, actor.pos.y);
            actor.clear_contact();
            actor.pending_force = Vec2::ZERO;
            report.embedded = true;
            return report;
        }

        actor.vel += actor.pending_force * dt;
        actor.pending_force = Vec2::ZERO;

        let was_grounded = actor.is_grounded();
        let mut grounded = was_grounded;
        let mut on_slope = actor.flags.contains(ActorFlags::ON_SLOPE);
        let allowance = self.slope_allowance(actor);
        let slope_reach = self.max_step_distance + self.slope_tolerance;

        let disp = actor.vel * dt;
        let longest = disp.x.abs().max(disp.y.abs());
        let substeps =
            ((longest / self.max_step_distance).ceil() as u32).clamp(1, self.max_substeps);
        let step = disp / substeps as f32;
        report.substeps = substeps;

        let mut blocked_x = false;
        let mut blocked_y = false;

        for _ in 0..substeps {
            // Horizontal
            if !blocked_x && step.x != 0.0 {
                let start = actor.pos;
                let step_up = if grounded && on_slope { allowance } else { 0.0 };
                let sweep = query.sweep_x(&actor.rect(), step.x, step_up);
                actor.pos.x += sweep.distance;
                if sweep.hit {
                    blocked_x = true;
                    actor.vel.x = 0.0;
                    report.hit_wall = true;
                }

                // Keep feet on the ground while walking over ramps and ledges
                if grounded && step.y >= 0.0 && sweep.distance != 0.0 {
                    let reach = sweep.distance.abs() + self.slope_tolerance;
                    // Up far enough to reach a ledge at the top of a ramp
                    match query.ground_probe(&actor.rect(), reach.max(allowance), reach) {
                        Some(ground) => {
                            let snapped = Vec2::new(actor.pos.x, ground.y - actor.half.y);
                            if query.hard_blocked(&Aabb::from_center(snapped, actor.half)) {
                                actor.pos = start;
                                blocked_x = true;
                                actor.vel.x = 0.0;
                                report.hit_wall = true;
                            } else {
                                actor.pos = snapped;
                                on_slope = ground.is_slope();
                            }
                        }
                        None => {
                            grounded = false;
                            on_slope = false;
                        }
                    }
                }
            }

            // Vertical
            if !blocked_y && step.y != 0.0 {
                let sweep = query.sweep_y(&actor.rect(), step.y, slope_reach);
                actor.pos.y += sweep.distance;
                if sweep.hit {
                    blocked_y = true;
                    if step.y > 0.0 {
                        grounded = true;
                        actor.vel.y = actor.vel.y.min(0.0);
                    } else {
                        report.hit_ceiling = true;
                        actor.vel.y = actor.vel.y.max(0.0);
                    }
                } else if step.y < 0.0 {
                    grounded = false;
                    on_slope = false;
                }
            }
        }

        let mut ground = self.settle(actor, query);

        // Ride the platform underfoot
        if let Some(handle) = ground.and_then(|g| g.solid()) {
            if let Some(carrier) = query.solids.get(handle).filter(|s| s.is_dynamic()) {
                let carry = carrier.displacement(dt);
                let riding = query.ignoring(handle);
                let sweep = riding.sweep_x(&actor.rect(), carry.x, 0.0);
                actor.pos.x += sweep.distance;
                let sweep = riding.sweep_y(&actor.rect(), carry.y, 0.0);
                actor.pos.y += sweep.distance;
                if sweep.hit && carry.y < 0.0 {
                    report.hit_ceiling = true;
                }
                // Footing is re-read where the platform will be after it moves
                ground = Some(Ground {
                    y: carrier.rect.min.y + carry.y,
                    support: Support::Solid(handle),
                });
            }
        }

        self.apply_contact(actor, ground);
        report.landed = !was_grounded && actor.is_grounded();
        report
    }

    /// Final support under the actor, if it is not moving up
    fn settle(&self, actor: &Actor, query: &CollisionQuery<'_>) -> Option<Ground> {
        if actor.vel.y < 0.0 {
            return None;
        }
        query.ground_probe(&actor.rect(), GROUND_PROBE, GROUND_PROBE)
    }

    fn apply_contact(&self, actor: &mut Actor, ground: Option<Ground>) {
        actor.clear_contact();
        let Some(ground) = ground else {
            return;
        };
        actor.flags.insert(ActorFlags::GROUNDED);
        if ground.is_slope() {
            actor.flags.insert(ActorFlags::ON_SLOPE);
        }
        if let Some(handle) = ground.solid() {
            actor.flags.insert(ActorFlags::CARRIED);
            actor.carrier = handle;
        }
    }
}

/// Broad phase: collect solids overlapping `bounds` into scratch memory.
/// `None` when the scratch arena cannot hold the list.
pub fn gather_candidates<'s>(
    query: &CollisionQuery<'_>,
    bounds: &Aabb,
    scope: &mut ScratchScope<'s>,
) -> Option<&'s [ObjectHandle]> {
    let buf = scope.alloc::<ObjectHandle>(query.solids.count())?;
    let n = query.overlapping_solids(bounds, buf);
    Some(&buf[..n])
}
