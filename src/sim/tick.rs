//! Fixed timestep simulation tick
//!
//! Core loop that advances the simulation deterministically. Per tick:
//! 1. Scratch cleared
//! 2. Input applied to hero intent (run, jump, gravity, hook commands)
//! 3. Hero moved against tiles and solids
//! 4. Rope relaxed; its tension is queued on the hero for the next tick
//! 5. Solids advance

use glam::Vec2;

use super::collision::CollisionQuery;
use super::mover::{ActorFlags, StepReport, gather_candidates};
use super::rope::HookState;
use super::state::SimContext;
use crate::approach;
use crate::consts::*;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickInput {
    /// Horizontal intent in `-1.0..=1.0`
    pub move_x: f32,
    /// Jump (only honoured while grounded)
    pub jump: bool,
    /// Fire the hook in this direction
    pub hook_fire: Option<Vec2>,
    /// Release the hook
    pub hook_cancel: bool,
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub step: StepReport,
    pub hook: HookState,
    /// Rope pull queued for the next tick
    pub tension: Vec2,
    /// A scratch scope from the previous frame was never released
    pub scratch_leaked: bool,
}

/// Advance the simulation by one fixed timestep
pub fn tick(ctx: &mut SimContext, input: &TickInput, dt: f32) -> TickReport {
    let mut report = TickReport {
        scratch_leaked: ctx.scratch.clear().is_err(),
        ..Default::default()
    };

    apply_intent(ctx, input, dt);

    let SimContext {
        grid,
        solids,
        rope,
        scratch,
        hero,
        mover,
        ..
    } = ctx;

    // Move the hero with a broad phase gathered into scratch
    report.step = {
        let bounds = mover.broad_bounds(hero, solids, dt);
        let base = CollisionQuery::new(grid, solids);
        let mut scope = scratch.scope();
        let query = match gather_candidates(&base, &bounds, &mut scope) {
            Some(list) => base.with_candidates(list),
            None => base,
        };
        mover.step(hero, &query, dt)
    };

    // Rope pull lands on the following tick's step
    report.tension = {
        let mut scope = scratch.scope();
        rope.update(dt, grid, hero.pos, &mut scope)
    };
    hero.apply_force(report.tension);
    report.hook = rope.state();

    for (_, solid) in solids.iter_mut() {
        solid.advance(dt);
    }

    ctx.time_ticks += 1;
    report
}

/// Turn input into hero velocity and hook commands
fn apply_intent(ctx: &mut SimContext, input: &TickInput, dt: f32) {
    let settings = &ctx.settings;
    let hero = &mut ctx.hero;
    let grounded = hero.is_grounded();

    let target = input.move_x.clamp(-1.0, 1.0) * settings.run_speed;
    let accel = if grounded {
        settings.ground_accel
    } else {
        settings.air_accel
    };
    hero.vel.x = approach(hero.vel.x, target, accel * dt);

    if input.jump && grounded {
        hero.vel.y = -settings.jump_speed;
    }
    if !hero.flags.contains(ActorFlags::CLIMBING) {
        hero.vel.y = (hero.vel.y + settings.gravity * dt).min(settings.max_fall_speed);
    }

    if input.hook_cancel {
        ctx.rope.cancel();
    }
    if let Some(dir) = input.hook_fire {
        if !ctx.rope.start(hero.pos, dir) {
            log::debug!("Hook fire ignored while {}", ctx.rope.state().as_str());
        }
    }
}

/// Host-frame to fixed-tick adapter
#[derive(Debug, Clone, Default)]
pub struct FixedStep {
    accumulator: f32,
}

impl FixedStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `elapsed` seconds of wall time and run `f` once per whole tick.
    /// Frame time is clamped to `MAX_FRAME_TIME`; at most `MAX_SUBSTEPS`
    /// ticks run and any remaining backlog is dropped. Returns ticks run.
    pub fn advance(&mut self, elapsed: f32, mut f: impl FnMut(f32)) -> u32 {
        self.accumulator += elapsed.clamp(0.0, MAX_FRAME_TIME);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            f(SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;
        }

        if self.accumulator >= SIM_DT {
            log::debug!(
                "Dropping {:.1} ms of simulation backlog",
                self.accumulator * 1000.0
            );
            self.accumulator %= SIM_DT;
        }
        substeps
    }

    /// Fraction of a tick left in the accumulator (for render interpolation)
    pub fn alpha(&self) -> f32 {
        self.accumulator / SIM_DT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PhysicsSettings;
    use crate::sim::aabb::Aabb;
    use crate::sim::collision::Solid;
    use crate::sim::registry::ObjectHandle;
    use crate::sim::tile::TileGrid;

    fn context() -> SimContext {
        let grid = TileGrid::from_ascii(
            &[
                "####################", //
                "#..................#", //
                "#..................#", //
                "#..................#", //
                "#..................#", //
                "####################", //
            ],
            Vec2::ZERO,
        );
        SimContext::new(PhysicsSettings::default(), grid, Vec2::new(40.0, 40.0))
    }

    fn settle(ctx: &mut SimContext) {
        for _ in 0..30 {
            tick(ctx, &TickInput::default(), SIM_DT);
        }
    }

    #[test]
    fn test_hero_falls_and_lands() {
        let mut ctx = context();
        let mut landed = false;
        for _ in 0..30 {
            landed |= tick(&mut ctx, &TickInput::default(), SIM_DT).step.landed;
        }
        assert!(landed);
        assert!(ctx.hero.is_grounded());
        assert!((ctx.hero.feet() - 80.0).abs() < 1e-3);
        assert_eq!(ctx.time_ticks, 30);
    }

    #[test]
    fn test_run_and_jump() {
        let mut ctx = context();
        settle(&mut ctx);
        let start_x = ctx.hero.pos.x;

        let run = TickInput {
            move_x: 1.0,
            ..Default::default()
        };
        for _ in 0..20 {
            tick(&mut ctx, &run, SIM_DT);
        }
        assert!(ctx.hero.pos.x > start_x);

        let jump = TickInput {
            jump: true,
            ..Default::default()
        };
        tick(&mut ctx, &jump, SIM_DT);
        assert!(!ctx.hero.is_grounded());
        assert!(ctx.hero.vel.y < 0.0);
    }

    #[test]
    fn test_hook_fires_attaches_and_pulls() {
        let mut ctx = context();
        settle(&mut ctx);

        let fire = TickInput {
            hook_fire: Some(Vec2::new(1.0, -1.0)),
            ..Default::default()
        };
        let mut report = tick(&mut ctx, &fire, SIM_DT);
        for _ in 0..20 {
            if report.hook == HookState::Attached {
                break;
            }
            report = tick(&mut ctx, &TickInput::default(), SIM_DT);
        }
        assert_eq!(report.hook, HookState::Attached);

        // Walking away from the anchor stretches the chain
        let away = TickInput {
            move_x: -1.0,
            ..Default::default()
        };
        let mut pulled = false;
        for _ in 0..60 {
            let r = tick(&mut ctx, &away, SIM_DT);
            pulled |= r.tension.x > 0.0;
        }
        assert!(pulled);

        let cancel = TickInput {
            hook_cancel: true,
            ..Default::default()
        };
        assert_eq!(tick(&mut ctx, &cancel, SIM_DT).hook, HookState::Retracting);
        for _ in 0..30 {
            tick(&mut ctx, &TickInput::default(), SIM_DT);
        }
        assert_eq!(ctx.rope.state(), HookState::Idle);
    }

    #[test]
    fn test_solids_advance_after_hero() {
        let mut ctx = context();
        let handle = ObjectHandle(1);
        ctx.add_solid(
            handle,
            Solid::moving(Aabb::from_xywh(200.0, 32.0, 16.0, 8.0), Vec2::new(-60.0, 0.0)),
        );
        tick(&mut ctx, &TickInput::default(), SIM_DT);
        let solid = ctx.solids.get(handle).unwrap();
        assert!((solid.rect.min.x - 199.0).abs() < 1e-3);
    }

    #[test]
    fn test_scratch_leak_reported_next_tick() {
        let mut ctx = context();
        std::mem::forget(ctx.scratch.scope());
        assert!(tick(&mut ctx, &TickInput::default(), SIM_DT).scratch_leaked);
        assert!(!tick(&mut ctx, &TickInput::default(), SIM_DT).scratch_leaked);
    }

    #[test]
    fn test_determinism() {
        let mut a = context();
        let mut b = context();
        let inputs = [
            TickInput {
                move_x: 1.0,
                ..Default::default()
            },
            TickInput {
                jump: true,
                hook_fire: Some(Vec2::new(0.5, -1.0)),
                ..Default::default()
            },
            TickInput::default(),
            TickInput {
                move_x: -0.5,
                hook_cancel: true,
                ..Default::default()
            },
        ];
        for _ in 0..20 {
            for input in &inputs {
                tick(&mut a, input, SIM_DT);
                tick(&mut b, input, SIM_DT);
            }
        }
        assert_eq!(a.hero, b.hero);
        assert_eq!(a.rope.nodes(), b.rope.nodes());
    }

    #[test]
    fn test_fixed_step_runs_whole_ticks() {
        let mut stepper = FixedStep::new();
        let mut ticks = 0;
        assert_eq!(stepper.advance(SIM_DT * 0.5, |_| ticks += 1), 0);
        assert_eq!(stepper.advance(SIM_DT * 0.75, |_| ticks += 1), 1);
        assert_eq!(ticks, 1);
        assert!((stepper.alpha() - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_fixed_step_caps_and_drops_backlog() {
        let mut stepper = FixedStep::new();
        let mut ticks = 0;
        // A long stall is clamped and capped
        assert_eq!(stepper.advance(5.0, |_| ticks += 1), MAX_SUBSTEPS);
        assert!(stepper.alpha() < 1.0);
        assert_eq!(stepper.advance(-1.0, |_| ticks += 1), 0);
        assert_eq!(ticks, MAX_SUBSTEPS);
    }
}
