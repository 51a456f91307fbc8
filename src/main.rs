//! Hookshot entry point
//!
//! Runs the simulation headless on the chosen backend over a demo map,
//! logging hero and hook state as it goes.
//!
//! Usage: `hookshot [--backend simulator|handheld] [--settings FILE]
//! [--frames N] [--seed N]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Hookshot (native) starting...");

    let options = match demo::Options::from_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };
    demo::run(&options);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The device build links the library into its own runtime
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use glam::Vec2;

    use hookshot::consts::*;
    use hookshot::platform::{BackendKind, create_backend, parse_backend};
    use hookshot::sim::{
        Aabb, FixedStep, ObjectHandle, SimContext, Solid, TickInput, TileGrid, tick,
    };
    use hookshot::{PhysicsSettings, Profile};

    const DEMO_MAP: &[&str] = &[
        "##############################",
        "#............................#",
        "#............................#",
        "#.......#####.........F#7....#",
        "#............................#",
        "#............................#",
        "#.................../####....#",
        "#................../#####....#",
        "#......#........../######....#",
        "#......#\\......../#######....#",
        "##############################",
    ];

    const SPAWN: Vec2 = Vec2::new(40.0, 140.0);
    const PLATFORM: ObjectHandle = ObjectHandle(1);
    /// Horizontal range the demo platform patrols
    const PLATFORM_RANGE: (f32, f32) = (160.0, 280.0);

    pub struct Options {
        pub backend: BackendKind,
        pub settings_path: Option<String>,
        pub frames: u64,
        pub seed: u64,
    }

    impl Options {
        pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
            let mut options = Options {
                backend: BackendKind::Simulator,
                settings_path: None,
                frames: 600,
                seed: 0x5eed,
            };
            while let Some(arg) = args.next() {
                let mut value = || args.next().ok_or_else(|| format!("missing value for {}", arg));
                match arg.as_str() {
                    "--backend" => {
                        options.backend = parse_backend(&value()?).map_err(|e| e.to_string())?
                    }
                    "--settings" => options.settings_path = Some(value()?),
                    "--frames" => {
                        options.frames = value()?.parse().map_err(|e| format!("--frames: {}", e))?
                    }
                    "--seed" => {
                        options.seed = value()?.parse().map_err(|e| format!("--seed: {}", e))?
                    }
                    other => return Err(format!("unknown argument `{}`", other)),
                }
            }
            Ok(options)
        }
    }

    fn load_settings(options: &Options) -> PhysicsSettings {
        let profile = match options.backend {
            BackendKind::Handheld => Profile::Handheld,
            BackendKind::Simulator => Profile::Desktop,
        };
        match &options.settings_path {
            Some(path) => PhysicsSettings::load_or_default(path, profile),
            None => PhysicsSettings::from_profile(profile),
        }
    }

    /// Object-system stand-in: turn the platform around at the ends of its run
    fn patrol(ctx: &mut SimContext) {
        if let Some(platform) = ctx.solids.get_mut(PLATFORM) {
            let (lo, hi) = PLATFORM_RANGE;
            if (platform.rect.min.x <= lo && platform.velocity.x < 0.0)
                || (platform.rect.max.x >= hi && platform.velocity.x > 0.0)
            {
                platform.velocity.x = -platform.velocity.x;
            }
        }
    }

    pub fn run(options: &Options) {
        let settings = load_settings(options);
        let grid = TileGrid::from_ascii(DEMO_MAP, Vec2::ZERO);
        let mut ctx = SimContext::new(settings, grid, SPAWN);
        ctx.add_solid(
            PLATFORM,
            Solid::moving(Aabb::from_xywh(200.0, 104.0, 32.0, 8.0), Vec2::new(40.0, 0.0)),
        );

        let mut backend = create_backend(options.backend, options.seed);
        if let Err(e) = backend.audio_init() {
            log::warn!("Audio unavailable: {}", e);
        }

        let mut stepper = FixedStep::new();
        let mut landings = 0u32;
        let mut embedded_ticks = 0u32;

        for frame in 0..options.frames {
            let mut input = backend.input_poll();
            stepper.advance(SIM_DT, |dt| {
                let report = tick(&mut ctx, &input, dt);
                patrol(&mut ctx);
                landings += u32::from(report.step.landed);
                embedded_ticks += u32::from(report.step.embedded);
                // One-shot commands apply to the first tick only
                input = TickInput {
                    move_x: input.move_x,
                    ..Default::default()
                };
            });

            backend.draw_begin();
            backend.draw_end();
            backend.flip();
            if ctx.scratch.clear().is_err() {
                log::error!("Scratch scope leaked during frame {}", frame);
            }

            if frame % 60 == 0 {
                log::info!(
                    "frame {:>5}: hero ({:>6.1}, {:>6.1}) vel ({:>6.1}, {:>6.1}) {:?} hook {}",
                    frame,
                    ctx.hero.pos.x,
                    ctx.hero.pos.y,
                    ctx.hero.vel.x,
                    ctx.hero.vel.y,
                    ctx.hero.flags,
                    ctx.rope.state().as_str()
                );
            }
        }

        log::info!(
            "Done: {} frames, {} ticks, {} landings, {} embedded, scratch peak {}/{} bytes",
            backend.frames(),
            ctx.time_ticks,
            landings,
            embedded_ticks,
            ctx.scratch.peak_bytes(),
            ctx.scratch.capacity_bytes()
        );
    }
}
