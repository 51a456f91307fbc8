//! Platform abstraction layer
//!
//! The simulation never touches hardware. One `Backend` is chosen at startup
//! and drives input polling, frame presentation and audio bring-up:
//! - `HandheldBackend`: decodes the device pad register
//! - `SimulatorBackend`: desktop fallback with scripted and seeded demo input

use std::collections::VecDeque;

use bitflags::bitflags;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use thiserror::Error;

use crate::sim::TickInput;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("audio already initialised")]
    AudioAlreadyInitialised,
    #[error("unknown backend `{0}`")]
    UnknownBackend(String),
}

bitflags! {
    /// Pad buttons, one bit each as laid out in the pad register
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u16 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const JUMP = 1 << 4;
        /// Hold to grapple, release to reel in
        const HOOK = 1 << 5;
        const START = 1 << 6;
    }
}

/// Which backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    Handheld,
    #[default]
    Simulator,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Handheld => "handheld",
            BackendKind::Simulator => "simulator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "handheld" | "device" => Some(BackendKind::Handheld),
            "simulator" | "sim" | "desktop" => Some(BackendKind::Simulator),
            _ => None,
        }
    }
}

/// Host services the frame loop needs
pub trait Backend {
    fn kind(&self) -> BackendKind;
    /// Bring up audio output. Fails if called twice.
    fn audio_init(&mut self) -> Result<(), PlatformError>;
    /// Sample input for the next tick
    fn input_poll(&mut self) -> TickInput;
    fn draw_begin(&mut self);
    fn draw_end(&mut self);
    /// Present the finished frame
    fn flip(&mut self);
    /// Frames presented so far
    fn frames(&self) -> u64;
}

/// Turns held buttons into per-tick commands (edge detection, aim)
#[derive(Debug, Clone)]
pub struct PadDecoder {
    prev: Buttons,
    /// Last horizontal direction moved (`1.0` or `-1.0`)
    facing: f32,
}

impl Default for PadDecoder {
    fn default() -> Self {
        Self {
            prev: Buttons::empty(),
            facing: 1.0,
        }
    }
}

impl PadDecoder {
    pub fn decode(&mut self, held: Buttons) -> TickInput {
        let pressed = held & !self.prev;
        let released = self.prev & !held;
        self.prev = held;

        let axis = |neg: Buttons, pos: Buttons| {
            f32::from(u8::from(held.contains(pos))) - f32::from(u8::from(held.contains(neg)))
        };
        let move_x = axis(Buttons::LEFT, Buttons::RIGHT);
        let aim_y = axis(Buttons::UP, Buttons::DOWN);
        if move_x != 0.0 {
            self.facing = move_x;
        }

        // Default aim is up and forward
        let hook_fire = pressed.contains(Buttons::HOOK).then(|| {
            if move_x == 0.0 && aim_y == 0.0 {
                Vec2::new(self.facing, -1.0)
            } else {
                Vec2::new(move_x, aim_y)
            }
        });

        TickInput {
            move_x,
            jump: pressed.contains(Buttons::JUMP),
            hook_fire,
            hook_cancel: released.contains(Buttons::HOOK),
        }
    }
}

/// Draw/flip bookkeeping shared by both backends
#[derive(Debug, Default)]
struct FrameState {
    drawing: bool,
    frames: u64,
}

impl FrameState {
    fn begin(&mut self) {
        if self.drawing {
            log::warn!("draw_begin called twice in frame {}", self.frames);
        }
        self.drawing = true;
    }

    fn end(&mut self) {
        if !self.drawing {
            log::warn!("draw_end without draw_begin in frame {}", self.frames);
        }
        self.drawing = false;
    }

    fn flip(&mut self) {
        if self.drawing {
            log::warn!("flip during draw in frame {}", self.frames);
            self.drawing = false;
        }
        self.frames += 1;
    }
}

/// Reader for the 16-bit pad register
pub type PadReader = Box<dyn FnMut() -> u16>;

/// Handheld device backend. The pad register is active-low: a pressed
/// button reads as a cleared bit.
pub struct HandheldBackend {
    read_pad: PadReader,
    decoder: PadDecoder,
    frame: FrameState,
    audio_ready: bool,
}

impl HandheldBackend {
    pub fn new(read_pad: PadReader) -> Self {
        Self {
            read_pad,
            decoder: PadDecoder::default(),
            frame: FrameState::default(),
            audio_ready: false,
        }
    }

    /// Buttons currently held
    pub fn held(&mut self) -> Buttons {
        Buttons::from_bits_truncate(!(self.read_pad)())
    }
}

impl Backend for HandheldBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Handheld
    }

    fn audio_init(&mut self) -> Result<(), PlatformError> {
        if self.audio_ready {
            return Err(PlatformError::AudioAlreadyInitialised);
        }
        self.audio_ready = true;
        log::info!("Handheld audio initialised");
        Ok(())
    }

    fn input_poll(&mut self) -> TickInput {
        let held = self.held();
        self.decoder.decode(held)
    }

    fn draw_begin(&mut self) {
        self.frame.begin();
    }

    fn draw_end(&mut self) {
        self.frame.end();
    }

    fn flip(&mut self) {
        self.frame.flip();
    }

    fn frames(&self) -> u64 {
        self.frame.frames
    }
}

/// Frames a demo input pattern is held for
const DEMO_HOLD_FRAMES: u32 = 30;

/// Desktop simulator backend. Plays queued input first, then (if enabled)
/// seeded pseudo-random demo input so runs are reproducible.
pub struct SimulatorBackend {
    script: VecDeque<Buttons>,
    rng: Pcg32,
    demo: bool,
    demo_held: Buttons,
    demo_frames_left: u32,
    decoder: PadDecoder,
    frame: FrameState,
    audio_ready: bool,
}

impl SimulatorBackend {
    pub fn new(seed: u64, demo: bool) -> Self {
        Self {
            script: VecDeque::new(),
            rng: Pcg32::seed_from_u64(seed),
            demo,
            demo_held: Buttons::empty(),
            demo_frames_left: 0,
            decoder: PadDecoder::default(),
            frame: FrameState::default(),
            audio_ready: false,
        }
    }

    /// Queue held-button states, one per poll
    pub fn push_script(&mut self, frames: impl IntoIterator<Item = Buttons>) {
        self.script.extend(frames);
    }

    pub fn script_len(&self) -> usize {
        self.script.len()
    }

    fn demo_buttons(&mut self) -> Buttons {
        if self.demo_frames_left == 0 {
            self.demo_frames_left = DEMO_HOLD_FRAMES;
            self.demo_held = match self.rng.random_range(0..6) {
                0 => Buttons::empty(),
                1 => Buttons::LEFT,
                2 => Buttons::RIGHT,
                3 => Buttons::RIGHT | Buttons::JUMP,
                4 => Buttons::LEFT | Buttons::JUMP,
                _ => Buttons::HOOK,
            };
            if self.rng.random_bool(0.25) {
                self.demo_held |= Buttons::UP;
            }
        }
        self.demo_frames_left -= 1;
        // Jump is edge-triggered; only press it on the first frame of a hold
        if self.demo_frames_left + 1 < DEMO_HOLD_FRAMES {
            self.demo_held - Buttons::JUMP
        } else {
            self.demo_held
        }
    }
}

impl Backend for SimulatorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulator
    }

    fn audio_init(&mut self) -> Result<(), PlatformError> {
        if self.audio_ready {
            return Err(PlatformError::AudioAlreadyInitialised);
        }
        self.audio_ready = true;
        log::info!("Simulator audio disabled (headless)");
        Ok(())
    }

    fn input_poll(&mut self) -> TickInput {
        let held = match self.script.pop_front() {
            Some(held) => held,
            None if self.demo => self.demo_buttons(),
            None => Buttons::empty(),
        };
        self.decoder.decode(held)
    }

    fn draw_begin(&mut self) {
        self.frame.begin();
    }

    fn draw_end(&mut self) {
        self.frame.end();
    }

    fn flip(&mut self) {
        self.frame.flip();
    }

    fn frames(&self) -> u64 {
        self.frame.frames
    }
}

/// Build the backend for `kind`. The handheld pad reader is supplied by the
/// device glue; without one the pad reads as released.
pub fn create_backend(kind: BackendKind, seed: u64) -> Box<dyn Backend> {
    log::info!("Using {} backend", kind.as_str());
    match kind {
        BackendKind::Handheld => Box::new(HandheldBackend::new(Box::new(|| u16::MAX))),
        BackendKind::Simulator => Box::new(SimulatorBackend::new(seed, true)),
    }
}

/// Parse a backend name, e.g. from the command line
pub fn parse_backend(name: &str) -> Result<BackendKind, PlatformError> {
    BackendKind::from_str(name).ok_or_else(|| PlatformError::UnknownBackend(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_decoder_edges() {
        let mut pad = PadDecoder::default();
        let input = pad.decode(Buttons::RIGHT | Buttons::JUMP);
        assert_eq!(input.move_x, 1.0);
        assert!(input.jump);

        // Held jump does not repeat
        let input = pad.decode(Buttons::RIGHT | Buttons::JUMP);
        assert!(!input.jump);

        let input = pad.decode(Buttons::HOOK);
        assert_eq!(input.hook_fire, Some(Vec2::new(1.0, -1.0)));
        assert!(pad.decode(Buttons::HOOK).hook_fire.is_none());

        let input = pad.decode(Buttons::empty());
        assert!(input.hook_cancel);
    }

    #[test]
    fn test_decoder_aims_with_dpad() {
        let mut pad = PadDecoder::default();
        pad.decode(Buttons::LEFT);
        let input = pad.decode(Buttons::empty() | Buttons::HOOK | Buttons::UP);
        assert_eq!(input.hook_fire, Some(Vec2::new(0.0, -1.0)));

        pad.decode(Buttons::empty());
        // Facing is remembered for the default aim
        let input = pad.decode(Buttons::HOOK);
        assert_eq!(input.hook_fire, Some(Vec2::new(-1.0, -1.0)));
    }

    #[test]
    fn test_handheld_reads_active_low_register() {
        let register = Rc::new(Cell::new(u16::MAX));
        let reader = Rc::clone(&register);
        let mut backend = HandheldBackend::new(Box::new(move || reader.get()));
        assert_eq!(backend.held(), Buttons::empty());

        register.set(!(Buttons::LEFT | Buttons::JUMP).bits());
        let input = backend.input_poll();
        assert_eq!(input.move_x, -1.0);
        assert!(input.jump);
    }

    #[test]
    fn test_audio_init_once() {
        let mut backend = SimulatorBackend::new(1, false);
        assert!(backend.audio_init().is_ok());
        assert_eq!(
            backend.audio_init(),
            Err(PlatformError::AudioAlreadyInitialised)
        );
    }

    #[test]
    fn test_simulator_plays_script_then_idles() {
        let mut backend = SimulatorBackend::new(7, false);
        backend.push_script([Buttons::RIGHT, Buttons::RIGHT | Buttons::JUMP]);
        assert_eq!(backend.input_poll().move_x, 1.0);
        assert!(backend.input_poll().jump);
        assert_eq!(backend.script_len(), 0);
        assert_eq!(backend.input_poll(), TickInput::default());
    }

    #[test]
    fn test_demo_input_is_seeded() {
        let mut a = SimulatorBackend::new(42, true);
        let mut b = SimulatorBackend::new(42, true);
        for _ in 0..200 {
            assert_eq!(a.input_poll(), b.input_poll());
        }
    }

    #[test]
    fn test_frame_counting() {
        let mut backend = create_backend(BackendKind::Simulator, 3);
        for _ in 0..3 {
            backend.draw_begin();
            backend.draw_end();
            backend.flip();
        }
        assert_eq!(backend.frames(), 3);
        assert_eq!(backend.kind(), BackendKind::Simulator);
    }

    #[test]
    fn test_parse_backend() {
        assert_eq!(parse_backend("SIM"), Ok(BackendKind::Simulator));
        assert_eq!(parse_backend("device"), Ok(BackendKind::Handheld));
        assert!(parse_backend("toaster").is_err());
    }
}
