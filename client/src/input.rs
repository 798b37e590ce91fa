//! Client input: movement keys, zoom, minimap toggle and the chat composer

use crate::camera::{WHEEL_ZOOM_STEP, ZOOM_STEP};
use crate::chat::Composer;
use macroquad::prelude::*;
use std::f32::consts::FRAC_1_SQRT_2;

/// Local movement speed in world units per second
pub const MOVE_SPEED: f32 = 300.0;

/// Which movement keys are held this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Direction {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Direction {
    pub fn is_moving(&self) -> bool {
        self.up || self.down || self.left || self.right
    }

    /// World-space displacement for `dt` seconds at `speed`
    ///
    /// Opposite keys cancel. Diagonals are scaled by 1/√2 so moving
    /// diagonally is no faster than moving along an axis.
    pub fn displacement(&self, speed: f32, dt: f32) -> Vec2 {
        let axis = |neg: bool, pos: bool| match (neg, pos) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        let mut step = vec2(axis(self.left, self.right), axis(self.up, self.down));
        if step.x != 0.0 && step.y != 0.0 {
            step *= FRAC_1_SQRT_2;
        }
        step * speed * dt
    }
}

/// Raw key state sampled once per frame
#[derive(Debug, Clone, Default)]
pub struct KeySample {
    pub direction: Direction,
    pub zoom_in: bool,
    pub zoom_out: bool,
    pub zoom_reset: bool,
    pub minimap: bool,
    pub enter: bool,
    pub escape: bool,
    pub backspace: bool,
    pub wheel: f32,
    pub chars: Vec<char>,
}

impl KeySample {
    pub fn capture() -> Self {
        let direction = Direction {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        };

        let mut chars = Vec::new();
        while let Some(c) = get_char_pressed() {
            chars.push(c);
        }

        Self {
            direction,
            zoom_in: is_key_down(KeyCode::Equal) || is_key_down(KeyCode::KpAdd),
            zoom_out: is_key_down(KeyCode::Minus) || is_key_down(KeyCode::KpSubtract),
            zoom_reset: is_key_down(KeyCode::Key0) || is_key_down(KeyCode::Kp0),
            minimap: is_key_down(KeyCode::M),
            enter: is_key_down(KeyCode::Enter) || is_key_down(KeyCode::KpEnter),
            escape: is_key_down(KeyCode::Escape),
            backspace: is_key_down(KeyCode::Backspace),
            wheel: mouse_wheel().1,
            chars,
        }
    }
}

/// What the frame loop should do in response to this frame's input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub direction: Direction,
    pub zoom_delta: f32,
    pub reset_zoom: bool,
    pub toggle_minimap: bool,
    pub chat_message: Option<String>,
}

/// Turns held keys into per-frame actions with press edge detection
pub struct InputManager {
    composer: Composer,

    // Previous frame key states for edge detection
    prev_zoom_in: bool,
    prev_zoom_out: bool,
    prev_zoom_reset: bool,
    prev_minimap: bool,
    prev_enter: bool,
    prev_escape: bool,
    prev_backspace: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            composer: Composer::new(),
            prev_zoom_in: false,
            prev_zoom_out: false,
            prev_zoom_reset: false,
            prev_minimap: false,
            prev_enter: false,
            prev_escape: false,
            prev_backspace: false,
        }
    }

    /// Samples the keyboard and mouse and returns this frame's actions
    pub fn update(&mut self) -> FrameInput {
        self.apply(KeySample::capture())
    }

    pub fn apply(&mut self, sample: KeySample) -> FrameInput {
        let zoom_in = sample.zoom_in && !self.prev_zoom_in;
        let zoom_out = sample.zoom_out && !self.prev_zoom_out;
        let zoom_reset = sample.zoom_reset && !self.prev_zoom_reset;
        let minimap = sample.minimap && !self.prev_minimap;
        let enter = sample.enter && !self.prev_enter;
        let escape = sample.escape && !self.prev_escape;
        let backspace = sample.backspace && !self.prev_backspace;

        self.prev_zoom_in = sample.zoom_in;
        self.prev_zoom_out = sample.zoom_out;
        self.prev_zoom_reset = sample.zoom_reset;
        self.prev_minimap = sample.minimap;
        self.prev_enter = sample.enter;
        self.prev_escape = sample.escape;
        self.prev_backspace = sample.backspace;

        let mut frame = FrameInput::default();

        if sample.wheel > 0.0 {
            frame.zoom_delta += WHEEL_ZOOM_STEP;
        } else if sample.wheel < 0.0 {
            frame.zoom_delta -= WHEEL_ZOOM_STEP;
        }

        if self.composer.is_open() {
            // Typing: keys go to the composer, not to movement or hotkeys
            for c in sample.chars {
                self.composer.push_char(c);
            }
            if backspace {
                self.composer.backspace();
            }
            if escape {
                self.composer.cancel();
            } else if enter {
                frame.chat_message = self.composer.submit();
            }
            return frame;
        }

        if enter {
            self.composer.open();
            return frame;
        }

        frame.direction = sample.direction;
        if zoom_in {
            frame.zoom_delta += ZOOM_STEP;
        }
        if zoom_out {
            frame.zoom_delta -= ZOOM_STEP;
        }
        frame.reset_zoom = zoom_reset;
        frame.toggle_minimap = minimap;
        frame
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn is_typing(&self) -> bool {
        self.composer.is_open()
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
