//! Camera and world-to-screen projection
//!
//! The camera is derived from the local player every frame and never moved on
//! its own: `x, y` is the world coordinate of the screen's top-left corner,
//! chosen so the local player lands exactly on the viewport center at any
//! zoom. Changing zoom only changes the scale around that center.

use macroquad::math::{vec2, Vec2};
use shared::Position;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;
pub const DEFAULT_ZOOM: f32 = 1.0;
/// Zoom change per key press
pub const ZOOM_STEP: f32 = 0.2;
/// Zoom change per mouse wheel notch
pub const WHEEL_ZOOM_STEP: f32 = 0.1;
/// World-space size of one grid cell
pub const GRID_CELL_SIZE: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        vec2(self.width / 2.0, self.height / 2.0)
    }
}

/// Zoom level clamped to `[MIN_ZOOM, MAX_ZOOM]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom(f32);

impl Zoom {
    pub fn new(level: f32) -> Self {
        Self(level.clamp(MIN_ZOOM, MAX_ZOOM))
    }

    pub fn level(&self) -> f32 {
        self.0
    }

    /// Adjusts the zoom by `delta`; returns true if the clamped level changed
    pub fn adjust(&mut self, delta: f32) -> bool {
        let old = self.0;
        self.0 = (self.0 + delta).clamp(MIN_ZOOM, MAX_ZOOM);
        self.0 != old
    }

    pub fn reset(&mut self) {
        self.0 = DEFAULT_ZOOM;
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(DEFAULT_ZOOM)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Camera {
    /// Places the camera so `target` is at the center of `viewport`
    pub fn follow(target: Position, viewport: Viewport, zoom: Zoom) -> Self {
        let zoom = zoom.level();
        Self {
            x: target.x - viewport.width / (2.0 * zoom),
            y: target.y - viewport.height / (2.0 * zoom),
            zoom,
        }
    }

    pub fn world_to_screen(&self, world: Position) -> Vec2 {
        vec2((world.x - self.x) * self.zoom, (world.y - self.y) * self.zoom)
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Position {
        Position::new(screen.x / self.zoom + self.x, screen.y / self.zoom + self.y)
    }

    /// World-space extent of what the viewport shows
    pub fn visible_world_size(&self, viewport: Viewport) -> Vec2 {
        vec2(viewport.width / self.zoom, viewport.height / self.zoom)
    }

    /// Screen positions of the vertical and horizontal grid lines
    ///
    /// Lines sit on multiples of `cell` in world space, so they stay locked to
    /// the world while the camera pans; on screen they are `cell * zoom` apart.
    pub fn grid_lines(&self, viewport: Viewport, cell: f32) -> (Vec<f32>, Vec<f32>) {
        let lines = |origin: f32, extent: f32| {
            let spacing = cell * self.zoom;
            let mut screen = -origin.rem_euclid(cell) * self.zoom;
            let mut out = Vec::new();
            while screen <= extent {
                out.push(screen);
                screen += spacing;
            }
            out
        };

        (lines(self.x, viewport.width), lines(self.y, viewport.height))
    }
}

/// Whether a screen point lies inside the viewport grown by `margin` on each side
pub fn is_on_screen(point: Vec2, viewport: Viewport, margin: f32) -> bool {
    point.x >= -margin
        && point.x <= viewport.width + margin
        && point.y >= -margin
        && point.y <= viewport.height + margin
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_local_player_is_always_centered() {
        let viewport = Viewport::new(1280.0, 720.0);
        let positions = [
            Position::new(0.0, 0.0),
            Position::new(-3500.25, 812.5),
            Position::new(1.0e5, -2.0e4),
        ];
        let zooms = [MIN_ZOOM, 0.75, DEFAULT_ZOOM, 2.2, MAX_ZOOM];

        for position in positions {
            for zoom in zooms {
                let camera = Camera::follow(position, viewport, Zoom::new(zoom));
                let screen = camera.world_to_screen(position);
                assert_approx_eq!(screen.x, 640.0, 0.05);
                assert_approx_eq!(screen.y, 360.0, 0.05);
            }
        }
    }

    #[test]
    fn test_projection_matches_relative_offset_formula() {
        let viewport = Viewport::new(800.0, 600.0);
        let local = Position::new(100.0, 50.0);
        let other = Position::new(160.0, 20.0);
        let camera = Camera::follow(local, viewport, Zoom::new(2.0));

        let screen = camera.world_to_screen(other);
        assert_approx_eq!(screen.x, 400.0 + (160.0 - 100.0) * 2.0);
        assert_approx_eq!(screen.y, 300.0 + (20.0 - 50.0) * 2.0);
    }

    #[test]
    fn test_screen_to_world_inverts_projection() {
        let camera = Camera::follow(Position::new(12.0, -7.0), Viewport::new(640.0, 480.0), Zoom::new(1.5));
        let world = Position::new(40.0, 3.0);
        let back = camera.screen_to_world(camera.world_to_screen(world));
        assert_approx_eq!(back.x, world.x, 0.001);
        assert_approx_eq!(back.y, world.y, 0.001);
    }

    #[test]
    fn test_zoom_is_clamped() {
        assert_eq!(Zoom::new(10.0).level(), MAX_ZOOM);
        assert_eq!(Zoom::new(0.0).level(), MIN_ZOOM);

        let mut zoom = Zoom::new(MAX_ZOOM - 0.1);
        assert!(zoom.adjust(ZOOM_STEP));
        assert_eq!(zoom.level(), MAX_ZOOM);
        assert!(!zoom.adjust(ZOOM_STEP));

        zoom.reset();
        assert_eq!(zoom.level(), DEFAULT_ZOOM);
    }

    #[test]
    fn test_grid_lines_are_world_locked() {
        let viewport = Viewport::new(200.0, 100.0);
        let camera = Camera {
            x: 30.0,
            y: -20.0,
            zoom: 1.0,
        };

        let (vertical, horizontal) = camera.grid_lines(viewport, GRID_CELL_SIZE);
        // World x = 50, 100, 150, 200 land at screen 20, 70, 120, 170
        assert_approx_eq!(vertical[0], -30.0);
        assert_approx_eq!(vertical[1], 20.0);
        assert_eq!(vertical.len(), 5);
        // World y = -50, 0, 50, 100 land at screen -30, 20, 70
        assert_approx_eq!(horizontal[1], 20.0);

        for x in &vertical {
            let world = camera.screen_to_world(vec2(*x, 0.0)).x;
            assert_approx_eq!(world.rem_euclid(GRID_CELL_SIZE), 0.0, 0.001);
        }
    }

    #[test]
    fn test_grid_spacing_scales_with_zoom() {
        let camera = Camera {
            x: 0.0,
            y: 0.0,
            zoom: 2.0,
        };
        let (vertical, _) = camera.grid_lines(Viewport::new(400.0, 400.0), GRID_CELL_SIZE);
        assert_approx_eq!(vertical[1] - vertical[0], 100.0);
    }

    #[test]
    fn test_culling_margin() {
        let viewport = Viewport::new(100.0, 100.0);
        assert!(is_on_screen(vec2(50.0, 50.0), viewport, 50.0));
        assert!(is_on_screen(vec2(-49.0, 149.0), viewport, 50.0));
        assert!(!is_on_screen(vec2(-51.0, 50.0), viewport, 50.0));
        assert!(!is_on_screen(vec2(50.0, 151.0), viewport, 50.0));
    }
}
