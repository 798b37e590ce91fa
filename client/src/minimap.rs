//! Minimap overlay showing the area around the local player

use crate::camera::{Viewport, GRID_CELL_SIZE};
use macroquad::prelude::*;
use shared::Position;

pub const MINIMAP_SIZE: f32 = 250.0;
/// Screen pixels per world unit on the minimap, independent of main zoom
pub const MINIMAP_SCALE: f32 = 0.1;

const OTHER_DOT_RADIUS: f32 = 3.0;
const LOCAL_DOT_RADIUS: f32 = 4.0;
const DASH_LENGTH: f32 = 4.0;

/// Fixed-scale overview anchored in the top-right corner
pub struct Minimap {
    size: f32,
    scale: f32,
    margin: f32,
    visible: bool,
}

impl Minimap {
    pub fn new() -> Self {
        Self {
            size: MINIMAP_SIZE,
            scale: MINIMAP_SCALE,
            margin: 20.0,
            visible: true,
        }
    }

    pub fn toggle_visibility(&mut self) {
        self.visible = !self.visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Minimap-local coordinates of a world point, with `center` in the middle
    pub fn project(&self, center: Position, world: Position) -> Vec2 {
        vec2(
            (world.x - center.x) * self.scale + self.size / 2.0,
            (world.y - center.y) * self.scale + self.size / 2.0,
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= 0.0 && point.x <= self.size && point.y >= 0.0 && point.y <= self.size
    }

    /// Minimap-local offsets of grid lines for one axis around `center`
    pub fn grid_lines(&self, center: f32) -> Vec<f32> {
        let half_view = self.size / self.scale / 2.0;
        let mut world = ((center - half_view) / GRID_CELL_SIZE).floor() * GRID_CELL_SIZE;
        let end = center + half_view;

        let mut lines = Vec::new();
        while world <= end {
            let offset = (world - center) * self.scale + self.size / 2.0;
            if (0.0..=self.size).contains(&offset) {
                lines.push(offset);
            }
            world += GRID_CELL_SIZE;
        }
        lines
    }

    /// The main view's world extent as a centered minimap rectangle
    pub fn viewport_rect(&self, viewport: Viewport, zoom: f32) -> Rect {
        let w = viewport.width / zoom * self.scale;
        let h = viewport.height / zoom * self.scale;
        Rect::new(self.size / 2.0 - w / 2.0, self.size / 2.0 - h / 2.0, w, h)
    }

    pub fn render(
        &self,
        local: Position,
        local_color: Color,
        others: &[(Position, Color)],
        viewport: Viewport,
        zoom: f32,
    ) {
        if !self.visible {
            return;
        }

        let origin = vec2(viewport.width - self.size - self.margin, self.margin);

        self.draw_background(origin);
        self.draw_grid(origin, local);
        self.draw_viewport(origin, self.viewport_rect(viewport, zoom));

        for (position, color) in others {
            let point = self.project(local, *position);
            if self.contains(point) {
                draw_circle(origin.x + point.x, origin.y + point.y, OTHER_DOT_RADIUS, *color);
            }
        }

        self.draw_local_marker(origin, local_color);
    }

    fn draw_background(&self, origin: Vec2) {
        draw_rectangle(
            origin.x,
            origin.y,
            self.size,
            self.size,
            Color::from_rgba(248, 250, 252, 230),
        );
        draw_rectangle_lines(
            origin.x,
            origin.y,
            self.size,
            self.size,
            1.0,
            Color::from_rgba(120, 120, 120, 255),
        );
        draw_text("Map (M to toggle)", origin.x + 6.0, origin.y + 14.0, 14.0, DARKGRAY);
    }

    fn draw_grid(&self, origin: Vec2, local: Position) {
        let grid_color = Color::from_rgba(229, 231, 235, 255);

        for x in self.grid_lines(local.x) {
            draw_line(origin.x + x, origin.y, origin.x + x, origin.y + self.size, 0.5, grid_color);
        }
        for y in self.grid_lines(local.y) {
            draw_line(origin.x, origin.y + y, origin.x + self.size, origin.y + y, 0.5, grid_color);
        }
    }

    /// Dashed outline of what the main view currently shows
    fn draw_viewport(&self, origin: Vec2, rect: Rect) {
        let color = Color::from_rgba(99, 102, 241, 255);
        let corners = [
            vec2(rect.x, rect.y),
            vec2(rect.x + rect.w, rect.y),
            vec2(rect.x + rect.w, rect.y + rect.h),
            vec2(rect.x, rect.y + rect.h),
        ];

        for i in 0..corners.len() {
            let start = origin + corners[i];
            let end = origin + corners[(i + 1) % corners.len()];
            draw_dashed_line(start, end, 2.0, color);
        }
    }

    fn draw_local_marker(&self, origin: Vec2, color: Color) {
        let center = origin + vec2(self.size / 2.0, self.size / 2.0);
        draw_circle(center.x, center.y, LOCAL_DOT_RADIUS, color);
        draw_triangle(
            center + vec2(0.0, -8.0),
            center + vec2(-4.0, 0.0),
            center + vec2(4.0, 0.0),
            color,
        );
    }
}

impl Default for Minimap {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_dashed_line(start: Vec2, end: Vec2, thickness: f32, color: Color) {
    let length = start.distance(end);
    if length <= 0.0 {
        return;
    }
    let direction = (end - start) / length;

    let mut travelled = 0.0;
    while travelled < length {
        let dash_end = (travelled + DASH_LENGTH).min(length);
        let a = start + direction * travelled;
        let b = start + direction * dash_end;
        draw_line(a.x, a.y, b.x, b.y, thickness, color);
        travelled += DASH_LENGTH * 2.0;
    }
}
