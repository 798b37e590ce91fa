use crate::camera::{is_on_screen, Camera, Viewport, GRID_CELL_SIZE};
use crate::chat::{ChatBubble, Composer};
use crate::game::ClientState;
use crate::minimap::Minimap;
use crate::roster::PlayerKey;
use macroquad::prelude::*;
use shared::{parse_hex_color, Position, DEFAULT_COLOR};

/// Vertical offset of the name label from the player center, before zoom
pub const NAME_OFFSET_Y: f32 = -45.0;
/// Other players further than this outside the viewport are not drawn
pub const CULL_MARGIN: f32 = 50.0;

const BUBBLE_MAX_WIDTH: f32 = 200.0;
const CHAT_LOG_LINES: usize = 8;
const CORNER_SEGMENTS: usize = 6;

/// Parses `#rgb`/`#rrggbb`, falling back to the default player color
pub fn hex_color(color: &str) -> Color {
    let (r, g, b) = parse_hex_color(color)
        .or_else(|| parse_hex_color(DEFAULT_COLOR))
        .unwrap_or((99, 102, 241));
    Color::from_rgba(r, g, b, 255)
}

fn with_alpha(color: Color, alpha: f32) -> Color {
    Color::new(color.r, color.g, color.b, alpha)
}

fn font_size(size: f32) -> u16 {
    size.round().max(1.0) as u16
}

/// Bottom-left debug line
pub fn readout_text(position: Position, zoom: f32) -> String {
    format!(
        "X: {} Y: {} | Zoom: {:.2}x",
        position.x.round() as i64,
        position.y.round() as i64,
        zoom
    )
}

/// Shortens `text` with a trailing ellipsis until `measure` fits `max_width`
///
/// Binary-searches the longest prefix that still fits, so long chat lines
/// cost a logarithmic number of measurements per frame.
pub fn fit_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> String {
    if measure(text) <= max_width {
        return text.to_string();
    }

    // Byte offset where each prefix of `k` chars ends
    let ends: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let fits = |k: usize| measure(&format!("{}...", &text[..ends[k]])) <= max_width;

    // The answer is always in lo..hi; a prefix of zero chars is the floor
    let (mut lo, mut hi) = (0, ends.len());
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    format!("{}...", &text[..ends.get(lo).copied().unwrap_or(0)])
}

/// Outline of a rectangle with rounded corners, clockwise from the top-left arc
pub fn rounded_rect_outline(rect: Rect, radius: f32, segments: usize) -> Vec<Vec2> {
    let radius = radius.min(rect.w / 2.0).min(rect.h / 2.0).max(0.0);
    let corners = [
        (vec2(rect.x + rect.w - radius, rect.y + radius), -90.0f32),
        (vec2(rect.x + rect.w - radius, rect.y + rect.h - radius), 0.0),
        (vec2(rect.x + radius, rect.y + rect.h - radius), 90.0),
        (vec2(rect.x + radius, rect.y + radius), 180.0),
    ];

    let mut points = Vec::with_capacity(corners.len() * (segments + 1));
    for (center, start) in corners {
        for i in 0..=segments {
            let angle = (start + 90.0 * i as f32 / segments as f32).to_radians();
            points.push(center + vec2(angle.cos(), angle.sin()) * radius);
        }
    }
    points
}

fn draw_rounded_rect(rect: Rect, radius: f32, color: Color) {
    let outline = rounded_rect_outline(rect, radius, CORNER_SEGMENTS);
    let center = rect.center();
    for i in 0..outline.len() {
        let next = outline[(i + 1) % outline.len()];
        draw_triangle(center, outline[i], next, color);
    }
}

/// Draws `text` centered on `center`
fn draw_text_centered(text: &str, center: Vec2, size: u16, color: Color) {
    let dims = measure_text(text, None, size, 1.0);
    draw_text(
        text,
        center.x - dims.width / 2.0,
        center.y - dims.height / 2.0 + dims.offset_y,
        size as f32,
        color,
    );
}

pub struct Renderer {
    pub minimap: Minimap,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            minimap: Minimap::new(),
        }
    }

    pub fn render(
        &self,
        state: &ClientState<Texture2D>,
        composer: &Composer,
        viewport: Viewport,
        now: u64,
    ) {
        clear_background(WHITE);

        let zoom = state.zoom.level();
        let camera = Camera::follow(state.local.position, viewport, state.zoom);

        self.draw_grid(&camera, viewport);
        self.draw_local_player(state, viewport, zoom);
        self.draw_other_players(state, &camera, viewport, zoom);
        self.draw_bubbles(state, &camera, now);
        self.draw_readout(state, viewport);

        let others: Vec<(Position, Color)> = state
            .roster
            .iter()
            .map(|player| (player.position, hex_color(&player.color)))
            .collect();
        self.minimap.render(
            state.local.position,
            hex_color(&state.local.profile.color),
            &others,
            viewport,
            zoom,
        );

        self.draw_chat_log(state, viewport);
        self.draw_composer(composer, viewport);
        self.draw_status(state);
    }

    fn draw_grid(&self, camera: &Camera, viewport: Viewport) {
        let color = Color::from_rgba(229, 231, 235, 255);
        let (vertical, horizontal) = camera.grid_lines(viewport, GRID_CELL_SIZE);

        for x in vertical {
            draw_line(x, 0.0, x, viewport.height, 1.0, color);
        }
        for y in horizontal {
            draw_line(0.0, y, viewport.width, y, 1.0, color);
        }
    }

    fn draw_avatar_or_circle(&self, texture: Option<&Texture2D>, center: Vec2, radius: f32, color: Color) {
        match texture {
            Some(texture) => draw_texture_ex(
                texture,
                center.x - radius,
                center.y - radius,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(radius * 2.0, radius * 2.0)),
                    ..Default::default()
                },
            ),
            None => draw_circle(center.x, center.y, radius, color),
        }
    }

    fn draw_local_player(&self, state: &ClientState<Texture2D>, viewport: Viewport, zoom: f32) {
        let local = &state.local;
        let center = viewport.center();
        let color = hex_color(&local.profile.color);
        let radius = local.radius * zoom;

        if local.moving {
            draw_circle(center.x, center.y, radius * 1.2, with_alpha(color, 0.3));
        }

        let scale = if local.moving { 1.05 } else { 1.0 };
        let texture = state.avatars.get(&PlayerKey::Local);
        self.draw_avatar_or_circle(texture, center, radius * scale, color);

        if local.moving && texture.is_none() {
            draw_circle_lines(center.x, center.y, radius * scale, 3.0 * zoom, with_alpha(color, 0.6));
        }

        self.draw_name_label(
            &local.profile.username,
            center + vec2(0.0, NAME_OFFSET_Y * zoom),
            zoom,
        );
    }

    fn draw_other_players(
        &self,
        state: &ClientState<Texture2D>,
        camera: &Camera,
        viewport: Viewport,
        zoom: f32,
    ) {
        for player in state.roster.iter() {
            let screen = camera.world_to_screen(player.position);
            if !is_on_screen(screen, viewport, CULL_MARGIN) {
                continue;
            }

            let texture = player
                .avatar
                .as_ref()
                .and_then(|_| state.avatars.get(&PlayerKey::Remote(player.id.clone())));
            self.draw_avatar_or_circle(texture, screen, player.radius * zoom, hex_color(&player.color));
            self.draw_name_label(&player.username, screen + vec2(0.0, NAME_OFFSET_Y * zoom), zoom);
        }
    }

    /// Username on a translucent rounded backing
    fn draw_name_label(&self, name: &str, center: Vec2, zoom: f32) {
        let size = font_size(14.0 * zoom);
        let padding = 8.0 * zoom;
        let text_height = 20.0 * zoom;
        let width = measure_text(name, None, size, 1.0).width;

        let backing = Rect::new(
            center.x - width / 2.0 - padding,
            center.y - text_height / 2.0 - padding,
            width + padding * 2.0,
            text_height + padding * 2.0,
        );
        draw_rounded_rect(backing, 8.0 * zoom, Color::new(0.0, 0.0, 0.0, 0.7));
        draw_text_centered(name, center, size, WHITE);
    }

    fn draw_bubbles(&self, state: &ClientState<Texture2D>, camera: &Camera, now: u64) {
        for (key, bubble) in state.bubbles.iter() {
            // Expired or orphaned bubbles were pruned before this pass
            let Some(anchor) = state.anchor(key) else {
                continue;
            };
            let screen = camera.world_to_screen(anchor);
            let tip = vec2(screen.x, screen.y + (NAME_OFFSET_Y - 60.0) * camera.zoom);
            self.draw_bubble(bubble, tip, camera.zoom, now);
        }
    }

    fn draw_bubble(&self, bubble: &ChatBubble, tip: Vec2, zoom: f32, now: u64) {
        let alpha = bubble.alpha(now);
        let size = font_size(12.0 * zoom);
        let padding = 8.0 * zoom;
        let text_height = 16.0 * zoom;
        let max_width = BUBBLE_MAX_WIDTH * zoom;

        let measure = |text: &str| measure_text(text, None, size, 1.0).width;
        let text = fit_text(&bubble.message, max_width - padding * 2.0, measure);
        let width = (measure(&text) + padding * 2.0).min(max_width);
        let height = text_height + padding * 2.0;

        let body = Rect::new(tip.x - width / 2.0, tip.y - height, width, height);
        let fill = Color::new(0.0, 0.0, 0.0, 0.8 * alpha);
        draw_rounded_rect(body, 8.0 * zoom, fill);

        let pointer = 8.0 * zoom;
        draw_triangle(
            vec2(tip.x, tip.y + pointer),
            vec2(tip.x - pointer, tip.y),
            vec2(tip.x + pointer, tip.y),
            fill,
        );

        draw_text_centered(&text, body.center(), size, Color::new(1.0, 1.0, 1.0, alpha));
    }

    fn draw_readout(&self, state: &ClientState<Texture2D>, viewport: Viewport) {
        let text = readout_text(state.local.position, state.zoom.level());
        let dims = measure_text(&text, None, 16, 1.0);

        draw_rectangle(
            10.0,
            viewport.height - 35.0,
            dims.width + 20.0,
            25.0,
            Color::new(1.0, 1.0, 1.0, 0.9),
        );
        draw_text(
            &text,
            20.0,
            viewport.height - 28.0 + dims.offset_y,
            16.0,
            Color::from_rgba(31, 41, 55, 255),
        );
    }

    fn draw_chat_log(&self, state: &ClientState<Texture2D>, viewport: Viewport) {
        if state.chat_log.is_empty() {
            return;
        }

        let line_height = 18.0;
        let lines: Vec<_> = state.chat_log.recent(CHAT_LOG_LINES).collect();
        let top = viewport.height - 80.0 - line_height * lines.len() as f32;

        draw_rectangle(
            10.0,
            top - 6.0,
            360.0,
            line_height * lines.len() as f32 + 12.0,
            Color::new(0.0, 0.0, 0.0, 0.45),
        );

        for (i, line) in lines.iter().enumerate() {
            let color = if line.own {
                Color::from_rgba(165, 180, 252, 255)
            } else {
                WHITE
            };
            let text = fit_text(&line.text(), 340.0, |t| measure_text(t, None, 16, 1.0).width);
            draw_text(&text, 18.0, top + line_height * (i as f32 + 0.75), 16.0, color);
        }
    }

    fn draw_composer(&self, composer: &Composer, viewport: Viewport) {
        let y = viewport.height - 70.0;
        if composer.is_open() {
            draw_rectangle(10.0, y, 360.0, 26.0, Color::new(0.0, 0.0, 0.0, 0.75));
            let text = format!("Say: {}_", composer.text());
            draw_text(&text, 18.0, y + 18.0, 16.0, WHITE);
        } else {
            draw_text("Enter to chat", 12.0, y + 18.0, 14.0, GRAY);
        }
    }

    fn draw_status(&self, state: &ClientState<Texture2D>) {
        let (color, text) = if state.is_connected() {
            (GREEN, format!("{} players online", state.roster.len() + 1))
        } else {
            match state.last_error() {
                Some(reason) => (RED, format!("Disconnected: {}", reason)),
                None => (ORANGE, "Connecting...".to_string()),
            }
        };

        draw_circle(16.0, 16.0, 5.0, color);
        draw_text(&text, 28.0, 21.0, 16.0, DARKGRAY);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
