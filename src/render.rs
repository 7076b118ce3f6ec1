//! Rendering seam
//!
//! The simulation draws through the `Renderer` trait and never knows what
//! backend sits behind it. The built-in backend writes SVG documents, which
//! is enough for frame dumps from the headless demo binary.

use glam::Vec2;
use std::fmt::Write as _;

use crate::color::Color;

/// Drawing capability the simulation requires.
///
/// World-space calls (`draw_circle`, `draw_rectangle`, `draw_line`) use
/// simulation coordinates and respect `focus`. HUD calls use viewport
/// coordinates in [-1, 1] with +y up, independent of the camera.
pub trait Renderer {
    /// Finish the current frame and start a new one
    fn swap_buffers(&mut self);

    /// Centre the camera on `point`, showing `viewport_width` world units
    fn focus(&mut self, point: Vec2, viewport_width: f32);

    fn draw_circle(&mut self, pos: Vec2, radius: f32, color: Color);

    fn draw_rectangle(&mut self, half_extents: Vec2, pos: Vec2, color: Color);

    fn draw_line(&mut self, start: (Vec2, Color), end: (Vec2, Color));

    fn draw_hud_circle(&mut self, pos: Vec2, radius: f32, color: Color);
}

/// Renderer backend that accumulates each frame as an SVG document
pub struct SvgRenderer {
    width: u32,
    height: u32,

    centre: Vec2,
    viewport_width: f32,

    body: String,
    last_frame: Option<String>,
}

impl SvgRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            centre: Vec2::ZERO,
            viewport_width: 40.0,
            body: String::new(),
            last_frame: None,
        }
    }

    /// The most recently completed frame, if any
    pub fn take_frame(&mut self) -> Option<String> {
        self.last_frame.take()
    }

    fn scale(&self) -> f32 {
        self.width as f32 / self.viewport_width
    }

    /// World to pixel coordinates; SVG's y axis points down
    fn to_screen(&self, p: Vec2) -> (f32, f32) {
        let s = self.scale();
        (
            (p.x - self.centre.x) * s + self.width as f32 / 2.0,
            self.height as f32 / 2.0 - (p.y - self.centre.y) * s,
        )
    }

    /// HUD [-1, 1] coordinates to pixels
    fn hud_to_screen(&self, p: Vec2) -> (f32, f32) {
        (
            (p.x + 1.0) / 2.0 * self.width as f32,
            (1.0 - (p.y + 1.0) / 2.0) * self.height as f32,
        )
    }

    fn fill(color: Color) -> String {
        let (r, g, b) = color.to_rgb8();
        format!("rgb({r},{g},{b})")
    }
}

impl Renderer for SvgRenderer {
    fn swap_buffers(&mut self) {
        let mut doc = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" \
             viewBox=\"0 0 {w} {h}\">\n\
             <rect width=\"{w}\" height=\"{h}\" fill=\"black\"/>\n",
            w = self.width,
            h = self.height,
        );
        doc.push_str(&self.body);
        doc.push_str("</svg>\n");

        self.last_frame = Some(doc);
        self.body.clear();
    }

    fn focus(&mut self, point: Vec2, viewport_width: f32) {
        self.centre = point;
        self.viewport_width = viewport_width;
    }

    fn draw_circle(&mut self, pos: Vec2, radius: f32, color: Color) {
        let (cx, cy) = self.to_screen(pos);
        let r = radius * self.scale();
        let _ = writeln!(
            self.body,
            "<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{r:.2}\" fill=\"{}\"/>",
            Self::fill(color)
        );
    }

    fn draw_rectangle(&mut self, half_extents: Vec2, pos: Vec2, color: Color) {
        let (x, y) = self.to_screen(pos - half_extents * Vec2::new(1.0, -1.0));
        let w = half_extents.x * 2.0 * self.scale();
        let h = half_extents.y * 2.0 * self.scale();
        let _ = writeln!(
            self.body,
            "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" fill=\"{}\"/>",
            Self::fill(color)
        );
    }

    fn draw_line(&mut self, start: (Vec2, Color), end: (Vec2, Color)) {
        let (x1, y1) = self.to_screen(start.0);
        let (x2, y2) = self.to_screen(end.0);
        // Per-vertex colors collapsed to their average; good enough for
        // frame dumps.
        let color = start.1.lerp(end.1, 0.5);
        let _ = writeln!(
            self.body,
            "<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\" \
             stroke=\"{}\" stroke-width=\"1.5\"/>",
            Self::fill(color)
        );
    }

    fn draw_hud_circle(&mut self, pos: Vec2, radius: f32, color: Color) {
        let (cx, cy) = self.hud_to_screen(pos);
        let r = radius * self.width as f32 / 2.0;
        let _ = writeln!(
            self.body,
            "<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{r:.2}\" fill=\"{}\"/>",
            Self::fill(color)
        );
    }
}
