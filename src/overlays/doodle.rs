// ============================================================================
// DOODLE OVERLAY — free-hand, line, arrow, rect, ellipse, and eraser strokes
// ============================================================================

use image::{RgbImage, RgbaImage};

use super::{merge_down, stroke_segment_rgba};

/// Default stroke color (orange, opaque).
pub const DEFAULT_STROKE_COLOR: [u8; 4] = [255, 165, 0, 255];
/// Default stroke width in pixels.
pub const DEFAULT_STROKE_WIDTH: f32 = 5.0;

/// The closed set of doodle tools.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DoodleTool {
    #[default]
    Freehand,
    Line,
    Arrow,
    Rect,
    Ellipse,
    /// Clears alpha instead of painting color.
    Eraser,
}

/// Transient free-form drawing layer.
///
/// Freehand and eraser strokes rasterize as the pointer moves; the shape
/// tools (line/arrow/rect/ellipse) rasterize once on `end_stroke` from the
/// anchor point to the final position.
pub struct DoodleOverlay {
    layer: Option<RgbaImage>,
    tool: DoodleTool,
    stroke_width: f32,
    color: [u8; 4],
    stroke_start: Option<(f32, f32)>,
    last_point: Option<(f32, f32)>,
}

impl Default for DoodleOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl DoodleOverlay {
    pub fn new() -> Self {
        Self {
            layer: None,
            tool: DoodleTool::Freehand,
            stroke_width: DEFAULT_STROKE_WIDTH,
            color: DEFAULT_STROKE_COLOR,
            stroke_start: None,
            last_point: None,
        }
    }

    /// Allocate a transparent working buffer sized to the image rect.
    pub fn activate(&mut self, width: u32, height: u32) {
        self.layer = Some(RgbaImage::new(width, height));
        self.stroke_start = None;
        self.last_point = None;
    }

    pub fn is_active(&self) -> bool {
        self.layer.is_some()
    }

    pub fn set_tool(&mut self, tool: DoodleTool) {
        self.tool = tool;
    }

    pub fn tool(&self) -> DoodleTool {
        self.tool
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.stroke_width = width.max(1.0);
    }

    pub fn set_color(&mut self, color: [u8; 4]) {
        self.color = color;
    }

    /// The working buffer, for display composition.
    pub fn layer(&self) -> Option<&RgbaImage> {
        self.layer.as_ref()
    }

    /// Wipe all strokes but stay active.
    pub fn clear(&mut self) {
        if let Some(layer) = &mut self.layer {
            for p in layer.pixels_mut() {
                p.0 = [0, 0, 0, 0];
            }
        }
    }

    pub fn begin_stroke(&mut self, pos: (f32, f32)) {
        if self.layer.is_none() {
            return;
        }
        self.stroke_start = Some(pos);
        self.last_point = Some(pos);
        // Free-form tools paint immediately; shapes wait for end_stroke.
        if matches!(self.tool, DoodleTool::Freehand | DoodleTool::Eraser) {
            self.paint_segment(pos, pos);
        }
    }

    pub fn drag_to(&mut self, pos: (f32, f32)) {
        let Some(last) = self.last_point else { return };
        if matches!(self.tool, DoodleTool::Freehand | DoodleTool::Eraser) {
            self.paint_segment(last, pos);
        }
        self.last_point = Some(pos);
    }

    /// Finish the stroke; shape tools rasterize here from anchor → `pos`.
    pub fn end_stroke(&mut self, pos: (f32, f32)) {
        let Some(start) = self.stroke_start else { return };
        match self.tool {
            DoodleTool::Freehand | DoodleTool::Eraser => {
                if let Some(last) = self.last_point {
                    self.paint_segment(last, pos);
                }
            }
            DoodleTool::Line => self.paint_segment(start, pos),
            DoodleTool::Arrow => self.draw_arrow(start, pos),
            DoodleTool::Rect => self.draw_rect(start, pos),
            DoodleTool::Ellipse => self.draw_ellipse(start, pos),
        }
        self.stroke_start = None;
        self.last_point = None;
    }

    /// Merge the doodle into the base and deactivate.
    pub fn commit(&mut self, base: &RgbImage) -> RgbImage {
        let result = match self.layer.take() {
            Some(layer) => merge_down(base, &layer),
            None => base.clone(),
        };
        self.stroke_start = None;
        self.last_point = None;
        result
    }

    /// Drop the working buffer without merging.
    pub fn cancel(&mut self) {
        self.layer = None;
        self.stroke_start = None;
        self.last_point = None;
    }

    fn paint_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let color = if self.tool == DoodleTool::Eraser {
            None
        } else {
            Some(self.color)
        };
        if let Some(layer) = &mut self.layer {
            stroke_segment_rgba(layer, from, to, self.stroke_width, color);
        }
    }

    fn draw_rect(&mut self, a: (f32, f32), b: (f32, f32)) {
        let (x0, x1) = (a.0.min(b.0), a.0.max(b.0));
        let (y0, y1) = (a.1.min(b.1), a.1.max(b.1));
        self.paint_segment((x0, y0), (x1, y0));
        self.paint_segment((x1, y0), (x1, y1));
        self.paint_segment((x1, y1), (x0, y1));
        self.paint_segment((x0, y1), (x0, y0));
    }

    fn draw_ellipse(&mut self, a: (f32, f32), b: (f32, f32)) {
        let cx = (a.0 + b.0) * 0.5;
        let cy = (a.1 + b.1) * 0.5;
        let rx = (a.0 - b.0).abs() * 0.5;
        let ry = (a.1 - b.1).abs() * 0.5;

        // Enough samples that consecutive stamps overlap at any radius.
        let steps = ((rx.max(ry) * std::f32::consts::TAU).ceil() as usize).max(16);
        let mut prev = (cx + rx, cy);
        for i in 1..=steps {
            let t = i as f32 / steps as f32 * std::f32::consts::TAU;
            let p = (cx + rx * t.cos(), cy + ry * t.sin());
            self.paint_segment(prev, p);
            prev = p;
        }
    }

    fn draw_arrow(&mut self, start: (f32, f32), end: (f32, f32)) {
        self.paint_segment(start, end);

        // Barbs at 30° off the shaft, length scaling with the stroke width.
        let dx = end.0 - start.0;
        let dy = end.1 - start.1;
        let angle = dy.atan2(dx);
        let barb_len = self.stroke_width * 3.0 + 10.0;
        let barb_angle = std::f32::consts::FRAC_PI_6;

        let p1 = (
            end.0 - barb_len * (angle - barb_angle).cos(),
            end.1 - barb_len * (angle - barb_angle).sin(),
        );
        let p2 = (
            end.0 - barb_len * (angle + barb_angle).cos(),
            end.1 - barb_len * (angle + barb_angle).sin(),
        );

        self.fill_triangle(end, p1, p2);
    }

    /// Scanline-free triangle fill via edge-function sign tests over the
    /// bounding box.
    fn fill_triangle(&mut self, a: (f32, f32), b: (f32, f32), c: (f32, f32)) {
        let Some(layer) = &mut self.layer else { return };
        let w = layer.width() as i32;
        let h = layer.height() as i32;

        let x0 = (a.0.min(b.0).min(c.0).floor() as i32).max(0);
        let x1 = (a.0.max(b.0).max(c.0).ceil() as i32).min(w - 1);
        let y0 = (a.1.min(b.1).min(c.1).floor() as i32).max(0);
        let y1 = (a.1.max(b.1).max(c.1).ceil() as i32).min(h - 1);

        let edge = |p: (f32, f32), q: (f32, f32), x: f32, y: f32| {
            (q.0 - p.0) * (y - p.1) - (q.1 - p.1) * (x - p.0)
        };

        for y in y0..=y1 {
            for x in x0..=x1 {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                let e0 = edge(a, b, px, py);
                let e1 = edge(b, c, px, py);
                let e2 = edge(c, a, px, py);
                let inside = (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0)
                    || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0);
                if inside {
                    layer.put_pixel(x as u32, y as u32, image::Rgba(self.color));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RgbImage {
        RgbImage::from_pixel(40, 40, image::Rgb([50, 50, 50]))
    }

    #[test]
    fn noop_commit_returns_identical_base() {
        let mut overlay = DoodleOverlay::new();
        overlay.activate(40, 40);
        let b = base();
        assert_eq!(overlay.commit(&b), b);
        assert!(!overlay.is_active());
    }

    #[test]
    fn freehand_stroke_lands_in_base_on_commit() {
        let mut overlay = DoodleOverlay::new();
        overlay.activate(40, 40);
        overlay.begin_stroke((5.0, 20.0));
        overlay.drag_to((35.0, 20.0));
        overlay.end_stroke((35.0, 20.0));
        let out = overlay.commit(&base());
        assert_eq!(out.get_pixel(20, 20).0, [255, 165, 0]);
        // Far from the stroke, the base is untouched
        assert_eq!(out.get_pixel(20, 35).0, [50, 50, 50]);
    }

    #[test]
    fn eraser_clears_painted_alpha() {
        let mut overlay = DoodleOverlay::new();
        overlay.activate(40, 40);
        overlay.begin_stroke((5.0, 20.0));
        overlay.drag_to((35.0, 20.0));
        overlay.end_stroke((35.0, 20.0));

        overlay.set_tool(DoodleTool::Eraser);
        overlay.set_stroke_width(9.0);
        overlay.begin_stroke((5.0, 20.0));
        overlay.drag_to((35.0, 20.0));
        overlay.end_stroke((35.0, 20.0));

        let out = overlay.commit(&base());
        assert_eq!(out, base());
    }

    #[test]
    fn cancel_discards_strokes() {
        let mut overlay = DoodleOverlay::new();
        overlay.activate(40, 40);
        overlay.begin_stroke((10.0, 10.0));
        overlay.drag_to((30.0, 30.0));
        overlay.end_stroke((30.0, 30.0));
        overlay.cancel();
        assert!(!overlay.is_active());
        assert_eq!(overlay.commit(&base()), base());
    }

    #[test]
    fn rect_outline_leaves_interior_untouched() {
        let mut overlay = DoodleOverlay::new();
        overlay.activate(40, 40);
        overlay.set_tool(DoodleTool::Rect);
        overlay.set_stroke_width(2.0);
        overlay.begin_stroke((8.0, 8.0));
        overlay.end_stroke((32.0, 32.0));
        let out = overlay.commit(&base());
        assert_eq!(out.get_pixel(8, 20).0, [255, 165, 0]); // left edge
        assert_eq!(out.get_pixel(20, 20).0, [50, 50, 50]); // interior
    }

    #[test]
    fn arrow_paints_a_head_at_the_tip() {
        let mut overlay = DoodleOverlay::new();
        overlay.activate(60, 40);
        overlay.set_tool(DoodleTool::Arrow);
        overlay.begin_stroke((5.0, 20.0));
        overlay.end_stroke((50.0, 20.0));
        let out = overlay.commit(&RgbImage::from_pixel(60, 40, image::Rgb([0, 0, 0])));
        // A barb pixel behind and above the tip
        assert_eq!(out.get_pixel(42, 16).0, [255, 165, 0]);
    }
}
