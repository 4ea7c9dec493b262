// ============================================================================
// LABEL OVERLAY — text-on-card items: move, corner resize+rotate, delete
// ============================================================================

use ab_glyph::{Font, FontArc, ScaleFont};
use image::{RgbImage, RgbaImage, imageops};

use super::merge_down;
use super::placed::{self, Handle};

/// Size a freshly placed label gets.
pub const DEFAULT_LABEL_SIZE: (f32, f32) = (150.0, 100.0);
/// Corner dragging never shrinks a label below this width.
pub const MIN_LABEL_WIDTH: f32 = 50.0;
/// Drop shadow offset in face pixels.
pub const SHADOW_OFFSET: (f32, f32) = (2.0, 2.0);
/// Drop shadow color (translucent black).
pub const SHADOW_COLOR: [u8; 4] = [0, 0, 0, 100];

/// Text styling for one label.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelStyle {
    pub color: [u8; 4],
    pub font_px: f32,
    pub shadow: bool,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            color: [0, 0, 0, 255],
            font_px: 24.0,
            shadow: false,
        }
    }
}

/// One placed label: a backing card image with centered text on top.
#[derive(Clone)]
pub struct LabelItem {
    card: RgbaImage,
    pub text: String,
    pub style: LabelStyle,
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    pub angle_deg: f32,
}

impl LabelItem {
    fn new(card: RgbaImage, center: (f32, f32)) -> Self {
        Self {
            card,
            text: String::from("Double-tap to edit"),
            style: LabelStyle::default(),
            cx: center.0,
            cy: center.1,
            width: DEFAULT_LABEL_SIZE.0,
            height: DEFAULT_LABEL_SIZE.1,
            angle_deg: 0.0,
        }
    }

    /// Compose the un-rotated face: the card scaled to the item size with
    /// the text centered over it.
    fn face(&self, font: Option<&FontArc>) -> RgbaImage {
        let w = (self.width.round() as u32).max(1);
        let h = (self.height.round() as u32).max(1);
        let mut face = imageops::resize(&self.card, w, h, imageops::FilterType::Triangle);

        if let Some(font) = font
            && !self.text.is_empty()
        {
            if self.style.shadow {
                draw_text_centered(
                    &mut face,
                    font,
                    &self.text,
                    self.style.font_px,
                    SHADOW_COLOR,
                    SHADOW_OFFSET,
                );
            }
            draw_text_centered(&mut face, font, &self.text, self.style.font_px, self.style.color, (0.0, 0.0));
        }
        face
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DragMode {
    Move,
    ResizeRotate,
}

pub struct LabelOverlay {
    size: (u32, u32),
    items: Vec<LabelItem>,
    selected: Option<usize>,
    drag: Option<DragMode>,
    last_pos: (f32, f32),
    font: Option<FontArc>,
    active: bool,
}

impl Default for LabelOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelOverlay {
    pub fn new() -> Self {
        Self {
            size: (0, 0),
            items: Vec::new(),
            selected: None,
            drag: None,
            last_pos: (0.0, 0.0),
            font: None,
            active: false,
        }
    }

    /// Provide the typeface used for every label's text.  Labels render
    /// card-only until one is set.
    pub fn set_font(&mut self, font: FontArc) {
        self.font = Some(font);
    }

    pub fn activate(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.items.clear();
        self.selected = None;
        self.drag = None;
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Place a label at the canvas center and select it.
    pub fn add_label(&mut self, card: RgbaImage) {
        let center = (self.size.0 as f32 * 0.5, self.size.1 as f32 * 0.5);
        self.items.push(LabelItem::new(card, center));
        self.selected = Some(self.items.len() - 1);
    }

    pub fn items(&self) -> &[LabelItem] {
        &self.items
    }

    pub fn selected(&self) -> Option<&LabelItem> {
        self.selected.map(|i| &self.items[i])
    }

    pub fn set_text(&mut self, text: &str) {
        if let Some(i) = self.selected {
            self.items[i].text = text.to_string();
        }
    }

    pub fn set_color(&mut self, color: [u8; 4]) {
        if let Some(i) = self.selected {
            self.items[i].style.color = color;
        }
    }

    pub fn set_font_px(&mut self, px: f32) {
        if let Some(i) = self.selected {
            self.items[i].style.font_px = px.max(4.0);
        }
    }

    pub fn set_shadow(&mut self, shadow: bool) {
        if let Some(i) = self.selected {
            self.items[i].style.shadow = shadow;
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(i) = self.selected.take() {
            self.items.remove(i);
        }
    }

    /// Pointer press: selected item's handles first, then items top-down.
    pub fn press(&mut self, pos: (f32, f32)) -> bool {
        self.last_pos = pos;

        if let Some(i) = self.selected {
            let item = &self.items[i];
            match placed::hit_test(pos, (item.cx, item.cy), item.width, item.height, item.angle_deg)
            {
                Some(Handle::Delete) => {
                    self.delete_selected();
                    return true;
                }
                Some(Handle::ResizeRotate) => {
                    self.drag = Some(DragMode::ResizeRotate);
                    return true;
                }
                _ => {}
            }
        }

        for i in (0..self.items.len()).rev() {
            let item = &self.items[i];
            let hit = placed::hit_test(pos, (item.cx, item.cy), item.width, item.height, item.angle_deg);
            if matches!(hit, Some(Handle::Body)) {
                self.selected = Some(i);
                self.drag = Some(DragMode::Move);
                return true;
            }
        }

        self.selected = None;
        self.drag = None;
        false
    }

    pub fn drag_to(&mut self, pos: (f32, f32)) {
        let (Some(mode), Some(i)) = (self.drag, self.selected) else {
            return;
        };
        let item = &mut self.items[i];

        match mode {
            DragMode::Move => {
                item.cx += pos.0 - self.last_pos.0;
                item.cy += pos.1 - self.last_pos.1;
            }
            DragMode::ResizeRotate => {
                let ratio = if item.height.abs() < 1e-3 {
                    1.0
                } else {
                    item.width / item.height
                };
                let (angle, width) =
                    placed::resize_rotate(pos, (item.cx, item.cy), ratio, MIN_LABEL_WIDTH);
                item.angle_deg = angle;
                item.width = width;
                item.height = width / ratio;
            }
        }
        self.last_pos = pos;
    }

    pub fn release(&mut self) {
        self.drag = None;
    }

    /// Rasterize all labels onto a transparent layer (no selection chrome).
    pub fn render(&self) -> RgbaImage {
        let mut layer = RgbaImage::new(self.size.0, self.size.1);
        for item in &self.items {
            let face = item.face(self.font.as_ref());
            placed::render_rotated_into(
                &mut layer,
                &face,
                (item.cx, item.cy),
                item.width,
                item.height,
                item.angle_deg,
            );
        }
        layer
    }

    /// Flatten the surviving labels into the base and deactivate.
    pub fn commit(&mut self, base: &RgbImage) -> RgbImage {
        let result = if self.active && !self.items.is_empty() {
            merge_down(base, &self.render())
        } else {
            base.clone()
        };
        self.cancel();
        result
    }

    pub fn cancel(&mut self) {
        self.items.clear();
        self.selected = None;
        self.drag = None;
        self.active = false;
    }
}

// ---------------------------------------------------------------------------
//  Text rasterization (single or multi-line, centered in the face)
// ---------------------------------------------------------------------------

fn draw_text_centered(
    face: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    font_px: f32,
    color: [u8; 4],
    offset: (f32, f32),
) {
    let scaled = font.as_scaled(font_px);
    let ascent = scaled.ascent();
    let line_height = scaled.height();

    let lines: Vec<&str> = text.split('\n').collect();
    let block_h = lines.len() as f32 * line_height;
    let face_w = face.width() as f32;
    let face_h = face.height() as f32;

    for (li, line) in lines.iter().enumerate() {
        // Kerned line width, then center horizontally
        let mut line_w = 0.0f32;
        let mut prev = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(p) = prev {
                line_w += scaled.kern(p, id);
            }
            line_w += scaled.h_advance(id);
            prev = Some(id);
        }

        let mut cursor_x = (face_w - line_w) * 0.5 + offset.0;
        let baseline = (face_h - block_h) * 0.5 + li as f32 * line_height + ascent + offset.1;

        let mut prev = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(p) = prev {
                cursor_x += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(font_px, ab_glyph::point(cursor_x, baseline));
            cursor_x += scaled.h_advance(id);
            prev = Some(id);

            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let x = bounds.min.x as i32 + gx as i32;
                    let y = bounds.min.y as i32 + gy as i32;
                    if x < 0 || y < 0 || x >= face.width() as i32 || y >= face.height() as i32 {
                        return;
                    }
                    let alpha = coverage * color[3] as f32 / 255.0;
                    if alpha <= 0.0 {
                        return;
                    }
                    let p = face.get_pixel_mut(x as u32, y as u32);
                    let da = p[3] as f32 / 255.0;
                    let oa = alpha + da * (1.0 - alpha);
                    if oa <= 0.0 {
                        return;
                    }
                    for c in 0..3 {
                        let sc = color[c] as f32;
                        let dc = p[c] as f32;
                        p[c] = ((sc * alpha + dc * da * (1.0 - alpha)) / oa)
                            .round()
                            .clamp(0.0, 255.0) as u8;
                    }
                    p[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> RgbaImage {
        RgbaImage::from_pixel(30, 20, image::Rgba([255, 255, 200, 255]))
    }

    fn base() -> RgbImage {
        RgbImage::from_pixel(200, 200, image::Rgb([10, 10, 10]))
    }

    #[test]
    fn noop_commit_returns_identical_base() {
        let mut overlay = LabelOverlay::new();
        overlay.activate(200, 200);
        let b = base();
        assert_eq!(overlay.commit(&b), b);
    }

    #[test]
    fn card_is_flattened_without_a_font() {
        let mut overlay = LabelOverlay::new();
        overlay.activate(200, 200);
        overlay.add_label(card());
        let out = overlay.commit(&base());
        assert_eq!(out.get_pixel(100, 100).0, [255, 255, 200]);
        assert_eq!(out.get_pixel(10, 190).0, [10, 10, 10]);
    }

    #[test]
    fn text_and_style_apply_to_the_selection() {
        let mut overlay = LabelOverlay::new();
        overlay.activate(200, 200);
        overlay.add_label(card());
        overlay.set_text("hello\nworld");
        overlay.set_color([200, 0, 0, 255]);
        overlay.set_shadow(true);
        let item = overlay.selected().unwrap();
        assert_eq!(item.text, "hello\nworld");
        assert_eq!(item.style.color, [200, 0, 0, 255]);
        assert!(item.style.shadow);
    }

    #[test]
    fn corner_drag_scales_through_the_aspect_ratio() {
        let mut overlay = LabelOverlay::new();
        overlay.activate(200, 200);
        overlay.add_label(card());
        // Bottom-right corner of the 150×100 default rect at (100,100)
        assert!(overlay.press((175.0, 150.0)));
        overlay.drag_to((190.0, 160.0));
        let item = overlay.selected().unwrap();
        assert!(item.width > 150.0);
        assert!((item.width / item.height - 1.5).abs() < 1e-3);
    }

    #[test]
    fn delete_handle_removes_the_label() {
        let mut overlay = LabelOverlay::new();
        overlay.activate(200, 200);
        overlay.add_label(card());
        assert!(overlay.press((25.0, 50.0)));
        assert!(overlay.items().is_empty());
    }

    #[test]
    fn move_drag_translates() {
        let mut overlay = LabelOverlay::new();
        overlay.activate(200, 200);
        overlay.add_label(card());
        assert!(overlay.press((100.0, 100.0)));
        overlay.drag_to((80.0, 120.0));
        overlay.release();
        let item = overlay.selected().unwrap();
        assert_eq!((item.cx, item.cy), (80.0, 120.0));
    }
}
