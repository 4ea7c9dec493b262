// ============================================================================
// STICKER OVERLAY — placed images with move / resize+rotate / delete handles
// ============================================================================

use image::{RgbImage, RgbaImage};

use super::merge_down;
use super::placed::{self, Handle};

/// Width a freshly placed sticker gets.
pub const DEFAULT_STICKER_SIZE: f32 = 150.0;
/// Corner dragging never shrinks a sticker below this width.
pub const MIN_STICKER_WIDTH: f32 = 30.0;

/// One placed sticker.  `width`/`height` stay aspect-locked to the source.
#[derive(Clone)]
pub struct StickerItem {
    image: RgbaImage,
    /// Source aspect ratio (w/h), fixed at placement.
    ratio: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    pub angle_deg: f32,
}

impl StickerItem {
    fn new(image: RgbaImage, center: (f32, f32)) -> Self {
        let ratio = if image.height() > 0 {
            image.width() as f32 / image.height() as f32
        } else {
            1.0
        };
        Self {
            image,
            ratio,
            cx: center.0,
            cy: center.1,
            width: DEFAULT_STICKER_SIZE,
            height: DEFAULT_STICKER_SIZE / ratio,
            angle_deg: 0.0,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DragMode {
    Move,
    ResizeRotate,
}

/// What a pointer press did, so the caller can drive cursors/feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PressOutcome {
    DeletedItem,
    StartedResize,
    StartedMove,
    Deselected,
    Ignored,
}

pub struct StickerOverlay {
    size: (u32, u32),
    items: Vec<StickerItem>,
    selected: Option<usize>,
    drag: Option<DragMode>,
    last_pos: (f32, f32),
    active: bool,
}

impl Default for StickerOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl StickerOverlay {
    pub fn new() -> Self {
        Self {
            size: (0, 0),
            items: Vec::new(),
            selected: None,
            drag: None,
            last_pos: (0.0, 0.0),
            active: false,
        }
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

    /// Place a sticker at the canvas center and select it.
    pub fn add_sticker(&mut self, image: RgbaImage) {
        let center = (self.size.0 as f32 * 0.5, self.size.1 as f32 * 0.5);
        self.items.push(StickerItem::new(image, center));
        self.selected = Some(self.items.len() - 1);
    }

    pub fn items(&self) -> &[StickerItem] {
        &self.items
    }

    pub fn selected(&self) -> Option<&StickerItem> {
        self.selected.map(|i| &self.items[i])
    }

    pub fn delete_selected(&mut self) {
        if let Some(i) = self.selected.take() {
            self.items.remove(i);
        }
    }

    /// Pointer press: handles of the selected item win, then items top-down,
    /// else deselect.  Selecting raises the item to the top.
    pub fn press(&mut self, pos: (f32, f32)) -> PressOutcome {
        self.last_pos = pos;

        if let Some(i) = self.selected {
            let item = &self.items[i];
            match placed::hit_test(pos, (item.cx, item.cy), item.width, item.height, item.angle_deg)
            {
                Some(Handle::Delete) => {
                    self.delete_selected();
                    return PressOutcome::DeletedItem;
                }
                Some(Handle::ResizeRotate) => {
                    self.drag = Some(DragMode::ResizeRotate);
                    return PressOutcome::StartedResize;
                }
                _ => {}
            }
        }

        // Topmost item under the pointer
        for i in (0..self.items.len()).rev() {
            let item = &self.items[i];
            let hit = placed::hit_test(pos, (item.cx, item.cy), item.width, item.height, item.angle_deg);
            if matches!(hit, Some(Handle::Body)) {
                // Raise to the top of the stack
                let item = self.items.remove(i);
                self.items.push(item);
                self.selected = Some(self.items.len() - 1);
                self.drag = Some(DragMode::Move);
                return PressOutcome::StartedMove;
            }
        }

        self.selected = None;
        self.drag = None;
        PressOutcome::Deselected
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
                let (angle, width) =
                    placed::resize_rotate(pos, (item.cx, item.cy), item.ratio, MIN_STICKER_WIDTH);
                item.angle_deg = angle;
                item.width = width;
                item.height = width / item.ratio;
            }
        }
        self.last_pos = pos;
    }

    pub fn release(&mut self) {
        self.drag = None;
    }

    /// Rasterize all items onto a transparent layer (no selection chrome).
    pub fn render(&self) -> RgbaImage {
        let mut layer = RgbaImage::new(self.size.0, self.size.1);
        for item in &self.items {
            placed::render_rotated_into(
                &mut layer,
                &item.image,
                (item.cx, item.cy),
                item.width,
                item.height,
                item.angle_deg,
            );
        }
        layer
    }

    /// Flatten the surviving items into the base and deactivate.
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

#[cfg(test)]
mod tests {
    use super::*;

    fn red_sticker() -> RgbaImage {
        RgbaImage::from_pixel(20, 10, image::Rgba([255, 0, 0, 255]))
    }

    fn base() -> RgbImage {
        RgbImage::from_pixel(200, 200, image::Rgb([10, 10, 10]))
    }

    #[test]
    fn placement_keeps_aspect_ratio() {
        let mut overlay = StickerOverlay::new();
        overlay.activate(200, 200);
        overlay.add_sticker(red_sticker());
        let item = overlay.selected().unwrap();
        assert_eq!(item.width, DEFAULT_STICKER_SIZE);
        assert_eq!(item.height, DEFAULT_STICKER_SIZE / 2.0);
        assert_eq!((item.cx, item.cy), (100.0, 100.0));
    }

    #[test]
    fn noop_commit_returns_identical_base() {
        let mut overlay = StickerOverlay::new();
        overlay.activate(200, 200);
        let b = base();
        assert_eq!(overlay.commit(&b), b);
    }

    #[test]
    fn commit_flattens_the_sticker() {
        let mut overlay = StickerOverlay::new();
        overlay.activate(200, 200);
        overlay.add_sticker(red_sticker());
        let out = overlay.commit(&base());
        assert_eq!(out.get_pixel(100, 100).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(10, 10).0, [10, 10, 10]);
        assert!(!overlay.is_active());
    }

    #[test]
    fn body_press_starts_move_and_drags() {
        let mut overlay = StickerOverlay::new();
        overlay.activate(200, 200);
        overlay.add_sticker(red_sticker());
        assert_eq!(overlay.press((100.0, 100.0)), PressOutcome::StartedMove);
        overlay.drag_to((130.0, 110.0));
        overlay.release();
        let item = overlay.selected().unwrap();
        assert_eq!((item.cx, item.cy), (130.0, 110.0));
    }

    #[test]
    fn corner_press_resizes_and_rotates() {
        let mut overlay = StickerOverlay::new();
        overlay.activate(200, 200);
        overlay.add_sticker(red_sticker());
        // Bottom-right corner of a 150×75 item centered at (100,100)
        assert_eq!(overlay.press((175.0, 137.5)), PressOutcome::StartedResize);
        // Drag straight down: the corner vector becomes (0, +d) → rotation
        overlay.drag_to((100.0, 160.0));
        let item = overlay.selected().unwrap();
        assert!(item.angle_deg > 0.0);
        assert!((item.width / item.height - 2.0).abs() < 1e-3);
    }

    #[test]
    fn delete_handle_removes_item() {
        let mut overlay = StickerOverlay::new();
        overlay.activate(200, 200);
        overlay.add_sticker(red_sticker());
        // Top-left corner of the selected item
        assert_eq!(overlay.press((25.0, 62.5)), PressOutcome::DeletedItem);
        assert!(overlay.items().is_empty());
    }

    #[test]
    fn pressing_empty_space_deselects() {
        let mut overlay = StickerOverlay::new();
        overlay.activate(200, 200);
        overlay.add_sticker(red_sticker());
        assert_eq!(overlay.press((5.0, 195.0)), PressOutcome::Deselected);
        assert!(overlay.selected().is_none());
    }

    #[test]
    fn selecting_raises_to_top() {
        let mut overlay = StickerOverlay::new();
        overlay.activate(200, 200);
        overlay.add_sticker(red_sticker());
        overlay.add_sticker(RgbaImage::from_pixel(10, 10, image::Rgba([0, 255, 0, 255])));
        // Move the green (top) sticker away so the red one is exposed
        overlay.press((100.0, 100.0));
        overlay.drag_to((190.0, 190.0));
        overlay.release();
        overlay.press((5.0, 5.0)); // deselect
        // Clicking the red sticker selects and raises it
        assert_eq!(overlay.press((100.0, 100.0)), PressOutcome::StartedMove);
        let top = overlay.items().last().unwrap();
        assert_eq!(top.image().get_pixel(0, 0).0, [255, 0, 0, 255]);
    }
}
