// ============================================================================
// MASK REFINE CANVAS — pan/zoom brush surface for manual mask correction
// ============================================================================
//
// Display model: `image*α + dimmed*(1-α)`, so masked-out regions appear
// dimmed rather than hidden.  The dimmed background and the full display
// buffer are built once at activation; every brush segment afterwards
// recomputes only the segment's bounding rectangle (inflated by the brush
// radius).  The incremental path must produce a raster identical to a full
// recompute — `display_equals_full_recompute` in the tests pins this.
// ============================================================================

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

use crate::overlays::{segment_roi, stroke_segment_gray};

/// Brightness factor for masked-out regions.
pub const DIM_FACTOR: f32 = 0.3;
/// Zoom limits for the view transform.
pub const ZOOM_RANGE: (f32, f32) = (0.1, 10.0);
/// Per-wheel-step zoom factor.
pub const ZOOM_STEP: f32 = 1.1;
/// Extra pixels around a brush ROI so the patch seam can never clip.
pub const ROI_MARGIN: f32 = 5.0;

/// Whether the brush restores mask coverage or erases it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefineMode {
    /// Paint the mask to 255 (bring pixels back into the foreground).
    #[default]
    Restore,
    /// Paint the mask to 0 (push pixels into the background).
    Erase,
}

pub struct RefineCanvas {
    image: RgbImage,
    dimmed: RgbImage,
    mask: GrayImage,
    display: RgbImage,

    // View transform: display = image*scale + offset
    scale: f32,
    offset: (f32, f32),

    mode: RefineMode,
    brush_diameter: f32,
    last_point: Option<(f32, f32)>,
}

impl RefineCanvas {
    /// Take a snapshot of the image and the current mask, precompute the
    /// dimmed background, and build the full display buffer once.
    ///
    /// A mask whose dimensions disagree with the image (e.g. predicted at a
    /// downscaled resolution) is resampled nearest-neighbor first.
    pub fn new(image: RgbImage, mask: &GrayImage) -> Self {
        let mask = crate::compositor::resample_mask(mask, image.width(), image.height());
        let dimmed = dim(&image);
        let display = compose_full(&image, &dimmed, &mask);
        Self {
            image,
            dimmed,
            mask,
            display,
            scale: 1.0,
            offset: (0.0, 0.0),
            mode: RefineMode::Restore,
            brush_diameter: 20.0,
            last_point: None,
        }
    }

    pub fn display(&self) -> &RgbImage {
        &self.display
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn set_mode(&mut self, mode: RefineMode) {
        self.mode = mode;
    }

    pub fn set_brush_diameter(&mut self, diameter: f32) {
        self.brush_diameter = diameter.max(1.0);
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    /// Fit the image into a viewport with a 10% margin, centered.
    pub fn reset_view(&mut self, viewport_w: f32, viewport_h: f32) {
        let (iw, ih) = (self.image.width() as f32, self.image.height() as f32);
        if iw <= 0.0 || ih <= 0.0 {
            return;
        }
        self.scale = (viewport_w / iw).min(viewport_h / ih) * 0.9;
        self.offset = (
            (viewport_w - iw * self.scale) * 0.5,
            (viewport_h - ih * self.scale) * 0.5,
        );
    }

    /// Wheel zoom anchored at the cursor: the image point under the cursor
    /// stays put while the scale changes.
    pub fn zoom_about(&mut self, cursor: (f32, f32), steps: i32) {
        let factor = ZOOM_STEP.powi(steps);
        let new_scale = (self.scale * factor).clamp(ZOOM_RANGE.0, ZOOM_RANGE.1);

        // Image-space point currently under the cursor
        let px = (cursor.0 - self.offset.0) / self.scale;
        let py = (cursor.1 - self.offset.1) / self.scale;

        self.scale = new_scale;
        self.offset = (cursor.0 - px * new_scale, cursor.1 - py * new_scale);
    }

    pub fn pan(&mut self, delta: (f32, f32)) {
        self.offset.0 += delta.0;
        self.offset.1 += delta.1;
    }

    /// Map a display/viewport position into image pixel coordinates.
    pub fn view_to_image(&self, pos: (f32, f32)) -> (f32, f32) {
        (
            (pos.0 - self.offset.0) / self.scale,
            (pos.1 - self.offset.1) / self.scale,
        )
    }

    /// Begin a stroke at an image-space point.
    pub fn begin_stroke(&mut self, point: (f32, f32)) {
        self.last_point = None;
        self.paint_to(point);
    }

    /// Extend the stroke to an image-space point.  The mask segment and the
    /// matching display rectangle are repainted; nothing outside the ROI is
    /// touched.
    pub fn paint_to(&mut self, point: (f32, f32)) {
        let from = self.last_point.unwrap_or(point);
        let radius = self.brush_diameter * 0.5;
        let value = match self.mode {
            RefineMode::Restore => 255,
            RefineMode::Erase => 0,
        };

        stroke_segment_gray(&mut self.mask, from, point, self.brush_diameter, value);

        if let Some(roi) = segment_roi(
            from,
            point,
            radius,
            ROI_MARGIN,
            self.mask.width(),
            self.mask.height(),
        ) {
            self.recompose_roi(roi);
        }

        self.last_point = Some(point);
    }

    pub fn end_stroke(&mut self) {
        self.last_point = None;
    }

    /// Hand the refined mask back and consume the canvas.
    pub fn finish(self) -> GrayImage {
        self.mask
    }

    /// Recompute `display = image*α + dimmed*(1-α)` inside one rectangle.
    fn recompose_roi(&mut self, (x0, y0, x1, y1): (u32, u32, u32, u32)) {
        let w = self.image.width() as usize;
        let img_raw = self.image.as_raw();
        let dim_raw = self.dimmed.as_raw();
        let mask_raw = self.mask.as_raw();
        let disp_raw = self.display.as_mut();

        for y in y0 as usize..y1 as usize {
            let row = y * w;
            for x in x0 as usize..x1 as usize {
                let alpha = mask_raw[row + x] as f32 / 255.0;
                let pi = (row + x) * 3;
                for c in 0..3 {
                    let f = img_raw[pi + c] as f32;
                    let b = dim_raw[pi + c] as f32;
                    disp_raw[pi + c] = (f * alpha + b * (1.0 - alpha)).round() as u8;
                }
            }
        }
    }
}

/// Precomputed dark background: `image * DIM_FACTOR`.
fn dim(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for v in out.as_mut().iter_mut() {
        *v = (*v as f32 * DIM_FACTOR) as u8;
    }
    out
}

/// Full-canvas compose, used once at activation (and by the regression test
/// as the reference the ROI path must match).
fn compose_full(image: &RgbImage, dimmed: &RgbImage, mask: &GrayImage) -> RgbImage {
    let w = image.width() as usize;
    let stride = w * 3;
    let img_raw = image.as_raw();
    let dim_raw = dimmed.as_raw();
    let mask_raw = mask.as_raw();
    let mut out_raw = vec![0u8; img_raw.len()];

    out_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row = y * w;
        for x in 0..w {
            let alpha = mask_raw[row + x] as f32 / 255.0;
            let pi = x * 3;
            let off = row * 3 + pi;
            for c in 0..3 {
                let f = img_raw[off + c] as f32;
                let b = dim_raw[off + c] as f32;
                row_out[pi + c] = (f * alpha + b * (1.0 - alpha)).round() as u8;
            }
        }
    });

    RgbImage::from_raw(image.width(), image.height(), out_raw).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image() -> RgbImage {
        RgbImage::from_fn(64, 48, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 5) as u8, ((x + y) * 2) as u8])
        })
    }

    fn half_mask() -> GrayImage {
        GrayImage::from_fn(64, 48, |x, _| image::Luma([if x < 32 { 255 } else { 0 }]))
    }

    #[test]
    fn display_shows_dimmed_background() {
        let canvas = RefineCanvas::new(test_image(), &half_mask());
        let img = test_image();
        // Foreground half: original pixels
        assert_eq!(canvas.display().get_pixel(10, 10), img.get_pixel(10, 10));
        // Background half: dimmed
        let p = img.get_pixel(50, 10).0;
        let d = canvas.display().get_pixel(50, 10).0;
        for c in 0..3 {
            assert_eq!(d[c], (p[c] as f32 * DIM_FACTOR) as u8);
        }
    }

    #[test]
    fn display_equals_full_recompute_after_overlapping_strokes() {
        let mut canvas = RefineCanvas::new(test_image(), &half_mask());
        canvas.set_brush_diameter(9.0);

        canvas.begin_stroke((40.0, 10.0));
        canvas.paint_to((45.0, 20.0));
        canvas.paint_to((50.0, 12.0));
        canvas.end_stroke();

        canvas.set_mode(RefineMode::Erase);
        canvas.begin_stroke((44.0, 15.0));
        canvas.paint_to((20.0, 15.0));
        canvas.end_stroke();

        let image = test_image();
        let reference = compose_full(&image, &dim(&image), canvas.mask());
        assert_eq!(canvas.display(), &reference);
    }

    #[test]
    fn restore_paints_mask_to_full() {
        let mut canvas = RefineCanvas::new(test_image(), &half_mask());
        canvas.set_brush_diameter(10.0);
        canvas.begin_stroke((50.0, 24.0));
        canvas.end_stroke();
        assert_eq!(canvas.mask().get_pixel(50, 24).0[0], 255);
    }

    #[test]
    fn erase_paints_mask_to_zero() {
        let mut canvas = RefineCanvas::new(test_image(), &half_mask());
        canvas.set_mode(RefineMode::Erase);
        canvas.set_brush_diameter(10.0);
        canvas.begin_stroke((10.0, 24.0));
        canvas.end_stroke();
        assert_eq!(canvas.mask().get_pixel(10, 24).0[0], 0);
    }

    #[test]
    fn zoom_keeps_cursor_point_fixed() {
        let mut canvas = RefineCanvas::new(test_image(), &half_mask());
        canvas.reset_view(640.0, 480.0);
        let cursor = (300.0, 200.0);
        let before = canvas.view_to_image(cursor);
        canvas.zoom_about(cursor, 3);
        let after = canvas.view_to_image(cursor);
        assert!((before.0 - after.0).abs() < 1e-3);
        assert!((before.1 - after.1).abs() < 1e-3);
    }

    #[test]
    fn zoom_clamps_to_range() {
        let mut canvas = RefineCanvas::new(test_image(), &half_mask());
        canvas.zoom_about((0.0, 0.0), 100);
        assert!(canvas.scale() <= ZOOM_RANGE.1);
        canvas.zoom_about((0.0, 0.0), -200);
        assert!(canvas.scale() >= ZOOM_RANGE.0);
    }

    #[test]
    fn undersized_mask_is_resampled_to_the_image() {
        let small = GrayImage::from_pixel(16, 12, image::Luma([255]));
        let canvas = RefineCanvas::new(test_image(), &small);
        assert_eq!(canvas.mask().dimensions(), (64, 48));
    }

    #[test]
    fn out_of_bounds_stroke_is_harmless() {
        let mut canvas = RefineCanvas::new(test_image(), &half_mask());
        canvas.begin_stroke((-50.0, -50.0));
        canvas.paint_to((-40.0, -60.0));
        canvas.end_stroke();
        let reference = RefineCanvas::new(test_image(), &half_mask());
        assert_eq!(canvas.display(), reference.display());
    }
}
