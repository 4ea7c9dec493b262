// ============================================================================
// MOSAIC OVERLAY — brush-revealed stylization of the base image
// ============================================================================
//
// The full-canvas stylized buffer is computed once per style change, never
// per brush stroke: painting only edits the single-channel reveal mask, and
// commit blends the cached stylized buffer over the base through it.
// ============================================================================

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

use super::stroke_segment_gray;
use crate::compositor;
use crate::ops::filters::gaussian_blur;

/// Default brush diameter in pixels.
pub const DEFAULT_BRUSH_SIZE: f32 = 20.0;

/// How the revealed region is stylized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MosaicStyle {
    /// Block pixelation; `block_size` is the square cell edge in pixels.
    Pixelate { block_size: u32 },
    /// Heavy gaussian blur.
    Blur { sigma: f32 },
}

impl Default for MosaicStyle {
    fn default() -> Self {
        MosaicStyle::Pixelate { block_size: 12 }
    }
}

/// Whether the brush reveals or hides the stylization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MosaicBrush {
    #[default]
    Reveal,
    Erase,
}

pub struct MosaicOverlay {
    base: Option<RgbImage>,
    styled: Option<RgbImage>,
    reveal: Option<GrayImage>,
    style: MosaicStyle,
    brush: MosaicBrush,
    brush_size: f32,
    last_point: Option<(f32, f32)>,
}

impl Default for MosaicOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl MosaicOverlay {
    pub fn new() -> Self {
        Self {
            base: None,
            styled: None,
            reveal: None,
            style: MosaicStyle::default(),
            brush: MosaicBrush::Reveal,
            brush_size: DEFAULT_BRUSH_SIZE,
            last_point: None,
        }
    }

    /// Snapshot the base (read-only), precompute the stylized buffer, and
    /// start with an empty reveal mask.
    pub fn activate(&mut self, base: &RgbImage) {
        self.styled = Some(stylize(base, self.style));
        self.reveal = Some(GrayImage::new(base.width(), base.height()));
        self.base = Some(base.clone());
        self.last_point = None;
    }

    pub fn is_active(&self) -> bool {
        self.reveal.is_some()
    }

    /// Change the stylization.  Recomputes the cached buffer only when the
    /// style actually differs; the painted reveal mask is kept.
    pub fn set_style(&mut self, style: MosaicStyle) {
        if style == self.style {
            return;
        }
        self.style = style;
        if let Some(base) = &self.base {
            self.styled = Some(stylize(base, style));
        }
    }

    pub fn style(&self) -> MosaicStyle {
        self.style
    }

    pub fn set_brush(&mut self, brush: MosaicBrush) {
        self.brush = brush;
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = size.max(1.0);
    }

    /// The reveal mask, for display composition.
    pub fn reveal_mask(&self) -> Option<&GrayImage> {
        self.reveal.as_ref()
    }

    pub fn styled(&self) -> Option<&RgbImage> {
        self.styled.as_ref()
    }

    pub fn begin_stroke(&mut self, pos: (f32, f32)) {
        self.last_point = Some(pos);
        self.paint_segment(pos, pos);
    }

    pub fn drag_to(&mut self, pos: (f32, f32)) {
        let Some(last) = self.last_point else { return };
        self.paint_segment(last, pos);
        self.last_point = Some(pos);
    }

    pub fn end_stroke(&mut self) {
        self.last_point = None;
    }

    /// Clear all painted reveal strokes but stay active.
    pub fn clear(&mut self) {
        if let Some(mask) = &mut self.reveal {
            for p in mask.pixels_mut() {
                p.0[0] = 0;
            }
        }
    }

    /// Blend the stylized buffer over the base through the reveal mask,
    /// then deactivate.
    pub fn commit(&mut self, base: &RgbImage) -> RgbImage {
        let result = match (self.styled.take(), self.reveal.take()) {
            (Some(styled), Some(mask)) => {
                let mask = compositor::resample_mask(&mask, base.width(), base.height());
                compositor::blend(&styled, &mask, base)
            }
            _ => base.clone(),
        };
        self.base = None;
        self.last_point = None;
        result
    }

    pub fn cancel(&mut self) {
        self.base = None;
        self.styled = None;
        self.reveal = None;
        self.last_point = None;
    }

    fn paint_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let value = match self.brush {
            MosaicBrush::Reveal => 255,
            MosaicBrush::Erase => 0,
        };
        if let Some(mask) = &mut self.reveal {
            stroke_segment_gray(mask, from, to, self.brush_size, value);
        }
    }
}

/// Produce the full-canvas stylized buffer for a style.
fn stylize(base: &RgbImage, style: MosaicStyle) -> RgbImage {
    match style {
        MosaicStyle::Pixelate { block_size } => pixelate(base, block_size),
        MosaicStyle::Blur { sigma } => gaussian_blur(base, sigma.max(0.5)),
    }
}

/// Block pixelation: every pixel takes the color at the center of its cell.
fn pixelate(img: &RgbImage, block_size: u32) -> RgbImage {
    let bs = block_size.max(2);
    let w = img.width();
    let h = img.height();
    if w == 0 || h == 0 {
        return img.clone();
    }

    let src_raw = img.as_raw();
    let stride = w as usize * 3;
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let by = ((y as u32 / bs) * bs + bs / 2).min(h - 1) as usize;
        for x in 0..w as usize {
            // Sample from the center of the block.
            let bx = ((x as u32 / bs) * bs + bs / 2).min(w - 1) as usize;
            let si = by * stride + bx * 3;
            let pi = x * 3;
            row_out[pi..pi + 3].copy_from_slice(&src_raw[si..si + 3]);
        }
    });

    RgbImage::from_raw(w, h, dst_raw).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(32, 32, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 0]))
    }

    #[test]
    fn noop_commit_returns_identical_base() {
        let mut overlay = MosaicOverlay::new();
        let base = gradient();
        overlay.activate(&base);
        assert_eq!(overlay.commit(&base), base);
    }

    #[test]
    fn painted_region_takes_stylized_pixels() {
        let mut overlay = MosaicOverlay::new();
        let base = gradient();
        overlay.activate(&base);
        overlay.set_brush_size(10.0);
        overlay.begin_stroke((8.0, 8.0));
        overlay.drag_to((8.0, 24.0));
        overlay.end_stroke();
        let styled = overlay.styled().unwrap().clone();
        let out = overlay.commit(&base);
        assert_eq!(out.get_pixel(8, 16), styled.get_pixel(8, 16));
        // Unpainted corner keeps base pixels
        assert_eq!(out.get_pixel(30, 2), base.get_pixel(30, 2));
    }

    #[test]
    fn restyle_preserves_painted_mask() {
        let mut overlay = MosaicOverlay::new();
        let base = gradient();
        overlay.activate(&base);
        overlay.begin_stroke((16.0, 16.0));
        overlay.end_stroke();
        let before = overlay.reveal_mask().unwrap().clone();
        overlay.set_style(MosaicStyle::Blur { sigma: 6.0 });
        assert_eq!(overlay.reveal_mask().unwrap(), &before);
    }

    #[test]
    fn setting_the_same_style_keeps_the_cached_buffer() {
        let mut overlay = MosaicOverlay::new();
        let base = gradient();
        overlay.activate(&base);
        let ptr_before = overlay.styled().unwrap().as_raw().as_ptr();
        overlay.set_style(MosaicStyle::default());
        assert_eq!(overlay.styled().unwrap().as_raw().as_ptr(), ptr_before);
    }

    #[test]
    fn eraser_brush_hides_again() {
        let mut overlay = MosaicOverlay::new();
        let base = gradient();
        overlay.activate(&base);
        overlay.set_brush_size(12.0);
        overlay.begin_stroke((16.0, 16.0));
        overlay.end_stroke();
        overlay.set_brush(MosaicBrush::Erase);
        overlay.set_brush_size(16.0);
        overlay.begin_stroke((16.0, 16.0));
        overlay.end_stroke();
        assert_eq!(overlay.commit(&base), base);
    }

    #[test]
    fn pixelate_is_constant_within_a_block() {
        let out = pixelate(&gradient(), 8);
        let c = out.get_pixel(0, 0);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(out.get_pixel(x, y), c);
            }
        }
    }
}
