// ============================================================================
// RENDER PIPELINE — parameter state + fixed-order preview/final rendering
// ============================================================================
//
// The pipeline owns the loaded image and every stored edit parameter, and
// renders them in one fixed order:
//
//   filter → brightness/contrast LUT → hue/saturation → tone curve →
//   sharpen → quarter turns → horizontal flip → free rotation → crop
//
// The preview path and the final path run the exact same stage list; only
// the source buffer differs (full resolution vs. downscaled proxy), so a
// preview is pixel-equivalent to the export up to resampling error.
// ============================================================================

use std::path::Path;

use image::{RgbImage, imageops};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ops::filters::{self, FilterId};
use crate::ops::geometry::{self, CropRect};
use crate::ops::tone::{self, ToneLutCache};
use crate::render::CancelToken;

/// Longest preview side when no explicit limit is given.
pub const DEFAULT_PREVIEW_LIMIT: u32 = 1920;

/// Free-rotation range in degrees.
pub const ROTATION_RANGE: (f32, f32) = (-45.0, 45.0);

/// The seven scalar tone adjustments.  All default to 0 (no change).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneParams {
    /// -100..100
    pub brightness: i32,
    /// -100..100
    pub contrast: i32,
    /// -100..100
    pub saturation: i32,
    /// -180..180 degrees
    pub hue: i32,
    /// -100..100
    pub highlights: i32,
    /// -100..100
    pub shadows: i32,
    /// 0..100
    pub sharpness: i32,
}

/// Closed key set for `set_param` — no stringly-typed dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Brightness,
    Contrast,
    Saturation,
    Hue,
    Highlights,
    Shadows,
    Sharpness,
}

impl ParamKey {
    /// Valid (min, max) range for the parameter.
    pub fn range(&self) -> (i32, i32) {
        match self {
            ParamKey::Hue => (-180, 180),
            ParamKey::Sharpness => (0, 100),
            _ => (-100, 100),
        }
    }
}

/// Geometric edits, applied after the color stages.
///
/// `crop`, when present, is normalized relative to the image as it appears
/// after rotation/flip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    /// Free-angle rotation in degrees, -45..45.
    pub rotation_deg: f32,
    /// Clockwise quarter turns, 0..=3.
    pub quarter_turns: u8,
    pub flip_horizontal: bool,
    pub crop: Option<CropRect>,
}

/// A stored edit: everything needed to reproduce a render, minus the pixels.
/// Serialized as JSON for the headless CLI.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    pub tone: ToneParams,
    pub geometry: GeometrySettings,
    pub filter: FilterId,
}

/// Which source buffer a render reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTarget {
    /// The downscaled proxy — cheap enough to run synchronously per edit.
    Preview,
    /// The full-resolution source — export quality.
    Final,
}

pub struct RenderPipeline {
    source: RgbImage,
    preview: RgbImage,
    preview_limit: u32,
    tone: ToneParams,
    geometry: GeometrySettings,
    filter: FilterId,
    lut_cache: ToneLutCache,
}

impl RenderPipeline {
    /// Decode an image from disk and build its preview proxy.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let source = crate::io::decode(path)?;
        log_info!(
            "loaded {} ({}x{})",
            path.display(),
            source.width(),
            source.height()
        );
        Ok(Self::from_image(source))
    }

    /// Build a pipeline around an already-decoded buffer.
    pub fn from_image(source: RgbImage) -> Self {
        Self::with_preview_limit(source, DEFAULT_PREVIEW_LIMIT)
    }

    /// `preview_limit` caps the longest side of the preview proxy.
    pub fn with_preview_limit(source: RgbImage, preview_limit: u32) -> Self {
        let preview = build_preview(&source, preview_limit);
        Self {
            source,
            preview,
            preview_limit,
            tone: ToneParams::default(),
            geometry: GeometrySettings::default(),
            filter: FilterId::None,
            lut_cache: ToneLutCache::default(),
        }
    }

    pub fn source(&self) -> &RgbImage {
        &self.source
    }

    pub fn preview(&self) -> &RgbImage {
        &self.preview
    }

    pub fn tone(&self) -> &ToneParams {
        &self.tone
    }

    pub fn geometry(&self) -> &GeometrySettings {
        &self.geometry
    }

    pub fn filter(&self) -> FilterId {
        self.filter
    }

    /// Set one tone parameter, clamped into its valid range.
    pub fn set_param(&mut self, key: ParamKey, value: i32) {
        let (lo, hi) = key.range();
        let v = value.clamp(lo, hi);
        match key {
            ParamKey::Brightness => self.tone.brightness = v,
            ParamKey::Contrast => self.tone.contrast = v,
            ParamKey::Saturation => self.tone.saturation = v,
            ParamKey::Hue => self.tone.hue = v,
            ParamKey::Highlights => self.tone.highlights = v,
            ParamKey::Shadows => self.tone.shadows = v,
            ParamKey::Sharpness => self.tone.sharpness = v,
        }
    }

    pub fn param(&self, key: ParamKey) -> i32 {
        match key {
            ParamKey::Brightness => self.tone.brightness,
            ParamKey::Contrast => self.tone.contrast,
            ParamKey::Saturation => self.tone.saturation,
            ParamKey::Hue => self.tone.hue,
            ParamKey::Highlights => self.tone.highlights,
            ParamKey::Shadows => self.tone.shadows,
            ParamKey::Sharpness => self.tone.sharpness,
        }
    }

    pub fn set_filter(&mut self, filter: FilterId) {
        self.filter = filter;
    }

    pub fn set_rotation(&mut self, degrees: f32) {
        self.geometry.rotation_deg = degrees.clamp(ROTATION_RANGE.0, ROTATION_RANGE.1);
    }

    pub fn set_quarter_turns(&mut self, turns: u8) {
        self.geometry.quarter_turns = turns % 4;
    }

    pub fn set_flip_horizontal(&mut self, flip: bool) {
        self.geometry.flip_horizontal = flip;
    }

    /// Store a crop rect.  Whatever the caller passes is re-clamped into the
    /// unit square before it lands in the state.
    pub fn set_crop(&mut self, crop: Option<CropRect>) {
        self.geometry.crop = crop.map(|r| CropRect::new(r.x, r.y, r.w, r.h));
    }

    /// Snapshot the stored edit as a recipe.
    pub fn recipe(&self) -> Recipe {
        Recipe {
            tone: self.tone,
            geometry: self.geometry,
            filter: self.filter,
        }
    }

    /// Replace the stored edit with a recipe, clamping every field through
    /// the same setters user input goes through.
    pub fn apply_recipe(&mut self, recipe: &Recipe) {
        self.set_param(ParamKey::Brightness, recipe.tone.brightness);
        self.set_param(ParamKey::Contrast, recipe.tone.contrast);
        self.set_param(ParamKey::Saturation, recipe.tone.saturation);
        self.set_param(ParamKey::Hue, recipe.tone.hue);
        self.set_param(ParamKey::Highlights, recipe.tone.highlights);
        self.set_param(ParamKey::Shadows, recipe.tone.shadows);
        self.set_param(ParamKey::Sharpness, recipe.tone.sharpness);
        self.set_rotation(recipe.geometry.rotation_deg);
        self.set_quarter_turns(recipe.geometry.quarter_turns);
        self.set_flip_horizontal(recipe.geometry.flip_horizontal);
        self.set_crop(recipe.geometry.crop);
        self.set_filter(recipe.filter);
    }

    /// Render the stored edit.  Stage order is identical for both targets.
    pub fn render(&mut self, target: RenderTarget, include_crop: bool) -> RgbImage {
        self.render_stages(target, include_crop, None)
            .expect("uncancellable render returned None")
    }

    /// Render with a cancellation token, checked between stages.  Returns
    /// `None` when the token fires; partial buffers are dropped.
    pub fn render_with_cancel(
        &mut self,
        target: RenderTarget,
        include_crop: bool,
        token: &CancelToken,
    ) -> Option<RgbImage> {
        self.render_stages(target, include_crop, Some(token))
    }

    fn render_stages(
        &mut self,
        target: RenderTarget,
        include_crop: bool,
        token: Option<&CancelToken>,
    ) -> Option<RgbImage> {
        let cancelled = |t: Option<&CancelToken>| t.is_some_and(|t| t.is_cancelled());

        let src = match target {
            RenderTarget::Preview => &self.preview,
            RenderTarget::Final => &self.source,
        };

        // 1. Look filter
        let mut img = filters::apply(self.filter, src);
        if cancelled(token) {
            return None;
        }

        // 2. Combined brightness/contrast LUT (tuple-key cached)
        if self.tone.brightness != 0 || self.tone.contrast != 0 {
            let lut = self.lut_cache.bc_lut(self.tone.brightness, self.tone.contrast);
            img = tone::apply_lut(&img, lut);
        }

        // 3. Hue / saturation in HSV
        img = tone::apply_hue_saturation(&img, self.tone.hue, self.tone.saturation);
        if cancelled(token) {
            return None;
        }

        // 4. Highlight/shadow tone curve
        if self.tone.highlights != 0 || self.tone.shadows != 0 {
            let lut = self.lut_cache.curve_lut(self.tone.highlights, self.tone.shadows);
            img = tone::apply_lut(&img, lut);
        }

        // 5. Unsharp-mask sharpen
        if self.tone.sharpness > 0 {
            img = tone::sharpen(&img, self.tone.sharpness);
        }
        if cancelled(token) {
            return None;
        }

        // 6. Geometry: quarter turns, then flip, then free rotation.
        if self.geometry.quarter_turns != 0 {
            img = geometry::rotate_quarter(&img, self.geometry.quarter_turns);
        }
        if self.geometry.flip_horizontal {
            img = geometry::flip_horizontal(&img);
        }
        if self.geometry.rotation_deg != 0.0 {
            img = geometry::rotate_free(&img, self.geometry.rotation_deg);
        }
        if cancelled(token) {
            return None;
        }

        // 7. Crop, mapped against the post-geometry buffer.
        if include_crop && let Some(rect) = self.geometry.crop {
            img = geometry::apply_crop(&img, &rect);
        }

        Some(img)
    }

    /// Replace the base image with a flattened composite (an overlay commit
    /// or an external compositing result).  The preview proxy is rebuilt;
    /// stored parameters are untouched.
    pub fn bake(&mut self, flattened: RgbImage) {
        self.preview = build_preview(&flattened, self.preview_limit);
        self.source = flattened;
    }
}

/// Downscale so the longest side is at most `limit` (never upscales).
fn build_preview(source: &RgbImage, limit: u32) -> RgbImage {
    let (w, h) = source.dimensions();
    let longest = w.max(h);
    if longest <= limit || longest == 0 {
        return source.clone();
    }
    let scale = limit as f32 / longest as f32;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    imageops::resize(source, nw, nh, imageops::FilterType::Triangle)
}
