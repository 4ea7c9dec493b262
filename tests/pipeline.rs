use image::RgbImage;

use picforge::ops::{filters, geometry, tone};
use picforge::{CropRect, FilterId, ParamKey, Recipe, RenderPipeline, RenderTarget};

fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([(x * 13 % 256) as u8, (y * 17 % 256) as u8, ((x * y) % 256) as u8])
    })
}

#[test]
fn crop_returns_exact_top_left_block() {
    let src = gradient(10, 10);
    let mut pipeline = RenderPipeline::from_image(src.clone());
    pipeline.set_crop(Some(CropRect { x: 0.0, y: 0.0, w: 0.5, h: 0.5 }));

    let out = pipeline.render(RenderTarget::Final, true);
    assert_eq!(out.dimensions(), (5, 5));
    for y in 0..5 {
        for x in 0..5 {
            assert_eq!(out.get_pixel(x, y), src.get_pixel(x, y));
        }
    }
}

#[test]
fn include_crop_false_skips_the_crop() {
    let mut pipeline = RenderPipeline::from_image(gradient(10, 10));
    pipeline.set_crop(Some(CropRect { x: 0.0, y: 0.0, w: 0.5, h: 0.5 }));
    let out = pipeline.render(RenderTarget::Final, false);
    assert_eq!(out.dimensions(), (10, 10));
}

#[test]
fn hue_rotation_commutes_with_quarter_turn() {
    let img = gradient(12, 8);
    let a = tone::apply_hue_saturation(&geometry::rotate_quarter(&img, 1), 45, 0);
    let b = geometry::rotate_quarter(&tone::apply_hue_saturation(&img, 45, 0), 1);
    assert_eq!(a, b);
}

#[test]
fn crop_does_not_commute_with_free_rotation() {
    let img = gradient(20, 20);
    let rect = CropRect { x: 0.0, y: 0.0, w: 0.5, h: 0.5 };
    let crop_after = geometry::apply_crop(&geometry::rotate_free(&img, 30.0), &rect);
    let crop_before = geometry::rotate_free(&geometry::apply_crop(&img, &rect), 30.0);
    assert_eq!(crop_after.dimensions(), crop_before.dimensions());
    assert_ne!(crop_after, crop_before);
}

#[test]
fn pipeline_applies_rotation_before_crop() {
    let img = gradient(20, 20);
    let mut pipeline = RenderPipeline::from_image(img.clone());
    pipeline.set_rotation(30.0);
    pipeline.set_crop(Some(CropRect { x: 0.0, y: 0.0, w: 0.5, h: 0.5 }));

    let expected = geometry::apply_crop(
        &geometry::rotate_free(&img, 30.0),
        &CropRect { x: 0.0, y: 0.0, w: 0.5, h: 0.5 },
    );
    assert_eq!(pipeline.render(RenderTarget::Final, true), expected);
}

#[test]
fn preview_and_final_are_pixel_equal_on_a_same_size_proxy() {
    // With the proxy at full resolution, the only difference between the two
    // paths would be a skipped or reordered stage — there must be none.
    let mut pipeline = RenderPipeline::with_preview_limit(gradient(64, 48), 64);
    pipeline.set_param(ParamKey::Brightness, 25);
    pipeline.set_param(ParamKey::Contrast, -10);
    pipeline.set_param(ParamKey::Hue, 60);
    pipeline.set_param(ParamKey::Saturation, 30);
    pipeline.set_param(ParamKey::Highlights, -20);
    pipeline.set_param(ParamKey::Shadows, 15);
    pipeline.set_param(ParamKey::Sharpness, 40);
    pipeline.set_filter(FilterId::Vintage);
    pipeline.set_quarter_turns(1);
    pipeline.set_flip_horizontal(true);
    pipeline.set_rotation(12.5);
    pipeline.set_crop(Some(CropRect { x: 0.1, y: 0.1, w: 0.7, h: 0.6 }));

    let preview = pipeline.render(RenderTarget::Preview, true);
    let final_ = pipeline.render(RenderTarget::Final, true);
    assert_eq!(preview, final_);
}

#[test]
fn filter_stage_runs_before_tone() {
    // Negative then brightness is not the same as brightness then negative;
    // the pipeline must apply the filter first.
    let img = gradient(8, 8);
    let mut pipeline = RenderPipeline::from_image(img.clone());
    pipeline.set_filter(FilterId::Negative);
    pipeline.set_param(ParamKey::Brightness, 50);

    let filtered = filters::apply(FilterId::Negative, &img);
    let expected = tone::apply_lut(&filtered, &tone::build_bc_lut(50, 0));
    assert_eq!(pipeline.render(RenderTarget::Final, true), expected);
}

#[test]
fn recipe_round_trips_through_json() {
    let mut recipe = Recipe::default();
    recipe.tone.brightness = 12;
    recipe.tone.hue = -90;
    recipe.tone.sharpness = 33;
    recipe.geometry.rotation_deg = -7.5;
    recipe.geometry.quarter_turns = 3;
    recipe.geometry.flip_horizontal = true;
    recipe.geometry.crop = Some(CropRect { x: 0.1, y: 0.2, w: 0.5, h: 0.4 });
    recipe.filter = FilterId::Moody;

    let json = serde_json::to_string(&recipe).unwrap();
    let back: Recipe = serde_json::from_str(&json).unwrap();
    assert_eq!(back, recipe);
}

#[test]
fn recipe_with_missing_fields_uses_defaults() {
    let back: Recipe = serde_json::from_str(r#"{"filter":"mono"}"#).unwrap();
    assert_eq!(back.filter, FilterId::Mono);
    assert_eq!(back.tone.brightness, 0);
    assert!(back.geometry.crop.is_none());
}

#[test]
fn degenerate_crop_falls_back_to_no_crop() {
    let img = gradient(10, 10);
    let mut pipeline = RenderPipeline::from_image(img.clone());
    pipeline.set_crop(Some(CropRect { x: 0.9, y: 0.9, w: 0.0, h: 0.0 }));
    assert_eq!(pipeline.render(RenderTarget::Final, true), img);
}
