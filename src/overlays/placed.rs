// ============================================================================
// PLACED ITEMS — shared affine math for rotatable, hit-testable overlay items
// ============================================================================
//
// Every placed item (sticker, label) is a center + size + rotation angle.
// Interaction works in the item's un-rotated local frame: the pointer is
// mapped through the inverse transform once, then handle zones and the body
// rect are plain axis-aligned tests.
// ============================================================================

use image::RgbaImage;

/// Pointer-to-handle hit distance (manhattan, in overlay pixels).
pub const HANDLE_HIT_RADIUS: f32 = 25.0;

/// Interaction zones of a selected item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    /// Top-left corner: removes the item.
    Delete,
    /// Bottom-right corner: one drag sets both size and rotation.
    ResizeRotate,
    /// Anywhere inside the rect: drag to move.
    Body,
}

/// Map an overlay-space point into an item's local frame: origin at the item
/// center, axes un-rotated.
pub fn map_to_local(pos: (f32, f32), center: (f32, f32), angle_deg: f32) -> (f32, f32) {
    let (sin, cos) = (-angle_deg).to_radians().sin_cos();
    let dx = pos.0 - center.0;
    let dy = pos.1 - center.1;
    (dx * cos - dy * sin, dx * sin + dy * cos)
}

/// Hit-test a pointer against an item.  Handles win over the body; corners
/// are tested in local coordinates so rotation never skews the zones.
pub fn hit_test(
    pos: (f32, f32),
    center: (f32, f32),
    width: f32,
    height: f32,
    angle_deg: f32,
) -> Option<Handle> {
    let (lx, ly) = map_to_local(pos, center, angle_deg);
    let hw = width * 0.5;
    let hh = height * 0.5;

    let manhattan = |x: f32, y: f32| (lx - x).abs() + (ly - y).abs();
    if manhattan(-hw, -hh) < HANDLE_HIT_RADIUS {
        return Some(Handle::Delete);
    }
    if manhattan(hw, hh) < HANDLE_HIT_RADIUS {
        return Some(Handle::ResizeRotate);
    }
    if lx.abs() <= hw && ly.abs() <= hh {
        return Some(Handle::Body);
    }
    None
}

/// Corner-handle drag: the vector from the item center to the pointer fixes
/// both the new rotation and the new diagonal length.
///
/// The rotation is measured against the corner's resting direction
/// `atan2(h, w)`; the new width follows from the diagonal and the aspect
/// ratio (`w² + (w/ratio)² = diag²`), floored at `min_width`.
pub fn resize_rotate(
    pos: (f32, f32),
    center: (f32, f32),
    ratio: f32,
    min_width: f32,
) -> (f32, f32) {
    let dx = pos.0 - center.0;
    let dy = pos.1 - center.1;

    let ratio = if ratio.abs() < 1e-6 { 1.0 } else { ratio };
    let corner_dir = (1.0f32 / ratio).atan2(1.0).to_degrees();
    let angle = dy.atan2(dx).to_degrees() - corner_dir;

    let diag = (dx * dx + dy * dy).sqrt() * 2.0;
    let width = (diag / (1.0 + 1.0 / (ratio * ratio)).sqrt()).max(min_width);

    (angle, width)
}

/// Draw `face` into `dst` as a `width`×`height` rect centered on `center`,
/// rotated by `angle_deg`.  Inverse-mapped bilinear sampling over the
/// rotated bounding box, composited with the straight-alpha "over" rule.
pub fn render_rotated_into(
    dst: &mut RgbaImage,
    face: &RgbaImage,
    center: (f32, f32),
    width: f32,
    height: f32,
    angle_deg: f32,
) {
    if face.width() == 0 || face.height() == 0 || width < 1.0 || height < 1.0 {
        return;
    }

    let dw = dst.width() as i32;
    let dh = dst.height() as i32;
    let hw = width * 0.5;
    let hh = height * 0.5;

    // Bounding box of the rotated rect, clamped to the destination.
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let ext_x = hw * cos.abs() + hh * sin.abs();
    let ext_y = hw * sin.abs() + hh * cos.abs();
    let x0 = ((center.0 - ext_x).floor() as i32).max(0);
    let x1 = ((center.0 + ext_x).ceil() as i32).min(dw - 1);
    let y0 = ((center.1 - ext_y).floor() as i32).max(0);
    let y1 = ((center.1 + ext_y).ceil() as i32).min(dh - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }

    let scale_x = face.width() as f32 / width;
    let scale_y = face.height() as f32 / height;

    for y in y0..=y1 {
        for x in x0..=x1 {
            let (lx, ly) = map_to_local((x as f32 + 0.5, y as f32 + 0.5), center, angle_deg);
            if lx < -hw || lx > hw || ly < -hh || ly > hh {
                continue;
            }
            let src = sample_bilinear(face, (lx + hw) * scale_x - 0.5, (ly + hh) * scale_y - 0.5);
            if src[3] <= 0.0 {
                continue;
            }

            let p = dst.get_pixel_mut(x as u32, y as u32);
            let sa = src[3] / 255.0;
            let da = p[3] as f32 / 255.0;
            let oa = sa + da * (1.0 - sa);
            if oa <= 0.0 {
                continue;
            }
            for c in 0..3 {
                let sc = src[c];
                let dc = p[c] as f32;
                p[c] = ((sc * sa + dc * da * (1.0 - sa)) / oa).round().clamp(0.0, 255.0) as u8;
            }
            p[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Bilinear sample with transparent beyond the edges.
fn sample_bilinear(img: &RgbaImage, x: f32, y: f32) -> [f32; 4] {
    let w = img.width() as i32;
    let h = img.height() as i32;
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        // Clamp instead of transparent so edges don't get a dark fringe.
        let sx = sx.clamp(0, w - 1);
        let sy = sy.clamp(0, h - 1);
        let p = img.get_pixel(sx as u32, sy as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = tl[c] + (tr[c] - tl[c]) * fx;
        let bot = bl[c] + (br[c] - bl[c]) * fx;
        out[c] = top + (bot - top) * fy;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mapping_undoes_rotation() {
        // A point directly right of center, item rotated 90°: locally it
        // sits on the -y axis (the item's "up" edge midpoint).
        let (lx, ly) = map_to_local((110.0, 100.0), (100.0, 100.0), 90.0);
        assert!(lx.abs() < 1e-4);
        assert!((ly + 10.0).abs() < 1e-4);
    }

    #[test]
    fn body_hit_respects_rotation() {
        // 120×40 item rotated 90°: a point 50px above center is inside.
        let hit = hit_test((100.0, 50.0), (100.0, 100.0), 120.0, 40.0, 90.0);
        assert_eq!(hit, Some(Handle::Body));
        // The same point misses when the item is unrotated.
        let miss = hit_test((100.0, 50.0), (100.0, 100.0), 120.0, 40.0, 0.0);
        assert_eq!(miss, None);
    }

    #[test]
    fn corner_drag_along_the_diagonal_keeps_angle_zero() {
        // Square item: dragging straight toward the resting corner direction
        // (45°) rotates nothing and doubles with distance.
        let d = 50.0f32 / 2.0f32.sqrt();
        let (angle, width) = resize_rotate((100.0 + d, 100.0 + d), (100.0, 100.0), 1.0, 30.0);
        assert!(angle.abs() < 1e-3);
        // diag = 100, w = 100/sqrt(2)
        assert!((width - 100.0 / 2.0f32.sqrt()).abs() < 1e-2);
    }

    #[test]
    fn resize_never_collapses_below_minimum() {
        let (_, width) = resize_rotate((101.0, 100.0), (100.0, 100.0), 1.5, 30.0);
        assert_eq!(width, 30.0);
    }

    #[test]
    fn unrotated_blit_centers_the_face() {
        let mut dst = RgbaImage::new(40, 40);
        let face = RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]));
        render_rotated_into(&mut dst, &face, (20.0, 20.0), 10.0, 10.0, 0.0);
        assert_eq!(dst.get_pixel(20, 20).0, [255, 0, 0, 255]);
        assert_eq!(dst.get_pixel(5, 5).0, [0, 0, 0, 0]);
    }
}
