//! Fixed stimuli: the fixation cross and the target patch.

use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

/// White cross of `size` px extent with `thickness`-px bars.
pub fn fixation_cross(size: u32, thickness: u32) -> Pixmap {
    let size = size.max(thickness).max(1);
    let mut pm = Pixmap::new(size, size).expect("pixmap");

    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(Color::from_rgba8(255, 255, 255, 255));

    let mid = (size as f32 - thickness as f32) * 0.5;
    if let Some(h) = Rect::from_xywh(0.0, mid, size as f32, thickness as f32) {
        pm.fill_rect(h, &paint, Transform::identity(), None);
    }
    if let Some(v) = Rect::from_xywh(mid, 0.0, thickness as f32, size as f32) {
        pm.fill_rect(v, &paint, Transform::identity(), None);
    }
    pm
}

/// Opaque square of side `edge` px in the given colour.
pub fn filled_square(edge: u32, color: [u8; 3]) -> Pixmap {
    let edge = edge.max(1);
    let mut pm = Pixmap::new(edge, edge).expect("pixmap");
    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(Color::from_rgba8(color[0], color[1], color[2], 255));
    if let Some(rect) = Rect::from_xywh(0.0, 0.0, edge as f32, edge as f32) {
        pm.fill_rect(rect, &paint, Transform::identity(), None);
    }
    pm
}
