//! Colour-wheel rasterisation and click hit-testing.

use chromacue_core::ColorWheel;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Fraction of the outer radius taken up by the annulus band.
const BAND_FRAC: f32 = 0.25;

/// Screen geometry of the displayed wheel annulus. Angle 0 is at
/// 12 o'clock and increases clockwise, matching rasterisation, so a
/// hit-tested angle indexes the same colour the participant clicked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelGeometry {
    pub center: (f32, f32),
    pub outer_radius: f32,
    pub inner_radius: f32,
}

impl WheelGeometry {
    pub fn centered(center: (f32, f32), diameter_px: u32) -> Self {
        let outer = diameter_px as f32 / 2.0;
        Self {
            center,
            outer_radius: outer,
            inner_radius: outer * (1.0 - BAND_FRAC),
        }
    }

    /// Maps a screen point to a wheel angle if it falls on the annulus.
    pub fn angle_at(&self, x: f32, y: f32) -> Option<f64> {
        let dx = (x - self.center.0) as f64;
        let dy = (y - self.center.1) as f64;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < self.inner_radius as f64 || dist > self.outer_radius as f64 {
            return None;
        }
        Some(dx.atan2(-dy).to_degrees().rem_euclid(360.0))
    }
}

/// Rasterises the wheel as an annulus; everything off the band stays
/// transparent.
pub fn render_wheel(wheel: &ColorWheel, diameter_px: u32) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(diameter_px, diameter_px)?;
    let local = WheelGeometry::centered(
        (diameter_px as f32 / 2.0, diameter_px as f32 / 2.0),
        diameter_px,
    );

    let width = pixmap.width() as usize;
    let pixels = pixmap.pixels_mut();
    for y in 0..diameter_px {
        for x in 0..diameter_px {
            if let Some(angle) = local.angle_at(x as f32 + 0.5, y as f32 + 0.5) {
                let [r, g, b] = wheel.color_from_angle(angle);
                if let Some(px) = PremultipliedColorU8::from_rgba(r, g, b, 255) {
                    pixels[y as usize * width + x as usize] = px;
                }
            }
        }
    }
    Some(pixmap)
}
