//! Constant-lightness CIELUV hue circle for the response wheel.
//!
//! Every entry sits at the same L* and C*(uv), so the wheel varies only in
//! hue. Out-of-gamut hues are clamped after conversion to sRGB.

const WHEEL_L: f64 = 70.0;
const WHEEL_C: f64 = 38.0;

// D65 reference white.
const XN: f64 = 0.95047;
const YN: f64 = 1.0;
const ZN: f64 = 1.08883;

fn white_uv() -> (f64, f64) {
    let d = XN + 15.0 * YN + 3.0 * ZN;
    (4.0 * XN / d, 9.0 * YN / d)
}

fn srgb_gamma(c: f64) -> f64 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// LCh(uv) at the wheel's fixed L*/C* for hue `h_deg`, as clamped sRGB.
fn hue_to_rgb(h_deg: f64) -> [u8; 3] {
    let h = h_deg.to_radians();
    let u_star = WHEEL_C * h.cos();
    let v_star = WHEEL_C * h.sin();

    let (un, vn) = white_uv();
    let u_prime = u_star / (13.0 * WHEEL_L) + un;
    let v_prime = v_star / (13.0 * WHEEL_L) + vn;

    let y = if WHEEL_L > 8.0 {
        YN * ((WHEEL_L + 16.0) / 116.0).powi(3)
    } else {
        YN * WHEEL_L * (3.0 / 29.0_f64).powi(3)
    };
    let x = y * 9.0 * u_prime / (4.0 * v_prime);
    let z = y * (12.0 - 3.0 * u_prime - 20.0 * v_prime) / (4.0 * v_prime);

    let r_lin = 3.2406 * x - 1.5372 * y - 0.4986 * z;
    let g_lin = -0.9689 * x + 1.8758 * y + 0.0415 * z;
    let b_lin = 0.0557 * x - 0.2040 * y + 1.0570 * z;

    let to_u8 = |c: f64| (srgb_gamma(c.clamp(0.0, 1.0)) * 255.0).round() as u8;
    [to_u8(r_lin), to_u8(g_lin), to_u8(b_lin)]
}

/// The 360-entry hue circle; index is degrees.
pub fn hue_circle() -> Vec<[u8; 3]> {
    (0..360).map(|h| hue_to_rgb(h as f64)).collect()
}

/// Colour wheel with a per-trial rotation. Rotation is a pure index shift:
/// the colour displayed at screen angle `a` is the table entry at
/// `(a + rotation) mod 360`.
#[derive(Debug, Clone)]
pub struct ColorWheel {
    colors: Vec<[u8; 3]>,
    pub rotation_deg: u16,
}

impl ColorWheel {
    pub fn new() -> Self {
        Self {
            colors: hue_circle(),
            rotation_deg: 0,
        }
    }

    pub fn with_rotation(rotation_deg: u16) -> Self {
        let mut wheel = Self::new();
        wheel.rotation_deg = rotation_deg % 360;
        wheel
    }

    /// Colour currently displayed at `angle_deg` on the wheel.
    pub fn color_from_angle(&self, angle_deg: f64) -> [u8; 3] {
        let idx = (angle_deg + self.rotation_deg as f64).rem_euclid(360.0) as usize % 360;
        self.colors[idx]
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }
}

impl Default for ColorWheel {
    fn default() -> Self {
        Self::new()
    }
}
