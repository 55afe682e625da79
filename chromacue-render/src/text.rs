//! Text rasterisation with a per-string pixmap cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use anyhow::{Context, Result};
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

/// Renders single-line strings into cached pixmaps. Keys include the pixel
/// size so feedback text and cue labels can share one renderer.
pub struct TextRenderer {
    font: FontArc,
    cache: HashMap<(String, u32), Arc<Pixmap>>,
}

impl TextRenderer {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            cache: HashMap::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading font {}", path.display()))?;
        let font = FontArc::try_from_vec(data)
            .with_context(|| format!("parsing font {}", path.display()))?;
        Ok(Self::new(font))
    }

    pub fn get(&mut self, text: &str, size_px: f32) -> Arc<Pixmap> {
        let key = (text.to_owned(), size_px.round() as u32);
        if let Some(pm) = self.cache.get(&key) {
            return Arc::clone(pm);
        }
        let pm = Arc::new(render_text_pixmap(
            text,
            size_px,
            &self.font,
            Color::from_rgba8(255, 255, 255, 255),
        ));
        self.cache.insert(key, Arc::clone(&pm));
        pm
    }
}

/// Lays out and rasterises one line of text into a tightly-bounded
/// transparent pixmap, premultiplied throughout.
pub fn render_text_pixmap(text: &str, font_size: f32, font: &FontArc, color: Color) -> Pixmap {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with the baseline at the ascent.
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    // Union of the outlined pixel bounds.
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
    }

    // Whitespace-only strings have no outlines.
    if min_x == f32::INFINITY {
        return Pixmap::new(1, 1).expect("pixmap");
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h).expect("pixmap");

    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();
    let cu = [
        (color.red() * 255.0) as u8,
        (color.green() * 255.0) as u8,
        (color.blue() * 255.0) as u8,
        (color.alpha() * 255.0) as u8,
    ];

    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            out.draw(|x, y, cov| {
                if cov <= f32::EPSILON {
                    return;
                }
                let ix = (x as f32 + b.min.x - min_x).floor() as i32;
                let iy = (y as f32 + b.min.y - min_y).floor() as i32;
                if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                    return;
                }
                let i = iy as usize * stride + ix as usize;

                // Premultiply by coverage, then Porter-Duff over onto the
                // (initially transparent) canvas so kerned glyphs overlap
                // cleanly.
                let a_lin = (cov * cu[3] as f32 / 255.0).clamp(0.0, 1.0);
                let sr = (cu[0] as f32 * a_lin) as u8;
                let sg = (cu[1] as f32 * a_lin) as u8;
                let sb = (cu[2] as f32 * a_lin) as u8;
                let sa = (a_lin * 255.0) as u8;

                let bg = dst[i];
                let inv = 1.0 - (sa as f32 / 255.0);
                let r = sr.saturating_add((bg.red() as f32 * inv) as u8);
                let g2 = sg.saturating_add((bg.green() as f32 * inv) as u8);
                let b2 = sb.saturating_add((bg.blue() as f32 * inv) as u8);
                let a = sa.saturating_add((bg.alpha() as f32 * inv) as u8);
                if let Some(px) = PremultipliedColorU8::from_rgba(r, g2, b2, a) {
                    dst[i] = px;
                }
            });
        }
    }

    pm
}

/// Finds an installed font for tests; font-dependent tests skip quietly on
/// machines without one.
#[cfg(test)]
pub(crate) fn any_test_font() -> Option<FontArc> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    ]
    .iter()
    .find_map(|p| {
        std::fs::read(p)
            .ok()
            .and_then(|d| FontArc::try_from_vec(d).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_renders_to_a_unit_pixmap() {
        let Some(font) = any_test_font() else { return };
        let pm = render_text_pixmap("   ", 28.0, &font, Color::WHITE);
        assert_eq!((pm.width(), pm.height()), (1, 1));
    }

    #[test]
    fn cache_returns_the_same_pixmap_for_repeat_strings() {
        let Some(font) = any_test_font() else { return };
        let mut text = TextRenderer::new(font);
        let a = text.get("Accuracy: 95.0%", 28.0);
        let b = text.get("Accuracy: 95.0%", 28.0);
        assert!(Arc::ptr_eq(&a, &b));
        let c = text.get("Accuracy: 95.0%", 40.0);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn rendered_text_is_non_empty_and_white() {
        let Some(font) = any_test_font() else { return };
        let pm = render_text_pixmap("LONG", 32.0, &font, Color::WHITE);
        assert!(pm.width() > 10);
        assert!(pm.height() > 10);
        let lit = pm.pixels().iter().filter(|p| p.alpha() > 0).count();
        assert!(lit > 0);
    }
}
