//! Procedural colour-patch mask.

use rand::Rng;
use thiserror::Error;
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaskError {
    #[error("mask cell count {0} is not a perfect square")]
    InvalidCellCount(u32),

    #[error("mask canvas must be non-empty")]
    EmptyCanvas,
}

/// Paints a k x k grid of independently random-coloured cells onto a
/// transparent square canvas.
///
/// `cell_count` must be a perfect square k². The cell edge is
/// `canvas_size_px / k` truncated, so a canvas not divisible by k keeps a
/// fully transparent remainder strip at the right and bottom edges. Cells
/// abut with zero gap; colours are drawn uniformly from `palette` with
/// replacement.
pub fn generate_mask<R: Rng>(
    canvas_size_px: u32,
    cell_count: u32,
    palette: &[[u8; 3]],
    rng: &mut R,
) -> Result<Pixmap, MaskError> {
    let k = cell_count.isqrt();
    if cell_count == 0 || k * k != cell_count {
        return Err(MaskError::InvalidCellCount(cell_count));
    }
    let mut pixmap =
        Pixmap::new(canvas_size_px, canvas_size_px).ok_or(MaskError::EmptyCanvas)?;
    if palette.is_empty() {
        return Ok(pixmap);
    }

    let edge = canvas_size_px / k;
    let mut paint = Paint::default();
    paint.anti_alias = false;

    for row in 0..k {
        for col in 0..k {
            let cell = palette[rng.random_range(0..palette.len())];
            paint.set_color(Color::from_rgba8(cell[0], cell[1], cell[2], 255));
            if let Some(rect) = Rect::from_xywh(
                (col * edge) as f32,
                (row * edge) as f32,
                edge as f32,
                edge as f32,
            ) {
                pixmap.fill_rect(rect, &paint, Transform::identity(), None);
            }
        }
    }
    Ok(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const PALETTE: [[u8; 3]; 3] = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];

    fn rgb_at(pm: &Pixmap, x: u32, y: u32) -> ([u8; 3], u8) {
        let p = pm.pixel(x, y).unwrap();
        ([p.red(), p.green(), p.blue()], p.alpha())
    }

    #[test]
    fn evenly_divisible_canvas_tiles_exactly() {
        let mut rng = StdRng::seed_from_u64(1);
        let pm = generate_mask(98, 49, &PALETTE, &mut rng).unwrap();
        assert_eq!(pm.width(), 98);

        // 7x7 grid of 14-px cells; every corner pixel is opaque.
        for (x, y) in [(0, 0), (97, 0), (0, 97), (97, 97)] {
            let (_, alpha) = rgb_at(&pm, x, y);
            assert_eq!(alpha, 255, "pixel ({x},{y}) should be opaque");
        }

        // A cell is uniformly one palette colour.
        let (top_left, _) = rgb_at(&pm, 0, 0);
        let (same_cell, _) = rgb_at(&pm, 13, 13);
        assert_eq!(top_left, same_cell);
        assert!(PALETTE.contains(&top_left));
    }

    #[test]
    fn indivisible_canvas_leaves_transparent_remainder() {
        let mut rng = StdRng::seed_from_u64(2);
        let pm = generate_mask(100, 49, &PALETTE, &mut rng).unwrap();

        // floor(100 / 7) = 14, so the tiled region ends at 98.
        let (_, alpha) = rgb_at(&pm, 97, 97);
        assert_eq!(alpha, 255);
        for (x, y) in [(98, 0), (99, 50), (0, 98), (50, 99), (99, 99)] {
            let (_, alpha) = rgb_at(&pm, x, y);
            assert_eq!(alpha, 0, "remainder pixel ({x},{y}) should be transparent");
        }
    }

    #[test]
    fn non_square_cell_count_is_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = generate_mask(98, 48, &PALETTE, &mut rng).unwrap_err();
        assert_eq!(err, MaskError::InvalidCellCount(48));
        assert_eq!(
            generate_mask(98, 0, &PALETTE, &mut rng).unwrap_err(),
            MaskError::InvalidCellCount(0)
        );
    }

    #[test]
    fn cells_vary_across_the_grid() {
        let mut rng = StdRng::seed_from_u64(4);
        let pm = generate_mask(98, 49, &PALETTE, &mut rng).unwrap();
        let mut seen = std::collections::HashSet::new();
        for row in 0..7 {
            for col in 0..7 {
                let (rgb, _) = rgb_at(&pm, col * 14 + 7, row * 14 + 7);
                assert!(PALETTE.contains(&rgb));
                seen.insert(rgb);
            }
        }
        // 49 independent draws from 3 colours essentially never agree.
        assert!(seen.len() > 1);
    }
}
