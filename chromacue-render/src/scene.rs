//! Frame composition: one offscreen canvas, per-trial pixmaps, and a
//! premultiplied blitter with an opaque fast path.

use anyhow::Result;
use bytemuck::{cast_slice, cast_slice_mut};
use chromacue_core::{ColorWheel, Display, ResponseInput, TrialSetup};
use rand::Rng;
use tiny_skia::{Color, Pixmap};

use crate::mask::{generate_mask, MaskError};
use crate::stimuli::{filled_square, fixation_cross};
use crate::text::TextRenderer;
use crate::wheel::{render_wheel, WheelGeometry};

const FIXATION_SIZE_PX: u32 = 40;
const FIXATION_THICKNESS_PX: u32 = 2;
const LINE_GAP_FRAC: f32 = 1.6;

/// Owns the offscreen canvas and every pixmap a trial needs. The runner
/// hands it a [`TrialSetup`] once per trial and a [`Display`] once per
/// frame; clicks come back through [`SceneRenderer::response_at`].
pub struct SceneRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),

    text: TextRenderer,
    font_size: f32,
    box_px: u32,
    mask_cells: u32,
    wheel_diameter: u32,

    canvas: Pixmap,
    fixation: Pixmap,

    // Per-trial state, replaced on prepare_trial.
    target: Option<Pixmap>,
    mask: Option<Pixmap>,
    wheel_pixmap: Option<Pixmap>,
    wheel: Option<ColorWheel>,
    wheel_geometry: Option<WheelGeometry>,
}

impl SceneRenderer {
    pub fn new(
        width: u32,
        height: u32,
        box_px: u32,
        mask_cells: u32,
        wheel_diameter: u32,
        font_size: f32,
        text: TextRenderer,
    ) -> Result<Self> {
        let mut canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow::anyhow!("zero-sized canvas"))?;
        canvas.fill(Color::from_rgba8(0, 0, 0, 255));

        Ok(Self {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            text,
            font_size,
            box_px,
            mask_cells,
            wheel_diameter,
            canvas,
            fixation: fixation_cross(FIXATION_SIZE_PX, FIXATION_THICKNESS_PX),
            target: None,
            mask: None,
            wheel_pixmap: None,
            wheel: None,
            wheel_geometry: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.center = (width as f32 / 2.0, height as f32 / 2.0);
        self.canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow::anyhow!("zero-sized canvas"))?;
        self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));
        if self.wheel_geometry.is_some() {
            self.wheel_geometry = Some(WheelGeometry::centered(self.center, self.wheel_diameter));
        }
        Ok(())
    }

    /// Regenerates the target patch, mask, and wheel for one trial.
    pub fn prepare_trial<R: Rng>(
        &mut self,
        setup: &TrialSetup,
        rng: &mut R,
    ) -> Result<(), MaskError> {
        let wheel = ColorWheel::with_rotation(setup.wheel_rotation_deg);
        self.mask = Some(generate_mask(
            self.box_px,
            self.mask_cells,
            wheel.colors(),
            rng,
        )?);
        self.wheel_pixmap = render_wheel(&wheel, self.wheel_diameter);
        self.wheel_geometry = Some(WheelGeometry::centered(self.center, self.wheel_diameter));
        self.target = Some(filled_square(self.box_px, setup.target_color));
        self.wheel = Some(wheel);
        Ok(())
    }

    /// Maps a click to a wheel response, if the wheel is up and the click
    /// landed on the band.
    pub fn response_at(&self, x: f32, y: f32) -> Option<ResponseInput> {
        let angle_deg = self.wheel_geometry?.angle_at(x, y)?;
        let wheel = self.wheel.as_ref()?;
        Some(ResponseInput {
            angle_deg,
            color: wheel.color_from_angle(angle_deg),
        })
    }

    /// Draws `display` onto the canvas and copies it into `frame` (RGBA8,
    /// same dimensions as the renderer).
    pub fn render(&mut self, display: &Display, frame: &mut [u8]) -> Result<()> {
        self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));
        let center = self.center;

        match display {
            Display::BlockIntro {
                block_num,
                blocks,
                practicing,
            } => {
                let mut lines = vec![format!("Block {block_num} of {blocks}")];
                if *practicing {
                    lines.push("(practice block)".to_owned());
                }
                lines.push("Press any key to begin.".to_owned());
                self.blit_lines(&lines, center, 1.0);
            }
            Display::Cue { label } => {
                let pm = self.text.get(label, self.font_size * 1.5);
                blit_onto(&mut self.canvas, &pm, center);
            }
            Display::Blank => {}
            Display::Fixation => {
                blit_onto(&mut self.canvas, &self.fixation, center);
            }
            Display::Target { color } => {
                // prepare_trial built this patch; fall back for safety.
                match &self.target {
                    Some(pm) => blit_onto(&mut self.canvas, pm, center),
                    None => {
                        blit_onto(&mut self.canvas, &filled_square(self.box_px, *color), center)
                    }
                }
            }
            Display::Mask => {
                if let Some(pm) = &self.mask {
                    blit_onto(&mut self.canvas, pm, center);
                }
            }
            Display::Wheel => {
                if let Some(pm) = &self.wheel_pixmap {
                    blit_onto(&mut self.canvas, pm, center);
                }
            }
            Display::Feedback {
                target,
                response,
                accuracy_pct,
            } => {
                let offset = self.box_px as f32;
                blit_onto(
                    &mut self.canvas,
                    &filled_square(self.box_px, *target),
                    (center.0 - offset, center.1),
                );
                blit_onto(
                    &mut self.canvas,
                    &filled_square(self.box_px, *response),
                    (center.0 + offset, center.1),
                );

                // accuracy_pct arrives as a 0..1 fraction.
                let accuracy = self.text.get(
                    &format!("Accuracy: {:.1}%", accuracy_pct * 100.0),
                    self.font_size,
                );
                blit_onto(
                    &mut self.canvas,
                    &accuracy,
                    (center.0, center.1 - offset * 1.5),
                );

                let label_y = center.1 + offset * 1.2;
                let actual = self.text.get("Actual", self.font_size * 0.8);
                blit_onto(&mut self.canvas, &actual, (center.0 - offset, label_y));
                let picked = self.text.get("Response", self.font_size * 0.8);
                blit_onto(&mut self.canvas, &picked, (center.0 + offset, label_y));
            }
            Display::TimeoutNotice => {
                let pm = self.text.get("Response timeout!", self.font_size);
                blit_onto(&mut self.canvas, &pm, center);
            }
            Display::Done => {
                self.blit_lines(
                    &[
                        "All done.".to_owned(),
                        "Thank you for taking part!".to_owned(),
                    ],
                    center,
                    1.0,
                );
            }
        }

        let data = self.canvas.data();
        let n = frame.len().min(data.len());
        frame[..n].copy_from_slice(&data[..n]);
        Ok(())
    }

    fn blit_lines(&mut self, lines: &[String], center: (f32, f32), scale: f32) {
        let size = self.font_size * scale;
        let gap = size * LINE_GAP_FRAC;
        let top = center.1 - gap * (lines.len() as f32 - 1.0) / 2.0;
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let pm = self.text.get(line, size);
            blit_onto(&mut self.canvas, &pm, (center.0, top + gap * i as f32));
        }
    }
}

/// Blits `src` centred at `pos`, clipping to the canvas. Fully opaque rows
/// take a memcpy path; everything else blends premultiplied over u32 words.
fn blit_onto(canvas: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let (cw, ch) = (canvas.width() as usize, canvas.height() as usize);

    let x = (pos.0 - w as f32 * 0.5).floor() as i32;
    let y = (pos.1 - h as f32 * 0.5).floor() as i32;

    if x + w as i32 <= 0 || y + h as i32 <= 0 || x >= cw as i32 || y >= ch as i32 {
        return;
    }

    let dst_x = x.max(0) as usize;
    let dst_y = y.max(0) as usize;
    let src_x = (-x).max(0) as usize;
    let src_y = (-y).max(0) as usize;
    let copy_w = (w - src_x).min(cw - dst_x);
    let copy_h = (h - src_y).min(ch - dst_y);
    if copy_w == 0 || copy_h == 0 {
        return;
    }

    let src_data = src.data();
    let src_row_bytes = w * 4;
    let fully_opaque = (0..copy_h).all(|row| {
        let start = (src_y + row) * src_row_bytes + src_x * 4;
        src_data[start..start + copy_w * 4]
            .iter()
            .skip(3)
            .step_by(4)
            .all(|&a| a == 255)
    });

    let src_u32: &[u32] = cast_slice(src_data);
    let dst_u32: &mut [u32] = cast_slice_mut(canvas.data_mut());

    for row in 0..copy_h {
        let src_start = (src_y + row) * w + src_x;
        let dst_start = (dst_y + row) * cw + dst_x;

        if fully_opaque {
            dst_u32[dst_start..dst_start + copy_w]
                .copy_from_slice(&src_u32[src_start..src_start + copy_w]);
            continue;
        }
        for i in 0..copy_w {
            let s = src_u32[src_start + i];
            let d = dst_u32[dst_start + i];

            let sa = (s >> 24) & 0xFF;
            let inv = 255 - sa;

            let sr = s & 0xFF;
            let sg = (s >> 8) & 0xFF;
            let sb = (s >> 16) & 0xFF;
            let dr = d & 0xFF;
            let dg = (d >> 8) & 0xFF;
            let db = (d >> 16) & 0xFF;
            let da = (d >> 24) & 0xFF;

            let r = sr + (dr * inv + 127) / 255;
            let g = sg + (dg * inv + 127) / 255;
            let b = sb + (db * inv + 127) / 255;
            let a = sa + (da * inv + 127) / 255;

            dst_u32[dst_start + i] = (a << 24) | (b << 16) | (g << 8) | r;
        }
    }
}
