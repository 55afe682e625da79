use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chromacue_core::FactorSet;
use chromacue_experiment::{ExperimentConfig, ResultWriter, RunnerAction, TrialRunner};
use chromacue_render::{SceneRenderer, TextRenderer};
use chromacue_timing::{HighPrecisionTimer, Timer};
use rand::rngs::ThreadRng;
use tracing::{error, info};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub struct App {
    config: ExperimentConfig,
    window: Option<Arc<Window>>,
    pixels: Option<pixels::Pixels<'static>>,
    runner: TrialRunner<HighPrecisionTimer, ThreadRng>,
    scene: Option<SceneRenderer>,
    scene_rng: ThreadRng,
    writer: ResultWriter,
    audio: crate::audio::TonePlayer,
    frame_timer: HighPrecisionTimer,
    cursor: (f32, f32),
    should_exit: bool,
}

impl App {
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        let writer = ResultWriter::create(&config.results_path)?;
        let runner = TrialRunner::new(
            config.clone(),
            FactorSet::default(),
            HighPrecisionTimer::new(),
            rand::rng(),
        );
        Ok(Self {
            config,
            window: None,
            pixels: None,
            runner,
            scene: None,
            scene_rng: rand::rng(),
            writer,
            audio: crate::audio::TonePlayer::new(),
            frame_timer: HighPrecisionTimer::new(),
            cursor: (0.0, 0.0),
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!("press any key to begin; Esc aborts");
        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn load_font(&self) -> Result<TextRenderer> {
        if let Some(path) = &self.config.font_path {
            return TextRenderer::from_file(path);
        }
        let found = FONT_SEARCH_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(PathBuf::from)
            .ok_or_else(|| {
                anyhow::anyhow!("no usable font found; set font_path in the config file")
            })?;
        info!(font = %found.display(), "system font selected");
        TextRenderer::from_file(&found)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("no monitor available"))?;

        let attributes = Window::default_attributes()
            .with_title("Chromacue")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(width = size.width, height = size.height, "window created");

        let surface = pixels::SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(pixels::Pixels::new(size.width, size.height, surface)?);

        let wheel_diameter =
            (size.height as f32 * self.config.wheel_relative_size) as u32;
        self.scene = Some(SceneRenderer::new(
            size.width,
            size.height,
            self.config.box_size_px,
            self.config.mask_cells,
            wheel_diameter,
            self.config.font_size_px,
            self.load_font()?,
        )?);

        // The wheel is clicked with the mouse, so the cursor stays visible.
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let start = self.frame_timer.now();
        let display = self.runner.display();
        let (Some(scene), Some(pix)) = (self.scene.as_mut(), self.pixels.as_mut()) else {
            return Ok(());
        };
        scene.render(&display, pix.frame_mut())?;
        pix.render()?;
        let elapsed = self.frame_timer.elapsed(start);
        self.frame_timer.record_frame(elapsed);
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        let actions = self.runner.update()?;
        self.handle_actions(actions)
    }

    fn handle_actions(&mut self, actions: Vec<RunnerAction>) -> Result<()> {
        for action in actions {
            match action {
                RunnerAction::PlayTone {
                    freq_hz,
                    duration_ms,
                    volume,
                } => self.audio.play(freq_hz, duration_ms, volume),
                RunnerAction::TrialPrepared(setup) => {
                    if let Some(scene) = self.scene.as_mut() {
                        scene.prepare_trial(&setup, &mut self.scene_rng)?;
                    }
                }
                RunnerAction::TrialComplete(record) => self.writer.write(&record)?,
                RunnerAction::RunComplete => {
                    info!("all blocks finished");
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: PhysicalKey, event_loop: &ActiveEventLoop) {
        if let PhysicalKey::Code(KeyCode::Escape) = key {
            self.cleanup_and_exit(event_loop);
            return;
        }
        if self.runner.is_done() {
            self.cleanup_and_exit(event_loop);
            return;
        }
        match self.runner.handle_key() {
            Ok(Some(action)) => {
                if let Err(e) = self.handle_actions(vec![action]) {
                    error!(error = %e, "action failed");
                    self.cleanup_and_exit(event_loop);
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "key handling failed");
                self.cleanup_and_exit(event_loop);
            }
        }
    }

    fn handle_click(&mut self) {
        let Some(scene) = self.scene.as_ref() else {
            return;
        };
        if let Some(input) = scene.response_at(self.cursor.0, self.cursor.1) {
            self.runner.submit_response(input);
        }
    }

    fn handle_resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(pix) = self.pixels.as_mut() {
            if let Err(e) = pix.resize_surface(size.width, size.height) {
                error!(error = %e, "surface resize failed");
            }
            if let Err(e) = pix.resize_buffer(size.width, size.height) {
                error!(error = %e, "buffer resize failed");
            }
        }
        if let Some(scene) = self.scene.as_mut() {
            if let Err(e) = scene.resize(size.width, size.height) {
                error!(error = %e, "canvas resize failed");
            }
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if self.frame_timer.frame_count() > 0 {
            let stats = self.frame_timer.frame_stats();
            info!(
                frames = self.frame_timer.frame_count(),
                avg_ms = stats.average_frame_time_ns / 1e6,
                max_ms = stats.max_frame_time_ns / 1e6,
                fps = stats.effective_fps,
                "frame statistics"
            );
        }
        info!(results = %self.config.results_path.display(), "exiting");
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %e, "window setup failed");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render().and_then(|_| self.update()) {
                    error!(error = %e, "frame failed");
                    self.cleanup_and_exit(event_loop);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_key(event.physical_key, event_loop);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(),
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
