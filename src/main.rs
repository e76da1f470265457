//! Demo driver.
//!
//! ```text
//! pixdust [--headless] [--frames N] [--config FILE] IMAGE...
//! ```
//!
//! Windowed mode forwards pointer input to the controller and reports field
//! statistics in the window title; press `N` for the next image. Headless mode
//! runs a fixed number of frames with a scripted pointer circling the centre.

use clap::Parser;
use pixdust::prelude::*;
use pixdust::render::BackendStats;
use std::cell::RefCell;
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::rc::Rc;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Seconds an image stays fully visible before the demo moves on.
const SWITCH_EVERY: f32 = 6.0;

/// Interactive image particle fields.
#[derive(Parser, Debug)]
#[command(name = "pixdust")]
#[command(about = "Show images as interactive particle fields", long_about = None)]
#[command(version)]
struct Cli {
    /// Run without a window, driving a scripted pointer
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 1200)]
    frames: u32,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Images to cycle through, in order
    #[arg(required = true)]
    images: Vec<String>,
}

struct App {
    controller: Controller,
    stats: Rc<RefCell<BackendStats>>,
    clock: FrameClock,
    pointer: PointerTracker,
    window: Option<Window>,
    shown_for: f32,
}

impl App {
    fn frame(&mut self) {
        let dt = self.clock.tick();
        advance(&mut self.controller, &mut self.shown_for, dt);

        if let Some(window) = &self.window {
            let particles = self
                .controller
                .current_field()
                .map_or(0, ParticleField::visible_count);
            window.set_title(&format!(
                "pixdust - {:?} - {} particles - {:.0} fps - {} touches",
                self.controller.state(),
                particles,
                self.clock.fps(),
                self.controller.touch().active_count()
            ));
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("pixdust")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let size = window.inner_size();
                self.pointer.set_viewport(size.width, size.height);
                self.controller.resize(self.pointer.viewport());
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(pointer) = self.pointer.handle_event(&event) {
            self.controller.pointer_move(pointer);
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(_) => self.controller.resize(self.pointer.viewport()),
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyN) => {
                        self.controller.next();
                        self.shown_for = 0.0;
                    }
                    PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Tick once, log events, and move on after an image has been shown long enough.
fn advance(controller: &mut Controller, shown_for: &mut f32, dt: f32) {
    if controller.state() == ControllerState::Visible {
        *shown_for += dt;
        if *shown_for >= SWITCH_EVERY {
            controller.next();
            *shown_for = 0.0;
        }
    }
    for event in controller.tick(dt) {
        log::info!("{:?}", event);
    }
}

fn run_headless(mut controller: Controller, stats: Rc<RefCell<BackendStats>>, frames: u32) {
    let mut clock = FrameClock::fixed(1.0 / 60.0);
    let mut pointer = PointerTracker::new(controller.viewport());
    let mut shown_for = 0.0;

    for frame in 0..frames {
        let angle = frame as f32 / 120.0 * TAU;
        let viewport = pointer.viewport();
        let position = viewport * 0.5 + Vec2::new(angle.cos(), angle.sin()) * viewport.y * 0.2;
        controller.pointer_move(pointer.move_to(position));

        advance(&mut controller, &mut shown_for, clock.tick());
    }

    let stats = stats.borrow();
    log::info!(
        "Ran {} frames: {} uploads, {} releases, {} draws, {} live fields",
        frames,
        stats.uploads,
        stats.releases,
        stats.draws,
        stats.live.len()
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    let backend = RecordingBackend::new().with_displacement();
    let stats = backend.stats();
    let mut controller = match Controller::builder()
        .source(FsImageSource::new())
        .backend(backend)
        .config(config)
        .images(cli.images)
        .build()
    {
        Ok(controller) => controller,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    controller.next();

    if cli.headless {
        run_headless(controller, stats, cli.frames);
        return;
    }

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        controller,
        stats,
        clock: FrameClock::new(),
        pointer: PointerTracker::default(),
        window: None,
        shown_for: 0.0,
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
    }

    let stats = app.stats.borrow();
    log::info!("{} draws, {} fields uploaded", stats.draws, stats.uploads);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["pixdust", "a.png", "b.png"]).unwrap();
        assert!(!cli.headless);
        assert_eq!(cli.frames, 1200);
        assert!(cli.config.is_none());
        assert_eq!(cli.images, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_cli_all_flags() {
        let cli =
            Cli::try_parse_from(["pixdust", "--headless", "--frames", "30", "--config", "cfg.json", "a.png"]).unwrap();
        assert!(cli.headless);
        assert_eq!(cli.frames, 30);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
        assert_eq!(cli.images, vec!["a.png"]);
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        let err = Cli::try_parse_from(["pixdust", "--confg", "cfg.json", "a.png"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_rejects_bad_frame_count() {
        let err = Cli::try_parse_from(["pixdust", "--frames", "abc", "a.png"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_requires_an_image() {
        let err = Cli::try_parse_from(["pixdust", "--headless"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
