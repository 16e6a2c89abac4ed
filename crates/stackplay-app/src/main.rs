mod app;
mod gpu;
mod media;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use app::App;
use session::config::SessionConfig;

/// Optional JSON overrides for loop/mute/autoplay and display size,
/// read from the working directory.
const CONFIG_FILE: &str = "stackplay.json";

struct StackplayApp {
    app: Option<App>,
    window: Option<Arc<Window>>,
    config: SessionConfig,
}

impl StackplayApp {
    fn new(config: SessionConfig) -> Self {
        Self {
            app: None,
            window: None,
            config,
        }
    }
}

fn load_config(source: &std::path::Path) -> SessionConfig {
    let mut config = match std::fs::read_to_string(CONFIG_FILE) {
        Ok(text) => match serde_json::from_str::<SessionConfig>(&text) {
            Ok(config) => {
                log::info!("Loaded {CONFIG_FILE}");
                config
            }
            Err(e) => {
                log::warn!("Ignoring malformed {CONFIG_FILE}: {e}");
                SessionConfig::default()
            }
        },
        Err(_) => SessionConfig::default(),
    };
    config.source = Some(source.to_string_lossy().into_owned());
    config
}

impl ApplicationHandler for StackplayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("Stackplay")
            .with_transparent(true)
            .with_inner_size(winit::dpi::LogicalSize::new(640, 360));

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .expect("Failed to create window"),
        );
        self.window = Some(window.clone());

        match App::new(window, self.config.clone()) {
            Ok(app) => {
                self.app = Some(app);
                log::info!("Stackplay initialized");
            }
            Err(e) => {
                log::error!("Failed to initialize app: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(app) = self.app.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                // Cancel scheduling before GPU handles go away.
                app.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                app.resize(size.width, size.height);
            }
            WindowEvent::Occluded(occluded) => {
                app.set_visible(!occluded);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match key {
                KeyCode::Escape => {
                    app.shutdown();
                    event_loop.exit();
                }
                KeyCode::Space => app.toggle_playback(),
                KeyCode::KeyL => app.toggle_loop(),
                KeyCode::KeyM => app.toggle_mute(),
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                app.frame();
                app.window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let source = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("usage: stackplay <stacked-alpha-video>");
            eprintln!();
            eprintln!("Plays a stacked-alpha clip (color top half, alpha mask");
            eprintln!("bottom half) composited into a transparent window.");
            std::process::exit(1);
        }
    };

    if !source.exists() {
        anyhow::bail!("source not found: {}", source.display());
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = StackplayApp::new(load_config(&source));
    event_loop.run_app(&mut app)?;

    Ok(())
}
