use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use winit::window::Window;

use crate::gpu::{GpuContext, RenderBackend, ResourceCache, WgpuBackend};
use crate::media::MediaDecoder;
use crate::media::clip::ClipDecoder;
use crate::session::config::{SessionCallbacks, SessionConfig};
use crate::session::preload::{PreloadRegistry, PreloadStatus};
use crate::session::{PlaybackSession, SessionState};

/// How long the preload warm-up may run before the session is created
/// with a fresh decoder (which then enforces its own stall timeout).
const PRELOAD_WARMUP: Duration = Duration::from_secs(5);

pub struct App {
    pub backend: WgpuBackend,
    pub cache: ResourceCache,
    pub session: Option<PlaybackSession<Box<dyn MediaDecoder>>>,
    pub window: Arc<Window>,
    preload: PreloadRegistry,
    preload_started: Instant,
    config: SessionConfig,
    sized_to_media: bool,
}

impl App {
    pub fn new(window: Arc<Window>, config: SessionConfig) -> Result<Self> {
        let gpu = GpuContext::new(window.clone())?;
        let backend = WgpuBackend::new(gpu, 1);

        // Warm the decoder while the surface comes up; the session
        // adopts the handle once it is ready.
        let mut preload = PreloadRegistry::new();
        if let Some(source) = &config.source {
            preload.preload(source);
        }

        Ok(Self {
            backend,
            cache: ResourceCache::new(),
            session: None,
            window,
            preload,
            preload_started: Instant::now(),
            config,
            sized_to_media: false,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
    }

    fn callbacks() -> SessionCallbacks {
        SessionCallbacks {
            on_ready: Some(Box::new(|| log::info!("Playback ready"))),
            on_play: Some(Box::new(|| log::info!("Playback started"))),
            on_ended: Some(Box::new(|| log::info!("Playback ended"))),
            on_error: Some(Box::new(|msg: &str| log::error!("Playback error: {msg}"))),
        }
    }

    /// Create the session once the preloaded decoder resolves. On a
    /// preload failure the session gets a fresh decoder and reports the
    /// failure through its own error path.
    fn adopt_preloaded(&mut self, now: Instant) {
        let Some(source) = self.config.source.clone() else {
            return;
        };
        self.preload.poll(now);
        let decoder: Box<dyn MediaDecoder> = match self.preload.status(&source) {
            PreloadStatus::Loading if now.duration_since(self.preload_started) < PRELOAD_WARMUP => {
                return;
            }
            PreloadStatus::Loading => {
                log::warn!("Preload warm-up exceeded {PRELOAD_WARMUP:?}; starting session cold");
                self.preload.evict(&source);
                Box::new(ClipDecoder::new())
            }
            PreloadStatus::Ready => self
                .preload
                .take_ready(&source)
                .unwrap_or_else(|| Box::new(ClipDecoder::new())),
            PreloadStatus::Idle | PreloadStatus::Error => {
                self.preload.evict(&source);
                Box::new(ClipDecoder::new())
            }
        };
        self.session = Some(PlaybackSession::new(
            decoder,
            self.config.clone(),
            Self::callbacks(),
        ));
    }

    /// One host frame: recover a lost surface if needed, size the
    /// window to the media once metadata arrives, then tick the session.
    pub fn frame(&mut self) {
        let now = Instant::now();

        if self.session.is_none() {
            self.adopt_preloaded(now);
        }

        if self.backend.context_lost() {
            // wgpu surface loss is recoverable by reconfiguring; the
            // session recreates its per-context resources lazily.
            self.backend.mark_restored();
            self.cache.invalidate(self.backend.context_id());
            if let Some(session) = &mut self.session {
                session.notify_context_restored();
            }
        }

        let Some(session) = &mut self.session else {
            return;
        };

        if !self.sized_to_media {
            if let Some((w, h)) = session.display_size() {
                self.sized_to_media = true;
                let _ = self
                    .window
                    .request_inner_size(winit::dpi::PhysicalSize::new(w, h));
                self.backend.resize(w, h);
            }
        }

        session.tick(now, &mut self.backend, &mut self.cache);
    }

    pub fn set_visible(&mut self, visible: bool) {
        if let Some(session) = &mut self.session {
            session.set_visible(visible, Instant::now(), &mut self.backend);
        }
    }

    /// Cancel scheduling and free GPU handles ahead of teardown.
    pub fn shutdown(&mut self) {
        if let Some(session) = &mut self.session {
            session.release(&mut self.backend);
        }
    }

    pub fn toggle_playback(&mut self) {
        let Some(session) = &mut self.session else {
            return;
        };
        match session.state() {
            SessionState::Playing => session.pause(),
            SessionState::Paused | SessionState::Ready | SessionState::Ended => {
                session.play();
            }
            _ => {}
        }
    }

    pub fn toggle_loop(&mut self) {
        if let Some(session) = &mut self.session {
            let mut config = session.config().clone();
            config.loop_playback = !config.loop_playback;
            log::info!("Loop: {}", config.loop_playback);
            self.config = config.clone();
            session.update(config);
        }
    }

    pub fn toggle_mute(&mut self) {
        if let Some(session) = &mut self.session {
            let mut config = session.config().clone();
            config.muted = !config.muted;
            log::info!("Muted: {}", config.muted);
            self.config = config.clone();
            session.update(config);
        }
    }
}
