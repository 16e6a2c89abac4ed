//! Playback session: one transparent-video instance.
//!
//! Binds a media decoder, the shared resource cache, a frame texture,
//! the render scheduler and the visibility controller into the session
//! state machine. All failures funnel through the `on_error` callback;
//! nothing in here panics across the host boundary.

pub mod config;
pub mod preload;
pub mod render_loop;
pub mod visibility;

use std::time::{Duration, Instant};

use crate::gpu::frame_texture::escalation_message;
use crate::gpu::{BackendError, ContextId, FrameTexture, RenderBackend, ResourceCache, UploadOutcome};
use crate::media::{DecoderStatus, MediaDecoder, MediaEvent};
use config::{SessionCallbacks, SessionConfig};
use render_loop::{RenderLoop, TickDecision};
use visibility::VisibilityController;

/// Bounded wait for a source stuck in an unknown/loading state before a
/// timeout error is reported, instead of spinning on "loading" forever.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error,
}

pub struct PlaybackSession<D: MediaDecoder> {
    config: SessionConfig,
    callbacks: SessionCallbacks,
    decoder: D,
    state: SessionState,
    frame_texture: FrameTexture,
    render_loop: RenderLoop,
    visibility: VisibilityController,
    decoded_size: Option<(u32, u32)>,
    display_size: Option<(u32, u32)>,
    loading_since: Option<Instant>,
    last_error: Option<String>,
    pending_frame: bool,
    texture_reset_pending: bool,
}

impl<D: MediaDecoder> PlaybackSession<D> {
    /// Create a session over `decoder` and apply the initial config.
    /// The decoder may be freshly constructed or a preloaded external
    /// handle; an already-bound source is not reloaded.
    pub fn new(mut decoder: D, config: SessionConfig, callbacks: SessionCallbacks) -> Self {
        decoder.set_muted(config.muted);
        let mut session = Self {
            config: SessionConfig {
                source: None,
                ..config.clone()
            },
            callbacks,
            decoder,
            state: SessionState::Idle,
            frame_texture: FrameTexture::new(),
            render_loop: RenderLoop::new(),
            visibility: VisibilityController::new(),
            decoded_size: None,
            display_size: None,
            loading_since: None,
            last_error: None,
            pending_frame: false,
            texture_reset_pending: false,
        };
        session.update(config);
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Display dimensions, known once the decoder reported metadata.
    pub fn display_size(&self) -> Option<(u32, u32)> {
        self.display_size
    }

    pub fn decoded_size(&self) -> Option<(u32, u32)> {
        self.decoded_size
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    /// Apply configuration. Re-applying unchanged values is a no-op no
    /// matter how often the host re-renders its own tree.
    pub fn update(&mut self, config: SessionConfig) {
        if config == self.config {
            return;
        }
        let source_changed = config.source != self.config.source;
        let muted_changed = config.muted != self.config.muted;
        self.config = config;

        if muted_changed {
            self.decoder.set_muted(self.config.muted);
        }

        if source_changed {
            if let Some(source) = self.config.source.clone() {
                log::info!("Session source set: {source}");
                self.decoder.set_source(&source);
                // Next upload must reallocate; dimensions may change.
                self.texture_reset_pending = true;
                self.decoded_size = None;
                self.display_size = None;
                self.loading_since = None;
                self.last_error = None;
                self.pending_frame = false;
                self.render_loop.cancel();
                self.state = SessionState::Loading;
            }
        }
    }

    /// Host-initiated play (e.g. a user gesture after autoplay was
    /// rejected).
    pub fn play(&mut self) {
        if self.state == SessionState::Error {
            return;
        }
        if self.state == SessionState::Ended {
            self.decoder.seek_to_start();
        }
        self.begin_playback();
    }

    pub fn pause(&mut self) {
        self.decoder.pause();
        self.render_loop.cancel();
        if self.state == SessionState::Playing {
            self.state = SessionState::Paused;
        }
    }

    /// Surface visibility transition from the host.
    pub fn set_visible(&mut self, visible: bool, now: Instant, backend: &mut dyn RenderBackend) {
        if visible {
            if self.visibility.on_visible(backend) {
                // Resume without requiring the caller to re-invoke play.
                self.begin_playback();
                self.pending_frame = true;
            }
        } else {
            let playing = self.state == SessionState::Playing;
            self.visibility.on_hidden(playing, now);
            self.decoder.pause();
            self.render_loop.cancel();
            if playing {
                self.state = SessionState::Paused;
            }
        }
    }

    /// Platform context-loss notification. Per-context resources are
    /// gone; stop all GPU work until restoration.
    pub fn notify_context_lost(&mut self, context: ContextId, cache: &mut ResourceCache) {
        log::warn!("GPU context lost; suspending session rendering");
        self.visibility.on_context_lost();
        self.render_loop.cancel();
        self.frame_texture.forget();
        cache.invalidate(context);
    }

    /// Restoration: resources are recreated lazily on the next render.
    pub fn notify_context_restored(&mut self) {
        log::info!("GPU context restored");
        self.visibility.on_context_restored();
        if self.decoder.status() == DecoderStatus::Playing {
            self.render_loop
                .start(RenderLoop::mode_for(self.decoder.supports_frame_events()));
            self.pending_frame = true;
        }
    }

    /// One cooperative tick: drain decoder events, run the stall guard,
    /// then let the render scheduler decide whether to composite.
    pub fn tick(&mut self, now: Instant, backend: &mut dyn RenderBackend, cache: &mut ResourceCache) {
        for event in self.decoder.poll_events(now) {
            match event {
                MediaEvent::Ready => self.handle_ready(backend, cache),
                MediaEvent::FrameAvailable => self.pending_frame = true,
                MediaEvent::Ended => self.handle_ended(backend, cache),
                MediaEvent::Error(message) => self.fail(message),
            }
        }

        // Externally preloaded decoders are ready before we ever see an
        // event; pick their metadata up on the first tick.
        if self.decoded_size.is_none()
            && self.state == SessionState::Loading
            && !self.decoder.status().is_pending()
            && self.decoder.status() != DecoderStatus::Error
        {
            self.handle_ready(backend, cache);
        }

        self.check_stall(now);
        self.visibility.maybe_release(now, backend);

        let playing = self.decoder.status() == DecoderStatus::Playing;
        match self.render_loop.tick(self.pending_frame, playing) {
            TickDecision::Render => {
                self.pending_frame = false;
                self.render_frame(backend, cache);
            }
            TickDecision::Skip | TickDecision::Stop => {}
        }
    }

    /// Release GPU resources. The render loop is cancelled first so no
    /// stray tick can draw against destroyed handles.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        self.render_loop.cancel();
        self.frame_texture.release(backend);
    }

    fn handle_ready(&mut self, backend: &mut dyn RenderBackend, cache: &mut ResourceCache) {
        if self.decoded_size.is_some() {
            return;
        }
        let Some((width, height)) = self.decoder.dimensions() else {
            return;
        };
        self.decoded_size = Some((width, height));
        // Stacked format halves vertically: visible content is the top
        // half unless the host overrides.
        let display_w = self.config.display_width.unwrap_or(width);
        let display_h = self.config.display_height.unwrap_or(height / 2);
        self.display_size = Some((display_w, display_h));
        self.loading_since = None;
        self.state = SessionState::Ready;
        log::info!("Session ready: {width}x{height} decoded, {display_w}x{display_h} display");
        self.callbacks.ready();

        // First frame right away so the surface is never blank before
        // playback starts.
        self.render_frame(backend, cache);

        if self.config.autoplay && self.state != SessionState::Error {
            self.begin_playback();
        }
    }

    fn begin_playback(&mut self) {
        if self.state == SessionState::Error {
            return;
        }
        self.decoder.play();
        if self.decoder.status() == DecoderStatus::Playing {
            self.state = SessionState::Playing;
            self.render_loop
                .start(RenderLoop::mode_for(self.decoder.supports_frame_events()));
            self.callbacks.play();
        }
        // Anything else is an autoplay-policy analogue: not an error,
        // playback stays parked until a later play call succeeds.
    }

    fn handle_ended(&mut self, backend: &mut dyn RenderBackend, cache: &mut ResourceCache) {
        // The last frame's composite lands before any end handling.
        if self.pending_frame {
            self.pending_frame = false;
            self.render_frame(backend, cache);
        }

        if self.config.loop_playback {
            self.decoder.seek_to_start();
            self.decoder.play();
            if self.decoder.status() == DecoderStatus::Playing {
                self.state = SessionState::Playing;
                if !self.render_loop.is_scheduled() {
                    self.render_loop
                        .start(RenderLoop::mode_for(self.decoder.supports_frame_events()));
                }
                self.pending_frame = true;
            }
        } else {
            self.state = SessionState::Ended;
            self.render_loop.cancel();
            self.callbacks.ended();
        }
    }

    fn check_stall(&mut self, now: Instant) {
        if self.state != SessionState::Loading || !self.decoder.status().is_pending() {
            self.loading_since = None;
            return;
        }
        let since = *self.loading_since.get_or_insert(now);
        if now.duration_since(since) >= STALL_TIMEOUT {
            self.fail(format!(
                "media source stalled: no data after {}s",
                STALL_TIMEOUT.as_secs()
            ));
        }
    }

    fn render_frame(&mut self, backend: &mut dyn RenderBackend, cache: &mut ResourceCache) {
        if !self.visibility.can_render() || backend.context_lost() {
            return;
        }

        let resources = match cache.get_or_create(backend) {
            Ok(resources) => resources,
            Err(BackendError::ContextLost) => {
                self.notify_context_lost(backend.context_id(), cache);
                return;
            }
            Err(e) => {
                self.fail(e.to_string());
                return;
            }
        };

        if self.texture_reset_pending {
            self.frame_texture.reset(backend);
            self.texture_reset_pending = false;
        }

        // No frame during buffering: skip the upload and keep showing
        // whatever was uploaded last.
        if let Some(frame) = self.decoder.current_frame() {
            match self.frame_texture.upload(backend, frame) {
                UploadOutcome::Allocated | UploadOutcome::Updated => {}
                UploadOutcome::Failed { escalate: true } => {
                    self.fail(escalation_message("driver resource exhaustion"));
                    return;
                }
                UploadOutcome::Failed { escalate: false } => return,
            }
        }

        let Some(texture) = self.frame_texture.texture() else {
            return;
        };
        match backend.draw(resources.program, resources.position, resources.texcoord, texture) {
            Ok(()) => {}
            Err(BackendError::ContextLost) => {
                self.notify_context_lost(backend.context_id(), cache);
            }
            Err(e) => log::warn!("Draw failed: {e}"),
        }
    }

    /// Route a failure through `on_error`, once per distinct failure.
    fn fail(&mut self, message: String) {
        if self.last_error.as_deref() == Some(message.as_str()) {
            return;
        }
        log::error!("Session error: {message}");
        self.state = SessionState::Error;
        self.render_loop.cancel();
        self.callbacks.error(&message);
        self.last_error = Some(message);
    }
}

impl<D: MediaDecoder> Drop for PlaybackSession<D> {
    fn drop(&mut self) {
        // Cancel any pending schedule synchronously; a stray callback
        // must never draw into released resources.
        self.render_loop.cancel();
    }
}
