//! Visibility and GPU-context lifecycle bookkeeping.
//!
//! Hiding idles the session (pause + stop scheduling) without touching
//! GPU resources; showing resumes whatever was playing. Context loss
//! blocks all GPU calls until restoration. An optional idle timer can
//! release the context entirely while hidden, on backends that allow it.

use std::time::{Duration, Instant};

use crate::gpu::RenderBackend;

pub struct VisibilityController {
    visible: bool,
    was_playing_when_hidden: bool,
    context_lost: bool,
    hidden_since: Option<Instant>,
    /// Release the GPU context after this long hidden. Power-saving
    /// optimization only; requires backend support.
    release_after: Option<Duration>,
    released: bool,
}

impl VisibilityController {
    pub fn new() -> Self {
        Self {
            visible: true,
            was_playing_when_hidden: false,
            context_lost: false,
            hidden_since: None,
            release_after: None,
            released: false,
        }
    }

    pub fn with_release_after(mut self, idle: Duration) -> Self {
        self.release_after = Some(idle);
        self
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    /// True when GPU work is currently allowed.
    pub fn can_render(&self) -> bool {
        self.visible && !self.context_lost && !self.released
    }

    /// Surface went off-screen. Records whether playback was active so
    /// the matching show can resume it.
    pub fn on_hidden(&mut self, playing: bool, now: Instant) {
        if !self.visible {
            return;
        }
        self.visible = false;
        self.was_playing_when_hidden = playing;
        self.hidden_since = Some(now);
    }

    /// Surface is visible again. Returns true when playback should
    /// resume without the caller re-invoking play.
    pub fn on_visible(&mut self, backend: &mut dyn RenderBackend) -> bool {
        if self.visible {
            return false;
        }
        self.visible = true;
        self.hidden_since = None;
        if self.released {
            backend.restore_context();
            self.released = false;
        }
        std::mem::take(&mut self.was_playing_when_hidden)
    }

    pub fn on_context_lost(&mut self) {
        self.context_lost = true;
    }

    pub fn on_context_restored(&mut self) {
        self.context_lost = false;
    }

    /// Idle-release check, called once per tick. Releases the context
    /// when hidden long enough and the backend supports it.
    pub fn maybe_release(&mut self, now: Instant, backend: &mut dyn RenderBackend) {
        let Some(idle) = self.release_after else { return };
        if self.visible || self.released || !backend.supports_release() {
            return;
        }
        if let Some(hidden_since) = self.hidden_since {
            if now.duration_since(hidden_since) >= idle {
                log::info!("Releasing GPU context after {:.0?} hidden", idle);
                backend.release_context();
                self.released = true;
            }
        }
    }
}

impl Default for VisibilityController {
    fn default() -> Self {
        Self::new()
    }
}
