//! Session configuration and application-facing callbacks.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Caller-supplied playback configuration. Re-applying an unchanged
/// config through `PlaybackSession::update` is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Source locator: a file path or URI decodable by ffmpeg.
    pub source: Option<String>,
    /// Display size override. Defaults to decoded width x half the
    /// decoded height (the stacked format halves vertically).
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    #[serde(default = "default_true")]
    pub autoplay: bool,
    #[serde(default = "default_true")]
    pub loop_playback: bool,
    #[serde(default = "default_true")]
    pub muted: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source: None,
            display_width: None,
            display_height: None,
            autoplay: true,
            loop_playback: true,
            muted: true,
        }
    }
}

/// Lifecycle callbacks into the host application. All core failures
/// funnel through `on_error`; the session never panics across this
/// boundary.
#[derive(Default)]
pub struct SessionCallbacks {
    pub on_ready: Option<Box<dyn FnMut()>>,
    pub on_play: Option<Box<dyn FnMut()>>,
    pub on_ended: Option<Box<dyn FnMut()>>,
    pub on_error: Option<Box<dyn FnMut(&str)>>,
}

impl SessionCallbacks {
    pub fn ready(&mut self) {
        if let Some(cb) = &mut self.on_ready {
            cb();
        }
    }

    pub fn play(&mut self) {
        if let Some(cb) = &mut self.on_play {
            cb();
        }
    }

    pub fn ended(&mut self) {
        if let Some(cb) = &mut self.on_ended {
            cb();
        }
    }

    pub fn error(&mut self, message: &str) {
        if let Some(cb) = &mut self.on_error {
            cb(message);
        }
    }
}
