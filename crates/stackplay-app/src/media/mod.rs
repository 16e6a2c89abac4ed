//! Media decode abstraction.
//!
//! The compositor only needs a narrow slice of a platform decoder:
//! transport control, the current decoded frame, and a polled event
//! stream standing in for native readiness/end/error callbacks. The
//! production implementation is [`clip::ClipDecoder`]; session tests
//! use the scripted decoder in `media::scripted`.

pub mod clip;
pub mod probe;
#[cfg(test)]
pub mod scripted;

use std::time::Instant;

use thiserror::Error;

use crate::gpu::FramePixels;

/// A decoded frame ready for GPU upload.
pub struct DecodedFrame {
    pub data: Vec<u8>, // RGBA8
    pub width: u32,
    pub height: u32,
}

impl DecodedFrame {
    pub fn pixels(&self) -> FramePixels<'_> {
        FramePixels {
            data: &self.data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Decoder lifecycle status, mirroring the platform media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderStatus {
    /// Nothing known yet (no source, or metadata not arrived).
    Unknown,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error,
}

impl DecoderStatus {
    /// States the session bounds with the stall timeout.
    pub fn is_pending(self) -> bool {
        matches!(self, DecoderStatus::Unknown | DecoderStatus::Loading)
    }
}

/// Decoder notifications, drained once per session tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Metadata and first frame are available; dimensions are known.
    Ready,
    /// A newly decoded frame was presented (frame-availability path).
    FrameAvailable,
    /// Natural end of media.
    Ended,
    Error(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("not a stacked-alpha layout: {0}")]
    UnsupportedLayout(String),
}

pub trait MediaDecoder {
    /// Bind a source locator. Setting a new locator implicitly starts
    /// decode; callers guard idempotence for unchanged locators.
    fn set_source(&mut self, locator: &str);

    /// Start playback. Failures (autoplay policy analogues) are
    /// swallowed; playback simply does not start.
    fn play(&mut self);

    fn pause(&mut self);

    /// Seek to position zero. Used for loop restarts.
    fn seek_to_start(&mut self);

    fn set_muted(&mut self, muted: bool);

    fn status(&self) -> DecoderStatus;

    /// Decoded (stacked) dimensions, once known.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// The most recently presented frame, or None while buffering.
    fn current_frame(&self) -> Option<FramePixels<'_>>;

    /// Whether this decoder emits [`MediaEvent::FrameAvailable`]; the
    /// render loop prefers frame-driven scheduling when it does.
    fn supports_frame_events(&self) -> bool;

    /// Advance the decoder clock to `now` and drain pending events.
    fn poll_events(&mut self, now: Instant) -> Vec<MediaEvent>;
}

impl MediaDecoder for Box<dyn MediaDecoder> {
    fn set_source(&mut self, locator: &str) {
        (**self).set_source(locator);
    }

    fn play(&mut self) {
        (**self).play();
    }

    fn pause(&mut self) {
        (**self).pause();
    }

    fn seek_to_start(&mut self) {
        (**self).seek_to_start();
    }

    fn set_muted(&mut self, muted: bool) {
        (**self).set_muted(muted);
    }

    fn status(&self) -> DecoderStatus {
        (**self).status()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        (**self).dimensions()
    }

    fn current_frame(&self) -> Option<FramePixels<'_>> {
        (**self).current_frame()
    }

    fn supports_frame_events(&self) -> bool {
        (**self).supports_frame_events()
    }

    fn poll_events(&mut self, now: Instant) -> Vec<MediaEvent> {
        (**self).poll_events(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_statuses() {
        assert!(DecoderStatus::Unknown.is_pending());
        assert!(DecoderStatus::Loading.is_pending());
        assert!(!DecoderStatus::Ready.is_pending());
        assert!(!DecoderStatus::Error.is_pending());
    }

    #[test]
    fn decoded_frame_pixels_view() {
        let frame = DecodedFrame {
            data: vec![1, 2, 3, 4],
            width: 1,
            height: 1,
        };
        let px = frame.pixels();
        assert_eq!(px.data, &[1, 2, 3, 4]);
        assert_eq!((px.width, px.height), (1, 1));
    }
}
