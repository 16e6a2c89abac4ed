//! Deterministic decoder for session unit tests.
//!
//! Status transitions, frames and end-of-media are all driven by the
//! test; transport calls are recorded so idempotence and loop behavior
//! can be asserted.

use std::time::Instant;

use super::{DecodedFrame, DecoderStatus, MediaDecoder, MediaEvent};
use crate::gpu::FramePixels;
use crate::gpu::shader::solid_stacked_frame;

pub struct ScriptedDecoder {
    pub status: DecoderStatus,
    pub dims: Option<(u32, u32)>,
    pub frame: Option<DecodedFrame>,
    pub frame_events: bool,
    queued: Vec<MediaEvent>,
    pub set_source_calls: Vec<String>,
    pub play_calls: u32,
    pub pause_calls: u32,
    pub seek_calls: u32,
    pub muted: Option<bool>,
    /// When set, the next poll transitions Loading -> Ready with these
    /// stacked dimensions (simulates an async load completing).
    pub ready_on_poll: Option<(u32, u32)>,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self {
            status: DecoderStatus::Unknown,
            dims: None,
            frame: None,
            frame_events: true,
            queued: Vec::new(),
            set_source_calls: Vec::new(),
            play_calls: 0,
            pause_calls: 0,
            seek_calls: 0,
            muted: None,
            ready_on_poll: None,
        }
    }

    /// Script the ready transition: stacked dimensions known, first
    /// frame decoded (solid color over a solid mask).
    pub fn make_ready(&mut self, width: u32, height: u32) {
        self.dims = Some((width, height));
        self.frame = Some(DecodedFrame {
            data: solid_stacked_frame(width, height, 255, 0, 0, 128),
            width,
            height,
        });
        self.status = DecoderStatus::Ready;
        self.queued.push(MediaEvent::Ready);
    }

    /// Script one newly presented frame.
    pub fn present_frame(&mut self) {
        self.queued.push(MediaEvent::FrameAvailable);
    }

    /// Script natural end of media.
    pub fn finish(&mut self) {
        self.status = DecoderStatus::Ended;
        self.queued.push(MediaEvent::Ended);
    }

    /// Script a playback error.
    pub fn fail(&mut self, message: &str) {
        self.status = DecoderStatus::Error;
        self.queued.push(MediaEvent::Error(message.to_string()));
    }

    /// Drop the current frame (buffering: decoder has nothing to show).
    pub fn drop_frame(&mut self) {
        self.frame = None;
    }
}

impl Default for ScriptedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaDecoder for ScriptedDecoder {
    fn set_source(&mut self, locator: &str) {
        self.set_source_calls.push(locator.to_string());
        self.status = DecoderStatus::Loading;
    }

    fn play(&mut self) {
        self.play_calls += 1;
        if matches!(
            self.status,
            DecoderStatus::Ready | DecoderStatus::Paused | DecoderStatus::Ended
        ) {
            self.status = DecoderStatus::Playing;
        }
    }

    fn pause(&mut self) {
        self.pause_calls += 1;
        if self.status == DecoderStatus::Playing {
            self.status = DecoderStatus::Paused;
        }
    }

    fn seek_to_start(&mut self) {
        self.seek_calls += 1;
        if self.status == DecoderStatus::Ended {
            self.status = DecoderStatus::Paused;
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = Some(muted);
    }

    fn status(&self) -> DecoderStatus {
        self.status
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dims
    }

    fn current_frame(&self) -> Option<FramePixels<'_>> {
        self.frame.as_ref().map(DecodedFrame::pixels)
    }

    fn supports_frame_events(&self) -> bool {
        self.frame_events
    }

    fn poll_events(&mut self, _now: Instant) -> Vec<MediaEvent> {
        if self.status == DecoderStatus::Loading {
            if let Some((w, h)) = self.ready_on_poll.take() {
                self.make_ready(w, h);
            }
        }
        std::mem::take(&mut self.queued)
    }
}
