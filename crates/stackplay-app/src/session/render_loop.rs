//! Render scheduling: one composite per available frame, nothing more.
//!
//! Two modes, chosen by decoder capability:
//!
//! - `FrameDriven`: tick only consumes a decoder frame-availability
//!   notification, so rendering tracks the media clock (24 fps video
//!   renders 24 times a second, not 60).
//! - `FixedRate`: display-refresh ticks; each tick renders while the
//!   decoder is playing, and the loop stops (without re-arming) the
//!   moment it is not. Restart is explicit on play.
//!
//! Cancellation clears any pending schedule so no tick can land on a
//! torn-down surface.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    FrameDriven,
    FixedRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Scheduled,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Upload the newest frame and issue the draw.
    Render,
    /// Stay scheduled, nothing to do this tick.
    Skip,
    /// Loop stopped; caller must restart explicitly.
    Stop,
}

pub struct RenderLoop {
    state: LoopState,
    mode: ScheduleMode,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            mode: ScheduleMode::FixedRate,
        }
    }

    /// Pick the scheduling mode for a decoder. Frame-driven wherever
    /// the decoder can notify per presented frame.
    pub fn mode_for(frame_events_supported: bool) -> ScheduleMode {
        if frame_events_supported {
            ScheduleMode::FrameDriven
        } else {
            ScheduleMode::FixedRate
        }
    }

    pub fn start(&mut self, mode: ScheduleMode) {
        self.mode = mode;
        self.state = LoopState::Scheduled;
    }

    pub fn is_scheduled(&self) -> bool {
        self.state == LoopState::Scheduled
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    /// One scheduler tick. `frame_available` is the pending decoder
    /// notification; `playing` reflects decoder transport state.
    pub fn tick(&mut self, frame_available: bool, playing: bool) -> TickDecision {
        if self.state != LoopState::Scheduled {
            return TickDecision::Stop;
        }

        match self.mode {
            ScheduleMode::FrameDriven => {
                if !playing {
                    // Paused or ended: stop re-registering for frames.
                    self.state = LoopState::Stopped;
                    return TickDecision::Stop;
                }
                if frame_available {
                    // Render, then stay registered for the next frame.
                    TickDecision::Render
                } else {
                    TickDecision::Skip
                }
            }
            ScheduleMode::FixedRate => {
                if playing {
                    TickDecision::Render
                } else {
                    // Do not self-reschedule while paused.
                    self.state = LoopState::Stopped;
                    TickDecision::Stop
                }
            }
        }
    }

    /// Cancel any pending schedule. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.state = LoopState::Idle;
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}
