//! Preload registry: warm decoders ahead of session creation.
//!
//! At most one decoder per source locator. A ready handle can be taken
//! and supplied to a session as its external decoder, skipping network
//! and decode warm-up.

use std::collections::HashMap;
use std::time::Instant;

use crate::media::clip::ClipDecoder;
use crate::media::{DecoderStatus, MediaDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

struct PreloadEntry {
    decoder: Box<dyn MediaDecoder>,
}

pub struct PreloadRegistry {
    entries: HashMap<String, PreloadEntry>,
}

impl PreloadRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Begin preloading `locator` with the production clip decoder.
    /// A second request for the same locator is a no-op.
    pub fn preload(&mut self, locator: &str) {
        self.preload_with(locator, Box::new(ClipDecoder::new()));
    }

    /// Begin preloading with a caller-supplied decoder.
    pub fn preload_with(&mut self, locator: &str, mut decoder: Box<dyn MediaDecoder>) {
        if self.entries.contains_key(locator) {
            return;
        }
        decoder.set_source(locator);
        self.entries
            .insert(locator.to_string(), PreloadEntry { decoder });
        log::debug!("Preloading {locator}");
    }

    /// Drive pending loads forward. Call once per host tick.
    pub fn poll(&mut self, now: Instant) {
        for entry in self.entries.values_mut() {
            // Events are dropped: nothing owns this decoder yet. The
            // session that takes it re-reads status and dimensions.
            let _ = entry.decoder.poll_events(now);
        }
    }

    pub fn status(&self, locator: &str) -> PreloadStatus {
        match self.entries.get(locator) {
            None => PreloadStatus::Idle,
            Some(entry) => match entry.decoder.status() {
                DecoderStatus::Unknown | DecoderStatus::Loading => PreloadStatus::Loading,
                DecoderStatus::Error => PreloadStatus::Error,
                _ => PreloadStatus::Ready,
            },
        }
    }

    /// Transfer a ready decoder out of the registry. Returns None while
    /// the load is still pending or after it failed.
    pub fn take_ready(&mut self, locator: &str) -> Option<Box<dyn MediaDecoder>> {
        if self.status(locator) != PreloadStatus::Ready {
            return None;
        }
        self.entries.remove(locator).map(|entry| entry.decoder)
    }

    /// Drop an entry regardless of its state.
    pub fn evict(&mut self, locator: &str) {
        self.entries.remove(locator);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PreloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::scripted::ScriptedDecoder;

    #[test]
    fn one_decoder_per_locator() {
        let mut reg = PreloadRegistry::new();
        reg.preload_with("a.mp4", Box::new(ScriptedDecoder::new()));
        reg.preload_with("a.mp4", Box::new(ScriptedDecoder::new()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn status_tracks_decoder() {
        let mut reg = PreloadRegistry::new();
        assert_eq!(reg.status("a.mp4"), PreloadStatus::Idle);

        let mut decoder = ScriptedDecoder::new();
        decoder.status = crate::media::DecoderStatus::Loading;
        reg.preload_with("a.mp4", Box::new(decoder));
        assert_eq!(reg.status("a.mp4"), PreloadStatus::Loading);
    }

    #[test]
    fn take_ready_transfers_only_ready_handles() {
        let mut reg = PreloadRegistry::new();
        let mut decoder = ScriptedDecoder::new();
        decoder.ready_on_poll = Some((4, 8));
        reg.preload_with("a.mp4", Box::new(decoder));

        // Load still pending: nothing to take.
        assert!(reg.take_ready("a.mp4").is_none());
        assert_eq!(reg.len(), 1);

        reg.poll(Instant::now());
        assert_eq!(reg.status("a.mp4"), PreloadStatus::Ready);
        let handle = reg.take_ready("a.mp4").unwrap();
        assert_eq!(handle.dimensions(), Some((4, 8)));
        assert!(reg.take_ready("a.mp4").is_none());
    }

    #[test]
    fn evict_removes_any_state() {
        let mut reg = PreloadRegistry::new();
        reg.preload_with("a.mp4", Box::new(ScriptedDecoder::new()));
        reg.evict("a.mp4");
        assert!(reg.is_empty());
    }
}
