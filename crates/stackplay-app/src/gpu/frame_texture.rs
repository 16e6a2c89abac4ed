//! Frame texture lifecycle: allocate on dimension change, update in
//! place otherwise.
//!
//! The in-place path avoids GPU memory reallocation on every frame. A
//! single failed upload is invisible (the previous texture keeps being
//! presented), so failures only escalate after a sustained streak.

use super::backend::{FramePixels, RenderBackend, TextureId};

/// Consecutive upload failures tolerated before the owning session is
/// told to surface an error. A single miss is expected occasionally
/// under memory pressure and is not user-visible.
pub const MAX_CONSECUTIVE_UPLOAD_FAILURES: u32 = 120;

#[derive(Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Full allocation-and-upload (first use or dimension change).
    Allocated,
    /// In-place update of existing storage.
    Updated,
    /// Transient failure; previous texture remains bound. `escalate` is
    /// true exactly once, when the streak reaches the threshold.
    Failed { escalate: bool },
}

pub struct FrameTexture {
    texture: Option<TextureId>,
    width: u32,
    height: u32,
    failure_streak: u32,
}

impl FrameTexture {
    pub fn new() -> Self {
        Self {
            texture: None,
            width: 0,
            height: 0,
            failure_streak: 0,
        }
    }

    /// The texture to bind for drawing, if any upload has succeeded.
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Push a decoded frame to the GPU. Reuses storage in place when the
    /// dimensions match the previous upload, reallocates otherwise.
    pub fn upload(
        &mut self,
        backend: &mut dyn RenderBackend,
        frame: FramePixels<'_>,
    ) -> UploadOutcome {
        let result = if self.texture.is_some() && self.width == frame.width
            && self.height == frame.height
        {
            let texture = self.texture.expect("checked above");
            backend.update_texture(texture, frame).map(|()| UploadOutcome::Updated)
        } else {
            // Allocate the replacement before dropping the old storage,
            // so a failed allocation still leaves the last good frame
            // bound.
            backend.create_texture(frame).map(|texture| {
                if let Some(old) = self.texture.replace(texture) {
                    backend.destroy_texture(old);
                }
                self.width = frame.width;
                self.height = frame.height;
                UploadOutcome::Allocated
            })
        };

        match result {
            Ok(outcome) => {
                self.failure_streak = 0;
                outcome
            }
            Err(e) => {
                self.failure_streak += 1;
                let escalate = self.failure_streak == MAX_CONSECUTIVE_UPLOAD_FAILURES;
                if escalate {
                    log::error!("Frame upload failed {} times in a row: {e}", self.failure_streak);
                } else {
                    log::debug!("Frame upload failed (streak {}): {e}", self.failure_streak);
                }
                UploadOutcome::Failed { escalate }
            }
        }
    }

    /// Force the next upload onto the full-reallocation path. Used when
    /// the source changes, so stale storage from the previous clip is
    /// never updated in place.
    pub fn reset(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(texture) = self.texture.take() {
            backend.destroy_texture(texture);
        }
        self.width = 0;
        self.height = 0;
        self.failure_streak = 0;
    }

    /// Drop handles without touching the backend. Used on context loss,
    /// when the storage is already gone.
    pub fn forget(&mut self) {
        self.texture = None;
        self.width = 0;
        self.height = 0;
        self.failure_streak = 0;
    }

    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        self.reset(backend);
    }
}

impl Default for FrameTexture {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an upload error streak into a session-facing message.
pub fn escalation_message(err_context: &str) -> String {
    format!(
        "texture upload failed {MAX_CONSECUTIVE_UPLOAD_FAILURES} consecutive times ({err_context})"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::testing::FakeBackend;

    fn frame(data: &[u8], w: u32, h: u32) -> FramePixels<'_> {
        FramePixels {
            data,
            width: w,
            height: h,
        }
    }

    #[test]
    fn first_upload_allocates() {
        let mut backend = FakeBackend::new(1);
        let mut tex = FrameTexture::new();
        let data = vec![0u8; 16];
        assert_eq!(tex.upload(&mut backend, frame(&data, 2, 2)), UploadOutcome::Allocated);
        assert!(tex.texture().is_some());
        assert_eq!(backend.stats.texture_creates, 1);
    }

    #[test]
    fn same_dimensions_update_in_place() {
        let mut backend = FakeBackend::new(1);
        let mut tex = FrameTexture::new();
        let data = vec![0u8; 16];
        tex.upload(&mut backend, frame(&data, 2, 2));
        assert_eq!(tex.upload(&mut backend, frame(&data, 2, 2)), UploadOutcome::Updated);
        assert_eq!(backend.stats.texture_creates, 1);
        assert_eq!(backend.stats.texture_updates, 1);
    }

    #[test]
    fn dimension_change_reallocates() {
        let mut backend = FakeBackend::new(1);
        let mut tex = FrameTexture::new();
        let small = vec![0u8; 16];
        let large = vec![0u8; 64];
        tex.upload(&mut backend, frame(&small, 2, 2));
        assert_eq!(tex.upload(&mut backend, frame(&large, 4, 4)), UploadOutcome::Allocated);
        assert_eq!(backend.stats.texture_creates, 2);
        assert_eq!(backend.stats.texture_destroys, 1);
    }

    #[test]
    fn reset_forces_reallocation() {
        let mut backend = FakeBackend::new(1);
        let mut tex = FrameTexture::new();
        let data = vec![0u8; 16];
        tex.upload(&mut backend, frame(&data, 2, 2));
        tex.reset(&mut backend);
        assert!(tex.texture().is_none());
        assert_eq!(tex.upload(&mut backend, frame(&data, 2, 2)), UploadOutcome::Allocated);
        assert_eq!(backend.stats.texture_creates, 2);
    }

    #[test]
    fn failure_escalates_exactly_at_threshold() {
        let mut backend = FakeBackend::new(1);
        backend.fail_texture_writes = true;
        let mut tex = FrameTexture::new();
        let data = vec![0u8; 16];

        let mut escalations = 0;
        for _ in 0..MAX_CONSECUTIVE_UPLOAD_FAILURES + 10 {
            if let UploadOutcome::Failed { escalate: true } =
                tex.upload(&mut backend, frame(&data, 2, 2))
            {
                escalations += 1;
            }
        }
        assert_eq!(escalations, 1);
    }

    #[test]
    fn success_resets_failure_streak() {
        let mut backend = FakeBackend::new(1);
        let mut tex = FrameTexture::new();
        let data = vec![0u8; 16];

        backend.fail_texture_writes = true;
        for _ in 0..MAX_CONSECUTIVE_UPLOAD_FAILURES - 1 {
            tex.upload(&mut backend, frame(&data, 2, 2));
        }
        backend.fail_texture_writes = false;
        assert_eq!(tex.upload(&mut backend, frame(&data, 2, 2)), UploadOutcome::Allocated);

        // A fresh streak starts from zero again.
        backend.fail_texture_writes = true;
        assert_eq!(
            tex.upload(&mut backend, frame(&data, 2, 2)),
            UploadOutcome::Failed { escalate: false }
        );
    }
}
