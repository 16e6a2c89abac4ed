//! Recording fake backend for unit tests.
//!
//! Counts every backend call, stores texture bytes, and executes draws
//! on the CPU via `composite_reference`, so compile-count, upload-path
//! and pixel-level properties are all assertable without a GPU.

use std::collections::HashMap;

use super::backend::{
    BackendError, BufferId, ContextId, FramePixels, ProgramId, RenderBackend, TextureId,
};
use super::shader::composite_reference;

#[derive(Debug, Default, Clone, Copy)]
pub struct BackendStats {
    pub compile_calls: u32,
    pub buffer_creates: u32,
    pub texture_creates: u32,
    pub texture_updates: u32,
    pub texture_destroys: u32,
    pub draw_calls: u32,
}

struct StoredTexture {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

pub struct FakeBackend {
    id: ContextId,
    lost: bool,
    released: bool,
    next_handle: u64,
    textures: HashMap<u64, StoredTexture>,
    pub stats: BackendStats,
    /// When set, compile_program fails with this message.
    pub compile_error: Option<String>,
    /// When true, create/update texture calls fail (transient driver
    /// exhaustion simulation).
    pub fail_texture_writes: bool,
    pub supports_release: bool,
    /// Composited output of the most recent draw: (pixels, w, h).
    pub last_composite: Option<(Vec<u8>, u32, u32)>,
}

impl FakeBackend {
    pub fn new(id: u64) -> Self {
        Self {
            id: ContextId(id),
            lost: false,
            released: false,
            next_handle: 1,
            textures: HashMap::new(),
            stats: BackendStats::default(),
            compile_error: None,
            fail_texture_writes: false,
            supports_release: false,
            last_composite: None,
        }
    }

    fn next(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    /// Platform-initiated context loss: all resources are gone.
    pub fn simulate_context_loss(&mut self) {
        self.lost = true;
        self.textures.clear();
    }

    pub fn simulate_context_restore(&mut self) {
        self.lost = false;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl RenderBackend for FakeBackend {
    fn context_id(&self) -> ContextId {
        self.id
    }

    fn context_lost(&self) -> bool {
        self.lost
    }

    fn compile_program(
        &mut self,
        _vertex_src: &str,
        _fragment_src: &str,
    ) -> Result<ProgramId, BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        self.stats.compile_calls += 1;
        if let Some(msg) = &self.compile_error {
            return Err(BackendError::Compile(msg.clone()));
        }
        Ok(ProgramId(self.next()))
    }

    fn create_buffer(&mut self, _label: &str, _data: &[f32]) -> Result<BufferId, BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        self.stats.buffer_creates += 1;
        Ok(BufferId(self.next()))
    }

    fn create_texture(&mut self, frame: FramePixels<'_>) -> Result<TextureId, BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        self.stats.texture_creates += 1;
        if self.fail_texture_writes {
            return Err(BackendError::Texture("simulated exhaustion".into()));
        }
        let handle = self.next();
        self.textures.insert(
            handle,
            StoredTexture {
                data: frame.data.to_vec(),
                width: frame.width,
                height: frame.height,
            },
        );
        Ok(TextureId(handle))
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        frame: FramePixels<'_>,
    ) -> Result<(), BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        self.stats.texture_updates += 1;
        if self.fail_texture_writes {
            return Err(BackendError::Texture("simulated exhaustion".into()));
        }
        let stored = self
            .textures
            .get_mut(&texture.0)
            .ok_or_else(|| BackendError::Texture("unknown texture handle".into()))?;
        assert_eq!(
            (stored.width, stored.height),
            (frame.width, frame.height),
            "in-place update with mismatched dimensions"
        );
        stored.data.clear();
        stored.data.extend_from_slice(frame.data);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.stats.texture_destroys += 1;
        self.textures.remove(&texture.0);
    }

    fn draw(
        &mut self,
        _program: ProgramId,
        _position: BufferId,
        _texcoord: BufferId,
        texture: TextureId,
    ) -> Result<(), BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost);
        }
        let stored = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::Draw("unknown texture handle".into()))?;
        let out = composite_reference(&stored.data, stored.width, stored.height);
        self.last_composite = Some((out, stored.width, stored.height / 2));
        self.stats.draw_calls += 1;
        Ok(())
    }

    fn supports_release(&self) -> bool {
        self.supports_release
    }

    fn release_context(&mut self) {
        self.released = true;
    }

    fn restore_context(&mut self) {
        self.released = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::shader::solid_stacked_frame;

    #[test]
    fn draw_composites_stored_texture() {
        let mut fake = FakeBackend::new(1);
        let frame = solid_stacked_frame(2, 4, 255, 0, 0, 128);
        let tex = fake
            .create_texture(FramePixels {
                data: &frame,
                width: 2,
                height: 4,
            })
            .unwrap();
        fake.draw(ProgramId(0), BufferId(0), BufferId(0), tex).unwrap();
        let (pixels, w, h) = fake.last_composite.as_ref().unwrap();
        assert_eq!((*w, *h), (2, 2));
        for px in pixels.chunks_exact(4) {
            assert_eq!(px, &[128, 0, 0, 128]);
        }
    }

    #[test]
    fn lost_context_rejects_all_calls() {
        let mut fake = FakeBackend::new(1);
        fake.simulate_context_loss();
        assert!(matches!(
            fake.compile_program("", ""),
            Err(BackendError::ContextLost)
        ));
        assert!(matches!(
            fake.create_buffer("b", &[0.0]),
            Err(BackendError::ContextLost)
        ));
    }
}
