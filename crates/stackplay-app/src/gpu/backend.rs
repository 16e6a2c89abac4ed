//! Platform-neutral GPU interface.
//!
//! One trait covers everything the compositor needs from a graphics
//! context: program compilation, static buffer creation, frame texture
//! create/update, a single quad draw, and context-loss observation.
//! The production implementation is [`crate::gpu::WgpuBackend`]; tests
//! use the recording fake in `gpu::testing`.

use thiserror::Error;

/// Stable identity of one GPU context. Resource cache entries are keyed
/// by this; the id survives context loss so the owner can invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureId(pub u64);

/// A decoded frame staged for upload: tightly packed RGBA8.
#[derive(Debug, Clone, Copy)]
pub struct FramePixels<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("shader compile/link failed: {0}")]
    Compile(String),
    #[error("texture allocation failed: {0}")]
    Texture(String),
    #[error("graphics context lost")]
    ContextLost,
    #[error("draw submission failed: {0}")]
    Draw(String),
}

pub trait RenderBackend {
    fn context_id(&self) -> ContextId;

    /// True after the platform invalidated this context's resources.
    fn context_lost(&self) -> bool;

    /// Compile and link the vertex + fragment pair. A failure here is
    /// fatal for the context and must not be retried by callers.
    fn compile_program(&mut self, vertex_src: &str, fragment_src: &str)
    -> Result<ProgramId, BackendError>;

    /// Upload a static vertex buffer. Contents are immutable afterwards.
    fn create_buffer(&mut self, label: &str, data: &[f32]) -> Result<BufferId, BackendError>;

    /// Allocate texture storage and upload the frame in one step.
    fn create_texture(&mut self, frame: FramePixels<'_>) -> Result<TextureId, BackendError>;

    /// Overwrite an existing texture in place. Dimensions must match the
    /// allocation; callers reallocate via [`Self::create_texture`] when
    /// they change.
    fn update_texture(&mut self, texture: TextureId, frame: FramePixels<'_>)
    -> Result<(), BackendError>;

    fn destroy_texture(&mut self, texture: TextureId);

    /// Clear the surface to fully transparent, bind program, geometry
    /// and texture, issue exactly one quad draw, and present.
    fn draw(
        &mut self,
        program: ProgramId,
        position: BufferId,
        texcoord: BufferId,
        texture: TextureId,
    ) -> Result<(), BackendError>;

    /// Whether the platform supports proactively releasing the context
    /// for power saving while hidden. Purely an optimization hook.
    fn supports_release(&self) -> bool {
        false
    }

    fn release_context(&mut self) {}

    fn restore_context(&mut self) {}
}
