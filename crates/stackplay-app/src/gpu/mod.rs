pub mod backend;
pub mod context;
pub mod frame_texture;
pub mod resource_cache;
pub mod shader;
#[cfg(test)]
pub mod testing;
pub mod wgpu_backend;

pub use backend::{BackendError, ContextId, FramePixels, RenderBackend};
pub use context::GpuContext;
pub use frame_texture::{FrameTexture, MAX_CONSECUTIVE_UPLOAD_FAILURES, UploadOutcome};
pub use resource_cache::{RenderResources, ResourceCache};
pub use wgpu_backend::WgpuBackend;
