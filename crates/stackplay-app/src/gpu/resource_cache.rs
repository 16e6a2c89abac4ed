//! Per-context cache of the compiled stacked-alpha program and static
//! quad geometry.
//!
//! Every playback session attached to the same GPU context shares one
//! entry, so shader compilation happens once per context no matter how
//! many players are alive. Entries never outlive their context: the
//! owner invalidates on context loss and the next render recompiles.

use std::collections::HashMap;

use super::backend::{BackendError, BufferId, ContextId, ProgramId, RenderBackend};
use super::shader::{QUAD_POSITIONS, QUAD_TEXCOORDS, STACKED_ALPHA_FS, STACKED_ALPHA_VS};

/// Compiled program + static geometry for one GPU context.
/// Immutable once created; shared-read by every session on the context.
#[derive(Debug, Clone, Copy)]
pub struct RenderResources {
    pub program: ProgramId,
    pub position: BufferId,
    pub texcoord: BufferId,
}

pub struct ResourceCache {
    entries: HashMap<ContextId, RenderResources>,
    compiles: u32,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            compiles: 0,
        }
    }

    /// Return the cached resources for the backend's context, compiling
    /// and uploading them on first use. Check-then-create is atomic with
    /// respect to the calling thread, so re-entrant calls for the same
    /// context cannot double-compile. Compilation failure caches
    /// nothing; the caller fails its session and may not retry.
    pub fn get_or_create(
        &mut self,
        backend: &mut dyn RenderBackend,
    ) -> Result<RenderResources, BackendError> {
        let context = backend.context_id();
        if let Some(resources) = self.entries.get(&context) {
            return Ok(*resources);
        }

        self.compiles += 1;
        let program = backend.compile_program(STACKED_ALPHA_VS, STACKED_ALPHA_FS)?;
        let position = backend.create_buffer("stacked-quad-positions", &QUAD_POSITIONS)?;
        let texcoord = backend.create_buffer("stacked-quad-texcoords", &QUAD_TEXCOORDS)?;

        let resources = RenderResources {
            program,
            position,
            texcoord,
        };
        self.entries.insert(context, resources);
        log::info!("Compiled stacked-alpha program for context {context:?}");
        Ok(resources)
    }

    /// Drop the entry for a context whose resources are gone. Called on
    /// context loss; the handles are already invalid, so nothing is
    /// destroyed here.
    pub fn invalidate(&mut self, context: ContextId) {
        if self.entries.remove(&context).is_some() {
            log::info!("Invalidated cached render resources for context {context:?}");
        }
    }

    pub fn contains(&self, context: ContextId) -> bool {
        self.entries.contains_key(&context)
    }

    /// Number of compile attempts since creation. Test-observable.
    pub fn compile_count(&self) -> u32 {
        self.compiles
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}
