use celview_common::BackendKind;
use std::sync::Arc;
use tracing::info;

/// The wgpu backend set a [`BackendKind`] selects.
pub fn backends_for(kind: BackendKind) -> wgpu::Backends {
    match kind {
        BackendKind::Direct3D => wgpu::Backends::DX12,
        BackendKind::OpenGl => wgpu::Backends::GL,
        BackendKind::Auto => wgpu::Backends::PRIMARY | wgpu::Backends::GL,
    }
}

/// Process-level graphics library state.
///
/// Every window's device holds an `Arc` to the context it was created from;
/// the library is torn down when the last one goes away.
pub struct GpuContext {
    instance: wgpu::Instance,
    backend: BackendKind,
}

impl GpuContext {
    pub fn new(backend: BackendKind) -> Arc<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: backends_for(backend),
            ..Default::default()
        });
        info!(%backend, "graphics context created");
        Arc::new(Self { instance, backend })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        info!(backend = %self.backend, "graphics context released");
    }
}
