use crate::device::Resource;
use crate::renderer::RendererState;
use crate::viewport::MeshKey;
use celview_scene::ModelId;

/// Failures reported by a [`GraphicsDevice`](crate::device::GraphicsDevice).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("shader entry point `{entry}` failed to compile: {message}")]
    ShaderCompile { entry: String, message: String },
    #[error("failed to create {what}: {message}")]
    Creation { what: &'static str, message: String },
    #[error("input layout does not match the vertex shader: {0}")]
    LayoutMismatch(String),
    #[error("unknown or released resource {0:?}")]
    UnknownResource(Resource),
    #[error("invalid draw: {0}")]
    Validation(String),
    #[error("surface error: {0}")]
    Surface(String),
}

/// Errors from the renderer core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("renderer is already bound to a device")]
    AlreadyBound,
    #[error("renderer is not ready (state: {0:?})")]
    NotReady(RendererState),
    #[error("initialization failed while {stage}: {source}")]
    Init {
        stage: &'static str,
        source: DeviceError,
    },
    #[error("failed to register {key}: {source}")]
    Registration { key: MeshKey, source: DeviceError },
    #[error("{0} has no triangles to upload")]
    EmptyMesh(MeshKey),
    #[error("{0} is not part of the scene")]
    UnknownModel(ModelId),
    #[error("frame submission failed: {0}")]
    Frame(#[from] DeviceError),
}
