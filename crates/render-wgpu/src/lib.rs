//! wgpu graphics device for celview.
//!
//! One [`WgpuDevice`] implementation serves both native APIs; the
//! [`BackendKind`](celview_common::BackendKind) a [`GpuContext`] is created
//! with picks Direct3D 12 or OpenGL.
//!
//! # Invariants
//! - Constant-buffer updates are ordered with draws: each draw sees the
//!   contents bound at the moment it was issued.
//! - A frame is submitted as one render pass with a cleared depth buffer.
//! - Surface sizes are never smaller than 1x1.

mod context;
mod convert;
mod gpu;
mod shaders;

pub use context::{GpuContext, backends_for};
pub use gpu::WgpuDevice;
pub use shaders::LIT_SHADER;
