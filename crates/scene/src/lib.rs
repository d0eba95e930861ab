//! Scene data model: meshes, models, and the scene container.
//!
//! # Invariants
//! - Models are immutable after construction; there is no vertex mutation API.
//! - Every triangle index is valid within its mesh's vertex range.
//! - Scene instance order is insertion order.
//! - The scene owns no GPU state. Renderers key their resources by [`ModelId`].

pub mod model;
pub mod primitives;
pub mod scene;

pub use model::{AggregateModel, Mesh, MeshError, Model, Triangle, Vertex};
pub use scene::{ModelArena, ModelId, ModelInstance, Scene, SceneError};

pub fn crate_info() -> &'static str {
    "celview-scene v0.1.0"
}
