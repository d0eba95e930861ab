use crate::model::Model;
use celview_common::Mat4;
use std::sync::Arc;
use uuid::Uuid;

/// Handle to a model stored in a [`ModelArena`].
///
/// The arena identity is part of the handle, so ids from different arenas never
/// compare equal. Renderers use this as the key of their GPU side-tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId {
    arena: Uuid,
    index: u32,
}

impl ModelId {
    /// Position of the model inside its arena.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model#{}@{:.8}", self.index, self.arena.simple().to_string())
    }
}

/// Errors from scene operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("{0} does not belong to this scene")]
    UnknownModel(ModelId),
}

/// Append-only storage of shared models.
#[derive(Debug, Clone)]
pub struct ModelArena {
    id: Uuid,
    models: Vec<Arc<Model>>,
}

impl Default for ModelArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelArena {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            models: Vec::new(),
        }
    }

    /// Store a model and return its handle. Inserting the same `Arc` twice
    /// yields two handles; share a handle to share GPU resources.
    pub fn insert(&mut self, model: impl Into<Arc<Model>>) -> ModelId {
        let index = self.models.len() as u32;
        self.models.push(model.into());
        ModelId {
            arena: self.id,
            index,
        }
    }

    pub fn get(&self, id: ModelId) -> Option<&Arc<Model>> {
        if id.arena != self.id {
            return None;
        }
        self.models.get(id.index as usize)
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All models with their handles, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &Arc<Model>)> {
        let arena = self.id;
        self.models
            .iter()
            .enumerate()
            .map(move |(i, m)| (ModelId { arena, index: i as u32 }, m))
    }
}

/// A placement of a shared model in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInstance {
    pub model: ModelId,
    pub transform: Mat4,
}

/// Ordered collection of model instances over a model arena.
///
/// The scene owns its instances and shares the models. Iteration order is
/// insertion order and is the order renderers draw in.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    models: ModelArena,
    instances: Vec<ModelInstance>,
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a model without placing it.
    pub fn add_model(&mut self, model: impl Into<Arc<Model>>) -> ModelId {
        self.models.insert(model)
    }

    /// Place an already stored model.
    pub fn add_instance(&mut self, model: ModelId, transform: Mat4) -> Result<(), SceneError> {
        if !self.models.contains(model) {
            return Err(SceneError::UnknownModel(model));
        }
        self.instances.push(ModelInstance { model, transform });
        tracing::debug!(%model, count = self.instances.len(), "instance added");
        Ok(())
    }

    /// Store a model and place it once.
    pub fn add(&mut self, model: impl Into<Arc<Model>>, transform: Mat4) -> ModelId {
        let id = self.add_model(model);
        self.instances.push(ModelInstance {
            model: id,
            transform,
        });
        id
    }

    /// All instances in insertion order.
    pub fn get_models(&self) -> &[ModelInstance] {
        &self.instances
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id).map(|m| m.as_ref())
    }

    pub fn arena(&self) -> &ModelArena {
        &self.models
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;
    use celview_common::{Color, Vec3};

    #[test]
    fn scene_starts_empty() {
        let s = Scene::new();
        assert!(s.is_empty());
        assert!(s.arena().is_empty());
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut s = Scene::new();
        let a = s.add(primitives::quad(Color::RED), Mat4::IDENTITY);
        let b = s.add(primitives::white_cube(), Mat4::from_translation(Vec3::X));
        let c = s.add(primitives::quad(Color::BLUE), Mat4::from_translation(Vec3::Y));
        let order: Vec<ModelId> = s.get_models().iter().map(|i| i.model).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn one_model_many_instances() {
        let mut s = Scene::new();
        let cube = s.add_model(primitives::white_cube());
        for i in 0..3 {
            s.add_instance(cube, Mat4::from_translation(Vec3::X * i as f32))
                .unwrap();
        }
        assert_eq!(s.instance_count(), 3);
        assert_eq!(s.arena().len(), 1);
        assert!(s.get_models().iter().all(|i| i.model == cube));
    }

    #[test]
    fn foreign_model_id_is_rejected() {
        let mut other = Scene::new();
        let foreign = other.add_model(primitives::white_cube());

        let mut s = Scene::new();
        s.add_model(primitives::white_cube());
        assert_eq!(
            s.add_instance(foreign, Mat4::IDENTITY),
            Err(SceneError::UnknownModel(foreign))
        );
        assert!(s.model(foreign).is_none());
    }

    #[test]
    fn shared_arc_is_not_copied() {
        let shared: Arc<Model> = Arc::new(primitives::white_cube().into());
        let mut s = Scene::new();
        let id = s.add_model(shared.clone());
        assert!(Arc::ptr_eq(s.arena().get(id).unwrap(), &shared));
    }
}
