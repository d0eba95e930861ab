use celview_common::Mat4;
use celview_scene::{ModelId, Scene};

/// Identifies a render target owned by a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportHandle(pub u32);

impl ViewportHandle {
    pub const PRIMARY: ViewportHandle = ViewportHandle(0);
}

/// One mesh of a model: `part` is its position in [`Model::parts`].
///
/// [`Model::parts`]: celview_scene::Model::parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshKey {
    pub model: ModelId,
    pub part: u32,
}

impl std::fmt::Display for MeshKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} part {}", self.model, self.part)
    }
}

/// A mesh to draw with its final world transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshKey,
    pub world: Mat4,
}

/// Output of the cull pass: what to draw, in draw order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CullResult {
    pub items: Vec<DrawItem>,
}

impl CullResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Every instance of `scene`, aggregates expanded into their parts, in
/// insertion order. No visibility test is applied.
pub fn collect_draw_items(scene: &Scene) -> CullResult {
    let mut items = Vec::with_capacity(scene.instance_count());
    for instance in scene.get_models() {
        let Some(model) = scene.model(instance.model) else {
            continue;
        };
        for (part, (_, local)) in model.parts().into_iter().enumerate() {
            items.push(DrawItem {
                mesh: MeshKey {
                    model: instance.model,
                    part: part as u32,
                },
                world: instance.transform * local,
            });
        }
    }
    CullResult { items }
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub indices: u64,
    /// Items dropped because their mesh had no GPU resources.
    pub skipped: u32,
}

/// Outcome of a registration pass over a scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepareReport {
    /// Meshes uploaded during this pass.
    pub registered: Vec<MeshKey>,
    /// Meshes that failed and were skipped, with the reason.
    pub failed: Vec<(MeshKey, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use celview_common::{Color, Vec3};
    use celview_scene::{AggregateModel, primitives};

    #[test]
    fn cull_keeps_insertion_order() {
        let mut scene = Scene::new();
        let a = scene.add(primitives::quad(Color::RED), Mat4::IDENTITY);
        let b = scene.add(primitives::white_cube(), Mat4::IDENTITY);
        let c = scene.add(primitives::quad(Color::BLUE), Mat4::IDENTITY);
        let culled = collect_draw_items(&scene);
        let order: Vec<ModelId> = culled.items.iter().map(|i| i.mesh.model).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn aggregate_parts_compose_transforms() {
        let mut scene = Scene::new();
        let agg = AggregateModel::new()
            .with_part(primitives::white_cube(), Mat4::IDENTITY)
            .with_part(
                primitives::quad(Color::GREEN),
                Mat4::from_translation(Vec3::Y),
            );
        let id = scene.add(agg, Mat4::from_translation(Vec3::X));
        let culled = collect_draw_items(&scene);
        assert_eq!(culled.len(), 2);
        assert_eq!(culled.items[1].mesh, MeshKey { model: id, part: 1 });
        let origin = culled.items[1].world.transform_point3(Vec3::ZERO);
        assert_eq!(origin, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn empty_scene_culls_to_nothing() {
        assert!(collect_draw_items(&Scene::new()).is_empty());
    }
}
