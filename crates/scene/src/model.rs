use celview_common::{Color, Mat4, Vec3, Vec4};
use std::sync::Arc;

/// A mesh vertex: homogeneous position, color, and normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    position: Vec4,
    color: Color,
    normal: Vec3,
}

impl Vertex {
    /// A white vertex at `position` with `w = 1` and a zero normal.
    pub fn new(position: Vec3) -> Self {
        Self {
            position: position.extend(1.0),
            color: Color::WHITE,
            normal: Vec3::ZERO,
        }
    }

    pub fn with_color(self, color: Color) -> Self {
        Self { color, ..self }
    }

    pub fn with_normal(self, normal: Vec3) -> Self {
        Self { normal, ..self }
    }

    pub fn position(&self) -> Vec4 {
        self.position
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }
}

/// Three vertex indices, counter-clockwise when viewed from the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl Triangle {
    pub const fn new(a: u32, b: u32, c: u32) -> Self {
        Self { a, b, c }
    }

    pub fn indices(&self) -> [u32; 3] {
        [self.a, self.b, self.c]
    }
}

/// Errors from mesh construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("mesh has no vertices")]
    Empty,
    #[error("triangle {triangle} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
}

/// A triangle mesh. Owns its vertices and triangles; immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
}

impl Mesh {
    /// Build a mesh, validating every triangle index against the vertex list.
    pub fn new(vertices: Vec<Vertex>, triangles: Vec<Triangle>) -> Result<Self, MeshError> {
        if vertices.is_empty() {
            return Err(MeshError::Empty);
        }
        let vertex_count = vertices.len();
        for (i, t) in triangles.iter().enumerate() {
            if let Some(index) = t.indices().into_iter().find(|&idx| idx as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    triangle: i,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    /// Build a mesh and replace every vertex normal with the normalized sum of
    /// the face normals of the triangles that touch it.
    pub fn with_computed_normals(
        vertices: Vec<Vertex>,
        triangles: Vec<Triangle>,
    ) -> Result<Self, MeshError> {
        let mesh = Self::new(vertices, triangles)?;
        let mut acc = vec![Vec3::ZERO; mesh.vertices.len()];
        for t in &mesh.triangles {
            let [a, b, c] = t.indices().map(|i| mesh.vertices[i as usize].position.truncate());
            let face = (b - a).cross(c - a);
            for i in t.indices() {
                acc[i as usize] += face;
            }
        }
        let vertices = mesh
            .vertices
            .iter()
            .zip(acc)
            .map(|(v, n)| v.with_normal(n.normalize_or_zero()))
            .collect();
        Ok(Self {
            vertices,
            triangles: mesh.triangles,
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of indices a draw of this mesh submits: three per triangle.
    pub fn index_count(&self) -> usize {
        self.triangles.len() * 3
    }

    /// Flattened triangle list.
    pub fn indices(&self) -> Vec<u32> {
        self.triangles.iter().flat_map(|t| t.indices()).collect()
    }

    /// Axis-aligned bounds of the vertex positions as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.vertices.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), v| {
                let p = v.position.truncate();
                (lo.min(p), hi.max(p))
            },
        )
    }
}

/// A model composed of several meshes, each with a local transform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateModel {
    parts: Vec<(Mesh, Mat4)>,
}

impl AggregateModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part(mut self, mesh: Mesh, local: Mat4) -> Self {
        self.parts.push((mesh, local));
        self
    }

    pub fn parts(&self) -> &[(Mesh, Mat4)] {
        &self.parts
    }
}

/// The closed set of model kinds a scene can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Mesh(Mesh),
    Aggregate(AggregateModel),
}

impl Model {
    /// Every mesh of the model with its transform relative to the model origin.
    /// Part order is stable, so the position in this list identifies a part.
    pub fn parts(&self) -> Vec<(&Mesh, Mat4)> {
        match self {
            Model::Mesh(mesh) => vec![(mesh, Mat4::IDENTITY)],
            Model::Aggregate(agg) => agg.parts.iter().map(|(m, t)| (m, *t)).collect(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.parts().iter().map(|(m, _)| m.triangle_count()).sum()
    }
}

impl From<Mesh> for Model {
    fn from(mesh: Mesh) -> Self {
        Model::Mesh(mesh)
    }
}

impl From<AggregateModel> for Model {
    fn from(agg: AggregateModel) -> Self {
        Model::Aggregate(agg)
    }
}

impl From<Mesh> for Arc<Model> {
    fn from(mesh: Mesh) -> Self {
        Arc::new(Model::Mesh(mesh))
    }
}

impl From<AggregateModel> for Arc<Model> {
    fn from(agg: AggregateModel) -> Self {
        Arc::new(Model::Aggregate(agg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Vec<Vertex> {
        vec![
            Vertex::new(Vec3::new(0.0, 0.0, 0.0)),
            Vertex::new(Vec3::new(1.0, 0.0, 0.0)),
            Vertex::new(Vec3::new(0.0, 1.0, 0.0)),
        ]
    }

    #[test]
    fn vertex_from_vec3_is_homogeneous() {
        let v = Vertex::new(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.position(), Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(v.color(), Color::WHITE);
    }

    #[test]
    fn empty_mesh_is_rejected() {
        assert_eq!(Mesh::new(vec![], vec![]), Err(MeshError::Empty));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = Mesh::new(tri(), vec![Triangle::new(0, 1, 3)]).unwrap_err();
        assert_eq!(
            err,
            MeshError::IndexOutOfRange {
                triangle: 0,
                index: 3,
                vertex_count: 3
            }
        );
    }

    #[test]
    fn index_count_is_three_per_triangle() {
        let mesh = Mesh::new(tri(), vec![Triangle::new(0, 1, 2), Triangle::new(2, 1, 0)]).unwrap();
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.indices(), vec![0, 1, 2, 2, 1, 0]);
    }

    #[test]
    fn computed_normals_follow_ccw_winding() {
        let mesh = Mesh::with_computed_normals(tri(), vec![Triangle::new(0, 1, 2)]).unwrap();
        for v in mesh.vertices() {
            assert!((v.normal() - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let mesh = Mesh::new(tri(), vec![Triangle::new(0, 1, 2)]).unwrap();
        let (lo, hi) = mesh.bounds();
        assert_eq!(lo, Vec3::ZERO);
        assert_eq!(hi, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn aggregate_parts_keep_order() {
        let a = Mesh::new(tri(), vec![Triangle::new(0, 1, 2)]).unwrap();
        let b = Mesh::new(tri(), vec![Triangle::new(0, 1, 2), Triangle::new(0, 2, 1)]).unwrap();
        let shift = Mat4::from_translation(Vec3::X);
        let model: Model = AggregateModel::new()
            .with_part(a, Mat4::IDENTITY)
            .with_part(b, shift)
            .into();
        let parts = model.parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].1, shift);
        assert_eq!(model.triangle_count(), 3);
    }
}
