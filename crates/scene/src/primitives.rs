//! Built-in meshes. All faces wind counter-clockwise seen from outside.

use crate::model::{Mesh, Triangle, Vertex};
use celview_common::{Color, Vec3};

/// Unit quad in the XY plane centered at the origin, facing +Z. Two triangles.
pub fn quad(color: Color) -> Mesh {
    let p = 0.5_f32;
    let vertices = [[-p, -p], [p, -p], [p, p], [-p, p]]
        .into_iter()
        .map(|[x, y]| {
            Vertex::new(Vec3::new(x, y, 0.0))
                .with_color(color)
                .with_normal(Vec3::Z)
        })
        .collect();
    let triangles = vec![Triangle::new(0, 1, 2), Triangle::new(2, 3, 0)];
    Mesh::new(vertices, triangles).expect("quad indices are in range")
}

/// Unit cube centered at the origin with one color per face and flat normals.
/// Faces are ordered +Z, -Z, +X, -X, +Y, -Y; 24 vertices, 12 triangles.
pub fn cube(face_colors: [Color; 6]) -> Mesh {
    let p = 0.5_f32;
    #[rustfmt::skip]
    let faces: [([[f32; 3]; 4], Vec3); 6] = [
        ([[-p, -p,  p], [ p, -p,  p], [ p,  p,  p], [-p,  p,  p]], Vec3::Z),
        ([[ p, -p, -p], [-p, -p, -p], [-p,  p, -p], [ p,  p, -p]], Vec3::NEG_Z),
        ([[ p, -p,  p], [ p, -p, -p], [ p,  p, -p], [ p,  p,  p]], Vec3::X),
        ([[-p, -p, -p], [-p, -p,  p], [-p,  p,  p], [-p,  p, -p]], Vec3::NEG_X),
        ([[-p,  p,  p], [ p,  p,  p], [ p,  p, -p], [-p,  p, -p]], Vec3::Y),
        ([[-p, -p, -p], [ p, -p, -p], [ p, -p,  p], [-p, -p,  p]], Vec3::NEG_Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut triangles = Vec::with_capacity(12);
    for ((corners, normal), color) in faces.into_iter().zip(face_colors) {
        let base = vertices.len() as u32;
        vertices.extend(
            corners
                .into_iter()
                .map(|c| Vertex::new(c.into()).with_color(color).with_normal(normal)),
        );
        triangles.push(Triangle::new(base, base + 1, base + 2));
        triangles.push(Triangle::new(base + 2, base + 3, base));
    }
    Mesh::new(vertices, triangles).expect("cube indices are in range")
}

/// Unit cube with all faces white.
pub fn white_cube() -> Mesh {
    cube([Color::WHITE; 6])
}
