//! Mesh import from glTF 2.0 documents (`.gltf` or `.glb`).
//!
//! Only triangle-list primitives are imported. Positions are required; vertex
//! colors default to white and missing normals are computed from the faces.
//! Node transforms are not applied.

use celview_common::{Color, Mat4, Vec3};
use celview_scene::{AggregateModel, Mesh, MeshError, Triangle, Vertex};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Errors from asset import.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glTF parse error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("buffer {0} is external and no base directory is known")]
    ExternalBuffer(usize),
    #[error("buffer {index} uses an unsupported URI: {uri}")]
    UnsupportedUri { index: usize, uri: String },
    #[error("primitive {primitive} of mesh `{mesh}` has no positions")]
    MissingPositions { mesh: String, primitive: usize },
    #[error("mesh `{mesh}`: {source}")]
    InvalidMesh { mesh: String, source: MeshError },
}

/// A mesh imported from one glTF primitive.
#[derive(Debug, Clone)]
pub struct ImportedMesh {
    /// `<mesh name>` or `<mesh name>#<primitive>` for multi-primitive meshes.
    pub name: String,
    pub mesh: Mesh,
}

/// Import every triangle primitive of the glTF/GLB file at `path`. External
/// buffers are resolved relative to the file.
pub fn load_meshes(path: impl AsRef<Path>) -> Result<Vec<ImportedMesh>, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    debug!(path = %path.display(), bytes = bytes.len(), "importing glTF");
    import(&bytes, Some(base))
}

/// Import from an in-memory document. Only embedded (GLB) buffers are
/// available.
pub fn load_meshes_from_slice(bytes: &[u8]) -> Result<Vec<ImportedMesh>, AssetError> {
    import(bytes, None)
}

/// Import a file as one model whose parts are its meshes, untransformed.
pub fn load_model(path: impl AsRef<Path>) -> Result<AggregateModel, AssetError> {
    let meshes = load_meshes(path)?;
    Ok(meshes
        .into_iter()
        .fold(AggregateModel::new(), |model, imported| {
            model.with_part(imported.mesh, Mat4::IDENTITY)
        }))
}

pub fn crate_info() -> &'static str {
    "celview-assets v0.1.0"
}

fn import(bytes: &[u8], base: Option<PathBuf>) -> Result<Vec<ImportedMesh>, AssetError> {
    let document = gltf::Gltf::from_slice(bytes)?;
    let buffers = load_buffers(&document, base.as_deref())?;

    let mut out = Vec::new();
    for mesh in document.meshes() {
        let mesh_name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh{}", mesh.index()));
        let primitive_count = mesh.primitives().len();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(mesh = %mesh_name, mode = ?primitive.mode(), "skipping non-triangle primitive");
                continue;
            }
            let name = if primitive_count > 1 {
                format!("{mesh_name}#{}", primitive.index())
            } else {
                mesh_name.clone()
            };
            let mesh = read_primitive(&primitive, &buffers, &mesh_name)?;
            debug!(
                %name,
                vertices = mesh.vertex_count(),
                triangles = mesh.triangle_count(),
                "imported primitive"
            );
            out.push(ImportedMesh { name, mesh });
        }
    }
    Ok(out)
}

fn load_buffers(document: &gltf::Gltf, base: Option<&Path>) -> Result<Vec<Vec<u8>>, AssetError> {
    let mut data = Vec::new();
    for buffer in document.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                data.push(document.blob.clone().unwrap_or_default());
            }
            gltf::buffer::Source::Uri(uri) => {
                if uri.starts_with("data:") || uri.contains("://") {
                    return Err(AssetError::UnsupportedUri {
                        index: buffer.index(),
                        uri: uri.to_string(),
                    });
                }
                let base = base.ok_or(AssetError::ExternalBuffer(buffer.index()))?;
                data.push(std::fs::read(base.join(uri))?);
            }
        }
    }
    Ok(data)
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[Vec<u8>],
    mesh_name: &str,
) -> Result<Mesh, AssetError> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| AssetError::MissingPositions {
            mesh: mesh_name.to_string(),
            primitive: primitive.index(),
        })?
        .collect();
    let colors: Option<Vec<[f32; 4]>> = reader.read_colors(0).map(|c| c.into_rgba_f32().collect());
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let color = colors
                .as_ref()
                .and_then(|c| c.get(i))
                .map_or(Color::WHITE, |c| Color::from(*c));
            let mut vertex = Vertex::new(Vec3::from_array(*p)).with_color(color);
            if let Some(n) = normals.as_ref().and_then(|n| n.get(i)) {
                vertex = vertex.with_normal(Vec3::from_array(*n));
            }
            vertex
        })
        .collect();
    let triangles = indices
        .chunks_exact(3)
        .map(|t| Triangle::new(t[0], t[1], t[2]))
        .collect();

    let invalid = |source| AssetError::InvalidMesh {
        mesh: mesh_name.to_string(),
        source,
    };
    if normals.is_some() {
        Mesh::new(vertices, triangles).map_err(invalid)
    } else {
        Mesh::with_computed_normals(vertices, triangles).map_err(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A GLB holding one triangle in the XY plane, counter-clockwise from +Z.
    fn triangle_glb(with_indices: bool) -> Vec<u8> {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let mut bin: Vec<u8> = positions
            .iter()
            .flatten()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        for i in [0u32, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        let indices_json = if with_indices {
            r#","indices":1"#
        } else {
            ""
        };
        let json = format!(
            concat!(
                r#"{{"asset":{{"version":"2.0"}},"#,
                r#""buffers":[{{"byteLength":{len}}}],"#,
                r#""bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":36}},"#,
                r#"{{"buffer":0,"byteOffset":36,"byteLength":12}}],"#,
                r#""accessors":[{{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]}},"#,
                r#"{{"bufferView":1,"componentType":5125,"count":3,"type":"SCALAR"}}],"#,
                r#""meshes":[{{"name":"tri","primitives":[{{"attributes":{{"POSITION":0}}{indices}}}]}}]}}"#
            ),
            len = bin.len(),
            indices = indices_json,
        );
        glb(json.into_bytes(), bin)
    }

    fn glb(mut json: Vec<u8>, mut bin: Vec<u8>) -> Vec<u8> {
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    #[test]
    fn imports_indexed_triangle() {
        let meshes = load_meshes_from_slice(&triangle_glb(true)).unwrap();
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].name, "tri");
        let mesh = &meshes[0].mesh;
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertices()[0].color(), Color::WHITE);
    }

    #[test]
    fn missing_normals_are_computed() {
        let meshes = load_meshes_from_slice(&triangle_glb(true)).unwrap();
        for v in meshes[0].mesh.vertices() {
            assert!((v.normal() - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn unindexed_primitive_uses_vertex_order() {
        let meshes = load_meshes_from_slice(&triangle_glb(false)).unwrap();
        assert_eq!(meshes[0].mesh.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.glb");
        std::fs::write(&path, triangle_glb(true)).unwrap();
        let meshes = load_meshes(&path).unwrap();
        assert_eq!(meshes[0].mesh.triangle_count(), 1);
    }

    #[test]
    fn file_becomes_one_aggregate_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.glb");
        std::fs::write(&path, triangle_glb(true)).unwrap();
        let model = load_model(&path).unwrap();
        assert_eq!(model.parts().len(), 1);
        assert_eq!(model.parts()[0].1, Mat4::IDENTITY);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = load_meshes_from_slice(b"not a gltf").unwrap_err();
        assert!(matches!(err, AssetError::Gltf(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_meshes("/definitely/not/here.glb").unwrap_err();
        assert!(matches!(err, AssetError::Io(_)));
    }
}
