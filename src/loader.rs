//! Model decoding, one loader per exchange format.
//!
//! A [`LoaderRegistry`] maps each [`FormatTag`] to a [`ModelLoader`]. The tag
//! the user selected decides which loader runs; the bytes are never sniffed.
//!
//! ```
//! use vantage::{FormatTag, LoaderRegistry};
//!
//! let obj = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
//! let model = LoaderRegistry::new().load(FormatTag::Obj, obj, "triangle").unwrap();
//! assert_eq!(model.triangle_count(), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io::{BufReader, Cursor};
use std::str::FromStr;
use std::sync::Arc;

use glam::Mat4;
use thiserror::Error;

use crate::geometry::RawGeometry;
use crate::mesh::Vertex3d;
use crate::model::{Color, MeshPart, Model};

/// Errors that can occur when decoding an asset.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no loader registered for format '{0}'")]
    UnsupportedFormat(FormatTag),
    #[error("glTF decode failed: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("OBJ decode failed: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("FBX decode failed: {0}")]
    Fbx(#[from] fbxcel::tree::any::Error),
    #[error("unsupported FBX version")]
    FbxUnsupportedVersion,
    #[error("STL decode failed: {0}")]
    Stl(#[source] std::io::Error),
    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset contains no triangle geometry")]
    NoGeometry,
}

/// Upload format tags. `.gltf` and `.glb` share one loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum FormatTag {
    Gltf,
    Glb,
    Obj,
    Fbx,
    Stl,
}

impl FormatTag {
    pub const ALL: [FormatTag; 5] = [
        FormatTag::Gltf,
        FormatTag::Glb,
        FormatTag::Obj,
        FormatTag::Fbx,
        FormatTag::Stl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormatTag::Gltf => "gltf",
            FormatTag::Glb => "glb",
            FormatTag::Obj => "obj",
            FormatTag::Fbx => "fbx",
            FormatTag::Stl => "stl",
        }
    }

    /// Parses a file extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unknown format '{s}'"))
    }
}

/// Turns asset bytes into a [`Model`].
pub trait ModelLoader: Send + Sync {
    fn load(&self, bytes: &[u8], name: &str) -> Result<Model, DecodeError>;
}

/// Lookup table from format tag to loader.
#[derive(Clone)]
pub struct LoaderRegistry {
    loaders: HashMap<FormatTag, Arc<dyn ModelLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderRegistry {
    /// A registry with every built-in format.
    pub fn new() -> Self {
        let gltf: Arc<dyn ModelLoader> = Arc::new(GltfLoader);
        Self::empty()
            .with(FormatTag::Gltf, gltf.clone())
            .with(FormatTag::Glb, gltf)
            .with(FormatTag::Obj, Arc::new(ObjLoader))
            .with(FormatTag::Fbx, Arc::new(FbxLoader))
            .with(FormatTag::Stl, Arc::new(StlLoader))
    }

    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    pub fn with(mut self, tag: FormatTag, loader: Arc<dyn ModelLoader>) -> Self {
        self.register(tag, loader);
        self
    }

    pub fn register(&mut self, tag: FormatTag, loader: Arc<dyn ModelLoader>) {
        self.loaders.insert(tag, loader);
    }

    pub fn supports(&self, tag: FormatTag) -> bool {
        self.loaders.contains_key(&tag)
    }

    /// Decodes `bytes` with the loader registered for `tag`.
    ///
    /// A decode that yields no triangles is an error.
    pub fn load(&self, tag: FormatTag, bytes: &[u8], name: &str) -> Result<Model, DecodeError> {
        let loader = self
            .loaders
            .get(&tag)
            .ok_or(DecodeError::UnsupportedFormat(tag))?;
        let model = loader.load(bytes, name)?;
        if model.is_empty() {
            return Err(DecodeError::NoGeometry);
        }
        log::info!(
            "decoded {name} as {tag}: {} parts, {} triangles",
            model.parts().len(),
            model.triangle_count()
        );
        Ok(model)
    }
}

/// Assembles loader output into geometry.
///
/// Normals are recomputed when missing or mismatched, and triangles that
/// reference missing vertices are dropped.
fn build_geometry(
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    uvs: Option<Vec<[f32; 2]>>,
    mut indices: Vec<u32>,
) -> RawGeometry {
    let count = positions.len();
    indices.truncate(indices.len() - indices.len() % 3);
    let indices: Vec<u32> = indices
        .chunks_exact(3)
        .filter(|tri| tri.iter().all(|&i| (i as usize) < count))
        .flatten()
        .copied()
        .collect();

    let normals = normals.filter(|n| n.len() == count);
    let has_normals = normals.is_some();
    let normals = normals.unwrap_or_else(|| vec![[0.0; 3]; count]);
    let uvs = uvs
        .filter(|uv| uv.len() == count)
        .unwrap_or_else(|| vec![[0.0; 2]; count]);

    let vertices = positions
        .into_iter()
        .zip(normals)
        .zip(uvs)
        .map(|((p, n), uv)| Vertex3d::new(p, n, uv))
        .collect();

    let mut geometry = RawGeometry::new(vertices, indices);
    if !has_normals {
        geometry.recalculate_normals();
    }
    geometry
}

/// glTF 2.0, both JSON (`.gltf`, buffers embedded as data URIs) and binary (`.glb`).
pub struct GltfLoader;

impl ModelLoader for GltfLoader {
    fn load(&self, bytes: &[u8], name: &str) -> Result<Model, DecodeError> {
        let (document, buffers, _images) = gltf::import_slice(bytes)?;

        let mut parts = Vec::new();
        let Some(scene) = document
            .default_scene()
            .or_else(|| document.scenes().next())
        else {
            return Ok(Model::new(name, parts));
        };
        for node in scene.nodes() {
            collect_gltf_node(&node, Mat4::IDENTITY, &buffers, &mut parts);
        }
        Ok(Model::new(name, parts))
    }
}

fn collect_gltf_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    parts: &mut Vec<MeshPart>,
) {
    let local = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh
            .name()
            .or(node.name())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("mesh{}", mesh.index()));

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!("{mesh_name}: skipping {:?} primitive", primitive.mode());
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals = reader.read_normals().map(|n| n.collect());
            let uvs = reader.read_tex_coords(0).map(|t| t.into_f32().collect());
            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let [r, g, b, a] = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();

            parts.push(
                MeshPart::new(mesh_name.clone(), build_geometry(positions, normals, uvs, indices))
                    .with_local(local)
                    .with_color(Color::rgba(r, g, b, a)),
            );
        }
    }

    for child in node.children() {
        collect_gltf_node(&child, local, buffers, parts);
    }
}

/// Wavefront OBJ. Material libraries are not resolved; parts get the default surface.
pub struct ObjLoader;

impl ModelLoader for ObjLoader {
    fn load(&self, bytes: &[u8], name: &str) -> Result<Model, DecodeError> {
        let mut reader = BufReader::new(Cursor::new(bytes));
        let (models, _materials) = tobj::load_obj_buf(&mut reader, &tobj::GPU_LOAD_OPTIONS, |_| {
            Err(tobj::LoadError::OpenFileFailed)
        })?;

        let parts = models
            .into_iter()
            .map(|m| {
                let mesh = m.mesh;
                let positions = mesh
                    .positions
                    .chunks_exact(3)
                    .map(|p| [p[0], p[1], p[2]])
                    .collect();
                let normals = (!mesh.normals.is_empty()).then(|| {
                    mesh.normals
                        .chunks_exact(3)
                        .map(|n| [n[0], n[1], n[2]])
                        .collect()
                });
                let uvs = (!mesh.texcoords.is_empty()).then(|| {
                    mesh.texcoords
                        .chunks_exact(2)
                        .map(|t| [t[0], t[1]])
                        .collect()
                });
                MeshPart::new(m.name, build_geometry(positions, normals, uvs, mesh.indices))
            })
            .collect();

        Ok(Model::new(name, parts))
    }
}

/// Binary FBX 7.x. Reads every `Objects/Geometry` mesh; node transforms are not applied.
pub struct FbxLoader;

impl ModelLoader for FbxLoader {
    fn load(&self, bytes: &[u8], name: &str) -> Result<Model, DecodeError> {
        use fbxcel::tree::any::AnyTree;

        let tree = match AnyTree::from_seekable_reader(Cursor::new(bytes))? {
            AnyTree::V7400(_, tree, _) => tree,
            _ => return Err(DecodeError::FbxUnsupportedVersion),
        };

        let mut parts = Vec::new();
        for objects in tree.root().children_by_name("Objects") {
            for geometry in objects.children_by_name("Geometry") {
                let part_name = geometry
                    .attributes()
                    .get(1)
                    .and_then(|a| a.get_string())
                    .and_then(|s| s.split('\0').next())
                    .filter(|s| !s.is_empty())
                    .unwrap_or("geometry")
                    .to_owned();

                let vertices = geometry
                    .first_child_by_name("Vertices")
                    .and_then(|n| n.attributes().first().and_then(|a| a.get_arr_f64()));
                let polygons = geometry
                    .first_child_by_name("PolygonVertexIndex")
                    .and_then(|n| n.attributes().first().and_then(|a| a.get_arr_i32()));
                let (Some(vertices), Some(polygons)) = (vertices, polygons) else {
                    log::debug!("{part_name}: geometry without vertices or polygons");
                    continue;
                };

                let positions = vertices
                    .chunks_exact(3)
                    .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
                    .collect();
                let indices = triangulate_polygons(polygons);
                parts.push(MeshPart::new(
                    part_name,
                    build_geometry(positions, None, None, indices),
                ));
            }
        }

        Ok(Model::new(name, parts))
    }
}

/// Fan-triangulates an FBX polygon index list.
///
/// FBX marks the last corner of each polygon by storing it bitwise negated.
fn triangulate_polygons(polygon_indices: &[i32]) -> Vec<u32> {
    let mut indices = Vec::with_capacity(polygon_indices.len() * 3 / 2);
    let mut polygon: Vec<u32> = Vec::new();

    for &raw in polygon_indices {
        let (index, last) = if raw < 0 { (!raw, true) } else { (raw, false) };
        polygon.push(index as u32);
        if last {
            for i in 1..polygon.len().saturating_sub(1) {
                indices.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
            }
            polygon.clear();
        }
    }
    indices
}

/// STL, ASCII or binary.
pub struct StlLoader;

impl ModelLoader for StlLoader {
    fn load(&self, bytes: &[u8], name: &str) -> Result<Model, DecodeError> {
        let mut cursor = Cursor::new(bytes);
        let stl = stl_io::read_stl(&mut cursor).map_err(DecodeError::Stl)?;

        let mut vertices = Vec::with_capacity(stl.faces.len() * 3);
        let mut indices = Vec::with_capacity(stl.faces.len() * 3);
        let mut missing_normals = false;

        // stl_io returns an IndexedMesh with a vertex list and indexed triangles
        for face in &stl.faces {
            let normal: [f32; 3] = face.normal.into();
            missing_normals |= normal == [0.0; 3];

            let corners: Option<Vec<[f32; 3]>> = face
                .vertices
                .iter()
                .map(|&i| stl.vertices.get(i).map(|v| (*v).into()))
                .collect();
            let Some(corners) = corners else {
                continue;
            };
            for position in corners {
                indices.push(vertices.len() as u32);
                vertices.push(Vertex3d::new(position, normal, [0.0, 0.0]));
            }
        }

        let mut geometry = RawGeometry::new(vertices, indices);
        if missing_normals {
            geometry.recalculate_normals();
        }
        Ok(Model::new(name, vec![MeshPart::new(name, geometry)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::world_bounds;
    use glam::Vec3;

    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": [0, 0, 2] }],
        "meshes": [{
            "name": "tri",
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }]
        }],
        "materials": [{ "pbrMetallicRoughness": { "baseColorFactor": [1, 0, 0, 1] } }],
        "buffers": [{
            "byteLength": 44,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA="
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0, 0, 0], "max": [1, 1, 0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    const QUAD_OBJ: &str = "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";

    const TRIANGLE_STL: &str = "solid t
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 1 0
  endloop
endfacet
endsolid t
";

    #[test]
    fn gltf_triangle_with_node_transform() {
        let model = LoaderRegistry::new()
            .load(FormatTag::Gltf, TRIANGLE_GLTF.as_bytes(), "tri.gltf")
            .unwrap();
        assert_eq!(model.triangle_count(), 1);
        let part = &model.parts()[0];
        assert_eq!(part.name, "tri");
        assert_eq!(part.material.color, Color::rgba(1.0, 0.0, 0.0, 1.0));

        let bounds = world_bounds(&model);
        assert!((bounds.min.z - 2.0).abs() < 1e-6);
        // Normals were missing and got recomputed
        let n = Vec3::from(part.geometry.vertices[0].normal);
        assert!((n - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn glb_tag_shares_gltf_loader() {
        let model = LoaderRegistry::new()
            .load(FormatTag::Glb, TRIANGLE_GLTF.as_bytes(), "tri")
            .unwrap();
        assert_eq!(model.triangle_count(), 1);
    }

    #[test]
    fn obj_quad_is_triangulated_with_normals() {
        let model = LoaderRegistry::new()
            .load(FormatTag::Obj, QUAD_OBJ.as_bytes(), "quad.obj")
            .unwrap();
        assert_eq!(model.triangle_count(), 2);
        assert_eq!(model.parts()[0].name, "quad");
        for v in &model.parts()[0].geometry.vertices {
            assert!((Vec3::from(v.normal) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn ascii_stl_triangle() {
        let model = LoaderRegistry::new()
            .load(FormatTag::Stl, TRIANGLE_STL.as_bytes(), "t.stl")
            .unwrap();
        assert_eq!(model.triangle_count(), 1);
        assert_eq!(model.parts()[0].geometry.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn selected_tag_gates_the_loader() {
        // Valid OBJ text is not valid glTF
        let err = LoaderRegistry::new()
            .load(FormatTag::Gltf, QUAD_OBJ.as_bytes(), "quad")
            .unwrap_err();
        assert!(matches!(err, DecodeError::Gltf(_)));
    }

    #[test]
    fn garbage_fbx_is_a_decode_error() {
        let err = LoaderRegistry::new()
            .load(FormatTag::Fbx, b"definitely not fbx", "junk.fbx")
            .unwrap_err();
        assert!(matches!(err, DecodeError::Fbx(_)));
    }

    #[test]
    fn missing_loader_is_unsupported() {
        let err = LoaderRegistry::empty()
            .load(FormatTag::Obj, QUAD_OBJ.as_bytes(), "quad")
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(FormatTag::Obj)));
    }

    #[test]
    fn obj_without_faces_has_no_geometry() {
        let err = LoaderRegistry::new()
            .load(FormatTag::Obj, b"v 0 0 0\nv 1 0 0\n", "points")
            .unwrap_err();
        assert!(matches!(err, DecodeError::NoGeometry));
    }

    #[test]
    fn custom_loaders_can_be_registered() {
        struct Fixed;
        impl ModelLoader for Fixed {
            fn load(&self, _bytes: &[u8], name: &str) -> Result<Model, DecodeError> {
                Ok(Model::new(name, vec![MeshPart::new("cube", RawGeometry::cube(1.0))]))
            }
        }
        let registry = LoaderRegistry::empty().with(FormatTag::Fbx, Arc::new(Fixed));
        assert!(registry.supports(FormatTag::Fbx));
        assert!(!registry.supports(FormatTag::Obj));
        assert_eq!(registry.load(FormatTag::Fbx, &[], "x").unwrap().triangle_count(), 12);
    }

    #[test]
    fn fbx_polygons_fan_triangulate() {
        // A triangle followed by a quad
        let indices = triangulate_polygons(&[0, 1, !2, 3, 4, 5, !6]);
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5, 3, 5, 6]);
    }

    #[test]
    fn build_geometry_drops_bad_triangles() {
        let geometry = build_geometry(
            vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            None,
            None,
            vec![0, 1, 2, 0, 1, 9, 2],
        );
        assert_eq!(geometry.indices, vec![0, 1, 2]);
    }

    #[test]
    fn format_tags_parse_from_extensions() {
        assert_eq!(FormatTag::from_extension(".GLB"), Some(FormatTag::Glb));
        assert_eq!("obj".parse::<FormatTag>(), Ok(FormatTag::Obj));
        assert_eq!(FormatTag::from_extension("png"), None);
    }
}
