use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("model is empty")]
    Empty,
    #[error("model is too short to be an STL file ({0} bytes)")]
    TooShort(usize),
    #[error("binary STL length mismatch: header declares {declared} triangles, body holds {actual}")]
    LengthMismatch { declared: u32, actual: u64 },
    #[error("malformed STL: {0}")]
    Malformed(String),
    #[error("model contains no triangles")]
    NoTriangles,
}

/// Geometry summary of an uploaded model, in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshReport {
    pub triangle_count: usize,
    pub bbox_min: [f64; 3],
    pub bbox_max: [f64; 3],
    pub surface_area_mm2: f64,
    pub volume_mm3: f64,
    pub watertight: bool,
}

/// Hex SHA-256 of the model bytes: the content address quotes are cached
/// under.
pub fn model_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

type Triangle = [[f32; 3]; 3];

pub struct MeshAnalyzer;

impl MeshAnalyzer {
    /// Parse an STL model (binary or ASCII) and compute its geometry
    /// summary. Deterministic for identical input bytes.
    pub fn analyze(bytes: &[u8]) -> Result<MeshReport, AnalysisError> {
        if bytes.is_empty() {
            return Err(AnalysisError::Empty);
        }
        let triangles = parse_stl(bytes)?;
        if triangles.is_empty() {
            return Err(AnalysisError::NoTriangles);
        }
        Ok(summarize(&triangles))
    }
}

fn parse_stl(bytes: &[u8]) -> Result<Vec<Triangle>, AnalysisError> {
    // A binary STL is exactly 84 + 50 * n bytes. Files that begin with
    // "solid" can still be binary, so the length check decides.
    if bytes.len() >= 84 {
        let declared = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]);
        let expected = 84u64 + 50u64 * u64::from(declared);
        if expected == bytes.len() as u64 {
            return parse_binary(bytes, declared);
        }
        if !bytes.starts_with(b"solid") {
            let actual = (bytes.len() as u64).saturating_sub(84) / 50;
            return Err(AnalysisError::LengthMismatch { declared, actual });
        }
    }
    if bytes.starts_with(b"solid") {
        return parse_ascii(bytes);
    }
    Err(AnalysisError::TooShort(bytes.len()))
}

fn parse_binary(bytes: &[u8], declared: u32) -> Result<Vec<Triangle>, AnalysisError> {
    let mut triangles = Vec::with_capacity(declared as usize);
    let mut offset = 84usize;
    for _ in 0..declared {
        // 12 bytes normal (ignored), 36 bytes vertices, 2 bytes attribute
        let vertex_bytes = &bytes[offset + 12..offset + 48];
        let mut triangle = [[0f32; 3]; 3];
        for (v, vertex) in triangle.iter_mut().enumerate() {
            for (c, coord) in vertex.iter_mut().enumerate() {
                let at = v * 12 + c * 4;
                *coord = f32::from_le_bytes([
                    vertex_bytes[at],
                    vertex_bytes[at + 1],
                    vertex_bytes[at + 2],
                    vertex_bytes[at + 3],
                ]);
            }
        }
        if triangle.iter().flatten().any(|c| !c.is_finite()) {
            return Err(AnalysisError::Malformed("non-finite vertex coordinate".into()));
        }
        triangles.push(triangle);
        offset += 50;
    }
    Ok(triangles)
}

fn parse_ascii(bytes: &[u8]) -> Result<Vec<Triangle>, AnalysisError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| AnalysisError::Malformed("ASCII STL is not valid UTF-8".into()))?;

    let mut triangles = Vec::new();
    let mut pending: Vec<[f32; 3]> = Vec::with_capacity(3);

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("vertex") {
            let coords: Vec<f32> = rest
                .split_whitespace()
                .map(|token| token.parse::<f32>())
                .collect::<Result<_, _>>()
                .map_err(|_| {
                    AnalysisError::Malformed(format!("bad vertex on line {}", line_no + 1))
                })?;
            if coords.len() != 3 {
                return Err(AnalysisError::Malformed(format!(
                    "vertex on line {} has {} coordinates",
                    line_no + 1,
                    coords.len()
                )));
            }
            if coords.iter().any(|c| !c.is_finite()) {
                return Err(AnalysisError::Malformed("non-finite vertex coordinate".into()));
            }
            pending.push([coords[0], coords[1], coords[2]]);
        } else if line.starts_with("endfacet") {
            if pending.len() != 3 {
                return Err(AnalysisError::Malformed(format!(
                    "facet ending on line {} has {} vertices",
                    line_no + 1,
                    pending.len()
                )));
            }
            triangles.push([pending[0], pending[1], pending[2]]);
            pending.clear();
        }
    }
    if !pending.is_empty() {
        return Err(AnalysisError::Malformed("truncated facet at end of file".into()));
    }
    Ok(triangles)
}

fn summarize(triangles: &[Triangle]) -> MeshReport {
    let mut bbox_min = [f64::INFINITY; 3];
    let mut bbox_max = [f64::NEG_INFINITY; 3];
    let mut area = 0f64;
    let mut signed_volume = 0f64;

    for triangle in triangles {
        for vertex in triangle {
            for axis in 0..3 {
                let coord = f64::from(vertex[axis]);
                bbox_min[axis] = bbox_min[axis].min(coord);
                bbox_max[axis] = bbox_max[axis].max(coord);
            }
        }
        let a = to_f64(triangle[0]);
        let b = to_f64(triangle[1]);
        let c = to_f64(triangle[2]);
        let ab = sub(b, a);
        let ac = sub(c, a);
        let n = cross(ab, ac);
        area += norm(n) / 2.0;
        signed_volume += dot(a, cross(b, c)) / 6.0;
    }

    MeshReport {
        triangle_count: triangles.len(),
        bbox_min,
        bbox_max,
        surface_area_mm2: area,
        volume_mm3: signed_volume.abs(),
        watertight: is_watertight(triangles),
    }
}

/// Every undirected edge must be shared by exactly two triangles. Vertices
/// are matched on exact bit patterns, so this only holds for meshes whose
/// shared vertices are written identically (the common case for exports).
fn is_watertight(triangles: &[Triangle]) -> bool {
    type VertexKey = [u32; 3];
    let key = |v: [f32; 3]| -> VertexKey { [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()] };

    let mut edges: HashMap<(VertexKey, VertexKey), u32> = HashMap::new();
    for triangle in triangles {
        for i in 0..3 {
            let a = key(triangle[i]);
            let b = key(triangle[(i + 1) % 3]);
            let edge = if a <= b { (a, b) } else { (b, a) };
            *edges.entry(edge).or_insert(0) += 1;
        }
    }
    edges.values().all(|&count| count == 2)
}

fn to_f64(v: [f32; 3]) -> [f64; 3] {
    [f64::from(v[0]), f64::from(v[1]), f64::from(v[2])]
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Binary STL encoding of the given triangles.
    pub(crate) fn binary_stl(triangles: &[Triangle]) -> Vec<u8> {
        let mut out = vec![0u8; 80];
        out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for triangle in triangles {
            out.extend_from_slice(&[0u8; 12]); // normal, ignored
            for vertex in triangle {
                for coord in vertex {
                    out.extend_from_slice(&coord.to_le_bytes());
                }
            }
            out.extend_from_slice(&[0u8; 2]); // attribute byte count
        }
        out
    }

    /// Unit tetrahedron: volume 1/6, watertight, outward-facing windings.
    pub(crate) fn tetrahedron() -> Vec<Triangle> {
        let o = [0.0, 0.0, 0.0];
        let x = [1.0, 0.0, 0.0];
        let y = [0.0, 1.0, 0.0];
        let z = [0.0, 0.0, 1.0];
        vec![[o, y, x], [o, x, z], [o, z, y], [x, y, z]]
    }

    #[test]
    fn binary_tetrahedron_geometry() {
        let bytes = binary_stl(&tetrahedron());
        let report = MeshAnalyzer::analyze(&bytes).unwrap();
        assert_eq!(report.triangle_count, 4);
        assert!((report.volume_mm3 - 1.0 / 6.0).abs() < 1e-9);
        // three right triangles of area 0.5 plus the slanted face
        let expected_area = 1.5 + (3f64.sqrt() / 2.0);
        assert!((report.surface_area_mm2 - expected_area).abs() < 1e-9);
        assert_eq!(report.bbox_min, [0.0, 0.0, 0.0]);
        assert_eq!(report.bbox_max, [1.0, 1.0, 1.0]);
        assert!(report.watertight);
    }

    #[test]
    fn open_mesh_is_not_watertight() {
        let mut faces = tetrahedron();
        faces.pop();
        let report = MeshAnalyzer::analyze(&binary_stl(&faces)).unwrap();
        assert!(!report.watertight);
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let mut bytes = binary_stl(&tetrahedron());
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            MeshAnalyzer::analyze(&bytes),
            Err(AnalysisError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn ascii_stl_parses() {
        let text = "\
solid demo
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid demo
";
        let report = MeshAnalyzer::analyze(text.as_bytes()).unwrap();
        assert_eq!(report.triangle_count, 1);
        assert!((report.surface_area_mm2 - 0.5).abs() < 1e-9);
        assert!(!report.watertight);
    }

    #[test]
    fn ascii_with_bad_vertex_is_rejected() {
        let text = "solid demo\nfacet\nouter loop\nvertex 0 0\nendloop\nendfacet\nendsolid";
        assert!(matches!(
            MeshAnalyzer::analyze(text.as_bytes()),
            Err(AnalysisError::Malformed(_))
        ));
    }

    #[test]
    fn empty_and_garbage_input() {
        assert!(matches!(MeshAnalyzer::analyze(b""), Err(AnalysisError::Empty)));
        assert!(MeshAnalyzer::analyze(b"not an stl").is_err());
    }

    #[test]
    fn model_hash_is_stable() {
        let bytes = binary_stl(&tetrahedron());
        assert_eq!(model_hash(&bytes), model_hash(&bytes));
        assert_eq!(model_hash(&bytes).len(), 64);
        assert_ne!(model_hash(&bytes), model_hash(b"other"));
    }
}
