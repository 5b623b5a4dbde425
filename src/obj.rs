//! Minimal Wavefront OBJ read/write: `v` and `f` lines only. Normals,
//! texture coordinates, materials, and groups are out of scope — this
//! module exists to get a triangle soup in and out of the mesh, not to be
//! a general OBJ toolkit.

use anyhow::{bail, Context, Result};
use nalgebra::Point3;
use std::fmt::Write as _;

use crate::mesh::Mesh;

/// Parse an OBJ document from `data`, taking `v` lines as vertex positions
/// and `f` lines as faces. Faces with more than three vertices are fan-
/// triangulated around their first vertex, matching the teacher's
/// polygon-handling shape without its general ear-clipping triangulator
/// (a simple mesh-exchange concern, not part of the simplification
/// algorithm this crate exists to implement). Face reference groups may
/// carry `/vt/vn` suffixes, which are parsed and discarded since this
/// crate has no use for them.
pub fn read_str(data: &str) -> Result<Mesh> {
    let mut positions: Vec<Point3<f64>> = Vec::new();
    let mut triangles: Vec<[usize; 3]> = Vec::new();

    for (line_no, raw) in data.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default();
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["v", x, y, z, ..] => {
                let p = Point3::new(
                    x.parse().with_context(|| format!("line {}: bad x coordinate", line_no + 1))?,
                    y.parse().with_context(|| format!("line {}: bad y coordinate", line_no + 1))?,
                    z.parse().with_context(|| format!("line {}: bad z coordinate", line_no + 1))?,
                );
                positions.push(p);
            }
            ["f", refs @ ..] => {
                if refs.len() < 3 {
                    bail!("line {}: a face needs at least 3 vertices, got {}", line_no + 1, refs.len());
                }
                let mut indices = Vec::with_capacity(refs.len());
                for r in refs {
                    let index_str = r.split('/').next().unwrap_or_default();
                    let one_based: usize = index_str
                        .parse()
                        .with_context(|| format!("line {}: bad face vertex index", line_no + 1))?;
                    if one_based == 0 {
                        bail!("line {}: face vertex indices are 1-based", line_no + 1);
                    }
                    indices.push(one_based - 1);
                }
                for k in 1..indices.len() - 1 {
                    triangles.push([indices[0], indices[k], indices[k + 1]]);
                }
            }
            _ => {}
        }
    }

    Mesh::from_triangle_soup(&positions, &triangles)
}

/// Serialize a mesh as `v`/`f` lines, 1-based indices, in the mesh's
/// current vertex and face storage order.
pub fn write_string(mesh: &Mesh) -> String {
    let mut out = String::new();
    for v in &mesh.vertices {
        let _ = writeln!(out, "v {} {} {}", v.position.x, v.position.y, v.position.z);
    }
    for f in &mesh.faces {
        let he0 = f.he;
        let he1 = mesh.half_edges[he0].next;
        let he2 = mesh.half_edges[he1].next;
        let a = mesh.half_edges[he0].vertex + 1;
        let b = mesh.half_edges[he1].vertex + 1;
        let c = mesh.half_edges[he2].vertex + 1;
        let _ = writeln!(out, "f {a} {b} {c}");
    }
    out
}
