//! Recentering and rescaling a mesh to fit a unit sphere, matching
//! `original_source/Mesh.cpp::normalize`: translate by the negated center of
//! mass, then rescale by the reciprocal of the farthest vertex's distance
//! from the origin. Not invoked automatically by [`crate::Mesh::simplify`];
//! callers normalize before or after simplification as they see fit.

use nalgebra::Point3;

use crate::mesh::Mesh;

pub fn to_unit_sphere(mesh: &mut Mesh) {
    if mesh.vertices.is_empty() {
        return;
    }

    let mut center = nalgebra::Vector3::zeros();
    for v in &mesh.vertices {
        center += v.position.coords;
    }
    center /= mesh.vertices.len() as f64;

    for v in mesh.vertices.iter_mut() {
        v.position = Point3::from(v.position.coords - center);
    }

    let max_radius = mesh
        .vertices
        .iter()
        .map(|v| v.position.coords.norm())
        .fold(0.0_f64, f64::max);

    if max_radius < f64::EPSILON {
        return;
    }
    for v in mesh.vertices.iter_mut() {
        v.position = Point3::from(v.position.coords / max_radius);
    }
}
