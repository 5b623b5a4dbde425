use nalgebra::{Matrix4, Point3};

use crate::NONE;

/// A vertex in the half-edge mesh.
///
/// `he` is one outgoing half-edge; any one suffices since the one-ring walk
/// (`h = h.flip.next`) visits every outgoing half-edge regardless of which
/// one it starts from. `he == NONE` marks an isolated vertex.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub position: Point3<f64>,
    pub he: usize,
    pub quadric: Matrix4<f64>,
    pub index: usize,
    pub remove: bool,
}

impl Vertex {
    pub fn new(position: Point3<f64>) -> Self {
        Vertex {
            position,
            he: NONE,
            quadric: Matrix4::zeros(),
            index: 0,
            remove: false,
        }
    }

    pub fn is_isolated(&self) -> bool {
        self.he == NONE
    }
}
