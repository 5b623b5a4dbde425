use nalgebra::Point3;

/// An undirected edge: one of its two half-edges, a lazily-maintained
/// collapse cost, and the vertex position that collapsing it would produce.
///
/// The heap handle is not stored on the edge itself; the edge's own
/// `index` doubles as the handle the priority queue indirects through (see
/// [`crate::heap`]).
#[derive(Debug, Clone)]
pub struct Edge {
    pub he: usize,
    pub index: usize,
    pub remove: bool,
    pub cost: f64,
    pub position: Point3<f64>,
}

impl Edge {
    pub fn new(he: usize) -> Self {
        Edge {
            he,
            index: 0,
            remove: false,
            cost: f64::INFINITY,
            position: Point3::origin(),
        }
    }
}
