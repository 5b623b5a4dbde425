/// A triangular face: one bounding half-edge. Boundary loops are not
/// represented as `Face`s — they live purely in the half-edge graph, marked
/// by `HalfEdge::on_boundary`.
#[derive(Debug, Clone)]
pub struct Face {
    pub he: usize,
    pub index: usize,
    pub remove: bool,
}

impl Face {
    pub fn new(he: usize) -> Self {
        Face {
            he,
            index: 0,
            remove: false,
        }
    }
}
