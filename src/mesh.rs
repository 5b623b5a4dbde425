//! The half-edge connectivity store and the simplification algorithm that
//! operates on it: quadric initialization, the priority-driven collapse
//! loop, and compaction.

use ahash::AHashMap;
use anyhow::{bail, Result};
use nalgebra::{Matrix4, Point3};

use crate::edge::Edge;
use crate::face::Face;
use crate::half_edge::HalfEdge;
use crate::heap::EdgeHeap;
use crate::quadric;
use crate::vertex::Vertex;
use crate::NONE;

/// A triangular manifold surface mesh, stored as parallel flat arrays of
/// vertices, half-edges, edges, and faces addressed by stable `usize`
/// indices. See the crate's design notes for the invariants this type
/// upholds between public calls.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub half_edges: Vec<HalfEdge>,
    pub edges: Vec<Edge>,
    pub faces: Vec<Face>,
}

impl Mesh {
    pub fn new() -> Self {
        Mesh::default()
    }

    /// Build a half-edge mesh from a vertex position list and a triangle
    /// list of vertex indices. This is the "glue to external I/O" boundary:
    /// readers (OBJ or otherwise) only need to produce these two flat
    /// lists, not half-edge connectivity themselves.
    ///
    /// Errors if a triangle references an out-of-range or repeated vertex,
    /// if the same directed edge is produced twice (two faces with
    /// identical winding sharing an edge), or if the boundary does not
    /// close into simple loops (non-manifold input) — all are rejected
    /// rather than silently producing a malformed mesh.
    pub fn from_triangle_soup(positions: &[Point3<f64>], triangles: &[[usize; 3]]) -> Result<Self> {
        if triangles.is_empty() {
            bail!("mesh has no faces");
        }
        for tri in triangles {
            for &i in tri {
                if i >= positions.len() {
                    bail!("triangle references out-of-range vertex {i}");
                }
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                bail!("degenerate triangle with a repeated vertex");
            }
        }

        let mut vertices: Vec<Vertex> = positions.iter().map(|p| Vertex::new(*p)).collect();
        let mut half_edges: Vec<HalfEdge> = Vec::with_capacity(triangles.len() * 3);
        let mut faces: Vec<Face> = Vec::with_capacity(triangles.len());

        // Ordered (from, to) -> half-edge index, used both to detect
        // non-manifold input and to find each half-edge's flip.
        let mut directed: AHashMap<(usize, usize), usize> = AHashMap::default();

        for tri in triangles {
            let base = half_edges.len();
            let face_index = faces.len();
            faces.push(Face::new(base));

            for k in 0..3 {
                let from = tri[k];
                let to = tri[(k + 1) % 3];
                let he_index = base + k;
                half_edges.push(HalfEdge {
                    vertex: from,
                    next: base + (k + 1) % 3,
                    face: face_index,
                    ..HalfEdge::new()
                });
                vertices[from].he = he_index;

                if directed.insert((from, to), he_index).is_some() {
                    bail!(
                        "non-manifold input: edge ({from}, {to}) is shared by more than one face with the same winding"
                    );
                }
            }
        }

        // Pair up flips; anything left unmatched is a boundary half-edge.
        let mut unmatched = Vec::new();
        for he_index in 0..half_edges.len() {
            if half_edges[he_index].flip != NONE {
                continue;
            }
            let from = half_edges[he_index].vertex;
            let to = half_edges[half_edges[he_index].next].vertex;
            match directed.get(&(to, from)) {
                Some(&other) => {
                    half_edges[he_index].flip = other;
                    half_edges[other].flip = he_index;
                }
                None => unmatched.push(he_index),
            }
        }

        // Stitch boundary loops: for each unmatched interior half-edge
        // `he: u -> w`, create a boundary half-edge `b: w -> u` as its
        // flip, then link each boundary half-edge's `next` to the unique
        // boundary half-edge originating where it ends.
        let mut boundary_by_origin: AHashMap<usize, usize> = AHashMap::default();
        let mut boundary_pairs = Vec::with_capacity(unmatched.len());
        for &he_index in &unmatched {
            let from = half_edges[he_index].vertex;
            let to = half_edges[half_edges[he_index].next].vertex;
            let b_index = half_edges.len();
            half_edges.push(HalfEdge {
                vertex: to,
                flip: he_index,
                on_boundary: true,
                face: NONE,
                ..HalfEdge::new()
            });
            half_edges[he_index].flip = b_index;
            if boundary_by_origin.insert(to, b_index).is_some() {
                bail!("non-manifold boundary: vertex {to} has more than one outgoing boundary edge");
            }
            boundary_pairs.push((he_index, b_index));
        }
        for (he_index, b_index) in boundary_pairs {
            let origin = half_edges[he_index].vertex;
            let Some(&next) = boundary_by_origin.get(&origin) else {
                bail!("non-manifold boundary: hole does not close into a loop at vertex {origin}");
            };
            half_edges[b_index].next = next;
        }

        // One Edge per flip pair.
        let mut edges: Vec<Edge> = Vec::new();
        for he_index in 0..half_edges.len() {
            if half_edges[he_index].edge != NONE {
                continue;
            }
            let edge_index = edges.len();
            edges.push(Edge::new(he_index));
            let flip = half_edges[he_index].flip;
            half_edges[he_index].edge = edge_index;
            half_edges[flip].edge = edge_index;
        }

        let mut mesh = Mesh {
            vertices,
            half_edges,
            edges,
            faces,
        };
        mesh.reindex();
        Ok(mesh)
    }

    fn reindex(&mut self) {
        for (i, v) in self.vertices.iter_mut().enumerate() {
            v.index = i;
        }
        for (i, h) in self.half_edges.iter_mut().enumerate() {
            h.index = i;
        }
        for (i, e) in self.edges.iter_mut().enumerate() {
            e.index = i;
        }
        for (i, f) in self.faces.iter_mut().enumerate() {
            f.index = i;
        }
    }

    pub fn live_face_count(&self) -> usize {
        self.faces.iter().filter(|f| !f.remove).count()
    }

    /// Walk `v`'s one-ring and report whether any incident half-edge is a
    /// boundary half-edge.
    pub fn vertex_on_boundary(&self, v: usize) -> bool {
        let start = self.vertices[v].he;
        if start == NONE {
            return false;
        }
        let mut h = start;
        loop {
            if self.half_edges[h].on_boundary {
                return true;
            }
            h = self.half_edges[self.half_edges[h].flip].next;
            if h == start {
                break;
            }
        }
        false
    }

    /// Whether `u` and `v` already share an edge, found by walking `u`'s
    /// one-ring and checking each neighbor directly (`flip.vertex`) rather
    /// than the original's nested walk of both rings.
    fn share_edge(&self, u: usize, v: usize) -> bool {
        let start = self.vertices[u].he;
        if start == NONE {
            return false;
        }
        let mut h = start;
        loop {
            if self.half_edges[self.half_edges[h].flip].vertex == v {
                return true;
            }
            h = self.half_edges[self.half_edges[h].flip].next;
            if h == start {
                break;
            }
        }
        false
    }

    /// §4.2: an edge is collapsible iff neither endpoint is on the
    /// boundary and the link condition holds — no vertex in the edge's
    /// one-ring other than the two apexes shares an edge with the other
    /// endpoint.
    pub fn valid_collapse(&self, edge_idx: usize) -> bool {
        let he = self.edges[edge_idx].he;
        let flip = self.half_edges[he].flip;
        let v1 = self.half_edges[he].vertex;
        let v2 = self.half_edges[flip].vertex;
        let v3 = self.half_edges[self.half_edges[he].next].vertex;
        let v4 = self.half_edges[self.half_edges[flip].next].vertex;

        if self.vertex_on_boundary(v1) || self.vertex_on_boundary(v2) {
            return false;
        }

        let start = he;
        let mut h = start;
        loop {
            let neighbor = self.half_edges[self.half_edges[h].flip].vertex;
            if neighbor != v2 && neighbor != v3 && neighbor != v4 && self.share_edge(neighbor, v2) {
                return false;
            }
            h = self.half_edges[self.half_edges[h].flip].next;
            if h == start {
                break;
            }
        }
        true
    }

    /// §4.1 + §4.2: recompute one edge's collapse cost and post-collapse
    /// position. Edges that fail the validity check get cost `+inf`.
    fn compute_edge_cost(&mut self, edge_idx: usize) {
        if !self.valid_collapse(edge_idx) {
            self.edges[edge_idx].cost = f64::INFINITY;
            return;
        }
        let he = self.edges[edge_idx].he;
        let v1 = self.half_edges[he].vertex;
        let v2 = self.half_edges[self.half_edges[he].flip].vertex;
        let (point, cost, _) = quadric::optimal_point(
            &self.vertices[v1].quadric,
            &self.vertices[v2].quadric,
            &self.vertices[v1].position,
            &self.vertices[v2].position,
        );
        self.edges[edge_idx].position = point;
        self.edges[edge_idx].cost = cost;
    }

    /// §4.1: accumulate each non-boundary face's plane quadric into its
    /// three vertices. Degenerate (zero-area) faces contribute a zero
    /// quadric via [`quadric::face_plane`] rather than being rejected.
    fn compute_quadrics(&mut self) {
        for v in self.vertices.iter_mut() {
            v.quadric = Matrix4::zeros();
        }
        for f in 0..self.faces.len() {
            if self.faces[f].remove {
                continue;
            }
            let he0 = self.faces[f].he;
            let he1 = self.half_edges[he0].next;
            let he2 = self.half_edges[he1].next;
            let v0 = self.half_edges[he0].vertex;
            let v1 = self.half_edges[he1].vertex;
            let v2 = self.half_edges[he2].vertex;

            let plane = quadric::face_plane(
                &self.vertices[v0].position,
                &self.vertices[v1].position,
                &self.vertices[v2].position,
            );
            let q = quadric::quadric_from_plane(&plane);
            self.vertices[v0].quadric += q;
            self.vertices[v1].quadric += q;
            self.vertices[v2].quadric += q;
        }
    }

    /// §4.3: collapse the edge at `edge_idx` in place. Preconditions: the
    /// edge is valid per [`Mesh::valid_collapse`] and not already removed.
    /// Ported directly from `original_source/Edge.cpp::collapse`, index
    /// arrays standing in for the source's half-edge iterators.
    fn collapse_edge(&mut self, edge_idx: usize) {
        let he = self.edges[edge_idx].he;
        let he_n = self.half_edges[he].next;
        let he_nn = self.half_edges[he_n].next;
        let fl = self.half_edges[he].flip;
        let fl_n = self.half_edges[fl].next;
        let fl_nn = self.half_edges[fl_n].next;

        let v1 = self.half_edges[he].vertex;
        let v3 = self.half_edges[he_nn].vertex;
        let v4 = self.half_edges[fl_nn].vertex;

        let e2 = self.half_edges[he_nn].edge;
        let e3 = self.half_edges[fl_n].edge;

        let f = self.half_edges[he].face;
        let f_flip = self.half_edges[fl].face;

        let he_nn_flip = self.half_edges[he_nn].flip;
        let fl_n_flip = self.half_edges[fl_n].flip;

        // 1. Reattach every half-edge outgoing from v2 to originate at v1.
        let mut h = fl;
        loop {
            self.half_edges[h].vertex = v1;
            h = self.half_edges[self.half_edges[h].flip].next;
            if h == fl {
                break;
            }
        }

        // 2. Rewrite vertex -> half-edge links.
        self.vertices[v1].he = he_n;
        self.vertices[v3].he = self.half_edges[he_nn_flip].next;
        self.vertices[v4].he = fl_nn;

        // 3. Splice the two surviving half-edges into the faces across the
        // collapsing triangles' other two edges, replacing heNN.flip and
        // flN.flip (each removed below) in their respective face cycles.
        self.half_edges[he_n].face = self.half_edges[he_nn_flip].face;
        let face_a = self.half_edges[he_n].face;
        self.faces[face_a].he = he_n;

        self.half_edges[fl_nn].face = self.half_edges[fl_n_flip].face;
        let face_b = self.half_edges[fl_nn].face;
        self.faces[face_b].he = fl_nn;

        self.half_edges[he_n].next = self.half_edges[he_nn_flip].next;
        let x1 = self.half_edges[he_n].next;
        let y1 = self.half_edges[x1].next;
        self.half_edges[y1].next = he_n;

        self.half_edges[fl_nn].next = self.half_edges[fl_n_flip].next;
        let x2 = self.half_edges[fl_nn].next;
        let y2 = self.half_edges[x2].next;
        self.half_edges[y2].next = fl_nn;

        // 4. Mark for removal. v2 itself is marked by the caller, which
        // still has its index at hand.
        self.edges[edge_idx].remove = true;
        self.edges[e2].remove = true;
        self.edges[e3].remove = true;
        self.half_edges[he].remove = true;
        self.half_edges[fl].remove = true;
        self.half_edges[he_nn].remove = true;
        self.half_edges[he_nn_flip].remove = true;
        self.half_edges[fl_n].remove = true;
        self.half_edges[fl_n_flip].remove = true;
        self.faces[f].remove = true;
        self.faces[f_flip].remove = true;
    }

    /// §4.5: simplify in place until the live face count is `<= target_face_count`
    /// or no further collapse is valid. Errors without mutating the mesh if
    /// `target_face_count < 2`.
    pub fn simplify(&mut self, target_face_count: usize) -> Result<()> {
        if target_face_count < 2 {
            bail!("target_face_count must be >= 2, got {target_face_count}");
        }

        let mut live_faces = self.live_face_count();
        if live_faces <= target_face_count {
            self.compact();
            return Ok(());
        }

        self.compute_quadrics();
        for i in 0..self.edges.len() {
            self.compute_edge_cost(i);
        }

        let mut heap = EdgeHeap::with_capacity(self.edges.len());
        for i in 0..self.edges.len() {
            heap.push(i, self.edges[i].cost);
        }

        while live_faces > target_face_count {
            let Some((edge_idx, cost)) = heap.peek() else {
                break;
            };

            if self.edges[edge_idx].remove {
                heap.pop();
                continue;
            }

            if cost.is_infinite() {
                log::debug!("simplify: no valid collapse remains, stopping at {live_faces} faces");
                break;
            }

            if !self.valid_collapse(edge_idx) {
                self.edges[edge_idx].cost = f64::INFINITY;
                heap.update(edge_idx, f64::INFINITY);
                log::trace!("simplify: edge {edge_idx} went stale, deferring");
                continue;
            }

            let he = self.edges[edge_idx].he;
            let v1 = self.half_edges[he].vertex;
            let v2 = self.half_edges[self.half_edges[he].flip].vertex;
            self.vertices[v1].position = self.edges[edge_idx].position;
            self.vertices[v1].quadric += self.vertices[v2].quadric;
            self.vertices[v2].remove = true;

            self.collapse_edge(edge_idx);
            live_faces -= 2;
            log::trace!("simplify: collapsed edge {edge_idx}, {live_faces} faces remain");

            let start = self.vertices[v1].he;
            let mut h = start;
            loop {
                let e_prime = self.half_edges[h].edge;
                self.compute_edge_cost(e_prime);
                heap.update(e_prime, self.edges[e_prime].cost);
                h = self.half_edges[self.half_edges[h].flip].next;
                if h == start {
                    break;
                }
            }
        }

        self.compact();
        Ok(())
    }

    /// Convenience wrapper computing `target = round(ratio * live_faces)`
    /// and delegating to [`Mesh::simplify`].
    pub fn simplify_to_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&ratio) {
            bail!("ratio must be within [0, 1], got {ratio}");
        }
        let live_faces = self.live_face_count();
        let target = ((live_faces as f64) * ratio).round() as usize;
        self.simplify(target.max(2))
    }

    /// §4.6: reclaim removed elements in place and rewrite every
    /// cross-reference, using an explicit old-index -> new-index table per
    /// array rather than the source's stale-iterator re-dereference trick,
    /// which does not translate to index-addressed storage.
    pub fn compact(&mut self) {
        let vertex_remap = partition_and_remap(&mut self.vertices);
        let edge_remap = partition_and_remap(&mut self.edges);
        let half_edge_remap = partition_and_remap(&mut self.half_edges);
        let face_remap = partition_and_remap(&mut self.faces);

        for v in self.vertices.iter_mut() {
            if v.he != NONE {
                v.he = half_edge_remap[v.he];
            }
        }
        for e in self.edges.iter_mut() {
            e.he = half_edge_remap[e.he];
        }
        for h in self.half_edges.iter_mut() {
            h.vertex = vertex_remap[h.vertex];
            h.edge = edge_remap[h.edge];
            h.flip = half_edge_remap[h.flip];
            h.next = half_edge_remap[h.next];
            if h.face != NONE {
                h.face = face_remap[h.face];
            }
        }
        for f in self.faces.iter_mut() {
            f.he = half_edge_remap[f.he];
        }

        self.reindex();
    }
}

trait Removable {
    fn is_removed(&self) -> bool;
    fn stable_index(&self) -> usize;
    fn set_stable_index(&mut self, i: usize);
}

impl Removable for Vertex {
    fn is_removed(&self) -> bool {
        self.remove
    }
    fn stable_index(&self) -> usize {
        self.index
    }
    fn set_stable_index(&mut self, i: usize) {
        self.index = i;
    }
}

impl Removable for Edge {
    fn is_removed(&self) -> bool {
        self.remove
    }
    fn stable_index(&self) -> usize {
        self.index
    }
    fn set_stable_index(&mut self, i: usize) {
        self.index = i;
    }
}

impl Removable for HalfEdge {
    fn is_removed(&self) -> bool {
        self.remove
    }
    fn stable_index(&self) -> usize {
        self.index
    }
    fn set_stable_index(&mut self, i: usize) {
        self.index = i;
    }
}

impl Removable for Face {
    fn is_removed(&self) -> bool {
        self.remove
    }
    fn stable_index(&self) -> usize {
        self.index
    }
    fn set_stable_index(&mut self, i: usize) {
        self.index = i;
    }
}

/// Swap every removed element to the tail of `items`, truncate them away,
/// and return a table mapping each surviving element's *old* stable index
/// to its *new* position — the mechanism spec.md §4.6 describes for
/// rewriting cross-references after compaction.
fn partition_and_remap<T: Removable>(items: &mut Vec<T>) -> Vec<usize> {
    let n = items.len();
    let mut remap = vec![NONE; n];
    if n == 0 {
        return remap;
    }

    let (mut start, mut end) = (0usize, n - 1);
    while start < end {
        while start < end && !items[start].is_removed() {
            start += 1;
        }
        while start < end && items[end].is_removed() {
            end -= 1;
        }
        if start < end {
            items.swap(start, end);
        }
    }
    let live_len = if items[start].is_removed() { start } else { start + 1 };

    for new_pos in 0..live_len {
        remap[items[new_pos].stable_index()] = new_pos;
    }

    items.truncate(live_len);
    for (new_pos, item) in items.iter_mut().enumerate() {
        item.set_stable_index(new_pos);
    }
    remap
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::relative_eq;

    fn tetrahedron() -> Mesh {
        let positions = vec![
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(-1.0, -1.0, 1.0),
            Point3::new(-1.0, 1.0, -1.0),
            Point3::new(1.0, -1.0, -1.0),
        ];
        let triangles = vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
        Mesh::from_triangle_soup(&positions, &triangles).unwrap()
    }

    fn octahedron() -> Mesh {
        let positions = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let triangles = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        Mesh::from_triangle_soup(&positions, &triangles).unwrap()
    }

    /// A planar quad split into two triangles, its single interior edge
    /// flanked entirely by boundary.
    fn boundary_quad() -> Mesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let triangles = vec![[0, 1, 2], [0, 2, 3]];
        Mesh::from_triangle_soup(&positions, &triangles).unwrap()
    }

    fn assert_invariants(mesh: &Mesh) {
        for h in &mesh.half_edges {
            if h.remove {
                continue;
            }
            let flip = &mesh.half_edges[h.flip];
            assert_eq!(flip.flip, h.index, "flip involution (I1)");
            assert_ne!(h.flip, h.index, "a half-edge is never its own flip");
        }
        for f in &mesh.faces {
            if f.remove {
                continue;
            }
            let he0 = f.he;
            let he1 = mesh.half_edges[he0].next;
            let he2 = mesh.half_edges[he1].next;
            assert_eq!(mesh.half_edges[he2].next, he0, "3-cycle (I2)");
            assert_eq!(mesh.half_edges[he0].face, f.index);
            assert_eq!(mesh.half_edges[he1].face, f.index);
            assert_eq!(mesh.half_edges[he2].face, f.index);
        }
        for v in &mesh.vertices {
            if v.remove || v.is_isolated() {
                continue;
            }
            assert_eq!(mesh.half_edges[v.he].vertex, v.index, "vertex outgoing (I3)");
        }
        for e in &mesh.edges {
            if e.remove {
                continue;
            }
            let he = &mesh.half_edges[e.he];
            assert_eq!(he.edge, e.index);
            assert_eq!(mesh.half_edges[he.flip].edge, e.index, "edge flip pair (I4)");
        }
        for v in &mesh.vertices {
            assert!(
                relative_eq!(v.quadric, v.quadric.transpose(), epsilon = 1e-9),
                "quadric symmetry (I7)"
            );
        }
    }

    fn assert_compacted(mesh: &Mesh) {
        assert!(mesh.vertices.iter().all(|v| !v.remove));
        assert!(mesh.half_edges.iter().all(|h| !h.remove));
        assert!(mesh.edges.iter().all(|e| !e.remove));
        assert!(mesh.faces.iter().all(|f| !f.remove));
        for (i, v) in mesh.vertices.iter().enumerate() {
            assert_eq!(v.index, i);
        }
        for (i, h) in mesh.half_edges.iter().enumerate() {
            assert_eq!(h.index, i);
        }
        for (i, e) in mesh.edges.iter().enumerate() {
            assert_eq!(e.index, i);
        }
        for (i, f) in mesh.faces.iter().enumerate() {
            assert_eq!(f.index, i);
        }
    }

    #[test]
    fn tetrahedron_has_expected_topology() {
        let mesh = tetrahedron();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces.len(), 4);
        assert_eq!(mesh.edges.len(), 6);
        assert_eq!(mesh.half_edges.len(), 12);
        assert!(mesh.half_edges.iter().all(|h| !h.on_boundary));
        assert_invariants(&mesh);
    }

    #[test]
    fn simplify_to_current_face_count_is_a_no_op() {
        let mut mesh = tetrahedron();
        mesh.simplify(4).unwrap();
        assert_eq!(mesh.live_face_count(), 4);
        assert_invariants(&mesh);
        assert_compacted(&mesh);
    }

    #[test]
    fn tetrahedron_cannot_be_simplified_below_four_faces() {
        // Every vertex in a tetrahedron is incident to every other
        // vertex, so the link condition fails for every edge: collapsing
        // any edge would identify the two opposite faces.
        let mut mesh = tetrahedron();
        mesh.simplify(2).unwrap();
        assert_eq!(mesh.live_face_count(), 4);
        assert_invariants(&mesh);
    }

    // Reaching a tetrahedron requires the driver to step over whichever
    // ring edge goes stale mid-loop (see
    // `collapse_invalidates_an_edge_outside_the_merged_one_ring` below)
    // rather than mistaking that stale edge's resurfacing for "no valid
    // collapse remains" (spec §4.5 step 4, §8 scenario 6).
    #[test]
    fn octahedron_simplifies_to_tetrahedron() {
        let mut mesh = octahedron();
        mesh.simplify(4).unwrap();
        assert_eq!(mesh.live_face_count(), 4);
        assert_eq!(mesh.edges.len(), 6);
        assert_eq!(mesh.vertices.len(), 4);
        assert_invariants(&mesh);
        assert_compacted(&mesh);
    }

    #[test]
    fn boundary_quad_simplify_to_zero_is_a_no_op() {
        let mut mesh = boundary_quad();
        let before = mesh.faces.len();
        mesh.simplify(2).unwrap();
        assert_eq!(mesh.live_face_count(), before);
        assert_invariants(&mesh);
    }

    #[test]
    fn simplify_rejects_target_below_two() {
        let mut mesh = tetrahedron();
        assert!(mesh.simplify(1).is_err());
        assert!(mesh.simplify(0).is_err());
        assert_eq!(mesh.live_face_count(), 4);
    }

    #[test]
    fn link_condition_rejects_a_collapse_that_would_duplicate_an_edge() {
        let mesh = tetrahedron();
        // In a tetrahedron every edge fails the link condition: the two
        // apexes opposite any edge are already joined to both endpoints.
        for e in 0..mesh.edges.len() {
            assert!(!mesh.valid_collapse(e));
        }
    }

    fn find_edge(mesh: &Mesh, a: usize, b: usize) -> usize {
        (0..mesh.edges.len())
            .find(|&e| {
                let he = mesh.edges[e].he;
                let flip = mesh.half_edges[he].flip;
                let (x, y) = (mesh.half_edges[he].vertex, mesh.half_edges[flip].vertex);
                (x == a && y == b) || (x == b && y == a)
            })
            .expect("edge not found")
    }

    /// Collapsing ring edge (0,2) of the octahedron merges vertex 2 into
    /// vertex 0. Vertex 2's unique neighbor (1) and vertex 0's unique
    /// neighbor (3) are themselves already joined by ring edge (1,3); once
    /// 0 absorbs 2's neighborhood it becomes a second shared neighbor of 1
    /// and 3 beyond their two original apexes (4, 5), so edge (1,3) fails
    /// the link condition from that point on. (1,3) is incident to neither
    /// 0 nor 2, so the driver's one-ring cost refresh after the collapse
    /// never revisits it — its heap entry keeps the finite cost it had
    /// before the collapse until it next surfaces as the minimum.
    #[test]
    fn collapse_invalidates_an_edge_outside_the_merged_one_ring() {
        let mut mesh = octahedron();
        let e02 = find_edge(&mesh, 0, 2);
        let e13 = find_edge(&mesh, 1, 3);
        assert!(mesh.valid_collapse(e02));
        assert!(mesh.valid_collapse(e13));

        let he = mesh.edges[e02].he;
        let v1 = mesh.half_edges[he].vertex;
        let v2 = mesh.half_edges[mesh.half_edges[he].flip].vertex;
        mesh.vertices[v1].quadric += mesh.vertices[v2].quadric;
        mesh.vertices[v2].remove = true;
        mesh.collapse_edge(e02);

        assert!(
            !mesh.valid_collapse(e13),
            "edge (1,3) must go stale once vertex 0 absorbs vertex 2's neighborhood"
        );
        mesh.compute_edge_cost(e13);
        assert!(
            mesh.edges[e13].cost.is_infinite(),
            "a stale edge's cost must be raised to +inf, not left at its old finite value"
        );
    }

    fn subdivide(mesh: &Mesh) -> Mesh {
        let mut positions: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
        let mut midpoint: AHashMap<(usize, usize), usize> = AHashMap::default();

        let mut triangles = Vec::with_capacity(mesh.faces.len() * 4);
        for f in &mesh.faces {
            let he0 = f.he;
            let he1 = mesh.half_edges[he0].next;
            let he2 = mesh.half_edges[he1].next;
            let a = mesh.half_edges[he0].vertex;
            let b = mesh.half_edges[he1].vertex;
            let c = mesh.half_edges[he2].vertex;

            let mut mid = |a: usize, b: usize, positions: &mut Vec<Point3<f64>>| -> usize {
                let key = (a.min(b), a.max(b));
                *midpoint.entry(key).or_insert_with(|| {
                    let p = Point3::from((positions[a].coords + positions[b].coords) * 0.5);
                    positions.push(p);
                    positions.len() - 1
                })
            };

            let ab = mid(a, b, &mut positions);
            let bc = mid(b, c, &mut positions);
            let ca = mid(c, a, &mut positions);

            triangles.push([a, ab, ca]);
            triangles.push([ab, b, bc]);
            triangles.push([ca, bc, c]);
            triangles.push([ab, bc, ca]);
        }

        Mesh::from_triangle_soup(&positions, &triangles).unwrap()
    }

    fn icosahedron() -> Mesh {
        let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let raw = [
            (-1.0, t, 0.0), (1.0, t, 0.0), (-1.0, -t, 0.0), (1.0, -t, 0.0),
            (0.0, -1.0, t), (0.0, 1.0, t), (0.0, -1.0, -t), (0.0, 1.0, -t),
            (t, 0.0, -1.0), (t, 0.0, 1.0), (-t, 0.0, -1.0), (-t, 0.0, 1.0),
        ];
        let positions: Vec<Point3<f64>> = raw
            .iter()
            .map(|&(x, y, z)| {
                let n = (x * x + y * y + z * z).sqrt();
                Point3::new(x / n, y / n, z / n)
            })
            .collect();
        let triangles = vec![
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];
        Mesh::from_triangle_soup(&positions, &triangles).unwrap()
    }

    #[test]
    fn subdivided_icosahedron_simplifies_to_target_exactly() {
        let mesh = subdivide(&subdivide(&icosahedron()));
        assert_eq!(mesh.vertices.len(), 162);
        assert_eq!(mesh.faces.len(), 320);
        assert_eq!(mesh.edges.len(), 480);

        let mut mesh = mesh;
        mesh.simplify(80).unwrap();

        assert_eq!(mesh.live_face_count(), 80);
        assert_eq!(mesh.edges.len(), 120);
        assert_eq!(mesh.vertices.len(), 42);
        assert_invariants(&mesh);
        assert_compacted(&mesh);
    }

    #[test]
    fn euler_deltas_match_per_collapse() {
        let mesh = subdivide(&icosahedron());
        let (v0, e0, f0, h0) = (
            mesh.vertices.len(),
            mesh.edges.len(),
            mesh.faces.len(),
            mesh.half_edges.len(),
        );

        let mut mesh = mesh;
        let collapses = 10;
        mesh.simplify(f0 - 2 * collapses).unwrap();

        assert_eq!(mesh.live_face_count(), f0 - 2 * collapses);
        assert_eq!(mesh.vertices.len(), v0 - collapses);
        assert_eq!(mesh.edges.len(), e0 - 3 * collapses);
        assert_eq!(mesh.half_edges.len(), h0 - 6 * collapses);
    }

    #[test]
    fn simplify_to_ratio_rejects_out_of_range() {
        let mut mesh = tetrahedron();
        assert!(mesh.simplify_to_ratio(-0.1).is_err());
        assert!(mesh.simplify_to_ratio(1.1).is_err());
    }

    #[test]
    fn simplify_to_ratio_halves_a_subdivided_mesh() {
        let mut mesh = subdivide(&icosahedron());
        let before = mesh.faces.len();
        mesh.simplify_to_ratio(0.5).unwrap();
        assert_eq!(mesh.live_face_count(), before / 2);
    }
}
