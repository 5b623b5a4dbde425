//! Plane-to-quadric construction, quadric accumulation, and the optimal
//! collapse-point solve with its degenerate fallback.

use nalgebra::{Matrix4, Point3, Vector4};

/// Below this determinant magnitude, `quadric_del` is treated as singular
/// and the midpoint/endpoint fallback is used instead of solving for the
/// optimal point.
const DET_EPSILON: f64 = 1e-6;

/// Plane coefficients `(n.x, n.y, n.z, -n.dot(a))` for the plane through
/// triangle `(a, b, c)`, oriented by the triangle's winding. Degenerate
/// (zero-area) triangles yield the zero plane, which contributes a zero
/// quadric rather than being rejected.
pub fn face_plane(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Vector4<f64> {
    let n = (b - a).cross(&(c - a));
    let norm = n.norm();
    if norm < f64::EPSILON {
        return Vector4::zeros();
    }
    let n_hat = n / norm;
    Vector4::new(n_hat.x, n_hat.y, n_hat.z, -n_hat.dot(&a.coords))
}

/// The rank-1 quadric `p * p^T` for a plane's homogeneous coefficients.
pub fn quadric_from_plane(p: &Vector4<f64>) -> Matrix4<f64> {
    p * p.transpose()
}

/// `v^T Q v` for the homogenized point `v = (x, y, z, 1)`.
pub fn error(q: &Matrix4<f64>, p: &Point3<f64>) -> f64 {
    let v = Vector4::new(p.x, p.y, p.z, 1.0);
    (v.transpose() * q * v)[(0, 0)]
}

/// Combine two endpoint quadrics, solve for the optimal collapse point, and
/// fall back to the cheapest of the two endpoints or their midpoint when
/// the combined quadric is singular.
///
/// Returns `(point, cost, combined_quadric)`; cost is clamped to `>= 0`.
pub fn optimal_point(
    q1: &Matrix4<f64>,
    q2: &Matrix4<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
) -> (Point3<f64>, f64, Matrix4<f64>) {
    let combined = q1 + q2;
    // Quadrics are sums of symmetric rank-1 outer products and should stay
    // symmetric; symmetrize to absorb any floating-point drift before the
    // solve rather than guarding and bailing on asymmetry.
    let q = (combined + combined.transpose()) * 0.5;

    let mut q_del = q;
    q_del.set_row(3, &Vector4::new(0.0, 0.0, 0.0, 1.0).transpose());

    if q_del.determinant().abs() > DET_EPSILON {
        if let Some(inv) = q_del.try_inverse() {
            let x = inv * Vector4::new(0.0, 0.0, 0.0, 1.0);
            let point = Point3::new(x.x, x.y, x.z);
            let cost = error(&q, &point).max(0.0);
            return (point, cost, q);
        }
    }

    let midpoint = Point3::from((p1.coords + p2.coords) * 0.5);
    let mut best = *p1;
    let mut best_cost = f64::INFINITY;
    for candidate in [*p1, *p2, midpoint] {
        let cost = error(&q, &candidate).max(0.0);
        if cost < best_cost {
            best_cost = cost;
            best = candidate;
        }
    }
    (best, best_cost, q)
}
