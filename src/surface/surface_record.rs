/// Flat persistence form of a B-spline surface.
///
/// The control net is stored as coordinate rows in the same flat order the
/// surface uses internally, v varying fastest, with the grid sizes carried
/// alongside. Records with the `rational` flag set are rejected at load time.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceRecord<T> {
    pub rational: bool,
    pub u_degree: usize,
    pub v_degree: usize,
    pub u_knot_vector: Vec<T>,
    pub v_knot_vector: Vec<T>,
    pub size_u: usize,
    pub size_v: usize,
    pub control_points: Vec<Vec<T>>,
    pub dimension: usize,
}
