/// Flat persistence form of a B-spline curve.
///
/// Geometry is stored as plain coordinate rows rather than typed points so
/// records can round-trip through serde without committing to a dimension at
/// the type level. `rational` is carried for compatibility with exchange
/// formats that store weighted geometry; records with it set are rejected at
/// load time.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveRecord<T> {
    pub rational: bool,
    pub degree: usize,
    pub knot_vector: Vec<T>,
    pub control_points: Vec<Vec<T>>,
    pub dimension: usize,
}
