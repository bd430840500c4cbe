use nalgebra::RealField;

pub mod knot_multiplicity;
pub mod knot_vector;
pub use knot_multiplicity::*;
pub use knot_vector::*;

/// Tolerance used when comparing knot values for multiplicity counting.
/// Normalization and repeated insertion accumulate rounding error, so knots
/// are never compared by exact equality.
pub fn knot_tolerance<T: RealField>() -> T {
    T::from_f64(1e-7).unwrap()
}
