pub mod bspline_curve;
pub mod builder;
pub mod curve_record;

pub use bspline_curve::*;
pub use builder::*;
pub use curve_record::*;
