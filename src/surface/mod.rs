pub mod bspline_surface;
pub mod builder;
pub mod control_point_grid;
pub mod surface_record;

pub use bspline_surface::*;
pub use builder::*;
pub use control_point_grid::*;
pub use surface_record::*;

/// The parametric direction of a surface operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UVDirection {
    U,
    V,
}
