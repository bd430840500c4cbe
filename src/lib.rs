#![allow(clippy::needless_range_loop)]

mod curve;
mod decompose;
mod knot;
mod misc;
mod refine;
mod split;
mod surface;

pub mod prelude {
    pub use crate::curve::*;
    pub use crate::decompose::*;
    pub use crate::knot::*;
    pub use crate::misc::*;
    pub use crate::refine::*;
    pub use crate::split::*;
    pub use crate::surface::*;
}
