use nalgebra::{allocator::Allocator, DefaultAllocator, DimName};

use crate::{
    misc::FloatingPoint,
    prelude::Decompose,
    split::{Split, SplitSurfaceOption},
    surface::{BSplineSurface, UVDirection},
};

impl<T: FloatingPoint, D: DimName> Decompose for BSplineSurface<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    type Output = Vec<Vec<BSplineSurface<T, D>>>;

    /// Decompose the surface into a set of Bezier patches of the same degrees.
    /// The surface is first cut into strips along u, then each strip is cut
    /// along v. The outer vector follows u, the inner vectors follow v.
    fn try_decompose(&self) -> anyhow::Result<Self::Output> {
        let mut strips = vec![];
        let mut rest = self.clone();
        while let Some(knot) = rest.u_knots().first_interior_knot(rest.u_degree()) {
            let (head, tail) = rest.try_split(SplitSurfaceOption::new(knot, UVDirection::U))?;
            strips.push(head);
            rest = tail;
        }
        strips.push(rest);

        strips
            .into_iter()
            .map(|strip| {
                let mut patches = vec![];
                let mut rest = strip;
                while let Some(knot) = rest.v_knots().first_interior_knot(rest.v_degree()) {
                    let (head, tail) =
                        rest.try_split(SplitSurfaceOption::new(knot, UVDirection::V))?;
                    patches.push(head);
                    rest = tail;
                }
                patches.push(rest);
                Ok(patches)
            })
            .collect()
    }
}
