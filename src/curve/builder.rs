use nalgebra::{allocator::Allocator, DefaultAllocator, DimName, OPoint};

use crate::knot::KnotVector;
use crate::misc::FloatingPoint;

use super::BSplineCurve;

/// Staged curve constructor.
///
/// A curve only becomes usable once degree, control points and knot vector
/// have been supplied in that order, with each step validated against the
/// previous ones. The stages are separate types, so an out-of-order call
/// does not compile and a validated curve cannot exist in a half-built
/// state.
///
/// # Example
/// ```
/// use splajno::prelude::*;
/// use nalgebra::Point2;
///
/// let curve = CurveBuilder::new()
///     .degree(2)
///     .and_then(|b| {
///         b.control_points(vec![
///             Point2::new(0., 0.),
///             Point2::new(1., 2.),
///             Point2::new(2., 0.),
///         ])
///     })
///     .and_then(|b| b.knot_vector(vec![0., 0., 0., 1., 1., 1.]))
///     .unwrap();
/// assert_eq!(curve.degree(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CurveBuilder;

/// Builder stage with a validated degree.
#[derive(Clone, Debug)]
pub struct CurveBuilderWithDegree {
    degree: usize,
}

/// Builder stage with a validated degree and control points.
#[derive(Clone, Debug)]
pub struct CurveBuilderWithControlPoints<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    degree: usize,
    control_points: Vec<OPoint<T, D>>,
}

impl CurveBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn degree(self, degree: usize) -> anyhow::Result<CurveBuilderWithDegree> {
        anyhow::ensure!(degree >= 1, "Degree must be at least 1, got {}", degree);
        Ok(CurveBuilderWithDegree { degree })
    }
}

impl CurveBuilderWithDegree {
    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn control_points<T: FloatingPoint, D: DimName>(
        self,
        control_points: Vec<OPoint<T, D>>,
    ) -> anyhow::Result<CurveBuilderWithControlPoints<T, D>>
    where
        DefaultAllocator: Allocator<D>,
    {
        anyhow::ensure!(
            control_points.len() > self.degree,
            "Too few control points for a degree {} curve: got {}, need at least {}",
            self.degree,
            control_points.len(),
            self.degree + 1
        );
        Ok(CurveBuilderWithControlPoints {
            degree: self.degree,
            control_points,
        })
    }
}

impl<T: FloatingPoint, D: DimName> CurveBuilderWithControlPoints<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn control_points(&self) -> &[OPoint<T, D>] {
        &self.control_points
    }

    /// Finish the curve. The knot vector is normalized onto [0, 1] and then
    /// checked against the degree and control point count; a sequence that
    /// is not non-decreasing is rejected rather than repaired.
    pub fn knot_vector(self, knots: Vec<T>) -> anyhow::Result<BSplineCurve<T, D>> {
        let knots = KnotVector::new(knots).normalize()?;
        knots.validate(self.degree, self.control_points.len())?;
        Ok(BSplineCurve::from_parts(
            self.degree,
            self.control_points,
            knots,
        ))
    }
}
