use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName};

use crate::knot::KnotVector;
use crate::misc::FloatingPoint;

use super::{BSplineSurface, ControlPointGrid};

/// Staged constructor for [`BSplineSurface`]. Degrees come first, then the
/// control net, then the knot vectors; each stage validates against what is
/// already in place, so no partially formed surface can escape.
#[derive(Clone, Copy, Debug, Default)]
pub struct SurfaceBuilder;

/// Builder stage holding validated degrees.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceBuilderWithDegrees {
    u_degree: usize,
    v_degree: usize,
}

/// Builder stage holding validated degrees and a control net.
#[derive(Clone, Debug)]
pub struct SurfaceBuilderWithControlPoints<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    u_degree: usize,
    v_degree: usize,
    control_points: ControlPointGrid<T, D>,
}

impl SurfaceBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Accept the degrees of both parametric directions.
    /// # Failures
    /// - if either degree is zero
    pub fn degrees(
        self,
        u_degree: usize,
        v_degree: usize,
    ) -> anyhow::Result<SurfaceBuilderWithDegrees> {
        anyhow::ensure!(
            u_degree >= 1 && v_degree >= 1,
            "Degrees must be at least 1, got {} x {}",
            u_degree,
            v_degree
        );
        Ok(SurfaceBuilderWithDegrees { u_degree, v_degree })
    }
}

impl SurfaceBuilderWithDegrees {
    /// Accept the control net.
    /// # Failures
    /// - if a direction has fewer than `degree + 1` control points
    pub fn control_points<T: FloatingPoint, D: DimName>(
        self,
        control_points: ControlPointGrid<T, D>,
    ) -> anyhow::Result<SurfaceBuilderWithControlPoints<T, D>>
    where
        DefaultAllocator: Allocator<D>,
    {
        anyhow::ensure!(
            control_points.size_u() > self.u_degree,
            "A degree {} direction needs at least {} control points, got {}",
            self.u_degree,
            self.u_degree + 1,
            control_points.size_u()
        );
        anyhow::ensure!(
            control_points.size_v() > self.v_degree,
            "A degree {} direction needs at least {} control points, got {}",
            self.v_degree,
            self.v_degree + 1,
            control_points.size_v()
        );
        Ok(SurfaceBuilderWithControlPoints {
            u_degree: self.u_degree,
            v_degree: self.v_degree,
            control_points,
        })
    }

    pub fn degrees(&self) -> (usize, usize) {
        (self.u_degree, self.v_degree)
    }
}

impl<T: FloatingPoint, D: DimName> SurfaceBuilderWithControlPoints<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    /// Accept both knot vectors and finish the surface. The candidates are
    /// normalized to [0, 1] and validated against their direction before
    /// anything is stored.
    pub fn knot_vectors(
        self,
        u_knots: Vec<T>,
        v_knots: Vec<T>,
    ) -> anyhow::Result<BSplineSurface<T, D>> {
        let u_knots = KnotVector::new(u_knots).normalize()?;
        u_knots.validate(self.u_degree, self.control_points.size_u())?;
        let v_knots = KnotVector::new(v_knots).normalize()?;
        v_knots.validate(self.v_degree, self.control_points.size_v())?;
        Ok(BSplineSurface::from_parts(
            self.u_degree,
            self.v_degree,
            self.control_points,
            u_knots,
            v_knots,
        ))
    }

    pub fn degrees(&self) -> (usize, usize) {
        (self.u_degree, self.v_degree)
    }

    pub fn control_points(&self) -> &ControlPointGrid<T, D> {
        &self.control_points
    }
}
