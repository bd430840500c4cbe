use itertools::Itertools;
use nalgebra::{allocator::Allocator, DefaultAllocator, DimName};

use crate::{
    curve::bspline_curve::ensure_parameter_in_domain,
    curve::BSplineCurve,
    knot::knot_tolerance,
    misc::FloatingPoint,
    surface::{BSplineSurface, ControlPointGrid, UVDirection},
};

/// Split the object into two objects with the given option
pub trait Split
where
    Self: Sized,
{
    type Option;
    fn try_split(&self, option: Self::Option) -> anyhow::Result<(Self, Self)>;
}

impl<T: FloatingPoint, D: DimName> Split for BSplineCurve<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    type Option = T;

    /// Split the curve into two curves before and after the parameter.
    /// Both halves carry their own knot vector renormalized to [0, 1], so
    /// the split point sits at the end of the left half and the start of
    /// the right one.
    ///
    /// # Example
    /// ```
    /// use splajno::prelude::*;
    /// use nalgebra::Point2;
    ///
    /// let curve = BSplineCurve::try_new(
    ///     2,
    ///     vec![
    ///         Point2::new(0., 0.),
    ///         Point2::new(1., 2.),
    ///         Point2::new(2., 0.),
    ///     ],
    ///     vec![0., 0., 0., 1., 1., 1.],
    /// )
    /// .unwrap();
    /// let (left, right) = curve.try_split(0.5).unwrap();
    /// assert_eq!(left.point_at(1.).unwrap(), Point2::new(1., 1.));
    /// assert_eq!(right.point_at(0.).unwrap(), Point2::new(1., 1.));
    /// ```
    fn try_split(&self, u: T) -> anyhow::Result<(Self, Self)> {
        ensure_parameter_in_domain(u, "u")?;
        anyhow::ensure!(
            u > T::zero() && u < T::one(),
            "Cannot split at the domain boundary {:?}",
            u
        );

        let degree = self.degree();
        let n = self.control_points().len() - 1;
        let span = self.knots().find_knot_span_index(n, degree, u);
        let ks = span - degree + 1;
        let s = self.knots().find_multiplicity(u, knot_tolerance());
        let r = degree.saturating_sub(s);

        let mut refined = self.clone();
        if r > 0 {
            refined.insert_knot_unchecked(u, s, r);
        }

        let refined_n = refined.control_points().len() - 1;
        let split_span = refined.knots().find_knot_span_index(refined_n, degree, u) + 1;

        let mut left_knots = refined.knots().as_slice()[..split_span].to_vec();
        left_knots.push(u);
        let right_knots = (0..=degree)
            .map(|_| u)
            .chain(refined.knots().as_slice()[split_span..].iter().copied())
            .collect_vec();

        let left_points = refined.control_points()[..ks + r].to_vec();
        let right_points = refined.control_points()[ks + r - 1..].to_vec();

        Ok((
            BSplineCurve::try_new(degree, left_points, left_knots)?,
            BSplineCurve::try_new(degree, right_points, right_knots)?,
        ))
    }
}

/// Option for splitting a surface
#[derive(Clone, Debug)]
pub struct SplitSurfaceOption<T: FloatingPoint> {
    // parameter to split
    pub parameter: T,
    // split direction
    pub direction: UVDirection,
}

impl<T: FloatingPoint> SplitSurfaceOption<T> {
    pub fn new(parameter: T, direction: UVDirection) -> Self {
        Self {
            parameter,
            direction,
        }
    }
}

impl<T: FloatingPoint, D: DimName> Split for BSplineSurface<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    type Option = SplitSurfaceOption<T>;

    /// Split the surface into two surfaces before and after the parameter
    /// along the chosen direction. The other direction is carried over
    /// unchanged.
    fn try_split(&self, option: Self::Option) -> anyhow::Result<(Self, Self)> {
        let t = option.parameter;
        ensure_parameter_in_domain(t, "parameter")?;
        anyhow::ensure!(
            t > T::zero() && t < T::one(),
            "Cannot split at the domain boundary {:?}",
            t
        );

        let (degree, knots, count) = match option.direction {
            UVDirection::U => (
                self.u_degree(),
                self.u_knots(),
                self.control_point_grid().size_u(),
            ),
            UVDirection::V => (
                self.v_degree(),
                self.v_knots(),
                self.control_point_grid().size_v(),
            ),
        };
        let span = knots.find_knot_span_index(count - 1, degree, t);
        let ks = span - degree + 1;
        let s = knots.find_multiplicity(t, knot_tolerance());
        let r = degree.saturating_sub(s);

        let mut refined = self.clone();
        if r > 0 {
            refined.insert_knot_unchecked(option.direction, t, s, r);
        }

        let (refined_knots, refined_count) = match option.direction {
            UVDirection::U => (refined.u_knots(), refined.control_point_grid().size_u()),
            UVDirection::V => (refined.v_knots(), refined.control_point_grid().size_v()),
        };
        let split_span = refined_knots.find_knot_span_index(refined_count - 1, degree, t) + 1;

        let mut left_knots = refined_knots.as_slice()[..split_span].to_vec();
        left_knots.push(t);
        let right_knots = (0..=degree)
            .map(|_| t)
            .chain(refined_knots.as_slice()[split_span..].iter().copied())
            .collect_vec();

        let grid = refined.control_point_grid();
        match option.direction {
            UVDirection::U => {
                let left_rows = grid
                    .rows()
                    .take(ks + r)
                    .map(|row| row.to_vec())
                    .collect_vec();
                let right_rows = grid
                    .rows()
                    .skip(ks + r - 1)
                    .map(|row| row.to_vec())
                    .collect_vec();
                Ok((
                    BSplineSurface::try_new(
                        degree,
                        self.v_degree(),
                        ControlPointGrid::try_from_rows(left_rows)?,
                        left_knots,
                        self.v_knots().to_vec(),
                    )?,
                    BSplineSurface::try_new(
                        degree,
                        self.v_degree(),
                        ControlPointGrid::try_from_rows(right_rows)?,
                        right_knots,
                        self.v_knots().to_vec(),
                    )?,
                ))
            }
            UVDirection::V => {
                let left_rows = grid
                    .rows()
                    .map(|row| row[..ks + r].to_vec())
                    .collect_vec();
                let right_rows = grid
                    .rows()
                    .map(|row| row[ks + r - 1..].to_vec())
                    .collect_vec();
                Ok((
                    BSplineSurface::try_new(
                        self.u_degree(),
                        degree,
                        ControlPointGrid::try_from_rows(left_rows)?,
                        self.u_knots().to_vec(),
                        left_knots,
                    )?,
                    BSplineSurface::try_new(
                        self.u_degree(),
                        degree,
                        ControlPointGrid::try_from_rows(right_rows)?,
                        self.u_knots().to_vec(),
                        right_knots,
                    )?,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Point3};

    use crate::curve::BSplineCurve2D;
    use crate::surface::BSplineSurface3D;

    fn bilinear_patch() -> BSplineSurface3D<f64> {
        let grid = ControlPointGrid::try_from_rows(vec![
            vec![Point3::new(0., 0., 0.), Point3::new(0., 1., 0.)],
            vec![Point3::new(1., 0., 0.), Point3::new(1., 1., 2.)],
        ])
        .unwrap();
        BSplineSurface::try_new(1, 1, grid, vec![0., 0., 1., 1.], vec![0., 0., 1., 1.]).unwrap()
    }

    #[test]
    fn split_bezier_exactly_at_midpoint() {
        let curve = BSplineCurve2D::try_new(
            2,
            vec![Point2::new(0., 0.), Point2::new(1., 2.), Point2::new(2., 0.)],
            vec![0., 0., 0., 1., 1., 1.],
        )
        .unwrap();
        let (left, right) = curve.try_split(0.5).unwrap();

        assert_eq!(
            left.control_points(),
            &[Point2::new(0., 0.), Point2::new(0.5, 1.), Point2::new(1., 1.)]
        );
        assert_eq!(
            right.control_points(),
            &[Point2::new(1., 1.), Point2::new(1.5, 1.), Point2::new(2., 0.)]
        );
        assert_eq!(left.knots().to_vec(), vec![0., 0., 0., 1., 1., 1.]);
        assert_eq!(right.knots().to_vec(), vec![0., 0., 0., 1., 1., 1.]);
    }

    #[test]
    fn split_rejects_boundary_parameters() {
        let curve = BSplineCurve2D::try_new(
            1,
            vec![Point2::new(0., 0.), Point2::new(1., 0.)],
            vec![0., 0., 1., 1.],
        )
        .unwrap();
        assert!(curve.try_split(0.).is_err());
        assert!(curve.try_split(1.).is_err());
        assert!(curve.try_split(-0.5).is_err());
        assert!(curve.try_split(1.5).is_err());
    }

    #[test]
    fn split_halves_join_continuously() {
        let curve = BSplineCurve2D::try_new(
            3,
            vec![
                Point2::new(0., 0.),
                Point2::new(1., 2.),
                Point2::new(2., -1.),
                Point2::new(3., 1.5),
                Point2::new(4., -0.5),
                Point2::new(5., 0.),
            ],
            vec![0., 0., 0., 0., 0.4, 0.7, 1., 1., 1., 1.],
        )
        .unwrap();

        let at = 0.37;
        let (left, right) = curve.try_split(at).unwrap();
        let junction = curve.point_at(at).unwrap();
        assert_relative_eq!(left.point_at(1.).unwrap(), junction, epsilon = 1e-8);
        assert_relative_eq!(right.point_at(0.).unwrap(), junction, epsilon = 1e-8);

        // halves reparameterize their shares of the original domain onto [0, 1]
        assert_relative_eq!(
            left.point_at(0.5).unwrap(),
            curve.point_at(at * 0.5).unwrap(),
            epsilon = 1e-8
        );
        assert_relative_eq!(
            right.point_at(0.5).unwrap(),
            curve.point_at(at + (1. - at) * 0.5).unwrap(),
            epsilon = 1e-8
        );
    }

    #[test]
    fn split_at_an_existing_knot() {
        let curve = BSplineCurve2D::try_new(
            2,
            vec![
                Point2::new(0., 0.),
                Point2::new(1., 1.),
                Point2::new(2., 1.),
                Point2::new(3., 0.),
            ],
            vec![0., 0., 0., 0.5, 1., 1., 1.],
        )
        .unwrap();
        let (left, right) = curve.try_split(0.5).unwrap();
        assert_eq!(left.control_points().len(), 3);
        assert_eq!(right.control_points().len(), 3);
        let junction = curve.point_at(0.5).unwrap();
        assert_relative_eq!(left.point_at(1.).unwrap(), junction, epsilon = 1e-10);
        assert_relative_eq!(right.point_at(0.).unwrap(), junction, epsilon = 1e-10);
    }

    #[test]
    fn split_surface_along_u() {
        let surface = bilinear_patch();
        let (left, right) = surface
            .try_split(SplitSurfaceOption::new(0.5, UVDirection::U))
            .unwrap();

        assert_eq!(left.control_point_grid().size_u(), 2);
        assert_eq!(right.control_point_grid().size_u(), 2);
        assert_eq!(left.control_point_grid().size_v(), 2);

        for v in [0., 0.25, 0.5, 1.] {
            let junction = surface.point_at(0.5, v).unwrap();
            assert_relative_eq!(left.point_at(1., v).unwrap(), junction, epsilon = 1e-10);
            assert_relative_eq!(right.point_at(0., v).unwrap(), junction, epsilon = 1e-10);
        }
    }

    #[test]
    fn split_surface_along_v_at_an_existing_knot() {
        let heights = [
            [0., 0., 0., 0.],
            [0., 1., 2., 0.],
            [0., 2., 1., 0.],
            [0., 0., 0., 0.],
        ];
        let rows = (0..4)
            .map(|i| {
                (0..4)
                    .map(|j| Point3::new(i as f64, j as f64, heights[i][j]))
                    .collect()
            })
            .collect();
        let grid = ControlPointGrid::try_from_rows(rows).unwrap();
        let surface = BSplineSurface::try_new(
            2,
            2,
            grid,
            vec![0., 0., 0., 0.5, 1., 1., 1.],
            vec![0., 0., 0., 0.5, 1., 1., 1.],
        )
        .unwrap();

        let (front, back) = surface
            .try_split(SplitSurfaceOption::new(0.5, UVDirection::V))
            .unwrap();
        assert_eq!(front.control_point_grid().size_v(), 3);
        assert_eq!(back.control_point_grid().size_v(), 3);
        assert_eq!(front.control_point_grid().size_u(), 4);

        for u in [0., 0.3, 0.72, 1.] {
            let junction = surface.point_at(u, 0.5).unwrap();
            assert_relative_eq!(front.point_at(u, 1.).unwrap(), junction, epsilon = 1e-8);
            assert_relative_eq!(back.point_at(u, 0.).unwrap(), junction, epsilon = 1e-8);
        }
    }

    #[test]
    fn split_surface_rejects_boundary_parameters() {
        let surface = bilinear_patch();
        assert!(surface
            .try_split(SplitSurfaceOption::new(0., UVDirection::U))
            .is_err());
        assert!(surface
            .try_split(SplitSurfaceOption::new(1., UVDirection::V))
            .is_err());
    }
}
