use nalgebra::{allocator::Allocator, DefaultAllocator, DimName};

use crate::{curve::BSplineCurve, misc::FloatingPoint, prelude::Decompose, split::Split};

impl<T: FloatingPoint, D: DimName> Decompose for BSplineCurve<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    type Output = Vec<BSplineCurve<T, D>>;

    /// Decompose the curve into a set of Bezier segments of the same degree
    /// by splitting at the first interior knot until none remains.
    /// Each segment is reparameterized onto [0, 1].
    fn try_decompose(&self) -> anyhow::Result<Self::Output> {
        let mut segments = vec![];
        let mut rest = self.clone();
        while let Some(knot) = rest.knots().first_interior_knot(rest.degree()) {
            let (head, tail) = rest.try_split(knot)?;
            segments.push(head);
            rest = tail;
        }
        segments.push(rest);
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    use crate::curve::BSplineCurve2D;

    #[test]
    fn decompose_into_bezier_segments() {
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

        let segments = curve.try_decompose().unwrap();
        assert_eq!(segments.len(), 3);

        for segment in segments.iter() {
            assert_eq!(segment.degree(), 3);
            assert_eq!(segment.control_points().len(), 4);
            assert_eq!(segment.knots().len(), 8);
            assert!(segment.is_clamped());
            assert_eq!(segment.knots().first_interior_knot(3), None);
        }

        // each segment covers its share of the original domain
        let breaks = [0., 0.4, 0.7, 1.];
        for (i, segment) in segments.iter().enumerate() {
            let (start, end) = (breaks[i], breaks[i + 1]);
            for local in [0., 0.25, 0.5, 0.75, 1.] {
                let global = start + (end - start) * local;
                assert_relative_eq!(
                    segment.point_at(local).unwrap(),
                    curve.point_at(global).unwrap(),
                    epsilon = 1e-8
                );
            }
        }
    }

    #[test]
    fn already_bezier_curve_yields_a_single_segment() {
        let curve = BSplineCurve2D::try_new(
            2,
            vec![Point2::new(0., 0.), Point2::new(1., 2.), Point2::new(2., 0.)],
            vec![0., 0., 0., 1., 1., 1.],
        )
        .unwrap();
        let segments = curve.try_decompose().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].control_points(), curve.control_points());
    }

    #[test]
    fn repeated_interior_knots_still_terminate() {
        let curve = BSplineCurve2D::try_new(
            2,
            vec![
                Point2::new(0., 0.),
                Point2::new(1., 1.),
                Point2::new(2., 1.),
                Point2::new(3., 0.),
                Point2::new(4., -1.),
            ],
            vec![0., 0., 0., 0.5, 0.5, 1., 1., 1.],
        )
        .unwrap();
        let segments = curve.try_decompose().unwrap();
        assert_eq!(segments.len(), 2);
        let junction = curve.point_at(0.5).unwrap();
        assert_relative_eq!(segments[0].point_at(1.).unwrap(), junction, epsilon = 1e-10);
        assert_relative_eq!(segments[1].point_at(0.).unwrap(), junction, epsilon = 1e-10);
    }
}
