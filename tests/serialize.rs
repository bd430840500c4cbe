#![cfg(feature = "serde")]

use nalgebra::{Const, Point2, Point3};
use splajno::prelude::*;

#[test]
fn curve_record_round_trips_through_json() {
    let curve = BSplineCurve2D::try_new(
        2,
        vec![Point2::new(0., 0.), Point2::new(1., 2.), Point2::new(2., 0.)],
        vec![0., 0., 0., 1., 1., 1.],
    )
    .unwrap();
    let record = curve.to_record();

    let json = serde_json::to_string_pretty(&record).unwrap();
    let parsed: CurveRecord<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);

    let restored = BSplineCurve2D::try_from_record(parsed).unwrap();
    assert_eq!(restored.control_points(), curve.control_points());
    assert_eq!(restored.knots().to_vec(), curve.knots().to_vec());
}

#[test]
fn surface_record_round_trips_through_json() {
    let grid = ControlPointGrid::try_from_rows(vec![
        vec![Point3::new(0., 0., 0.), Point3::new(0., 1., 0.)],
        vec![Point3::new(1., 0., 0.), Point3::new(1., 1., 2.)],
    ])
    .unwrap();
    let surface =
        BSplineSurface::try_new(1, 1, grid, vec![0., 0., 1., 1.], vec![0., 0., 1., 1.]).unwrap();
    let record = surface.to_record();

    let json = serde_json::to_string_pretty(&record).unwrap();
    let parsed: SurfaceRecord<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);

    let restored = BSplineSurface3D::try_from_record(parsed).unwrap();
    assert_eq!(restored.control_point_grid(), surface.control_point_grid());
}

#[test]
fn control_point_grid_round_trips_through_json() {
    let grid = ControlPointGrid::try_from_rows(vec![
        vec![Point3::new(0., 0., 0.), Point3::new(0., 1., 0.)],
        vec![Point3::new(1., 0., 0.), Point3::new(1., 1., 2.)],
    ])
    .unwrap();

    let json = serde_json::to_string(&grid).unwrap();
    let parsed: ControlPointGrid<f64, Const<3>> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, grid);
    assert_eq!(parsed.size_u(), 2);
    assert_eq!(parsed.size_v(), 2);
}

#[test]
fn knot_vector_round_trips_through_json() {
    let knots = KnotVector::new(vec![0., 0., 0., 0.5, 1., 1., 1.]);
    let json = serde_json::to_string(&knots).unwrap();
    let parsed: KnotVector<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, knots);
}
