use nalgebra::allocator::Allocator;
use nalgebra::{Const, DefaultAllocator, DimName, OPoint, OVector};
use simba::scalar::SupersetOf;

use crate::curve::bspline_curve::ensure_parameter_in_domain;
use crate::knot::{knot_tolerance, KnotVector};
use crate::misc::FloatingPoint;
use crate::refine::{knot_insertion_knots, knot_insertion_line, local_window_start, KnotInsertion};

use super::{
    ControlPointGrid, SurfaceBuilder, SurfaceBuilderWithControlPoints, SurfaceBuilderWithDegrees,
    SurfaceRecord, UVDirection,
};

/// Clamped B-spline surface representation
/// The control net is rectangular and each parametric direction carries its
/// own degree and knot vector
#[derive(Clone, Debug)]
pub struct BSplineSurface<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    control_points: ControlPointGrid<T, D>,
    u_degree: usize,
    v_degree: usize,
    u_knots: KnotVector<T>,
    v_knots: KnotVector<T>,
    cache: Option<SurfaceEvalCache<T, D>>,
}

/// 2D B-spline surface alias
pub type BSplineSurface2D<T> = BSplineSurface<T, Const<2>>;

/// 3D B-spline surface alias
pub type BSplineSurface3D<T> = BSplineSurface<T, Const<3>>;

#[derive(Clone, Copy, Debug)]
struct SurfaceSampleRequest<T> {
    u_start: T,
    u_end: T,
    v_start: T,
    v_end: T,
    u_samples: usize,
    v_samples: usize,
}

#[derive(Clone, Debug)]
struct SurfaceEvalCache<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    request: SurfaceSampleRequest<T>,
    points: Vec<OPoint<T, D>>,
}

impl<T: FloatingPoint, D: DimName> BSplineSurface<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    /// Create a new B-spline surface
    /// # Failures
    /// - if either degree is zero
    /// - if a direction has fewer than `degree + 1` control points
    /// - if a knot vector fails validation against its direction
    ///
    /// # Example
    /// ```
    /// use splajno::prelude::*;
    /// use nalgebra::Point3;
    ///
    /// let grid = ControlPointGrid::try_from_rows(vec![
    ///     vec![Point3::new(0., 0., 0.), Point3::new(0., 1., 0.)],
    ///     vec![Point3::new(1., 0., 0.), Point3::new(1., 1., 2.)],
    /// ])
    /// .unwrap();
    /// let surface = BSplineSurface::try_new(
    ///     1,
    ///     1,
    ///     grid,
    ///     vec![0., 0., 1., 1.],
    ///     vec![0., 0., 1., 1.],
    /// )
    /// .unwrap();
    /// assert_eq!(surface.point_at(0., 1.).unwrap(), Point3::new(0., 1., 0.));
    /// ```
    pub fn try_new(
        u_degree: usize,
        v_degree: usize,
        control_points: ControlPointGrid<T, D>,
        u_knots: Vec<T>,
        v_knots: Vec<T>,
    ) -> anyhow::Result<Self> {
        SurfaceBuilder::new()
            .degrees(u_degree, v_degree)?
            .control_points(control_points)?
            .knot_vectors(u_knots, v_knots)
    }

    pub(crate) fn from_parts(
        u_degree: usize,
        v_degree: usize,
        control_points: ControlPointGrid<T, D>,
        u_knots: KnotVector<T>,
        v_knots: KnotVector<T>,
    ) -> Self {
        Self {
            control_points,
            u_degree,
            v_degree,
            u_knots,
            v_knots,
            cache: None,
        }
    }

    /// Rebuild the surface from a persistence record, re-running every
    /// construction check.
    pub fn try_from_record(record: SurfaceRecord<T>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !record.rational,
            "Surface types are not compatible: rational record cannot initialize a B-spline surface"
        );
        anyhow::ensure!(
            record.dimension == D::dim(),
            "Dimension mismatch: record holds {}-dimensional points, expected {}",
            record.dimension,
            D::dim()
        );
        let points = record
            .control_points
            .iter()
            .map(|coords| {
                anyhow::ensure!(
                    coords.len() == D::dim(),
                    "Control point has {} coordinates, expected {}",
                    coords.len(),
                    D::dim()
                );
                Ok(OPoint::from_slice(coords))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let grid = ControlPointGrid::try_new(record.size_u, record.size_v, points)?;
        Self::try_new(
            record.u_degree,
            record.v_degree,
            grid,
            record.u_knot_vector,
            record.v_knot_vector,
        )
    }

    /// Export the surface as a persistence record.
    pub fn to_record(&self) -> SurfaceRecord<T> {
        SurfaceRecord {
            rational: false,
            u_degree: self.u_degree,
            v_degree: self.v_degree,
            u_knot_vector: self.u_knots.to_vec(),
            v_knot_vector: self.v_knots.to_vec(),
            size_u: self.control_points.size_u(),
            size_v: self.control_points.size_v(),
            control_points: self
                .control_points
                .iter()
                .map(|p| p.coords.as_slice().to_vec())
                .collect(),
            dimension: D::dim(),
        }
    }

    /// Start rebuilding from new degrees, discarding everything bound to the
    /// old ones.
    pub fn set_degrees(
        self,
        u_degree: usize,
        v_degree: usize,
    ) -> anyhow::Result<SurfaceBuilderWithDegrees> {
        SurfaceBuilder::new().degrees(u_degree, v_degree)
    }

    /// Replace the control net, keeping the degrees. The knot vectors must be
    /// re-supplied since the old ones may no longer match the net.
    pub fn set_control_points(
        self,
        control_points: ControlPointGrid<T, D>,
    ) -> anyhow::Result<SurfaceBuilderWithControlPoints<T, D>> {
        SurfaceBuilder::new()
            .degrees(self.u_degree, self.v_degree)?
            .control_points(control_points)
    }

    /// Replace one knot vector in place. The candidate is normalized and
    /// validated against its direction first; on failure the surface is left
    /// untouched. Success drops the evaluation cache.
    pub fn set_knot_vector(&mut self, direction: UVDirection, knots: Vec<T>) -> anyhow::Result<()> {
        let knots = KnotVector::new(knots).normalize()?;
        match direction {
            UVDirection::U => {
                knots.validate(self.u_degree, self.control_points.size_u())?;
                self.u_knots = knots;
            }
            UVDirection::V => {
                knots.validate(self.v_degree, self.control_points.size_v())?;
                self.v_knots = knots;
            }
        }
        self.cache = None;
        Ok(())
    }

    /// Evaluate the surface at the given uv parameters to get a point
    pub fn point_at(&self, u: T, v: T) -> anyhow::Result<OPoint<T, D>> {
        ensure_parameter_in_domain(u, "u")?;
        ensure_parameter_in_domain(v, "v")?;
        Ok(self.point(u, v))
    }

    fn point(&self, u: T, v: T) -> OPoint<T, D> {
        let nu = self.control_points.size_u() - 1;
        let nv = self.control_points.size_v() - 1;
        let span_u = self.u_knots.find_knot_span_index(nu, self.u_degree, u);
        let span_v = self.v_knots.find_knot_span_index(nv, self.v_degree, v);
        let basis_u = self.u_knots.basis_functions(span_u, u, self.u_degree);
        let basis_v = self.v_knots.basis_functions(span_v, v, self.v_degree);
        self.point_given_bases((span_u, span_v), (&basis_u, &basis_v))
    }

    /// Contract the control net with precomputed basis functions, first along
    /// u into a temporary column and then along v.
    fn point_given_bases(&self, spans: (usize, usize), bases: (&[T], &[T])) -> OPoint<T, D> {
        let u_start = local_window_start(spans.0, self.u_degree);
        let v_start = local_window_start(spans.1, self.v_degree);
        let mut position = OPoint::<T, D>::origin();
        for l in 0..=self.v_degree {
            let mut temp = OVector::<T, D>::zeros();
            for k in 0..=self.u_degree {
                temp += &self.control_points[(u_start + k, v_start + l)].coords * bases.0[k];
            }
            position.coords += temp * bases.1[l];
        }
        position
    }

    /// Sample a regular grid of points across both parametric ranges without
    /// touching the evaluation cache. The outer vector follows u.
    pub fn sample_regular_grid(
        &self,
        u_range: (T, T),
        v_range: (T, T),
        samples: (usize, usize),
    ) -> anyhow::Result<Vec<Vec<OPoint<T, D>>>> {
        let request = Self::validated_request(u_range, v_range, samples)?;
        let flat = self.sample_grid(&request);
        Ok(flat.chunks(samples.1).map(|chunk| chunk.to_vec()).collect())
    }

    /// Evaluate a rectangle of the surface and keep the points in the
    /// evaluation cache, flat with the v samples varying fastest. The request
    /// is remembered so knot insertion can replay it.
    pub fn evaluate_range(
        &mut self,
        u_range: (T, T),
        v_range: (T, T),
        samples: (usize, usize),
    ) -> anyhow::Result<()> {
        let request = Self::validated_request(u_range, v_range, samples)?;
        let points = self.sample_grid(&request);
        self.cache = Some(SurfaceEvalCache { request, points });
        Ok(())
    }

    /// Evaluate the whole domain into the evaluation cache.
    pub fn evaluate(&mut self, samples: (usize, usize)) -> anyhow::Result<()> {
        self.evaluate_range((T::zero(), T::one()), (T::zero(), T::one()), samples)
    }

    /// Points from the last `evaluate_range` call, empty if the surface has
    /// not been evaluated or a mutation dropped the cache.
    pub fn evaluated_points(&self) -> &[OPoint<T, D>] {
        self.cache
            .as_ref()
            .map(|cache| cache.points.as_slice())
            .unwrap_or(&[])
    }

    fn validated_request(
        u_range: (T, T),
        v_range: (T, T),
        samples: (usize, usize),
    ) -> anyhow::Result<SurfaceSampleRequest<T>> {
        ensure_parameter_in_domain(u_range.0, "u start")?;
        ensure_parameter_in_domain(u_range.1, "u end")?;
        ensure_parameter_in_domain(v_range.0, "v start")?;
        ensure_parameter_in_domain(v_range.1, "v end")?;
        anyhow::ensure!(
            samples.0 >= 2 && samples.1 >= 2,
            "At least two samples are required per direction, got {} x {}",
            samples.0,
            samples.1
        );
        Ok(SurfaceSampleRequest {
            u_start: u_range.0,
            u_end: u_range.1,
            v_start: v_range.0,
            v_end: v_range.1,
            u_samples: samples.0,
            v_samples: samples.1,
        })
    }

    /// Basis functions are precomputed once per axis, so a full grid costs
    /// samples_u + samples_v basis evaluations rather than their product.
    fn sample_grid(&self, request: &SurfaceSampleRequest<T>) -> Vec<OPoint<T, D>> {
        let (u_spans, u_bases) = self.u_knots.regularly_spaced_basis_functions(
            self.u_degree,
            request.u_start,
            request.u_end,
            request.u_samples,
        );
        let (v_spans, v_bases) = self.v_knots.regularly_spaced_basis_functions(
            self.v_degree,
            request.v_start,
            request.v_end,
            request.v_samples,
        );
        let mut points = Vec::with_capacity(request.u_samples * request.v_samples);
        for (u_span, u_basis) in u_spans.iter().zip(u_bases.iter()) {
            for (v_span, v_basis) in v_spans.iter().zip(v_bases.iter()) {
                points.push(self.point_given_bases((*u_span, *v_span), (u_basis, v_basis)));
            }
        }
        points
    }

    /// Evaluate derivatives at the given uv parameters up to the given order
    /// in each direction combined.
    /// `result[k][l]` holds the derivative differentiated k times along u and
    /// l times along v; the [0][0] entry is the surface point. The table is
    /// truncated to `min(order, u_degree) + 1` rows of `min(order, v_degree)
    /// + 1` entries, and entries with `k + l > order` stay zero.
    pub fn derivatives(&self, u: T, v: T, order: usize) -> anyhow::Result<Vec<Vec<OVector<T, D>>>> {
        ensure_parameter_in_domain(u, "u")?;
        ensure_parameter_in_domain(v, "v")?;

        let du = order.min(self.u_degree);
        let dv = order.min(self.v_degree);
        let mut derivatives = vec![vec![OVector::<T, D>::zeros(); dv + 1]; du + 1];

        let nu = self.control_points.size_u() - 1;
        let nv = self.control_points.size_v() - 1;
        let span_u = self.u_knots.find_knot_span_index(nu, self.u_degree, u);
        let span_v = self.v_knots.find_knot_span_index(nv, self.v_degree, v);
        let ders_u = self
            .u_knots
            .derivative_basis_functions(span_u, u, self.u_degree, du);
        let ders_v = self
            .v_knots
            .derivative_basis_functions(span_v, v, self.v_degree, dv);
        let u_start = local_window_start(span_u, self.u_degree);
        let v_start = local_window_start(span_v, self.v_degree);

        for k in 0..=du {
            let mut temp = vec![OVector::<T, D>::zeros(); self.v_degree + 1];
            for s in 0..=self.v_degree {
                for r in 0..=self.u_degree {
                    temp[s] +=
                        &self.control_points[(u_start + r, v_start + s)].coords * ders_u[k][r];
                }
            }
            let dd = (order - k).min(dv);
            for l in 0..=dd {
                for s in 0..=self.v_degree {
                    derivatives[k][l] += &temp[s] * ders_v[l][s];
                }
            }
        }

        Ok(derivatives)
    }

    /// Evaluate the surface at the given uv parameters to get the pair of
    /// first partial derivatives along u and v.
    pub fn tangent_at(
        &self,
        u: T,
        v: T,
        normalize: bool,
    ) -> anyhow::Result<(OVector<T, D>, OVector<T, D>)> {
        let derivatives = self.derivatives(u, v, 1)?;
        let tangent_u = derivatives[1][0].clone();
        let tangent_v = derivatives[0][1].clone();
        Ok(if normalize {
            (tangent_u.normalize(), tangent_v.normalize())
        } else {
            (tangent_u, tangent_v)
        })
    }

    /// Insert the knot `t` into the chosen direction `r` times.
    ///
    /// Every control point line along the direction is refined with the same
    /// Boehm pass, so the net stays rectangular. Inserting beyond the
    /// capacity limit is not an error: the surface is left untouched, a
    /// warning is logged and `KnotInsertion::Skipped` is returned.
    pub fn try_insert_knot(
        &mut self,
        direction: UVDirection,
        t: T,
        r: usize,
    ) -> anyhow::Result<KnotInsertion> {
        ensure_parameter_in_domain(t, "t")?;
        anyhow::ensure!(r >= 1, "Number of insertions must be positive");

        let (degree, knots) = match direction {
            UVDirection::U => (self.u_degree, &self.u_knots),
            UVDirection::V => (self.v_degree, &self.v_knots),
        };
        let s = knots.find_multiplicity(t, knot_tolerance());
        if r + s > degree {
            log::warn!(
                "knot {:?} cannot be inserted {} times along {:?}: multiplicity {} plus the request exceeds degree {}",
                t,
                r,
                direction,
                s,
                degree
            );
            return Ok(KnotInsertion::Skipped);
        }

        let request = self.cache.as_ref().map(|cache| cache.request);
        self.insert_knot_unchecked(direction, t, s, r);
        if let Some(request) = request {
            let points = self.sample_grid(&request);
            self.cache = Some(SurfaceEvalCache { request, points });
        }
        Ok(KnotInsertion::Inserted)
    }

    /// Refine every line along the direction without the capacity check,
    /// dropping the cache. Callers must guarantee `1 <= r` and
    /// `r + s <= degree`.
    pub(crate) fn insert_knot_unchecked(
        &mut self,
        direction: UVDirection,
        t: T,
        s: usize,
        r: usize,
    ) {
        match direction {
            UVDirection::U => {
                let n = self.control_points.size_u() - 1;
                let span = self.u_knots.find_knot_span_index(n, self.u_degree, t);
                let size_v = self.control_points.size_v();
                let new_size_u = self.control_points.size_u() + r;
                let columns: Vec<Vec<OPoint<T, D>>> = (0..size_v)
                    .map(|j| {
                        let line = self.control_points.column(j);
                        knot_insertion_line(self.u_degree, &self.u_knots, &line, t, span, s, r)
                    })
                    .collect();
                let mut points = Vec::with_capacity(new_size_u * size_v);
                for i in 0..new_size_u {
                    for column in columns.iter() {
                        points.push(column[i].clone());
                    }
                }
                self.control_points = ControlPointGrid::from_parts(new_size_u, size_v, points);
                self.u_knots = knot_insertion_knots(&self.u_knots, t, span, r);
            }
            UVDirection::V => {
                let n = self.control_points.size_v() - 1;
                let span = self.v_knots.find_knot_span_index(n, self.v_degree, t);
                let size_u = self.control_points.size_u();
                let new_size_v = self.control_points.size_v() + r;
                let mut points = Vec::with_capacity(size_u * new_size_v);
                for row in self.control_points.rows() {
                    points.extend(knot_insertion_line(
                        self.v_degree,
                        &self.v_knots,
                        row,
                        t,
                        span,
                        s,
                        r,
                    ));
                }
                self.control_points = ControlPointGrid::from_parts(size_u, new_size_v, points);
                self.v_knots = knot_insertion_knots(&self.v_knots, t, span, r);
            }
        }
        self.cache = None;
    }

    /// Translate every control point by the given vector, dropping the
    /// evaluation cache.
    pub fn translate(&mut self, translation: &OVector<T, D>) {
        for p in self.control_points.iter_mut() {
            p.coords += translation;
        }
        self.cache = None;
    }

    /// Exchange the parametric directions in place. Degrees, knot vectors and
    /// the control net all swap their u and v roles; evaluation at `(v, u)`
    /// afterwards matches evaluation at `(u, v)` before.
    pub fn transpose(&mut self) {
        std::mem::swap(&mut self.u_degree, &mut self.v_degree);
        std::mem::swap(&mut self.u_knots, &mut self.v_knots);
        self.control_points = self.control_points.transposed();
        self.cache = None;
    }

    /// Cast the surface to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> BSplineSurface<F, D>
    where
        DefaultAllocator: Allocator<D>,
    {
        BSplineSurface {
            control_points: self.control_points.cast(),
            u_degree: self.u_degree,
            v_degree: self.v_degree,
            u_knots: self.u_knots.cast(),
            v_knots: self.v_knots.cast(),
            cache: None,
        }
    }

    pub fn u_degree(&self) -> usize {
        self.u_degree
    }

    pub fn v_degree(&self) -> usize {
        self.v_degree
    }

    pub fn u_knots(&self) -> &KnotVector<T> {
        &self.u_knots
    }

    pub fn v_knots(&self) -> &KnotVector<T> {
        &self.v_knots
    }

    pub fn control_point_grid(&self) -> &ControlPointGrid<T, D> {
        &self.control_points
    }

    pub fn u_knots_domain(&self) -> (T, T) {
        self.u_knots.domain(self.u_degree)
    }

    pub fn v_knots_domain(&self) -> (T, T) {
        self.v_knots.domain(self.v_degree)
    }

    pub fn dimension(&self) -> usize {
        D::dim()
    }
}

impl<T: FloatingPoint> BSplineSurface<T, Const<3>> {
    /// Evaluate the surface at the given uv parameters to get a normal
    /// vector, the cross product of the u and v tangents. Only defined in 3D.
    pub fn normal_at(&self, u: T, v: T, normalize: bool) -> anyhow::Result<OVector<T, Const<3>>> {
        let derivatives = self.derivatives(u, v, 1)?;
        let normal = derivatives[1][0].cross(&derivatives[0][1]);
        Ok(if normalize { normal.normalize() } else { normal })
    }
}
