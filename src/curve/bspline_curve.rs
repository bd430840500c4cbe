use nalgebra::allocator::Allocator;
use nalgebra::{
    Const, DefaultAllocator, DimName, DimNameAdd, DimNameSum, OPoint, OVector, U1,
};
use simba::scalar::SupersetOf;

use crate::knot::{knot_tolerance, KnotVector};
use crate::misc::FloatingPoint;
use crate::refine::{knot_insertion_knots, knot_insertion_line, local_window_start, KnotInsertion};

use super::{CurveBuilder, CurveBuilderWithControlPoints, CurveBuilderWithDegree, CurveRecord};

/// Clamped B-spline curve representation
/// By generics, it can be used for 2D or 3D curves with f32 or f64 scalar types
#[derive(Clone, Debug)]
pub struct BSplineCurve<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    control_points: Vec<OPoint<T, D>>,
    degree: usize,
    /// knot vector, normalized to [0, 1]
    /// its length is equal to the `# of control points + degree + 1`
    knots: KnotVector<T>,
    cache: Option<EvalCache<T, D>>,
}

/// 2D B-spline curve alias
pub type BSplineCurve2D<T> = BSplineCurve<T, Const<2>>;

/// 3D B-spline curve alias
pub type BSplineCurve3D<T> = BSplineCurve<T, Const<3>>;

/// Sampling request remembered alongside the evaluated points.
#[derive(Clone, Copy, Debug)]
struct SampleRequest<T> {
    start: T,
    end: T,
    samples: usize,
}

/// Lazily populated evaluation cache. Mutations drop it; knot insertion
/// replays the remembered request instead.
#[derive(Clone, Debug)]
struct EvalCache<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    request: SampleRequest<T>,
    points: Vec<OPoint<T, D>>,
}

impl<T: FloatingPoint, D: DimName> BSplineCurve<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    /// Create a new B-spline curve
    /// # Failures
    /// - if the degree is zero
    /// - if the number of control points is less than the degree + 1
    /// - if the knot vector has the wrong length, is not non-decreasing, or
    ///   spans a degenerate range
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
    /// assert_eq!(curve.point_at(0.5).unwrap(), Point2::new(1., 1.));
    /// ```
    pub fn try_new(
        degree: usize,
        control_points: Vec<OPoint<T, D>>,
        knots: Vec<T>,
    ) -> anyhow::Result<Self> {
        CurveBuilder::new()
            .degree(degree)?
            .control_points(control_points)?
            .knot_vector(knots)
    }

    pub(crate) fn from_parts(
        degree: usize,
        control_points: Vec<OPoint<T, D>>,
        knots: KnotVector<T>,
    ) -> Self {
        Self {
            control_points,
            degree,
            knots,
            cache: None,
        }
    }

    /// Rebuild the curve from a persistence record, re-running every
    /// construction check. Rational records are rejected since weights have
    /// no representation here.
    pub fn try_from_record(record: CurveRecord<T>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !record.rational,
            "Curve types are not compatible: rational record cannot initialize a B-spline curve"
        );
        anyhow::ensure!(
            record.dimension == D::dim(),
            "Dimension mismatch: record holds {}-dimensional points, expected {}",
            record.dimension,
            D::dim()
        );
        let control_points = record
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
        Self::try_new(record.degree, control_points, record.knot_vector)
    }

    /// Export the curve as a persistence record.
    pub fn to_record(&self) -> CurveRecord<T> {
        CurveRecord {
            rational: false,
            degree: self.degree,
            knot_vector: self.knots.to_vec(),
            control_points: self
                .control_points
                .iter()
                .map(|p| p.coords.as_slice().to_vec())
                .collect(),
            dimension: D::dim(),
        }
    }

    /// Start rebuilding from a new degree. The control points, knot vector
    /// and cached evaluation are discarded since they are bound to the old
    /// degree; the builder ensures they get re-supplied in order.
    pub fn set_degree(self, degree: usize) -> anyhow::Result<CurveBuilderWithDegree> {
        CurveBuilder::new().degree(degree)
    }

    /// Replace the control points, keeping the degree. The knot vector must
    /// be re-supplied since the old one is no longer guaranteed to match.
    pub fn set_control_points(
        self,
        control_points: Vec<OPoint<T, D>>,
    ) -> anyhow::Result<CurveBuilderWithControlPoints<T, D>> {
        CurveBuilder::new()
            .degree(self.degree)?
            .control_points(control_points)
    }

    /// Replace the knot vector in place. The candidate is normalized and
    /// validated against the current degree and control points first; on
    /// failure the curve is left untouched. Success drops the evaluation
    /// cache.
    pub fn set_knot_vector(&mut self, knots: Vec<T>) -> anyhow::Result<()> {
        let knots = KnotVector::new(knots).normalize()?;
        knots.validate(self.degree, self.control_points.len())?;
        self.knots = knots;
        self.cache = None;
        Ok(())
    }

    /// Evaluate the curve at a given parameter to get a point
    pub fn point_at(&self, t: T) -> anyhow::Result<OPoint<T, D>> {
        ensure_parameter_in_domain(t, "t")?;
        Ok(self.point(t))
    }

    /// Evaluate the curve at a given parameter without a domain check
    fn point(&self, t: T) -> OPoint<T, D> {
        let n = self.control_points.len() - 1;
        let knot_span_index = self.knots.find_knot_span_index(n, self.degree, t);
        let basis = self.knots.basis_functions(knot_span_index, t, self.degree);
        let start = local_window_start(knot_span_index, self.degree);
        let mut position = OPoint::<T, D>::origin();
        for i in 0..=self.degree {
            position.coords += &self.control_points[start + i].coords * basis[i];
        }
        position
    }

    /// Sample the curve at a given number of points between the start and end
    /// parameters, both inclusive. The result is a lazy iterator; cloning it
    /// restarts the traversal.
    pub fn sample_regular_range(
        &self,
        start: T,
        end: T,
        samples: usize,
    ) -> anyhow::Result<impl Iterator<Item = OPoint<T, D>> + Clone + '_> {
        ensure_parameter_in_domain(start, "start")?;
        ensure_parameter_in_domain(end, "end")?;
        anyhow::ensure!(
            samples >= 2,
            "At least two samples are required, got {}",
            samples
        );
        Ok(regular_parameters(start, end, samples).map(move |t| self.point(t)))
    }

    /// Sample the curve at a given number of points between the start and end
    /// Yields tuples of parameter and point
    #[allow(clippy::type_complexity)]
    pub fn sample_regular_range_with_parameter(
        &self,
        start: T,
        end: T,
        samples: usize,
    ) -> anyhow::Result<impl Iterator<Item = (T, OPoint<T, D>)> + Clone + '_> {
        ensure_parameter_in_domain(start, "start")?;
        ensure_parameter_in_domain(end, "end")?;
        anyhow::ensure!(
            samples >= 2,
            "At least two samples are required, got {}",
            samples
        );
        Ok(regular_parameters(start, end, samples).map(move |t| (t, self.point(t))))
    }

    /// Evaluate a range of the curve and keep the points in the evaluation
    /// cache. The request is remembered so knot insertion can replay it.
    pub fn evaluate_range(&mut self, start: T, end: T, samples: usize) -> anyhow::Result<()> {
        ensure_parameter_in_domain(start, "start")?;
        ensure_parameter_in_domain(end, "end")?;
        anyhow::ensure!(
            samples >= 2,
            "At least two samples are required, got {}",
            samples
        );
        let request = SampleRequest {
            start,
            end,
            samples,
        };
        let points = self.sample_points(request);
        self.cache = Some(EvalCache { request, points });
        Ok(())
    }

    /// Evaluate the whole domain into the evaluation cache.
    pub fn evaluate(&mut self, samples: usize) -> anyhow::Result<()> {
        self.evaluate_range(T::zero(), T::one(), samples)
    }

    /// Points from the last `evaluate_range` call, empty if the curve has
    /// not been evaluated or a mutation dropped the cache.
    pub fn evaluated_points(&self) -> &[OPoint<T, D>] {
        self.cache
            .as_ref()
            .map(|cache| cache.points.as_slice())
            .unwrap_or(&[])
    }

    fn sample_points(&self, request: SampleRequest<T>) -> Vec<OPoint<T, D>> {
        regular_parameters(request.start, request.end, request.samples)
            .map(|t| self.point(t))
            .collect()
    }

    /// Evaluate the derivatives at a given parameter directly from the
    /// derivative basis functions and the original control points.
    /// Returns `order + 1` vectors; the zeroth entry is the curve point and
    /// entries above the degree are identically zero.
    pub fn derivatives(&self, u: T, order: usize) -> anyhow::Result<Vec<OVector<T, D>>> {
        ensure_parameter_in_domain(u, "u")?;

        let n = self.control_points.len() - 1;
        let du = order.min(self.degree);
        let mut derivatives = vec![OVector::<T, D>::zeros(); order + 1];

        let knot_span_index = self.knots.find_knot_span_index(n, self.degree, u);
        let nders = self
            .knots
            .derivative_basis_functions(knot_span_index, u, self.degree, du);
        let start = local_window_start(knot_span_index, self.degree);
        for k in 0..=du {
            for j in 0..=self.degree {
                derivatives[k] += &self.control_points[start + j].coords * nders[k][j];
            }
        }

        Ok(derivatives)
    }

    /// Control points of the derivative curves up to the given order over
    /// the `start..=stop` window of control point indices.
    /// Row `k` holds the control points of the k-th derivative; each row is
    /// one shorter than the previous, mirroring the shrinking window.
    pub fn derivative_control_points(
        &self,
        order: usize,
        start: usize,
        stop: usize,
    ) -> anyhow::Result<Vec<Vec<OVector<T, D>>>> {
        anyhow::ensure!(
            order <= self.degree,
            "Derivative order {} exceeds degree {}",
            order,
            self.degree
        );
        anyhow::ensure!(
            start <= stop && stop < self.control_points.len(),
            "Invalid control point window {}..={} for {} control points",
            start,
            stop,
            self.control_points.len()
        );

        let r = stop - start;
        let mut pk: Vec<Vec<OVector<T, D>>> = Vec::with_capacity(order + 1);
        pk.push(
            (0..=r)
                .map(|i| self.control_points[start + i].coords.clone())
                .collect(),
        );
        for k in 1..=order {
            let coefficient = T::from_usize(self.degree - k + 1).unwrap();
            let previous = &pk[k - 1];
            let mut row = Vec::with_capacity((r + 1).saturating_sub(k));
            for i in 0..(r + 1).saturating_sub(k) {
                let denominator =
                    self.knots[start + i + self.degree + 1] - self.knots[start + i + k];
                row.push((&previous[i + 1] - &previous[i]) * (coefficient / denominator));
            }
            pk.push(row);
        }
        Ok(pk)
    }

    /// Evaluate the derivatives at a given parameter by contracting the
    /// derivative control points with lower-degree basis functions.
    /// Agrees with [`Self::derivatives`] up to floating point noise and
    /// follows the same zero-padding contract above the degree.
    pub fn derivatives_via_control_points(
        &self,
        u: T,
        order: usize,
    ) -> anyhow::Result<Vec<OVector<T, D>>> {
        ensure_parameter_in_domain(u, "u")?;

        let n = self.control_points.len() - 1;
        let du = order.min(self.degree);
        let span = self.knots.find_knot_span_index(n, self.degree, u);
        let start = local_window_start(span, self.degree);
        let bases = self.knots.all_basis_functions(span, u, self.degree);
        let pk = self.derivative_control_points(du, start, span)?;

        let mut derivatives = vec![OVector::<T, D>::zeros(); order + 1];
        for k in 0..=du {
            for j in 0..=(self.degree - k) {
                derivatives[k] += &pk[k][j] * bases[j][self.degree - k];
            }
        }
        Ok(derivatives)
    }

    /// Evaluate the curve at a given parameter to get a tangent vector
    pub fn tangent_at(&self, u: T, normalize: bool) -> anyhow::Result<OVector<T, D>> {
        let derivatives = self.derivatives(u, 1)?;
        let tangent = derivatives[1].clone();
        Ok(if normalize {
            tangent.normalize()
        } else {
            tangent
        })
    }

    /// Evaluate the curve at a given parameter to get a normal vector.
    /// The normal here is the direction of the second derivative, which
    /// coincides with the principal normal only for arc-length-like
    /// parameterizations.
    pub fn normal_at(&self, u: T, normalize: bool) -> anyhow::Result<OVector<T, D>> {
        let derivatives = self.derivatives(u, 2)?;
        let normal = derivatives[2].clone();
        Ok(if normalize { normal.normalize() } else { normal })
    }

    /// Insert the knot `u` into the curve `r` times.
    ///
    /// Inserting beyond the capacity limit (existing multiplicity plus `r`
    /// above the degree) is not an error: the curve is left untouched, a
    /// warning is logged and `KnotInsertion::Skipped` is returned.
    /// A successful insertion refreshes the evaluation cache if the curve
    /// had been evaluated before.
    ///
    /// # Example
    /// ```
    /// use splajno::prelude::*;
    /// use nalgebra::Point2;
    ///
    /// let mut curve = BSplineCurve::try_new(
    ///     1,
    ///     vec![Point2::new(0., 0.), Point2::new(2., 0.)],
    ///     vec![0., 0., 1., 1.],
    /// )
    /// .unwrap();
    /// let outcome = curve.try_insert_knot(0.5, 1).unwrap();
    /// assert!(outcome.is_inserted());
    /// assert_eq!(curve.control_points().len(), 3);
    /// ```
    pub fn try_insert_knot(&mut self, u: T, r: usize) -> anyhow::Result<KnotInsertion> {
        ensure_parameter_in_domain(u, "u")?;
        anyhow::ensure!(r >= 1, "Number of insertions must be positive");

        let s = self.knots.find_multiplicity(u, knot_tolerance());
        if r + s > self.degree {
            log::warn!(
                "knot {:?} cannot be inserted {} times: multiplicity {} plus the request exceeds degree {}",
                u,
                r,
                s,
                self.degree
            );
            return Ok(KnotInsertion::Skipped);
        }

        let request = self.cache.as_ref().map(|cache| cache.request);
        self.insert_knot_unchecked(u, s, r);
        if let Some(request) = request {
            let points = self.sample_points(request);
            self.cache = Some(EvalCache { request, points });
        }
        Ok(KnotInsertion::Inserted)
    }

    /// Run Boehm insertion without the capacity check, dropping the cache.
    /// Callers must guarantee `1 <= r` and `r + s <= degree`.
    pub(crate) fn insert_knot_unchecked(&mut self, u: T, s: usize, r: usize) {
        let n = self.control_points.len() - 1;
        let span = self.knots.find_knot_span_index(n, self.degree, u);
        self.control_points =
            knot_insertion_line(self.degree, &self.knots, &self.control_points, u, span, s, r);
        self.knots = knot_insertion_knots(&self.knots, u, span, r);
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

    /// Re-embed the curve one dimension higher with a zero in the new
    /// coordinate.
    pub fn elevate_dimension(&self) -> BSplineCurve<T, DimNameSum<D, U1>>
    where
        D: DimNameAdd<U1>,
        DefaultAllocator: Allocator<DimNameSum<D, U1>>,
    {
        let control_points: Vec<OPoint<T, DimNameSum<D, U1>>> = self
            .control_points
            .iter()
            .map(|p| {
                let mut coords = p.coords.as_slice().to_vec();
                coords.push(T::zero());
                OPoint::from_slice(&coords)
            })
            .collect();
        BSplineCurve::from_parts(self.degree, control_points, self.knots.clone())
    }

    /// Cast the curve to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> BSplineCurve<F, D>
    where
        DefaultAllocator: Allocator<D>,
    {
        BSplineCurve {
            control_points: self
                .control_points
                .iter()
                .map(|p| p.clone().cast())
                .collect(),
            degree: self.degree,
            knots: self.knots.cast(),
            cache: None,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &KnotVector<T> {
        &self.knots
    }

    pub fn control_points(&self) -> &[OPoint<T, D>] {
        &self.control_points
    }

    pub fn control_points_iter(&self) -> impl Iterator<Item = &OPoint<T, D>> {
        self.control_points.iter()
    }

    pub fn knots_domain(&self) -> (T, T) {
        self.knots.domain(self.degree)
    }

    pub fn is_clamped(&self) -> bool {
        self.knots.is_clamped(self.degree)
    }

    pub fn dimension(&self) -> usize {
        D::dim()
    }
}

impl<T: FloatingPoint> BSplineCurve<T, Const<3>> {
    /// Evaluate the curve at a given parameter to get a binormal vector,
    /// the cross product of tangent and normal. Only defined in 3D.
    pub fn binormal_at(&self, u: T, normalize: bool) -> anyhow::Result<OVector<T, Const<3>>> {
        let derivatives = self.derivatives(u, 2)?;
        let binormal = derivatives[1].cross(&derivatives[2]);
        Ok(if normalize {
            binormal.normalize()
        } else {
            binormal
        })
    }
}

/// Uniformly spaced parameters across a range, both ends inclusive.
pub(crate) fn regular_parameters<T: FloatingPoint>(
    start: T,
    end: T,
    samples: usize,
) -> impl Iterator<Item = T> + Clone {
    let step = (end - start) / T::from_usize(samples - 1).unwrap();
    (0..samples).map(move |i| start + T::from_usize(i).unwrap() * step)
}

/// Parameters live on the normalized [0, 1] domain once a knot vector has
/// been accepted, so out-of-range requests are hard errors.
pub(crate) fn ensure_parameter_in_domain<T: FloatingPoint>(
    t: T,
    name: &str,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        T::zero() <= t && t <= T::one(),
        "Parameter {} = {:?} is outside the [0, 1] domain",
        name,
        t
    );
    Ok(())
}
