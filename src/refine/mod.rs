use nalgebra::{allocator::Allocator, DefaultAllocator, DimName, OPoint};

use crate::knot::KnotVector;
use crate::misc::FloatingPoint;

/// Outcome of a knot insertion request.
/// `Skipped` reports the soft failure path: the requested multiplicity would
/// exceed the degree, so the object was left untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnotInsertion {
    Inserted,
    Skipped,
}

impl KnotInsertion {
    pub fn is_inserted(&self) -> bool {
        matches!(self, KnotInsertion::Inserted)
    }
}

/// First control point index affected by a basis function window,
/// `span - degree`.
pub(crate) fn local_window_start(span: usize, degree: usize) -> usize {
    span - degree
}

/// Build the knot vector that results from inserting `u` `r` times after
/// `span`.
pub(crate) fn knot_insertion_knots<T: FloatingPoint>(
    knots: &KnotVector<T>,
    u: T,
    span: usize,
    r: usize,
) -> KnotVector<T> {
    let mut refined = Vec::with_capacity(knots.len() + r);
    refined.extend_from_slice(&knots.as_slice()[0..=span]);
    refined.extend(vec![u; r]);
    refined.extend_from_slice(&knots.as_slice()[span + 1..]);
    KnotVector::new(refined)
}

/// Insert the knot `u` `r` times into a single line of control points.
///
/// Boehm's algorithm: the points outside the affected window are copied
/// through unchanged, while the `degree + 1` points inside it are blended
/// over `r` passes on a fixed-size working buffer. `knots` is the knot
/// vector before insertion, `span` the span of `u` in it and `s` the
/// current multiplicity of `u`. Callers must guarantee `1 <= r` and
/// `r + s <= degree`.
pub(crate) fn knot_insertion_line<T: FloatingPoint, D: DimName>(
    degree: usize,
    knots: &KnotVector<T>,
    line: &[OPoint<T, D>],
    u: T,
    span: usize,
    s: usize,
    r: usize,
) -> Vec<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
{
    let count = line.len();
    let window = local_window_start(span, degree);

    let mut refined = vec![OPoint::origin(); count + r];
    for i in 0..=window {
        refined[i] = line[i].clone();
    }
    for i in (span - s)..count {
        refined[i + r] = line[i].clone();
    }

    // working buffer over the affected window
    let mut buffer: Vec<OPoint<T, D>> = (0..=(degree - s))
        .map(|i| line[window + i].clone())
        .collect();

    for j in 1..=r {
        let left = window + j;
        for i in 0..=(degree - j - s) {
            let alpha = (u - knots[left + i]) / (knots[i + span + 1] - knots[left + i]);
            buffer[i] = buffer[i].lerp(&buffer[i + 1], alpha);
        }
        refined[left] = buffer[0].clone();
        refined[span + r - j - s] = buffer[degree - j - s].clone();
    }

    // remaining interior points come straight from the buffer
    let left = window + r;
    for i in (left + 1)..(span - s) {
        refined[i] = buffer[i - left].clone();
    }

    refined
}
