use std::ops::Index;

use nalgebra::{convert, RealField};
use simba::scalar::SupersetOf;

use crate::prelude::{knot_tolerance, FloatingPoint, KnotMultiplicity};

/// Knot vector representation
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector<T>(Vec<T>);

impl<T: RealField + Copy> KnotVector<T> {
    pub fn new(knots: Vec<T>) -> Self {
        Self(knots)
    }

    /// Create an uniform knot vector
    /// an uniform knot vector has a degree + 1 multiplicity at the start and end
    /// # Example
    /// ```
    /// use splajno::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::uniform(3, 2);
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 1., 2., 2., 2.]);
    /// ```
    pub fn uniform(n: usize, degree: usize) -> Self {
        let mut knots = vec![];
        let m = degree;
        knots.extend(std::iter::repeat_n(T::zero(), m));
        for i in 0..n {
            knots.push(T::from_usize(i).unwrap());
        }
        knots.extend(std::iter::repeat_n(T::from_usize(n - 1).unwrap(), m));
        Self(knots)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }

    pub fn first(&self) -> T {
        self.0[0]
    }

    pub fn last(&self) -> T {
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<T> {
        self.0.iter()
    }

    /// Get the domain of the knot vector by degree
    pub fn domain(&self, degree: usize) -> (T, T) {
        (self.0[degree], self.0[self.0.len() - 1 - degree])
    }

    /// Rescale the knot vector onto the [0, 1] interval, returning a new vector.
    /// Fails if the knot range is degenerate.
    /// # Example
    /// ```
    /// use splajno::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 2., 2.]);
    /// let normalized = knots.normalize().unwrap();
    /// assert_eq!(normalized.to_vec(), vec![0., 0., 0., 0.5, 1., 1., 1.]);
    /// ```
    pub fn normalize(&self) -> anyhow::Result<Self> {
        anyhow::ensure!(!self.0.is_empty(), "Cannot normalize an empty knot vector");
        let first = self.first();
        let denominator = self.last() - first;
        anyhow::ensure!(
            denominator > T::zero(),
            "Knot vector range is degenerate: {:?} to {:?}",
            first,
            self.last()
        );
        Ok(Self(
            self.0.iter().map(|k| (*k - first) / denominator).collect(),
        ))
    }

    /// Check the knot vector against a degree and control point count.
    /// The length must equal `control point count + degree + 1` and the
    /// sequence must be non-decreasing.
    pub fn validate(&self, degree: usize, control_point_count: usize) -> anyhow::Result<()> {
        let expected = control_point_count + degree + 1;
        anyhow::ensure!(
            self.len() == expected,
            "Invalid knot vector length: got {}, expected {} (control point count + degree + 1)",
            self.len(),
            expected
        );
        anyhow::ensure!(
            self.0.windows(2).all(|w| w[0] <= w[1]),
            "Knot vector must be non-decreasing"
        );
        Ok(())
    }

    /// Get the multiplicity of each knot
    /// # Example
    /// ```
    /// use splajno::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// let knot_multiplicity = knots.multiplicity();
    /// assert_eq!(knot_multiplicity[0].multiplicity(), 3);
    /// assert_eq!(knot_multiplicity[1].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[2].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[3].multiplicity(), 3);
    /// ```
    pub fn multiplicity(&self) -> Vec<KnotMultiplicity<T>> {
        let mut mult = vec![];

        let tolerance = knot_tolerance();
        let mut current = KnotMultiplicity::new(self.0[0], 0);
        self.0.iter().for_each(|knot| {
            if (*knot - *current.knot()).abs() > tolerance {
                mult.push(current.clone());
                current = KnotMultiplicity::new(*knot, 0);
            }
            current.increment_multiplicity();
        });
        mult.push(current);

        mult
    }

    /// Count how many knots coincide with the given value within the tolerance.
    pub fn find_multiplicity(&self, knot: T, epsilon: T) -> usize {
        self.0.iter().filter(|k| (**k - knot).abs() <= epsilon).count()
    }

    /// The first knot lying strictly inside the clamped domain, if any.
    pub fn first_interior_knot(&self, degree: usize) -> Option<T> {
        self.0[(degree + 1)..(self.0.len() - degree - 1)]
            .first()
            .copied()
    }

    /// Check if the knot vector is clamped
    /// `clamped` means the first and last knots have a multiplicity greater than the degree
    /// e.g. [0, 0, 0, 1, 2, 3, 3, 3] with degree 2 is clamped
    pub fn is_clamped(&self, degree: usize) -> bool {
        let multiplicity = self.multiplicity();
        let start = multiplicity.first();
        let end = multiplicity.last();
        match (start, end) {
            (Some(start), Some(end)) => {
                start.multiplicity() > degree && end.multiplicity() > degree
            }
            _ => false,
        }
    }

    /// Find the knot span index by binary search
    /// `n` is the highest control point index, so a parameter at the end of
    /// the domain maps to span `n` rather than out of range.
    ///
    /// # Example
    /// ```
    /// use splajno::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// let idx = knots.find_knot_span_index(4, 2, 2.5);
    /// assert_eq!(idx, 4);
    /// ```
    pub fn find_knot_span_index(&self, n: usize, degree: usize, u: T) -> usize {
        if u > self[n + 1] - T::default_epsilon() {
            return n;
        }

        if u < self[degree] + T::default_epsilon() {
            return degree;
        }

        // binary search
        let mut low = degree;
        let mut high = n + 1;
        let mut mid = ((low + high) as f64 / 2.).floor() as usize;
        while u < self[mid] || self[mid + 1] <= u {
            if u < self[mid] {
                high = mid;
            } else {
                low = mid;
            }
            let next = ((low + high) as f64 / 2.).floor() as usize;
            if mid == next {
                break;
            }
            mid = next;
        }

        mid
    }

    /// Compute the non-vanishing basis functions
    ///
    pub fn basis_functions(&self, knot_span_index: usize, u: T, degree: usize) -> Vec<T> {
        let mut basis_functions = vec![T::zero(); degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        basis_functions[0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;
            let mut saved = T::zero();

            for r in 0..j {
                let temp = basis_functions[r] / (right[r + 1] + left[j - r]);
                basis_functions[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            basis_functions[j] = saved;
        }

        basis_functions
    }

    /// Compute the non-vanishing basis functions for every degree from 0 up
    /// to the given degree at once.
    /// `table[j][i]` holds the value of the j-th function evaluated with
    /// degree `i`; entries with `j > i` vanish and stay zero.
    pub fn all_basis_functions(&self, knot_span_index: usize, u: T, degree: usize) -> Vec<Vec<T>> {
        let mut table = vec![vec![T::zero(); degree + 1]; degree + 1];
        for i in 0..=degree {
            let basis = self.basis_functions(knot_span_index, u, i);
            for (j, value) in basis.into_iter().enumerate() {
                table[j][i] = value;
            }
        }
        table
    }

    /// Compute the non-vanishing basis functions and their derivatives
    /// Returns a 2d array of size (min(order, degree) + 1, degree + 1).
    /// The k-th row holds the k-th derivatives and the first row is made up
    /// of the basis function values. Orders above the degree vanish
    /// identically and are not tabulated here.
    pub fn derivative_basis_functions(
        &self,
        knot_index: usize,
        u: T,
        degree: usize,
        order: usize,
    ) -> Vec<Vec<T>> {
        let mut ndu = vec![vec![T::zero(); degree + 1]; degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        ndu[0][0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_index + 1 - j];
            right[j] = self[knot_index + j] - u;

            let mut saved = T::zero();
            for r in 0..j {
                // lower triangle
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];

                // upper triangle
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let order = order.min(degree);
        let mut ders = vec![vec![T::zero(); degree + 1]; order + 1];
        let mut a = vec![vec![T::zero(); degree + 1]; 2];

        // load the basis functions
        for j in 0..=degree {
            ders[0][j] = ndu[j][degree];
        }

        let idegree = degree as isize;
        let n = order as isize;

        // compute the derivatives
        for r in 0..=idegree {
            // alternate rows in array a
            let mut s1 = 0;
            let mut s2 = 1;
            a[0][0] = T::one();

            // loop to compute the kth derivative
            for k in 1..=n {
                let mut d = T::zero();
                let rk = r - k;
                let pk = idegree - k;

                if r >= k {
                    a[s2][0] = a[s1][0] / ndu[(pk + 1) as usize][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk as usize];
                }

                let j1 = if rk >= -1 { 1 } else { -rk };
                let j2 = if r - 1 <= pk { k - 1 } else { idegree - r };

                for j in j1..=j2 {
                    a[s2][j as usize] = (a[s1][j as usize] - a[s1][j as usize - 1])
                        / ndu[(pk + 1) as usize][(rk + j) as usize];
                    d += a[s2][j as usize] * ndu[(rk + j) as usize][pk as usize];
                }

                let uk = k as usize;
                let ur = r as usize;
                if r <= pk {
                    a[s2][uk] = -a[s1][(k - 1) as usize] / ndu[(pk + 1) as usize][ur];
                    d += a[s2][uk] * ndu[ur][pk as usize];
                }

                ders[uk][ur] = d;

                // switch rows
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut acc = idegree;
        for k in 1..=n {
            for j in 0..=idegree {
                ders[k as usize][j as usize] *= T::from_isize(acc).unwrap();
            }
            acc *= idegree - k;
        }
        ders
    }

    /// Compute basis functions at regularly spaced parameters across a range
    /// Returns a tuple of knot spans and basis functions, one entry per sample
    pub fn regularly_spaced_basis_functions(
        &self,
        degree: usize,
        start: T,
        end: T,
        samples: usize,
    ) -> (Vec<usize>, Vec<Vec<T>>) {
        let n = self.len() - degree - 2;
        let step = (end - start) / T::from_usize(samples - 1).unwrap();

        let mut bases = vec![];
        let mut knot_spans = vec![];
        for i in 0..samples {
            let u = start + T::from_usize(i).unwrap() * step;
            let knot_index = self.find_knot_span_index(n, degree, u);
            knot_spans.push(knot_index);
            bases.push(self.basis_functions(knot_index, u, degree));
        }

        (knot_spans, bases)
    }

    /// Cast the knot vector to another floating point type
    /// # Example
    /// ```
    /// use splajno::prelude::*;
    /// let knots: KnotVector<f64> = KnotVector::new(vec![1., 2., 3., 4., 5., 6.]);
    /// let knots2 = knots.cast::<f32>();
    /// assert_eq!(knots2.first(), 1.0);
    /// ```
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> KnotVector<F> {
        KnotVector::new(self.0.iter().map(|v| convert(*v)).collect())
    }
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> FromIterator<T> for KnotVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::KnotVector;

    #[test]
    fn find_span() {
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 1., 1., 1.]);
        assert_eq!(knots.find_knot_span_index(3, 2, 0.25), 2);
        assert_eq!(knots.find_knot_span_index(3, 2, 0.75), 3);
    }

    #[test]
    fn find_span_at_domain_ends() {
        // 4 control points, degree 2
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 1., 1., 1.]);
        let n = 3;
        assert_eq!(knots.find_knot_span_index(n, 2, 0.), 2);
        // the end of the domain maps to the last control point index
        assert_eq!(knots.find_knot_span_index(n, 2, 1.), n);
    }

    #[test]
    fn basis_functions_partition_of_unity() {
        let knots = KnotVector::new(vec![0., 0., 0., 0., 0.2, 0.5, 0.8, 1., 1., 1., 1.]);
        let degree = 3;
        let n = 6;
        for i in 0..=50 {
            let u = i as f64 / 50.;
            let span = knots.find_knot_span_index(n, degree, u);
            let basis = knots.basis_functions(span, u, degree);
            assert_eq!(basis.len(), degree + 1);
            let sum: f64 = basis.iter().sum();
            assert_relative_eq!(sum, 1., epsilon = 1e-9);
            assert!(basis.iter().all(|b| *b >= -1e-12));
        }
    }

    #[test]
    fn derivative_basis_functions_zeroth_order_matches_basis() {
        let knots = KnotVector::new(vec![0., 0., 0., 0.3, 0.7, 1., 1., 1.]);
        let degree = 2;
        let u = 0.4;
        let span = knots.find_knot_span_index(4, degree, u);
        let basis = knots.basis_functions(span, u, degree);
        let ders = knots.derivative_basis_functions(span, u, degree, 2);
        assert_eq!(ders.len(), 3);
        for (a, b) in basis.iter().zip(ders[0].iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn derivative_basis_functions_clamps_order_to_degree() {
        let knots = KnotVector::new(vec![0., 0., 0., 1., 1., 1.]);
        let ders = knots.derivative_basis_functions(2, 0.5, 2, 5);
        assert_eq!(ders.len(), 3);
    }

    #[test]
    fn all_basis_functions_final_column_matches_basis() {
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 1., 1., 1.]);
        let degree = 2;
        let u = 0.3;
        let span = knots.find_knot_span_index(3, degree, u);
        let table = knots.all_basis_functions(span, u, degree);
        let basis = knots.basis_functions(span, u, degree);
        for j in 0..=degree {
            assert_relative_eq!(table[j][degree], basis[j], epsilon = 1e-12);
        }
    }

    #[test]
    fn normalize_rescales_onto_unit_interval() {
        let knots = KnotVector::new(vec![1., 1., 1., 2., 4., 4., 4.]);
        let normalized = knots.normalize().unwrap();
        assert_eq!(
            normalized.to_vec(),
            vec![0., 0., 0., 1. / 3., 1., 1., 1.]
        );
    }

    #[test]
    fn normalize_rejects_degenerate_range() {
        let knots = KnotVector::new(vec![2., 2., 2., 2.]);
        assert!(knots.normalize().is_err());
    }

    #[test]
    fn validate_checks_length_and_monotonicity() {
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 1., 1., 1.]);
        assert!(knots.validate(2, 4).is_ok());
        // wrong control point count
        assert!(knots.validate(2, 5).is_err());
        // decreasing sequence
        let broken = KnotVector::new(vec![0., 0., 0., 0.5, 0.4, 1., 1., 1.]);
        assert!(broken.validate(2, 5).is_err());
    }

    #[test]
    fn find_multiplicity_uses_tolerance() {
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 0.5 + 5e-9, 1., 1., 1.]);
        assert_eq!(knots.find_multiplicity(0.5, 1e-7), 2);
        assert_eq!(knots.find_multiplicity(0.25, 1e-7), 0);
        assert_eq!(knots.find_multiplicity(0., 1e-7), 3);
    }

    #[test]
    fn multiplicity_groups_knots_within_tolerance() {
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 0.5 + 5e-8, 1., 1., 1.]);
        let groups = knots.multiplicity();
        assert_eq!(groups.len(), 3);
        assert_eq!(*groups[1].knot(), 0.5);
        assert_eq!(groups[1].multiplicity(), 2);
        // a gap wider than the tolerance starts a new group
        let separated = KnotVector::new(vec![0., 0., 0., 0.5, 0.501, 1., 1., 1.]);
        assert_eq!(separated.multiplicity().len(), 4);
    }

    #[test]
    fn first_interior_knot_skips_clamps() {
        let clamped = KnotVector::new(vec![0., 0., 0., 0.25, 0.75, 1., 1., 1.]);
        assert_eq!(clamped.first_interior_knot(2), Some(0.25));
        let bezier = KnotVector::new(vec![0., 0., 0., 1., 1., 1.]);
        assert_eq!(bezier.first_interior_knot(2), None);
    }

    #[test]
    fn regularly_spaced_basis_functions_cover_range() {
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 1., 1., 1.]);
        let (spans, bases) = knots.regularly_spaced_basis_functions(2, 0., 1., 5);
        assert_eq!(spans.len(), 5);
        assert_eq!(bases.len(), 5);
        assert_eq!(spans[0], 2);
        assert_eq!(*spans.last().unwrap(), 3);
        for basis in bases {
            let sum: f64 = basis.iter().sum();
            assert_relative_eq!(sum, 1., epsilon = 1e-9);
        }
    }
}
