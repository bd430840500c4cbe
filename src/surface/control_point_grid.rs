use std::ops::Index;

use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint};
use simba::scalar::SupersetOf;

use crate::misc::FloatingPoint;

/// Rectangular control net of a surface, stored flat with the v index
/// varying fastest. Row `i` is the slice of points sharing the u index `i`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound(
        serialize = "T: serde::Serialize, OPoint<T, D>: serde::Serialize",
        deserialize = "T: serde::Deserialize<'de>, OPoint<T, D>: serde::Deserialize<'de>"
    ))
)]
pub struct ControlPointGrid<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    points: Vec<OPoint<T, D>>,
    size_u: usize,
    size_v: usize,
}

impl<T: FloatingPoint, D: DimName> ControlPointGrid<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    /// Create a grid from flat points in row-major order, v varying fastest.
    /// # Failures
    /// - if either size is zero
    /// - if the number of points does not match `size_u * size_v`
    pub fn try_new(size_u: usize, size_v: usize, points: Vec<OPoint<T, D>>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            size_u >= 1 && size_v >= 1,
            "Grid sizes must be positive, got {} x {}",
            size_u,
            size_v
        );
        anyhow::ensure!(
            points.len() == size_u * size_v,
            "Grid of {} x {} needs {} points, got {}",
            size_u,
            size_v,
            size_u * size_v,
            points.len()
        );
        Ok(Self {
            points,
            size_u,
            size_v,
        })
    }

    /// Create a grid from nested rows, each row holding the points of one
    /// u index.
    /// # Failures
    /// - if there are no rows or a row is empty
    /// - if the rows have different lengths
    pub fn try_from_rows(rows: Vec<Vec<OPoint<T, D>>>) -> anyhow::Result<Self> {
        anyhow::ensure!(!rows.is_empty(), "Grid needs at least one row");
        let size_v = rows[0].len();
        anyhow::ensure!(size_v >= 1, "Grid rows must not be empty");
        anyhow::ensure!(
            rows.iter().all(|row| row.len() == size_v),
            "Grid rows must all have the same length"
        );
        let size_u = rows.len();
        Ok(Self {
            points: rows.into_iter().flatten().collect(),
            size_u,
            size_v,
        })
    }

    pub(crate) fn from_parts(size_u: usize, size_v: usize, points: Vec<OPoint<T, D>>) -> Self {
        Self {
            points,
            size_u,
            size_v,
        }
    }

    pub fn size_u(&self) -> usize {
        self.size_u
    }

    pub fn size_v(&self) -> usize {
        self.size_v
    }

    pub fn get(&self, u: usize, v: usize) -> Option<&OPoint<T, D>> {
        if u < self.size_u && v < self.size_v {
            Some(&self.points[u * self.size_v + v])
        } else {
            None
        }
    }

    /// Points sharing the u index `u`, contiguous in storage.
    pub fn row(&self, u: usize) -> &[OPoint<T, D>] {
        &self.points[u * self.size_v..(u + 1) * self.size_v]
    }

    /// Points sharing the v index `v`, gathered across rows.
    pub fn column(&self, v: usize) -> Vec<OPoint<T, D>> {
        (0..self.size_u)
            .map(|u| self.points[u * self.size_v + v].clone())
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[OPoint<T, D>]> {
        self.points.chunks(self.size_v)
    }

    pub fn to_rows(&self) -> Vec<Vec<OPoint<T, D>>> {
        self.rows().map(|row| row.to_vec()).collect()
    }

    /// The same net with the u and v roles exchanged.
    pub fn transposed(&self) -> Self {
        let mut points = Vec::with_capacity(self.points.len());
        for v in 0..self.size_v {
            for u in 0..self.size_u {
                points.push(self.points[u * self.size_v + v].clone());
            }
        }
        Self {
            points,
            size_u: self.size_v,
            size_v: self.size_u,
        }
    }

    pub fn points(&self) -> &[OPoint<T, D>] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &OPoint<T, D>> {
        self.points.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut OPoint<T, D>> {
        self.points.iter_mut()
    }

    /// Cast the grid to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> ControlPointGrid<F, D>
    where
        DefaultAllocator: Allocator<D>,
    {
        ControlPointGrid {
            points: self.points.iter().map(|p| p.clone().cast()).collect(),
            size_u: self.size_u,
            size_v: self.size_v,
        }
    }
}

impl<T: FloatingPoint, D: DimName> Index<(usize, usize)> for ControlPointGrid<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    type Output = OPoint<T, D>;

    fn index(&self, (u, v): (usize, usize)) -> &Self::Output {
        &self.points[u * self.size_v + v]
    }
}
