//! D-dimensional positions and periodic displacement.
//!
//! `D` is fixed at compile time via a const generic, matching the spec's
//! `D ∈ {2, 3}`; callers typically use the [`Position2`]/[`Position3`]
//! aliases.

use core::ops::{Add, Sub};

/// A D-coordinate position. Arithmetic is elementwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position<const D: usize>(pub [f64; D]);

/// A 2D position.
pub type Position2 = Position<2>;
/// A 3D position.
pub type Position3 = Position<3>;

impl<const D: usize> Position<D> {
    /// Construct a position from raw coordinates.
    pub const fn new(coords: [f64; D]) -> Self {
        Self(coords)
    }

    /// Origin of the space.
    pub fn origin() -> Self {
        Self([0.0; D])
    }

    /// The `dim`-th coordinate.
    pub fn coord(&self, dim: usize) -> f64 {
        self.0[dim]
    }

    /// Euclidean distance to `other`, ignoring periodicity.
    pub fn distance(&self, other: &Self) -> f64 {
        self.euclidean_norm(&self.sub(other))
    }

    fn euclidean_norm(&self, v: &Self) -> f64 {
        v.0.iter().map(|c| c * c).sum::<f64>().sqrt()
    }

    fn sub(&self, other: &Self) -> Self {
        let mut out = [0.0; D];
        for i in 0..D {
            out[i] = self.0[i] - other.0[i];
        }
        Self(out)
    }
}

impl<const D: usize> Add for Position<D> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let mut out = [0.0; D];
        for i in 0..D {
            out[i] = self.0[i] + rhs.0[i];
        }
        Self(out)
    }
}

impl<const D: usize> Sub for Position<D> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let mut out = [0.0; D];
        for i in 0..D {
            out[i] = self.0[i] - rhs.0[i];
        }
        Self(out)
    }
}

/// Per-axis extent and periodicity of a layer's bounding region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent<const D: usize> {
    /// Size along each axis.
    pub size: [f64; D],
    /// Whether each axis wraps (periodic boundary).
    pub periodic: [bool; D],
}

impl<const D: usize> Extent<D> {
    /// Construct a non-periodic extent.
    pub fn new(size: [f64; D]) -> Self {
        Self {
            size,
            periodic: [false; D],
        }
    }

    /// Mark all axes periodic.
    pub fn all_periodic(mut self) -> Self {
        self.periodic = [true; D];
        self
    }

    /// Mark a single axis periodic.
    pub fn with_periodic_axis(mut self, axis: usize) -> Self {
        self.periodic[axis] = true;
        self
    }

    /// Displacement from `a` to `b`, honoring per-axis periodicity.
    ///
    /// For a periodic axis of extent `L`, `displacement = ((b - a + L/2)
    /// mod L) - L/2`, which keeps the result in `[-L/2, L/2]`.
    pub fn displacement(&self, a: &Position<D>, b: &Position<D>) -> Position<D> {
        let mut out = [0.0; D];
        for i in 0..D {
            let raw = b.0[i] - a.0[i];
            out[i] = if self.periodic[i] {
                let l = self.size[i];
                wrap_to_half_open(raw, l)
            } else {
                raw
            };
        }
        Position(out)
    }

    /// Distance from `a` to `b` under this extent's periodicity.
    pub fn distance(&self, a: &Position<D>, b: &Position<D>) -> f64 {
        let d = self.displacement(a, b);
        d.0.iter().map(|c| c * c).sum::<f64>().sqrt()
    }

    /// Distance along a single axis (1-indexed as in the spec's
    /// `exp-dist`/`distance(dim)` parameter nodes: `dim == 0` means
    /// "all axes"; `dim > 0` selects `axis = dim - 1`).
    pub fn axis_distance(&self, a: &Position<D>, b: &Position<D>, dim: usize) -> f64 {
        if dim == 0 {
            self.distance(a, b)
        } else {
            let axis = dim - 1;
            let d = self.displacement(a, b);
            d.0[axis].abs()
        }
    }
}

/// Folds `raw` into `(-L/2, L/2]`-style periodic displacement.
fn wrap_to_half_open(raw: f64, l: f64) -> f64 {
    if l <= 0.0 {
        return raw;
    }
    let shifted = raw + l / 2.0;
    let m = shifted.rem_euclid(l);
    m - l / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_distance_takes_short_way_around() {
        //  scenario 5
        let extent = Extent::new([1.0, 1.0]).all_periodic();
        let a = Position2::new([0.1, 0.1]);
        let b = Position2::new([0.9, 0.9]);
        let d = extent.distance(&a, &b);
        assert!((d - 0.08f64.sqrt()).abs() < 1e-9, "got {d}");
    }

    #[test]
    fn non_periodic_distance_is_plain_euclidean() {
        let extent = Extent::new([1.0, 1.0]);
        let a = Position2::new([0.1, 0.1]);
        let b = Position2::new([0.9, 0.9]);
        let d = extent.distance(&a, &b);
        assert!((d - 1.28f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn displacement_never_exceeds_half_extent() {
        let extent = Extent::new([2.0, 3.0]).all_periodic();
        for ax in 0..2000 {
            let x = (ax as f64 * 0.0013).rem_euclid(2.0);
            let y = (ax as f64 * 0.0029).rem_euclid(3.0);
            let a = Position2::new([0.0, 0.0]);
            let b = Position2::new([x, y]);
            let d = extent.displacement(&a, &b);
            assert!(d.0[0].abs() <= 1.0 + 1e-9);
            assert!(d.0[1].abs() <= 1.5 + 1e-9);
        }
    }
}
