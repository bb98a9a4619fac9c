//! Geometric mask predicates over D-dimensional positions.
//!
//! Every mask exposes `inside(point)`, `inside(box)` (whole box contained),
//! `outside(box)` (whole box disjoint), and a finite bounding box. For
//! convex masks (box, ball, ellipse), "all `2^D` corners inside" exactly
//! decides `inside_box`, since a convex set containing a box's corners
//! contains the whole box. `outside_box` for rotated or curved masks falls
//! back to a bounding-box disjointness test, which is conservative (it
//! never wrongly reports "outside") rather than exact — a masked n-tree
//! traversal degrades to per-leaf testing in that case but stays correct.

use esk_types::{KernelError, Position, Result};

use crate::bbox::BoundingBox;

/// A geometric predicate over positions of dimension `D`.
pub trait Mask<const D: usize>: std::fmt::Debug + Send + Sync {
    /// True if `p` satisfies the predicate.
    fn inside(&self, p: &Position<D>) -> bool;

    /// True if every point of `b` satisfies the predicate.
    fn inside_box(&self, b: &BoundingBox<D>) -> bool {
        b.corners().iter().all(|c| self.inside(c))
    }

    /// True if no point of `b` satisfies the predicate.
    fn outside_box(&self, b: &BoundingBox<D>) -> bool {
        self.bounding_box().disjoint(b)
    }

    /// A finite box containing every point satisfying the predicate.
    fn bounding_box(&self) -> BoundingBox<D>;
}

/// The mask accepting every point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllMask<const D: usize> {
    /// The region considered "everywhere", typically the owning layer's
    /// extent; a truly unbounded mask cannot offer a finite bounding box.
    pub region: BoundingBox<D>,
}

impl<const D: usize> Mask<D> for AllMask<D> {
    fn inside(&self, _p: &Position<D>) -> bool {
        true
    }
    fn inside_box(&self, _b: &BoundingBox<D>) -> bool {
        true
    }
    fn outside_box(&self, _b: &BoundingBox<D>) -> bool {
        false
    }
    fn bounding_box(&self) -> BoundingBox<D> {
        self.region
    }
}

/// An axis-aligned or rotated box mask.
///
/// Rotation is specified as an azimuth angle (rotation in the 0-1 plane)
/// and, for `D == 3`, an additional polar angle (rotation in the 0-2
/// plane), applied about the box's own center — matching the azimuth/polar
/// convention 
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxMask<const D: usize> {
    center: Position<D>,
    half_extent: [f64; D],
    azimuth: f64,
    polar: f64,
}

impl<const D: usize> BoxMask<D> {
    /// Construct an axis-aligned box from corners.
    pub fn axis_aligned(lower: Position<D>, upper: Position<D>) -> Self {
        let bb = BoundingBox::new(lower, upper);
        Self {
            center: bb.center(),
            half_extent: bb.half_extent(),
            azimuth: 0.0,
            polar: 0.0,
        }
    }

    /// Construct a box rotated by `azimuth` (and, for `D == 3`, `polar`)
    /// radians about its own center.
    pub fn rotated(lower: Position<D>, upper: Position<D>, azimuth: f64, polar: f64) -> Self {
        let bb = BoundingBox::new(lower, upper);
        Self {
            center: bb.center(),
            half_extent: bb.half_extent(),
            azimuth,
            polar,
        }
    }

    /// Rotate `rel` (a point relative to the box center) into the box's
    /// local (unrotated) frame.
    fn to_local(&self, rel: &Position<D>) -> [f64; D] {
        let mut v = [0.0; D];
        for i in 0..D {
            v[i] = rel.coord(i);
        }
        if self.azimuth != 0.0 && D >= 2 {
            let (s, c) = self.azimuth.sin_cos();
            let (x, y) = (v[0], v[1]);
            v[0] = c * x + s * y;
            v[1] = -s * x + c * y;
        }
        if D == 3 && self.polar != 0.0 {
            let (s, c) = self.polar.sin_cos();
            let (x, z) = (v[0], v[2]);
            v[0] = c * x + s * z;
            v[2] = -s * x + c * z;
        }
        v
    }

    fn is_rotated(&self) -> bool {
        self.azimuth != 0.0 || self.polar != 0.0
    }
}

impl<const D: usize> Mask<D> for BoxMask<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        let rel = *p - self.center;
        let local = self.to_local(&rel);
        (0..D).all(|i| local[i].abs() <= self.half_extent[i])
    }

    fn bounding_box(&self) -> BoundingBox<D> {
        if !self.is_rotated() {
            let mut lower = [0.0; D];
            let mut upper = [0.0; D];
            for i in 0..D {
                lower[i] = self.center.coord(i) - self.half_extent[i];
                upper[i] = self.center.coord(i) + self.half_extent[i];
            }
            return BoundingBox::new(Position::new(lower), Position::new(upper));
        }
        // Conservative AABB: the rotated box's corners, un-rotated back
        // into world space, bound the box exactly; we approximate by
        // expanding to the circumscribing sphere's box, which always
        // contains the rotated box regardless of rotation angle.
        let radius = self.half_extent.iter().map(|h| h * h).sum::<f64>().sqrt();
        let mut lower = [0.0; D];
        let mut upper = [0.0; D];
        for i in 0..D {
            lower[i] = self.center.coord(i) - radius;
            upper[i] = self.center.coord(i) + radius;
        }
        BoundingBox::new(Position::new(lower), Position::new(upper))
    }
}

/// A ball (disc in 2D, sphere in 3D) mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallMask<const D: usize> {
    center: Position<D>,
    radius: f64,
}

impl<const D: usize> BallMask<D> {
    /// Construct a ball, validating `radius > 0`.
    pub fn new(center: Position<D>, radius: f64) -> Result<Self> {
        if radius <= 0.0 {
            return Err(KernelError::bad_property("radius", "must be > 0"));
        }
        Ok(Self { center, radius })
    }
}

impl<const D: usize> Mask<D> for BallMask<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        self.center.distance(p) <= self.radius
    }

    fn outside_box(&self, b: &BoundingBox<D>) -> bool {
        b.distance_to(&self.center) > self.radius
    }

    fn bounding_box(&self) -> BoundingBox<D> {
        let mut lower = [0.0; D];
        let mut upper = [0.0; D];
        for i in 0..D {
            lower[i] = self.center.coord(i) - self.radius;
            upper[i] = self.center.coord(i) + self.radius;
        }
        BoundingBox::new(Position::new(lower), Position::new(upper))
    }
}

/// An ellipse (2D, with correlation) / axis-aligned ellipsoid (3D, no
/// correlation) mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseMask<const D: usize> {
    center: Position<D>,
    std: [f64; D],
    rho: f64,
    // Precomputed 1/(2*(1-rho^2)*std^2) , used only for D==2.
    k: [f64; D],
}

impl<const D: usize> EllipseMask<D> {
    /// Construct, validating `std[i] > 0` for all axes and `-1 < rho < 1`
    /// (`rho` only meaningful for `D == 2`).
    pub fn new(center: Position<D>, std: [f64; D], rho: f64) -> Result<Self> {
        if std.iter().any(|s| *s <= 0.0) {
            return Err(KernelError::bad_property("std", "every axis std must be > 0"));
        }
        if !(-1.0..1.0).contains(&rho) {
            return Err(KernelError::bad_property("rho", "must satisfy -1 < rho < 1"));
        }
        let mut k = [0.0; D];
        for i in 0..D {
            k[i] = 1.0 / (2.0 * (1.0 - rho * rho) * std[i] * std[i]);
        }
        Ok(Self { center, std, rho, k })
    }

    fn quadratic_form(&self, p: &Position<D>) -> f64 {
        let rel = *p - self.center;
        if D == 2 && self.rho != 0.0 {
            let x = rel.coord(0);
            let y = rel.coord(1);
            let sx = self.std[0];
            let sy = self.std[1];
            ((x / sx).powi(2) - 2.0 * self.rho * x * y / (sx * sy) + (y / sy).powi(2))
                / (1.0 - self.rho * self.rho)
        } else {
            (0..D).map(|i| (rel.coord(i) / self.std[i]).powi(2)).sum()
        }
    }
}

impl<const D: usize> Mask<D> for EllipseMask<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        self.quadratic_form(p) <= 1.0
    }

    fn outside_box(&self, b: &BoundingBox<D>) -> bool {
        self.bounding_box().disjoint(b)
    }

    fn bounding_box(&self) -> BoundingBox<D> {
        let mut lower = [0.0; D];
        let mut upper = [0.0; D];
        // Conservative: bound by the axis-aligned ellipsoid extent,
        // ignoring correlation (which only shrinks the true footprint).
        for i in 0..D {
            lower[i] = self.center.coord(i) - self.std[i];
            upper[i] = self.center.coord(i) + self.std[i];
        }
        BoundingBox::new(Position::new(lower), Position::new(upper))
    }
}

/// Integer-cell grid mask, valid only against grid layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMask<const D: usize> {
    lower_cell: [i64; D],
    upper_cell: [i64; D],
}

impl<const D: usize> GridMask<D> {
    /// Construct from inclusive lower and exclusive upper cell bounds.
    pub fn new(lower_cell: [i64; D], upper_cell: [i64; D]) -> Self {
        Self {
            lower_cell,
            upper_cell,
        }
    }

    /// True if integer cell `cell` lies within `[lower_cell, upper_cell)`.
    pub fn inside_cell(&self, cell: &[i64; D]) -> bool {
        (0..D).all(|i| cell[i] >= self.lower_cell[i] && cell[i] < self.upper_cell[i])
    }
}

impl<const D: usize> Mask<D> for GridMask<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        let mut cell = [0i64; D];
        for i in 0..D {
            cell[i] = p.coord(i).round() as i64;
        }
        self.inside_cell(&cell)
    }

    fn bounding_box(&self) -> BoundingBox<D> {
        let mut lower = [0.0; D];
        let mut upper = [0.0; D];
        for i in 0..D {
            lower[i] = self.lower_cell[i] as f64;
            upper[i] = self.upper_cell[i] as f64 - 1.0;
        }
        BoundingBox::new(Position::new(lower), Position::new(upper))
    }
}

/// Intersection of two masks: `inside = a AND b`.
#[derive(Debug)]
pub struct Intersection<const D: usize> {
    /// First operand.
    pub a: Box<dyn Mask<D>>,
    /// Second operand.
    pub b: Box<dyn Mask<D>>,
}

impl<const D: usize> Mask<D> for Intersection<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        self.a.inside(p) && self.b.inside(p)
    }
    fn outside_box(&self, bb: &BoundingBox<D>) -> bool {
        self.a.outside_box(bb) || self.b.outside_box(bb)
    }
    fn bounding_box(&self) -> BoundingBox<D> {
        let ba = self.a.bounding_box();
        let bb = self.b.bounding_box();
        let mut lower = [0.0; D];
        let mut upper = [0.0; D];
        for i in 0..D {
            lower[i] = ba.lower.coord(i).max(bb.lower.coord(i));
            upper[i] = ba.upper.coord(i).min(bb.upper.coord(i));
        }
        BoundingBox::new(Position::new(lower), Position::new(upper))
    }
}

/// Union of two masks: `inside = a OR b`.
#[derive(Debug)]
pub struct Union<const D: usize> {
    /// First operand.
    pub a: Box<dyn Mask<D>>,
    /// Second operand.
    pub b: Box<dyn Mask<D>>,
}

impl<const D: usize> Mask<D> for Union<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        self.a.inside(p) || self.b.inside(p)
    }
    fn outside_box(&self, bb: &BoundingBox<D>) -> bool {
        self.a.outside_box(bb) && self.b.outside_box(bb)
    }
    fn bounding_box(&self) -> BoundingBox<D> {
        let ba = self.a.bounding_box();
        let bb = self.b.bounding_box();
        let mut lower = [0.0; D];
        let mut upper = [0.0; D];
        for i in 0..D {
            lower[i] = ba.lower.coord(i).min(bb.lower.coord(i));
            upper[i] = ba.upper.coord(i).max(bb.upper.coord(i));
        }
        BoundingBox::new(Position::new(lower), Position::new(upper))
    }
}

/// Set difference of two masks: `inside = inside(a) AND NOT inside(b)`.
#[derive(Debug)]
pub struct Difference<const D: usize> {
    /// Minuend.
    pub a: Box<dyn Mask<D>>,
    /// Subtrahend.
    pub b: Box<dyn Mask<D>>,
}

impl<const D: usize> Mask<D> for Difference<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        self.a.inside(p) && !self.b.inside(p)
    }
    fn outside_box(&self, bb: &BoundingBox<D>) -> bool {
        self.a.outside_box(bb) || self.b.inside_box(bb)
    }
    fn bounding_box(&self) -> BoundingBox<D> {
        self.a.bounding_box()
    }
}

/// Point-reflected ("converse") mask: `inside(p) = inner.inside(-p)`.
#[derive(Debug)]
pub struct Converse<const D: usize> {
    /// The wrapped mask.
    pub inner: Box<dyn Mask<D>>,
}

impl<const D: usize> Mask<D> for Converse<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        let mut neg = [0.0; D];
        for i in 0..D {
            neg[i] = -p.coord(i);
        }
        self.inner.inside(&Position::new(neg))
    }
    fn bounding_box(&self) -> BoundingBox<D> {
        let bb = self.inner.bounding_box();
        let mut lower = [0.0; D];
        let mut upper = [0.0; D];
        for i in 0..D {
            lower[i] = -bb.upper.coord(i);
            upper[i] = -bb.lower.coord(i);
        }
        BoundingBox::new(Position::new(lower), Position::new(upper))
    }
}

/// A mask translated by `anchor`: `inside(p) = inner.inside(p - anchor)`.
#[derive(Debug)]
pub struct Anchored<const D: usize> {
    /// The wrapped mask.
    pub inner: Box<dyn Mask<D>>,
    /// Translation applied before delegating to `inner`.
    pub anchor: Position<D>,
}

impl<const D: usize> Mask<D> for Anchored<D> {
    fn inside(&self, p: &Position<D>) -> bool {
        self.inner.inside(&(*p - self.anchor))
    }
    fn bounding_box(&self) -> BoundingBox<D> {
        let bb = self.inner.bounding_box();
        BoundingBox::new(bb.lower + self.anchor, bb.upper + self.anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esk_types::Position2;

    #[test]
    fn box_mask_inside_matches_axis_test() {
        let m = BoxMask::axis_aligned(Position2::new([-1.0, -1.0]), Position2::new([1.0, 1.0]));
        assert!(m.inside(&Position2::new([0.5, 0.5])));
        assert!(!m.inside(&Position2::new([1.5, 0.0])));
    }

    #[test]
    fn box_mask_inside_box_requires_all_corners() {
        let m = BoxMask::axis_aligned(Position2::new([-2.0, -2.0]), Position2::new([2.0, 2.0]));
        let inner = BoundingBox::new(Position2::new([-1.0, -1.0]), Position2::new([1.0, 1.0]));
        assert!(m.inside_box(&inner));
        let straddling = BoundingBox::new(Position2::new([-1.0, -1.0]), Position2::new([3.0, 1.0]));
        assert!(!m.inside_box(&straddling));
    }

    #[test]
    fn ball_mask_rejects_nonpositive_radius() {
        assert!(BallMask::new(Position2::origin(), 0.0).is_err());
    }

    #[test]
    fn ball_outside_box_true_when_box_is_far() {
        let m = BallMask::new(Position2::origin(), 1.0).unwrap();
        let far = BoundingBox::new(Position2::new([10.0, 10.0]), Position2::new([11.0, 11.0]));
        assert!(m.outside_box(&far));
        let near = BoundingBox::new(Position2::new([0.0, 0.0]), Position2::new([0.5, 0.5]));
        assert!(!m.outside_box(&near));
    }

    #[test]
    fn ellipse_mask_rejects_invalid_std_or_rho() {
        assert!(EllipseMask::new(Position2::origin(), [0.0, 1.0], 0.0).is_err());
        assert!(EllipseMask::new(Position2::origin(), [1.0, 1.0], 1.0).is_err());
    }

    #[test]
    fn ellipse_inside_circle_case() {
        let m = EllipseMask::new(Position2::origin(), [2.0, 2.0], 0.0).unwrap();
        assert!(m.inside(&Position2::new([1.0, 1.0])));
        assert!(!m.inside(&Position2::new([3.0, 0.0])));
    }

    #[test]
    fn intersection_is_and_of_children() {
        let a: Box<dyn Mask<2>> =
            Box::new(BallMask::new(Position2::origin(), 2.0).unwrap());
        let b: Box<dyn Mask<2>> = Box::new(BoxMask::axis_aligned(
            Position2::new([0.0, -2.0]),
            Position2::new([2.0, 2.0]),
        ));
        let inter = Intersection { a, b };
        assert!(inter.inside(&Position2::new([1.0, 0.0])));
        assert!(!inter.inside(&Position2::new([-1.0, 0.0]))); // outside box half
    }

    #[test]
    fn converse_reflects_through_origin() {
        let inner: Box<dyn Mask<2>> = Box::new(BoxMask::axis_aligned(
            Position2::new([0.0, 0.0]),
            Position2::new([1.0, 1.0]),
        ));
        let conv = Converse { inner };
        assert!(conv.inside(&Position2::new([-0.5, -0.5])));
        assert!(!conv.inside(&Position2::new([0.5, 0.5])));
    }

    #[test]
    fn anchored_translates_the_test_point() {
        let inner: Box<dyn Mask<2>> =
            Box::new(BallMask::new(Position2::origin(), 1.0).unwrap());
        let anchored = Anchored {
            inner,
            anchor: Position2::new([5.0, 5.0]),
        };
        assert!(anchored.inside(&Position2::new([5.5, 5.0])));
        assert!(!anchored.inside(&Position2::new([0.5, 0.0])));
    }
}
