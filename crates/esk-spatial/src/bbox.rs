//! Axis-aligned D-dimensional bounding boxes, shared by masks and the
//! n-tree.

use esk_types::Position;

/// An axis-aligned box `[lower, upper]` (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox<const D: usize> {
    /// Lower corner (minimum coordinate per axis).
    pub lower: Position<D>,
    /// Upper corner (maximum coordinate per axis).
    pub upper: Position<D>,
}

impl<const D: usize> BoundingBox<D> {
    /// Construct from corners.
    pub const fn new(lower: Position<D>, upper: Position<D>) -> Self {
        Self { lower, upper }
    }

    /// All `2^D` corners of the box, each axis independently taking its
    /// lower or upper bound.
    pub fn corners(&self) -> Vec<Position<D>> {
        let mut out = Vec::with_capacity(1 << D);
        for mask in 0..(1usize << D) {
            let mut c = [0.0; D];
            for i in 0..D {
                c[i] = if mask & (1 << i) != 0 {
                    self.upper.coord(i)
                } else {
                    self.lower.coord(i)
                };
            }
            out.push(Position::new(c));
        }
        out
    }

    /// True if `p` lies within the box (inclusive bounds).
    pub fn contains(&self, p: &Position<D>) -> bool {
        (0..D).all(|i| p.coord(i) >= self.lower.coord(i) && p.coord(i) <= self.upper.coord(i))
    }

    /// True if `self` and `other` share no interior or boundary point,
    /// i.e. are separated along at least one axis.
    pub fn disjoint(&self, other: &Self) -> bool {
        (0..D).any(|i| {
            self.upper.coord(i) < other.lower.coord(i) || self.lower.coord(i) > other.upper.coord(i)
        })
    }

    /// True if `other` lies entirely within `self`.
    pub fn contains_box(&self, other: &Self) -> bool {
        (0..D).all(|i| {
            other.lower.coord(i) >= self.lower.coord(i) && other.upper.coord(i) <= self.upper.coord(i)
        })
    }

    /// Geometric center of the box.
    pub fn center(&self) -> Position<D> {
        let mut c = [0.0; D];
        for i in 0..D {
            c[i] = 0.5 * (self.lower.coord(i) + self.upper.coord(i));
        }
        Position::new(c)
    }

    /// Half-extent (half the side length) along each axis.
    pub fn half_extent(&self) -> [f64; D] {
        let mut h = [0.0; D];
        for i in 0..D {
            h[i] = 0.5 * (self.upper.coord(i) - self.lower.coord(i));
        }
        h
    }

    /// Smallest distance from `p` to the box (zero if `p` is inside).
    pub fn distance_to(&self, p: &Position<D>) -> f64 {
        let mut acc = 0.0;
        for i in 0..D {
            let c = p.coord(i);
            let d = if c < self.lower.coord(i) {
                self.lower.coord(i) - c
            } else if c > self.upper.coord(i) {
                c - self.upper.coord(i)
            } else {
                0.0
            };
            acc += d * d;
        }
        acc.sqrt()
    }

    /// Split this box into its `2^D` equal-sized children (n-tree
    /// subdivision), ordered by the same bit convention as [`Self::corners`].
    pub fn split(&self) -> Vec<Self> {
        let center = self.center();
        let mut out = Vec::with_capacity(1 << D);
        for mask in 0..(1usize << D) {
            let mut lower = [0.0; D];
            let mut upper = [0.0; D];
            for i in 0..D {
                if mask & (1 << i) != 0 {
                    lower[i] = center.coord(i);
                    upper[i] = self.upper.coord(i);
                } else {
                    lower[i] = self.lower.coord(i);
                    upper[i] = center.coord(i);
                }
            }
            out.push(Self::new(Position::new(lower), Position::new(upper)));
        }
        out
    }

    /// Index of the child quadrant (per [`Self::split`]'s ordering)
    /// containing `p`.
    pub fn child_index(&self, p: &Position<D>) -> usize {
        let center = self.center();
        let mut idx = 0;
        for i in 0..D {
            if p.coord(i) >= center.coord(i) {
                idx |= 1 << i;
            }
        }
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esk_types::Position2;

    #[test]
    fn corners_of_unit_square_are_the_four_corners() {
        let bb = BoundingBox::new(Position2::new([0.0, 0.0]), Position2::new([1.0, 1.0]));
        let corners = bb.corners();
        assert_eq!(corners.len(), 4);
        assert!(corners.contains(&Position2::new([0.0, 0.0])));
        assert!(corners.contains(&Position2::new([1.0, 1.0])));
    }

    #[test]
    fn disjoint_detects_separation_on_either_axis() {
        let a = BoundingBox::new(Position2::new([0.0, 0.0]), Position2::new([1.0, 1.0]));
        let b = BoundingBox::new(Position2::new([2.0, 0.0]), Position2::new([3.0, 1.0]));
        assert!(a.disjoint(&b));
        let c = BoundingBox::new(Position2::new([0.5, 0.5]), Position2::new([1.5, 1.5]));
        assert!(!a.disjoint(&c));
    }

    #[test]
    fn split_produces_four_quadrants_in_2d() {
        let bb = BoundingBox::new(Position2::new([0.0, 0.0]), Position2::new([2.0, 2.0]));
        let children = bb.split();
        assert_eq!(children.len(), 4);
        for child in &children {
            assert!(bb.contains_box(child));
        }
    }
}
