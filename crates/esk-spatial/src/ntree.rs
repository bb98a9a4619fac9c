//! D-dimensional recursive spatial index.
//!
//! Each leaf holds `(position, payload)` pairs; a leaf splits into `2^D`
//! children once it exceeds `max_leaf_capacity` and `max_depth` has not yet
//! been reached. The masked iterator ([`NTree::iter_masked`]) is the
//! performance-critical traversal: it tracks whether the current subtree is
//! still only partially covered by the mask ("open") or has already been
//! proven fully covered ("all-in"), per the state machine  and
//! design note "N-tree iterator state machine".

use esk_types::Position;

use crate::bbox::BoundingBox;
use crate::mask::Mask;

/// Default maximum number of `(position, payload)` pairs per leaf before a
/// split is triggered.
pub const DEFAULT_MAX_LEAF_CAPACITY: usize = 100;
/// Default maximum recursion depth.
pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Clone)]
enum Node<const D: usize, P> {
    Leaf(Vec<(Position<D>, P)>),
    Branch(Vec<Node<D, P>>),
}

/// A recursive subdivision of `D`-space into `2^D` children per level.
#[derive(Debug, Clone)]
pub struct NTree<const D: usize, P> {
    root: Node<D, P>,
    region: BoundingBox<D>,
    max_leaf_capacity: usize,
    max_depth: usize,
    /// Per-axis periodicity; an inserted position is folded into `region`
    /// before insertion when its axis is periodic.
    periodic: [bool; D],
}

impl<const D: usize, P> NTree<D, P> {
    /// Construct an empty tree over `region` with the default capacity and
    /// depth limits and no periodicity.
    pub fn new(region: BoundingBox<D>) -> Self {
        Self::with_limits(
            region,
            DEFAULT_MAX_LEAF_CAPACITY,
            DEFAULT_MAX_DEPTH,
            [false; D],
        )
    }

    /// Construct with explicit capacity/depth limits and periodicity.
    pub fn with_limits(
        region: BoundingBox<D>,
        max_leaf_capacity: usize,
        max_depth: usize,
        periodic: [bool; D],
    ) -> Self {
        Self {
            root: Node::Leaf(Vec::new()),
            region,
            max_leaf_capacity,
            max_depth,
            periodic,
        }
    }

    /// The tree's overall region.
    pub fn region(&self) -> &BoundingBox<D> {
        &self.region
    }

    /// Fold `p` into the tree's canonical region along periodic axes.
    fn canonical(&self, p: &Position<D>) -> Position<D> {
        let mut out = [0.0; D];
        for i in 0..D {
            let c = p.coord(i);
            out[i] = if self.periodic[i] {
                let lo = self.region.lower.coord(i);
                let size = self.region.upper.coord(i) - lo;
                if size > 0.0 {
                    lo + (c - lo).rem_euclid(size)
                } else {
                    c
                }
            } else {
                c
            };
        }
        Position::new(out)
    }

    /// Insert `(position, payload)`. The position is folded into the
    /// canonical region first if any axis is periodic.
    pub fn insert(&mut self, position: Position<D>, payload: P) {
        let canon = self.canonical(&position);
        Self::insert_into(
            &mut self.root,
            self.region,
            canon,
            payload,
            0,
            self.max_leaf_capacity,
            self.max_depth,
        );
    }

    fn insert_into(
        node: &mut Node<D, P>,
        region: BoundingBox<D>,
        position: Position<D>,
        payload: P,
        depth: usize,
        max_leaf_capacity: usize,
        max_depth: usize,
    ) {
        match node {
            Node::Branch(children) => {
                let idx = region.child_index(&position);
                let child_region = region.split()[idx];
                Self::insert_into(
                    &mut children[idx],
                    child_region,
                    position,
                    payload,
                    depth + 1,
                    max_leaf_capacity,
                    max_depth,
                );
            }
            Node::Leaf(items) => {
                items.push((position, payload));
                if items.len() > max_leaf_capacity && depth < max_depth {
                    let drained = std::mem::take(items);
                    let sub_regions = region.split();
                    let mut children: Vec<Node<D, P>> =
                        sub_regions.iter().map(|_| Node::Leaf(Vec::new())).collect();
                    for (pos, val) in drained {
                        let idx = region.child_index(&pos);
                        Self::insert_into(
                            &mut children[idx],
                            sub_regions[idx],
                            pos,
                            val,
                            depth + 1,
                            max_leaf_capacity,
                            max_depth,
                        );
                    }
                    *node = Node::Branch(children);
                }
            }
        }
    }

    /// Total number of `(position, payload)` pairs stored.
    pub fn len(&self) -> usize {
        Self::count(&self.root)
    }

    /// True if the tree holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn count(node: &Node<D, P>) -> usize {
        match node {
            Node::Leaf(items) => items.len(),
            Node::Branch(children) => children.iter().map(Self::count).sum(),
        }
    }

    /// Every point lies within its leaf's region: used by invariant tests.
    pub fn check_leaf_invariant(&self) -> bool {
        Self::check_node(&self.root, self.region)
    }

    fn check_node(node: &Node<D, P>, region: BoundingBox<D>) -> bool {
        match node {
            Node::Leaf(items) => items.iter().all(|(p, _)| region.contains(p)),
            Node::Branch(children) => {
                let sub = region.split();
                children
                    .iter()
                    .zip(sub.iter())
                    .all(|(c, r)| Self::check_node(c, *r))
            }
        }
    }

    /// Iterate every stored `(position, &payload)` pair (full traversal).
    pub fn iter_all(&self) -> impl Iterator<Item = (&Position<D>, &P)> {
        let mut out = Vec::new();
        Self::collect_all(&self.root, &mut out);
        out.into_iter()
    }

    fn collect_all<'a>(node: &'a Node<D, P>, out: &mut Vec<(&'a Position<D>, &'a P)>) {
        match node {
            Node::Leaf(items) => {
                out.extend(items.iter().map(|(p, v)| (p, v)));
            }
            Node::Branch(children) => {
                for c in children {
                    Self::collect_all(c, out);
                }
            }
        }
    }

    /// Number of periodic image anchors of `mask`'s bounding box that
    /// intersect the tree region.
    fn image_anchors(&self, mask_bb: &BoundingBox<D>) -> Vec<Position<D>> {
        let mut ranges: Vec<Vec<f64>> = Vec::with_capacity(D);
        for i in 0..D {
            if !self.periodic[i] {
                ranges.push(vec![0.0]);
                continue;
            }
            let size = self.region.upper.coord(i) - self.region.lower.coord(i);
            let mut offsets = vec![0.0];
            // A mask extending past the region on this axis needs the
            // neighboring image to also be tried.
            if mask_bb.lower.coord(i) < self.region.lower.coord(i) {
                offsets.push(size);
            }
            if mask_bb.upper.coord(i) > self.region.upper.coord(i) {
                offsets.push(-size);
            }
            ranges.push(offsets);
        }
        let mut anchors = vec![[0.0; D]];
        for i in 0..D {
            let mut next = Vec::new();
            for base in &anchors {
                for off in &ranges[i] {
                    let mut v = *base;
                    v[i] = *off;
                    next.push(v);
                }
            }
            anchors = next;
        }
        anchors.into_iter().map(Position::new).collect()
    }

    /// Iterate every `(position, &payload)` pair whose point, tested
    /// against `mask` anchored at `anchor`, lies inside the mask. Under
    /// periodicity, every image anchor intersecting the tree region is
    /// enumerated and iterated in turn.
    pub fn iter_masked<'a>(
        &'a self,
        mask: &'a dyn Mask<D>,
        anchor: Position<D>,
    ) -> impl Iterator<Item = (Position<D>, &'a P)> + 'a {
        let mask_bb = mask.bounding_box();
        let mut shifted_bb = mask_bb;
        shifted_bb.lower = shifted_bb.lower + anchor;
        shifted_bb.upper = shifted_bb.upper + anchor;

        let anchors = self.image_anchors(&shifted_bb);
        let mut out = Vec::new();
        for image_offset in anchors {
            let image_anchor = anchor + image_offset;
            Self::collect_masked(
                &self.root,
                self.region,
                mask,
                &image_anchor,
                &mut out,
            );
        }
        out.into_iter()
    }

    fn collect_masked<'a>(
        node: &'a Node<D, P>,
        region: BoundingBox<D>,
        mask: &dyn Mask<D>,
        anchor: &Position<D>,
        out: &mut Vec<(Position<D>, &'a P)>,
    ) {
        let relative = BoundingBox::new(region.lower - *anchor, region.upper - *anchor);
        if mask.outside_box(&relative) {
            return;
        }
        let all_in = mask.inside_box(&relative);
        match node {
            Node::Leaf(items) => {
                for (p, v) in items {
                    if all_in || mask.inside(&(*p - *anchor)) {
                        out.push((*p, v));
                    }
                }
            }
            Node::Branch(children) => {
                let sub = region.split();
                for (c, r) in children.iter().zip(sub.iter()) {
                    if all_in {
                        Self::collect_all_with_anchor(c, out);
                    } else {
                        Self::collect_masked(c, *r, mask, anchor, out);
                    }
                }
            }
        }
    }

    fn collect_all_with_anchor<'a>(node: &'a Node<D, P>, out: &mut Vec<(Position<D>, &'a P)>) {
        match node {
            Node::Leaf(items) => {
                out.extend(items.iter().map(|(p, v)| (*p, v)));
            }
            Node::Branch(children) => {
                for c in children {
                    Self::collect_all_with_anchor(c, out);
                }
            }
        }
    }
}
