//! Spatially embedded node layers: a grid
//! layer derives node positions from integer row-major indices, a free
//! layer stores each node's position explicitly.

use esk_types::{Extent, NodeId, Position};

/// A regular grid layer: node `i` at row-major multi-index `idx` sits at
/// `lower_left + idx .* spacing`, per-axis optionally periodic.
#[derive(Debug, Clone)]
pub struct GridLayer<const D: usize> {
    lower_left: Position<D>,
    shape: [usize; D],
    spacing: [f64; D],
    extent: Extent<D>,
    first_node: NodeId,
}

impl<const D: usize> GridLayer<D> {
    /// Construct a grid layer of `shape` nodes per axis, spaced by
    /// `spacing`, with node ids starting at `first_node`.
    pub fn new(
        lower_left: Position<D>,
        shape: [usize; D],
        spacing: [f64; D],
        periodic: [bool; D],
        first_node: NodeId,
    ) -> Self {
        let mut size = [0.0; D];
        for i in 0..D {
            size[i] = spacing[i] * shape[i] as f64;
        }
        let mut extent = Extent::new(size);
        extent.periodic = periodic;
        Self {
            lower_left,
            shape,
            spacing,
            extent,
            first_node,
        }
    }

    /// Total number of nodes in the layer.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// True if the layer has no nodes (a zero-length axis).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The layer's extent (size and periodicity), shared with displacement
    /// and masking computations.
    pub fn extent(&self) -> &Extent<D> {
        &self.extent
    }

    /// Row-major multi-index of `node`, if it belongs to this layer.
    fn multi_index(&self, node: NodeId) -> Option<[usize; D]> {
        let offset = node.raw().checked_sub(self.first_node.raw())? as usize;
        if offset >= self.len() {
            return None;
        }
        let mut idx = [0usize; D];
        let mut rem = offset;
        for i in (0..D).rev() {
            idx[i] = rem % self.shape[i];
            rem /= self.shape[i];
        }
        Some(idx)
    }

    /// The position of `node`, if it belongs to this layer.
    pub fn position_of(&self, node: NodeId) -> Option<Position<D>> {
        let idx = self.multi_index(node)?;
        let mut c = [0.0; D];
        for i in 0..D {
            c[i] = self.lower_left.coord(i) + (idx[i] as f64 + 0.5) * self.spacing[i];
        }
        Some(Position::new(c))
    }

    /// Iterate every `(node, position)` pair in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Position<D>)> + '_ {
        (0..self.len()).map(move |offset| {
            let node = NodeId::new(self.first_node.raw() + offset as u64);
            (node, self.position_of(node).expect("offset is in range"))
        })
    }
}

/// A layer whose node positions are arbitrary and explicitly stored.
#[derive(Debug, Clone)]
pub struct FreeLayer<const D: usize> {
    positions: Vec<(NodeId, Position<D>)>,
    extent: Extent<D>,
}

impl<const D: usize> FreeLayer<D> {
    /// Construct from explicit `(node, position)` pairs and a shared extent
    /// used for periodic displacement and bounding.
    pub fn new(positions: Vec<(NodeId, Position<D>)>, extent: Extent<D>) -> Self {
        Self { positions, extent }
    }

    /// Number of nodes in the layer.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True if the layer has no nodes.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The layer's extent.
    pub fn extent(&self) -> &Extent<D> {
        &self.extent
    }

    /// The position of `node`, if present.
    pub fn position_of(&self, node: NodeId) -> Option<Position<D>> {
        self.positions
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, p)| *p)
    }

    /// Iterate every `(node, position)` pair in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Position<D>)> + '_ {
        self.positions.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_layer_centers_cells_and_is_row_major() {
        let layer = GridLayer::new(
            Position::new([0.0, 0.0]),
            [2, 3],
            [1.0, 1.0],
            [false, false],
            NodeId::new(1),
        );
        assert_eq!(layer.len(), 6);
        let p0 = layer.position_of(NodeId::new(1)).unwrap();
        assert_eq!(p0, Position::new([0.5, 0.5]));
        let p_last = layer.position_of(NodeId::new(6)).unwrap();
        assert_eq!(p_last, Position::new([1.5, 2.5]));
        assert!(layer.position_of(NodeId::new(7)).is_none());
    }

    #[test]
    fn grid_layer_iter_visits_every_node_once() {
        let layer = GridLayer::new(
            Position::new([0.0, 0.0]),
            [3, 3],
            [1.0, 1.0],
            [false, false],
            NodeId::new(10),
        );
        let all: Vec<_> = layer.iter().collect();
        assert_eq!(all.len(), 9);
        assert_eq!(all[0].0, NodeId::new(10));
        assert_eq!(all.last().unwrap().0, NodeId::new(18));
    }

    #[test]
    fn free_layer_looks_up_by_node_id() {
        let layer = FreeLayer::new(
            vec![
                (NodeId::new(1), Position::new([0.1, 0.2])),
                (NodeId::new(2), Position::new([0.3, 0.4])),
            ],
            Extent::new([1.0, 1.0]),
        );
        assert_eq!(layer.position_of(NodeId::new(2)), Some(Position::new([0.3, 0.4])));
        assert_eq!(layer.position_of(NodeId::new(3)), None);
        assert_eq!(layer.len(), 2);
    }
}
