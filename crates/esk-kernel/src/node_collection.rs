//! Ordered sets of node identities.

use std::collections::HashMap;

use esk_types::NodeId;

/// A metadata value attached to a collection (e.g. a layer reference
/// recorded by name, or a numeric tag).
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// Free-form text, typically a layer or model name.
    Text(String),
    /// A numeric tag.
    Number(f64),
}

/// An ordered set of node identities: primitive (contiguous, built from a
/// single range) or composite (built from concatenation or an arbitrary
/// explicit list).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCollection {
    ids: Vec<NodeId>,
    primitive: bool,
    step: usize,
    metadata: HashMap<String, MetadataValue>,
}

impl NodeCollection {
    /// The empty collection. Per  boundary behavior, it is
    /// primitive and reports step size `1`.
    pub fn empty() -> Self {
        Self {
            ids: Vec::new(),
            primitive: true,
            step: 1,
            metadata: HashMap::new(),
        }
    }

    /// A contiguous primitive collection of `count` ids starting at `first`.
    pub fn from_range(first: NodeId, count: usize) -> Self {
        let ids = (0..count as u64)
            .map(|i| NodeId::new(first.raw() + i))
            .collect();
        Self {
            ids,
            primitive: true,
            step: 1,
            metadata: HashMap::new(),
        }
    }

    /// A composite collection from an explicit, possibly unsorted, list.
    pub fn from_ids(ids: Vec<NodeId>) -> Self {
        Self {
            ids,
            primitive: false,
            step: 1,
            metadata: HashMap::new(),
        }
    }

    /// Number of ids in the collection.
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    /// True if the collection has no elements.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True if the collection is a single contiguous, unsliced range.
    pub fn is_primitive(&self) -> bool {
        self.primitive
    }

    /// The step size of the most recent slicing applied (`1` if none).
    pub fn step(&self) -> usize {
        self.step
    }

    /// The id at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.ids.get(index).copied()
    }

    /// A new collection over `self[start..stop]` keeping only every
    /// `step`-th element.
    pub fn slice(&self, start: usize, stop: usize, step: usize) -> Self {
        let stop = stop.min(self.ids.len());
        let sliced: Vec<NodeId> = if start >= stop {
            Vec::new()
        } else {
            self.ids[start..stop].iter().step_by(step.max(1)).copied().collect()
        };
        Self {
            ids: sliced,
            primitive: self.primitive && step <= 1 && start == 0 && stop == self.ids.len(),
            step: step.max(1),
            metadata: self.metadata.clone(),
        }
    }

    /// Concatenate with `other`, sorting and de-duplicating the combined
    /// identity set (, "set concatenation (with sort+merge)").
    pub fn concatenate(&self, other: &Self) -> Self {
        let mut ids: Vec<NodeId> = self.ids.iter().chain(other.ids.iter()).copied().collect();
        ids.sort_unstable();
        ids.dedup();
        Self {
            ids,
            primitive: false,
            step: 1,
            metadata: HashMap::new(),
        }
    }

    /// Attach or overwrite a metadata entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.metadata.insert(key.into(), value);
    }

    /// Read a metadata entry.
    pub fn metadata(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Iterate every id in order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids.iter().copied()
    }

    /// The subset owned by the local rank, per `owner`.
    pub fn local(&self, owner: impl Fn(NodeId) -> bool) -> Self {
        Self::from_ids(self.ids.iter().copied().filter(|n| owner(*n)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_is_primitive_with_unit_step() {
        let c = NodeCollection::empty();
        assert!(c.is_primitive());
        assert_eq!(c.step(), 1);
        assert_eq!(c.size(), 0);
    }

    #[test]
    fn sliced_collection_yields_every_kth_element() {
        let c = NodeCollection::from_range(NodeId::new(1), 10);
        let sliced = c.slice(0, 10, 3);
        let ids: Vec<u64> = sliced.iter().map(|n| n.raw()).collect();
        assert_eq!(ids, vec![1, 4, 7, 10]);
    }

    #[test]
    fn concatenate_sorts_and_dedups() {
        let a = NodeCollection::from_ids(vec![NodeId::new(3), NodeId::new(1)]);
        let b = NodeCollection::from_ids(vec![NodeId::new(1), NodeId::new(2)]);
        let merged = a.concatenate(&b);
        let ids: Vec<u64> = merged.iter().map(|n| n.raw()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!merged.is_primitive());
    }

    #[test]
    fn metadata_round_trips() {
        let mut c = NodeCollection::from_range(NodeId::new(1), 4);
        c.set_metadata("layer", MetadataValue::Text("grid-0".into()));
        assert_eq!(
            c.metadata("layer"),
            Some(&MetadataValue::Text("grid-0".into()))
        );
        assert_eq!(c.metadata("missing"), None);
    }

    #[test]
    fn local_filters_by_ownership_predicate() {
        let c = NodeCollection::from_range(NodeId::new(1), 6);
        let owned = c.local(|n| n.raw() % 2 == 0);
        let ids: Vec<u64> = owned.iter().map(|n| n.raw()).collect();
        assert_eq!(ids, vec![2, 4, 6]);
    }
}
