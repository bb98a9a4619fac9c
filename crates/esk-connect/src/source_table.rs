//! Per-thread presynaptic source registry used during connection building.

use std::collections::HashMap;

use esk_types::{NodeId, SynapseModelId, ThreadId};

/// One recorded presynaptic identity: the source node and whether it has
/// already been communicated to every rank that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    /// The presynaptic node id.
    pub node: NodeId,
    /// True once this entry has been sent and need not be revisited.
    pub processed: bool,
}

impl Source {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            processed: false,
        }
    }
}

/// A record ready to be packed into the communication buffer, as produced by
/// [`SourceTable::get_next_target_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetData {
    /// Owning thread of the row this entry came from.
    pub thread: ThreadId,
    /// Synapse model of the row.
    pub syn_id: SynapseModelId,
    /// Position within the row (used to restore the cursor on rejection).
    pub index: usize,
    /// The presynaptic node.
    pub node: NodeId,
}

/// Cursor position within one thread's source table, saved and restored
/// across communication rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryPoint {
    row: usize,
    index: usize,
}

/// Three-dimensional `(thread, syn_id, local-index) -> Source` registry.
///
/// Synapse-id to row-index mapping is thread-local and grows lazily as new
/// synapse models are first seen on a thread.
#[derive(Debug, Default)]
pub struct SourceTable {
    threads: HashMap<ThreadId, ThreadRows>,
}

#[derive(Debug, Default)]
struct ThreadRows {
    row_index: HashMap<SynapseModelId, usize>,
    rows: Vec<(SynapseModelId, Vec<Source>)>,
    cursor: EntryPoint,
    saved: Option<EntryPoint>,
}

impl ThreadRows {
    fn row_mut(&mut self, syn_id: SynapseModelId) -> &mut Vec<Source> {
        let idx = *self.row_index.entry(syn_id).or_insert_with(|| {
            self.rows.push((syn_id, Vec::new()));
            self.rows.len() - 1
        });
        &mut self.rows[idx].1
    }
}

impl SourceTable {
    /// Construct an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `node` to the row for `(tid, syn_id)`, growing the row lazily.
    pub fn add_source(&mut self, tid: ThreadId, syn_id: SynapseModelId, node: NodeId) {
        let thread = self.threads.entry(tid).or_default();
        thread.row_mut(syn_id).push(Source::new(node));
    }

    /// Number of entries recorded for `tid` across every synapse model.
    pub fn len(&self, tid: ThreadId) -> usize {
        self.threads
            .get(&tid)
            .map(|t| t.rows.iter().map(|(_, r)| r.len()).sum())
            .unwrap_or(0)
    }

    /// Advance `tid`'s cursor by one entry and return it as a to-be-sent
    /// record, or `None` once every row has been visited.
    pub fn get_next_target_data(&mut self, tid: ThreadId) -> Option<TargetData> {
        let thread = self.threads.get_mut(&tid)?;
        loop {
            let (row_idx, index) = (thread.cursor.row, thread.cursor.index);
            let (syn_id, row) = thread.rows.get(row_idx)?;
            if index >= row.len() {
                thread.cursor.row += 1;
                thread.cursor.index = 0;
                continue;
            }
            let node = row[index].node;
            let syn_id = *syn_id;
            thread.cursor.index += 1;
            return Some(TargetData {
                thread: tid,
                syn_id,
                index,
                node,
            });
        }
    }

    /// Undo the last [`Self::get_next_target_data`] call for `tid`, moving
    /// the cursor back by one entry (used when the send buffer overflows).
    pub fn reject(&mut self, tid: ThreadId) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            if thread.cursor.index > 0 {
                thread.cursor.index -= 1;
            } else if thread.cursor.row > 0 {
                thread.cursor.row -= 1;
                let len = thread.rows[thread.cursor.row].1.len();
                thread.cursor.index = len.saturating_sub(1);
            }
        }
    }

    /// Mark the entry at `(tid, syn_id, index)` as processed.
    pub fn mark_processed(&mut self, tid: ThreadId, syn_id: SynapseModelId, index: usize) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            if let Some(&row_idx) = thread.row_index.get(&syn_id) {
                if let Some(entry) = thread.rows[row_idx].1.get_mut(index) {
                    entry.processed = true;
                }
            }
        }
    }

    /// Save `tid`'s cursor position.
    pub fn save_entry_point(&mut self, tid: ThreadId) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.saved = Some(thread.cursor);
        }
    }

    /// Restore `tid`'s cursor to its last saved position.
    pub fn restore_entry_point(&mut self, tid: ThreadId) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            if let Some(saved) = thread.saved {
                thread.cursor = saved;
            }
        }
    }

    /// Reset `tid`'s cursor to the start of the table.
    pub fn reset_entry_point(&mut self, tid: ThreadId) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.cursor = EntryPoint::default();
        }
    }

    /// Compact out rows (and within-row entries) that are entirely
    /// processed, for `tid`. Re-applying `clean` on a fully processed table
    /// leaves it empty.
    pub fn clean(&mut self, tid: ThreadId) {
        if let Some(thread) = self.threads.get_mut(&tid) {
            thread.rows.retain_mut(|(_, row)| {
                row.retain(|s| !s.processed);
                !row.is_empty()
            });
            thread.row_index = thread
                .rows
                .iter()
                .enumerate()
                .map(|(i, (syn_id, _))| (*syn_id, i))
                .collect();
            thread.cursor = EntryPoint::default();
        }
    }

    /// Release every entry for `tid` and its row index, as done once the
    /// build phase completes.
    pub fn clear(&mut self, tid: ThreadId) {
        self.threads.remove(&tid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid() -> ThreadId {
        ThreadId::new(0)
    }

    #[test]
    fn add_and_iterate_in_insertion_order() {
        let mut t = SourceTable::new();
        t.add_source(tid(), SynapseModelId::new(1), NodeId::new(10));
        t.add_source(tid(), SynapseModelId::new(1), NodeId::new(11));
        t.add_source(tid(), SynapseModelId::new(2), NodeId::new(20));

        let a = t.get_next_target_data(tid()).unwrap();
        let b = t.get_next_target_data(tid()).unwrap();
        let c = t.get_next_target_data(tid()).unwrap();
        assert_eq!(a.node, NodeId::new(10));
        assert_eq!(b.node, NodeId::new(11));
        assert_eq!(c.node, NodeId::new(20));
        assert!(t.get_next_target_data(tid()).is_none());
    }

    #[test]
    fn reject_restores_cursor_by_one() {
        let mut t = SourceTable::new();
        t.add_source(tid(), SynapseModelId::new(1), NodeId::new(10));
        t.add_source(tid(), SynapseModelId::new(1), NodeId::new(11));

        let first = t.get_next_target_data(tid()).unwrap();
        t.reject(tid());
        let again = t.get_next_target_data(tid()).unwrap();
        assert_eq!(first.node, again.node);
    }

    #[test]
    fn clean_on_fully_processed_table_produces_empty_table() {
        let mut t = SourceTable::new();
        t.add_source(tid(), SynapseModelId::new(1), NodeId::new(10));
        t.add_source(tid(), SynapseModelId::new(1), NodeId::new(11));
        t.mark_processed(tid(), SynapseModelId::new(1), 0);
        t.mark_processed(tid(), SynapseModelId::new(1), 1);
        t.clean(tid());
        assert_eq!(t.len(tid()), 0);
        // re-applying clean is a no-op on an already-empty table
        t.clean(tid());
        assert_eq!(t.len(tid()), 0);
    }

    #[test]
    fn save_and_restore_entry_point_resumes_a_round() {
        let mut t = SourceTable::new();
        for i in 0..5 {
            t.add_source(tid(), SynapseModelId::new(1), NodeId::new(100 + i));
        }
        t.get_next_target_data(tid());
        t.get_next_target_data(tid());
        t.save_entry_point(tid());
        t.get_next_target_data(tid());
        t.restore_entry_point(tid());
        let resumed = t.get_next_target_data(tid()).unwrap();
        assert_eq!(resumed.node, NodeId::new(102));
    }

    #[test]
    fn clear_releases_the_thread_entirely() {
        let mut t = SourceTable::new();
        t.add_source(tid(), SynapseModelId::new(1), NodeId::new(10));
        t.clear(tid());
        assert_eq!(t.len(tid()), 0);
        assert!(t.get_next_target_data(tid()).is_none());
    }
}
