//! Off-grid spike queue for precise-timing models.
//!
//! Modeled on `nestkernel/slice_ring_buffer.{h,cpp}`: events are appended
//! unsorted as they arrive (`add_spike`, a cheap push), then sorted once
//! per slice by [`SliceRingBuffer::prepare_delivery`] so that
//! [`SliceRingBuffer::get_next_spike`] can pop them off in increasing
//! temporal order from the back of the vector.

use smallvec::SmallVec;

/// A single off-grid spike arrival: integer step stamp, sub-step offset in
/// `[0, h)`, and weight.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SpikeInfo {
    stamp: i64,
    offset: f64,
    weight: f64,
}

impl SpikeInfo {
    /// Ordering key used to sort "first event last": greatest
    /// `(stamp, offset)` sorts first, so the earliest event ends up at
    /// the back of the vector where `Vec::pop` is O(1).
    fn key(&self) -> (i64, ordered_f64::OrderedF64) {
        (self.stamp, ordered_f64::OrderedF64(self.offset))
    }
}

/// A tiny total-order wrapper so `f64` offsets can be compared for
/// sorting; spike offsets are always finite (`[0, h)`), so `NaN` never
/// appears here.
mod ordered_f64 {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct OrderedF64(pub f64);
    impl Eq for OrderedF64 {}
    impl PartialOrd for OrderedF64 {
        fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for OrderedF64 {
        fn cmp(&self, other: &Self) -> core::cmp::Ordering {
            self.0.partial_cmp(&other.0).unwrap_or(core::cmp::Ordering::Equal)
        }
    }
}

/// Sentinel stamp meaning "no return-from-refractoriness event scheduled".
const NO_REFRACT: i64 = i64::MAX;

/// Result of popping the next due event from a [`SliceRingBuffer`] slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextSpike {
    /// Sub-step offset of the event.
    pub ps_offset: f64,
    /// Total weight (possibly the sum of several coincident spikes).
    pub weight: f64,
    /// True if this is the return-from-refractoriness pseudo-event rather
    /// than a real spike.
    pub end_of_refract: bool,
}

/// Per-neuron queue of off-grid spike arrivals, one slot per relative
/// delivery step within the simulator's delay-slice pseudo-ring.
#[derive(Debug, Clone)]
pub struct SliceRingBuffer {
    queue: Vec<SmallVec<[SpikeInfo; 2]>>,
    refract: Option<SpikeInfo>,
}

impl SliceRingBuffer {
    /// Construct a buffer with `n_slots = ceil((min_delay + max_delay) /
    /// min_delay)` slots, per the original's `resize()`.
    pub fn new(min_delay: usize, max_delay: usize) -> Self {
        let n_slots = Self::slot_count(min_delay, max_delay);
        Self {
            queue: vec![SmallVec::new(); n_slots],
            refract: None,
        }
    }

    fn slot_count(min_delay: usize, max_delay: usize) -> usize {
        assert!(min_delay > 0, "min_delay must be positive");
        ((min_delay + max_delay) + min_delay - 1) / min_delay
    }

    /// Resize to match new `min_delay`/`max_delay`, clearing all slots.
    pub fn resize(&mut self, min_delay: usize, max_delay: usize) {
        let n_slots = Self::slot_count(min_delay, max_delay);
        self.queue = vec![SmallVec::new(); n_slots];
        self.refract = None;
    }

    /// Queue an off-grid spike for delivery in slot `rel_delivery`.
    pub fn add_spike(&mut self, rel_delivery: usize, stamp: i64, ps_offset: f64, weight: f64) {
        self.queue[rel_delivery].push(SpikeInfo {
            stamp,
            offset: ps_offset,
            weight,
        });
    }

    /// Schedule the (single, per-neuron) return-from-refractoriness
    /// pseudo-event.
    pub fn add_refractory(&mut self, stamp: i64, ps_offset: f64) {
        self.refract = Some(SpikeInfo {
            stamp,
            offset: ps_offset,
            weight: 0.0,
        });
    }

    /// Sort slot `slot` by decreasing `(stamp, offset)`, so the earliest
    /// due event is at the back (cheap to pop). Called once at the start
    /// of delivery for this slot.
    pub fn prepare_delivery(&mut self, slot: usize) {
        self.queue[slot].sort_by(|a, b| b.key().cmp(&a.key()));
    }

    /// Discard every event currently queued in `slot` without delivering
    /// it.
    pub fn discard_events(&mut self, slot: usize) {
        self.queue[slot].clear();
    }

    /// Pop the next event due at exactly `req_stamp` from `slot`.
    ///
    /// Returns `None` if the earliest remaining event (and the pending
    /// refractory pseudo-event, if any) both have a stamp greater than
    /// `req_stamp` — i.e. nothing is due yet this step. When a
    /// return-from-refractoriness and a real spike share the same stamp,
    /// the return is popped first and `end_of_refract` is
    /// `true`; the caller should call again to drain any coincident
    /// spikes. When `accumulate_simultaneous` is true, all spikes sharing
    /// the same `(stamp, offset)` as the first one popped are summed into
    /// a single [`NextSpike`].
    pub fn get_next_spike(
        &mut self,
        slot: usize,
        req_stamp: i64,
        accumulate_simultaneous: bool,
    ) -> Option<NextSpike> {
        let refract_due = self.refract.map(|r| r.stamp <= req_stamp).unwrap_or(false);
        let spike_due = self.queue[slot]
            .last()
            .map(|s| s.stamp <= req_stamp)
            .unwrap_or(false);

        if !refract_due && !spike_due {
            return None;
        }

        let refract_first = match (self.refract, self.queue[slot].last()) {
            (Some(r), Some(s)) => r.stamp <= s.stamp,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if refract_due && refract_first {
            let r = self.refract.take().unwrap();
            return Some(NextSpike {
                ps_offset: r.offset,
                weight: 0.0,
                end_of_refract: true,
            });
        }

        let first = self.queue[slot].pop()?;
        let mut weight = first.weight;

        if accumulate_simultaneous {
            while let Some(next) = self.queue[slot].last() {
                if next.stamp == first.stamp && next.offset == first.offset {
                    weight += self.queue[slot].pop().unwrap().weight;
                } else {
                    break;
                }
            }
        }

        Some(NextSpike {
            ps_offset: first.offset,
            weight,
            end_of_refract: false,
        })
    }

    /// Clear every slot and cancel any pending refractory event.
    pub fn clear(&mut self) {
        for slot in &mut self.queue {
            slot.clear();
        }
        self.refract = None;
    }

    /// Number of slots in the pseudo-ring.
    pub fn slot_count_len(&self) -> usize {
        self.queue.len()
    }
}

impl Default for SliceRingBuffer {
    fn default() -> Self {
        let mut b = Self::new(1, 1);
        b.refract = None;
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_pop_in_increasing_temporal_order() {
        let mut b = SliceRingBuffer::new(2, 4);
        b.add_spike(0, 5, 0.1, 1.0);
        b.add_spike(0, 3, 0.9, 2.0);
        b.add_spike(0, 3, 0.2, 3.0);
        b.prepare_delivery(0);

        let first = b.get_next_spike(0, 3, false).unwrap();
        assert_eq!(first.weight, 3.0); // smaller offset (0.2) is earlier within the same stamp

        let second = b.get_next_spike(0, 3, false).unwrap();
        assert_eq!(second.weight, 2.0);

        // stamp 5 not due yet at req_stamp=3
        assert!(b.get_next_spike(0, 3, false).is_none());
        let third = b.get_next_spike(0, 5, false).unwrap();
        assert_eq!(third.weight, 1.0);
    }

    #[test]
    fn accumulate_simultaneous_sums_coincident_spikes() {
        let mut b = SliceRingBuffer::new(2, 4);
        b.add_spike(0, 4, 0.5, 1.0);
        b.add_spike(0, 4, 0.5, 2.0);
        b.add_spike(0, 4, 0.5, 3.0);
        b.prepare_delivery(0);

        let combined = b.get_next_spike(0, 4, true).unwrap();
        assert_eq!(combined.weight, 6.0);
        assert!(b.get_next_spike(0, 4, true).is_none());
    }

    #[test]
    fn refractory_return_wins_ties() {
        let mut b = SliceRingBuffer::new(2, 4);
        b.add_spike(0, 7, 0.3, 5.0);
        b.add_refractory(7, 0.1);
        b.prepare_delivery(0);

        let first = b.get_next_spike(0, 7, true).unwrap();
        assert!(first.end_of_refract);

        let second = b.get_next_spike(0, 7, true).unwrap();
        assert!(!second.end_of_refract);
        assert_eq!(second.weight, 5.0);
    }

    #[test]
    fn clear_drops_queued_and_refractory_events() {
        let mut b = SliceRingBuffer::new(1, 1);
        b.add_spike(0, 1, 0.0, 1.0);
        b.add_refractory(1, 0.0);
        b.clear();
        b.prepare_delivery(0);
        assert!(b.get_next_spike(0, 1, true).is_none());
    }
}
