//! Round-based spike delivery: collect, exchange, dispatch.

use esk_events::SpikeEvent;
use esk_types::{NodeId, ReceptorType, ThreadId};

use crate::resize_log::ResizeLog;

/// Per-thread outbox: spikes emitted by locally owned neurons during the
/// current min-delay window, pushed in emission order.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<SpikeEvent>,
}

impl Outbox {
    /// An empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `event` was emitted this window (collect phase).
    pub fn push(&mut self, event: SpikeEvent) {
        self.events.push(event);
    }

    /// Number of events currently queued.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if no events are queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<SpikeEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Pack every thread's outbox into one deterministic, rank-major-ordered
/// stream, standing in for the concatenated MPI send buffer. Threads are visited in ascending `ThreadId` order; within a
/// thread, events keep their collection order.
pub fn exchange(outboxes: &mut [(ThreadId, &mut Outbox)]) -> Vec<SpikeEvent> {
    outboxes.sort_by_key(|(tid, _)| *tid);
    let mut out = Vec::new();
    for (_, outbox) in outboxes.iter_mut() {
        out.extend(outbox.drain());
    }
    out
}

/// Where to deposit a delivered spike's effect: the dispatch phase's only
/// side effect, kept abstract so this crate does not need to know how
/// target ring buffers are laid out per thread.
pub trait Deliverable {
    /// Add `amount` to the ring buffer of `target` at relative `lag` steps
    /// into the window, on the given `receptor` channel.
    fn deliver(&mut self, target: NodeId, receptor: ReceptorType, lag: u32, amount: f64);
}

/// The outcome of one [`dispatch`] call.
#[derive(Debug, PartialEq)]
pub enum DispatchOutcome {
    /// Every event in the stream was delivered.
    Complete,
    /// The sink ran out of room; dispatch stopped after delivering
    /// `delivered` events. The caller should resize (via the
    /// [`ResizeLog`]) and re-invoke dispatch on the remaining slice
    /// `&events[delivered..]`.
    Paused {
        /// Number of events from the front of the stream already delivered.
        delivered: usize,
    },
}

/// Walk `events` (already in exchange order) and deliver each to `sink`,
/// relative to `window_start`. `capacity` bounds how many events `sink` can
/// currently absorb per call; exceeding it pauses delivery rather than
/// panicking, matching the buffer-overflow contract 
pub fn dispatch(
    events: &[SpikeEvent],
    window_start: i64,
    sink: &mut impl Deliverable,
    capacity: usize,
) -> DispatchOutcome {
    for (i, event) in events.iter().enumerate() {
        if i >= capacity {
            return DispatchOutcome::Paused { delivered: i };
        }
        let lag = (event.delivery_step() - window_start).max(0) as u32;
        sink.deliver(event.target, event.receptor, lag, event.deposit());
    }
    DispatchOutcome::Complete
}

/// Run dispatch to completion, growing `resize_log` (and re-dispatching the
/// remainder) whenever the sink's capacity is exceeded.
pub fn dispatch_with_growth(
    events: &[SpikeEvent],
    window_start: i64,
    step: i64,
    sink: &mut impl Deliverable,
    resize_log: &mut ResizeLog,
) {
    let mut offset = 0;
    loop {
        let capacity = resize_log.current_size();
        match dispatch(&events[offset..], window_start, sink, capacity) {
            DispatchOutcome::Complete => return,
            DispatchOutcome::Paused { delivered } => {
                offset += delivered;
                resize_log.observe(step, events.len() - offset + capacity);
            }
        }
    }
}

/// Convergence check for waveform-relaxation delivery of instantaneous
/// continuous couplings (gap junctions): iterate until every neuron's
/// state changed by less than `tolerance` between iterations, or
/// `max_iterations` is reached.
#[derive(Debug, Clone, Copy)]
pub struct WaveformRelaxation {
    /// Pointwise convergence tolerance on `|delta V|`.
    pub tolerance: f64,
    /// Hard cap on iterations, regardless of convergence.
    pub max_iterations: u32,
}

impl WaveformRelaxation {
    /// True if every paired `(prev, next)` value differs by less than
    /// `tolerance`.
    pub fn converged(&self, prev: &[f64], next: &[f64]) -> bool {
        prev.len() == next.len()
            && prev
                .iter()
                .zip(next)
                .all(|(p, n)| (p - n).abs() < self.tolerance)
    }

    /// True if `iteration` has reached the hard cap.
    pub fn exhausted(&self, iteration: u32) -> bool {
        iteration >= self.max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esk_types::Delay;

    fn spike(thread_tag: u64, stamp: i64, target: u64) -> SpikeEvent {
        SpikeEvent {
            source: NodeId::new(thread_tag),
            target: NodeId::new(target),
            stamp,
            offset: 0.0,
            weight: 1.0,
            multiplicity: 1,
            receptor: ReceptorType::DEFAULT,
            delay: Delay::new(2),
        }
    }

    struct RecordingSink {
        received: Vec<(NodeId, u32, f64)>,
    }

    impl Deliverable for RecordingSink {
        fn deliver(&mut self, target: NodeId, _receptor: ReceptorType, lag: u32, amount: f64) {
            self.received.push((target, lag, amount));
        }
    }

    #[test]
    fn exchange_orders_by_ascending_thread_id() {
        let mut ob_a = Outbox::new();
        ob_a.push(spike(1, 10, 100));
        let mut ob_b = Outbox::new();
        ob_b.push(spike(2, 10, 200));

        let mut refs: Vec<(ThreadId, &mut Outbox)> =
            vec![(ThreadId::new(3), &mut ob_b), (ThreadId::new(1), &mut ob_a)];
        let stream = exchange(&mut refs);
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[0].target, NodeId::new(100));
        assert_eq!(stream[1].target, NodeId::new(200));
    }

    #[test]
    fn dispatch_computes_lag_from_stamp_plus_delay() {
        let events = vec![spike(1, 10, 100)];
        let mut sink = RecordingSink { received: vec![] };
        let outcome = dispatch(&events, 10, &mut sink, 16);
        assert_eq!(outcome, DispatchOutcome::Complete);
        assert_eq!(sink.received, vec![(NodeId::new(100), 2, 1.0)]);
    }

    #[test]
    fn dispatch_pauses_when_capacity_is_exceeded() {
        let events = vec![spike(1, 10, 100), spike(1, 10, 101), spike(1, 10, 102)];
        let mut sink = RecordingSink { received: vec![] };
        let outcome = dispatch(&events, 10, &mut sink, 2);
        assert_eq!(outcome, DispatchOutcome::Paused { delivered: 2 });
        assert_eq!(sink.received.len(), 2);
    }

    #[test]
    fn dispatch_with_growth_delivers_every_event_across_pauses() {
        let events: Vec<_> = (0..10).map(|i| spike(1, 10, 100 + i)).collect();
        let mut sink = RecordingSink { received: vec![] };
        let mut log = ResizeLog::new(3);
        dispatch_with_growth(&events, 10, 0, &mut sink, &mut log);
        assert_eq!(sink.received.len(), 10);
    }

    #[test]
    fn waveform_relaxation_detects_convergence() {
        let wr = WaveformRelaxation {
            tolerance: 1e-3,
            max_iterations: 20,
        };
        assert!(wr.converged(&[1.0, 2.0], &[1.0005, 1.9996]));
        assert!(!wr.converged(&[1.0, 2.0], &[1.1, 2.0]));
        assert!(wr.exhausted(20));
        assert!(!wr.exhausted(19));
    }
}
