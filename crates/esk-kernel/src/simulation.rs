//! Round-based simulation driver tying neuron update (C4), ring buffers
//! (C2), spike events (C5), and event delivery (C7) together for a
//! homogeneous population of alpha-shaped LIF neurons.

use std::collections::HashMap;

use esk_buffers::RingBuffer;
use esk_builder::Connection;
use esk_connect::{dispatch_with_growth, exchange, Deliverable, Outbox, ResizeLog};
use esk_events::SpikeEvent;
use esk_neuron::LifPscAlpha;
use esk_types::{NodeId, ReceptorType, Result, ThreadId};

use crate::config::SimulationConfig;

/// A homogeneous set of neurons, each with its own per-channel ring
/// buffers, addressable by stable [`NodeId`].
pub struct Population {
    ids: Vec<NodeId>,
    neurons: Vec<LifPscAlpha>,
    ring_ex: Vec<RingBuffer>,
    ring_in: Vec<RingBuffer>,
    index_of: HashMap<NodeId, usize>,
}

impl Population {
    /// Build a population from `(id, neuron)` pairs, allocating
    /// `min_delay`-slot ring buffers for each.
    pub fn new(entries: Vec<(NodeId, LifPscAlpha)>, min_delay: usize) -> Self {
        let mut ids = Vec::with_capacity(entries.len());
        let mut neurons = Vec::with_capacity(entries.len());
        let mut ring_ex = Vec::with_capacity(entries.len());
        let mut ring_in = Vec::with_capacity(entries.len());
        let mut index_of = HashMap::with_capacity(entries.len());
        for (i, (id, neuron)) in entries.into_iter().enumerate() {
            index_of.insert(id, i);
            ids.push(id);
            neurons.push(neuron);
            ring_ex.push(RingBuffer::new(min_delay));
            ring_in.push(RingBuffer::new(min_delay));
        }
        Self {
            ids,
            neurons,
            ring_ex,
            ring_in,
            index_of,
        }
    }

    /// Number of neurons in the population.
    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    /// True if the population has no neurons.
    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    /// Current membrane voltage of `id`, if present.
    pub fn v_m(&self, id: NodeId) -> Option<f64> {
        self.index_of.get(&id).map(|&i| self.neurons[i].v_m())
    }

    /// Deposit `weight` directly into `id`'s ring buffer at relative `lag`
    /// within the window about to run, bypassing the connection table.
    /// Models a device-like source such
    /// as a spike generator feeding a neuron with no upstream synapse.
    ///
    /// Returns `false` if `id` is not in this population.
    pub fn inject_external(&mut self, id: NodeId, weight: f64, lag: usize) -> bool {
        match self.index_of.get(&id) {
            Some(&idx) => {
                if weight >= 0.0 {
                    self.ring_ex[idx].add_value(lag, weight);
                } else {
                    self.ring_in[idx].add_value(lag, -weight);
                }
                true
            }
            None => false,
        }
    }

    fn calibrate(&mut self, h: f64) -> Result<()> {
        for n in &mut self.neurons {
            n.calibrate(h)?;
        }
        Ok(())
    }
}

struct RingSink<'a> {
    ring_ex: &'a mut [RingBuffer],
    ring_in: &'a mut [RingBuffer],
    index_of: &'a HashMap<NodeId, usize>,
}

impl Deliverable for RingSink<'_> {
    fn deliver(&mut self, target: NodeId, _receptor: ReceptorType, lag: u32, amount: f64) {
        if let Some(&idx) = self.index_of.get(&target) {
            if amount >= 0.0 {
                self.ring_ex[idx].add_value(lag as usize, amount);
            } else {
                self.ring_in[idx].add_value(lag as usize, -amount);
            }
        }
    }
}

/// Drives a [`Population`] one min-delay window at a time, 's
/// collect/exchange/dispatch phases.
pub struct Simulation {
    h: f64,
    min_delay: usize,
    window_start: i64,
    population: Population,
    adjacency: HashMap<NodeId, Vec<Connection>>,
    resize_log: ResizeLog,
}

impl Simulation {
    /// Construct a simulation, calibrating every neuron for step size `h`
    /// and indexing `connections` by source for fast per-spike fan-out.
    pub fn new(
        population: Population,
        connections: Vec<Connection>,
        h: f64,
        min_delay: usize,
    ) -> Result<Self> {
        Self::with_config(
            population,
            connections,
            SimulationConfig::new(h, min_delay)?,
        )
    }

    /// Construct a simulation from an explicit, pre-validated
    /// [`SimulationConfig`].
    pub fn with_config(
        mut population: Population,
        connections: Vec<Connection>,
        config: SimulationConfig,
    ) -> Result<Self> {
        config.validate()?;
        population.calibrate(config.h)?;
        let mut adjacency: HashMap<NodeId, Vec<Connection>> = HashMap::new();
        for c in connections {
            adjacency.entry(c.source).or_default().push(c);
        }
        log::info!(
            "simulation calibrated: {} neurons, h = {} ms, min_delay = {} steps",
            population.len(),
            config.h,
            config.min_delay
        );
        Ok(Self {
            h: config.h,
            min_delay: config.min_delay,
            window_start: 0,
            population,
            adjacency,
            resize_log: ResizeLog::new(config.initial_buffer_capacity),
        })
    }

    /// Run `n_windows` min-delay windows back to back, logging progress at
    /// decile boundaries and a summary on completion. Returns the total number of spikes emitted.
    pub fn run(&mut self, n_windows: usize) -> usize {
        let mut total = 0usize;
        let decile = (n_windows / 10).max(1);
        for i in 0..n_windows {
            total += self.run_window();
            if n_windows >= 10 && (i + 1) % decile == 0 {
                log::debug!(
                    "simulation progress: {}/{} windows, {} spikes so far",
                    i + 1,
                    n_windows,
                    total
                );
            }
        }
        log::info!(
            "simulation run complete: {n_windows} windows, {total} spikes emitted, \
             final window_start = {}",
            self.window_start
        );
        total
    }

    /// The integration step (ms).
    pub fn h(&self) -> f64 {
        self.h
    }

    /// The absolute step at the start of the next window to run.
    pub fn window_start(&self) -> i64 {
        self.window_start
    }

    /// Read-only access to the driven population.
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Deposit `weight` directly into `id`'s ring buffer at relative `lag`
    /// within the window about to run (see [`Population::inject_external`]).
    pub fn inject_external(&mut self, id: NodeId, weight: f64, lag: usize) -> bool {
        self.population.inject_external(id, weight, lag)
    }

    /// Advance exactly one min-delay window: update every neuron, collect
    /// emitted spikes into per-target events, exchange, and dispatch into
    /// the next window's ring buffers. Returns the number of spikes
    /// emitted this window.
    pub fn run_window(&mut self) -> usize {
        let window_start = self.window_start;
        let min_delay = self.min_delay;
        let mut outbox = Outbox::new();
        let mut total_emitted = 0usize;

        for idx in 0..self.population.neurons.len() {
            let node = self.population.ids[idx];
            let spikes = {
                let Population {
                    neurons,
                    ring_ex,
                    ring_in,
                    ..
                } = &mut self.population;
                neurons[idx].update(
                    window_start,
                    0,
                    min_delay,
                    &mut ring_ex[idx],
                    &mut ring_in[idx],
                )
            };
            for e in spikes {
                total_emitted += 1;
                if let Some(conns) = self.adjacency.get(&node) {
                    for conn in conns {
                        outbox.push(SpikeEvent {
                            source: node,
                            target: conn.target,
                            stamp: e.step,
                            offset: 0.0,
                            weight: conn.weight,
                            multiplicity: 1,
                            receptor: conn.receptor,
                            delay: conn.delay,
                        });
                    }
                }
            }
        }

        let mut refs: Vec<(ThreadId, &mut Outbox)> = vec![(ThreadId::new(0), &mut outbox)];
        let stream = exchange(&mut refs);

        let index_of = self.population.index_of.clone();
        let mut sink = RingSink {
            ring_ex: &mut self.population.ring_ex[..],
            ring_in: &mut self.population.ring_in[..],
            index_of: &index_of,
        };
        dispatch_with_growth(
            &stream,
            window_start,
            window_start,
            &mut sink,
            &mut self.resize_log,
        );

        for idx in 0..self.population.neurons.len() {
            self.population.ring_ex[idx].rotate();
            self.population.ring_in[idx].rotate();
        }

        self.window_start += min_delay as i64;
        total_emitted
    }
}
