//! Generalized integrate-and-fire neuron with exponential post-synaptic
//! currents, spike-frequency adaptation, and an escape-noise stochastic
//! threshold.
//!
//! Unlike [`crate::models::lif_psc_alpha::LifPscAlpha`], spiking here is not
//! a hard threshold crossing but a per-step Bernoulli draw against the
//! hazard rate of [`crate::stochastic::StochasticThreshold`]; the adaptation
//! channels raise the effective threshold after each spike rather than
//! injecting a current.

use esk_types::{KernelError, Result};
use rand::Rng;
use smallvec::SmallVec;

use crate::adaptation::Adaptation;
use crate::stochastic::StochasticThreshold;

/// Configuration of a [`GifPscExp`] neuron.
#[derive(Debug, Clone, PartialEq)]
pub struct GifPscExpParams {
    /// Membrane capacitance (pF).
    pub c_m: f64,
    /// Membrane time constant (ms).
    pub tau_m: f64,
    /// Synaptic time constant (ms).
    pub tau_syn: f64,
    /// Baseline threshold (mV), before adaptation channels are added.
    pub v_th: f64,
    /// Reset potential after a spike (mV).
    pub v_reset: f64,
    /// Resting potential (mV).
    pub e_l: f64,
    /// Absolute refractory period (ms).
    pub t_ref: f64,
    /// Constant bias current (pA).
    pub i_e: f64,
    /// Escape-noise hazard-rate parameters.
    pub stochastic: StochasticThreshold,
}

impl GifPscExpParams {
    fn validate(&self) -> Result<()> {
        if self.c_m <= 0.0 {
            return Err(KernelError::bad_property("C_m", "must be > 0"));
        }
        if self.tau_m <= 0.0 || self.tau_syn <= 0.0 {
            return Err(KernelError::bad_property(
                "tau_m/tau_syn",
                "all time constants must be > 0",
            ));
        }
        if self.t_ref < 0.0 {
            return Err(KernelError::bad_property("t_ref", "must be >= 0"));
        }
        if self.v_reset >= self.v_th {
            return Err(KernelError::bad_property("V_reset", "must be < V_th"));
        }
        if self.stochastic.lambda0 < 0.0 {
            return Err(KernelError::bad_property("lambda0", "must be >= 0"));
        }
        if self.stochastic.delta_v <= 0.0 {
            return Err(KernelError::bad_property("delta_v", "must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vars {
    p11: f64,
    p21: f64,
    p31: f64,
    p32: f64,
    p33: f64,
    p30: f64,
    refractory_steps: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct State {
    v_rel: f64,
    i_syn: f64,
    refractory_remaining: i64,
}

/// A generalized integrate-and-fire neuron driven by escape-noise spiking.
#[derive(Debug, Clone, PartialEq)]
pub struct GifPscExp {
    params: GifPscExpParams,
    adaptation: Adaptation,
    vars: Option<Vars>,
    state: State,
}

/// One emitted spike: absolute step stamp (always grid-aligned).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    /// Step at which the spike is emitted.
    pub step: i64,
}

impl GifPscExp {
    /// Construct, validating parameters and starting at rest.
    pub fn new(params: GifPscExpParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            adaptation: Adaptation::none(),
            vars: None,
            state: State::default(),
        })
    }

    /// Attach spike-frequency adaptation channels, each raising the
    /// effective threshold additively after a spike.
    pub fn with_adaptation(mut self, adaptation: Adaptation) -> Self {
        self.adaptation = adaptation;
        self
    }

    /// Current membrane voltage (mV).
    pub fn v_m(&self) -> f64 {
        self.state.v_rel + self.params.e_l
    }

    /// True while the neuron is within its absolute refractory period.
    pub fn is_refractory(&self) -> bool {
        self.state.refractory_remaining > 0
    }

    /// Effective threshold: baseline plus the sum of adaptation channels.
    pub fn effective_threshold(&self) -> f64 {
        self.params.v_th + self.adaptation.total()
    }

    /// Precompute step-dependent coefficients for step size `h` (ms).
    pub fn calibrate(&mut self, h: f64) -> Result<()> {
        let p = &self.params;
        let prop = esk_propagator::Propagator::new(p.tau_syn, p.tau_m, p.c_m).propagate(h);
        let p33 = (-h / p.tau_m).exp();
        self.vars = Some(Vars {
            p11: (-h / p.tau_syn).exp(),
            p21: h * (-h / p.tau_syn).exp(),
            p31: prop.p31,
            p32: prop.p32,
            p33,
            p30: p.tau_m / p.c_m * (1.0 - p33),
            refractory_steps: (p.t_ref / h).round() as i64,
        });
        self.adaptation.calibrate(h);
        Ok(())
    }

    /// Inject a synaptic spike of `weight` (pA), taking effect starting
    /// with the next propagated step.
    pub fn inject(&mut self, weight: f64) {
        self.state.i_syn += weight;
    }

    /// Advance one step, drawing the spike decision from `rng`.
    pub fn step(&mut self, step_index: i64, h: f64, rng: &mut impl Rng) -> Option<Emission> {
        let vars = *self.vars.as_ref().expect("calibrate() must run first");

        let v31 = vars.p31 * self.state.i_syn;
        let v32 = vars.p32 * self.state.i_syn;
        self.state.i_syn *= vars.p11;
        self.adaptation.propagate();

        if self.state.refractory_remaining > 0 {
            self.state.refractory_remaining -= 1;
            return None;
        }

        self.state.v_rel =
            vars.p30 * self.params.i_e + v31 + v32 + vars.p33 * self.state.v_rel;

        let threshold = self.effective_threshold();
        let spiked = self
            .params
            .stochastic
            .draw(self.v_m(), threshold, h, rng);
        if spiked {
            self.adaptation.on_spike();
            self.state.v_rel = self.params.v_reset - self.params.e_l;
            self.state.refractory_remaining = vars.refractory_steps;
            Some(Emission { step: step_index })
        } else {
            None
        }
    }

    /// Advance from step `from` (inclusive) to `to` (exclusive), draining
    /// `ring` one lag at a time. `origin` is the absolute step at the start
    /// of the current min-delay window.
    pub fn update(
        &mut self,
        origin: i64,
        from: usize,
        to: usize,
        h: f64,
        ring: &mut esk_buffers::RingBuffer,
        rng: &mut impl Rng,
    ) -> SmallVec<[Emission; 2]> {
        let mut spikes = SmallVec::new();
        for lag in from..to {
            if let Some(e) = self.step(origin + lag as i64, h, rng) {
                spikes.push(e);
            }
            // Inject after stepping: a spike arriving at this lag takes
            // effect at the next lag, not the one it arrived in.
            let input = ring.get_value(lag);
            if input != 0.0 {
                self.inject(input);
            }
        }
        spikes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esk_buffers::RingBuffer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gif() -> GifPscExp {
        GifPscExp::new(GifPscExpParams {
            c_m: 250.0,
            tau_m: 10.0,
            tau_syn: 2.0,
            v_th: -55.0,
            v_reset: -70.0,
            e_l: -70.0,
            t_ref: 2.0,
            i_e: 0.0,
            stochastic: StochasticThreshold {
                lambda0: 0.01,
                delta_v: 2.0,
            },
        })
        .unwrap()
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut p = gif().params;
        p.tau_syn = 0.0;
        assert!(GifPscExp::new(p).is_err());
    }

    #[test]
    fn quiescent_below_threshold_almost_never_spikes() {
        let mut n = gif();
        n.calibrate(0.1).unwrap();
        let mut ring = RingBuffer::new(1);
        let mut rng = StdRng::seed_from_u64(7);
        let mut spikes = 0;
        for step in 0..1000 {
            let emitted = n.update(step, 0, 1, 0.1, &mut ring, &mut rng);
            spikes += emitted.len();
            ring.clear();
        }
        assert_eq!(spikes, 0, "near-zero hazard rate at rest should not fire");
    }

    #[test]
    fn adaptation_raises_threshold_after_a_spike() {
        let mut n = gif().with_adaptation(Adaptation::new(vec![50.0], vec![5.0]).unwrap());
        n.calibrate(0.1).unwrap();
        let base = n.effective_threshold();
        n.adaptation.on_spike();
        assert!(n.effective_threshold() > base);
    }

    #[test]
    fn deterministic_given_seeded_rng() {
        let mut ring_a = RingBuffer::new(1);
        let mut ring_b = RingBuffer::new(1);
        let mut a = gif();
        let mut b = gif();
        a.calibrate(0.1).unwrap();
        b.calibrate(0.1).unwrap();
        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);

        let mut spikes_a = 0;
        let mut spikes_b = 0;
        for step in 0..500 {
            ring_a.add_value(0, 300.0);
            ring_b.add_value(0, 300.0);
            spikes_a += a.update(step, 0, 1, 0.1, &mut ring_a, &mut rng_a).len();
            spikes_b += b.update(step, 0, 1, 0.1, &mut ring_b, &mut rng_b).len();
            ring_a.clear();
            ring_b.clear();
        }
        assert_eq!(spikes_a, spikes_b);
    }
}
