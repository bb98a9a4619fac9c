//! Adaptive exponential integrate-and-fire neuron, the nonlinear-kinetics
//! variant integrated via an external ODE solver.

use esk_types::{KernelError, Result};
use smallvec::SmallVec;

use crate::solver::{AdaptiveSolver, OdeSystem};

/// Configuration of an [`Adex`] neuron.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdexParams {
    /// Membrane capacitance (pF).
    pub c_m: f64,
    /// Leak conductance (nS).
    pub g_l: f64,
    /// Resting potential (mV).
    pub e_l: f64,
    /// Exponential slope factor (mV).
    pub delta_t: f64,
    /// Effective spike threshold of the exponential term (mV).
    pub v_t: f64,
    /// Hard cutoff voltage treated as "spiked" (mV).
    pub v_peak: f64,
    /// Reset potential after a spike (mV).
    pub v_reset: f64,
    /// Adaptation time constant (ms).
    pub tau_w: f64,
    /// Sub-threshold adaptation coupling (nS).
    pub a: f64,
    /// Spike-triggered adaptation increment (pA).
    pub b: f64,
    /// Absolute refractory period (ms).
    pub t_ref: f64,
    /// Constant bias current (pA).
    pub i_e: f64,
}

impl AdexParams {
    fn validate(&self) -> Result<()> {
        if self.c_m <= 0.0 {
            return Err(KernelError::bad_property("C_m", "must be > 0"));
        }
        if self.g_l <= 0.0 {
            return Err(KernelError::bad_property("g_L", "must be > 0"));
        }
        if self.tau_w <= 0.0 {
            return Err(KernelError::bad_property("tau_w", "must be > 0"));
        }
        if self.delta_t <= 0.0 {
            return Err(KernelError::bad_property("Delta_T", "must be > 0"));
        }
        if self.t_ref < 0.0 {
            return Err(KernelError::bad_property("t_ref", "must be >= 0"));
        }
        if self.v_reset >= self.v_peak {
            return Err(KernelError::bad_property("V_reset", "must be < V_peak"));
        }
        Ok(())
    }
}

struct AdexSystem<'a> {
    p: &'a AdexParams,
    i_syn: f64,
}

impl OdeSystem for AdexSystem<'_> {
    fn dim(&self) -> usize {
        2
    }

    fn rhs(&self, _t: f64, y: &[f64], deriv: &mut [f64]) {
        let v = y[0];
        let w = y[1];
        let exp_term = self.p.g_l
            * self.p.delta_t
            * ((v - self.p.v_t) / self.p.delta_t).min(30.0).exp();
        deriv[0] =
            (-self.p.g_l * (v - self.p.e_l) + exp_term - w + self.p.i_e + self.i_syn) / self.p.c_m;
        deriv[1] = (self.p.a * (v - self.p.e_l) - w) / self.p.tau_w;
    }
}

/// An adaptive exponential integrate-and-fire neuron.
#[derive(Debug, Clone, PartialEq)]
pub struct Adex {
    params: AdexParams,
    solver: AdaptiveSolver,
    v: f64,
    w: f64,
    refractory_remaining: f64,
}

/// A spike emitted at the end of the grid step that crossed `v_peak`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    /// Step at which the spike is reported.
    pub step: i64,
}

impl Adex {
    /// Construct, validating parameters and starting at rest.
    pub fn new(params: AdexParams) -> Result<Self> {
        params.validate()?;
        let e_l = params.e_l;
        Ok(Self {
            params,
            solver: AdaptiveSolver::default(),
            v: e_l,
            w: 0.0,
            refractory_remaining: 0.0,
        })
    }

    /// Membrane voltage (mV).
    pub fn v_m(&self) -> f64 {
        self.v
    }

    /// Adaptation current (pA).
    pub fn w(&self) -> f64 {
        self.w
    }

    /// True while within the absolute refractory period.
    pub fn is_refractory(&self) -> bool {
        self.refractory_remaining > 1e-12
    }

    /// Advance one grid step of size `h`, with `i_syn` the (constant over
    /// the step) synaptic current accumulated for this lag.
    ///
    /// # Errors
    /// [`KernelError::SolverFailure`] if the embedded solver cannot meet
    /// its error tolerance within its halving budget.
    pub fn update_step(&mut self, step_index: i64, h: f64, i_syn: f64) -> Result<SmallVec<[Emission; 1]>> {
        let mut spikes = SmallVec::new();

        if self.is_refractory() {
            self.refractory_remaining -= h;
            if self.refractory_remaining <= 0.0 {
                self.v = self.params.v_reset;
            }
            return Ok(spikes);
        }

        let system = AdexSystem {
            p: &self.params,
            i_syn,
        };
        let mut state = [self.v, self.w];
        self.solver
            .integrate(&system, &mut state, 0.0, h, h, "adex")?;
        self.v = state[0];
        self.w = state[1];

        if self.v >= self.params.v_peak {
            self.v = self.params.v_reset;
            self.w += self.params.b;
            self.refractory_remaining = self.params.t_ref;
            spikes.push(Emission { step: step_index });
        }

        Ok(spikes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AdexParams {
        AdexParams {
            c_m: 281.0,
            g_l: 30.0,
            e_l: -70.6,
            delta_t: 2.0,
            v_t: -50.4,
            v_peak: 0.0,
            v_reset: -70.6,
            tau_w: 144.0,
            a: 4.0,
            b: 80.5,
            t_ref: 2.0,
            i_e: 0.0,
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut p = params();
        p.c_m = 0.0;
        assert!(Adex::new(p).is_err());
    }

    #[test]
    fn no_input_stays_near_rest() {
        let mut n = Adex::new(params()).unwrap();
        for step in 0..100 {
            n.update_step(step, 0.1, 0.0).unwrap();
        }
        assert!((n.v_m() - (-70.6)).abs() < 1.0);
    }

    #[test]
    fn strong_sustained_current_elicits_a_spike_and_adapts() {
        let mut n = Adex::new(params()).unwrap();
        let mut spiked = false;
        for step in 0..2000 {
            let spikes = n.update_step(step, 0.1, 600.0).unwrap();
            if !spikes.is_empty() {
                spiked = true;
                break;
            }
        }
        assert!(spiked, "strong sustained drive should eventually spike");
        assert!(n.w() > 0.0, "adaptation current should increase after a spike");
    }
}
