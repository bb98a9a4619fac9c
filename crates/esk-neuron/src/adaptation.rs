//! Spike-frequency adaptation: a sum of `K` independent exponentially
//! decaying channels.

use esk_types::{KernelError, Result};

/// `K` independent adaptation channels sharing one additive contribution to
/// the neuron's threshold (or current).
///
/// Decay coefficients `P_sfa[i] = exp(-h/tau_sfa[i])` are precomputed at
/// [`Adaptation::calibrate`]; on every spike each channel receives an
/// additive kick `q_sfa[i]` ([`Adaptation::on_spike`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Adaptation {
    tau_sfa: Vec<f64>,
    q_sfa: Vec<f64>,
    decay: Vec<f64>,
    state: Vec<f64>,
}

impl Adaptation {
    /// Construct from paired `tau_sfa`/`q_sfa` arrays.
    ///
    /// # Errors
    /// [`KernelError::BadProperty`] if the arrays differ in length, any
    /// `tau_sfa` is non-positive, or any `q_sfa` is negative.
    pub fn new(tau_sfa: Vec<f64>, q_sfa: Vec<f64>) -> Result<Self> {
        if tau_sfa.len() != q_sfa.len() {
            return Err(KernelError::bad_property(
                "tau_sfa/q_sfa",
                "paired arrays must have equal length",
            ));
        }
        if tau_sfa.iter().any(|t| *t <= 0.0) {
            return Err(KernelError::bad_property(
                "tau_sfa",
                "every adaptation time constant must be > 0",
            ));
        }
        if q_sfa.iter().any(|q| *q < 0.0) {
            return Err(KernelError::bad_property(
                "q_sfa",
                "every adaptation kick must be >= 0",
            ));
        }
        let k = tau_sfa.len();
        Ok(Self {
            tau_sfa,
            q_sfa,
            decay: vec![1.0; k],
            state: vec![0.0; k],
        })
    }

    /// Construct with no channels (adaptation disabled).
    pub fn none() -> Self {
        Self {
            tau_sfa: Vec::new(),
            q_sfa: Vec::new(),
            decay: Vec::new(),
            state: Vec::new(),
        }
    }

    /// Precompute `P_sfa[i] = exp(-h/tau_sfa[i])` for step size `h`.
    pub fn calibrate(&mut self, h: f64) {
        for (decay, tau) in self.decay.iter_mut().zip(&self.tau_sfa) {
            *decay = (-h / tau).exp();
        }
    }

    /// Decay every channel by one step.
    pub fn propagate(&mut self) {
        for (s, d) in self.state.iter_mut().zip(&self.decay) {
            *s *= d;
        }
    }

    /// Apply the additive kick to every channel on spike emission.
    pub fn on_spike(&mut self) {
        for (s, q) in self.state.iter_mut().zip(&self.q_sfa) {
            *s += q;
        }
    }

    /// Sum of all channel states (the additive contribution to threshold
    /// or current).
    pub fn total(&self) -> f64 {
        self.state.iter().sum()
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.tau_sfa.len()
    }

    /// True if there are no channels.
    pub fn is_empty(&self) -> bool {
        self.tau_sfa.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_array_lengths() {
        let err = Adaptation::new(vec![10.0, 20.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, KernelError::BadProperty { .. }));
    }

    #[test]
    fn rejects_nonpositive_tau() {
        let err = Adaptation::new(vec![0.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, KernelError::BadProperty { .. }));
    }

    #[test]
    fn decays_geometrically_between_spikes() {
        let mut a = Adaptation::new(vec![10.0], vec![5.0]).unwrap();
        a.calibrate(1.0);
        a.on_spike();
        assert_eq!(a.total(), 5.0);
        a.propagate();
        let expected = 5.0 * (-1.0f64 / 10.0).exp();
        assert!((a.total() - expected).abs() < 1e-12);
    }

    #[test]
    fn multiple_channels_sum_independently() {
        let mut a = Adaptation::new(vec![5.0, 50.0], vec![1.0, 2.0]).unwrap();
        a.calibrate(1.0);
        a.on_spike();
        assert!((a.total() - 3.0).abs() < 1e-12);
    }
}
