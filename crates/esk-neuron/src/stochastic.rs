//! Stochastic (hazard-rate) threshold for generalized integrate-and-fire
//! variants.
//!
//! Spike probability over one step is `1 - exp(-lambda*h) = -expm1(-lambda*h)`,
//! with hazard rate `lambda = lambda0 * exp((V - V_theta) / delta_v)`.

use rand::Rng;

/// Parameters of the escape-noise hazard function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticThreshold {
    /// Baseline hazard rate at `V == V_theta` (spikes / ms).
    pub lambda0: f64,
    /// Voltage scale of the escape-noise sensitivity.
    pub delta_v: f64,
}

impl StochasticThreshold {
    /// Instantaneous hazard rate at membrane voltage `v` relative to
    /// threshold `v_theta`.
    pub fn hazard_rate(&self, v: f64, v_theta: f64) -> f64 {
        self.lambda0 * ((v - v_theta) / self.delta_v).exp()
    }

    /// Probability of spiking within one step of size `h` at voltage `v`.
    pub fn spike_probability(&self, v: f64, v_theta: f64, h: f64) -> f64 {
        let lambda = self.hazard_rate(v, v_theta);
        -(-lambda * h).exp_m1()
    }

    /// Draw whether a spike occurs this step, given the thread's RNG.
    /// Deterministic given the RNG's state.
    pub fn draw(&self, v: f64, v_theta: f64, h: f64, rng: &mut impl Rng) -> bool {
        let p = self.spike_probability(v, v_theta, h);
        rng.gen::<f64>() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn probability_is_zero_far_below_threshold() {
        let st = StochasticThreshold {
            lambda0: 1.0,
            delta_v: 2.0,
        };
        let p = st.spike_probability(-100.0, -55.0, 0.1);
        assert!(p < 1e-6);
    }

    #[test]
    fn probability_increases_with_voltage() {
        let st = StochasticThreshold {
            lambda0: 1.0,
            delta_v: 2.0,
        };
        let low = st.spike_probability(-60.0, -55.0, 0.1);
        let high = st.spike_probability(-50.0, -55.0, 0.1);
        assert!(high > low);
    }

    #[test]
    fn draw_is_deterministic_given_a_seeded_rng() {
        let st = StochasticThreshold {
            lambda0: 5.0,
            delta_v: 2.0,
        };
        let mut r1 = StdRng::seed_from_u64(42);
        let mut r2 = StdRng::seed_from_u64(42);
        let a = st.draw(-50.0, -55.0, 0.1, &mut r1);
        let b = st.draw(-50.0, -55.0, 0.1, &mut r2);
        assert_eq!(a, b);
    }
}
