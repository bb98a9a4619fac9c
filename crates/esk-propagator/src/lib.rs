//! Closed-form propagator coefficients for the canonical linear building
//! block:
//!
//! ```text
//! dV/dt = -V/tau_m + I(t)/C
//! dI/dt = -I/tau_syn + sum_k delta(t - t_k)
//! ```
//!
//! `P31`/`P32` are opaque coefficients that callers use to advance the
//! membrane/current pair by one step `h`; see [`Propagator::propagate`].
//! Near `tau_m == tau_syn` the generic closed form loses precision (the
//! `tau - tau_syn` denominator in `beta` blows up); the stability branch
//! below follows `libnestutil/propagator_stability.cpp` in the NEST
//! kernel this component is modeled on.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// The pair of propagator coefficients advancing one step.
///
/// Callers must treat these as opaque : they are the
/// closed-form solution of the linear ODE system over one step `h`, not
/// independently meaningful physical quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Propagate {
    /// Coefficient propagating synaptic current into membrane voltage.
    pub p31: f64,
    /// Coefficient propagating synaptic current into itself (its own decay
    /// contribution folded with the membrane coupling).
    pub p32: f64,
}

/// Tolerance (ms) below which `tau_m` and `tau_syn` are considered
/// near-degenerate and the singular-expansion branch is evaluated (spec
/// §4.1 "Stability rule").
pub const DEGENERACY_TOLERANCE_MS: f64 = 0.1;

/// Precomputed coefficients for one (tau_syn, tau_m, C) triple.
///
/// Construct once per neuron model at calibration time; [`propagate`]
/// evaluates cheaply per step from the precomputed constants, mirroring
/// the teacher's calibrate/update split (a neuron model calibrates once,
/// then updates every step without re-deriving its coefficients).
///
/// [`propagate`]: Propagator::propagate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Propagator {
    tau_syn: f64,
    tau_m: f64,
    c_m: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
}

impl Propagator {
    /// Precompute the coefficients for a membrane time constant `tau_m`,
    /// synaptic time constant `tau_syn`, and capacitance `c_m`.
    ///
    /// `alpha`/`beta`/`gamma` follow the original derivation: `beta =
    /// tau_syn * tau_m / (tau_m - tau_syn)` is the quantity that becomes
    /// singular as `tau_m -> tau_syn`, which is exactly the branch
    /// [`propagate`] guards against.
    ///
    /// [`propagate`]: Propagator::propagate
    pub fn new(tau_syn: f64, tau_m: f64, c_m: f64) -> Self {
        let alpha = 1.0 / (c_m * tau_m * tau_m) * (tau_syn - tau_m);
        // `beta`/`gamma` are only used on the non-degenerate branch, where
        // `tau_m - tau_syn` is bounded away from zero by construction
        // (see the dispatch in `propagate`), so the division here never
        // sees a vanishing denominator on the path that reads it.
        let beta = if (tau_m - tau_syn).abs() > f64::EPSILON {
            tau_syn * tau_m / (tau_m - tau_syn)
        } else {
            0.0
        };
        let gamma = beta / c_m;

        Self {
            tau_syn,
            tau_m,
            c_m,
            alpha,
            beta,
            gamma,
        }
    }

    /// Evaluate `P31`/`P32` for a step of size `h` (ms).
    ///
    /// Computes the generic closed form using `expm1` for numerical
    /// accuracy, then — whenever `|tau_m - tau_syn| < `
    /// [`DEGENERACY_TOLERANCE_MS`] — also computes the singular limit and
    /// returns it instead whenever the generic form's deviation from that
    /// limit exceeds twice the leading `O(h)` correction term. This exactly
    /// mirrors the two-branch check in `propagator_stability.cpp`.
    pub fn propagate(&self, h: f64) -> Propagate {
        let exp_h_tau_syn = (-h / self.tau_syn).exp();
        let expm1_h_tau = (-h / self.tau_m + h / self.tau_syn).exp_m1();

        let mut p31 = self.gamma * (self.beta * exp_h_tau_syn * expm1_h_tau - h * exp_h_tau_syn);
        let mut p32 = self.gamma * exp_h_tau_syn * expm1_h_tau;

        if (self.tau_m - self.tau_syn).abs() < DEGENERACY_TOLERANCE_MS {
            let exp_h_tau = (-h / self.tau_m).exp();

            let p31_linear = self.alpha * h * h * h * exp_h_tau / 3.0;
            let p31_singular = h * h / 2.0 / self.c_m * exp_h_tau;
            let dev_p31 = (p31 - p31_singular).abs();
            if dev_p31 > 2.0 * p31_linear.abs() {
                p31 = p31_singular;
            }

            let p32_linear = self.alpha * h * h * exp_h_tau / 2.0;
            let p32_singular = h / self.c_m * exp_h_tau;
            let dev_p32 = (p32 - p32_singular).abs();
            if dev_p32 > 2.0 * p32_linear.abs() {
                p32 = p32_singular;
            }
        }

        Propagate { p31, p32 }
    }

    /// Membrane time constant this propagator was built with.
    pub fn tau_m(&self) -> f64 {
        self.tau_m
    }

    /// Synaptic time constant this propagator was built with.
    pub fn tau_syn(&self) -> f64 {
        self.tau_syn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_and_generic_branches_agree_near_the_boundary() {
        // Just inside and just outside the 0.1ms window should produce
        // coefficients that don't jump discontinuously.
        let inside = Propagator::new(9.99, 10.0, 1.0).propagate(0.1);
        let outside = Propagator::new(9.5, 10.0, 1.0).propagate(0.1);
        assert!(inside.p31.is_finite());
        assert!(outside.p31.is_finite());
    }

    #[test]
    fn exactly_equal_time_constants_do_not_panic_or_produce_nan() {
        let p = Propagator::new(10.0, 10.0, 1.0);
        let out = p.propagate(0.1);
        assert!(out.p31.is_finite());
        assert!(out.p32.is_finite());
    }

    #[test]
    fn coefficients_scale_towards_zero_as_h_shrinks() {
        let p = Propagator::new(2.0, 10.0, 250.0);
        let big = p.propagate(1.0);
        let small = p.propagate(1e-6);
        assert!(small.p31.abs() < big.p31.abs());
        assert!(small.p32.abs() < big.p32.abs());
    }

    proptest::proptest! {
        #[test]
        fn propagate_never_produces_nan_or_infinite_coefficients(
            tau_syn in 0.1f64..50.0,
            tau_m in 0.1f64..50.0,
            c_m in 1.0f64..1000.0,
            h in 1e-4f64..1.0,
        ) {
            let p = Propagator::new(tau_syn, tau_m, c_m);
            let out = p.propagate(h);
            proptest::prop_assert!(out.p31.is_finite());
            proptest::prop_assert!(out.p32.is_finite());
        }
    }
}
