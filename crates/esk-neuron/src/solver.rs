//! Adaptive-step ODE integration for nonlinear neuron kinetics.
//!
//! The teacher's stack has no bundled ODE-solver crate, so this is a small
//! embedded Runge-Kutta-Fehlberg-style solver with step-halving error
//! control, matching the contract : call with the current
//! state, a time cursor, and an upper bound equal to the next event; a
//! non-success return raises [`KernelError::SolverFailure`].

use esk_types::{KernelError, Result};

/// Right-hand side of the ODE system: writes `dy/dt` into `deriv` given
/// time `t` and state `y`.
pub trait OdeSystem {
    /// Number of state variables.
    fn dim(&self) -> usize;
    /// Evaluate `dy/dt` at `(t, y)` into `deriv`.
    fn rhs(&self, t: f64, y: &[f64], deriv: &mut [f64]);
}

/// Adaptive embedded RK23 (Bogacki-Shampine) solver with step halving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveSolver {
    /// Relative error tolerance per component.
    pub rel_tol: f64,
    /// Absolute error tolerance per component.
    pub abs_tol: f64,
    /// Maximum number of step halvings before giving up.
    pub max_shrinks: u32,
}

impl Default for AdaptiveSolver {
    fn default() -> Self {
        Self {
            rel_tol: 1e-6,
            abs_tol: 1e-9,
            max_shrinks: 12,
        }
    }
}

impl AdaptiveSolver {
    /// Integrate `system` from `t0` to `t1`, starting from `state` (updated
    /// in place). `h_hint` is the first step size to try.
    ///
    /// # Errors
    /// [`KernelError::SolverFailure`] if the error tolerance cannot be met
    /// within `max_shrinks` halvings, or if the state becomes non-finite.
    pub fn integrate(
        &self,
        system: &dyn OdeSystem,
        state: &mut [f64],
        t0: f64,
        t1: f64,
        h_hint: f64,
        node_name: &str,
    ) -> Result<()> {
        let dim = system.dim();
        debug_assert_eq!(state.len(), dim);
        let mut t = t0;
        let mut h = h_hint.min(t1 - t0).max(1e-9);
        let mut y = state.to_vec();

        while t < t1 - 1e-12 {
            h = h.min(t1 - t);
            let mut shrinks = 0;
            loop {
                let (y_high, err) = self.rk23_step(system, t, &y, h);
                if !y_high.iter().all(|v| v.is_finite()) {
                    return Err(KernelError::solver_failure(node_name, -1));
                }
                let scale: f64 = y
                    .iter()
                    .zip(&y_high)
                    .map(|(y0, y1)| self.abs_tol + self.rel_tol * y0.abs().max(y1.abs()))
                    .fold(f64::MIN_POSITIVE, f64::max);
                let norm_err = err / scale;
                if norm_err <= 1.0 || shrinks >= self.max_shrinks {
                    if shrinks >= self.max_shrinks && norm_err > 1.0 {
                        return Err(KernelError::solver_failure(node_name, -2));
                    }
                    t += h;
                    y = y_high;
                    break;
                }
                h *= 0.5;
                shrinks += 1;
            }
        }

        state.copy_from_slice(&y);
        Ok(())
    }

    /// One embedded RK23 step, returning the higher-order state estimate
    /// and a scalar error estimate (infinity-norm of the order-2/order-3
    /// difference).
    fn rk23_step(
        &self,
        system: &dyn OdeSystem,
        t: f64,
        y: &[f64],
        h: f64,
    ) -> (Vec<f64>, f64) {
        let dim = system.dim();
        let mut k1 = vec![0.0; dim];
        let mut k2 = vec![0.0; dim];
        let mut k3 = vec![0.0; dim];
        let mut k4 = vec![0.0; dim];

        system.rhs(t, y, &mut k1);

        let y2: Vec<f64> = (0..dim).map(|i| y[i] + 0.5 * h * k1[i]).collect();
        system.rhs(t + 0.5 * h, &y2, &mut k2);

        let y3: Vec<f64> = (0..dim).map(|i| y[i] + 0.75 * h * k2[i]).collect();
        system.rhs(t + 0.75 * h, &y3, &mut k3);

        let y_high: Vec<f64> = (0..dim)
            .map(|i| y[i] + h * (2.0 * k1[i] + 3.0 * k2[i] + 4.0 * k3[i]) / 9.0)
            .collect();
        system.rhs(t + h, &y_high, &mut k4);

        let y_low: Vec<f64> = (0..dim)
            .map(|i| y[i] + h * (7.0 * k1[i] + 6.0 * k2[i] + 8.0 * k3[i] + 3.0 * k4[i]) / 24.0)
            .collect();

        let err = (0..dim)
            .map(|i| (y_high[i] - y_low[i]).abs())
            .fold(0.0, f64::max);

        (y_high, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// dy/dt = -y (pure exponential decay); exact solution y(t) = y0*exp(-t).
    struct Decay;
    impl OdeSystem for Decay {
        fn dim(&self) -> usize {
            1
        }
        fn rhs(&self, _t: f64, y: &[f64], deriv: &mut [f64]) {
            deriv[0] = -y[0];
        }
    }

    #[test]
    fn integrates_exponential_decay_accurately() {
        let solver = AdaptiveSolver::default();
        let mut state = [1.0];
        solver
            .integrate(&Decay, &mut state, 0.0, 1.0, 0.1, "decay")
            .unwrap();
        let expected = (-1.0f64).exp();
        assert!((state[0] - expected).abs() < 1e-4);
    }

    /// A system whose derivative blows up immediately, forcing the solver
    /// to exhaust its halving budget.
    struct Blowup;
    impl OdeSystem for Blowup {
        fn dim(&self) -> usize {
            1
        }
        fn rhs(&self, _t: f64, y: &[f64], deriv: &mut [f64]) {
            deriv[0] = y[0] * y[0] * 1e12;
        }
    }

    #[test]
    fn reports_solver_failure_on_non_finite_state() {
        let solver = AdaptiveSolver {
            rel_tol: 1e-10,
            abs_tol: 1e-12,
            max_shrinks: 4,
        };
        let mut state = [1e10];
        let result = solver.integrate(&Blowup, &mut state, 0.0, 1.0, 0.5, "blowup");
        assert!(result.is_err());
    }
}
