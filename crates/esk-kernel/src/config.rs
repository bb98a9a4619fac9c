//! Simulation configuration.
//!
//! Mirrors the teacher's `NetworkConfig`/`SimulationParams` idiom: a plain
//! struct with `Default`, `with_*` builder methods, and a `validate()` that
//! re-runs the same checks the constructor applies so a config mutated
//! after construction can still be checked before driving a run.

use esk_types::{KernelError, Result};

/// Validated configuration for a [`crate::Simulation`] run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Integration step `h` (ms).
    pub h: f64,
    /// Minimum inter-neuron delay, in steps.
    pub min_delay: usize,
    /// Initial secondary-buffer capacity handed to the resize log.
    pub initial_buffer_capacity: usize,
    /// Compile-time-style upper bound on secondary buffer growth (spec
    /// §4.7 "compile-time maximum").
    pub max_buffer_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            h: 0.1,
            min_delay: 1,
            initial_buffer_capacity: 64,
            max_buffer_capacity: 1 << 20,
        }
    }
}

impl SimulationConfig {
    /// Construct from explicit `h` and `min_delay`, validating both.
    pub fn new(h: f64, min_delay: usize) -> Result<Self> {
        let cfg = Self {
            h,
            min_delay,
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Override the initial secondary-buffer capacity.
    pub fn with_initial_buffer_capacity(mut self, capacity: usize) -> Self {
        self.initial_buffer_capacity = capacity;
        self
    }

    /// Override the hard cap on secondary-buffer growth.
    pub fn with_max_buffer_capacity(mut self, capacity: usize) -> Self {
        self.max_buffer_capacity = capacity;
        self
    }

    /// Re-run every constructor check; call after mutating fields directly.
    ///
    /// # Errors
    /// [`KernelError::BadProperty`] if `h <= 0`, `min_delay == 0`, or the
    /// buffer capacities are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.h <= 0.0 {
            return Err(KernelError::bad_property("h", "integration step must be > 0"));
        }
        if self.min_delay == 0 {
            return Err(KernelError::bad_property("min_delay", "must be >= 1 step"));
        }
        if self.initial_buffer_capacity == 0 {
            return Err(KernelError::bad_property(
                "initial_buffer_capacity",
                "must be > 0",
            ));
        }
        if self.max_buffer_capacity < self.initial_buffer_capacity {
            return Err(KernelError::bad_property(
                "max_buffer_capacity",
                "must be >= initial_buffer_capacity",
            ));
        }
        Ok(())
    }
}
