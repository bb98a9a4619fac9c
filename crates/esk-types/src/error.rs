//! Error taxonomy for the simulation core
//!
//! Every crate in the workspace resolves its `Result<T>` alias to
//! `Result<T, KernelError>`. The six variants mirror the error design in
//! the specification's error-handling section: configuration mistakes are
//! caught before mutation (`BadProperty`), topology/model refusals are
//! distinguished from run-time invariant violations, and the two numeric
//! failure modes (solver, instability) carry enough context to locate the
//! offending node.

use thiserror::Error;

/// Result type used throughout the kernel workspace.
pub type Result<T> = core::result::Result<T, KernelError>;

/// The error taxonomy of the simulation core.
///
/// `BadProperty` is always raised before any mutation takes place; the
/// other variants may be raised mid-operation and callers should treat
/// kernel state as invalid afterwards ().
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Configuration out of range, or a constructor/setter contract violation.
    #[error("bad property `{property}`: {reason}")]
    BadProperty {
        /// Name of the offending property.
        property: String,
        /// Human-readable explanation of the violated constraint.
        reason: String,
    },

    /// A connection was refused by topology or model constraints.
    #[error("illegal connection: {reason}")]
    IllegalConnection {
        /// Why the connection was refused.
        reason: String,
    },

    /// A run-time invariant was broken (empty pool, redraw limit exceeded, …).
    #[error("kernel exception: {reason}")]
    KernelException {
        /// Description of the broken invariant.
        reason: String,
    },

    /// An adaptive integrator returned a non-success status.
    #[error("solver failure in node `{node}`: status {status}")]
    SolverFailure {
        /// Name of the model that failed to integrate.
        node: String,
        /// Underlying solver status code.
        status: i32,
    },

    /// Simulated state escaped its physically meaningful bounds.
    #[error("numerical instability in node `{node}`: {quantity} = {value}")]
    NumericalInstability {
        /// Name of the model whose state diverged.
        node: String,
        /// Name of the diverging quantity (e.g. "V_m").
        quantity: String,
        /// The offending value.
        value: f64,
    },

    /// A connection targeted a receptor port outside the model's range.
    #[error("receptor type {requested} not recognized (model supports 0..{max_recognized})")]
    IncompatibleReceptorType {
        /// Requested receptor index.
        requested: usize,
        /// Highest receptor index the target model currently recognizes.
        max_recognized: usize,
    },
}

impl KernelError {
    /// Construct a [`KernelError::BadProperty`].
    pub fn bad_property(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadProperty {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Construct a [`KernelError::IllegalConnection`].
    pub fn illegal_connection(reason: impl Into<String>) -> Self {
        Self::IllegalConnection {
            reason: reason.into(),
        }
    }

    /// Construct a [`KernelError::KernelException`].
    pub fn kernel_exception(reason: impl Into<String>) -> Self {
        Self::KernelException {
            reason: reason.into(),
        }
    }

    /// Construct a [`KernelError::SolverFailure`].
    pub fn solver_failure(node: impl Into<String>, status: i32) -> Self {
        Self::SolverFailure {
            node: node.into(),
            status,
        }
    }

    /// Construct a [`KernelError::NumericalInstability`].
    pub fn numerical_instability(
        node: impl Into<String>,
        quantity: impl Into<String>,
        value: f64,
    ) -> Self {
        Self::NumericalInstability {
            node: node.into(),
            quantity: quantity.into(),
            value,
        }
    }

    /// Construct a [`KernelError::IncompatibleReceptorType`].
    pub fn incompatible_receptor(requested: usize, max_recognized: usize) -> Self {
        Self::IncompatibleReceptorType {
            requested,
            max_recognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_property_displays_property_and_reason() {
        let err = KernelError::bad_property("tau_m", "must be > 0");
        let msg = format!("{err}");
        assert!(msg.contains("tau_m"));
        assert!(msg.contains("must be > 0"));
    }

    #[test]
    fn variants_are_distinguishable() {
        let a = KernelError::kernel_exception("pool empty");
        let b = KernelError::illegal_connection("device target");
        assert_ne!(a, b);
    }
}
