//! Per-neuron receptor-port bookkeeping.
//!
//! The set of receptor indices claimed by incoming connections only grows;
//! a model that supports receptor multiplexing tracks the highest
//! recognized port and refuses to shrink it while any connection still
//! targets a receptor at or above the requested count.

use esk_types::{KernelError, ReceptorType, Result};

/// Tracks the highest receptor index a neuron recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceptorTable {
    recognized: usize,
}

impl ReceptorTable {
    /// A neuron with only the default receptor (port 0).
    pub fn single_receptor() -> Self {
        Self { recognized: 1 }
    }

    /// A neuron recognizing `count` receptor ports from construction.
    pub fn with_count(count: usize) -> Self {
        Self {
            recognized: count.max(1),
        }
    }

    /// Number of receptor ports currently recognized.
    pub fn recognized_count(&self) -> usize {
        self.recognized
    }

    /// Register an incoming connection targeting `receptor`. If `receptor`
    /// is beyond the currently recognized range, the range grows to
    /// include it.
    ///
    /// # Errors
    /// [`KernelError::IncompatibleReceptorType`] if the model does not
    /// support multiplexing (i.e. is fixed at a single receptor) and
    /// `receptor` is not the default port.
    pub fn claim(&mut self, receptor: ReceptorType, supports_multiplexing: bool) -> Result<()> {
        if !supports_multiplexing && receptor != ReceptorType::DEFAULT {
            return Err(KernelError::incompatible_receptor(
                receptor.index(),
                self.recognized - 1,
            ));
        }
        self.recognized = self.recognized.max(receptor.index() + 1);
        Ok(())
    }

    /// Attempt to lower the recognized count to `new_count`. Refused with
    /// [`KernelError::BadProperty`] if any claimed receptor (index `>=
    /// new_count`) would be orphaned; the caller must remove those
    /// connections first.
    pub fn try_shrink(&mut self, new_count: usize, highest_claimed: usize) -> Result<()> {
        if new_count <= highest_claimed {
            return Err(KernelError::bad_property(
                "receptor_count",
                "recognized receptor count may not drop below the highest index in use",
            ));
        }
        self.recognized = new_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claiming_a_higher_port_grows_the_range() {
        let mut t = ReceptorTable::single_receptor();
        t.claim(ReceptorType::new(3), true).unwrap();
        assert_eq!(t.recognized_count(), 4);
    }

    #[test]
    fn claiming_non_default_port_without_multiplexing_is_rejected() {
        let mut t = ReceptorTable::single_receptor();
        let err = t.claim(ReceptorType::new(1), false).unwrap_err();
        assert!(matches!(err, KernelError::IncompatibleReceptorType { .. }));
    }

    #[test]
    fn shrink_below_highest_claimed_is_rejected() {
        let mut t = ReceptorTable::with_count(5);
        let err = t.try_shrink(2, 3).unwrap_err();
        assert!(matches!(err, KernelError::BadProperty { .. }));
    }

    #[test]
    fn shrink_above_highest_claimed_succeeds() {
        let mut t = ReceptorTable::with_count(5);
        t.try_shrink(4, 2).unwrap();
        assert_eq!(t.recognized_count(), 4);
    }
}
