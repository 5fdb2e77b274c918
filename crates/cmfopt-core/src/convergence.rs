//! Convergence and divergence detection on the loss sequence.
//!
//! After each accepted step the monitor compares the loss before and after:
//!
//! - `change = current − next`
//! - `0 ≤ change ≤ threshold` → converged
//! - `change < 0` (or not finite) → divergence, a fatal error for the run
//! - otherwise → continue
//!
//! The step ceiling is not the monitor's concern; the fit loop enforces it.

use crate::{
    error::{CmfError, Result},
    types::Scalar,
};
use num_traits::Float;

/// Why a fit loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// The loss change fell within the convergence threshold
    Converged,
    /// The outer-step ceiling was reached
    MaxSteps,
    /// A training callback asked to stop
    CallbackRequest,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Converged => "converged",
            Self::MaxSteps => "max steps",
            Self::CallbackRequest => "callback request",
        };
        f.write_str(name)
    }
}

/// Result of one convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceDecision {
    /// Keep iterating
    Continue,
    /// Stop; the accepted state is final
    Converged,
}

/// Threshold test on consecutive losses.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceMonitor<T: Scalar> {
    threshold: T,
}

impl<T: Scalar> ConvergenceMonitor<T> {
    /// Creates a monitor with the given loss-change threshold.
    pub fn new(threshold: T) -> Self {
        Self { threshold }
    }

    /// The loss-change threshold.
    pub fn threshold(&self) -> T {
        self.threshold
    }

    /// Classifies the transition `current_loss → next_loss` at outer step `step`.
    ///
    /// # Errors
    ///
    /// Returns `CmfError::Divergence` when the loss increased or the change
    /// is not a finite number.
    pub fn check(&self, current_loss: T, next_loss: T, step: usize) -> Result<ConvergenceDecision> {
        let change = current_loss - next_loss;

        if !<T as Float>::is_finite(change) || change < T::zero() {
            return Err(CmfError::divergence(
                step,
                Scalar::to_f64(current_loss),
                Scalar::to_f64(next_loss),
            ));
        }

        if change <= self.threshold {
            Ok(ConvergenceDecision::Converged)
        } else {
            Ok(ConvergenceDecision::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decisions() {
        let monitor = ConvergenceMonitor::new(1.0_f64);
        assert_eq!(monitor.check(10.0, 5.0, 0).unwrap(), ConvergenceDecision::Continue);
        assert_eq!(monitor.check(10.0, 9.5, 1).unwrap(), ConvergenceDecision::Converged);
        // Boundaries are inclusive
        assert_eq!(monitor.check(10.0, 9.0, 2).unwrap(), ConvergenceDecision::Converged);
        assert_eq!(monitor.check(10.0, 10.0, 3).unwrap(), ConvergenceDecision::Converged);
    }

    #[test]
    fn test_increase_is_divergence() {
        let monitor = ConvergenceMonitor::new(1.0_f64);
        let err = monitor.check(10.0, 10.5, 4).unwrap_err();
        match err {
            CmfError::Divergence { step, current_loss, next_loss } => {
                assert_eq!(step, 4);
                assert_eq!(current_loss, 10.0);
                assert_eq!(next_loss, 10.5);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(monitor.check(10.0, f64::NAN, 0).is_err());
        assert!(monitor.check(f64::INFINITY, f64::INFINITY, 0).is_err());
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(TerminationReason::MaxSteps.to_string(), "max steps");
    }

    proptest! {
        #[test]
        fn prop_decreasing_sequence_never_diverges(
            start in 1.0f64..1e6,
            drops in prop::collection::vec(0.0f64..100.0, 1..50),
        ) {
            let monitor = ConvergenceMonitor::new(1.0);
            let mut loss = start;
            for (k, drop) in drops.into_iter().enumerate() {
                let next = loss - drop;
                let decision = monitor.check(loss, next, k).unwrap();
                prop_assert_eq!(decision == ConvergenceDecision::Converged, loss - next <= 1.0);
                loss = next;
            }
        }

        #[test]
        fn prop_increase_always_diverges(loss in -1e6f64..1e6, rise in 1e-6f64..1e3) {
            let monitor = ConvergenceMonitor::new(1.0);
            prop_assert!(monitor.check(loss, loss + rise, 0).is_err());
        }
    }
}
