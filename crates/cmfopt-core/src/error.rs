//! Error types for collective matrix factorization.
//!
//! This module defines the single error type used throughout the workspace
//! for shape validation, configuration checks, numerical degeneracies and
//! the fatal decisions taken by the step controller and convergence monitor.

use thiserror::Error;

/// Errors that can occur while evaluating, training or cross-validating.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CmfError {
    /// Dimension mismatch between matrices.
    ///
    /// Raised once at entry, before any computation, when a matrix or mask
    /// does not have the shape implied by the others.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which input was being checked
        context: String,
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// Invalid configuration.
    ///
    /// This error occurs when hyperparameters are out of range
    /// (e.g. zero rank, fewer than two folds, non-positive step size).
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// An RMSE denominator (a weight-mask sum) is zero.
    #[error("Numerical degeneracy in {quantity}: {reason}")]
    NumericalDegeneracy {
        /// Quantity that could not be computed
        quantity: String,
        /// Description of the degeneracy
        reason: String,
    },

    /// The loss increased across an accepted step.
    ///
    /// The candidate state is never accepted; the fold's training stops.
    #[error("Loss diverged at step {step}: {current_loss} -> {next_loss}")]
    Divergence {
        /// Outer step at which the increase was observed
        step: usize,
        /// Loss before the step
        current_loss: f64,
        /// Loss of the rejected candidate
        next_loss: f64,
    },

    /// Line search failed to find a step that decreases the loss.
    #[error("Line search failed: {reason}")]
    LineSearchFailed {
        /// Description of why the line search failed
        reason: String,
        /// Number of candidates evaluated
        iterations: usize,
        /// Last step size tried
        last_step_size: f64,
        /// Loss at the starting point
        initial_value: f64,
    },

    /// Every fold of a cross-validation run failed.
    #[error("No fold completed successfully out of {n_folds}")]
    NoSuccessfulFold {
        /// Number of folds attempted
        n_folds: usize,
    },
}

impl CmfError {
    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S0, S1, S2>(context: S0, expected: S1, actual: S2) -> Self
    where
        S0: Into<String>,
        S1: std::fmt::Display,
        S2: std::fmt::Display,
    {
        Self::DimensionMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Create a NumericalDegeneracy error.
    pub fn numerical_degeneracy<S1, S2>(quantity: S1, reason: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::NumericalDegeneracy {
            quantity: quantity.into(),
            reason: reason.into(),
        }
    }

    /// Create a Divergence error.
    pub fn divergence(step: usize, current_loss: f64, next_loss: f64) -> Self {
        Self::Divergence {
            step,
            current_loss,
            next_loss,
        }
    }

    /// Create a LineSearchFailed error with detailed context.
    pub fn line_search_failed<S: Into<String>>(
        reason: S,
        iterations: usize,
        last_step_size: f64,
        initial_value: f64,
    ) -> Self {
        Self::LineSearchFailed {
            reason: reason.into(),
            iterations,
            last_step_size,
            initial_value,
        }
    }

    /// Returns true for failures that belong to a single training run
    /// (divergence, line-search exhaustion) rather than to the inputs.
    pub fn is_training_failure(&self) -> bool {
        matches!(self, Self::Divergence { .. } | Self::LineSearchFailed { .. })
    }
}

/// Result type alias for factorization operations.
pub type Result<T> = std::result::Result<T, CmfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CmfError::dimension_mismatch("WeightR", "3x4", "3x5");
        assert!(matches!(err, CmfError::DimensionMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in WeightR: expected 3x4, got 3x5"
        );

        let err = CmfError::invalid_configuration("must be at least 2", "n_folds", "1");
        assert!(matches!(err, CmfError::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_error_context() {
        let err = CmfError::line_search_failed("step size underflow", 60, 1e-30, 42.0);

        if let CmfError::LineSearchFailed {
            reason,
            iterations,
            last_step_size,
            initial_value,
        } = err
        {
            assert_eq!(reason, "step size underflow");
            assert_eq!(iterations, 60);
            assert_eq!(last_step_size, 1e-30);
            assert_eq!(initial_value, 42.0);
        } else {
            panic!("Expected LineSearchFailed variant");
        }

        let err = CmfError::divergence(7, 1.5, 2.0);
        assert!(err.to_string().contains("step 7"));
    }

    #[test]
    fn test_training_failure_classification() {
        assert!(CmfError::divergence(0, 1.0, 2.0).is_training_failure());
        assert!(CmfError::line_search_failed("x", 1, 0.1, 1.0).is_training_failure());
        assert!(!CmfError::numerical_degeneracy("rmse(R)", "empty mask").is_training_failure());
        assert!(!CmfError::NoSuccessfulFold { n_folds: 3 }.is_training_failure());
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            CmfError::dimension_mismatch("D", "4 rows", "3 rows"),
            CmfError::invalid_configuration("negative value", "lambdas[1]", "-0.5"),
            CmfError::numerical_degeneracy("rmse(D)", "weight mask sums to zero"),
            CmfError::divergence(3, 1.0, 1.5),
            CmfError::line_search_failed("exhausted", 10, 1e-8, 3.0),
            CmfError::NoSuccessfulFold { n_folds: 5 },
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
