//! Initial step size schedules for the outer gradient-descent loop.
//!
//! The backtracking line search restarts every outer step from a fixed
//! initial step size; it is never carried over from the previously accepted
//! value. A schedule decides what that starting value is for step `k`.
//!
//! # Schedules
//!
//! - **Constant**: γₖ = γ₀ (the reference behaviour)
//! - **Inverse scaling**: γₖ = γ₀ / (k + 1)ᵖ
//! - **Exponential decay**: γₖ = γ₀ · βᵏ
//!
//! # Examples
//!
//! ```rust
//! use cmfopt_core::step_size::StepSizeSchedule;
//!
//! let schedule = StepSizeSchedule::inverse_scaling(0.01_f64, 0.25);
//! assert!(schedule.get_step_size(15) < schedule.get_step_size(0));
//! ```

use crate::error::{CmfError, Result};
use crate::types::Scalar;
use num_traits::Float;
use std::fmt::Debug;

/// Starting step size of the line search at each outer step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepSizeSchedule<T: Scalar> {
    /// Fixed starting step γₖ = γ₀ for all outer steps
    Constant(T),

    /// Inverse scaling: γₖ = γ₀ / (k + 1)ᵖ
    InverseScaling {
        /// Initial step size γ₀
        initial: T,
        /// Decay power p > 0
        power: T,
    },

    /// Exponential decay: γₖ = γ₀ · βᵏ where 0 < β ≤ 1
    ExponentialDecay {
        /// Initial step size γ₀
        initial: T,
        /// Decay factor β
        decay_rate: T,
    },
}

impl<T: Scalar> Default for StepSizeSchedule<T> {
    fn default() -> Self {
        Self::Constant(<T as Scalar>::from_f64(0.01))
    }
}

impl<T: Scalar> StepSizeSchedule<T> {
    /// Computes the starting step size for outer step `step` (0-based).
    pub fn get_step_size(&self, step: usize) -> T {
        match self {
            Self::Constant(gamma) => *gamma,

            Self::InverseScaling { initial, power } => {
                let t = <T as Scalar>::from_usize(step + 1);
                *initial / <T as Float>::powf(t, *power)
            }

            Self::ExponentialDecay {
                initial,
                decay_rate,
            } => {
                let k = <T as Scalar>::from_usize(step);
                *initial * <T as Float>::powf(*decay_rate, k)
            }
        }
    }

    /// Step size at the first outer step.
    pub fn initial(&self) -> T {
        self.get_step_size(0)
    }

    /// Creates a constant schedule.
    pub fn constant(step_size: T) -> Self {
        Self::Constant(step_size)
    }

    /// Creates an inverse scaling schedule γ₀ / (k + 1)ᵖ.
    pub fn inverse_scaling(initial: T, power: T) -> Self {
        Self::InverseScaling { initial, power }
    }

    /// Creates an exponential decay schedule γ₀ · βᵏ.
    pub fn exponential_decay(initial: T, decay_rate: T) -> Self {
        Self::ExponentialDecay {
            initial,
            decay_rate,
        }
    }

    /// Checks that every step size the schedule can produce is positive.
    pub fn validate(&self) -> Result<()> {
        let initial = self.initial();
        if !(initial > T::zero()) || !<T as Float>::is_finite(initial) {
            return Err(CmfError::invalid_configuration(
                "initial step size must be positive and finite",
                "initial_step_size",
                initial.to_string(),
            ));
        }

        match self {
            Self::Constant(_) => Ok(()),
            Self::InverseScaling { power, .. } => {
                if *power < T::zero() || !<T as Float>::is_finite(*power) {
                    return Err(CmfError::invalid_configuration(
                        "inverse scaling power must be non-negative",
                        "step_schedule.power",
                        power.to_string(),
                    ));
                }
                Ok(())
            }
            Self::ExponentialDecay { decay_rate, .. } => {
                if !(*decay_rate > T::zero()) || *decay_rate > T::one() {
                    return Err(CmfError::invalid_configuration(
                        "decay rate must be in (0, 1]",
                        "step_schedule.decay_rate",
                        decay_rate.to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}
