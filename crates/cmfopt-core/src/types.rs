//! Type definitions and aliases for collective matrix factorization.
//!
//! This module provides the scalar trait shared by every algorithm in the
//! workspace, dense matrix aliases and the numerical constants used as
//! defaults by the step controller.

use nalgebra::{Dyn, OMatrix, OVector, RealField, Scalar as NalgebraScalar};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};

/// Trait for scalar types used in factorization (f32 or f64).
///
/// This trait combines all the numeric traits required by the evaluator,
/// the gradient computer and the step controller.
pub trait Scalar:
    NalgebraScalar
    + RealField
    + Float
    + FromPrimitive
    + Display
    + Debug
    + Default
    + Copy
    + Send
    + Sync
    + 'static
{
    /// Machine epsilon for this scalar type.
    const EPSILON: Self;

    /// Default threshold on the absolute loss change for convergence.
    const DEFAULT_CONVERGENCE_THRESHOLD: Self;

    /// Smallest step size the line search will try before giving up.
    const MIN_STEP_SIZE: Self;

    /// Convert from f64 (for constants).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_from_f64` for a non-panicking version.
    fn from_f64(v: f64) -> Self {
        <Self as FromPrimitive>::from_f64(v).expect("Failed to convert from f64")
    }

    /// Try to convert from f64.
    ///
    /// Returns None if the conversion fails.
    fn try_from_f64(v: f64) -> Option<Self> {
        <Self as FromPrimitive>::from_f64(v)
    }

    /// Convert to f64 (for logging/display).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_to_f64` for a non-panicking version.
    fn to_f64(self) -> f64 {
        num_traits::cast(self).expect("Failed to convert to f64")
    }

    /// Try to convert to f64.
    fn try_to_f64(self) -> Option<f64> {
        num_traits::cast(self)
    }

    /// Convert from usize (for entry counts).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails.
    fn from_usize(v: usize) -> Self {
        <Self as FromPrimitive>::from_usize(v).expect("Failed to convert from usize")
    }
}

impl Scalar for f32 {
    const EPSILON: Self = f32::EPSILON;
    const DEFAULT_CONVERGENCE_THRESHOLD: Self = 1.0;
    const MIN_STEP_SIZE: Self = 1e-20;
}

impl Scalar for f64 {
    const EPSILON: Self = f64::EPSILON;
    const DEFAULT_CONVERGENCE_THRESHOLD: Self = 1.0;
    const MIN_STEP_SIZE: Self = 1e-30;
}

/// Type alias for a dynamically-sized matrix.
pub type DMatrix<T> = OMatrix<T, Dyn, Dyn>;

/// Type alias for a dynamically-sized vector.
pub type DVector<T> = OVector<T, Dyn>;

/// Shape of a matrix as `(rows, cols)`.
pub type Shape = (usize, usize);

/// Formats a shape the way error messages print it.
pub fn shape_string(shape: Shape) -> String {
    format!("{}x{}", shape.0, shape.1)
}

/// Numerical constants for different precision levels.
pub mod constants {
    use super::Scalar;

    /// Get machine epsilon for the given scalar type.
    pub fn epsilon<T: Scalar>() -> T {
        T::EPSILON
    }

    /// Get the default convergence threshold.
    pub fn convergence_threshold<T: Scalar>() -> T {
        T::DEFAULT_CONVERGENCE_THRESHOLD
    }

    /// Get the smallest line-search step size.
    pub fn min_step_size<T: Scalar>() -> T {
        T::MIN_STEP_SIZE
    }
}
