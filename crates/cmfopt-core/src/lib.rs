//! Core engine for collective matrix factorization.
//!
//! Collective matrix factorization (CMF) jointly factorizes a partially
//! observed primary matrix R (m×n) and two side matrices sharing its
//! entities: D (m×l) describes the row entities and S (n×h) the column
//! entities.
//!
//! ```text
//! R ≈ U·Vᵗ + mu     D ≈ U·Pᵗ     S ≈ V·Qᵗ
//! ```
//!
//! Training is full-batch gradient descent on the masked, regularized
//! squared error with a backtracking line search and a loss-change
//! convergence test.
//!
//! # Modules
//!
//! - [`data`]: Input matrices, masks and the row bias
//! - [`factors`]: Latent factor matrices and gradients
//! - [`objective`]: Masked errors, RMSEs and the loss
//! - [`gradient`]: Exact gradients of the loss
//! - [`line_search`]: Backtracking step control
//! - [`step_size`]: Initial step size schedules
//! - [`convergence`]: Convergence and divergence detection
//! - [`fit`]: The training loop
//! - [`callback`]: Training observers
//! - [`trace`]: Per-step history
//! - [`prediction`]: Reconstruction and scoring
//! - [`config`]: Hyperparameters
//! - [`error`]: Error types
//! - [`types`]: Scalar trait and matrix aliases
//!
//! # Example
//!
//! ```rust
//! use cmfopt_core::prelude::*;
//! use nalgebra::DMatrix;
//!
//! let nan = f64::NAN;
//! let r = DMatrix::from_row_slice(3, 3, &[5.0, 3.0, nan, 4.0, nan, nan, 1.0, 1.0, 5.0]);
//! let d = DMatrix::from_row_slice(3, 2, &[0.2, 0.8, 0.5, 0.1, 0.9, 0.4]);
//! let s = DMatrix::from_row_slice(3, 2, &[0.3, 0.7, 0.6, 0.2, 0.1, 0.9]);
//! let data = CmfData::from_raw(r, d, s)?;
//!
//! let config = CmfConfig::new()
//!     .with_rank(2)
//!     .with_max_steps(50)
//!     .with_initial_step_size(0.1)
//!     .with_convergence_threshold(1e-6)
//!     .with_seed(42);
//! let result = fit_observed(&data, &config)?;
//!
//! let losses = result.trace.losses();
//! assert!(losses.windows(2).all(|w| w[1] < w[0]));
//! # Ok::<(), CmfError>(())
//! ```

pub mod callback;
pub mod config;
pub mod convergence;
pub mod data;
pub mod error;
pub mod factors;
pub mod fit;
pub mod gradient;
pub mod line_search;
pub mod objective;
pub mod prediction;
pub mod step_size;
pub mod trace;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used items at the crate root
pub use error::{CmfError, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use cmfopt_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::callback::{
        FitSummary, LoggingCallback, NoOpCallback, StepInfo, TraceCollector, TrainingCallback,
    };
    pub use crate::config::{CmfConfig, DivergencePolicy};
    pub use crate::convergence::{ConvergenceDecision, ConvergenceMonitor, TerminationReason};
    pub use crate::data::{row_bias, CmfData, Dimensions};
    pub use crate::error::{CmfError, Result};
    pub use crate::factors::{Gradients, LatentFactors};
    pub use crate::fit::{fit, fit_observed, FitResult, Trainer};
    pub use crate::gradient::compute_gradients;
    pub use crate::line_search::{BacktrackingLineSearch, LineSearchParams, LineSearchResult};
    pub use crate::objective::{evaluate, masked_rmse, CmfObjective, Evaluation};
    pub use crate::prediction::{predict, score};
    pub use crate::step_size::StepSizeSchedule;
    pub use crate::trace::{TraceRecord, TrainingTrace};
    pub use crate::types::{constants, DMatrix, DVector, Scalar};
}
