//! K-fold cross-validation for collective matrix factorization.
//!
//! The observed entries of R are partitioned into folds; each fold is held
//! out once while the model trains on the rest. The report keeps every
//! fold's outcome, the best fold's final factors and trace, and the mean and
//! standard deviation of the held-out RMSE.
//!
//! # Example
//!
//! ```rust
//! use cmfopt_core::prelude::*;
//! use cmfopt_cv::prelude::*;
//! use nalgebra::DMatrix;
//!
//! let r = DMatrix::from_fn(6, 5, |i, j| ((i + 2 * j) % 5) as f64 + 1.0);
//! let d = DMatrix::from_fn(6, 2, |i, k| ((i + k) % 3) as f64 / 3.0);
//! let s = DMatrix::from_fn(5, 2, |j, k| ((j * k) % 4) as f64 / 4.0);
//! let data = CmfData::from_raw(r, d, s)?;
//!
//! let config = CmfConfig::new()
//!     .with_rank(2)
//!     .with_n_folds(3)
//!     .with_max_steps(20)
//!     .with_seed(7);
//! let report = CrossValidator::new(config).run(&data)?;
//!
//! assert_eq!(report.folds.len(), 3);
//! assert!(report.mean_test_rmse() >= 0.0);
//! # Ok::<(), CmfError>(())
//! ```

pub mod folds;
pub mod harness;

pub use folds::{FoldMasks, KFold};
pub use harness::{cross_validate, CrossValidationReport, CrossValidator, FoldOutcome, FoldResult};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::folds::{FoldMasks, KFold};
    pub use crate::harness::{
        cross_validate, CrossValidationReport, CrossValidator, FoldOutcome, FoldResult,
    };
}
