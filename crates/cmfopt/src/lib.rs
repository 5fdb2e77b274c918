//! # cmfopt
//!
//! Collective matrix factorization trained by full-batch gradient descent,
//! with k-fold cross-validation over the observed ratings.
//!
//! This crate re-exports the training engine ([`cmfopt_core`]) and the
//! cross-validation harness ([`cmfopt_cv`]) behind a single prelude.
//!
//! ## Features
//!
//! - `parallel` (default): run folds on the rayon thread pool when
//!   `CmfConfig::parallel_folds` is set
//! - `serde`: serialize configurations, traces and reports
//! - `full`: all of the above
//!
//! ## Example
//!
//! ```rust
//! use cmfopt::prelude::*;
//!
//! let r = DMatrix::from_fn(6, 5, |i, j| ((i * 3 + j) % 5) as f64 + 1.0);
//! let d = DMatrix::from_fn(6, 3, |i, k| ((i + k) % 4) as f64 / 4.0);
//! let s = DMatrix::from_fn(5, 2, |j, k| ((2 * j + k) % 3) as f64 / 3.0);
//! let data = CmfData::from_raw(r, d, s)?;
//!
//! let config = CmfConfig::new()
//!     .with_rank(2)
//!     .with_n_folds(3)
//!     .with_max_steps(25)
//!     .with_seed(11);
//!
//! let report = cross_validate(&data, &config)?;
//! println!(
//!     "held-out RMSE {:.3} ± {:.3}",
//!     report.mean_test_rmse(),
//!     report.std_test_rmse()
//! );
//! # Ok::<(), CmfError>(())
//! ```

pub use cmfopt_core;
pub use cmfopt_cv;

pub use cmfopt_core::{CmfError, Result};

/// Re-export of nalgebra for matrix construction.
pub use nalgebra;

/// Everything needed to load data, train and cross-validate.
pub mod prelude {
    pub use cmfopt_core::prelude::*;
    pub use cmfopt_cv::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use pretty_assertions::assert_eq;

    fn data() -> CmfData<f64> {
        let r = DMatrix::from_fn(8, 6, |i, j| ((i * 5 + j * 3) % 5) as f64 + 1.0);
        let d = DMatrix::from_fn(8, 3, |i, k| ((i + 2 * k) % 4) as f64 / 4.0);
        let s = DMatrix::from_fn(6, 2, |j, k| ((j + k) % 3) as f64 / 3.0);
        CmfData::from_raw(r, d, s).unwrap()
    }

    #[test]
    fn test_prelude_covers_training_and_validation() {
        let data = data();
        let config = CmfConfig::new()
            .with_rank(2)
            .with_n_folds(4)
            .with_max_steps(15)
            .with_initial_step_size(0.05)
            .with_seed(5);

        let fitted = fit_observed(&data, &config).unwrap();
        assert_eq!(fitted.trace.len(), fitted.iterations + 1);

        let report = cross_validate(&data, &config).unwrap();
        assert_eq!(report.folds.len(), 4);
        assert!(report.mean_test_rmse().is_finite());
    }

    #[test]
    fn test_crate_reexports() {
        let folds = crate::cmfopt_cv::KFold::new(2).with_shuffle(false).split(4).unwrap();
        assert_eq!(folds, vec![vec![0, 1], vec![2, 3]]);

        let schedule = crate::cmfopt_core::step_size::StepSizeSchedule::Constant(0.1_f64);
        approx::assert_relative_eq!(schedule.get_step_size(7), 0.1);
    }
}
