//! The cross-validation harness.
//!
//! Each fold is an isolated training run: its own masks, its own rng (seeded
//! from the master rng before any fold starts), its own factors and trace.
//! Folds share only the read-only data, so they may run on the rayon pool;
//! for a fixed seed the report is identical either way.

use crate::folds::{FoldMasks, KFold};
use cmfopt_core::{
    callback::{NoOpCallback, TrainingCallback},
    config::{CmfConfig, DivergencePolicy},
    convergence::TerminationReason,
    data::CmfData,
    error::{CmfError, Result},
    fit::{FitResult, Trainer},
    trace::TrainingTrace,
    types::Scalar,
};
use num_traits::Float;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Summary of one completed fold.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FoldResult<T: Scalar> {
    /// Fold index
    pub fold: usize,
    /// Final training RMSE of R
    pub train_rmse: T,
    /// Final held-out RMSE of R
    pub test_rmse: T,
    /// Why the fold's training stopped
    pub termination: TerminationReason,
    /// Accepted outer steps
    pub iterations: usize,
}

/// What happened to one fold.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FoldOutcome<T: Scalar> {
    /// Training finished
    Completed(FoldResult<T>),
    /// Training diverged or the line search gave up
    Failed {
        /// The fold's error
        error: CmfError,
    },
}

impl<T: Scalar> FoldOutcome<T> {
    /// The fold's result if it completed.
    pub fn result(&self) -> Option<&FoldResult<T>> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }

    /// True if the fold failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome of a cross-validation run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossValidationReport<T: Scalar> {
    /// Every fold by index
    pub folds: BTreeMap<usize, FoldOutcome<T>>,
    /// Index of the completed fold with the lowest held-out RMSE
    pub best_fold: usize,
    /// Final factors, bias and trace of the best fold
    pub best_fit: FitResult<T>,
}

impl<T: Scalar> CrossValidationReport<T> {
    /// Trace of the best fold.
    pub fn best_trace(&self) -> &TrainingTrace<T> {
        &self.best_fit.trace
    }

    /// Completed folds in index order.
    pub fn completed(&self) -> impl Iterator<Item = &FoldResult<T>> + '_ {
        self.folds.values().filter_map(FoldOutcome::result)
    }

    /// Number of failed folds.
    pub fn n_failed(&self) -> usize {
        self.folds.values().filter(|o| o.is_failed()).count()
    }

    /// Held-out RMSE of each completed fold.
    pub fn test_rmse_values(&self) -> Vec<T> {
        self.completed().map(|r| r.test_rmse).collect()
    }

    /// Mean held-out RMSE over completed folds.
    pub fn mean_test_rmse(&self) -> T {
        let values = self.test_rmse_values();
        mean(&values)
    }

    /// Population standard deviation of the held-out RMSE over completed folds.
    pub fn std_test_rmse(&self) -> T {
        let values = self.test_rmse_values();
        let mu = mean(&values);
        let var = mean(&values.iter().map(|&v| (v - mu) * (v - mu)).collect::<Vec<_>>());
        <T as Float>::sqrt(var)
    }
}

fn mean<T: Scalar>(values: &[T]) -> T {
    if values.is_empty() {
        return T::zero();
    }
    values.iter().copied().fold(T::zero(), |a, b| a + b) / <T as Scalar>::from_usize(values.len())
}

/// K-fold cross-validation over the observed entries of R.
#[derive(Debug, Clone)]
pub struct CrossValidator<T: Scalar> {
    config: CmfConfig<T>,
}

impl<T: Scalar> CrossValidator<T> {
    /// Creates a harness; the configuration is validated when running.
    pub fn new(config: CmfConfig<T>) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CmfConfig<T> {
        &self.config
    }

    /// Runs every fold without callbacks.
    ///
    /// # Errors
    ///
    /// See [`run_with_callback`](Self::run_with_callback).
    pub fn run(&self, data: &CmfData<T>) -> Result<CrossValidationReport<T>> {
        self.run_with_callback(data, |_| NoOpCallback)
    }

    /// Runs every fold, giving each its own callback built by `factory(fold)`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` for bad hyperparameters or too few observed
    ///   entries for the fold count
    /// - `DimensionMismatch` / `NumericalDegeneracy` from any fold
    /// - a fold's `Divergence` / `LineSearchFailed` under
    ///   [`DivergencePolicy::Abort`]
    /// - `NoSuccessfulFold` when every fold failed
    pub fn run_with_callback<F, C>(&self, data: &CmfData<T>, factory: F) -> Result<CrossValidationReport<T>>
    where
        F: Fn(usize) -> C + Sync,
        C: TrainingCallback<T>,
    {
        let config = &self.config;
        config.validate()?;

        let coords = data.observed_entries();
        let mut master = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let folds = KFold::new(config.n_folds).split_with_rng(coords.len(), &mut master)?;
        let fold_seeds: Vec<u64> = folds.iter().map(|_| master.gen()).collect();

        info!(
            n_folds = config.n_folds,
            observed = coords.len(),
            parallel = config.parallel_folds,
            "starting cross-validation"
        );

        let trainer = Trainer::new(config.clone());
        let run_fold = |fold: usize| -> Result<(FoldResult<T>, FitResult<T>)> {
            let masks = FoldMasks::build(data.weight_r(), &coords, &folds[fold])?;
            let mut rng = StdRng::seed_from_u64(fold_seeds[fold]);
            let mut callback = factory(fold);
            let fit = trainer.fit(data, &masks.weight_train, &masks.weight_test, &mut rng, &mut callback)?;

            let last = fit
                .final_record()
                .copied()
                .ok_or_else(|| CmfError::numerical_degeneracy("trace", "empty training trace"))?;
            let test_rmse = fit.score(data.r(), &masks.weight_test)?;

            let result = FoldResult {
                fold,
                train_rmse: last.rmse_r_train,
                test_rmse,
                termination: fit.termination,
                iterations: fit.iterations,
            };
            info!(
                fold,
                train_rmse = %result.train_rmse,
                test_rmse = %result.test_rmse,
                iterations = result.iterations,
                termination = %result.termination,
                "fold finished"
            );
            Ok((result, fit))
        };

        let outcomes = self.dispatch(folds.len(), &run_fold);
        self.collect_report(outcomes)
    }

    fn dispatch<G>(&self, n_folds: usize, run_fold: &G) -> Vec<Result<(FoldResult<T>, FitResult<T>)>>
    where
        G: Fn(usize) -> Result<(FoldResult<T>, FitResult<T>)> + Sync,
    {
        if self.config.parallel_folds {
            #[cfg(feature = "parallel")]
            {
                return (0..n_folds).into_par_iter().map(run_fold).collect();
            }
            #[cfg(not(feature = "parallel"))]
            warn!("parallel folds requested without the `parallel` feature; running sequentially");
        }

        let mut outcomes = Vec::with_capacity(n_folds);
        for fold in 0..n_folds {
            let outcome = run_fold(fold);
            let abort = match &outcome {
                Ok(_) => false,
                Err(e) => !e.is_training_failure() || self.config.divergence_policy == DivergencePolicy::Abort,
            };
            outcomes.push(outcome);
            if abort {
                break;
            }
        }
        outcomes
    }

    fn collect_report(
        &self,
        outcomes: Vec<Result<(FoldResult<T>, FitResult<T>)>>,
    ) -> Result<CrossValidationReport<T>> {
        let n_folds = self.config.n_folds;
        let mut folds = BTreeMap::new();
        let mut best: Option<(usize, T, FitResult<T>)> = None;

        for (fold, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok((result, fit)) => {
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, rmse, _)| result.test_rmse < *rmse);
                    if better {
                        best = Some((fold, result.test_rmse, fit));
                    }
                    folds.insert(fold, FoldOutcome::Completed(result));
                }
                Err(error) if error.is_training_failure() => {
                    if self.config.divergence_policy == DivergencePolicy::Abort {
                        warn!(fold, error = %error, "fold failed, aborting");
                        return Err(error);
                    }
                    warn!(fold, error = %error, "fold failed, skipping");
                    folds.insert(fold, FoldOutcome::Failed { error });
                }
                Err(error) => return Err(error),
            }
        }

        let (best_fold, _, best_fit) = best.ok_or(CmfError::NoSuccessfulFold { n_folds })?;

        let report = CrossValidationReport {
            folds,
            best_fold,
            best_fit,
        };
        info!(
            best_fold,
            mean_test_rmse = %report.mean_test_rmse(),
            std_test_rmse = %report.std_test_rmse(),
            failed = report.n_failed(),
            "cross-validation finished"
        );
        Ok(report)
    }
}

/// Cross-validates `data` under `config`.
pub fn cross_validate<T: Scalar>(data: &CmfData<T>, config: &CmfConfig<T>) -> Result<CrossValidationReport<T>> {
    CrossValidator::new(config.clone()).run(data)
}
