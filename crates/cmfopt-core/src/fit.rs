//! The training loop.
//!
//! One fit turns a data set and a train/held-out split of R into final
//! factors:
//!
//! 1. compute the row bias on the training entries and freeze it
//! 2. draw U, P, V, Q uniformly from [0, 1)
//! 3. per outer step: record the current state, compute exact gradients,
//!    run the line search from the scheduled step size, check convergence
//!    and notify the callback
//! 4. stop on convergence, on the step ceiling or when the callback asks
//!
//! The trace ends with the record of the returned factors. Divergence and
//! line-search failures abort the run with an error.

use crate::{
    callback::{FitSummary, NoOpCallback, StepInfo, TrainingCallback},
    config::CmfConfig,
    convergence::{ConvergenceDecision, ConvergenceMonitor, TerminationReason},
    data::{row_bias, CmfData},
    error::Result,
    factors::LatentFactors,
    line_search::BacktrackingLineSearch,
    objective::CmfObjective,
    prediction::{predict, score},
    trace::{TraceRecord, TrainingTrace},
    types::{DMatrix, DVector, Scalar},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything a finished fit produces.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitResult<T: Scalar> {
    /// Final factors
    pub factors: LatentFactors<T>,
    /// Row bias frozen at the start of training
    pub bias: DVector<T>,
    /// Per-step history, ending with the final factors' metrics
    pub trace: TrainingTrace<T>,
    /// Why training stopped
    pub termination: TerminationReason,
    /// Number of accepted outer steps
    pub iterations: usize,
    /// Total loss evaluations, initial evaluation included
    pub loss_evaluations: usize,
}

impl<T: Scalar> FitResult<T> {
    /// Metrics of the final factors.
    pub fn final_record(&self) -> Option<&TraceRecord<T>> {
        self.trace.last()
    }

    /// Predicted R = U·Vᵗ + mu.
    pub fn predict(&self) -> DMatrix<T> {
        predict(&self.factors, &self.bias)
    }

    /// RMSE of the predictions on the entries where `weight == 1`.
    pub fn score(&self, r: &DMatrix<T>, weight: &DMatrix<T>) -> Result<T> {
        score(r, &self.factors, &self.bias, weight)
    }
}

/// Runs the fit loop under one configuration.
#[derive(Debug, Clone)]
pub struct Trainer<T: Scalar> {
    config: CmfConfig<T>,
    line_search: BacktrackingLineSearch,
}

impl<T: Scalar> Trainer<T> {
    /// Creates a trainer; the configuration is validated when fitting.
    pub fn new(config: CmfConfig<T>) -> Self {
        Self {
            config,
            line_search: BacktrackingLineSearch::new(),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CmfConfig<T> {
        &self.config
    }

    /// Trains on the entries of `weight_r_train`, reporting held-out RMSE on
    /// `weight_r_test` (which may be all zeros).
    ///
    /// `rng` draws the initial factors. The same rng state, data and
    /// configuration always yield the same result.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` / `DimensionMismatch` for bad inputs
    /// - `NumericalDegeneracy` when a training mask is empty
    /// - `LineSearchFailed` or `Divergence` when training breaks down
    /// - any error returned by the callback
    pub fn fit<R, C>(
        &self,
        data: &CmfData<T>,
        weight_r_train: &DMatrix<T>,
        weight_r_test: &DMatrix<T>,
        rng: &mut R,
        callback: &mut C,
    ) -> Result<FitResult<T>>
    where
        R: Rng + ?Sized,
        C: TrainingCallback<T> + ?Sized,
    {
        let config = &self.config;
        config.validate()?;
        data.check_r_mask("WeightR_train", weight_r_train)?;

        let bias = row_bias(data.r(), weight_r_train);
        let objective = CmfObjective::new(data, &bias, weight_r_train, weight_r_test, config)?;
        let monitor = ConvergenceMonitor::new(config.convergence_threshold);

        let mut factors = LatentFactors::random(data.dims(), config.rank, rng);
        let mut evaluation = objective.evaluate(&factors)?;
        let mut loss_evaluations = 1;

        let start = Instant::now();
        let mut trace = TrainingTrace::new();
        let mut termination = TerminationReason::MaxSteps;
        let mut iterations = 0;
        let mut stationary = false;

        info!(
            rank = config.rank,
            max_steps = config.max_steps,
            train_entries = %weight_r_train.sum(),
            loss = %evaluation.loss,
            "starting fit"
        );
        callback.on_fit_start(&TraceRecord::from(&evaluation))?;

        for step in 0..config.max_steps {
            trace.push(TraceRecord::from(&evaluation));

            let gradients = objective.gradients(&evaluation, &factors);
            let gradient_norm = gradients.norm();
            if gradient_norm == T::zero() {
                debug!(step, "gradient vanished");
                termination = TerminationReason::Converged;
                stationary = true;
                break;
            }

            let initial_step = config.step_schedule.get_step_size(step);
            let accepted = self
                .line_search
                .search(
                    &objective,
                    &factors,
                    &evaluation,
                    &gradients,
                    initial_step,
                    &config.line_search,
                )
                .inspect_err(|e| warn!(step, error = %e, "line search failed"))?;
            loss_evaluations += accepted.function_evals;

            let decision = monitor
                .check(evaluation.loss, accepted.evaluation.loss, step)
                .inspect_err(|e| warn!(step, error = %e, "loss diverged"))?;

            let previous_loss = evaluation.loss;
            factors = accepted.factors;
            evaluation = accepted.evaluation;
            iterations += 1;

            if config.debug {
                debug!(
                    step,
                    loss = %evaluation.loss,
                    rmse_r = %evaluation.rmse_r_train,
                    rmse_d = %evaluation.rmse_d_train,
                    rmse_s = %evaluation.rmse_s_train,
                    step_size = %accepted.step_size,
                    evals = accepted.function_evals,
                    "accepted step"
                );
            }

            let info = StepInfo {
                step,
                previous_loss,
                record: TraceRecord::from(&evaluation),
                step_size: accepted.step_size,
                gradient_norm,
                function_evals: accepted.function_evals,
                elapsed: start.elapsed(),
            };
            let keep_going = callback.on_step_end(&info)?;

            if decision == ConvergenceDecision::Converged {
                termination = TerminationReason::Converged;
                break;
            }
            if !keep_going {
                termination = TerminationReason::CallbackRequest;
                break;
            }
        }

        let final_record = TraceRecord::from(&evaluation);
        if !stationary {
            trace.push(final_record);
        }

        let summary = FitSummary {
            iterations,
            termination,
            final_record,
            loss_evaluations,
            elapsed: start.elapsed(),
        };
        callback.on_fit_end(&summary)?;

        info!(
            iterations,
            termination = %termination,
            loss = %final_record.loss,
            rmse_r = %final_record.rmse_r_train,
            "fit finished"
        );

        Ok(FitResult {
            factors,
            bias,
            trace,
            termination,
            iterations,
            loss_evaluations,
        })
    }
}

/// Fits with a `StdRng` seeded from `config.seed` (or from entropy) and no
/// callback.
pub fn fit<T: Scalar>(
    data: &CmfData<T>,
    weight_r_train: &DMatrix<T>,
    weight_r_test: &DMatrix<T>,
    config: &CmfConfig<T>,
) -> Result<FitResult<T>> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Trainer::new(config.clone()).fit(data, weight_r_train, weight_r_test, &mut rng, &mut NoOpCallback)
}

/// Fits on every observed entry of R, without held-out entries.
pub fn fit_observed<T: Scalar>(data: &CmfData<T>, config: &CmfConfig<T>) -> Result<FitResult<T>> {
    let (m, n) = data.r().shape();
    fit(data, data.weight_r(), &DMatrix::zeros(m, n), config)
}
