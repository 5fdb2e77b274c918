//! Hyperparameters for collective matrix factorization.
//!
//! A [`CmfConfig`] is built once, validated once at entry and then passed by
//! reference into every component. There is no process-wide state.

use crate::{
    error::{CmfError, Result},
    line_search::LineSearchParams,
    step_size::StepSizeSchedule,
    types::Scalar,
};
use num_traits::Float;

/// What the cross-validation harness does when one fold's training fails
/// with a divergence or an exhausted line search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DivergencePolicy {
    /// Record the fold as failed and continue with the remaining folds.
    #[default]
    SkipFold,
    /// Stop the whole run and return the fold's error.
    Abort,
}

/// Configuration for training and cross-validating a factorization.
///
/// `alphas` weight the reconstruction of R, D and S; `lambdas` regularize
/// (U, V), P and Q respectively.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CmfConfig<T: Scalar> {
    /// Reconstruction weights [alpha_R, alpha_D, alpha_S]
    pub alphas: [T; 3],

    /// Regularization weights [lambda_UV, lambda_P, lambda_Q]
    pub lambdas: [T; 3],

    /// Shared embedding dimension f
    pub rank: usize,

    /// Outer-step ceiling of the fit loop
    pub max_steps: usize,

    /// Number of cross-validation folds
    pub n_folds: usize,

    /// Largest non-negative loss change still counted as convergence
    pub convergence_threshold: T,

    /// Starting step size of the line search at each outer step
    pub step_schedule: StepSizeSchedule<T>,

    /// Backtracking parameters and termination bounds
    pub line_search: LineSearchParams<T>,

    /// Seed for factor initialization and fold shuffling (None = entropy)
    pub seed: Option<u64>,

    /// Emit per-step debug events
    pub debug: bool,

    /// Dispatch folds to the rayon thread pool
    pub parallel_folds: bool,

    /// Harness behaviour on a failed fold
    pub divergence_policy: DivergencePolicy,
}

impl<T: Scalar> Default for CmfConfig<T> {
    fn default() -> Self {
        Self {
            alphas: [T::one(), T::one(), T::one()],
            lambdas: [<T as Scalar>::from_f64(0.1); 3],
            rank: 5,
            max_steps: 300,
            n_folds: 10,
            convergence_threshold: T::DEFAULT_CONVERGENCE_THRESHOLD,
            step_schedule: StepSizeSchedule::default(),
            line_search: LineSearchParams::default(),
            seed: None,
            debug: false,
            parallel_folds: false,
            divergence_policy: DivergencePolicy::default(),
        }
    }
}

impl<T: Scalar> CmfConfig<T> {
    /// Creates a configuration with default hyperparameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reconstruction weights for R, D and S.
    pub fn with_alphas(mut self, alphas: [T; 3]) -> Self {
        self.alphas = alphas;
        self
    }

    /// Sets the regularization weights for (U, V), P and Q.
    pub fn with_lambdas(mut self, lambdas: [T; 3]) -> Self {
        self.lambdas = lambdas;
        self
    }

    /// Sets the embedding dimension f.
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Sets the outer-step ceiling.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the number of folds.
    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    /// Sets the convergence threshold on the loss change.
    pub fn with_convergence_threshold(mut self, threshold: T) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Uses a constant starting step size.
    pub fn with_initial_step_size(mut self, step_size: T) -> Self {
        self.step_schedule = StepSizeSchedule::Constant(step_size);
        self
    }

    /// Sets the starting step schedule.
    pub fn with_step_schedule(mut self, schedule: StepSizeSchedule<T>) -> Self {
        self.step_schedule = schedule;
        self
    }

    /// Sets the line search parameters.
    pub fn with_line_search(mut self, params: LineSearchParams<T>) -> Self {
        self.line_search = params;
        self
    }

    /// Fixes the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables per-step debug events.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enables parallel fold dispatch.
    pub fn with_parallel_folds(mut self, parallel: bool) -> Self {
        self.parallel_folds = parallel;
        self
    }

    /// Sets the harness behaviour on failed folds.
    pub fn with_divergence_policy(mut self, policy: DivergencePolicy) -> Self {
        self.divergence_policy = policy;
        self
    }

    /// Starting step size of the first outer step.
    pub fn initial_step_size(&self) -> T {
        self.step_schedule.initial()
    }

    /// Validates every hyperparameter.
    ///
    /// # Errors
    ///
    /// Returns `CmfError::InvalidConfiguration` if:
    /// - `rank` or `max_steps` is zero
    /// - `n_folds` is below 2
    /// - an alpha, lambda or the convergence threshold is negative or not finite
    /// - the step schedule or the line search parameters are invalid
    /// - the schedule decays below the minimum step size before `max_steps`
    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(CmfError::invalid_configuration(
                "embedding dimension must be at least 1",
                "rank",
                "0",
            ));
        }

        if self.max_steps == 0 {
            return Err(CmfError::invalid_configuration(
                "at least one outer step is required",
                "max_steps",
                "0",
            ));
        }

        if self.n_folds < 2 {
            return Err(CmfError::invalid_configuration(
                "cross-validation needs at least 2 folds",
                "n_folds",
                self.n_folds.to_string(),
            ));
        }

        for (name, values) in [("alphas", &self.alphas), ("lambdas", &self.lambdas)] {
            for (k, value) in values.iter().enumerate() {
                check_non_negative(*value, &format!("{name}[{k}]"))?;
            }
        }
        check_non_negative(self.convergence_threshold, "convergence_threshold")?;

        self.step_schedule.validate()?;
        self.line_search.validate(self.initial_step_size())?;

        // Schedules never increase, so the last outer step starts lowest
        let last_step = self.step_schedule.get_step_size(self.max_steps - 1);
        if !(self.line_search.min_step_size < last_step) {
            return Err(CmfError::invalid_configuration(
                format!(
                    "step size at outer step {} must stay above the minimum step size {}",
                    self.max_steps - 1,
                    self.line_search.min_step_size
                ),
                "step_schedule",
                last_step.to_string(),
            ));
        }

        Ok(())
    }
}

fn check_non_negative<T: Scalar>(value: T, parameter: &str) -> Result<()> {
    if value < T::zero() || !<T as Float>::is_finite(value) {
        return Err(CmfError::invalid_configuration(
            "must be non-negative and finite",
            parameter,
            value.to_string(),
        ));
    }
    Ok(())
}
