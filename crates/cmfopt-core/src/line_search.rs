//! Backtracking line search along the negative gradient.
//!
//! Starting from the step size γ₀ chosen by the schedule for this outer
//! step, candidates
//!
//! ```text
//! (U, V, P, Q) − γ · (∂L/∂U, ∂L/∂V, ∂L/∂P, ∂L/∂Q)
//! ```
//!
//! are evaluated with γ ← ρ·γ after each rejection. The first candidate whose
//! loss is finite and strictly below the current loss is accepted; there is
//! no sufficient-decrease slack.
//!
//! Halving alone has no floor, so the search is bounded twice: by
//! `max_iterations` rejected candidates and by `min_step_size`. Hitting
//! either bound is reported as [`CmfError::LineSearchFailed`].

use crate::{
    error::{CmfError, Result},
    factors::{Gradients, LatentFactors},
    objective::{CmfObjective, Evaluation},
    types::Scalar,
};
use num_traits::Float;

/// Backtracking factor and termination bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSearchParams<T: Scalar> {
    /// Reduction factor ρ ∈ (0, 1) applied after each rejected candidate
    pub rho: T,

    /// Smallest step size tried before declaring failure
    pub min_step_size: T,

    /// Maximum number of candidates evaluated per search
    pub max_iterations: usize,
}

impl<T: Scalar> Default for LineSearchParams<T> {
    fn default() -> Self {
        Self {
            rho: <T as Scalar>::from_f64(0.5),
            min_step_size: T::MIN_STEP_SIZE,
            max_iterations: 60,
        }
    }
}

impl<T: Scalar> LineSearchParams<T> {
    /// Sets the reduction factor.
    pub fn with_rho(mut self, rho: T) -> Self {
        self.rho = rho;
        self
    }

    /// Sets the step size floor.
    pub fn with_min_step_size(mut self, min_step_size: T) -> Self {
        self.min_step_size = min_step_size;
        self
    }

    /// Sets the candidate budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Validates the parameters against the starting step size.
    ///
    /// # Errors
    ///
    /// Returns `CmfError::InvalidConfiguration` if:
    /// - `rho` is not in (0, 1)
    /// - `min_step_size` is not positive or not below `initial_step`
    /// - `max_iterations` is zero
    pub fn validate(&self, initial_step: T) -> Result<()> {
        if !(self.rho > T::zero() && self.rho < T::one()) {
            return Err(CmfError::invalid_configuration(
                "backtracking factor rho must be in (0, 1)",
                "line_search.rho",
                self.rho.to_string(),
            ));
        }

        if !(self.min_step_size > T::zero()) {
            return Err(CmfError::invalid_configuration(
                "minimum step size must be positive",
                "line_search.min_step_size",
                self.min_step_size.to_string(),
            ));
        }

        if self.min_step_size >= initial_step {
            return Err(CmfError::invalid_configuration(
                format!("minimum step size must be below the initial step size {initial_step}"),
                "line_search.min_step_size",
                self.min_step_size.to_string(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(CmfError::invalid_configuration(
                "at least one line search iteration is required",
                "line_search.max_iterations",
                "0",
            ));
        }

        Ok(())
    }
}

/// Outcome of a successful line search.
#[derive(Debug, Clone)]
pub struct LineSearchResult<T: Scalar> {
    /// The accepted candidate state
    pub factors: LatentFactors<T>,
    /// Its full evaluation, reused as the next step's current evaluation
    pub evaluation: Evaluation<T>,
    /// The accepted step size γ
    pub step_size: T,
    /// Number of loss evaluations performed
    pub function_evals: usize,
}

/// Backtracking line search with strict-decrease acceptance.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktrackingLineSearch;

impl BacktrackingLineSearch {
    /// Creates a backtracking line search.
    pub fn new() -> Self {
        Self
    }

    /// Searches along −`gradients` from `current`, starting at `initial_step`.
    ///
    /// `current_evaluation` must be the evaluation of `current`; only its loss
    /// is read.
    ///
    /// # Errors
    ///
    /// - `LineSearchFailed` when `max_iterations` candidates were rejected or
    ///   the step size fell below `min_step_size`
    /// - any error of [`CmfObjective::evaluate`]
    pub fn search<T: Scalar>(
        &self,
        objective: &CmfObjective<'_, T>,
        current: &LatentFactors<T>,
        current_evaluation: &Evaluation<T>,
        gradients: &Gradients<T>,
        initial_step: T,
        params: &LineSearchParams<T>,
    ) -> Result<LineSearchResult<T>> {
        let current_loss = current_evaluation.loss;
        let mut gamma = initial_step;
        let mut function_evals = 0;

        while function_evals < params.max_iterations {
            if gamma < params.min_step_size {
                return Err(CmfError::line_search_failed(
                    "step size fell below the minimum",
                    function_evals,
                    Scalar::to_f64(gamma),
                    Scalar::to_f64(current_loss),
                ));
            }

            let candidate = current.step(gradients, gamma);
            let evaluation = objective.evaluate(&candidate)?;
            function_evals += 1;

            if <T as Float>::is_finite(evaluation.loss) && evaluation.loss < current_loss {
                return Ok(LineSearchResult {
                    factors: candidate,
                    evaluation,
                    step_size: gamma,
                    function_evals,
                });
            }

            gamma *= params.rho;
        }

        Err(CmfError::line_search_failed(
            "no decreasing step within the iteration budget",
            function_evals,
            Scalar::to_f64(gamma),
            Scalar::to_f64(current_loss),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CmfConfig,
        data::{row_bias, CmfData},
        gradient::compute_gradients,
        types::DMatrix,
    };
    use nalgebra::dmatrix;
    use rand::{rngs::StdRng, SeedableRng};

    fn data() -> CmfData<f64> {
        CmfData::with_dense_side(
            dmatrix![5.0, 3.0, 0.0; 4.0, 0.0, 0.0; 1.0, 1.0, 5.0],
            dmatrix![1.0, 1.0, 0.0; 1.0, 0.0, 0.0; 1.0, 1.0, 1.0],
            dmatrix![0.2, 0.8; 0.5, 0.1; 0.9, 0.4],
            dmatrix![0.3, 0.7; 0.6, 0.2; 0.1, 0.9],
        )
        .unwrap()
    }

    #[test]
    fn test_default_params() {
        let params = LineSearchParams::<f64>::default();
        assert_eq!(params.rho, 0.5);
        assert_eq!(params.max_iterations, 60);
        assert!(params.validate(0.01).is_ok());
    }

    #[test]
    fn test_param_validation() {
        let params = LineSearchParams::<f64>::default();
        assert!(params.with_rho(1.0).validate(0.01).is_err());
        assert!(params.with_rho(0.0).validate(0.01).is_err());
        assert!(params.with_min_step_size(0.0).validate(0.01).is_err());
        assert!(params.with_min_step_size(0.1).validate(0.01).is_err());
        assert!(params.with_max_iterations(0).validate(0.01).is_err());
    }

    #[test]
    fn test_accepts_strict_decrease() {
        let data = data();
        let config = CmfConfig::new().with_rank(2);
        let bias = row_bias(data.r(), data.weight_r());
        let empty = DMatrix::zeros(3, 3);
        let objective = CmfObjective::new(&data, &bias, data.weight_r(), &empty, &config).unwrap();

        let factors = LatentFactors::random(data.dims(), 2, &mut StdRng::seed_from_u64(11));
        let eval = objective.evaluate(&factors).unwrap();
        let grads = compute_gradients(&eval, &factors, &config.alphas, &config.lambdas);

        // A huge first step overshoots and must be backtracked
        let result = BacktrackingLineSearch::new()
            .search(&objective, &factors, &eval, &grads, 100.0, &config.line_search)
            .unwrap();

        assert!(result.evaluation.loss < eval.loss);
        assert!(result.step_size < 100.0);
        assert!(result.function_evals > 1);
        assert_eq!(result.evaluation, objective.evaluate(&result.factors).unwrap());
        assert_eq!(result.factors, factors.step(&grads, result.step_size));
    }

    #[test]
    fn test_fails_without_descent() {
        let data = data();
        let config = CmfConfig::new().with_rank(1);
        let bias = row_bias(data.r(), data.weight_r());
        let empty = DMatrix::zeros(3, 3);
        let objective = CmfObjective::new(&data, &bias, data.weight_r(), &empty, &config).unwrap();

        let factors = LatentFactors::from_element(data.dims(), 1, 0.3);
        let eval = objective.evaluate(&factors).unwrap();
        // Ascent direction: every candidate increases the loss
        let grads = compute_gradients(&eval, &factors, &config.alphas, &config.lambdas);
        let ascent = Gradients {
            u: -grads.u,
            v: -grads.v,
            p: -grads.p,
            q: -grads.q,
        };

        let params = LineSearchParams::default().with_max_iterations(5);
        let err = BacktrackingLineSearch::new()
            .search(&objective, &factors, &eval, &ascent, 0.01, &params)
            .unwrap_err();
        match err {
            CmfError::LineSearchFailed { iterations, last_step_size, .. } => {
                assert_eq!(iterations, 5);
                assert!((last_step_size - 0.01 / 32.0).abs() < 1e-15);
            }
            other => panic!("unexpected error: {other}"),
        }

        let params = LineSearchParams::default().with_min_step_size(1e-3);
        let err = BacktrackingLineSearch::new()
            .search(&objective, &factors, &eval, &ascent, 0.01, &params)
            .unwrap_err();
        match err {
            // 0.01, 0.005, 0.0025, 0.00125 evaluated, then 0.000625 < 1e-3
            CmfError::LineSearchFailed { iterations, .. } => assert_eq!(iterations, 4),
            other => panic!("unexpected error: {other}"),
        }
    }
}
