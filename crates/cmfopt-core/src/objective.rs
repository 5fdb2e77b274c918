//! Masked reconstruction errors, RMSEs and the regularized CMF loss.
//!
//! For factors (U, V, P, Q) and a frozen row bias mu:
//!
//! ```text
//! errorR = W_train ⊙ (R − (U·Vᵗ + mu))
//! errorD = W_D ⊙ (D − U·Pᵗ)
//! errorS = W_S ⊙ (S − V·Qᵗ)
//!
//! L = α_R/2 ‖errorR‖² + α_D/2 ‖errorD‖² + α_S/2 ‖errorS‖²
//!   + λ_UV/2 (‖U‖² + ‖V‖²) + λ_P/2 ‖P‖² + λ_Q/2 ‖Q‖²
//! ```
//!
//! RMSE_X = sqrt(Σ errorX² / Σ W_X). Evaluation is pure: the same inputs
//! always produce bit-identical outputs.

use crate::{
    config::CmfConfig,
    data::CmfData,
    error::{CmfError, Result},
    factors::{Gradients, LatentFactors},
    gradient::compute_gradients,
    prediction::predict,
    types::{DMatrix, DVector, Scalar},
};
use num_traits::Float;

/// Everything the evaluator computes for one factor state.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation<T: Scalar> {
    /// Training-masked residual of R
    pub error_r: DMatrix<T>,
    /// Masked residual of D
    pub error_d: DMatrix<T>,
    /// Masked residual of S
    pub error_s: DMatrix<T>,
    /// RMSE of R on the training mask
    pub rmse_r_train: T,
    /// RMSE of R on the held-out mask; `None` when that mask is empty
    pub rmse_r_test: Option<T>,
    /// RMSE of D on its mask
    pub rmse_d_train: T,
    /// RMSE of S on its mask
    pub rmse_s_train: T,
    /// Total regularized loss (non-negative)
    pub loss: T,
}

/// RMSE of a masked residual, normalized by the mask sum.
///
/// # Errors
///
/// Returns `NumericalDegeneracy` when the mask sums to zero: the RMSE is
/// undefined there and is not coerced to any value.
pub fn masked_rmse<T: Scalar>(error: &DMatrix<T>, weight: &DMatrix<T>, quantity: &str) -> Result<T> {
    let denominator = weight.sum();
    if !(denominator > T::zero()) {
        return Err(CmfError::numerical_degeneracy(
            quantity,
            "weight mask sums to zero",
        ));
    }
    Ok(<T as Float>::sqrt(error.norm_squared() / denominator))
}

/// Evaluates `factors` once without keeping the bound objective.
///
/// # Errors
///
/// See [`CmfObjective::new`] and [`CmfObjective::evaluate`].
pub fn evaluate<T: Scalar>(
    data: &CmfData<T>,
    factors: &LatentFactors<T>,
    bias: &DVector<T>,
    weight_r_train: &DMatrix<T>,
    weight_r_test: &DMatrix<T>,
    config: &CmfConfig<T>,
) -> Result<Evaluation<T>> {
    CmfObjective::new(data, bias, weight_r_train, weight_r_test, config)?.evaluate(factors)
}

/// The loss of one training run: read-only data, the frozen bias and the
/// train/held-out split of R.
#[derive(Debug, Clone, Copy)]
pub struct CmfObjective<'a, T: Scalar> {
    data: &'a CmfData<T>,
    bias: &'a DVector<T>,
    weight_r_train: &'a DMatrix<T>,
    weight_r_test: &'a DMatrix<T>,
    alphas: [T; 3],
    lambdas: [T; 3],
}

impl<'a, T: Scalar> CmfObjective<'a, T> {
    /// Binds the data, bias and masks of one run.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if a mask does not have the shape of R or the
    /// bias does not have one entry per row; `InvalidConfiguration` if a mask
    /// holds a value other than 0 or 1.
    pub fn new(
        data: &'a CmfData<T>,
        bias: &'a DVector<T>,
        weight_r_train: &'a DMatrix<T>,
        weight_r_test: &'a DMatrix<T>,
        config: &CmfConfig<T>,
    ) -> Result<Self> {
        data.check_r_mask("WeightR_train", weight_r_train)?;
        data.check_r_mask("WeightR_test", weight_r_test)?;
        if bias.len() != data.dims().m {
            return Err(CmfError::dimension_mismatch(
                "bias",
                format!("{} rows", data.dims().m),
                format!("{} rows", bias.len()),
            ));
        }

        Ok(Self {
            data,
            bias,
            weight_r_train,
            weight_r_test,
            alphas: config.alphas,
            lambdas: config.lambdas,
        })
    }

    /// The bound data set.
    pub fn data(&self) -> &'a CmfData<T> {
        self.data
    }

    /// The frozen row bias.
    pub fn bias(&self) -> &'a DVector<T> {
        self.bias
    }

    /// Evaluates errors, RMSEs and loss at `factors`.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if the factors do not fit the data
    /// - `NumericalDegeneracy` if the training mask of R, or the mask of D
    ///   or S, sums to zero
    pub fn evaluate(&self, factors: &LatentFactors<T>) -> Result<Evaluation<T>> {
        self.check_factors(factors)?;
        let data = self.data;
        let half = <T as Scalar>::from_f64(0.5);

        let residual_r = data.r() - predict(factors, self.bias);
        let error_r = residual_r.component_mul(self.weight_r_train);
        let error_r_test = residual_r.component_mul(self.weight_r_test);

        let error_d = (data.d() - &factors.u * factors.p.transpose()).component_mul(data.weight_d());
        let error_s = (data.s() - &factors.v * factors.q.transpose()).component_mul(data.weight_s());

        let rmse_r_train = masked_rmse(&error_r, self.weight_r_train, "rmse(R)")?;
        let rmse_d_train = masked_rmse(&error_d, data.weight_d(), "rmse(D)")?;
        let rmse_s_train = masked_rmse(&error_s, data.weight_s(), "rmse(S)")?;
        let rmse_r_test = if self.weight_r_test.sum() > T::zero() {
            Some(masked_rmse(&error_r_test, self.weight_r_test, "rmse(R_test)")?)
        } else {
            None
        };

        let [alpha_r, alpha_d, alpha_s] = self.alphas;
        let [lambda_uv, lambda_p, lambda_q] = self.lambdas;
        let [norm_u, norm_v, norm_p, norm_q] = factors.squared_norms();

        let loss = half * alpha_r * error_r.norm_squared()
            + half * alpha_d * error_d.norm_squared()
            + half * alpha_s * error_s.norm_squared()
            + half * lambda_uv * (norm_u + norm_v)
            + half * lambda_p * norm_p
            + half * lambda_q * norm_q;

        Ok(Evaluation {
            error_r,
            error_d,
            error_s,
            rmse_r_train,
            rmse_r_test,
            rmse_d_train,
            rmse_s_train,
            loss,
        })
    }

    /// Exact gradients of the loss at the state that produced `evaluation`.
    pub fn gradients(&self, evaluation: &Evaluation<T>, factors: &LatentFactors<T>) -> Gradients<T> {
        compute_gradients(evaluation, factors, &self.alphas, &self.lambdas)
    }

    fn check_factors(&self, factors: &LatentFactors<T>) -> Result<()> {
        let dims = self.data.dims();
        let f = factors.rank();
        for (name, matrix, rows) in [
            ("U", &factors.u, dims.m),
            ("V", &factors.v, dims.n),
            ("P", &factors.p, dims.l),
            ("Q", &factors.q, dims.h),
        ] {
            if matrix.shape() != (rows, f) {
                return Err(CmfError::dimension_mismatch(
                    name,
                    format!("{rows}x{f}"),
                    format!("{}x{}", matrix.nrows(), matrix.ncols()),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::row_bias;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

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
    fn test_zero_factors_give_bias_residuals() {
        let data = data();
        let config = CmfConfig::new().with_rank(1);
        let bias = row_bias(data.r(), data.weight_r());
        let empty = DMatrix::zeros(3, 3);
        let objective = CmfObjective::new(&data, &bias, data.weight_r(), &empty, &config).unwrap();

        let factors = LatentFactors::from_element(data.dims(), 1, 0.0);
        let eval = objective.evaluate(&factors).unwrap();

        // Predicting the row mean: squared errors 1, 1, 0, 16/9, 16/9, 64/9
        let sse = 2.0 + 96.0 / 9.0;
        assert_relative_eq!(eval.rmse_r_train, (sse / 6.0).sqrt(), epsilon = 1e-12);
        assert_eq!(eval.rmse_r_test, None);

        let sse_d = data.d().norm_squared();
        let sse_s = data.s().norm_squared();
        assert_relative_eq!(eval.rmse_d_train, (sse_d / 6.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(eval.loss, 0.5 * (sse + sse_d + sse_s), epsilon = 1e-12);

        // Missing entries contribute nothing
        assert_eq!(eval.error_r[(1, 1)], 0.0);
        assert_eq!(eval.error_r[(0, 2)], 0.0);
    }

    #[test]
    fn test_regularization_terms() {
        let data = data();
        let config = CmfConfig::new()
            .with_alphas([0.0, 0.0, 0.0])
            .with_lambdas([1.0, 2.0, 4.0]);
        let bias = dvector![0.0, 0.0, 0.0];
        let empty = DMatrix::zeros(3, 3);
        let objective = CmfObjective::new(&data, &bias, data.weight_r(), &empty, &config).unwrap();

        let factors = LatentFactors::from_element(data.dims(), 2, 1.0);
        let eval = objective.evaluate(&factors).unwrap();

        // ‖U‖² = ‖V‖² = 6, ‖P‖² = ‖Q‖² = 4
        let expected = 0.5 * 1.0 * 12.0 + 0.5 * 2.0 * 4.0 + 0.5 * 4.0 * 4.0;
        assert_relative_eq!(eval.loss, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_held_out_rmse_uses_test_mask() {
        let data = data();
        let config = CmfConfig::new();
        let train = dmatrix![1.0, 1.0, 0.0; 1.0, 0.0, 0.0; 1.0, 0.0, 1.0];
        let test = dmatrix![0.0, 0.0, 0.0; 0.0, 0.0, 0.0; 0.0, 1.0, 0.0];
        let bias = row_bias(data.r(), &train);
        let objective = CmfObjective::new(&data, &bias, &train, &test, &config).unwrap();

        let factors = LatentFactors::from_element(data.dims(), 1, 0.0);
        let eval = objective.evaluate(&factors).unwrap();

        // Row 2 training mean is 3, the held-out entry is 1
        assert_relative_eq!(eval.rmse_r_test.unwrap(), 2.0, epsilon = 1e-12);
        assert_eq!(eval.error_r[(2, 1)], 0.0);
    }

    #[test]
    fn test_empty_training_mask_is_degenerate() {
        let data = data();
        let config = CmfConfig::new();
        let empty = DMatrix::zeros(3, 3);
        let bias = dvector![0.0, 0.0, 0.0];
        let objective = CmfObjective::new(&data, &bias, &empty, &empty, &config).unwrap();

        let err = objective
            .evaluate(&LatentFactors::from_element(data.dims(), 1, 0.5))
            .unwrap_err();
        assert!(matches!(err, CmfError::NumericalDegeneracy { ref quantity, .. } if quantity == "rmse(R)"));
    }

    #[test]
    fn test_shape_validation() {
        let data = data();
        let config = CmfConfig::new();
        let bias = dvector![0.0, 0.0];
        let err = CmfObjective::new(&data, &bias, data.weight_r(), data.weight_r(), &config).unwrap_err();
        assert!(matches!(err, CmfError::DimensionMismatch { .. }));

        let bias = dvector![0.0, 0.0, 0.0];
        let objective = CmfObjective::new(&data, &bias, data.weight_r(), data.weight_r(), &config).unwrap();
        let mut factors = LatentFactors::from_element(data.dims(), 2, 0.0);
        factors.q = DMatrix::zeros(3, 2);
        let err = objective.evaluate(&factors).unwrap_err();
        assert!(matches!(err, CmfError::DimensionMismatch { ref context, .. } if context == "Q"));
    }

    #[test]
    fn test_free_evaluate_matches_bound_objective() {
        let data = data();
        let config = CmfConfig::new();
        let bias = row_bias(data.r(), data.weight_r());
        let empty = DMatrix::zeros(3, 3);
        let factors = LatentFactors::from_element(data.dims(), 2, 0.25);

        let bound = CmfObjective::new(&data, &bias, data.weight_r(), &empty, &config)
            .unwrap()
            .evaluate(&factors)
            .unwrap();
        let free = evaluate(&data, &factors, &bias, data.weight_r(), &empty, &config).unwrap();
        assert_eq!(bound, free);
    }

    #[test]
    fn test_masked_rmse() {
        let error = dmatrix![3.0, 0.0; 4.0, 0.0];
        let weight = dmatrix![1.0, 0.0; 1.0, 0.0];
        assert_relative_eq!(masked_rmse(&error, &weight, "x").unwrap(), (12.5f64).sqrt());
        assert!(masked_rmse(&error, &DMatrix::zeros(2, 2), "x").is_err());
    }
}
