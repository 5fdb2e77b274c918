//! Reconstruction of R and held-out scoring.

use crate::{
    error::{CmfError, Result},
    factors::LatentFactors,
    types::{shape_string, DMatrix, DVector, Scalar},
};
use num_traits::Float;

/// Predicted primary matrix U·Vᵗ + mu, the bias broadcast along each row.
pub fn predict<T: Scalar>(factors: &LatentFactors<T>, bias: &DVector<T>) -> DMatrix<T> {
    let mut pred = &factors.u * factors.v.transpose();
    for mut column in pred.column_iter_mut() {
        column += bias;
    }
    pred
}

/// RMSE of the predictions on the entries where `weight == 1`.
///
/// The squared masked residual is normalized by the number of entries whose
/// weight is exactly one.
///
/// # Errors
///
/// - `DimensionMismatch` if `r`, `weight`, the factors or the bias disagree
/// - `NumericalDegeneracy` if no entry of `weight` equals one
pub fn score<T: Scalar>(
    r: &DMatrix<T>,
    factors: &LatentFactors<T>,
    bias: &DVector<T>,
    weight: &DMatrix<T>,
) -> Result<T> {
    let expected = (factors.u.nrows(), factors.v.nrows());
    for (name, shape) in [("R", r.shape()), ("weight", weight.shape())] {
        if shape != expected {
            return Err(CmfError::dimension_mismatch(
                name,
                shape_string(expected),
                shape_string(shape),
            ));
        }
    }
    if bias.len() != expected.0 {
        return Err(CmfError::dimension_mismatch(
            "bias",
            format!("{} rows", expected.0),
            format!("{} rows", bias.len()),
        ));
    }

    let count = weight.iter().filter(|&&w| w == T::one()).count();
    if count == 0 {
        return Err(CmfError::numerical_degeneracy(
            "held-out rmse(R)",
            "weight mask selects no entry",
        ));
    }

    let residual = (r - predict(factors, bias)).component_mul(weight);
    Ok(<T as Float>::sqrt(
        residual.norm_squared() / <T as Scalar>::from_usize(count),
    ))
}
