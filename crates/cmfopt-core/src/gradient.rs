//! Exact gradients of the CMF loss.
//!
//! With the masked residuals eR, eD, eS of an [`Evaluation`]:
//!
//! ```text
//! ∂L/∂U = −α_R·eR·V  − α_D·eD·P + λ_UV·U
//! ∂L/∂P = −α_D·eDᵗ·U + λ_P·P
//! ∂L/∂V = −α_R·eRᵗ·U − α_S·eS·Q + λ_UV·V
//! ∂L/∂Q = −α_S·eSᵗ·V + λ_Q·Q
//! ```
//!
//! The residuals are already masked, so unobserved entries contribute
//! nothing.

use crate::{
    factors::{Gradients, LatentFactors},
    objective::Evaluation,
    types::Scalar,
};

/// Computes ∂L/∂U, ∂L/∂V, ∂L/∂P and ∂L/∂Q at `factors`.
///
/// `evaluation` must have been produced at `factors`.
pub fn compute_gradients<T: Scalar>(
    evaluation: &Evaluation<T>,
    factors: &LatentFactors<T>,
    alphas: &[T; 3],
    lambdas: &[T; 3],
) -> Gradients<T> {
    let [alpha_r, alpha_d, alpha_s] = *alphas;
    let [lambda_uv, lambda_p, lambda_q] = *lambdas;
    let (e_r, e_d, e_s) = (&evaluation.error_r, &evaluation.error_d, &evaluation.error_s);

    let u = &factors.u * lambda_uv - (e_r * &factors.v) * alpha_r - (e_d * &factors.p) * alpha_d;
    let p = &factors.p * lambda_p - e_d.tr_mul(&factors.u) * alpha_d;
    let v = &factors.v * lambda_uv - e_r.tr_mul(&factors.u) * alpha_r - (e_s * &factors.q) * alpha_s;
    let q = &factors.q * lambda_q - e_s.tr_mul(&factors.v) * alpha_s;

    Gradients { u, v, p, q }
}
