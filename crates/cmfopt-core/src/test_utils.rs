//! Test utilities: synthetic problems and gradient checking.
//!
//! Available under `cfg(test)` and the `test-utils` feature so that the
//! cross-validation crate can build the same fixtures.

use crate::{
    data::{CmfData, Dimensions},
    error::Result,
    factors::{Gradients, LatentFactors},
    objective::CmfObjective,
    types::{DMatrix, Scalar},
};
use num_traits::Float;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Shape and sparsity of a synthetic problem.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticConfig {
    /// Problem sizes
    pub dims: Dimensions,
    /// Rank of the planted factors
    pub rank: usize,
    /// Probability that an entry of R is missing
    pub missing_fraction: f64,
    /// Scale of R's entries
    pub scale: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            dims: Dimensions { m: 8, n: 6, l: 3, h: 4 },
            rank: 2,
            missing_fraction: 0.3,
            scale: 5.0,
        }
    }
}

/// Builds R = scale·U·Vᵗ, D = U·Pᵗ and S = V·Qᵗ from planted uniform factors
/// and hides a random part of R.
///
/// Every row of R keeps at least one observed entry.
pub fn synthetic_data<T: Scalar, R: Rng + ?Sized>(config: &SyntheticConfig, rng: &mut R) -> Result<CmfData<T>> {
    let planted = LatentFactors::<T>::random(config.dims, config.rank, rng);
    let scale = <T as Scalar>::from_f64(config.scale / config.rank.max(1) as f64);

    let r = &planted.u * planted.v.transpose() * scale;
    let d = &planted.u * planted.p.transpose();
    let s = &planted.v * planted.q.transpose();

    let Dimensions { m, n, .. } = config.dims;
    let mut weight = DMatrix::from_fn(m, n, |_, _| {
        if rng.gen_bool(config.missing_fraction) {
            T::zero()
        } else {
            T::one()
        }
    });
    for i in 0..m {
        if n > 0 && weight.row(i).iter().all(|&w| w == T::zero()) {
            let j = rng.gen_range(0..n);
            weight[(i, j)] = T::one();
        }
    }

    let r = r.component_mul(&weight);
    CmfData::with_dense_side(r, weight, d, s)
}

/// Outcome of a directional finite-difference gradient check.
#[derive(Debug, Clone)]
pub struct GradientCheckResult<T> {
    /// Largest relative error over all directions
    pub max_relative_error: T,
    /// Mean relative error
    pub avg_relative_error: T,
    /// Whether the maximum stayed under the tolerance
    pub passed: bool,
    /// Relative error per direction
    pub direction_errors: Vec<T>,
}

/// Compares ⟨∇L, d⟩ with (L(x + h·d) − L(x − h·d)) / 2h along random unit
/// directions d.
pub fn check_gradient<T: Scalar, R: Rng + ?Sized>(
    objective: &CmfObjective<'_, T>,
    factors: &LatentFactors<T>,
    n_directions: usize,
    step: T,
    tolerance: T,
    rng: &mut R,
) -> Result<GradientCheckResult<T>> {
    let evaluation = objective.evaluate(factors)?;
    let gradients = objective.gradients(&evaluation, factors);
    let two = <T as Scalar>::from_f64(2.0);

    let mut direction_errors = Vec::with_capacity(n_directions);
    for _ in 0..n_directions {
        let direction = random_direction(factors, rng);
        let norm = direction.norm();
        if norm <= T::EPSILON {
            continue;
        }
        let direction = scale_gradients(&direction, T::one() / norm);

        let analytical = inner(&gradients, &direction);

        // x ± h·d, written as steps along ∓d
        let plus = factors.step(&direction, -step);
        let minus = factors.step(&direction, step);
        let numerical = (objective.evaluate(&plus)?.loss - objective.evaluate(&minus)?.loss) / (two * step);

        let error = <T as Float>::abs(analytical - numerical);
        let scale = <T as Float>::max(
            <T as Float>::max(<T as Float>::abs(analytical), <T as Float>::abs(numerical)),
            T::one(),
        );
        direction_errors.push(error / scale);
    }

    let max_relative_error = direction_errors
        .iter()
        .copied()
        .fold(T::zero(), |a, b| <T as Float>::max(a, b));
    let avg_relative_error = if direction_errors.is_empty() {
        T::zero()
    } else {
        direction_errors.iter().copied().fold(T::zero(), |a, b| a + b)
            / <T as Scalar>::from_usize(direction_errors.len())
    };

    Ok(GradientCheckResult {
        max_relative_error,
        avg_relative_error,
        passed: max_relative_error < tolerance,
        direction_errors,
    })
}

fn random_direction<T: Scalar, R: Rng + ?Sized>(like: &LatentFactors<T>, rng: &mut R) -> Gradients<T> {
    let uniform = Uniform::new_inclusive(-1.0_f64, 1.0_f64);
    let mut draw = |shape: (usize, usize)| {
        DMatrix::from_fn(shape.0, shape.1, |_, _| <T as Scalar>::from_f64(uniform.sample(&mut *rng)))
    };
    Gradients {
        u: draw(like.u.shape()),
        v: draw(like.v.shape()),
        p: draw(like.p.shape()),
        q: draw(like.q.shape()),
    }
}

fn scale_gradients<T: Scalar>(g: &Gradients<T>, factor: T) -> Gradients<T> {
    Gradients {
        u: &g.u * factor,
        v: &g.v * factor,
        p: &g.p * factor,
        q: &g.q * factor,
    }
}

fn inner<T: Scalar>(a: &Gradients<T>, b: &Gradients<T>) -> T {
    a.u.dot(&b.u) + a.v.dot(&b.v) + a.p.dot(&b.p) + a.q.dot(&b.q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CmfConfig, data::row_bias};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_synthetic_data_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = SyntheticConfig::default();
        let data = synthetic_data::<f64, _>(&config, &mut rng).unwrap();

        assert_eq!(data.dims(), config.dims);
        for i in 0..config.dims.m {
            assert!(data.weight_r().row(i).sum() >= 1.0);
        }
        assert!(data.n_observed() < config.dims.m * config.dims.n);
    }

    #[test]
    fn test_gradient_check_passes() {
        let mut rng = StdRng::seed_from_u64(17);
        let data = synthetic_data::<f64, _>(&SyntheticConfig::default(), &mut rng).unwrap();
        let config = CmfConfig::new().with_rank(3).with_alphas([1.0, 2.0, 0.5]);
        let bias = row_bias(data.r(), data.weight_r());
        let (m, n) = data.r().shape();
        let empty = DMatrix::zeros(m, n);
        let objective = CmfObjective::new(&data, &bias, data.weight_r(), &empty, &config).unwrap();
        let factors = LatentFactors::random(data.dims(), 3, &mut rng);

        let result = check_gradient(&objective, &factors, 10, 1e-6, 1e-5, &mut rng).unwrap();
        assert!(result.passed, "max relative error {}", result.max_relative_error);
        assert_eq!(result.direction_errors.len(), 10);
    }
}
