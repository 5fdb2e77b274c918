//! Serialization of configurations and fit results.
#![cfg(feature = "serde")]

use cmfopt_core::prelude::*;
use nalgebra::dmatrix;
use pretty_assertions::assert_eq;

#[test]
fn config_survives_json() {
    let config = CmfConfig::<f64>::new()
        .with_rank(3)
        .with_lambdas([20.0, 1.0, 1.0])
        .with_step_schedule(StepSizeSchedule::inverse_scaling(0.01, 0.25))
        .with_divergence_policy(DivergencePolicy::Abort)
        .with_seed(9);

    let json = serde_json::to_string(&config).unwrap();
    let back: CmfConfig<f64> = serde_json::from_str(&json).unwrap();

    assert_eq!(back.rank, 3);
    assert_eq!(back.lambdas, config.lambdas);
    assert_eq!(back.step_schedule, config.step_schedule);
    assert_eq!(back.line_search, config.line_search);
    assert_eq!(back.divergence_policy, DivergencePolicy::Abort);
    assert_eq!(back.seed, Some(9));
}

#[test]
fn fit_result_survives_json() {
    let data = CmfData::with_dense_side(
        dmatrix![5.0, 3.0, 0.0; 4.0, 0.0, 0.0; 1.0, 1.0, 5.0],
        dmatrix![1.0, 1.0, 0.0; 1.0, 0.0, 0.0; 1.0, 1.0, 1.0],
        dmatrix![0.2, 0.8; 0.5, 0.1; 0.9, 0.4],
        dmatrix![0.3, 0.7; 0.6, 0.2; 0.1, 0.9],
    )
    .unwrap();
    let config = CmfConfig::new().with_rank(2).with_max_steps(5).with_seed(1);
    let result = fit_observed(&data, &config).unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let back: FitResult<f64> = serde_json::from_str(&json).unwrap();

    assert_eq!(back.termination, result.termination);
    assert_eq!(back.iterations, result.iterations);
    assert_eq!(back.trace.len(), result.trace.len());
    assert_eq!(back.factors.u.shape(), result.factors.u.shape());
    assert_eq!(back.bias.len(), 3);
}
