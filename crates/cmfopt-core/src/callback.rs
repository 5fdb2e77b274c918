//! Observers for the fit loop.
//!
//! A [`TrainingCallback`] sees every accepted step and may stop training
//! early. Callbacks only observe; they never change the factors.

use crate::{
    convergence::TerminationReason,
    error::Result,
    trace::TraceRecord,
    types::Scalar,
};
use std::time::Duration;

/// Information about one accepted outer step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo<T: Scalar> {
    /// Outer step index (0-based)
    pub step: usize,
    /// Loss before the step
    pub previous_loss: T,
    /// Metrics of the accepted state
    pub record: TraceRecord<T>,
    /// Accepted step size γ
    pub step_size: T,
    /// Frobenius norm of the gradient the step followed
    pub gradient_norm: T,
    /// Loss evaluations spent by the line search
    pub function_evals: usize,
    /// Time since the fit started
    pub elapsed: Duration,
}

/// Information about a finished fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary<T: Scalar> {
    /// Number of accepted outer steps
    pub iterations: usize,
    /// Why training stopped
    pub termination: TerminationReason,
    /// Metrics of the returned factors
    pub final_record: TraceRecord<T>,
    /// Total loss evaluations, initial evaluation included
    pub loss_evaluations: usize,
    /// Wall-clock duration of the fit
    pub elapsed: Duration,
}

/// Trait for training callbacks.
pub trait TrainingCallback<T: Scalar>: Send {
    /// Called once before the first step, with the initial state's metrics.
    fn on_fit_start(&mut self, initial: &TraceRecord<T>) -> Result<()> {
        let _ = initial;
        Ok(())
    }

    /// Called after each accepted step.
    ///
    /// Returns `true` to continue, `false` to stop early.
    fn on_step_end(&mut self, info: &StepInfo<T>) -> Result<bool> {
        let _ = info;
        Ok(true)
    }

    /// Called once when the fit loop stops without error.
    fn on_fit_end(&mut self, summary: &FitSummary<T>) -> Result<()> {
        let _ = summary;
        Ok(())
    }
}

/// A callback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl<T: Scalar> TrainingCallback<T> for NoOpCallback {}

/// Emits a `tracing` event every `log_every` steps.
#[derive(Debug, Clone)]
pub struct LoggingCallback {
    log_every: usize,
    label: Option<String>,
}

impl LoggingCallback {
    /// Logs every `log_every` steps (0 is treated as 1).
    pub fn new(log_every: usize) -> Self {
        Self {
            log_every: log_every.max(1),
            label: None,
        }
    }

    /// Tags every event with `label`, e.g. a fold name.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("fit")
    }
}

impl<T: Scalar> TrainingCallback<T> for LoggingCallback {
    fn on_fit_start(&mut self, initial: &TraceRecord<T>) -> Result<()> {
        tracing::info!(
            label = self.label(),
            loss = %initial.loss,
            rmse_r = %initial.rmse_r_train,
            "starting training"
        );
        Ok(())
    }

    fn on_step_end(&mut self, info: &StepInfo<T>) -> Result<bool> {
        if info.step % self.log_every == 0 {
            tracing::info!(
                label = self.label(),
                step = info.step,
                loss = %info.record.loss,
                rmse_r = %info.record.rmse_r_train,
                rmse_d = %info.record.rmse_d_train,
                rmse_s = %info.record.rmse_s_train,
                step_size = %info.step_size,
                "step"
            );
        }
        Ok(true)
    }

    fn on_fit_end(&mut self, summary: &FitSummary<T>) -> Result<()> {
        tracing::info!(
            label = self.label(),
            iterations = summary.iterations,
            termination = %summary.termination,
            loss = %summary.final_record.loss,
            "training finished"
        );
        Ok(())
    }
}

/// Keeps every [`StepInfo`] for later inspection.
#[derive(Debug, Clone, Default)]
pub struct TraceCollector<T: Scalar> {
    steps: Vec<StepInfo<T>>,
    summary: Option<FitSummary<T>>,
}

impl<T: Scalar> TraceCollector<T> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            summary: None,
        }
    }

    /// Collected steps, oldest first.
    pub fn steps(&self) -> &[StepInfo<T>] {
        &self.steps
    }

    /// Summary of the finished fit, if it finished.
    pub fn summary(&self) -> Option<&FitSummary<T>> {
        self.summary.as_ref()
    }

    /// Consumes the collector, returning the steps.
    pub fn into_steps(self) -> Vec<StepInfo<T>> {
        self.steps
    }
}

impl<T: Scalar> TrainingCallback<T> for TraceCollector<T> {
    fn on_step_end(&mut self, info: &StepInfo<T>) -> Result<bool> {
        self.steps.push(info.clone());
        Ok(true)
    }

    fn on_fit_end(&mut self, summary: &FitSummary<T>) -> Result<()> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}

impl<T: Scalar, C: TrainingCallback<T> + ?Sized> TrainingCallback<T> for &mut C {
    fn on_fit_start(&mut self, initial: &TraceRecord<T>) -> Result<()> {
        (**self).on_fit_start(initial)
    }

    fn on_step_end(&mut self, info: &StepInfo<T>) -> Result<bool> {
        (**self).on_step_end(info)
    }

    fn on_fit_end(&mut self, summary: &FitSummary<T>) -> Result<()> {
        (**self).on_fit_end(summary)
    }
}

impl<T: Scalar> TrainingCallback<T> for Box<dyn TrainingCallback<T>> {
    fn on_fit_start(&mut self, initial: &TraceRecord<T>) -> Result<()> {
        (**self).on_fit_start(initial)
    }

    fn on_step_end(&mut self, info: &StepInfo<T>) -> Result<bool> {
        (**self).on_step_end(info)
    }

    fn on_fit_end(&mut self, summary: &FitSummary<T>) -> Result<()> {
        (**self).on_fit_end(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(loss: f64) -> TraceRecord<f64> {
        TraceRecord {
            loss,
            rmse_r_train: 1.0,
            rmse_r_test: None,
            rmse_d_train: 0.5,
            rmse_s_train: 0.5,
        }
    }

    fn info(step: usize) -> StepInfo<f64> {
        StepInfo {
            step,
            previous_loss: 10.0,
            record: record(9.0),
            step_size: 0.01,
            gradient_norm: 3.0,
            function_evals: 1,
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_collector_keeps_everything() {
        let mut collector = TraceCollector::new();
        for k in 0..3 {
            assert!(collector.on_step_end(&info(k)).unwrap());
        }
        assert!(collector.summary().is_none());

        let summary = FitSummary {
            iterations: 3,
            termination: TerminationReason::Converged,
            final_record: record(9.0),
            loss_evaluations: 4,
            elapsed: Duration::from_millis(3),
        };
        collector.on_fit_end(&summary).unwrap();

        assert_eq!(collector.steps().len(), 3);
        assert_eq!(collector.steps()[2].step, 2);
        assert_eq!(collector.summary(), Some(&summary));
    }

    #[test]
    fn test_noop_and_logging_continue() {
        let mut noop = NoOpCallback;
        assert!(TrainingCallback::<f64>::on_step_end(&mut noop, &info(0)).unwrap());

        let mut logging = LoggingCallback::new(0).with_label("fold 1");
        logging.on_fit_start(&record(10.0)).unwrap();
        assert!(logging.on_step_end(&info(5)).unwrap());
    }

    fn drive<C: TrainingCallback<f64>>(mut callback: C, step: usize) -> bool {
        callback.on_step_end(&info(step)).unwrap()
    }

    #[test]
    fn test_forwarding_through_references() {
        let mut collector = TraceCollector::new();
        assert!(drive(&mut collector, 0));
        assert!(drive(&mut collector, 1));
        assert_eq!(collector.steps().len(), 2);

        let boxed: Box<dyn TrainingCallback<f64>> = Box::new(TraceCollector::new());
        assert!(drive(boxed, 2));
    }
}
