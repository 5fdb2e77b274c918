//! Per-step training history.

use crate::{objective::Evaluation, types::Scalar};

/// Metrics of one factor state.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceRecord<T: Scalar> {
    /// Total loss
    pub loss: T,
    /// RMSE of R on the training mask
    pub rmse_r_train: T,
    /// RMSE of R on the held-out mask, if any
    pub rmse_r_test: Option<T>,
    /// RMSE of D
    pub rmse_d_train: T,
    /// RMSE of S
    pub rmse_s_train: T,
}

impl<T: Scalar> From<&Evaluation<T>> for TraceRecord<T> {
    fn from(evaluation: &Evaluation<T>) -> Self {
        Self {
            loss: evaluation.loss,
            rmse_r_train: evaluation.rmse_r_train,
            rmse_r_test: evaluation.rmse_r_test,
            rmse_d_train: evaluation.rmse_d_train,
            rmse_s_train: evaluation.rmse_s_train,
        }
    }
}

/// Ordered records of one training run, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainingTrace<T: Scalar> {
    records: Vec<TraceRecord<T>>,
}

impl<T: Scalar> TrainingTrace<T> {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// Appends a record.
    pub fn push(&mut self, record: TraceRecord<T>) {
        self.records.push(record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recent record.
    pub fn last(&self) -> Option<&TraceRecord<T>> {
        self.records.last()
    }

    /// All records in order.
    pub fn records(&self) -> &[TraceRecord<T>] {
        &self.records
    }

    /// Iterates over the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, TraceRecord<T>> {
        self.records.iter()
    }

    /// The loss sequence.
    pub fn losses(&self) -> Vec<T> {
        self.records.iter().map(|r| r.loss).collect()
    }

    /// The training RMSE sequence of R.
    pub fn train_rmse(&self) -> Vec<T> {
        self.records.iter().map(|r| r.rmse_r_train).collect()
    }

    /// The held-out RMSE sequence of R, if held-out entries exist.
    pub fn test_rmse(&self) -> Option<Vec<T>> {
        self.records.iter().map(|r| r.rmse_r_test).collect()
    }
}

impl<'a, T: Scalar> IntoIterator for &'a TrainingTrace<T> {
    type Item = &'a TraceRecord<T>;
    type IntoIter = std::slice::Iter<'a, TraceRecord<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
