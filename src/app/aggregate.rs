//! Result aggregation
//!
//! Merge semantics belong to the caller. The engine only guarantees that the
//! aggregator is invoked once, after every batch has finished, with all
//! [`BatchResult`]s in execution order.

use super::models::BatchResult;

/// Caller-supplied merge across all batch results
pub trait Aggregator<T> {
    /// Final consolidated result
    type Output;

    /// Merge the ordered batch results
    fn aggregate(&self, results: Vec<BatchResult<T>>) -> Self::Output;
}

impl<T, O, F> Aggregator<T> for F
where
    F: Fn(Vec<BatchResult<T>>) -> O,
{
    type Output = O;

    fn aggregate(&self, results: Vec<BatchResult<T>>) -> O {
        self(results)
    }
}

/// Aggregator concatenating the outputs of successful batches in order
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatOutputs;

impl<T> Aggregator<Vec<T>> for ConcatOutputs {
    type Output = Vec<T>;

    fn aggregate(&self, results: Vec<BatchResult<Vec<T>>>) -> Vec<T> {
        results
            .into_iter()
            .filter_map(|result| result.output)
            .flatten()
            .collect()
    }
}

/// Run the aggregator once over the ordered results
pub fn aggregate<T, G>(results: Vec<BatchResult<T>>, aggregator: &G) -> G::Output
where
    G: Aggregator<T>,
{
    aggregator.aggregate(results)
}
