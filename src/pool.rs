//! Bounded worker pool shared by the download and upload stages
//!
//! Items are started in input order with at most `concurrency` in flight. Each
//! result is written to the slot of its input index, so output order never
//! depends on completion order. Once the cancellation token fires no further
//! items are started; in-flight work is expected to observe the token itself.
//! An item whose work panics gets a [`Slot::Failed`] carrying the panic message.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Result slot for one input item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    /// The item ran to completion
    Done(T),
    /// The item's work panicked or was aborted
    Failed(String),
    /// The item was never started because the run was cancelled
    Cancelled,
}

impl<T> Slot<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Runs `work` over `items` with bounded concurrency
///
/// # Arguments
///
/// * `items` - Inputs, in the order results should be returned
/// * `concurrency` - Maximum number of items in flight (values below 1 mean 1)
/// * `cancel` - Stops new items from starting once cancelled
/// * `work` - Builds the future for one item, given its index
///
/// # Returns
///
/// One [`Slot`] per input, index-aligned with `items`
pub async fn run_bounded<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    cancel: &CancellationToken,
    work: F,
) -> Vec<Slot<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let total = items.len();
    let mut slots: Vec<Option<Slot<T>>> = (0..total).map(|_| None).collect();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Cancelled with {} of {} items not started", total - index, total);
                break;
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        // The inner task isolates a panic so it still reports against its index
        let worker = tokio::spawn(work(index, item));
        tasks.spawn(async move {
            let _permit = permit;
            (index, worker.await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(value))) => slots[index] = Some(Slot::Done(value)),
            Ok((index, Err(e))) => {
                let message = failure_message(e);
                tracing::error!("Worker for item {} failed: {}", index, message);
                slots[index] = Some(Slot::Failed(message));
            }
            Err(e) => tracing::error!("Worker task failed: {}", e),
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or(Slot::Cancelled))
        .collect()
}

/// Extracts the panic message from a failed worker
fn failure_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}
