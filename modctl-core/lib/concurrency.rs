//! Bounded concurrency primitive shared by the Processor set and every
//! orchestrator: an errgroup-style worker pool where the first error cancels
//! sibling work through a shared [`CancellationToken`].
//!
//! One reusable helper so every orchestrator and the processor set share a
//! single bounded-fan-out implementation instead of hand-rolling a
//! `JoinSet` loop each time.

use std::{future::Future, sync::Arc};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{ModctlError, ModctlResult};

/// Runs `f(item)` for every item in `items`, at most `concurrency` futures in
/// flight at a time. The first error cancels `cancel` and is returned;
/// remaining in-flight work observes the cancellation and unwinds (it is the
/// caller's responsibility to make `f` check `cancel` at its own suspension
/// points — this helper only guarantees no *new* work starts after an error).
///
/// Returns the results in input order on success.
pub async fn bounded_for_each<T, F, Fut, R>(
    items: Vec<T>,
    concurrency: usize,
    cancel: CancellationToken,
    f: F,
) -> ModctlResult<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ModctlResult<R>> + Send + 'static,
{
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let f = Arc::new(f);
    let mut set = tokio::task::JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let f = f.clone();

        set.spawn(async move {
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit.expect("semaphore never closed"),
                _ = cancel.cancelled() => return (index, Err(ModctlError::Canceled)),
            };

            let result = tokio::select! {
                result = f(item, cancel.clone()) => result,
                _ = cancel.cancelled() => Err(ModctlError::Canceled),
            };

            drop(permit);
            (index, result)
        });
    }

    let mut results: Vec<Option<R>> = Vec::new();
    let mut first_error: Option<ModctlError> = None;

    while let Some(joined) = set.join_next().await {
        let (index, result) = joined.map_err(|e| ModctlError::Custom(e.into()))?;
        match result {
            Ok(value) => {
                if results.len() <= index {
                    results.resize_with(index + 1, || None);
                }
                results[index] = Some(value);
            }
            Err(err) => {
                if first_error.is_none() {
                    cancel.cancel();
                    first_error = Some(err);
                }
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    Ok(results.into_iter().map(|r| r.expect("all slots filled when no error")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn runs_all_items_and_preserves_order() {
        let cancel = CancellationToken::new();
        let items: Vec<i32> = (0..20).collect();
        let results = bounded_for_each(items, 4, cancel, |item, _cancel| async move {
            Ok::<_, ModctlError>(item * 2)
        })
        .await
        .unwrap();

        let expected: Vec<i32> = (0..20).map(|i| i * 2).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn respects_concurrency_bound() {
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let items: Vec<i32> = (0..10).collect();
        bounded_for_each(items, 3, cancel, {
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            move |_item, _cancel| {
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ModctlError>(())
                }
            }
        })
        .await
        .unwrap();

        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn first_error_cancels_and_is_returned() {
        let cancel = CancellationToken::new();
        let items: Vec<i32> = (0..10).collect();
        let result = bounded_for_each(items, 2, cancel.clone(), |item, _cancel| async move {
            if item == 5 {
                Err(ModctlError::Codec("boom".to_string()))
            } else {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Ok(item)
            }
        })
        .await;

        assert!(result.is_err());
        assert!(cancel.is_cancelled());
    }
}
