//! Bounded-concurrency fetching that keeps request order.

use std::{fmt::Display, future::Future};

use futures::{StreamExt, stream};

/// Result of fetching the key at `index` of the request list.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Fetched { index: usize, item: T },
    Failed { index: usize, reason: String },
}

impl<T> FetchOutcome<T> {
    pub fn index(&self) -> usize {
        match self {
            FetchOutcome::Fetched { index, .. } | FetchOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn into_item(self) -> Option<T> {
        match self {
            FetchOutcome::Fetched { item, .. } => Some(item),
            FetchOutcome::Failed { .. } => None,
        }
    }
}

/// Runs `fetcher` over `keys` with at most `max_workers` requests in flight.
/// Outcomes complete in any order but are returned sorted by key position.
/// A `max_workers` of zero is treated as one.
pub async fn fetch_outcomes<K, T, E, F, Fut>(
    keys: Vec<K>,
    max_workers: usize,
    fetcher: F,
) -> Vec<FetchOutcome<T>>
where
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let workers = max_workers.max(1);
    let mut outcomes: Vec<FetchOutcome<T>> = stream::iter(keys.into_iter().enumerate())
        .map(|(index, key)| {
            let pending = fetcher(key);
            async move {
                match pending.await {
                    Ok(item) => FetchOutcome::Fetched { index, item },
                    Err(err) => FetchOutcome::Failed {
                        index,
                        reason: err.to_string(),
                    },
                }
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;
    outcomes.sort_by_key(FetchOutcome::index);
    outcomes
}

/// Like [`fetch_outcomes`], but failed keys are skipped and only the fetched
/// items are returned, in the order of their keys.
pub async fn fetch_ordered<K, T, E, F, Fut>(keys: Vec<K>, max_workers: usize, fetcher: F) -> Vec<T>
where
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    fetch_outcomes(keys, max_workers, fetcher)
        .await
        .into_iter()
        .filter_map(|outcome| {
            if let FetchOutcome::Failed { index, reason } = &outcome {
                log::debug!("skipping failed fetch #{index}: {reason}");
            }
            outcome.into_item()
        })
        .collect()
}
