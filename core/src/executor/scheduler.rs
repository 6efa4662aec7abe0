use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Execute a single level of units in parallel
///
/// Every future is spawned as its own tokio task, so a panicking unit
/// cannot take its siblings down. The futures must own whatever they hold
/// (workspace guards included); dropping a finished task releases it.
///
/// # Arguments
///
/// * `tasks` - `(unit_id, future)` pairs for this level
/// * `max_parallel` - Maximum number of concurrently running units (0 = no limit)
///
/// # Returns
///
/// Map of unit_id -> task outcome; a `JoinError` means the task panicked
/// or was cancelled outside the unit's own guards.
pub async fn execute_level_parallel<T, Fut>(
    tasks: Vec<(String, Fut)>,
    max_parallel: usize,
) -> HashMap<String, Result<T, JoinError>>
where
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let sem = (max_parallel > 0).then(|| Arc::new(Semaphore::new(max_parallel)));
    let mut futs = FuturesUnordered::new();

    for (unit_id, fut) in tasks {
        let sem = sem.clone();
        let handle = tokio::spawn(async move {
            let _permit = match sem {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            fut.await
        });

        futs.push(async move { (unit_id, handle.await) });
    }

    let mut results = HashMap::with_capacity(futs.len());
    while let Some((unit_id, res)) = futs.next().await {
        results.insert(unit_id, res);
    }

    results
}
