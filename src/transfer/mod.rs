//! Transfer orchestration.
//!
//! A folder operation lists what needs to move, fans out one Transfer Unit per
//! file on a [`JoinSet`] bounded by a [`Semaphore`], and aggregates the
//! per-file [`TransferOutcome`]s into a [`FolderReport`]. Compressed transfers
//! move a single archive through a [`pipe`](crate::pipe) instead.

mod cleanup;
mod download;
mod options;
mod outcome;
mod path;
mod upload;

pub use cleanup::{delete_extra_files, prune_empty_dirs};
pub use download::download_folder;
pub use options::{default_concurrency, TransferOptions, TransferOptionsBuilder, DEFAULT_CHECKSUM};
pub use outcome::{
    Direction, FolderReport, FolderStatus, TransferOutcome, TransferStatus, TransferTracker,
};
pub use path::{
    apply_key_template, local_target, parse_repository_path, parse_upload_destination,
    split_archive_name, KEY_PLACEHOLDER,
};
pub use upload::upload_folder;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};

/// Run `work` over `items` with at most `limit` units in flight.
///
/// Outcomes come back in the order of `items`. A unit that panics aborts the
/// whole run.
pub(crate) async fn run_bounded<T, F, Fut>(items: Vec<T>, limit: usize, work: F) -> Result<Vec<TransferOutcome>>
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = TransferOutcome> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();
    let total = items.len();

    for (index, item) in items.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::Transfer {
                path: String::new(),
                message: e.to_string(),
            })?;
        let unit = work(item);
        tasks.spawn(async move {
            let outcome = unit.await;
            drop(permit);
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<TransferOutcome>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined?;
        slots[index] = Some(outcome);
    }
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_bounded_respects_limit_and_order() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..12).collect();
        let outcomes = run_bounded(items, 3, |i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                TransferOutcome::success(format!("file-{}", i), 1, Utc::now())
            }
        })
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let paths: Vec<_> = outcomes.iter().map(|o| o.path.clone()).collect();
        let expected: Vec<_> = (0..12).map(|i| format!("file-{}", i)).collect();
        assert_eq!(paths, expected);
    }
}
