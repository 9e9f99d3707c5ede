//! Metadata client: resolves entry identifiers into playable video details

mod client;
pub mod models;

pub use client::{PlaybackApiClient, DEFAULT_BASE_URL};

use crate::types::VideoDetails;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Trait for entry metadata resolution
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Resolve one entry into its playback details
    async fn resolve(&self, entry_id: &str, authorization_token: Option<&str>) -> Result<VideoDetails>;
}

/// One entry that failed during batch resolution
#[derive(Debug)]
pub struct EntryFailure {
    pub entry_id: String,
    pub error: Error,
}

/// Partial-success result of [`resolve_all`]
#[derive(Debug, Default)]
pub struct BatchResolution {
    /// Resolved entries, in the order they were requested
    pub successes: Vec<VideoDetails>,
    /// Failed entries, in the order they were requested
    pub failures: Vec<EntryFailure>,
}

impl BatchResolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.failures.iter().map(|f| &f.error)
    }
}

/// Resolve every entry concurrently and wait for all of them to settle.
///
/// A failing entry never fails the batch; its error lands in `failures`.
/// Successes are re-sorted to match `entry_ids` regardless of completion order.
pub async fn resolve_all(
    client: Arc<dyn MetadataClient>,
    entry_ids: &[String],
    authorization_token: Option<&str>,
) -> BatchResolution {
    let mut tasks = JoinSet::new();
    let mut pending = HashMap::with_capacity(entry_ids.len());
    for (index, entry_id) in entry_ids.iter().enumerate() {
        let client = Arc::clone(&client);
        let id = entry_id.clone();
        let token = authorization_token.map(str::to_string);
        let handle = tasks.spawn(async move { client.resolve(&id, token.as_deref()).await });
        pending.insert(handle.id(), (index, entry_id.clone()));
    }

    let mut settled = Vec::with_capacity(entry_ids.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        let (task_id, result) = match joined {
            Ok((task_id, result)) => (task_id, result),
            Err(e) => {
                warn!(error = %e, "Entry resolution task did not complete");
                (e.id(), Err(Error::ResolutionAborted(e.to_string())))
            }
        };
        if let Some((index, entry_id)) = pending.remove(&task_id) {
            settled.push((index, entry_id, result));
        }
    }
    settled.sort_by_key(|(index, _, _)| *index);

    let mut batch = BatchResolution::default();
    for (_, entry_id, result) in settled {
        match result {
            Ok(details) => batch.successes.push(details),
            Err(error) => {
                debug!(entry_id = %entry_id, error = %error, "Entry failed to resolve");
                batch.failures.push(EntryFailure { entry_id, error });
            }
        }
    }

    debug!(
        requested = entry_ids.len(),
        resolved = batch.successes.len(),
        failed = batch.failures.len(),
        "Batch resolution settled"
    );

    batch
}
