//! Appending the run's outcome to the repository's conversation log.

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Error;
use crate::store::{ConversationEntry, Origin, RecordStore, RepositoryRecord};

/// Append one entry describing a successful publish. The caller treats a
/// failure here as non-fatal: the pull request is the deliverable and it
/// already exists.
pub async fn record_outcome<S: RecordStore>(
    store: &S,
    owner_id: &str,
    repo_name: &str,
    user_prompt: &str,
    pull_request_url: &str,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let mut record = store
        .get_repository(owner_id, repo_name)
        .await
        .context("failed to fetch repository record")
        .map_err(Error::Record)?
        .unwrap_or_else(|| RepositoryRecord::new(owner_id.to_string(), repo_name.to_string()));

    let read_version = record.version;
    record.chat_log.push(ConversationEntry {
        message: format!("Opened pull request for \"{}\": {}", user_prompt, pull_request_url),
        origin: Origin::Assistant,
        timestamp: now.to_rfc3339(),
    });

    store
        .put_repository(&record, read_version)
        .await
        .context("failed to store repository record")
        .map_err(Error::Record)?;

    debug!(
        "recorded conversation entry for {}/{} ({} total)",
        owner_id,
        repo_name,
        record.chat_log.len()
    );
    Ok(())
}
