//! Writing decoded file changes into the working directory.
//!
//! Writes are independent and run concurrently. There is no transactional
//! guarantee across files: a failure partway through leaves a partially
//! modified working directory, which is fine because the directory is
//! disposable and publishing reads the post-write checkout.

use std::path::Path;

use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use tracing::debug;

use crate::error::Error;
use crate::stage::ResolvedChange;

/// Write every change to its resolved path, creating parent directories as
/// needed (new files may live in directories the snapshot does not have).
pub async fn apply_changes(changes: &[ResolvedChange]) -> Result<(), Error> {
    try_join_all(changes.iter().map(write_change))
        .await
        .map_err(Error::Patch)?;
    debug!("applied {} change(s) to working directory", changes.len());
    Ok(())
}

async fn write_change(change: &ResolvedChange) -> Result<()> {
    write_file(&change.absolute, &change.change.content)
        .await
        .with_context(|| format!("failed to write {}", change.change.path))
}

async fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}
