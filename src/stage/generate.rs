//! Stage two: ask the model for the new contents of the files that change.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, info};

use crate::decode::decode_payload;
use crate::error::Error;
use crate::gateway::ModelGateway;
use crate::prompt::generation_prompt;
use crate::snapshot::Snapshot;

use super::{FileChange, FileSnapshot, SelectedFile};

/// A decoded change with its write path resolved against the working
/// directory.
#[derive(Debug, Clone)]
pub struct ResolvedChange {
    pub change: FileChange,
    pub absolute: PathBuf,
}

/// Run the change-generation stage: read the selected files, one gateway
/// call, decode the change list, resolve write paths.
///
/// A selected path that does not exist on disk surfaces here as a read
/// failure — selection never validated existence.
pub async fn generate_changes<G: ModelGateway>(
    gateway: &G,
    user_prompt: &str,
    snapshot: &Snapshot,
    selected: &[SelectedFile],
) -> Result<Vec<ResolvedChange>, Error> {
    let mut snapshots = Vec::with_capacity(selected.len());
    for file in selected {
        let content = snapshot
            .read(&file.relative)
            .await
            .map_err(Error::Generation)?;
        snapshots.push(FileSnapshot {
            path: file.relative.clone(),
            content,
        });
    }

    let prompt = generation_prompt(user_prompt, snapshot.inventory(), &snapshots);
    debug!("generation prompt: {} bytes", prompt.len());

    let response = gateway
        .generate(&prompt)
        .await
        .context("generation gateway call failed")
        .map_err(Error::Generation)?;

    let changes: Vec<FileChange> = decode_payload(&response)?;
    if changes.is_empty() {
        return Err(Error::generation("model produced no file changes"));
    }

    for change in &changes {
        if change.path.trim().is_empty() {
            return Err(Error::generation("model produced a change with no path"));
        }
    }

    info!("model produced {} file change(s)", changes.len());

    let resolved = changes
        .into_iter()
        .map(|change| {
            let absolute = snapshot.resolve(&change.path);
            ResolvedChange { change, absolute }
        })
        .collect();

    Ok(resolved)
}
