//! Stage one: ask the model which files matter for the request.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, info};

use crate::decode::decode_payload;
use crate::error::Error;
use crate::gateway::ModelGateway;
use crate::prompt::selection_prompt;
use crate::snapshot::Snapshot;

/// A selected path resolved against the working-directory root.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub relative: String,
    pub absolute: PathBuf,
}

/// Run the file-selection stage: one gateway call, decode the path list,
/// resolve each path for later reading.
///
/// An empty selection is an explicit failure — proceeding to stage two with
/// zero context would only produce hallucinated changes.
pub async fn select_files<G: ModelGateway>(
    gateway: &G,
    user_prompt: &str,
    snapshot: &Snapshot,
) -> Result<Vec<SelectedFile>, Error> {
    let prompt = selection_prompt(user_prompt, snapshot.inventory());
    debug!("selection prompt: {} bytes", prompt.len());

    let response = gateway
        .generate(&prompt)
        .await
        .context("selection gateway call failed")
        .map_err(Error::Selection)?;

    let paths: Vec<String> = decode_payload(&response)?;
    if paths.is_empty() {
        return Err(Error::selection("model selected no files"));
    }

    info!("model selected {} file(s)", paths.len());

    let selected = paths
        .into_iter()
        .map(|relative| {
            let absolute = snapshot.resolve(&relative);
            SelectedFile { relative, absolute }
        })
        .collect();

    Ok(selected)
}
