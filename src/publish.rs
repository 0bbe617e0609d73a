//! Publishing applied changes as a new branch and pull request.
//!
//! The sequence is strictly ordered: resolve base → create branch → create
//! blobs → create tree → create commit → update ref → open pull request.
//! Every Git object hangs off the base ref captured in the first step, so a
//! source branch that moves mid-run cannot split the new objects across two
//! ancestors. Blob creation is the only parallel step; everything else waits
//! for its predecessor.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::github::{GitHost, PullRequest, TreeEntry};
use crate::stage::ResolvedChange;

/// Fixed prefix of every branch this tool creates.
pub const BRANCH_PREFIX: &str = "pullsmith";

/// Longest prompt excerpt used for the commit message and PR title.
const TITLE_MAX_CHARS: usize = 72;

/// What a successful publish produced.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub branch: String,
    pub commit_sha: String,
    pub pull_request: PullRequest,
}

/// Derive the new branch name from the invocation's start time. Millisecond
/// resolution keeps concurrent runs from colliding without any coordination.
pub fn branch_name(started_at: DateTime<Utc>) -> String {
    format!("{}/{}", BRANCH_PREFIX, started_at.timestamp_millis())
}

/// Truncate a prompt to a one-line title of at most `TITLE_MAX_CHARS`
/// characters, ellipsis included.
fn title_excerpt(prompt: &str) -> String {
    let line = prompt.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    match line.char_indices().nth(TITLE_MAX_CHARS - 1) {
        Some((idx, _)) => format!("{}…", &line[..idx]),
        None => line.to_string(),
    }
}

/// Run the publish sequence against the hosting platform.
///
/// Failure at any step is fatal and not retried. If the branch was already
/// created, a best-effort deletion runs so the failure does not strand an
/// orphan branch; when that cleanup itself fails the orphan is left for
/// out-of-band garbage collection.
pub async fn publish<H: GitHost>(
    host: &H,
    owner: &str,
    repo: &str,
    base_branch: &str,
    user_prompt: &str,
    changes: &[ResolvedChange],
    started_at: DateTime<Utc>,
) -> Result<PublishOutcome, Error> {
    let branch = branch_name(started_at);

    // ResolveBase: capture the source tip once; every later step anchors on it.
    let base_ref = host
        .get_ref(owner, repo, base_branch)
        .await
        .with_context(|| format!("failed to resolve base branch {}", base_branch))
        .map_err(Error::Publish)?;
    let base_sha = base_ref.object.sha;
    debug!("base ref {} is at {}", base_branch, base_sha);

    // CreateBranch: the new ref starts at the base tip.
    host.create_ref(owner, repo, &branch, &base_sha)
        .await
        .with_context(|| format!("failed to create branch {}", branch))
        .map_err(Error::Publish)?;
    info!("created branch {} at {}", branch, base_sha);

    match build_and_attach(host, owner, repo, base_branch, &base_sha, &branch, user_prompt, changes)
        .await
    {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            // Compensate: try not to strand the branch we just created.
            warn!("publish failed after branch creation; deleting {}", branch);
            if let Err(cleanup) = host.delete_ref(owner, repo, &branch).await {
                warn!("orphan branch {} could not be deleted: {:#}", branch, cleanup);
            }
            Err(Error::Publish(err))
        }
    }
}

/// Steps three through seven: blobs, tree, commit, ref update, pull request.
#[allow(clippy::too_many_arguments)]
async fn build_and_attach<H: GitHost>(
    host: &H,
    owner: &str,
    repo: &str,
    base_branch: &str,
    base_sha: &str,
    branch: &str,
    user_prompt: &str,
    changes: &[ResolvedChange],
) -> Result<PublishOutcome> {
    // CreateBlobs: one blob per change, all in flight at once; the batch is a
    // join-all barrier, any failure aborts before the tree exists.
    let blob_shas = try_join_all(changes.iter().map(|change| {
        let encoded = BASE64.encode(change.change.content.as_bytes());
        async move {
            host.create_blob(owner, repo, &encoded)
                .await
                .with_context(|| format!("failed to create blob for {}", change.change.path))
        }
    }))
    .await?;
    debug!("created {} blob(s)", blob_shas.len());

    // CreateTree: overlay the new entries on the base commit's tree. With no
    // delete variant in the change model, entries can only add or replace.
    let entries: Vec<TreeEntry> = changes
        .iter()
        .zip(blob_shas)
        .map(|(change, sha)| TreeEntry::file(change.change.path.clone(), sha))
        .collect();
    let tree_sha = host
        .create_tree(owner, repo, base_sha, entries)
        .await
        .context("failed to create tree")?;

    // CreateCommit: new tree, base as the sole parent.
    let title = title_excerpt(user_prompt);
    let commit_sha = host
        .create_commit(owner, repo, &title, &tree_sha, vec![base_sha.to_string()])
        .await
        .context("failed to create commit")?;
    debug!("created commit {}", commit_sha);

    // UpdateRef: the only mutation of an already-created object.
    host.update_ref(owner, repo, branch, &commit_sha)
        .await
        .with_context(|| format!("failed to point {} at {}", branch, commit_sha))?;

    // OpenPullRequest: from the new branch back into the source branch.
    let body = format!("Automated change for the request:\n\n> {}", user_prompt);
    let pull_request = host
        .create_pull_request(owner, repo, &title, &body, branch, base_branch)
        .await
        .context("failed to open pull request")?;
    info!(
        "opened pull request #{}: {}",
        pull_request.number, pull_request.html_url
    );

    Ok(PublishOutcome {
        branch: branch.to_string(),
        commit_sha,
        pull_request,
    })
}
