//! Wire types for the hosting-platform Git data API.

use serde::{Deserialize, Serialize};

/// The authenticated user behind an access token.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub login: String,
}

/// A Git reference: branch name plus the object it points at.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: GitObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitObject {
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateRefRequest {
    #[serde(rename = "ref")]
    pub name: String,
    pub sha: String,
}

#[derive(Debug, Serialize)]
pub(super) struct UpdateRefRequest {
    pub sha: String,
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateBlobRequest {
    pub content: String,
    pub encoding: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ShaResponse {
    pub sha: String,
}

/// One overlay entry of a new tree. This pipeline only ever produces regular
/// file content, so mode is always `100644` and type always `blob`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    /// A regular-file entry pointing at an already-created blob.
    pub fn file(path: String, blob_sha: String) -> Self {
        Self {
            path,
            mode: "100644".to_string(),
            kind: "blob".to_string(),
            sha: blob_sha,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreateTreeRequest {
    pub base_tree: String,
    pub tree: Vec<TreeEntry>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateCommitRequest {
    pub message: String,
    pub tree: String,
    pub parents: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreatePullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

/// The opened pull request, as far as the pipeline cares.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}
