//! The two model-interaction stages: file selection, then content
//! generation.

mod generate;
mod select;

pub use generate::{generate_changes, ResolvedChange};
pub use select::{select_files, SelectedFile};

use serde::{Deserialize, Serialize};

/// A file the model asked to inspect: relative path plus UTF-8 content.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    pub path: String,
    pub content: String,
}

/// One decoded change from the stage-two response: a full replacement of an
/// existing file or a brand-new file. Deletions are not representable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChange {
    #[serde(rename = "filePath")]
    pub path: String,
    pub content: String,
    #[serde(rename = "isNewFile")]
    pub is_new: bool,
}
