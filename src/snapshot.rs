//! Repository snapshots: a branch's file tree extracted into a private
//! working directory, plus the path inventory enumerated from it.
//!
//! Each run owns its working directory exclusively; it is destroyed and
//! recreated at the start of the run and never reused.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use ignore::WalkBuilder;
use tracing::{debug, warn};

/// Files larger than this are left out of the inventory.
const MAX_READABLE_FILE_SIZE: u64 = 1024 * 1024;

/// Directories never worth showing the model: VCS internals and build
/// output. Everything else in the tarball, dotfiles included, is inventory.
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "dist", "_next", "target"];

/// A branch tip extracted on disk, with its enumerated file inventory.
#[derive(Debug)]
pub struct Snapshot {
    root: PathBuf,
    inventory: Vec<String>,
}

impl Snapshot {
    /// Extract a gzipped tarball into `<work_dir>/source` and enumerate it.
    ///
    /// GitHub tarballs wrap everything in a `<owner>-<repo>-<sha>/` folder;
    /// that top-level component is stripped during extraction.
    pub fn from_tarball(work_dir: &Path, tarball: &[u8]) -> Result<Self> {
        let root = prepare_workdir(work_dir)?;
        extract_stripped(tarball, &root)?;
        Ok(Self::from_dir(root))
    }

    /// Build a snapshot over an already-populated directory.
    pub fn from_dir(root: PathBuf) -> Self {
        let inventory = enumerate(&root);
        debug!("snapshot at {} holds {} files", root.display(), inventory.len());
        Self { root, inventory }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ordered relative paths of every file in the working directory.
    pub fn inventory(&self) -> &[String] {
        &self.inventory
    }

    /// Join a repository-relative path onto the working-directory root.
    ///
    /// Existence is deliberately not checked here: a path the model invented
    /// surfaces as a read failure downstream, not a resolution failure.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Read a file's UTF-8 content by its relative path.
    pub async fn read(&self, relative: &str) -> Result<String> {
        let path = self.resolve(relative);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read selected file: {}", relative))
    }
}

/// Delete any previous run's directory and create a fresh `source` root.
fn prepare_workdir(work_dir: &Path) -> Result<PathBuf> {
    if work_dir.exists() {
        std::fs::remove_dir_all(work_dir)
            .with_context(|| format!("failed to clean working directory {}", work_dir.display()))?;
    }

    let root = work_dir.join("source");
    std::fs::create_dir_all(&root)
        .with_context(|| format!("failed to create working directory {}", root.display()))?;
    Ok(root)
}

/// Unpack a `.tar.gz` into `dest`, dropping the first path component of
/// every entry.
fn extract_stripped(tarball: &[u8], dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(tarball));

    for entry in archive.entries().context("failed to read tarball")? {
        let mut entry = entry.context("failed to read tarball entry")?;
        let path = entry.path().context("tarball entry has invalid path")?;

        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }

        // A hostile archive can name entries with `..` to climb out of the
        // working directory; only plain path segments are acceptable.
        if stripped
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            anyhow::bail!("tarball entry has an unsafe path: {}", path.display());
        }

        let target = dest.join(&stripped);
        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("failed to create directory {}", target.display()))?;
            continue;
        }

        if !entry.header().entry_type().is_file() {
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .with_context(|| format!("failed to extract {}", stripped.display()))?;
        std::fs::write(&target, content)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }

    Ok(())
}

/// Walk the working directory and collect relative paths of regular files.
///
/// The inventory is the full tree: the tarball only contains tracked files,
/// so gitignore and hidden-file filtering would drop real repository content
/// (`.github/workflows`, `.gitignore`, dotfile configs). Only the `SKIP_DIRS`
/// noise directories are excluded; oversized files are left out since the
/// model only ever sees text.
fn enumerate(root: &Path) -> Vec<String> {
    let mut paths = Vec::new();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !SKIP_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("error walking working directory: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > MAX_READABLE_FILE_SIZE => {
                debug!("skipping large file: {}", path.display());
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("failed to stat {}: {}", path.display(), e);
                continue;
            }
        }

        match path.strip_prefix(root) {
            Ok(rel) => paths.push(rel.to_string_lossy().replace('\\', "/")),
            Err(_) => warn!("file outside working directory: {}", path.display()),
        }
    }

    paths.sort();
    paths
}
