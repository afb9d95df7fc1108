//! On-disk bundle layout
//!
//! One directory per task under the download root:
//!
//! ```text
//! downloads/
//!   20240501_143012_CxYz123_k3j9qa/
//!     01.jpg
//!     01.cover.jpg
//!     02.mp4
//!     caption.txt
//! ```
//!
//! Bundles are written into a hidden `.<name>.partial` staging directory and
//! renamed into place once every file is on disk, so a listed bundle is
//! always complete.

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::compose::CoverArtifact;
use crate::error::{Error, Result};
use crate::fetcher::ContentReference;
use crate::types::{BundleInfo, MediaItem};

/// Name of the caption sidecar file
pub const CAPTION_FILE: &str = "caption.txt";

const STAGING_SUFFIX: &str = ".partial";
const RANDOM_SUFFIX_LEN: usize = 6;

/// A staging directory reserved for one bundle
#[derive(Debug)]
pub struct Allocation {
    name: String,
    staging: PathBuf,
}

impl Allocation {
    /// Final bundle name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory files are written into until the bundle is published
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }
}

/// A published bundle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputBundle {
    /// Folder name under the download root
    pub name: String,
    /// Absolute or root-relative path of the folder
    pub path: PathBuf,
    /// Every file in the bundle, sorted
    pub files: Vec<String>,
    /// Number of media files (covers and caption excluded)
    pub media_count: usize,
}

impl OutputBundle {
    /// Human-readable summary, e.g. "Successfully downloaded 3 file(s)"
    ///
    /// Counts media files only. Covers and `caption.txt` are derived from
    /// them and listed in [`files`](Self::files), so the count matches the
    /// number of items the post actually has.
    pub fn summary(&self) -> String {
        format!("Successfully downloaded {} file(s)", self.media_count)
    }
}

/// Allocates, writes and browses bundles under a download root
#[derive(Clone, Debug)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Download root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh, uniquely named bundle
    ///
    /// The name is `<YYYYmmdd_HHMMSS>_<reference>_<random>`. The staging directory
    /// is created with `create_dir`, so an existing directory is never reused.
    pub async fn allocate(&self, reference: &ContentReference) -> Result<Allocation> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::storage(&self.root, e))?;

        let name = bundle_name(&reference.value, Local::now());
        let staging = self.root.join(format!(".{name}{STAGING_SUFFIX}"));
        fs::create_dir(&staging)
            .await
            .map_err(|e| Error::storage(&staging, e))?;

        tracing::debug!(folder = %name, "Allocated bundle");
        Ok(Allocation { name, staging })
    }

    /// Write media, covers and caption, then publish the bundle
    ///
    /// Media bytes are written exactly as fetched. On any failure the staging
    /// directory is removed and the error names the path that failed.
    pub async fn persist(
        &self,
        allocation: Allocation,
        items: &[MediaItem],
        covers: &[CoverArtifact],
        caption: &str,
    ) -> Result<OutputBundle> {
        match self.write_and_publish(&allocation, items, covers, caption).await {
            Ok(bundle) => Ok(bundle),
            Err(e) => {
                self.discard(allocation).await;
                Err(e)
            }
        }
    }

    async fn write_and_publish(
        &self,
        allocation: &Allocation,
        items: &[MediaItem],
        covers: &[CoverArtifact],
        caption: &str,
    ) -> Result<OutputBundle> {
        let mut files = Vec::with_capacity(items.len() + covers.len() + 1);

        for item in items {
            files.push(write_file(&allocation.staging, item.file_name(), &item.bytes).await?);
        }
        for cover in covers {
            files.push(write_file(&allocation.staging, cover.file_name(), &cover.bytes).await?);
        }
        files.push(write_file(&allocation.staging, CAPTION_FILE.to_string(), caption.as_bytes()).await?);

        let target = self.root.join(&allocation.name);
        fs::rename(&allocation.staging, &target)
            .await
            .map_err(|e| Error::storage(&target, e))?;

        files.sort();
        tracing::info!(folder = %allocation.name, files = files.len(), "Bundle persisted");

        Ok(OutputBundle {
            name: allocation.name.clone(),
            path: target,
            files,
            media_count: items.len(),
        })
    }

    /// Remove a staging directory that will never be published
    pub async fn discard(&self, allocation: Allocation) {
        if let Err(e) = fs::remove_dir_all(&allocation.staging).await {
            tracing::warn!(
                path = %allocation.staging.display(),
                error = %e,
                "Failed to remove staging directory"
            );
        }
    }

    /// Published bundles, newest first
    ///
    /// A missing download root lists as empty. Staging directories are skipped.
    pub async fn list_bundles(&self) -> Result<Vec<BundleInfo>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(&self.root, e)),
        };

        let mut bundles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::storage(&self.root, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_dir() {
                continue;
            }

            bundles.push(BundleInfo {
                file_count: count_files(&entry.path()).await,
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
                name,
            });
        }

        bundles.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(bundles)
    }

    /// Open a bundle in the platform's file manager
    ///
    /// Returns `Ok(false)` when no file manager could be launched.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when `name` is not a published bundle.
    pub async fn reveal(&self, name: &str) -> Result<bool> {
        let path = self.existing_bundle(name).await?;

        let opener = file_manager();
        let Ok(binary) = which::which(opener) else {
            tracing::warn!(opener, "File manager not found in PATH");
            return Ok(false);
        };

        match tokio::process::Command::new(binary).arg(&path).status().await {
            // explorer.exe exits non-zero even when it opened the window
            Ok(status) => Ok(status.success() || cfg!(target_os = "windows")),
            Err(e) => {
                tracing::warn!(opener, folder = %name, error = %e, "Failed to launch file manager");
                Ok(false)
            }
        }
    }

    /// Delete a published bundle and everything in it
    pub async fn delete_bundle(&self, name: &str) -> Result<()> {
        let path = self.existing_bundle(name).await?;
        fs::remove_dir_all(&path)
            .await
            .map_err(|e| Error::storage(&path, e))?;
        tracing::info!(folder = %name, "Bundle deleted");
        Ok(())
    }

    /// Resolve `name` to a published bundle directory
    ///
    /// Names that could escape the download root or point at staging
    /// directories are treated as unknown.
    async fn existing_bundle(&self, name: &str) -> Result<PathBuf> {
        let not_found = || Error::NotFound(format!("bundle {name}"));

        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || Path::new(name).components().count() != 1
        {
            return Err(not_found());
        }

        let path = self.root.join(name);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => Ok(path),
            _ => Err(not_found()),
        }
    }
}

async fn write_file(dir: &Path, name: String, bytes: &[u8]) -> Result<String> {
    let path = dir.join(&name);
    fs::write(&path, bytes)
        .await
        .map_err(|e| Error::storage(&path, e))?;
    Ok(name)
}

async fn count_files(dir: &Path) -> usize {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.is_ok_and(|t| t.is_file()) {
            count += 1;
        }
    }
    count
}

fn bundle_name(reference: &str, now: DateTime<Local>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}_{}_{}", now.format("%Y%m%d_%H%M%S"), reference, suffix)
}

fn file_manager() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    }
}
