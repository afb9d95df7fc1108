//! Browsing persisted bundles.

use crate::error::Result;
use crate::types::BundleInfo;

use super::TaskTracker;

impl TaskTracker {
    /// Published bundles under the download root, newest first
    pub async fn list_bundles(&self) -> Result<Vec<BundleInfo>> {
        self.layout.list_bundles().await
    }

    /// Open a bundle in the local file manager
    ///
    /// Returns whether a file manager was launched.
    pub async fn reveal_bundle(&self, name: &str) -> Result<bool> {
        let opened = self.layout.reveal(name).await?;
        tracing::info!(folder = %name, opened, "Reveal bundle requested");
        Ok(opened)
    }

    /// Delete a bundle and its files
    pub async fn delete_bundle(&self, name: &str) -> Result<()> {
        self.layout.delete_bundle(name).await
    }
}
