use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{error, info};

use caseforge_core::error::{ForgeError, Result};
use caseforge_core::traits::Uploader;
use caseforge_core::types::Status;
use caseforge_workflow::{StepNode, StepOutcome};

use crate::state::{RunPatch, RunState};
use crate::AgentDeps;

/// Filesystem-backed uploader: copies artifacts into a per-API directory
/// under the uploads root.
pub struct FsUploader {
    root: PathBuf,
}

impl FsUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Uploader for FsUploader {
    fn upload(&self, local_path: &Path, namespace: &str) -> BoxFuture<'_, Result<String>> {
        let local_path = local_path.to_path_buf();
        let namespace = namespace.to_string();
        Box::pin(async move {
            let file_name = local_path
                .file_name()
                .ok_or_else(|| ForgeError::Upload(format!("not a file: {}", local_path.display())))?;

            let dest_dir = self.root.join(&namespace);
            std::fs::create_dir_all(&dest_dir).map_err(|e| ForgeError::Upload(e.to_string()))?;

            let dest = dest_dir.join(file_name);
            std::fs::copy(&local_path, &dest).map_err(|e| {
                ForgeError::Upload(format!("copy {} failed: {e}", local_path.display()))
            })?;
            Ok(dest.display().to_string())
        })
    }
}

/// Terminal node of every generation branch: publishes the produced
/// collection and closes the run.
pub struct UploadNode {
    deps: Arc<AgentDeps>,
}

impl UploadNode {
    pub fn new(deps: Arc<AgentDeps>) -> Self {
        Self { deps }
    }
}

impl StepNode<RunState> for UploadNode {
    fn id(&self) -> &str {
        "upload"
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepOutcome<RunState>>> {
        Box::pin(async move {
            let Some(path) = state.generated_collection_fpath.as_deref() else {
                return Ok(StepOutcome::finish(RunPatch::error(
                    "no generated collection to upload",
                )));
            };

            match self.deps.uploader.upload(path, &state.api_name).await {
                Ok(location) => {
                    info!(location, "Collection uploaded");
                    Ok(StepOutcome::finish(RunPatch::terminal(
                        Status::Success,
                        format!("collection uploaded to {location}"),
                    )))
                }
                Err(e) => {
                    error!(error = %e, "Upload failed");
                    Ok(StepOutcome::finish(RunPatch::error(format!(
                        "upload failed: {e}"
                    ))))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_uploader_copies_into_namespace() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();

        let src = src_dir.path().join("c.json");
        std::fs::write(&src, b"{}").unwrap();

        let uploader = FsUploader::new(dst_dir.path());
        let location = uploader.upload(&src, "TFL").await.unwrap();

        assert!(location.contains("TFL"));
        assert_eq!(std::fs::read(dst_dir.path().join("TFL/c.json")).unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_fs_uploader_missing_source_errors() {
        let dst_dir = tempfile::tempdir().unwrap();
        let uploader = FsUploader::new(dst_dir.path());
        let err = uploader
            .upload(Path::new("/nonexistent/c.json"), "TFL")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Upload(_)));
    }
}
