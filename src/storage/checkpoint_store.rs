use std::path::PathBuf;

use tonic::async_trait;
use tracing::debug;

use crate::utils::file_io::remove_dir_if_exists;
use crate::CheckpointStore;
use crate::RddId;
use crate::Result;

/// Checkpoint directory prefix under the checkpoint root
pub(crate) const CHECKPOINT_DIR_PREFIX: &str = "rdd-";

/// Checkpoint artifacts kept on a filesystem visible to this process.
///
/// Layout: `<root>/rdd-<id>/...`
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    root: PathBuf,
}

impl FsCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn checkpoint_path(
        &self,
        rdd_id: RddId,
    ) -> PathBuf {
        self.root.join(format!("{CHECKPOINT_DIR_PREFIX}{rdd_id}"))
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn delete_checkpoint_artifacts(
        &self,
        rdd_id: RddId,
    ) -> Result<()> {
        let path = self.checkpoint_path(rdd_id);
        let removed = remove_dir_if_exists(&path).await?;
        debug!(rdd_id, ?path, removed, "Checkpoint artifacts deleted");
        Ok(())
    }
}
