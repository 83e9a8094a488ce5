use std::sync::Arc;
use tracing::info;

use crate::config::PortalConfig;
use crate::services::file_store::FileStore;
use crate::services::registry::SubmissionRegistry;

/// Prepares the on-disk layout and constructs the registry and blob store.
///
/// Creates the data directory, the upload directory and its staging area
/// if they do not exist yet. The sheet and status files are not touched;
/// both are created lazily on first write.
pub async fn setup_storage(
    config: &PortalConfig,
) -> anyhow::Result<(Arc<SubmissionRegistry>, Arc<FileStore>)> {
    let store = FileStore::new(&config.data_dir, config.max_file_size);

    tokio::fs::create_dir_all(store.staging_dir()).await?;
    info!("📁 Data directory: {}", config.data_dir.display());
    info!("✅ Upload store ready at {}", store.uploads_dir().display());

    let registry = Arc::new(SubmissionRegistry::new(&config.data_dir));

    Ok((registry, Arc::new(store)))
}
