//! Storage manager: builds the configured object store and hands out the
//! shared handle and erasers bound to it.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use netdrive_core::config::{ProviderKind, StorageConfig, TransferConfig};
use netdrive_core::error::AppError;
use netdrive_core::result::AppResult;
use netdrive_core::traits::storage::ObjectStore;

use crate::eraser::BulkEraser;
use crate::providers::LocalObjectStore;

/// Owns the process-wide object store handle.
#[derive(Debug, Clone)]
pub struct StorageManager {
    store: Arc<dyn ObjectStore>,
    transfer: TransferConfig,
    presign_expiry: Duration,
}

impl StorageManager {
    /// Wrap an already-built store.
    pub fn new(store: Arc<dyn ObjectStore>, transfer: TransferConfig) -> Self {
        Self {
            store,
            transfer,
            presign_expiry: Duration::from_secs(3600),
        }
    }

    /// Build the provider selected by `storage.provider`.
    pub async fn from_config(storage: &StorageConfig, transfer: &TransferConfig) -> AppResult<Self> {
        let store: Arc<dyn ObjectStore> = match storage.provider {
            ProviderKind::Local => Arc::new(
                LocalObjectStore::new(&storage.local.root_path, transfer.list_page_size).await?,
            ),
            #[cfg(feature = "s3")]
            ProviderKind::S3 => Arc::new(
                crate::providers::S3ObjectStore::new(&storage.s3, transfer.list_page_size).await?,
            ),
            #[cfg(not(feature = "s3"))]
            ProviderKind::S3 => {
                return Err(AppError::configuration(
                    "storage.provider = \"s3\" requires the `s3` feature",
                ));
            }
        };

        info!(provider = store.provider_type(), "Object store ready");
        Ok(Self {
            store,
            transfer: transfer.clone(),
            presign_expiry: Duration::from_secs(storage.presign_expiry_seconds),
        })
    }

    /// The shared object store handle.
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Transfer limits this manager was built with.
    pub fn transfer(&self) -> &TransferConfig {
        &self.transfer
    }

    /// Lifetime of presigned download URLs.
    pub fn presign_expiry(&self) -> Duration {
        self.presign_expiry
    }

    /// An eraser over the shared store using the configured pool limits.
    pub fn eraser(&self) -> BulkEraser {
        BulkEraser::new(
            self.store(),
            self.transfer.erase_workers,
            self.transfer.erase_queue_depth,
        )
    }

    /// Check whether the backing store is reachable.
    pub async fn health_check(&self) -> bool {
        match self.store.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!(error = %e, "Object store health check failed");
                false
            }
        }
    }

    /// Fail fast at startup when the store is unreachable.
    pub async fn require_healthy(&self) -> AppResult<()> {
        if self.health_check().await {
            Ok(())
        } else {
            Err(AppError::storage(format!(
                "Object store '{}' is not reachable",
                self.store.provider_type()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use netdrive_core::config::LocalStorageConfig;

    use super::*;

    #[tokio::test]
    async fn test_builds_local_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            local: LocalStorageConfig {
                root_path: dir.path().join("objects").to_string_lossy().into_owned(),
            },
            presign_expiry_seconds: 60,
            ..StorageConfig::default()
        };

        let manager = StorageManager::from_config(&storage, &TransferConfig::default())
            .await
            .unwrap();

        assert_eq!(manager.store().provider_type(), "local");
        assert_eq!(manager.presign_expiry(), Duration::from_secs(60));
        assert!(manager.store().presigner().is_none());
        manager.require_healthy().await.unwrap();
    }

    #[cfg(not(feature = "s3"))]
    #[tokio::test]
    async fn test_s3_without_feature_is_a_configuration_error() {
        let storage = StorageConfig {
            provider: ProviderKind::S3,
            ..StorageConfig::default()
        };

        let err = StorageManager::from_config(&storage, &TransferConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, netdrive_core::error::ErrorKind::Configuration);
    }
}
