//! Host-facing volume driver interface.
//!
//! The host plugin framework talks to the driver in terms of
//! [`VolumeRequest`]s and string maps; [`VolumeManager`] implements it by
//! unpacking the request and delegating to its typed operations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use quovol_shared::errors::QuovolResult;

use crate::runtime::VolumeManager;
use crate::runtime::constants::driver;
use crate::runtime::types::VolumeRequest;

#[async_trait]
pub trait VolumeDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Driver-level description (root, registries, defaults).
    fn info(&self) -> BTreeMap<String, String>;

    async fn create_volume(&self, request: &VolumeRequest) -> QuovolResult<()>;

    /// Honors the `reference-only` option.
    async fn delete_volume(&self, request: &VolumeRequest) -> QuovolResult<()>;

    /// Honors the `mount-point` option.
    async fn mount_volume(&self, request: &VolumeRequest) -> QuovolResult<PathBuf>;

    async fn umount_volume(&self, request: &VolumeRequest) -> QuovolResult<()>;

    /// Current mount point, empty when unmounted.
    async fn mount_point(&self, request: &VolumeRequest) -> QuovolResult<String>;

    async fn get_volume_info(
        &self,
        request: &VolumeRequest,
    ) -> QuovolResult<BTreeMap<String, String>>;

    async fn list_volumes(&self) -> QuovolResult<Vec<BTreeMap<String, String>>>;

    async fn snapshot_ops(&self, request: &VolumeRequest) -> QuovolResult<()>;

    async fn backup_ops(&self, request: &VolumeRequest) -> QuovolResult<()>;
}

#[async_trait]
impl VolumeDriver for VolumeManager {
    fn name(&self) -> &str {
        driver::NAME
    }

    fn info(&self) -> BTreeMap<String, String> {
        VolumeManager::info(self)
    }

    async fn create_volume(&self, request: &VolumeRequest) -> QuovolResult<()> {
        VolumeManager::create_volume(self, &request.name)
            .await
            .map(|_| ())
    }

    async fn delete_volume(&self, request: &VolumeRequest) -> QuovolResult<()> {
        let reference_only = request.reference_only()?;
        VolumeManager::delete_volume(self, &request.name, reference_only).await
    }

    async fn mount_volume(&self, request: &VolumeRequest) -> QuovolResult<PathBuf> {
        let hint = request.mount_point_hint();
        VolumeManager::mount_volume(self, &request.name, hint.as_deref()).await
    }

    async fn umount_volume(&self, request: &VolumeRequest) -> QuovolResult<()> {
        VolumeManager::unmount_volume(self, &request.name).await
    }

    async fn mount_point(&self, request: &VolumeRequest) -> QuovolResult<String> {
        Ok(VolumeManager::mount_point(self, &request.name)?
            .map(|p| p.display().to_string())
            .unwrap_or_default())
    }

    async fn get_volume_info(
        &self,
        request: &VolumeRequest,
    ) -> QuovolResult<BTreeMap<String, String>> {
        VolumeManager::get_volume_info(self, &request.name).map(|info| info.to_map())
    }

    async fn list_volumes(&self) -> QuovolResult<Vec<BTreeMap<String, String>>> {
        Ok(VolumeManager::list_volumes(self)?
            .iter()
            .map(|info| info.to_map())
            .collect())
    }

    async fn snapshot_ops(&self, request: &VolumeRequest) -> QuovolResult<()> {
        self.create_snapshot(&request.name, "").await
    }

    async fn backup_ops(&self, request: &VolumeRequest) -> QuovolResult<()> {
        self.create_backup(&request.name, "").await
    }
}
