//! Remote storage cluster capability.
//!
//! The driver only provisions and deprovisions volumes on the cluster; the
//! wire protocol lives behind [`RemoteVolumes`]. A [`RemoteConnector`] turns
//! the startup [`ApiSettings`] into a client.

use std::sync::Arc;

use async_trait::async_trait;
use quovol_shared::errors::QuovolResult;
use serde::{Deserialize, Serialize};

use crate::runtime::options::ApiSettings;

/// Parameters for provisioning a remote volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    pub root_user: String,
    pub root_group: String,
    /// Volume configuration template on the cluster.
    pub configuration: String,
}

/// Provision/deprovision volumes on the remote cluster.
///
/// Implementations report failures as `RemoteProvisioning` /
/// `RemoteDeprovisioning`; the manager propagates them unchanged.
#[async_trait]
pub trait RemoteVolumes: Send + Sync {
    /// Create a volume and return its remote identifier.
    async fn create_volume(&self, request: &CreateVolumeRequest) -> QuovolResult<String>;

    /// Delete the volume with the given remote identifier.
    async fn delete_volume(&self, name: &str, remote_id: &str) -> QuovolResult<()>;
}

/// Builds a [`RemoteVolumes`] client from API settings.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, api: &ApiSettings) -> QuovolResult<Arc<dyn RemoteVolumes>>;
}

impl<F> RemoteConnector for F
where
    F: Fn(&ApiSettings) -> QuovolResult<Arc<dyn RemoteVolumes>> + Send + Sync,
{
    fn connect(&self, api: &ApiSettings) -> QuovolResult<Arc<dyn RemoteVolumes>> {
        self(api)
    }
}
