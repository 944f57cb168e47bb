//! Hosting provisioner: repository creation and static-site enablement

use ship_core::{HostingConfig, Result, ShipError};
use ship_github::{HostingApi, PagesStatus, RepoHandle, Visibility};
use std::sync::Arc;
use tracing::info;

/// Wraps a [`HostingApi`] with the provisioning policy of a run
#[derive(Clone)]
pub struct Provisioner {
    api: Arc<dyn HostingApi>,
    branch: String,
    pages_path: String,
}

impl Provisioner {
    pub fn new(api: Arc<dyn HostingApi>, hosting: &HostingConfig) -> Self {
        Self {
            api,
            branch: hosting.branch.clone(),
            pages_path: hosting.pages_path.clone(),
        }
    }

    pub async fn repository_exists(&self, name: &str) -> Result<bool> {
        self.api
            .repository_exists(name)
            .await
            .map_err(|e| ShipError::Publish(format!("Failed to look up repository {}: {}", name, e)))
    }

    /// Create `name` as a public repository. A repository that already
    /// exists is returned as is.
    pub async fn create_repository(&self, name: &str) -> Result<RepoHandle> {
        let handle = self
            .api
            .create_repository(name, Visibility::Public)
            .await
            .map_err(|e| ShipError::Publish(format!("Failed to create repository {}: {}", name, e)))?;
        if handle.created {
            info!("Created repository {}", handle.html_url);
        } else {
            info!("Repository {} already exists", handle.html_url);
        }
        Ok(handle)
    }

    /// Serve the configured branch and path as a static site
    pub async fn enable_static_site(&self, name: &str) -> Result<PagesStatus> {
        let status = self
            .api
            .enable_pages(name, &self.branch, &self.pages_path)
            .await
            .map_err(|e| ShipError::Provisioning(format!("Failed to enable Pages for {}: {}", name, e)))?;
        match status {
            PagesStatus::Enabled => info!("Pages enabled for {}", name),
            PagesStatus::AlreadyEnabled => info!("Pages already enabled for {}", name),
        }
        Ok(status)
    }
}
