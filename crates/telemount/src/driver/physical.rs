//! Physical mounts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use telemount_common::{TelemountError, TelemountResult};

use super::{Endpoint, LogicalVolume, VolumeDescriptor};
use crate::mounter::Mounter;

/// One shared sshfs attachment of a remote endpoint.
///
/// The attachment is materialized lazily when a volume below it gets its
/// first consumer and dropped again once no volume is in use.
#[derive(Debug)]
pub struct PhysicalMount {
    endpoint: Endpoint,
    mount_point: PathBuf,
    volumes: HashMap<String, LogicalVolume>,
    attached: bool,
}

impl PhysicalMount {
    /// Create a detached physical mount with no volumes.
    pub fn new(endpoint: Endpoint, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            endpoint,
            mount_point: mount_point.into(),
            volumes: HashMap::new(),
            attached: false,
        }
    }

    /// The remote endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Local path of the attachment.
    #[must_use]
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Whether the remote filesystem is currently attached.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether any volume below this mount has a consumer.
    #[must_use]
    pub fn in_use(&self) -> bool {
        self.volumes.values().any(LogicalVolume::in_use)
    }

    /// Register a volume. Name uniqueness is the caller's concern.
    pub fn add_volume(&mut self, name: &str, sub_path: impl Into<PathBuf>) {
        self.volumes
            .insert(name.to_string(), LogicalVolume::new(sub_path));
    }

    /// Look up a volume.
    #[must_use]
    pub fn volume(&self, name: &str) -> Option<&LogicalVolume> {
        self.volumes.get(name)
    }

    /// Look up a volume for modification.
    pub fn volume_mut(&mut self, name: &str) -> Option<&mut LogicalVolume> {
        self.volumes.get_mut(name)
    }

    /// Remove a volume. The caller checks that it is unused.
    pub fn delete_volume(&mut self, name: &str) -> Option<LogicalVolume> {
        self.volumes.remove(name)
    }

    /// Attach the remote filesystem unless it already is.
    ///
    /// # Errors
    ///
    /// Returns [`TelemountError::AttachFailed`] if the mount point cannot be
    /// created or the mounter fails. The mount stays detached.
    pub async fn ensure_attached(&mut self, mounter: &dyn Mounter) -> TelemountResult<()> {
        if self.attached {
            return Ok(());
        }

        let attach_failed = |source: std::io::Error| TelemountError::AttachFailed {
            endpoint: self.endpoint.to_string(),
            mount_point: self.mount_point.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.mount_point)
            .await
            .map_err(attach_failed)?;
        mounter
            .attach(&self.endpoint, &self.mount_point)
            .await
            .map_err(attach_failed)?;

        self.attached = true;
        tracing::info!(
            endpoint = %self.endpoint,
            mount_point = %self.mount_point.display(),
            "Remote filesystem attached"
        );
        Ok(())
    }

    /// Detach the remote filesystem if no volume needs it.
    ///
    /// # Errors
    ///
    /// Returns [`TelemountError::DetachFailed`] if the mounter fails. The
    /// mount then stays marked attached.
    pub async fn maybe_detach(&mut self, mounter: &dyn Mounter) -> TelemountResult<()> {
        if self.in_use() || !self.attached {
            return Ok(());
        }
        self.detach(mounter).await
    }

    /// Detach the remote filesystem regardless of consumers.
    pub(super) async fn detach(&mut self, mounter: &dyn Mounter) -> TelemountResult<()> {
        mounter
            .detach(&self.mount_point)
            .await
            .map_err(|source| TelemountError::DetachFailed {
                mount_point: self.mount_point.clone(),
                source,
            })?;

        self.attached = false;
        tracing::info!(
            endpoint = %self.endpoint,
            mount_point = %self.mount_point.display(),
            "Remote filesystem detached"
        );
        Ok(())
    }

    /// Append a descriptor for every volume to `into`.
    pub fn append_descriptors(&self, into: &mut Vec<VolumeDescriptor>) {
        into.extend(
            self.volumes
                .iter()
                .map(|(name, volume)| volume.descriptor(name, &self.mount_point)),
        );
    }
}
