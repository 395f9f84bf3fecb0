//! Logical volumes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telemount_common::join_beneath;

/// A named volume exposing a subdirectory of a physical mount.
///
/// A volume is unused while `used_by` is empty and in use otherwise. It may
/// only be deleted while unused.
#[derive(Debug, Clone)]
pub struct LogicalVolume {
    sub_path: PathBuf,
    used_by: Vec<String>,
    created_at: Option<DateTime<Utc>>,
}

/// Externally visible view of a volume, in the plugin protocol's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeDescriptor {
    /// Volume name.
    pub name: String,
    /// Host path where the volume is reachable once mounted.
    pub mountpoint: PathBuf,
    /// When the volume last went from unused to in use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Consumer status.
    pub status: VolumeStatus,
}

/// Status block of a [`VolumeDescriptor`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStatus {
    /// Containers currently holding the volume.
    pub containers: Vec<String>,
}

impl LogicalVolume {
    /// Create an unused volume.
    pub fn new(sub_path: impl Into<PathBuf>) -> Self {
        Self {
            sub_path: sub_path.into(),
            used_by: Vec::new(),
            created_at: None,
        }
    }

    /// Path below the remote root.
    #[must_use]
    pub fn sub_path(&self) -> &Path {
        &self.sub_path
    }

    /// Containers holding the volume, in mount order.
    #[must_use]
    pub fn used_by(&self) -> &[String] {
        &self.used_by
    }

    /// Whether any container holds the volume.
    #[must_use]
    pub fn in_use(&self) -> bool {
        !self.used_by.is_empty()
    }

    /// Time of the last unused to in-use transition.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Record `container` as a consumer.
    ///
    /// Returns `true` if this was the first consumer. Adding a container that
    /// already holds the volume changes nothing.
    pub fn add_consumer(&mut self, container: &str) -> bool {
        if self.used_by.is_empty() {
            self.used_by.push(container.to_string());
            self.created_at = Some(Utc::now());
            return true;
        }
        if !self.used_by.iter().any(|id| id == container) {
            self.used_by.push(container.to_string());
        }
        false
    }

    /// Drop `container` as a consumer.
    ///
    /// Returns `false` if it was not one.
    pub fn remove_consumer(&mut self, container: &str) -> bool {
        match self.used_by.iter().position(|id| id == container) {
            Some(index) => {
                self.used_by.remove(index);
                true
            }
            None => false,
        }
    }

    /// Where the volume appears on the host, given its physical mount point.
    ///
    /// Always below `physical_mount_point`, whatever `sub_path` holds.
    #[must_use]
    pub fn mount_point(&self, physical_mount_point: &Path) -> PathBuf {
        join_beneath(physical_mount_point, &self.sub_path)
    }

    /// Snapshot for inspection.
    #[must_use]
    pub fn descriptor(&self, name: &str, physical_mount_point: &Path) -> VolumeDescriptor {
        VolumeDescriptor {
            name: name.to_string(),
            mountpoint: self.mount_point(physical_mount_point),
            created_at: self.created_at,
            status: VolumeStatus {
                containers: self.used_by.clone(),
            },
        }
    }
}
