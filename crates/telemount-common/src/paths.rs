//! Standard filesystem paths for telemount.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;

/// Default root under which physical mounts are created.
///
/// `/mnt/volumes` is the propagated-mount directory Docker assigns to a
/// managed volume plugin.
pub static TELEMOUNT_VOLUME_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("TELEMOUNT_VOLUME_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/mnt/volumes"))
});

/// Default plugin socket.
pub static TELEMOUNT_SOCKET: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("TELEMOUNT_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/docker/plugins/telemount.sock"))
});

/// Standard paths used by the volume plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemountPaths {
    /// Root of all physical mounts (default: /mnt/volumes).
    pub volume_root: PathBuf,
    /// Unix socket the plugin listens on.
    pub socket: PathBuf,
}

impl TelemountPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom volume root.
    #[must_use]
    pub fn with_volume_root(volume_root: impl Into<PathBuf>) -> Self {
        Self {
            volume_root: volume_root.into(),
            socket: TELEMOUNT_SOCKET.clone(),
        }
    }

    /// Local mount point for a remote endpoint.
    #[must_use]
    pub fn endpoint_mount_point(&self, host: &str, port: u16) -> PathBuf {
        join_beneath(&self.volume_root, host).join(port.to_string())
    }
}

/// The normal components of `path`, as a relative path.
///
/// Root, prefix, `.` and `..` components are dropped, so the result can be
/// joined onto a directory without leaving it.
#[must_use]
pub fn relative_components(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref()
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Join `path` onto `base`, keeping the result below `base` even when `path`
/// is absolute or contains `..`.
#[must_use]
pub fn join_beneath(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let relative = relative_components(path);
    if relative.as_os_str().is_empty() {
        return base.to_path_buf();
    }
    base.join(relative)
}

impl Default for TelemountPaths {
    fn default() -> Self {
        Self {
            volume_root: TELEMOUNT_VOLUME_ROOT.clone(),
            socket: TELEMOUNT_SOCKET.clone(),
        }
    }
}
