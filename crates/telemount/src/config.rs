//! Driver configuration.

use std::path::PathBuf;
use std::time::Duration;

use telemount_common::TelemountPaths;

/// Options passed to every sshfs invocation unless overridden.
pub const DEFAULT_SSHFS_OPTIONS: &[&str] = &[
    "allow_other",
    "StrictHostKeyChecking=no",
    "UserKnownHostsFile=/dev/null",
    "ConnectTimeout=10",
    "ServerAliveInterval=15",
    "reconnect",
];

/// Driver configuration options.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Paths for mount points and the plugin socket.
    pub paths: TelemountPaths,
    /// The sshfs executable.
    pub sshfs_binary: PathBuf,
    /// Extra `-o` options for sshfs.
    pub sshfs_options: Vec<String>,
    /// Upper bound on a single attach.
    pub attach_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            paths: TelemountPaths::new(),
            sshfs_binary: PathBuf::from("sshfs"),
            sshfs_options: DEFAULT_SSHFS_OPTIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            attach_timeout: Duration::from_secs(30),
        }
    }
}

impl DriverConfig {
    /// Set the root under which physical mounts are created.
    #[must_use]
    pub fn with_volume_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths.volume_root = root.into();
        self
    }

    /// Set the plugin socket path.
    #[must_use]
    pub fn with_socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.paths.socket = socket.into();
        self
    }

    /// Use a different sshfs executable.
    #[must_use]
    pub fn with_sshfs_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.sshfs_binary = binary.into();
        self
    }

    /// Replace the sshfs `-o` options.
    #[must_use]
    pub fn with_sshfs_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sshfs_options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Set the attach timeout.
    #[must_use]
    pub fn with_attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }
}
