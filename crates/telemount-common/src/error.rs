//! Error types for the telemount volume plugin.
//!
//! Every variant renders as a short, human-readable message. The plugin
//! protocol carries nothing but that message back to the container runtime.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`TelemountError`].
pub type TelemountResult<T> = Result<T, TelemountError>;

/// Errors raised by the volume registry and its collaborators.
#[derive(Error, Diagnostic, Debug)]
pub enum TelemountError {
    /// A create option key that the driver does not understand.
    #[error("illegal option {key:?}")]
    #[diagnostic(
        code(telemount::options::invalid),
        help("Recognized options are: container, dir, host, port")
    )]
    InvalidOption {
        /// The offending key.
        key: String,
    },

    /// A required create option was not supplied.
    #[error("missing required option {key:?}")]
    #[diagnostic(code(telemount::options::missing))]
    MissingOption {
        /// The missing key.
        key: String,
    },

    /// The `port` option is not a valid TCP port.
    #[error("port must be an unsigned integer between 1 and 65535, got {value:?}")]
    #[diagnostic(code(telemount::options::invalid_port))]
    InvalidPort {
        /// The value that failed to parse.
        value: String,
    },

    /// No volume with this name exists.
    #[error("no such volume: {name:?}")]
    #[diagnostic(code(telemount::volume::not_found))]
    VolumeNotFound {
        /// The volume name.
        name: String,
    },

    /// A volume with this name already exists with a different definition.
    #[error("volume {name:?} already exists with a different definition")]
    #[diagnostic(
        code(telemount::volume::exists),
        help("Volume names are unique across all endpoints; remove the volume first")
    )]
    VolumeExists {
        /// The volume name.
        name: String,
    },

    /// The volume is still mounted by one or more containers.
    #[error("volume {name} is mounted by containers: {containers:?}")]
    #[diagnostic(code(telemount::volume::busy))]
    VolumeBusy {
        /// The volume name.
        name: String,
        /// Containers currently holding the volume.
        containers: Vec<String>,
    },

    /// The container never mounted this volume.
    #[error("container {container} has no mount for volume {name}")]
    #[diagnostic(code(telemount::volume::not_mounted))]
    NotMounted {
        /// The volume name.
        name: String,
        /// The container that asked to unmount.
        container: String,
    },

    /// The remote filesystem could not be attached.
    #[error("failed to attach {endpoint} at {}: {source}", .mount_point.display())]
    #[diagnostic(
        code(telemount::mount::attach_failed),
        help("Check that the sftp endpoint is reachable and sshfs is installed")
    )]
    AttachFailed {
        /// The remote endpoint (`host:port`).
        endpoint: String,
        /// Local mount point.
        mount_point: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The remote filesystem could not be detached.
    #[error("failed to detach {}: {source}", .mount_point.display())]
    #[diagnostic(code(telemount::mount::detach_failed), severity(Warning))]
    DetachFailed {
        /// Local mount point.
        mount_point: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl TelemountError {
    /// Whether this error leaves the driver state consistent and only needs
    /// to be reported.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::DetachFailed { .. })
    }
}
