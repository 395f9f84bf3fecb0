//! Attaching and detaching remote filesystems.
//!
//! The registry never runs mount commands itself. It asks a [`Mounter`],
//! which keeps the bookkeeping testable without sshfs or root.

mod sshfs;

use std::path::Path;

use async_trait::async_trait;

use crate::driver::Endpoint;

pub use sshfs::SshfsMounter;

/// Materializes and dematerializes remote filesystems.
///
/// Implementations must be safe to retry: an `attach` after a failed
/// `attach` is allowed, and `detach` on a point that is not mounted is a
/// successful no-op.
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Attach the filesystem served by `endpoint` at `mount_point`.
    async fn attach(&self, endpoint: &Endpoint, mount_point: &Path) -> std::io::Result<()>;

    /// Detach whatever is mounted at `mount_point`.
    async fn detach(&self, mount_point: &Path) -> std::io::Result<()>;
}
