//! sshfs-backed [`Mounter`].

use std::ffi::OsString;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::Command;

use super::Mounter;
use crate::config::DriverConfig;
use crate::driver::Endpoint;

/// Mounts endpoints with the `sshfs` FUSE client.
#[derive(Debug, Clone)]
pub struct SshfsMounter {
    binary: PathBuf,
    options: Vec<String>,
    timeout: Duration,
}

impl SshfsMounter {
    /// Create a mounter from the driver configuration.
    #[must_use]
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            binary: config.sshfs_binary.clone(),
            options: config.sshfs_options.clone(),
            timeout: config.attach_timeout,
        }
    }

    /// Command line arguments for attaching `endpoint` at `mount_point`.
    fn attach_args(&self, endpoint: &Endpoint, mount_point: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            format!("{}:/", endpoint.sshfs_host()).into(),
            mount_point.as_os_str().to_owned(),
            "-o".into(),
            format!("port={}", endpoint.port()).into(),
        ];
        for option in &self.options {
            args.push("-o".into());
            args.push(option.into());
        }
        args
    }
}

#[async_trait]
impl Mounter for SshfsMounter {
    async fn attach(&self, endpoint: &Endpoint, mount_point: &Path) -> io::Result<()> {
        let args = self.attach_args(endpoint, mount_point);
        tracing::debug!(
            binary = %self.binary.display(),
            ?args,
            "Running sshfs"
        );

        // sshfs daemonizes and its ssh child keeps stderr open for as long as
        // the mount lives, so stderr goes to a file and only exit is awaited.
        let stderr = tempfile::tempfile()?;
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr.try_clone()?)
            .kill_on_drop(true)
            .spawn()?;

        let status = tokio::time::timeout(self.timeout, child.wait())
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("sshfs did not finish within {:?}", self.timeout),
                )
            })??;

        if !status.success() {
            let captured = read_captured(stderr).await.unwrap_or_default();
            return Err(io::Error::other(format!(
                "sshfs exited with {status}: {}",
                captured.trim()
            )));
        }

        Ok(())
    }

    async fn detach(&self, mount_point: &Path) -> io::Result<()> {
        lazy_unmount(mount_point)
    }
}

/// Everything written to a captured output file.
async fn read_captured(file: std::fs::File) -> io::Result<String> {
    let mut file = tokio::fs::File::from_std(file);
    file.seek(SeekFrom::Start(0)).await?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Lazily unmount `target`, treating "not mounted" as success.
#[cfg(target_os = "linux")]
fn lazy_unmount(target: &Path) -> io::Result<()> {
    use rustix::io::Errno;
    use rustix::mount::{UnmountFlags, unmount};

    tracing::debug!(target = %target.display(), "Unmounting filesystem");

    match unmount(target, UnmountFlags::DETACH) {
        Ok(()) => Ok(()),
        Err(e) if e == Errno::INVAL || e == Errno::NOENT => {
            tracing::debug!(target = %target.display(), "Nothing mounted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(target_os = "linux"))]
fn lazy_unmount(_target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "unmounting requires Linux",
    ))
}
