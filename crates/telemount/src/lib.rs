//! # Telemount
//!
//! Control plane for an sshfs-backed Docker volume plugin.
//!
//! Named volumes are mapped onto shared remote mounts: every distinct
//! `host:port` endpoint gets one physical sshfs mount, and any number of
//! logical volumes expose subdirectories of it. The physical mount is
//! attached when the first container mounts one of its volumes and detached
//! as soon as the last one lets go.
//!
//! ## Usage
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use telemount::{DriverConfig, Registry, SshfsMounter};
//!
//! # async fn example() -> telemount_common::TelemountResult<()> {
//! let config = DriverConfig::default();
//! let registry = Registry::new(config.paths.clone(), Arc::new(SshfsMounter::new(&config)));
//!
//! let options = HashMap::from([
//!     ("container".to_string(), "proj".to_string()),
//!     ("port".to_string(), "2222".to_string()),
//! ]);
//! registry.create_volume("v1", &options).await?;
//!
//! let mount_point = registry.mount_volume("v1", "c1").await?;
//! println!("mounted at {}", mount_point.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod mounter;

pub use config::DriverConfig;
pub use driver::{Capabilities, Endpoint, Registry, Scope, UnmountOutcome, VolumeDescriptor};
pub use mounter::{Mounter, SshfsMounter};
