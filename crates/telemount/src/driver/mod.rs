//! Volume bookkeeping.
//!
//! This module handles:
//! - Parsing volume create options
//! - Physical mounts, one per remote endpoint
//! - Logical volumes and the containers using them
//! - The registry that serializes every operation

mod endpoint;
mod options;
mod physical;
mod registry;
mod volume;

pub use endpoint::Endpoint;
pub use options::VolumeOptions;
pub use physical::PhysicalMount;
pub use registry::{Capabilities, Registry, Scope, UnmountOutcome};
pub use volume::{LogicalVolume, VolumeDescriptor, VolumeStatus};
