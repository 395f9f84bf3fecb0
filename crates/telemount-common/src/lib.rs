//! # telemount-common
//!
//! Shared types for the telemount volume plugin:
//! - The error taxonomy reported back to the container runtime
//! - Standard filesystem paths (volume root, plugin socket)

#![warn(missing_docs)]

pub mod error;
pub mod paths;

pub use error::{TelemountError, TelemountResult};
pub use paths::{TelemountPaths, join_beneath, relative_components};
