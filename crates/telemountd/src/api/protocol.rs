//! Request and response bodies of the volume plugin protocol.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use telemount::{Capabilities, VolumeDescriptor};
use telemount_common::TelemountResult;

/// Body of Create.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRequest {
    pub name: String,
    #[serde(default)]
    pub opts: Option<HashMap<String, String>>,
}

/// Body of Remove, Path and Get.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameRequest {
    pub name: String,
}

/// Body of Mount and Unmount.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsumerRequest {
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
}

/// Reply to Create, Remove and Unmount.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrResponse {
    pub err: String,
}

/// Reply to Mount and Path.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountpointResponse {
    pub mountpoint: String,
    pub err: String,
}

/// Reply to Get.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeDescriptor>,
    pub err: String,
}

/// Reply to List.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<VolumeDescriptor>,
    pub err: String,
}

/// Reply to Capabilities.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: Capabilities,
}

/// Reply to the plugin handshake.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<&'static str>,
}

impl From<TelemountResult<()>> for ErrResponse {
    fn from(result: TelemountResult<()>) -> Self {
        match result {
            Ok(()) => Self::default(),
            Err(e) => Self { err: e.to_string() },
        }
    }
}

impl From<TelemountResult<PathBuf>> for MountpointResponse {
    fn from(result: TelemountResult<PathBuf>) -> Self {
        match result {
            Ok(path) => Self {
                mountpoint: path.to_string_lossy().into_owned(),
                err: String::new(),
            },
            Err(e) => Self {
                err: e.to_string(),
                ..Self::default()
            },
        }
    }
}

impl From<TelemountResult<VolumeDescriptor>> for GetResponse {
    fn from(result: TelemountResult<VolumeDescriptor>) -> Self {
        match result {
            Ok(volume) => Self {
                volume: Some(volume),
                err: String::new(),
            },
            Err(e) => Self {
                volume: None,
                err: e.to_string(),
            },
        }
    }
}
