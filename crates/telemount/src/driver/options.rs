//! Volume create options.

use std::collections::HashMap;
use std::path::PathBuf;

use telemount_common::{TelemountError, TelemountResult, relative_components};

use super::Endpoint;

/// Host used when the `host` option is absent.
pub const DEFAULT_HOST: &str = "localhost";

const KNOWN_OPTIONS: &[&str] = &["container", "dir", "host", "port"];

/// Validated options of a volume create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeOptions {
    /// Endpoint serving the volume.
    pub endpoint: Endpoint,
    /// Path of the volume below the endpoint's remote root.
    pub sub_path: PathBuf,
}

impl VolumeOptions {
    /// Parse the driver options passed to a create request.
    ///
    /// Recognized keys are `container` (required), `dir`, `host` (default
    /// `localhost`) and `port` (required). `dir` is resolved below
    /// `container`. Both are made relative: root and `..` components are
    /// dropped, so the volume cannot name a path outside the remote root.
    ///
    /// # Errors
    ///
    /// Returns [`TelemountError::InvalidOption`] for an unknown key,
    /// [`TelemountError::InvalidPort`] for a port outside 1-65535 and
    /// [`TelemountError::MissingOption`] when `container` or `port` is absent.
    pub fn parse(options: &HashMap<String, String>) -> TelemountResult<Self> {
        let mut unknown: Vec<&String> = options
            .keys()
            .filter(|key| !KNOWN_OPTIONS.contains(&key.as_str()))
            .collect();
        unknown.sort();
        if let Some(key) = unknown.first() {
            return Err(TelemountError::InvalidOption {
                key: (*key).clone(),
            });
        }

        let port = options.get("port").map(|value| parse_port(value)).transpose()?;

        let container = options
            .get("container")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| TelemountError::MissingOption {
                key: "container".to_string(),
            })?;

        let port = port.ok_or_else(|| TelemountError::MissingOption {
            key: "port".to_string(),
        })?;

        let host = options
            .get("host")
            .filter(|value| !value.is_empty())
            .map_or(DEFAULT_HOST, String::as_str);

        let container = relative_components(container);
        let sub_path = match options.get("dir").filter(|value| !value.is_empty()) {
            None => container,
            Some(dir) => container.join(relative_components(dir)),
        };

        Ok(Self {
            endpoint: Endpoint::new(host, port),
            sub_path,
        })
    }
}

/// Decimal digits only; `u16::from_str` would also take a leading `+`.
fn parse_port(value: &str) -> TelemountResult<u16> {
    let digits = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());
    match value.parse::<u16>() {
        Ok(port) if digits && port != 0 => Ok(port),
        _ => Err(TelemountError::InvalidPort {
            value: value.to_string(),
        }),
    }
}
