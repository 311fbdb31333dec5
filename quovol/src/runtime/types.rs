//! Inbound request shape from the host orchestrator.

use std::collections::HashMap;
use std::path::PathBuf;

use quovol_shared::errors::{QuovolError, QuovolResult};
use serde::{Deserialize, Serialize};

use crate::runtime::constants::request as request_keys;

/// `{name, options}` as sent by the host for every volume operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub name: String,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl VolumeRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: HashMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// The `reference-only` flag. Absent or empty means `false`.
    pub fn reference_only(&self) -> QuovolResult<bool> {
        match self.options.get(request_keys::REFERENCE_ONLY) {
            None => Ok(false),
            Some(raw) => parse_bool(raw).ok_or_else(|| {
                QuovolError::InvalidArgument(format!(
                    "{} must be a boolean, got {raw:?}",
                    request_keys::REFERENCE_ONLY
                ))
            }),
        }
    }

    /// The `mount-point` hint, if non-empty.
    pub fn mount_point_hint(&self) -> Option<PathBuf> {
        self.options
            .get(request_keys::MOUNT_POINT)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "" => Some(false),
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
