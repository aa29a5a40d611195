//! Install manifests: an install request described in a JSON file.
//!
//! ```json
//! {
//!   "name": "was85",
//!   "response": {
//!     "clean": true,
//!     "server": { "repository": [ { "location": "/mnt/repo" } ] }
//!   },
//!   "secure_storage_file": "/etc/im/credential.store"
//! }
//! ```
//!
//! Key order inside `response` is preserved into the generated document.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::installer::{validate_install_name, InstallRequest};
use crate::markup::ConfigNode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallManifest {
    pub name: String,
    #[serde(default)]
    pub response_file: Option<PathBuf>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub secure_storage_file: Option<PathBuf>,
    #[serde(default)]
    pub master_password_file: Option<PathBuf>,
}

impl InstallManifest {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest from {:?}", path.as_ref()))?;
        let manifest: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {:?}", path.as_ref()))?;
        Ok(manifest)
    }

    /// Convert into a request, building the response node.
    pub fn into_request(self) -> Result<InstallRequest> {
        let response = self
            .response
            .as_ref()
            .map(ConfigNode::try_from)
            .transpose()
            .with_context(|| format!("Invalid response description in manifest '{}'", self.name))?;

        validate_install_name(&self.name)?;

        Ok(InstallRequest {
            name: self.name,
            response_file: self.response_file,
            response,
            secure_storage_file: self.secure_storage_file,
            master_password_file: self.master_password_file,
        })
    }
}

/// Read a JSON response description into a node.
pub fn load_response_description<P: AsRef<Path>>(path: P) -> Result<ConfigNode> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read response description {:?}", path.as_ref()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse response description {:?}", path.as_ref()))?;
    ConfigNode::try_from(&value)
        .with_context(|| format!("Invalid response description {:?}", path.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_into_request() {
        let manifest: InstallManifest = serde_json::from_str(
            r#"{
                "name": "was85",
                "response": {"clean": true, "server": {"repository": [{"location": "/mnt/repo"}]}},
                "master_password_file": "/etc/im/master"
            }"#,
        )
        .unwrap();

        let request = manifest.into_request().unwrap();
        assert_eq!(request.name, "was85");
        let node = request.response.unwrap();
        assert_eq!(node.keys().collect::<Vec<_>>(), vec!["clean", "server"]);
        assert_eq!(request.master_password_file, Some(PathBuf::from("/etc/im/master")));
        assert_eq!(request.secure_storage_file, None);
    }

    #[test]
    fn test_manifest_rejects_null_values() {
        let manifest: InstallManifest =
            serde_json::from_str(r#"{"name": "x", "response": {"clean": null}}"#).unwrap();
        assert!(manifest.into_request().is_err());
    }

    #[test]
    fn test_manifest_rejects_empty_name() {
        let manifest: InstallManifest = serde_json::from_str(r#"{"name": " "}"#).unwrap();
        assert!(manifest.into_request().is_err());
    }

    #[test]
    fn test_manifest_rejects_path_separator_in_name() {
        let manifest: InstallManifest =
            serde_json::from_str(r#"{"name": "was/85", "response": {"clean": true}}"#).unwrap();
        let err = manifest.into_request().unwrap_err();
        assert!(err.to_string().contains("contains path separator"), "{err:#}");
    }
}
