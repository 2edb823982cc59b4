//! Container descriptors as reported by the orchestration daemon.

use crate::utils::Result;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Snapshot of one container's configuration and volumes.
///
/// The raw JSON the daemon returned is kept alongside the decoded fields so
/// it can be archived verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerDescriptor {
    #[serde(rename = "Id", default)]
    pub id: String,

    /// Creation configuration, re-sent unchanged when restoring
    #[serde(rename = "Config", default)]
    pub config: serde_json::Value,

    #[serde(rename = "HostConfig", default, deserialize_with = "null_as_default")]
    pub host_config: HostConfig,

    /// Display name, stored with a leading `/`
    #[serde(rename = "Name", default)]
    pub name: String,

    /// Container mount path -> host directory
    #[serde(rename = "Volumes", default, deserialize_with = "null_as_default")]
    pub volumes: BTreeMap<String, PathBuf>,

    #[serde(skip)]
    raw: Vec<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    /// Containers whose volumes this container mounts
    #[serde(rename = "VolumesFrom", default, deserialize_with = "null_as_default")]
    pub volumes_from: Vec<String>,
}

/// Response to a create request
#[derive(Debug, Deserialize)]
pub struct CreateResponse {
    #[serde(rename = "Id", alias = "ID")]
    pub id: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ContainerDescriptor {
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let mut descriptor: ContainerDescriptor = serde_json::from_slice(raw)?;
        descriptor.raw = raw.to_vec();
        Ok(descriptor)
    }

    /// The JSON this descriptor was decoded from
    pub fn raw_json(&self) -> &[u8] {
        &self.raw
    }

    /// The configuration sub-object, serialized for a create request
    pub fn config_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.config)?)
    }

    /// Name without the leading path separator
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix('/').unwrap_or(&self.name)
    }

    /// A container that declares volumes owns its data
    pub fn has_volumes(&self) -> bool {
        !self.volumes.is_empty()
    }

    pub fn volumes_from(&self) -> &[String] {
        &self.host_config.volumes_from
    }

    pub fn host_path(&self, mount_path: &str) -> Option<&Path> {
        self.volumes.get(mount_path).map(PathBuf::as_path)
    }
}
