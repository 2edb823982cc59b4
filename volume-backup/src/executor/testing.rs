//! In-memory daemon for engine tests.

use crate::daemon::{ContainerDaemon, ContainerDescriptor};
use crate::utils::{BackupError, Result};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

#[derive(Default)]
pub(crate) struct FakeDaemon {
    containers: RefCell<HashMap<String, Value>>,
    /// Volumes every created container gets once started
    start_volumes: BTreeMap<String, PathBuf>,
    calls: RefCell<Vec<String>>,
    created: RefCell<Vec<(Value, String)>>,
}

impl FakeDaemon {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_container(self, id: &str, descriptor: Value) -> Self {
        self.containers
            .borrow_mut()
            .insert(id.to_string(), descriptor);
        self
    }

    pub(crate) fn with_start_volume(mut self, mount_path: &str, host_path: PathBuf) -> Self {
        self.start_volumes
            .insert(mount_path.to_string(), host_path);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// (configuration, name) of every create request
    pub(crate) fn created(&self) -> Vec<(Value, String)> {
        self.created.borrow().clone()
    }

    fn not_found(id: &str) -> BackupError {
        BackupError::NotFound {
            resource: id.to_string(),
            status: "404 Not Found".to_string(),
            body: format!("No such container: {}", id),
        }
    }
}

impl ContainerDaemon for FakeDaemon {
    fn inspect(&self, container_id: &str) -> Result<ContainerDescriptor> {
        self.calls
            .borrow_mut()
            .push(format!("inspect {}", container_id));
        let containers = self.containers.borrow();
        let value = containers
            .get(container_id)
            .ok_or_else(|| Self::not_found(container_id))?;
        ContainerDescriptor::from_json(&serde_json::to_vec(value)?)
    }

    fn create(&self, config: &[u8], name: &str) -> Result<String> {
        self.calls.borrow_mut().push(format!("create {}", name));
        let config: Value = serde_json::from_slice(config)?;
        let id = format!("restored-{}", self.created.borrow().len() + 1);

        self.containers.borrow_mut().insert(
            id.clone(),
            json!({"Id": id, "Name": format!("/{}", name), "Config": config, "Volumes": {}}),
        );
        self.created.borrow_mut().push((config, name.to_string()));
        Ok(id)
    }

    fn start(&self, container_id: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("start {}", container_id));
        let mut containers = self.containers.borrow_mut();
        let container = containers
            .get_mut(container_id)
            .ok_or_else(|| Self::not_found(container_id))?;

        for host_path in self.start_volumes.values() {
            std::fs::create_dir_all(host_path)?;
        }
        container["Volumes"] = serde_json::to_value(&self.start_volumes)?;
        Ok(())
    }
}
