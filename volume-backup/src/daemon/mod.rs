//! Orchestration daemon access.
//!
//! The engines only need three operations, expressed by [`ContainerDaemon`];
//! [`client::DaemonClient`] implements them over HTTP.

pub mod client;
pub mod descriptor;

pub use client::DaemonClient;
pub use descriptor::ContainerDescriptor;

use crate::utils::Result;

pub trait ContainerDaemon {
    /// Fetch the descriptor of a container.
    fn inspect(&self, container_id: &str) -> Result<ContainerDescriptor>;

    /// Create a container from a JSON configuration, returning its id.
    fn create(&self, config: &[u8], name: &str) -> Result<String>;

    /// Start a container. Its default volume directories exist afterwards.
    fn start(&self, container_id: &str) -> Result<()>;
}

impl<D: ContainerDaemon + ?Sized> ContainerDaemon for &D {
    fn inspect(&self, container_id: &str) -> Result<ContainerDescriptor> {
        (**self).inspect(container_id)
    }

    fn create(&self, config: &[u8], name: &str) -> Result<String> {
        (**self).create(config, name)
    }

    fn start(&self, container_id: &str) -> Result<()> {
        (**self).start(container_id)
    }
}
