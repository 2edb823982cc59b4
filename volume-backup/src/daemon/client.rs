//! HTTP client for the orchestration daemon.
//!
//! Each call opens one connection (unix socket or tcp), performs a single
//! HTTP/1.1 exchange and closes it. A private current-thread runtime drives
//! the exchange so callers stay synchronous.

use super::descriptor::{ContainerDescriptor, CreateResponse};
use super::ContainerDaemon;
use crate::config::{DaemonConfig, Protocol};
use crate::utils::{BackupError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio::runtime::Runtime;
use tracing::debug;

pub struct DaemonClient {
    addr: String,
    proto: Protocol,
    runtime: Runtime,
}

impl std::fmt::Debug for DaemonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonClient")
            .field("addr", &self.addr)
            .field("proto", &self.proto)
            .finish_non_exhaustive()
    }
}

impl DaemonClient {
    pub fn new(config: &DaemonConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackupError::Transport(format!("Failed to start runtime: {}", e)))?;

        Ok(Self {
            addr: config.addr.clone(),
            proto: config.proto,
            runtime,
        })
    }

    /// Perform one request and return the body of a successful response.
    /// `resource` names what a 4xx response refers to.
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        resource: &str,
    ) -> Result<Bytes> {
        debug!("{} {} via {}://{}", method, path, self.proto, self.addr);
        let (status, body) = self.runtime.block_on(self.send(method, path, body))?;
        check_status(status, &body, resource)?;
        Ok(body)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<(StatusCode, Bytes)> {
        let host = match self.proto {
            Protocol::Unix => "localhost",
            Protocol::Tcp => self.addr.as_str(),
        };

        let mut builder = Request::builder().method(method).uri(path).header(HOST, host);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| BackupError::Transport(e.to_string()))?;

        match self.proto {
            Protocol::Unix => {
                let stream = UnixStream::connect(&self.addr).await.map_err(|e| {
                    BackupError::Transport(format!("Failed to connect to {}: {}", self.addr, e))
                })?;
                exchange(stream, request).await
            }
            Protocol::Tcp => {
                let stream = TcpStream::connect(&self.addr).await.map_err(|e| {
                    BackupError::Transport(format!("Failed to connect to {}: {}", self.addr, e))
                })?;
                exchange(stream, request).await
            }
        }
    }
}

async fn exchange<S>(stream: S, request: Request<Full<Bytes>>) -> Result<(StatusCode, Bytes)>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let transport = |e: hyper::Error| BackupError::Transport(e.to_string());

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(transport)?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("Daemon connection closed: {}", e);
        }
    });

    let response = sender.send_request(request).await.map_err(transport)?;
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(transport)?
        .to_bytes();

    Ok((status, body))
}

/// 2xx passes, 4xx is NotFound, anything else is a daemon error.
fn check_status(status: StatusCode, body: &[u8], resource: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    let body = String::from_utf8_lossy(body).trim().to_string();
    if status.is_client_error() {
        Err(BackupError::NotFound {
            resource: resource.to_string(),
            status: status.to_string(),
            body,
        })
    } else {
        Err(BackupError::Daemon {
            status: status.to_string(),
            body,
        })
    }
}

impl ContainerDaemon for DaemonClient {
    fn inspect(&self, container_id: &str) -> Result<ContainerDescriptor> {
        let body = self.request(
            Method::GET,
            &format!("/containers/{}/json", container_id),
            None,
            container_id,
        )?;
        ContainerDescriptor::from_json(&body)
    }

    fn create(&self, config: &[u8], name: &str) -> Result<String> {
        let path = if name.is_empty() {
            "/containers/create".to_string()
        } else {
            let name: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
            format!("/containers/create?name={}", name)
        };

        let body = self.request(Method::POST, &path, Some(config.to_vec()), name)?;
        let created: CreateResponse = serde_json::from_slice(&body)?;
        Ok(created.id)
    }

    fn start(&self, container_id: &str) -> Result<()> {
        self.request(
            Method::POST,
            &format!("/containers/{}/start", container_id),
            None,
            container_id,
        )?;
        Ok(())
    }
}
