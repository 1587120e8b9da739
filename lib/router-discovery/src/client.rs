//! Docker Engine API client over the local unix socket

use anyhow::{bail, Context};
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{header, Request};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;
use tracing::debug;

/// Engine API version requested on every call
pub const DOCKER_API_VERSION: &str = "v1.24";

/// Default location of the Docker Engine socket
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// DockerClient issues one HTTP/1.1 request per connection to the Engine API
pub struct DockerClient {
    socket: PathBuf,
}

impl DockerClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// GET `path_and_query` under the pinned API version and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> anyhow::Result<T> {
        let uri = format!("/{DOCKER_API_VERSION}{path_and_query}");

        let stream = UnixStream::connect(&self.socket)
            .await
            .with_context(|| format!("Error connecting to {}", self.socket.display()))?;
        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .context("Error starting Docker API connection")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Docker API connection error: {}", e);
            }
        });

        let request = Request::get(uri.as_str())
            .header(header::HOST, "docker")
            .body(Empty::<Bytes>::new())?;
        let response = sender
            .send_request(request)
            .await
            .with_context(|| format!("Error requesting GET {uri}"))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .with_context(|| format!("Error reading GET {uri} response"))?
            .to_bytes();

        if !status.is_success() {
            bail!(
                "GET {} returned {}: {}",
                uri,
                status,
                String::from_utf8_lossy(&body).trim()
            );
        }

        serde_json::from_slice(&body).with_context(|| format!("Error decoding GET {uri} response"))
    }
}
