//! Client core: talk to another VitShare instance.
//!
//! Speaks the same wire protocol the serving core exposes: password
//! handshake, listing, and streaming download. Every failure comes back
//! as a typed `RemoteError`; nothing here panics on a bad peer.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::common::RemoteError;
use crate::listing::Entry;
use crate::server::auth::TOKEN_HEADER;
use crate::store::TransferStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A directory entry on the remote peer, with the relative path needed
/// to list into it or download it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    pub rel_path: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

/// Authenticated session against one remote peer.
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    store: TransferStore,
}

impl RemoteClient {
    /// Perform the password handshake against `base_url`.
    ///
    /// Distinguishes three user-legible failures: the peer is
    /// unreachable, the peer rejected the password, or the endpoint is
    /// not a VitShare server at all.
    pub async fn connect(
        base_url: &str,
        password: &str,
        store: TransferStore,
    ) -> Result<Self, RemoteError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::ConnectFailed(e.to_string()))?;

        let response = http
            .post(format!("{base_url}/auth"))
            .json(&json!({ "password": password }))
            .send()
            .await
            .map_err(|e| RemoteError::ConnectFailed(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::OK => {}
            reqwest::StatusCode::UNAUTHORIZED => return Err(RemoteError::AuthRejected),
            status => {
                return Err(RemoteError::ProtocolMismatch(format!(
                    "unexpected handshake status {status}"
                )))
            }
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::ProtocolMismatch(format!("bad handshake body: {e}")))?;

        tracing::info!(peer = %base_url, "connected to remote peer");
        Ok(Self {
            http,
            base_url,
            token: auth.token,
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the remote directory at `path` ("" for the share root).
    pub async fn list(&self, path: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        let response = self
            .http
            .get(format!("{}/list", self.base_url))
            .query(&[("path", path)])
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| RemoteError::ConnectFailed(e.to_string()))?;

        let response = check_status(response)?;
        let entries: Vec<Entry> = response
            .json()
            .await
            .map_err(|e| RemoteError::ProtocolMismatch(format!("bad listing body: {e}")))?;

        Ok(entries
            .into_iter()
            .map(|entry| RemoteFile {
                rel_path: join_rel(path, &entry.name),
                name: entry.name,
                is_dir: entry.is_dir,
                size: entry.size,
            })
            .collect())
    }

    /// Stream the remote file at `rel_path` into `dest`.
    ///
    /// Progress goes into the store's remote-download section at the
    /// usual sampling cadence. An interrupted transfer returns `Io` and
    /// leaves both the partial file and the frozen store entry behind,
    /// so stalled-vs-complete is visible to the operator.
    pub async fn download(&self, rel_path: &str, dest: &Path) -> Result<PathBuf, RemoteError> {
        let response = self
            .http
            .get(format!("{}/download", self.base_url))
            .query(&[("path", rel_path)])
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| RemoteError::ConnectFailed(e.to_string()))?;

        let response = check_status(response)?;
        // a peer that omits Content-Length is tracked as unknown (0) size
        let total_size = response.content_length().unwrap_or(0);

        let file_name = Path::new(rel_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| rel_path.to_string());
        let id = self
            .store
            .begin_remote(&file_name, total_size, &self.base_url);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemoteError::Io(e.to_string()))?;
        }
        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| RemoteError::Io(e.to_string()))?;

        let mut received: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // peer vanished mid-transfer: entry freezes where it is
                    tracing::warn!(id, received, "remote download interrupted: {e}");
                    return Err(RemoteError::Io(format!("stream interrupted: {e}")));
                }
            };
            out.write_all(&chunk)
                .await
                .map_err(|e| RemoteError::Io(e.to_string()))?;
            received += chunk.len() as u64;
            self.store.report_remote_progress(id, received);
        }

        out.flush().await.map_err(|e| RemoteError::Io(e.to_string()))?;

        if total_size > 0 && received < total_size {
            tracing::warn!(id, received, total_size, "remote download ended short");
            return Err(RemoteError::Io(format!(
                "stream ended after {received} of {total_size} bytes"
            )));
        }

        self.store.complete_remote(id);
        tracing::info!(id, file = %file_name, received, "remote download complete");
        Ok(dest.to_path_buf())
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        reqwest::StatusCode::UNAUTHORIZED => Err(RemoteError::AuthRejected),
        status => Err(RemoteError::ProtocolMismatch(format!(
            "remote returned {status}"
        ))),
    }
}

fn join_rel(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}
