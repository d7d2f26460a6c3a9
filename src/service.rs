//! The share service: one object owning the registry, the transfer
//! store, and the server lifecycle. No ambient globals — construct it
//! once and pass handles to whatever drives the UI.

use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::common::{AppConfig, AppError};
use crate::registry::PathRegistry;
use crate::server::auth;
use crate::server::runtime::{self, RunningServer};
use crate::server::{routes, AppState};
use crate::store::{StoreSnapshot, TransferStore};
use crate::utils::net;

/// What the operator shows the other side: URL plus password.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub local_ip: String,
    pub port: u16,
    pub password: String,
}

impl ServerInfo {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.local_ip, self.port)
    }
}

pub struct ShareService {
    registry: PathRegistry,
    store: TransferStore,
    config: AppConfig,
    active: Mutex<Option<RunningServer>>,
}

impl ShareService {
    pub fn new(config: AppConfig) -> Self {
        Self {
            registry: PathRegistry::new(),
            store: TransferStore::new(),
            config,
            active: Mutex::new(None),
        }
    }

    /// Shared-roots registry; mutable at any time, consulted per request.
    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    /// Transfer session store (downloads, uploads, remote pulls).
    pub fn store(&self) -> &TransferStore {
        &self.store
    }

    /// Live snapshot stream for observers (latest-wins).
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.store.subscribe()
    }

    /// Start the server: bind the port, generate a fresh password, begin
    /// accepting. Fails fast with `PortInUse` (registry and store are
    /// left untouched) and with `Conflict` if already running.
    pub async fn start(&self) -> Result<ServerInfo, AppError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(AppError::Conflict("server is already running".to_string()));
        }

        // receive directory must exist before uploads are accepted
        tokio::fs::create_dir_all(&self.config.receive_dir)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!(
                    "cannot create receive directory {}: {e}",
                    self.config.receive_dir.display()
                ))
            })?;

        let password = auth::generate_password(self.config.password_length);
        let state = AppState::new(
            self.registry.clone(),
            self.store.clone(),
            password.clone(),
            self.config.receive_dir.clone(),
        );

        let app = routes::create_router(state);
        let server = runtime::start_server(app, self.config.port).await?;
        let port = server.port;
        *active = Some(server);

        let local_ip = net::get_local_ip().unwrap_or_else(|_| "127.0.0.1".to_string());
        Ok(ServerInfo {
            local_ip,
            port,
            password,
        })
    }

    /// Stop accepting, drain in-flight transfers for the configured
    /// grace period, and release the port. No-op when not running.
    pub async fn stop(&self) {
        let server = self.active.lock().await.take();
        if let Some(server) = server {
            server
                .shutdown(Duration::from_secs(self.config.shutdown_grace_secs))
                .await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }
}
