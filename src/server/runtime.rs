//! Server bootstrap and shutdown.
//!
//! Binding happens synchronously so a port conflict fails fast with
//! `PortInUse` before any state changes; shutdown drains in-flight
//! transfers for a bounded grace period and only returns once the
//! accept loop has exited and the port is released.

use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::common::AppError;

pub struct RunningServer {
    pub port: u16,
    handle: axum_server::Handle,
    task: JoinHandle<std::io::Result<()>>,
}

/// Bind `0.0.0.0:<port>` (0 = ephemeral) and start serving `app`.
pub async fn start_server(app: Router, port: u16) -> Result<RunningServer, AppError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = std::net::TcpListener::bind(addr).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            AppError::PortInUse(port)
        } else {
            AppError::Internal(anyhow::Error::from(e).context("failed to bind listener"))
        }
    })?;
    listener
        .set_nonblocking(true)
        .context("failed to set listener non-blocking")?;

    let bound_port = listener
        .local_addr()
        .context("failed to read bound address")?
        .port();

    let handle = axum_server::Handle::new();
    let serve_handle = handle.clone();
    let task = tokio::spawn(async move {
        axum_server::from_tcp(listener)
            .handle(serve_handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
    });

    tracing::info!(port = bound_port, "server listening");
    Ok(RunningServer {
        port: bound_port,
        handle,
        task,
    })
}

impl RunningServer {
    /// Stop accepting, give in-flight transfers `grace` to finish, then
    /// force-close. Awaits the accept loop so the port is free on return.
    pub async fn shutdown(self, grace: Duration) {
        tracing::info!(port = self.port, grace_secs = grace.as_secs(), "stopping server");
        self.handle.graceful_shutdown(Some(grace));

        match self.task.await {
            Ok(Ok(())) => tracing::info!(port = self.port, "server stopped"),
            Ok(Err(err)) => tracing::warn!(port = self.port, "serve loop ended with error: {err}"),
            Err(err) => tracing::warn!(port = self.port, "serve task panicked: {err}"),
        }
    }
}
