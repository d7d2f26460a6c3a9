//! Shared handler state for one server session.

use std::path::PathBuf;
use std::sync::Arc;

use crate::registry::PathRegistry;
use crate::server::auth::TokenStore;
use crate::store::TransferStore;

/// Cloneable state handed to every request handler.
///
/// Registry and store are shared with the owning service; password,
/// token store, and receive directory belong to this server session and
/// die with it.
#[derive(Clone)]
pub struct AppState {
    pub registry: PathRegistry,
    pub store: TransferStore,
    pub tokens: TokenStore,
    pub password: Arc<str>,
    pub receive_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(
        registry: PathRegistry,
        store: TransferStore,
        password: String,
        receive_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            store,
            tokens: TokenStore::new(),
            password: password.into(),
            receive_dir: Arc::new(receive_dir),
        }
    }
}
