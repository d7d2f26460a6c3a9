// Submodules
pub mod auth;
pub mod handlers;
pub mod routes;
pub mod runtime;
pub mod state;
pub mod stream;

pub use state::AppState;
