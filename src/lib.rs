pub mod common;
pub mod listing;
pub mod registry;
pub mod remote;
pub mod server;
pub mod service;
pub mod store;
pub mod utils;

// Constants shared by server and client cores
pub mod config {
    /// Streaming chunk size for file reads and socket writes.
    pub const CHUNK_SIZE: usize = 64 * 1024;

    /// Generated share passwords are this many alphanumeric characters.
    pub const DEFAULT_PASSWORD_LENGTH: usize = 8;
}
