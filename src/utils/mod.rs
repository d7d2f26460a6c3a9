pub mod net;
pub mod security;
