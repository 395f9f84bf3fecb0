//! Docker volume plugin API.

pub mod protocol;
pub mod server;
