//! LSP surface: server, wire conversion, custom requests

pub mod convert;
pub mod requests;
pub mod server;

pub use server::{build_service, Backend};
