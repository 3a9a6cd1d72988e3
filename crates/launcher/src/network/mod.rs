//! Storage-network collaborator interfaces and the in-memory stand-in.

mod client;
mod memory;

pub use client::{AccountGetter, NetworkClient, NetworkError, NetworkResult};
pub use memory::InMemoryNetwork;
