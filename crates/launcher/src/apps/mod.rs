//! App registry: records and the transactional handler.

mod details;
mod handler;

pub use details::{AppArgs, AppDetails, AppName};
pub use handler::{AppHandler, Snapshot};
