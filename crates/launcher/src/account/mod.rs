//! Account state and its encrypted network representation.

mod handler;

pub use handler::{Account, AccountHandler, ACCOUNT_FORMAT_VERSION};
