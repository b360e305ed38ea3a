pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod flag;
pub mod github;
pub mod server;
pub mod stamp;

pub use error::{DeployError, Result};
