use thiserror::Error;

/// Failures of a deploy run, and of the gate in front of it.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("missing required configuration: {}", .0.join(", "))]
    ConfigurationMissing(Vec<&'static str>),

    #[error("invalid configuration: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("access token is not a valid header value")]
    InvalidToken,

    #[error("invalid API base URL: {0}")]
    InvalidApiBase(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("failed to read file: {status}")]
    RemoteRead { status: u16 },

    #[error("failed to commit file: {status}")]
    RemoteWrite { status: u16 },

    #[error("remote request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode remote content: {0}")]
    Decode(String),

    #[error("flag store error: {0}")]
    Store(#[from] opendal::Error),

    #[error("corrupt flag record: {0}")]
    StoreRecord(#[from] serde_json::Error),
}

pub type Result<T, E = DeployError> = std::result::Result<T, E>;
