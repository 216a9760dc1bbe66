use relay_model::ModelErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportErrors {
    #[error("Invalid backend address: {0}")]
    InvalidEndpoint(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Connection is not opened")]
    ConnectionIsNotOpened,
    #[error("Failed to send message: {0}")]
    SendFailed(String),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ModelErrors),
}
