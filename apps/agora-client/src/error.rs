use agora_proto::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("channel is not connected")]
    NotConnected,
    #[error("channel failed permanently; no further sends are possible")]
    ConnectionFailed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
