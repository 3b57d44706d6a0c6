use thiserror::Error;

use crate::op::UserOperation;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {reason}")]
    Malformed { reason: String },
    #[error("unknown operation tag {0}")]
    UnknownOperation(String),
    #[error("payload for {op} did not match its schema: {source}")]
    Payload {
        op: UserOperation,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ProtocolError::Malformed {
            reason: reason.into(),
        }
    }

    /// True for frames that should be logged and dropped rather than
    /// delivered anywhere.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ProtocolError::Malformed { .. } | ProtocolError::UnknownOperation(_)
        )
    }
}
