use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ProtocolError;
use crate::op::{UnknownOperation, UserOperation};

/// Text frame as it travels over the socket. Every field is optional here;
/// [`Envelope::decode`] enforces which combinations are meaningful.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WireFrame {
    #[serde(alias = "operation", default, skip_serializing_if = "Option::is_none")]
    op: Option<String>,
    #[serde(alias = "payload", default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    reconnect: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Payload(Value),
    /// Error key such as `couldnt_find_post`.
    Error(String),
    Empty,
}

/// Inbound message unit shared by every subscriber of the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub op: Option<UserOperation>,
    pub outcome: Outcome,
    pub reconnect: bool,
}

impl Envelope {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let frame: WireFrame = serde_json::from_str(text)
            .map_err(|err| ProtocolError::malformed(format!("invalid json: {err}")))?;

        let op = match frame.op.as_deref() {
            Some(tag) => Some(
                tag.parse::<UserOperation>()
                    .map_err(|UnknownOperation(tag)| ProtocolError::UnknownOperation(tag))?,
            ),
            None => None,
        };

        let outcome = match (frame.error, frame.data) {
            (Some(error), data) => {
                if data.is_some() {
                    debug!(
                        target = "agora::proto",
                        op = ?op,
                        error = %error,
                        "frame carried both payload and error; keeping the error"
                    );
                }
                Outcome::Error(error)
            }
            (None, Some(data)) => {
                if op.is_none() {
                    return Err(ProtocolError::malformed(
                        "payload without an operation tag",
                    ));
                }
                Outcome::Payload(data)
            }
            (None, None) => Outcome::Empty,
        };

        if outcome == Outcome::Empty && !frame.reconnect {
            return Err(ProtocolError::malformed(
                "frame has neither payload, error nor reconnect marker",
            ));
        }

        Ok(Envelope {
            op,
            outcome,
            reconnect: frame.reconnect,
        })
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let (data, error) = match &self.outcome {
            Outcome::Payload(value) => (Some(value.clone()), None),
            Outcome::Error(key) => (None, Some(key.clone())),
            Outcome::Empty => (None, None),
        };
        let frame = WireFrame {
            op: self.op.map(|op| op.as_str().to_string()),
            data,
            error,
            reconnect: self.reconnect,
        };
        serde_json::to_string(&frame).map_err(ProtocolError::Encode)
    }

    /// Synthetic envelope published once after every successful reconnection.
    pub fn reconnect_signal() -> Self {
        Envelope {
            op: None,
            outcome: Outcome::Empty,
            reconnect: true,
        }
    }

    pub fn success<T: Serialize>(op: UserOperation, payload: &T) -> Result<Self, ProtocolError> {
        let value = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Envelope {
            op: Some(op),
            outcome: Outcome::Payload(value),
            reconnect: false,
        })
    }

    pub fn failure(op: UserOperation, key: impl Into<String>) -> Self {
        Envelope {
            op: Some(op),
            outcome: Outcome::Error(key.into()),
            reconnect: false,
        }
    }

    pub fn is_op(&self, op: UserOperation) -> bool {
        self.op == Some(op)
    }

    pub fn is_reconnect_signal(&self) -> bool {
        self.reconnect
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Error(key) => Some(key),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Payload(value) => Some(value),
            _ => None,
        }
    }

    /// Deserializes the payload into the response type of `self.op`.
    /// Returns `Ok(None)` when the envelope carries no payload.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<Option<T>, ProtocolError> {
        let (Some(op), Some(value)) = (self.op, self.payload()) else {
            return Ok(None);
        };
        T::deserialize(value)
            .map(Some)
            .map_err(|source| ProtocolError::Payload { op, source })
    }
}

/// Outbound frame. The server answers with an [`Envelope`] carrying the same
/// operation tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    op: UserOperation,
    data: Value,
}

impl Request {
    pub fn new<T: Serialize>(op: UserOperation, form: &T) -> Result<Self, ProtocolError> {
        let data = serde_json::to_value(form).map_err(ProtocolError::Encode)?;
        Ok(Request { op, data })
    }

    /// Attaches the opaque credential as `data.auth`. Forms that serialize to
    /// something other than an object are left untouched.
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        if let Value::Object(map) = &mut self.data {
            map.insert("auth".to_string(), Value::String(token.into()));
        }
        self
    }

    pub fn op(&self) -> UserOperation {
        self.op
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let frame = WireFrame {
            op: Some(self.op.as_str().to_string()),
            data: Some(self.data.clone()),
            error: None,
            reconnect: false,
        };
        serde_json::to_string(&frame).map_err(ProtocolError::Encode)
    }

    /// Parses a request frame, as the mock server side does.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let frame: WireFrame = serde_json::from_str(text)
            .map_err(|err| ProtocolError::malformed(format!("invalid json: {err}")))?;
        let tag = frame
            .op
            .ok_or_else(|| ProtocolError::malformed("request without an operation tag"))?;
        let op = tag
            .parse::<UserOperation>()
            .map_err(|UnknownOperation(tag)| ProtocolError::UnknownOperation(tag))?;
        Ok(Request {
            op,
            data: frame.data.unwrap_or(Value::Object(Default::default())),
        })
    }
}
