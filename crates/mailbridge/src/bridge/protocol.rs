//! Wire protocol types for supervisor-worker communication.
//!
//! One channel carries both directions:
//! - **Requests** (supervisor → worker): `{"id", "type": "dsn"|"send", "payload"}`
//! - **Responses** (worker → supervisor): `{"id"?, "status": "ok"|"error", "message"?}`
//!
//! Both sides decode through [`Request::decode`] / [`Response::decode`], which
//! turn a raw JSON value into a well-formed message or a [`ProtocolError`].

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Correlation token pairing a request with its response.
///
/// The supervisor allocates decimal counters; the worker echoes whatever it
/// received. Numeric ids from other peers are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the worker is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Initialize the mail transport from a connection string.
    Configure,
    /// Deliver one message.
    Send,
    /// Anything else. Only ever produced by decoding; the worker answers it
    /// with a per-request error.
    Other(String),
}

impl RequestKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Configure => "dsn",
            Self::Send => "send",
            Self::Other(kind) => kind,
        }
    }

    fn parse(kind: &str) -> Self {
        match kind {
            "dsn" => Self::Configure,
            "send" => Self::Send,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RequestKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Structural problems with a decoded line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid field `{0}`")]
    InvalidField(&'static str),
}

fn as_object(value: Value) -> Result<Map<String, Value>, ProtocolError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ProtocolError::NotAnObject),
    }
}

/// Removes a field, treating `null` the same as absent.
fn take_field(map: &mut Map<String, Value>, field: &str) -> Option<Value> {
    map.remove(field).filter(|v| !v.is_null())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub id: RequestId,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub payload: Value,
}

impl Request {
    pub fn new(id: RequestId, kind: RequestKind, payload: Value) -> Self {
        Self { id, kind, payload }
    }

    /// Validate a decoded line as a request.
    ///
    /// A bare list, or an object missing `id`, `type` or `payload`, is an error.
    /// An unrecognised `type` is not: it decodes to [`RequestKind::Other`].
    pub fn decode(value: Value) -> Result<Self, ProtocolError> {
        let mut map = as_object(value)?;

        let id = take_field(&mut map, "id").ok_or(ProtocolError::MissingField("id"))?;
        let id = RequestId::from_value(&id).ok_or(ProtocolError::InvalidField("id"))?;

        let kind = match take_field(&mut map, "type").ok_or(ProtocolError::MissingField("type"))? {
            Value::String(kind) => RequestKind::parse(&kind),
            other => RequestKind::Other(other.to_string()),
        };

        let payload = take_field(&mut map, "payload").ok_or(ProtocolError::MissingField("payload"))?;

        Ok(Self { id, kind, payload })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    /// Absent only on a fatal, connection-ending worker error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn ok(id: RequestId) -> Self {
        Self {
            id: Some(id),
            status: Status::Ok,
            message: None,
        }
    }

    pub fn error(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            status: Status::Error,
            message: Some(message.into()),
        }
    }

    /// Id-less error: the worker is about to stop serving the connection.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            id: None,
            status: Status::Error,
            message: Some(message.into()),
        }
    }

    /// Validate a decoded line as a response.
    ///
    /// `status` is mandatory; any value other than `"ok"` counts as an error.
    pub fn decode(value: Value) -> Result<Self, ProtocolError> {
        let mut map = as_object(value)?;

        let status = match take_field(&mut map, "status") {
            Some(Value::String(s)) if s == "ok" => Status::Ok,
            Some(_) => Status::Error,
            None => return Err(ProtocolError::MissingField("status")),
        };

        let id = match take_field(&mut map, "id") {
            Some(id) => Some(RequestId::from_value(&id).ok_or(ProtocolError::InvalidField("id"))?),
            None => None,
        };

        let message = match take_field(&mut map, "message") {
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => None,
        };

        Ok(Self {
            id,
            status,
            message,
        })
    }
}
