use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected locally before any remote call was made
    Validation,
    /// Backend answered 4xx
    Client,
    /// Backend answered 5xx
    Server,
    /// No response at all (connect, timeout, reset)
    Transport,
    /// Another mutation on the same relation is still in flight
    Conflict,
    /// Backend answered 2xx with a body we could not read
    Decode,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Client => "client_error",
            Self::Server => "server_error",
            Self::Transport => "transport_error",
            Self::Conflict => "conflict",
            Self::Decode => "decode_error",
        }
    }

    /// Classify an HTTP status code. Anything that is not 4xx is treated as a
    /// server-side failure.
    pub fn from_status(status: u16) -> Self {
        if (400..500).contains(&status) {
            Self::Client
        } else {
            Self::Server
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one error shape every remote failure is normalized into before it
/// reaches the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ResourceError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

const MAX_PLAIN_BODY_CHARS: usize = 300;

impl ResourceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    /// Build an error from a non-success response body.
    ///
    /// The backend is inconsistent about where it puts the reason: `error`,
    /// `message`, `details`, WordPress-style `{code, message, data}`, or plain
    /// text. All of them end up in `message`.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| extract_message(&value))
            .or_else(|| {
                let text = body.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.chars().take(MAX_PLAIN_BODY_CHARS).collect())
                }
            })
            .unwrap_or_else(|| format!("Request failed with status {}", status));

        Self::from_status(status, message)
    }
}

fn extract_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(extract_message).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Object(map) => ["error", "message", "details"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(extract_message)
            .or_else(|| map.get("data").and_then(extract_message)),
        _ => None,
    }
}
