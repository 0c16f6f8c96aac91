use std::{error::Error, fmt};

/// Everything the library can fail with.
///
/// Transport failures and non-2xx statuses both carry a human-readable
/// description extracted from the platform's `{error, error_description}`
/// body when one is present. Malformed responses get their own kinds so
/// callers can tell a broken reply from an unreachable server.
#[derive(Clone, Debug)]
pub enum ApiError {
    /// Network-level failure, connection refused, timeout on the wire.
    Transport(String),
    /// The server answered with a non-success status.
    Status { code: u16, description: String },
    /// A response that was supposed to be JSON was something else.
    InvalidContentType(String),
    /// `Content-Range` header missing a numeric total.
    InvalidContentRange(String),
    /// The body did not match the expected shape.
    Decode(String),
    /// Local file handling failed (upload sources, style files).
    Io(String),
    /// The server has no such resource (endpoint/processing lookups).
    Unavailable(String),
    /// A polled job ended on a failed status; `logs` holds what the server
    /// had to say about it.
    JobFailed { status: String, logs: String },
    /// The polling deadline expired before the job reached a terminal state.
    Timeout,
    Cancelled,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(s) => write!(f, "transport error: {s}"),
            Self::Status { code, description } => write!(f, "HTTP {code}: {description}"),
            Self::InvalidContentType(s) => write!(f, "unexpected content type: {s}"),
            Self::InvalidContentRange(s) => write!(f, "{s}"),
            Self::Decode(s) => write!(f, "response decode error: {s}"),
            Self::Io(s) => write!(f, "i/o error: {s}"),
            Self::Unavailable(s) => write!(f, "{s}"),
            Self::JobFailed { status, logs } => {
                write!(f, "job ended with status {status}")?;
                if !logs.is_empty() {
                    write!(f, ": {logs}")?;
                }
                Ok(())
            }
            Self::Timeout => write!(f, "timed out waiting for the server"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        let err = ApiError::Status {
            code: 403,
            description: "forbidden : token expired".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 403: forbidden : token expired");

        let err = ApiError::JobFailed {
            status: "FAILURE".to_string(),
            logs: String::new(),
        };
        assert_eq!(err.to_string(), "job ended with status FAILURE");
    }
}
