use serde::Deserialize;
use thiserror::Error;

/// Structured error reported by the appliance.
///
/// iControl REST answers failures with an envelope such as
/// `{"code": 404, "message": "01020036:3: The requested Pool (/Common/web) was not found.", "errorStack": []}`.
/// The leading `01020036:3` of the message is the appliance error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status of the response
    pub status: u16,
    /// Appliance-defined error code, when the message carries one
    pub code: Option<String>,
    /// Human readable message (raw body text when no envelope was present)
    pub message: String,
    /// Appliance stack trace lines, if any
    pub error_stack: Vec<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {} :: {}", self.status, self.message)
    }
}

/// Coarse classification of every failure the core can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad credentials, or a token still rejected after one refresh
    Auth,
    /// The addressed object does not exist
    NotFound,
    /// Duplicate create or appliance-side validation rejection
    Conflict,
    /// Any other non-2xx answer, including 5xx
    Remote,
    /// No usable response was obtained (network, TLS, timeout, cancellation)
    Transport,
}

/// Main error type for appliance operations
#[derive(Debug, Error)]
pub enum BigIpError {
    /// Request rejected with an authentication failure
    #[error("authentication rejected: {0}")]
    Auth(ApiError),

    /// Object absent on the appliance
    #[error("not found: {0}")]
    NotFound(ApiError),

    /// Duplicate name or validation rejection
    #[error("conflict: {0}")]
    Conflict(ApiError),

    /// Any other appliance failure
    #[error("appliance error: {0}")]
    Remote(ApiError),

    /// Login or token refresh failed
    #[error("login failed: {0}")]
    Login(#[source] Box<BigIpError>),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Response did not follow the expected wire protocol
    #[error("malformed response: {0}")]
    Protocol(String),

    /// Call cancelled through its context
    #[error("request cancelled")]
    Cancelled,

    /// Call deadline passed before a response was obtained
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid local configuration or argument
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Local I/O failure while dispatching a request
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BigIpError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BigIpError::Auth(_) | BigIpError::Login(_) => ErrorKind::Auth,
            BigIpError::NotFound(_) => ErrorKind::NotFound,
            BigIpError::Conflict(_) => ErrorKind::Conflict,
            BigIpError::Remote(_) | BigIpError::Json(_) => ErrorKind::Remote,
            BigIpError::Reqwest(_)
            | BigIpError::Protocol(_)
            | BigIpError::Cancelled
            | BigIpError::DeadlineExceeded
            | BigIpError::UrlParse(_)
            | BigIpError::Config(_)
            | BigIpError::Io(_) => ErrorKind::Transport,
        }
    }

    /// Check if this error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this error is a duplicate or validation rejection
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Check if this error is an authentication failure
    pub fn is_auth_failure(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Decoded appliance error, if the appliance answered at all
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            BigIpError::Auth(e)
            | BigIpError::NotFound(e)
            | BigIpError::Conflict(e)
            | BigIpError::Remote(e) => Some(e),
            BigIpError::Login(inner) => inner.api_error(),
            _ => None,
        }
    }

    /// Get the HTTP status code, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            BigIpError::Reqwest(e) => e.status().map(|s| s.as_u16()),
            other => other.api_error().map(|e| e.status),
        }
    }

    /// Get the appliance error code (e.g. `01020036:3`)
    pub fn appliance_code(&self) -> Option<&str> {
        self.api_error().and_then(|e| e.code.as_deref())
    }
}

/// Result type for appliance operations
pub type Result<T> = std::result::Result<T, BigIpError>;

/// Message fragments used to classify appliance errors.
///
/// Appliance versions word their messages differently, so the fragments are
/// data rather than literals. Matching is a case-insensitive substring test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPatterns {
    /// Fragments meaning the addressed object is missing
    pub not_found: Vec<String>,
    /// Fragments meaning a duplicate name
    pub conflict: Vec<String>,
}

impl Default for ErrorPatterns {
    fn default() -> Self {
        ErrorPatterns {
            not_found: vec![
                "was not found".to_string(),
                "object not found".to_string(),
                "does not exist".to_string(),
            ],
            conflict: vec!["already exists".to_string()],
        }
    }
}

impl ErrorPatterns {
    fn matches(patterns: &[String], message: &str) -> bool {
        let message = message.to_lowercase();
        patterns
            .iter()
            .any(|p| !p.is_empty() && message.contains(&p.to_lowercase()))
    }

    /// Check whether the message reports a missing object
    pub fn is_not_found(&self, message: &str) -> bool {
        Self::matches(&self.not_found, message)
    }

    /// Check whether the message reports a duplicate object
    pub fn is_conflict(&self, message: &str) -> bool {
        Self::matches(&self.conflict, message)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    message: String,
    #[serde(default)]
    error_stack: Vec<String>,
}

/// Split the `<hex8>:<n>:` prefix off an appliance message.
fn appliance_code(message: &str) -> Option<String> {
    let mut parts = message.splitn(3, ':');
    let id = parts.next()?;
    let severity = parts.next()?;
    parts.next()?;

    let id_ok = id.len() == 8 && id.chars().all(|c| c.is_ascii_hexdigit());
    let severity_ok = !severity.is_empty() && severity.chars().all(|c| c.is_ascii_digit());
    if id_ok && severity_ok {
        Some(format!("{}:{}", id, severity))
    } else {
        None
    }
}

/// Turn a non-2xx response into a typed error.
///
/// The body is decoded as the appliance error envelope when possible; otherwise
/// the raw body text becomes the message. This is the only place that decides
/// whether a failure means "not found".
pub fn map_error(status: u16, body: &[u8], patterns: &ErrorPatterns) -> BigIpError {
    let api = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError {
            status,
            code: appliance_code(&envelope.message),
            message: envelope.message,
            error_stack: envelope.error_stack,
        },
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            let message = if text.is_empty() {
                reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                text
            };
            ApiError {
                status,
                code: None,
                message,
                error_stack: Vec::new(),
            }
        }
    };

    if status == 401 {
        BigIpError::Auth(api)
    } else if status == 404 || patterns.is_not_found(&api.message) {
        BigIpError::NotFound(api)
    } else if status == 409 || patterns.is_conflict(&api.message) {
        BigIpError::Conflict(api)
    } else if status == 400 && api.code.is_some() {
        BigIpError::Conflict(api)
    } else {
        BigIpError::Remote(api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(code: u16, message: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "code": code,
            "message": message,
            "errorStack": ["at com.f5.rest.Example"],
            "apiError": 3
        }))
        .unwrap()
    }

    #[test]
    fn test_not_found_by_status() {
        let body = envelope(404, "01020036:3: The requested Pool (/Common/web) was not found.");
        let err = map_error(404, &body, &ErrorPatterns::default());
        assert!(err.is_not_found());
        assert_eq!(err.appliance_code(), Some("01020036:3"));
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.api_error().unwrap().error_stack.len(), 1);
    }

    #[test]
    fn test_not_found_by_message() {
        // Some endpoints answer a missing object with a 400
        let body = envelope(400, "01020036:3: The requested monitor (/Common/m) was not found.");
        let err = map_error(400, &body, &ErrorPatterns::default());
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_conflict() {
        let body = envelope(
            409,
            "01020066:3: The requested Pool (/Common/web) already exists in partition Common.",
        );
        let err = map_error(409, &body, &ErrorPatterns::default());
        assert!(err.is_conflict());

        let body = envelope(400, "01070734:3: Configuration error: invalid monitor rule");
        let err = map_error(400, &body, &ErrorPatterns::default());
        assert!(err.is_conflict());
    }

    #[test]
    fn test_auth_failure() {
        let body = envelope(401, "Authorization failed: no user authentication header or token detected.");
        let err = map_error(401, &body, &ErrorPatterns::default());
        assert!(err.is_auth_failure());
    }

    #[test]
    fn test_fallback_to_raw_body() {
        let err = map_error(503, b"<html>Service Unavailable</html>", &ErrorPatterns::default());
        assert_eq!(err.kind(), ErrorKind::Remote);
        let api = err.api_error().unwrap();
        assert_eq!(api.code, None);
        assert_eq!(api.message, "<html>Service Unavailable</html>");

        let err = map_error(500, b"", &ErrorPatterns::default());
        assert_eq!(err.api_error().unwrap().message, "Internal Server Error");
    }

    #[test]
    fn test_custom_patterns() {
        let patterns = ErrorPatterns {
            not_found: vec!["no such object".to_string()],
            conflict: Vec::new(),
        };
        let body = envelope(400, "No Such Object: /Common/x");
        assert!(map_error(400, &body, &patterns).is_not_found());
        let body = envelope(500, "The requested Pool (/Common/web) was not found.");
        assert_eq!(map_error(500, &body, &patterns).kind(), ErrorKind::Remote);
    }

    #[test]
    fn test_appliance_code_parsing() {
        assert_eq!(appliance_code("0107163f:3: Invalid"), Some("0107163f:3".to_string()));
        assert_eq!(appliance_code("Object not found - /Common/x"), None);
        assert_eq!(appliance_code("01020036:3"), None);
        assert_eq!(appliance_code("http://host:8100: boom"), None);
    }

    #[test]
    fn test_transport_kinds() {
        assert_eq!(BigIpError::Cancelled.kind(), ErrorKind::Transport);
        assert_eq!(BigIpError::Protocol("short".into()).kind(), ErrorKind::Transport);
        let login = BigIpError::Login(Box::new(BigIpError::DeadlineExceeded));
        assert!(login.is_auth_failure());
    }
}
