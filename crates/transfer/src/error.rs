use std::fmt;

use resumable_protocol::is_retryable_status;
use resumable_retry::Retryable;

use crate::transport::Response;

/// Errors from a [`ResumptionStore`](crate::ResumptionStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored URL for {fingerprint} is invalid: {url:?}")]
    InvalidUrl { fingerprint: String, url: String },
}

/// Errors from a [`Transport`](crate::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Network failures are transient; a request the transport refused to
    /// build will fail the same way next time.
    pub fn should_retry(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

/// What went wrong in a protocol exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// The server answered with a status the exchange does not accept.
    UnexpectedStatus(u16),

    /// A required header was absent.
    MissingHeader(&'static str),

    /// A header was present but unusable.
    InvalidHeader(&'static str),

    /// The server's offset disagrees with ours. `expected` is the offset
    /// this client asserted or computed, `actual` the one the server
    /// reported, if any.
    OffsetConflict { expected: u64, actual: Option<u64> },

    /// The server's view of the upload does not fit the local one.
    LengthMismatch { expected: u64, actual: u64 },
}

/// A response that violated the protocol, or a status the exchange does not
/// accept.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    message: String,
    response: Option<Response>,
}

impl ProtocolError {
    pub fn new(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            response: None,
        }
    }

    /// Attaches the response that caused the error.
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    pub(crate) fn unexpected_status(action: &str, response: Response) -> Self {
        let status = response.status;
        Self::new(
            ProtocolErrorKind::UnexpectedStatus(status),
            format!("unexpected status {status} while {action}"),
        )
        .with_response(response)
    }

    pub(crate) fn missing_header(name: &'static str, response: Response) -> Self {
        Self::new(
            ProtocolErrorKind::MissingHeader(name),
            format!("response is missing the {name} header"),
        )
        .with_response(response)
    }

    pub(crate) fn invalid_header(
        name: &'static str,
        detail: impl fmt::Display,
        response: Response,
    ) -> Self {
        Self::new(
            ProtocolErrorKind::InvalidHeader(name),
            format!("invalid {name} header: {detail}"),
        )
        .with_response(response)
    }

    pub fn kind(&self) -> &ProtocolErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The offending response, when the error came from one.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// HTTP status of the offending response.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Only server-side trouble (5xx, 423 Locked) is worth another try.
    /// Malformed responses and conflicts need a different request.
    pub fn should_retry(&self) -> bool {
        match self.kind {
            ProtocolErrorKind::UnexpectedStatus(status) => is_retryable_status(status),
            _ => false,
        }
    }

    /// True when a stored resource URL can no longer be resumed: the server
    /// forgot it (404/410) or it describes a different payload.
    pub(crate) fn is_stale_resource(&self) -> bool {
        matches!(
            self.kind,
            ProtocolErrorKind::UnexpectedStatus(404 | 410)
                | ProtocolErrorKind::LengthMismatch { .. }
        )
    }
}

/// Errors produced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fingerprint not found in resumption store: {0}")]
    FingerprintNotFound(String),

    #[error("resuming is not enabled")]
    ResumingNotEnabled,

    #[error("resumption store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Retryable for UploadError {
    fn should_retry(&self) -> bool {
        match self {
            Self::Protocol(err) => err.should_retry(),
            Self::Transport(err) => err.should_retry(),
            Self::Io(_) => true,
            Self::FingerprintNotFound(_)
            | Self::ResumingNotEnabled
            | Self::Store(_)
            | Self::Config(_) => false,
        }
    }
}
