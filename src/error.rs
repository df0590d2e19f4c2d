use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// DNS, connect, TLS or body read failure. The `reqwest` error is kept as
    /// the source.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Only returned under [`StatusPolicy::Reject`](crate::StatusPolicy::Reject).
    #[error("Upstream responded with {status}")]
    Status { status: StatusCode, body: Vec<u8> },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Request did not complete within {0:?}")]
    DeadlineElapsed(Duration),

    #[error("Invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl Error {
    /// Whether the error came from the transport rather than from the caller
    /// or the status policy.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
