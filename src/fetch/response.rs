use std::{borrow::Cow, ops::Deref};

use reqwest::StatusCode;

/// A menu page exactly as the upstream sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl MenuResponse {
    pub(crate) const fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Status the body arrived with. Informational unless the fetcher was
    /// configured with [`StatusPolicy::Reject`](crate::StatusPolicy::Reject).
    #[inline]
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    /// The body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl Deref for MenuResponse {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.body
    }
}

impl AsRef<[u8]> for MenuResponse {
    fn as_ref(&self) -> &[u8] {
        &self.body
    }
}

impl From<MenuResponse> for Vec<u8> {
    fn from(value: MenuResponse) -> Self {
        value.body
    }
}
