use std::time::Duration;

use url::Url;

use crate::request::{Endpoint, LEGACY_MENU_URL, MENU_SAMP_URL};

static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// What to do when the upstream answers with a non-2xx status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Hand the body back regardless of status. The upstream has been seen
    /// serving usable pages with error statuses.
    #[default]
    Passthrough,
    /// Fail with [`Error::Status`](crate::Error::Status).
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    endpoint: Url,
    legacy_endpoint: Url,
    timeout: Option<Duration>,
    status_policy: StatusPolicy,
    gzip: bool,
    keep_alive: bool,
    user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(MENU_SAMP_URL).expect("base url should be valid!"),
            legacy_endpoint: Url::parse(LEGACY_MENU_URL).expect("legacy url should be valid!"),
            timeout: None,
            status_policy: StatusPolicy::default(),
            gzip: true,
            keep_alive: true,
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

impl FetchConfig {
    /// Overrides the `menuSamp.asp` url, ex. to point at a mock server.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidEndpoint`](crate::Error::InvalidEndpoint) if `url`
    /// does not parse as an absolute url.
    pub fn endpoint(mut self, url: &str) -> crate::Result<Self> {
        self.endpoint = url.parse()?;
        Ok(self)
    }

    /// Overrides the legacy `menu.php` url.
    ///
    /// # Errors
    ///
    /// Same as [`FetchConfig::endpoint`].
    pub fn legacy_endpoint(mut self, url: &str) -> crate::Result<Self> {
        self.legacy_endpoint = url.parse()?;
        Ok(self)
    }

    /// Per-request timeout applied by the client. `None` waits indefinitely.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    #[must_use]
    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    /// When disabled, connections are closed as soon as a response has been
    /// read instead of being pooled for the next request.
    #[must_use]
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub const fn url_for(&self, endpoint: Endpoint) -> &Url {
        match endpoint {
            Endpoint::MenuSamp => &self.endpoint,
            Endpoint::LegacyMenuPhp => &self.legacy_endpoint,
        }
    }

    #[inline]
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[inline]
    #[must_use]
    pub const fn policy(&self) -> StatusPolicy {
        self.status_policy
    }

    #[inline]
    #[must_use]
    pub const fn gzip_enabled(&self) -> bool {
        self.gzip
    }

    #[inline]
    #[must_use]
    pub const fn keep_alive_enabled(&self) -> bool {
        self.keep_alive
    }

    #[inline]
    #[must_use]
    pub fn user_agent_str(&self) -> &str {
        &self.user_agent
    }
}
