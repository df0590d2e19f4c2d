//! Synchronous versions of the fetch entry points, each call blocking the
//! current thread until the exchange completes. Must not be used from within
//! an async runtime.
//!
//! There is no cancellation token here; bound calls with
//! [`FetchConfig::timeout`] instead.

use std::sync::OnceLock;

use chrono::NaiveDate;
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::CONTENT_TYPE,
};
use tracing::{instrument, Level};

use crate::{
    clock::{Clock, SystemClock},
    error::{Error, Result},
    fetch::{FetchConfig, MenuResponse, StatusPolicy},
    hall::DiningHall,
    request::{Endpoint, RequestDescriptor},
};

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

/// # Errors
///
/// Returns [`Error::Request`] if the TLS backend cannot be initialized.
pub fn make_client(config: &FetchConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .gzip(config.gzip_enabled())
        .user_agent(config.user_agent_str())
        .timeout(config.request_timeout());
    if !config.keep_alive_enabled() {
        builder = builder.pool_max_idle_per_host(0);
    }
    Ok(builder.build()?)
}

impl Fetcher {
    /// # Errors
    ///
    /// See [`make_client`].
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default())
    }

    /// # Errors
    ///
    /// See [`make_client`].
    pub fn with_config(config: FetchConfig) -> Result<Self> {
        let client = make_client(&config)?;
        Ok(Self { client, config })
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn request_builder(&self, request: &RequestDescriptor) -> RequestBuilder {
        let url = request.url(self.config.url_for(request.endpoint()));
        match request.endpoint() {
            Endpoint::MenuSamp => self.client.get(url),
            Endpoint::LegacyMenuPhp => self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(request.legacy_form_body()),
        }
    }

    /// # Errors
    ///
    /// [`Error::Request`] on any transport failure or client timeout,
    /// [`Error::Status`] for a non-2xx status under [`StatusPolicy::Reject`].
    #[instrument(skip(self, request), fields(
        id = %request.hall().id(),
        date = %request.dtdate(),
    ), level = Level::TRACE)]
    pub fn fetch(&self, request: &RequestDescriptor) -> Result<MenuResponse> {
        let res = self.request_builder(request).send()?;
        let status = res.status();
        let body = res.bytes()?.to_vec();
        tracing::debug!(%status, len = body.len(), "menu page received");

        if status.is_success() {
            return Ok(MenuResponse::new(status, body));
        }
        match self.config.policy() {
            StatusPolicy::Passthrough => {
                tracing::warn!(%status, hall = %request.hall(), "upstream returned non-success status");
                Ok(MenuResponse::new(status, body))
            }
            StatusPolicy::Reject => Err(Error::Status { status, body }),
        }
    }

    /// # Errors
    ///
    /// See [`Fetcher::fetch`].
    pub fn menu(&self, hall: DiningHall, date: NaiveDate) -> Result<MenuResponse> {
        self.fetch(&hall.on(date))
    }

    /// # Errors
    ///
    /// See [`Fetcher::fetch`].
    pub fn menu_today(&self, hall: DiningHall) -> Result<MenuResponse> {
        self.menu_today_with(hall, &SystemClock)
    }

    /// # Errors
    ///
    /// See [`Fetcher::fetch`].
    pub fn menu_today_with(&self, hall: DiningHall, clock: &impl Clock) -> Result<MenuResponse> {
        self.menu(hall, clock.today())
    }
}

static DEFAULT_FETCHER: OnceLock<Fetcher> = OnceLock::new();

fn default_fetcher() -> Result<&'static Fetcher> {
    if let Some(fetcher) = DEFAULT_FETCHER.get() {
        return Ok(fetcher);
    }
    let fetcher = Fetcher::new()?;
    Ok(DEFAULT_FETCHER.get_or_init(|| fetcher))
}

/// # Errors
///
/// See [`Fetcher::fetch`].
pub fn menu(hall: DiningHall, date: NaiveDate) -> Result<MenuResponse> {
    default_fetcher()?.menu(hall, date)
}

/// # Errors
///
/// See [`Fetcher::fetch`].
pub fn menu_today(hall: DiningHall) -> Result<MenuResponse> {
    default_fetcher()?.menu_today(hall)
}
