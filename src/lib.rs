//! Fetches UCSC dining hall menu pages from the nutrition site.
//!
//! This library is reverse engineered from how the dining hall pages talk to
//! their backend. It only fetches; the returned HTML is handed back untouched.
//!
//! To get today's menu at Porter:
//!
//! ```no_run
//! # async fn run() -> ucsc_dining::Result<()> {
//! use ucsc_dining::DiningHall;
//!
//! let page = ucsc_dining::menu_today(DiningHall::PORTER_KRESGE).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Or on some other date:
//!
//! ```no_run
//! # async fn run() -> ucsc_dining::Result<()> {
//! use chrono::NaiveDate;
//! use ucsc_dining::DiningHall;
//!
//! let date = NaiveDate::parse_from_str("01/05/2018", "%m/%d/%Y").unwrap();
//! let page = ucsc_dining::menu(DiningHall::COLLEGES_NINE_TEN, date).await?;
//! # Ok(())
//! # }
//! ```
#![warn(unused_crate_dependencies)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

#[cfg(feature = "blocking")]
pub mod blocking;
mod clock;
mod error;
mod fetch;
mod hall;
mod request;

use std::sync::OnceLock;

use chrono::NaiveDate;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use fetch::{make_client, FetchConfig, Fetcher, MenuResponse, StatusPolicy};
pub use hall::{DiningHall, UnknownHall};
pub use request::{
    date_iter, Endpoint, RequestDescriptor, DATE_FORMAT, LEGACY_MENU_URL, MENU_SAMP_URL,
};
pub use tokio_util::sync::CancellationToken;

static DEFAULT_FETCHER: OnceLock<Fetcher> = OnceLock::new();

/// The fetcher behind [`menu`] and [`menu_today`], built on first use with
/// [`FetchConfig::default`].
///
/// # Errors
///
/// See [`make_client`].
pub fn default_fetcher() -> Result<&'static Fetcher> {
    if let Some(fetcher) = DEFAULT_FETCHER.get() {
        return Ok(fetcher);
    }
    let fetcher = Fetcher::new()?;
    Ok(DEFAULT_FETCHER.get_or_init(|| fetcher))
}

/// Fetches `hall`'s menu page for `date`.
///
/// # Errors
///
/// See [`Fetcher::fetch`].
pub async fn menu(hall: DiningHall, date: NaiveDate) -> Result<MenuResponse> {
    default_fetcher()?.menu(hall, date).await
}

/// Fetches `hall`'s menu page for today on the local clock.
///
/// # Errors
///
/// See [`Fetcher::fetch`].
pub async fn menu_today(hall: DiningHall) -> Result<MenuResponse> {
    default_fetcher()?.menu_today(hall).await
}
