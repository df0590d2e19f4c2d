use chrono::NaiveDate;
use reqwest::Method;
use url::Url;

use crate::hall::DiningHall;

/// The canonical menu page.
pub const MENU_SAMP_URL: &str = "http://nutrition.sa.ucsc.edu/menuSamp.asp";
/// The older form-posting endpoint, see the scripts under http://eat.ucsc.edu/scripts/.
pub const LEGACY_MENU_URL: &str = "http://eat.ucsc.edu/menu.php";

/// Format the upstream expects for `dtdate`, ex. `01/05/2018`.
///
/// Only years 0 through 9999 come out as four digits. Outside that range
/// `%Y` adds a sign and extra digits (`01/05/+10000`, `01/05/-0001`), which
/// is sent as is.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Without it the upstream renders the first meal of the day incorrectly.
const MY_ACTION: &str = "read";
const SITE_NAME: &str = "UC Santa Cruz Dining";
const NA_FLAG: &str = "1";

/// Which generation of the upstream a request is shaped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endpoint {
    /// `GET menuSamp.asp` with the parameters in the query string.
    #[default]
    MenuSamp,
    /// `POST menu.php` with a form encoded body.
    LegacyMenuPhp,
}

impl Endpoint {
    #[must_use]
    pub const fn default_url(self) -> &'static str {
        match self {
            Self::MenuSamp => MENU_SAMP_URL,
            Self::LegacyMenuPhp => LEGACY_MENU_URL,
        }
    }

    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::MenuSamp => Method::GET,
            Self::LegacyMenuPhp => Method::POST,
        }
    }
}

/// Everything needed to fetch one menu page. Build it with
/// [`DiningHall::on`] or [`RequestDescriptor::new`]; building never fails and
/// does no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    hall: DiningHall,
    date: NaiveDate,
    dtdate: String,
    endpoint: Endpoint,
    site_flags: bool,
}

impl RequestDescriptor {
    #[must_use]
    pub fn new(hall: DiningHall, date: NaiveDate) -> Self {
        Self {
            hall,
            date,
            dtdate: date.format(DATE_FORMAT).to_string(),
            endpoint: Endpoint::default(),
            site_flags: false,
        }
    }

    /// Targets `endpoint` instead of the canonical menu page.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Also sends `sName` and `naFlag` with the values the site documents.
    /// The upstream does not enforce either.
    #[must_use]
    pub fn with_site_flags(mut self) -> Self {
        self.site_flags = true;
        self
    }

    #[inline]
    #[must_use]
    pub const fn hall(&self) -> DiningHall {
        self.hall
    }

    #[inline]
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// The serve date as sent upstream, `MM/DD/YYYY`.
    #[inline]
    #[must_use]
    pub fn dtdate(&self) -> &str {
        &self.dtdate
    }

    #[inline]
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Query parameters for [`Endpoint::MenuSamp`], unescaped and in the
    /// order they are emitted.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("locationNum", self.hall.id_param()),
            ("locationName", self.hall.location_name().to_owned()),
            ("dtdate", self.dtdate.clone()),
            ("myaction", MY_ACTION.to_owned()),
        ];
        if self.site_flags {
            pairs.push(("sName", SITE_NAME.to_owned()));
            pairs.push(("naFlag", NA_FLAG.to_owned()));
        }
        pairs
    }

    /// The url to send the request to, relative to `base`.
    ///
    /// For [`Endpoint::MenuSamp`] the query parameters are form encoded onto
    /// `base`. The legacy endpoint carries everything in the body, so `base`
    /// is returned as is.
    #[must_use]
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if self.endpoint == Endpoint::MenuSamp {
            url.query_pairs_mut().extend_pairs(self.query_pairs());
        }
        url
    }

    /// Body for [`Endpoint::LegacyMenuPhp`]. The quotes around the date are
    /// part of what the server expects.
    #[must_use]
    pub fn legacy_form_body(&self) -> String {
        format!(
            "serve_date=\"{}\"&location_num={}&foodproDB=true",
            self.dtdate,
            self.hall.id()
        )
    }
}

/// Up to `count` consecutive calendar days starting at `start`. Stops early
/// at [`NaiveDate::MAX`].
pub fn date_iter(start: NaiveDate, count: i64) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take(usize::try_from(count).unwrap_or(0))
}
