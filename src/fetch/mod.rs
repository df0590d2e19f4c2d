mod config;
mod response;

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, Level};

pub use config::{FetchConfig, StatusPolicy};
pub use response::MenuResponse;

use crate::{
    clock::{Clock, SystemClock},
    error::{Error, Result},
    hall::DiningHall,
    request::{Endpoint, RequestDescriptor},
};

/// Sends [`RequestDescriptor`]s upstream.
///
/// Clones share one connection pool, so clone a fetcher rather than
/// building a new one per request.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: Arc<FetchConfig>,
}

/// # Errors
///
/// Returns [`Error::Request`] if the TLS backend cannot be initialized.
pub fn make_client(config: &FetchConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .gzip(config.gzip_enabled())
        .user_agent(config.user_agent_str());
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
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
        Ok(Self::from_client(client, config))
    }

    /// Uses an existing client. Client level settings in `config` (timeout,
    /// gzip, keep-alive, user agent) are ignored in favor of the client's own.
    #[must_use]
    pub fn from_client(client: Client, config: FetchConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
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

    /// Fetches the page `request` describes.
    ///
    /// The body is read to completion before returning; a connection that
    /// drops mid-body is an error and no partial bytes are returned. Whether
    /// a non-2xx status is an error depends on the configured
    /// [`StatusPolicy`].
    ///
    /// # Errors
    ///
    /// [`Error::Request`] on any transport failure, [`Error::Status`] for a
    /// non-2xx status under [`StatusPolicy::Reject`].
    #[instrument(skip(self, request), fields(
        id = %request.hall().id(),
        date = %request.dtdate(),
    ), level = Level::TRACE)]
    pub async fn fetch(&self, request: &RequestDescriptor) -> Result<MenuResponse> {
        let start = std::time::Instant::now();
        let res = self.request_builder(request).send().await?;
        let status = res.status();
        let body = res.bytes().await?.to_vec();
        tracing::trace!("Got menu page in \t {:?}", start.elapsed());
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

    /// Like [`Fetcher::fetch`], but gives up with [`Error::Cancelled`] once
    /// `token` is cancelled. The in-flight request is dropped along with its
    /// connection.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`], or anything [`Fetcher::fetch`] returns.
    pub async fn fetch_until(
        &self,
        request: &RequestDescriptor,
        token: &CancellationToken,
    ) -> Result<MenuResponse> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(hall = %request.hall(), "menu fetch cancelled");
                Err(Error::Cancelled)
            }
            res = self.fetch(request) => res,
        }
    }

    /// Like [`Fetcher::fetch`], but gives up with [`Error::DeadlineElapsed`]
    /// after `deadline`.
    ///
    /// # Errors
    ///
    /// [`Error::DeadlineElapsed`], or anything [`Fetcher::fetch`] returns.
    pub async fn fetch_within(
        &self,
        request: &RequestDescriptor,
        deadline: Duration,
    ) -> Result<MenuResponse> {
        tokio::time::timeout(deadline, self.fetch(request))
            .await
            .map_err(|_| Error::DeadlineElapsed(deadline))?
    }

    /// # Errors
    ///
    /// See [`Fetcher::fetch`].
    pub async fn menu(&self, hall: DiningHall, date: NaiveDate) -> Result<MenuResponse> {
        self.fetch(&hall.on(date)).await
    }

    /// Today's menu according to the local clock. See [`SystemClock`].
    ///
    /// # Errors
    ///
    /// See [`Fetcher::fetch`].
    pub async fn menu_today(&self, hall: DiningHall) -> Result<MenuResponse> {
        self.menu_today_with(hall, &SystemClock).await
    }

    /// # Errors
    ///
    /// See [`Fetcher::fetch`].
    pub async fn menu_today_with(
        &self,
        hall: DiningHall,
        clock: &impl Clock,
    ) -> Result<MenuResponse> {
        self.menu(hall, clock.today()).await
    }

    /// Fetches every hall in the catalog concurrently, failing on the first
    /// error. Results are in catalog order.
    ///
    /// # Errors
    ///
    /// The first error any of the fetches returns.
    pub async fn menus_on(&self, date: NaiveDate) -> Result<Vec<(DiningHall, MenuResponse)>> {
        futures::future::try_join_all(DiningHall::ALL.into_iter().map(|hall| async move {
            let res = self.menu(hall, date).await?;
            Ok::<_, Error>((hall, res))
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use httpmock::prelude::*;
    use reqwest::StatusCode;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;
    use crate::clock::FixedClock;

    fn setup_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date should be valid")
    }

    fn mock_fetcher(server: &MockServer, config: FetchConfig) -> Fetcher {
        let config = config
            .endpoint(&server.url("/menuSamp.asp"))
            .expect("mock url should be valid")
            .legacy_endpoint(&server.url("/menu.php"))
            .expect("mock url should be valid");
        Fetcher::with_config(config).expect("client creation should succeed")
    }

    /// Accepts one connection and reads the request head off it.
    async fn accept_request(listener: &TcpListener) -> tokio::net::TcpStream {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "client closed before sending a request");
            head.extend_from_slice(&buf[..n]);
        }
        socket
    }

    #[tokio::test]
    async fn test_porter_kresge_on_date() {
        setup_tracing();
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/menuSamp.asp")
                    .query_param("dtdate", "01/05/2018")
                    .query_param("locationName", "Porter Kresge Dining Hall")
                    .query_param("locationNum", "25")
                    .query_param("myaction", "read");
                then.status(200).body("<html>PK</html>");
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let page = fetcher
            .menu(DiningHall::PORTER_KRESGE, ymd(2018, 1, 5))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(page.as_bytes(), b"<html>PK</html>");
        assert_eq!(page.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_colleges_nine_ten_leap_day() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/menuSamp.asp")
                    .query_param("dtdate", "02/29/2020")
                    .query_param("locationNum", "40")
                    .query_param("myaction", "read");
                then.status(200).body("<html>9/10</html>");
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let page = fetcher
            .menu(DiningHall::COLLEGES_NINE_TEN, ymd(2020, 2, 29))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(page.text(), "<html>9/10</html>");
    }

    #[tokio::test]
    async fn test_menu_today_uses_clock() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/menuSamp.asp")
                    .query_param("dtdate", "07/04/2021")
                    .query_param("locationNum", "5")
                    .query_param("myaction", "read");
                then.status(200).body("<html>CS</html>");
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let page = fetcher
            .menu_today_with(DiningHall::COWELL_STEVENSON, &FixedClock(ymd(2021, 7, 4)))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(page.as_bytes(), b"<html>CS</html>");
    }

    #[tokio::test]
    async fn test_menu_today_uses_local_date() {
        let today = SystemClock.today();
        assert_eq!(today, chrono::Local::now().date_naive());
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/menuSamp.asp")
                    .query_param("dtdate", today.format("%m/%d/%Y").to_string())
                    .query_param("locationNum", "20")
                    .query_param("myaction", "read");
                then.status(200).body("<html>CM</html>");
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let page = fetcher
            .menu_today(DiningHall::CROWN_MERRILL)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(page.as_bytes(), b"<html>CM</html>");
    }

    #[tokio::test]
    async fn test_non_success_status_passes_body_through() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/menuSamp.asp");
                then.status(500).body("err");
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let page = fetcher
            .menu(DiningHall::CROWN_MERRILL, ymd(2019, 4, 1))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(page.as_bytes(), b"err");
        assert_eq!(page.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_non_success_status_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/menuSamp.asp");
                then.status(503).body("down");
            })
            .await;
        let fetcher = mock_fetcher(
            &server,
            FetchConfig::default().status_policy(StatusPolicy::Reject),
        );
        let err = fetcher
            .menu(DiningHall::CROWN_MERRILL, ymd(2019, 4, 1))
            .await
            .unwrap_err();
        match err {
            Error::Status { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, b"down");
            }
            e => panic!("expected a status error, got {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_legacy_endpoint_posts_form() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/menu.php")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(r#"serve_date="01/05/2018"&location_num=25&foodproDB=true"#);
                then.status(200).body("<html>legacy</html>");
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let request = DiningHall::PORTER_KRESGE
            .on(ymd(2018, 1, 5))
            .with_endpoint(Endpoint::LegacyMenuPhp);
        let page = fetcher.fetch(&request).await.unwrap();
        mock.assert_async().await;
        assert_eq!(page.as_bytes(), b"<html>legacy</html>");
    }

    #[tokio::test]
    async fn test_menus_on_fetches_every_hall() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/menuSamp.asp")
                    .query_param("dtdate", "10/01/2019");
                then.status(200).body("<html></html>");
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let pages = fetcher.menus_on(ymd(2019, 10, 1)).await.unwrap();
        mock.assert_hits_async(DiningHall::ALL.len()).await;
        let halls: Vec<_> = pages.iter().map(|(hall, _)| *hall).collect();
        assert_eq!(halls, DiningHall::ALL);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/menuSamp.asp");
                then.status(200)
                    .body("late")
                    .delay(Duration::from_secs(5));
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            child.cancel();
        });
        let start = std::time::Instant::now();
        let err = fetcher
            .fetch_until(&DiningHall::CARSON_OAKES.on(ymd(2019, 4, 1)), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_deadline() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/menuSamp.asp");
                then.status(200)
                    .body("late")
                    .delay(Duration::from_secs(5));
            })
            .await;
        let fetcher = mock_fetcher(&server, FetchConfig::default());
        let deadline = Duration::from_millis(100);
        let err = fetcher
            .fetch_within(&DiningHall::CARSON_OAKES.on(ymd(2019, 4, 1)), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineElapsed(d) if d == deadline));
    }

    #[tokio::test]
    async fn test_client_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/menuSamp.asp");
                then.status(200)
                    .body("late")
                    .delay(Duration::from_secs(5));
            })
            .await;
        let fetcher = mock_fetcher(
            &server,
            FetchConfig::default().timeout(Some(Duration::from_millis(100))),
        );
        match fetcher.menu(DiningHall::CARSON_OAKES, ymd(2019, 4, 1)).await {
            Err(Error::Request(e)) => assert!(e.is_timeout()),
            res => panic!("expected a timeout, got {res:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_keeps_cause() {
        setup_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let config = FetchConfig::default()
            .endpoint(&format!("http://{addr}/menuSamp.asp"))
            .unwrap();
        let fetcher = Fetcher::with_config(config).unwrap();
        let err = fetcher
            .menu(DiningHall::PORTER_KRESGE, ymd(2018, 1, 5))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        let cause = err
            .source()
            .and_then(|e| e.downcast_ref::<reqwest::Error>())
            .expect("cause should be the reqwest error");
        assert!(cause.is_connect());
    }

    #[tokio::test]
    async fn test_connection_closed_mid_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut socket = accept_request(&listener).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n<html>Porter")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        let config = FetchConfig::default()
            .endpoint(&format!("http://{addr}/menuSamp.asp"))
            .unwrap();
        let fetcher = Fetcher::with_config(config).unwrap();
        let res = fetcher
            .menu(DiningHall::PORTER_KRESGE, ymd(2018, 1, 5))
            .await;
        server.await.unwrap();
        assert!(matches!(res, Err(Error::Request(_))));
    }

    #[tokio::test]
    async fn test_connection_released_after_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut socket = accept_request(&listener).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 15\r\n\r\n<html>PK</html>")
                .await
                .unwrap();
            let mut buf = [0u8; 64];
            tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await
        });
        let config = FetchConfig::default()
            .endpoint(&format!("http://{addr}/menuSamp.asp"))
            .unwrap()
            .keep_alive(false);
        let fetcher = Fetcher::with_config(config).unwrap();
        let page = fetcher
            .menu(DiningHall::PORTER_KRESGE, ymd(2018, 1, 5))
            .await
            .unwrap();
        assert_eq!(page.as_bytes(), b"<html>PK</html>");
        let read = server.await.unwrap();
        assert!(
            matches!(read, Ok(Ok(0))),
            "client should have closed the connection, got {read:?}"
        );
    }

    #[tokio::test]
    async fn test_connection_released_after_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut socket = accept_request(&listener).await;
            let mut buf = [0u8; 64];
            tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await
        });
        let config = FetchConfig::default()
            .endpoint(&format!("http://{addr}/menuSamp.asp"))
            .unwrap();
        let fetcher = Fetcher::with_config(config).unwrap();
        let res = fetcher
            .fetch_within(
                &DiningHall::PORTER_KRESGE.on(ymd(2018, 1, 5)),
                Duration::from_millis(100),
            )
            .await;
        assert!(matches!(res, Err(Error::DeadlineElapsed(_))));
        let read = server.await.unwrap();
        assert!(
            matches!(read, Ok(Ok(0))),
            "client should have closed the connection, got {read:?}"
        );
    }
}
