//! The connector and its high-level operations

pub mod autodetect;
pub mod backup;
pub mod download;
pub mod profiles;
pub mod update;

pub use backup::{BackupOptions, BackupResult};
pub use download::{DownloadMode, DownloadOptions};
pub use update::{Stability, UpdateInformation};

use crate::backend::Transport;
use crate::backend::types::{BackendRequest, ByteRange};
use crate::body::Body;
use crate::options::{ConnectionOptions, OptionOverrides, Verb};
use crate::response::{self, ApiResponse};
use crate::{Error, Result, request};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::instrument::WithSubscriber;
use url::Url;

#[cfg(feature = "backend-reqwest")]
use crate::backend::{BackendConfig, ProxyConfig, reqwest::ReqwestBackend};
#[cfg(feature = "backend-reqwest")]
use std::time::Duration;

/// Client for the Akeeba Backup JSON API.
///
/// Holds one set of [`ConnectionOptions`] and the [`Transport`] used to reach the
/// server. Every operation is awaited to completion before the next one starts; the
/// connector never issues concurrent requests.
///
/// ```rust,no_run
/// use akeeba_backup_api::{ConnectionOptions, Connector};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let options = ConnectionOptions::builder()
///     .host("https://www.example.com")
///     .secret("s3cr3t")
///     .build()?;
///
/// let mut connector = Connector::builder(options).build()?;
/// connector.autodetect().await?;
///
/// let version = connector.information().await?;
/// println!("API level {}", version.data()["api"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Connector<T: Transport> {
    options: ConnectionOptions,
    transport: T,
}

impl<T: Transport> Connector<T> {
    /// Create a connector, configuring the transport for the options.
    pub fn new(options: ConnectionOptions, mut transport: T) -> Result<Self> {
        transport.configure(&options)?;
        Ok(Self { options, transport })
    }

    /// Active connection options
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// A copy of the active options with overrides applied
    pub fn modified_options(&self, overrides: OptionOverrides) -> Result<ConnectionOptions> {
        self.options.modified_clone(overrides)
    }

    /// Replace the active options.
    ///
    /// The transport is reconfigured and log events move to the new options' logger.
    pub fn set_options(&mut self, options: ConnectionOptions) -> Result<()> {
        self.transport.configure(&options)?;
        self.options = options;
        Ok(())
    }

    /// The transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// URL for an API call; `verb` defaults to the configured one
    pub fn make_url(&self, method: &str, data: &Value, verb: Option<Verb>) -> Result<String> {
        request::make_url(&self.options, method, data, verb)
    }

    /// Query string or form parameters for an API call
    pub fn query_parameters(&self, method: &str, data: &Value) -> Vec<(String, String)> {
        request::query_parameters(&self.options, method, data)
    }

    /// Call an API method and decode the response.
    ///
    /// Statuses 405, 501 and 503 fail with [`Error::UnknownMethod`],
    /// [`Error::NotImplemented`] and [`Error::InvalidSecretWord`]. Any other status is
    /// returned for the caller to interpret.
    pub async fn do_query(&self, method: &str, data: Value) -> Result<ApiResponse> {
        let call = query(&self.transport, &self.options, method, &data);
        self.scoped(call).await
    }

    /// Download a URL into a local file, returning the number of bytes written.
    ///
    /// With `from` and `to` both zero the whole resource replaces the file's contents;
    /// otherwise only that byte range is requested and appended to the file.
    pub async fn download_to_file(
        &self,
        url: &str,
        path: &Path,
        from: u64,
        to: u64,
    ) -> Result<u64> {
        let url = parse_url(url)?;
        let request = BackendRequest::get(url).with_user_agent(self.options.user_agent());
        let range = ByteRange::new(from, to);

        self.scoped(fetch_to_file(&self.transport, request, path, range)).await
    }

    /// Run a future with this connection's logger as the default subscriber
    pub(crate) async fn scoped<F: Future>(&self, future: F) -> F::Output {
        match self.options.logger() {
            Some(dispatch) => future.with_subscriber(dispatch.clone()).await,
            None => future.await,
        }
    }
}

#[cfg(feature = "backend-reqwest")]
impl Connector<ReqwestBackend> {
    /// Builder for a connector using the reqwest transport
    pub fn builder(options: ConnectionOptions) -> ConnectorBuilder {
        ConnectorBuilder::new(options)
    }
}

/// Builder for a reqwest-backed [`Connector`]
#[cfg(feature = "backend-reqwest")]
#[derive(Debug, Clone)]
pub struct ConnectorBuilder {
    options: ConnectionOptions,
    config: BackendConfig,
}

#[cfg(feature = "backend-reqwest")]
impl ConnectorBuilder {
    /// Create a builder for the given options
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            options,
            config: BackendConfig::default(),
        }
    }

    /// Set the total request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set how many redirects to follow
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = Some(max_redirects);
        self
    }

    /// Send requests through a proxy
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Build the connector
    pub fn build(self) -> Result<Connector<ReqwestBackend>> {
        let transport = ReqwestBackend::with_config(self.config.apply_options(&self.options))?;
        Connector::new(self.options, transport)
    }
}

/// One API call with explicit options; autodetection attempts go through here too.
pub(crate) async fn query<T: Transport>(
    transport: &T,
    options: &ConnectionOptions,
    method: &str,
    data: &Value,
) -> Result<ApiResponse> {
    let verb = options.effective_verb();
    let url = parse_url(&request::make_url(options, method, data, Some(verb))?)?;

    let backend_request = match verb {
        Verb::Get => BackendRequest::get(url),
        Verb::Post => {
            let fields = request::query_parameters(options, method, data);
            BackendRequest::post(url, Body::form(fields))
        }
    }
    .with_user_agent(options.user_agent());

    if options.verbose() {
        tracing::debug!(">> {} {}", verb, backend_request.url);

        if let Some(body) = &backend_request.body {
            tracing::debug!(">> Body: {}", body.encode());
        }
    }

    let raw = transport.send_request(backend_request).await?;

    if options.verbose() {
        tracing::debug!("<< Response: {}", raw);
    }

    let response = response::decode(options.view(), &raw)?;

    if options.verbose() {
        tracing::debug!("Parsed response: {:?}", response);
    }

    match response.status() {
        200 => {}
        405 => return Err(Error::UnknownMethod(method.to_string())),
        501 => return Err(Error::NotImplemented(method.to_string())),
        503 => return Err(Error::InvalidSecretWord),
        status => tracing::info!("Error status {} received from the API.", status),
    }

    Ok(response)
}

/// Stream a request into a file; the handle is closed on every path out
pub(crate) async fn fetch_to_file<T: Transport>(
    transport: &T,
    request: BackendRequest,
    path: &Path,
    range: ByteRange,
) -> Result<u64> {
    let mut open = tokio::fs::OpenOptions::new();
    if range.is_full() {
        open.write(true).create(true).truncate(true);
    } else {
        open.append(true).create(true);
    }

    let mut file = open
        .open(path)
        .await
        .map_err(|_| Error::CannotWriteFile(path.display().to_string()))?;

    let written = transport.download_range(request, &mut file, range).await;
    let flushed = file.flush().await;
    drop(file);

    let written = written?;
    flushed.map_err(|e| Error::CannotWriteFile(format!("{}: {}", path.display(), e)))?;

    Ok(written)
}

pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::MalformedUrl(format!("{url}: {e}")))
}
