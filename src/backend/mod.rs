//! Transport abstraction
//!
//! The connector never talks HTTP itself. It hands a [`BackendRequest`] to a
//! [`Transport`] and gets back the raw response text, or has a byte range streamed into
//! a sink.

pub mod types;

#[cfg(feature = "backend-reqwest")]
pub mod reqwest;

use crate::Result;
use crate::options::ConnectionOptions;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWrite;
use types::{BackendRequest, ByteRange};

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default total request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default redirect limit
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Something able to perform HTTP exchanges for the connector.
///
/// Failures of the exchange itself, including non-2xx HTTP statuses, are reported as
/// [`Error::CommunicationError`](crate::Error::CommunicationError).
pub trait Transport: Send + Sync {
    /// Apply new connection options, e.g. a different CA bundle.
    fn configure(&mut self, options: &ConnectionOptions) -> Result<()> {
        let _ = options;
        Ok(())
    }

    /// Perform a request and return the response body as text
    fn send_request(&self, request: BackendRequest) -> impl Future<Output = Result<String>> + Send;

    /// Stream the response body of a GET request into `sink`, returning the number of
    /// bytes written. A full [`ByteRange`] downloads the whole resource.
    fn download_range<W>(
        &self,
        request: BackendRequest,
        sink: &mut W,
        range: ByteRange,
    ) -> impl Future<Output = Result<u64>> + Send
    where
        W: AsyncWrite + Unpin + Send + ?Sized;
}

/// Proxy settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Optional username
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
    /// Comma-separated hosts that bypass the proxy
    pub no_proxy: Option<String>,
}

impl ProxyConfig {
    /// Proxy without credentials
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            no_proxy: None,
        }
    }

    /// Add credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Hosts that bypass the proxy
    pub fn with_no_proxy(mut self, no_proxy: impl Into<String>) -> Self {
        self.no_proxy = Some(no_proxy.into());
        self
    }

    /// Proxy URL
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Configuration for transport creation
#[derive(Clone, Debug, Default)]
pub struct BackendConfig {
    /// Connection timeout
    pub connect_timeout: Option<Duration>,
    /// Total request timeout
    pub timeout: Option<Duration>,
    /// Redirects to follow
    pub max_redirects: Option<usize>,
    /// User agent string
    pub user_agent: Option<String>,
    /// PEM bundle of trusted root certificates
    pub ca_path: Option<PathBuf>,
    /// Proxy configuration
    pub proxy: Option<ProxyConfig>,
}

impl BackendConfig {
    /// Configuration matching connection options
    pub fn from_options(options: &ConnectionOptions) -> Self {
        Self::default().apply_options(options)
    }

    /// Take the user agent and CA bundle from connection options, keeping the rest
    pub fn apply_options(mut self, options: &ConnectionOptions) -> Self {
        self.user_agent = Some(options.user_agent().to_string()).filter(|ua| !ua.is_empty());
        self.ca_path = Some(PathBuf::from(options.ca_path())).filter(|p| !p.as_os_str().is_empty());
        self
    }

    /// Set the proxy
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Effective connection timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Effective total timeout
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Effective redirect limit
    pub fn max_redirects(&self) -> usize {
        self.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS)
    }
}
