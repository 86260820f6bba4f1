//! Transport built on reqwest

use crate::backend::types::{BackendRequest, ByteRange};
use crate::backend::{BackendConfig, Transport};
use crate::options::ConnectionOptions;
use crate::{Error, Result};
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Reqwest-backed transport
#[derive(Clone, Debug)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl ReqwestBackend {
    /// Create a transport with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(BackendConfig::default())
    }

    /// Create a transport for the given connection options
    pub fn from_options(options: &ConnectionOptions) -> Result<Self> {
        Self::with_config(BackendConfig::from_options(options))
    }

    /// Create a transport with configuration
    pub fn with_config(config: BackendConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Get the underlying reqwest client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Current configuration
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn send(&self, request: BackendRequest) -> Result<reqwest::Response> {
        tracing::debug!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            if let Some(content_type) = body.content_type() {
                builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
            }
            builder = builder.body(body.encode());
        }

        let response = builder.send().await.map_err(|e| {
            let code = e.status().map(|s| i64::from(s.as_u16())).unwrap_or(-1);
            Error::communication(code, format!("Request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::communication(
                i64::from(status.as_u16()),
                status.canonical_reason().unwrap_or("Unexpected HTTP status"),
            ));
        }

        Ok(response)
    }
}

impl Transport for ReqwestBackend {
    fn configure(&mut self, options: &ConnectionOptions) -> Result<()> {
        let config = self.config.clone().apply_options(options);
        self.client = build_client(&config)?;
        self.config = config;
        Ok(())
    }

    async fn send_request(&self, request: BackendRequest) -> Result<String> {
        let response = self.send(request).await?;

        response
            .text()
            .await
            .map_err(|e| Error::communication(-1, format!("Failed to read response: {}", e)))
    }

    async fn download_range<W>(
        &self,
        mut request: BackendRequest,
        sink: &mut W,
        range: ByteRange,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        if let Some(value) = range.header_value() {
            let value = reqwest::header::HeaderValue::from_str(&value)
                .map_err(|e| Error::communication(-1, format!("Invalid range: {}", e)))?;
            request.headers.insert(reqwest::header::RANGE, value);
        }

        let response = self.send(request).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| Error::communication(-1, format!("Stream error: {}", e)))?;

            sink.write_all(&chunk)
                .await
                .map_err(|e| Error::CannotWriteFile(e.to_string()))?;
            written += chunk.len() as u64;
        }

        sink.flush()
            .await
            .map_err(|e| Error::CannotWriteFile(e.to_string()))?;

        Ok(written)
    }
}

fn build_client(config: &BackendConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.timeout())
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects()));

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent);
    }

    if let Some(ca_path) = &config.ca_path {
        let pem = std::fs::read(ca_path).map_err(|e| {
            Error::communication(-1, format!("Cannot read CA bundle {}: {}", ca_path.display(), e))
        })?;
        let certificates = reqwest::Certificate::from_pem_bundle(&pem)
            .map_err(|e| Error::communication(-1, format!("Invalid CA bundle: {}", e)))?;

        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }
    }

    if let Some(proxy_config) = &config.proxy {
        let mut proxy = reqwest::Proxy::all(proxy_config.url())
            .map_err(|e| Error::communication(-1, format!("Invalid proxy: {}", e)))?;

        if let (Some(username), Some(password)) = (&proxy_config.username, &proxy_config.password) {
            proxy = proxy.basic_auth(username, password);
        }

        if let Some(no_proxy) = &proxy_config.no_proxy {
            proxy = proxy.no_proxy(reqwest::NoProxy::from_string(no_proxy));
        }

        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| Error::communication(-1, format!("Failed to create reqwest client: {}", e)))
}
