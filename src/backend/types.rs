//! Types shared by transport implementations

use crate::body::Body;
use http::{HeaderMap, HeaderValue, Method, header};
use url::Url;

/// Transport-agnostic HTTP request
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// HTTP method for the request
    pub method: Method,
    /// URL for the request
    pub url: Url,
    /// Headers for the request
    pub headers: HeaderMap,
    /// Optional body content
    pub body: Option<Body>,
}

impl BackendRequest {
    /// Create a request without headers or body
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request with a body
    pub fn post(url: Url, body: Body) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    /// Set the body
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the `User-Agent` header; invalid values are skipped
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            self.headers.insert(header::USER_AGENT, value);
        }
        self
    }

    /// Set the `Authorization` header; invalid values are skipped
    pub fn with_authorization(mut self, value: &str) -> Self {
        if let Ok(mut value) = HeaderValue::from_str(value) {
            value.set_sensitive(true);
            self.headers.insert(header::AUTHORIZATION, value);
        }
        self
    }
}

/// Inclusive byte range of a partial download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    /// First byte
    pub from: u64,
    /// Last byte
    pub to: u64,
}

impl ByteRange {
    /// Range covering `from..=to`; reversed bounds are swapped
    pub fn new(from: u64, to: u64) -> Self {
        if from > to {
            Self { from: to, to: from }
        } else {
            Self { from, to }
        }
    }

    /// Whether this means "the whole resource"
    pub fn is_full(&self) -> bool {
        self.from == 0 && self.to == 0
    }

    /// `Range` header value, `None` for the whole resource
    pub fn header_value(&self) -> Option<String> {
        (!self.is_full()).then(|| format!("bytes={}-{}", self.from, self.to))
    }
}
