//! Scripted transport shared by the integration tests

#![allow(dead_code)]

use akeeba_backup_api::{
    BackendRequest, Body, ByteRange, ConnectionOptions, Connector, Error, Result, Transport,
};
use serde_json::{Value, json};
use std::sync::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const SECRET: &str = "s3cr3t";

/// What the fake server answers
pub enum Reply {
    /// Response body
    Text(String),
    /// Raw bytes, for downloads
    Bytes(Vec<u8>),
    /// Transport level failure
    Fail(i64, &'static str),
}

/// A request as the fake server saw it
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: http::Method,
    pub url: url::Url,
    pub params: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    pub range: Option<ByteRange>,
}

impl Seen {
    fn new(request: &BackendRequest, range: Option<ByteRange>) -> Self {
        let mut params: Vec<(String, String)> = request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if let Some(Body::Form { fields }) = &request.body {
            params.extend(fields.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        }

        let header = |name: http::HeaderName| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            params,
            authorization: header(http::header::AUTHORIZATION),
            user_agent: header(http::header::USER_AGENT),
            range,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The v1 envelope body, if this is a v1 call
    pub fn envelope(&self) -> Option<Value> {
        let outer: Value = serde_json::from_str(self.param("json")?).ok()?;
        serde_json::from_str(outer.get("body")?.as_str()?).ok()
    }

    /// API method name for either protocol version
    pub fn api_method(&self) -> Option<String> {
        if let Some(method) = self.param("method") {
            return Some(method.to_string());
        }

        self.envelope()?
            .get("method")?
            .as_str()
            .map(str::to_string)
    }

    pub fn path_ends_with(&self, suffix: &str) -> bool {
        self.url.path().ends_with(suffix)
    }
}

type Handler = Box<dyn Fn(&Seen) -> Reply + Send + Sync>;

/// Transport answering from a closure and remembering every request
pub struct FakeTransport {
    handler: Handler,
    seen: Mutex<Vec<Seen>>,
}

impl FakeTransport {
    pub fn new(handler: impl Fn(&Seen) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn answer(&self, seen: Seen) -> Reply {
        let reply = (self.handler)(&seen);
        self.seen.lock().unwrap().push(seen);
        reply
    }
}

impl Transport for FakeTransport {
    async fn send_request(&self, request: BackendRequest) -> Result<String> {
        match self.answer(Seen::new(&request, None)) {
            Reply::Text(text) => Ok(text),
            Reply::Bytes(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Reply::Fail(code, message) => Err(Error::CommunicationError {
                code,
                message: message.to_string(),
            }),
        }
    }

    async fn download_range<W>(
        &self,
        request: BackendRequest,
        sink: &mut W,
        range: ByteRange,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let bytes = match self.answer(Seen::new(&request, Some(range))) {
            Reply::Text(text) => text.into_bytes(),
            Reply::Bytes(bytes) => bytes,
            Reply::Fail(code, message) => {
                return Err(Error::CommunicationError {
                    code,
                    message: message.to_string(),
                });
            }
        };

        sink.write_all(&bytes)
            .await
            .map_err(|e| Error::CannotWriteFile(e.to_string()))?;
        sink.flush()
            .await
            .map_err(|e| Error::CannotWriteFile(e.to_string()))?;

        Ok(bytes.len() as u64)
    }
}

/// v2 response text
pub fn v2(status: i64, data: Value) -> Reply {
    Reply::Text(json!({ "status": status, "data": data }).to_string())
}

/// v1 response text, with the data double-encoded inside the envelope
pub fn v1(status: i64, data: Value) -> Reply {
    Reply::Text(
        json!({
            "encapsulation": 1,
            "body": { "status": status, "data": data.to_string() },
        })
        .to_string(),
    )
}

/// Options for a v2 connection over POST to index.php
pub fn api_options() -> ConnectionOptions {
    ConnectionOptions::builder()
        .host("https://www.example.com")
        .secret(SECRET)
        .verb(Some(akeeba_backup_api::Verb::Post))
        .view(Some(akeeba_backup_api::View::Api))
        .component("com_akeebabackup")
        .format("json")
        .build()
        .unwrap()
}

pub fn connector(
    options: ConnectionOptions,
    handler: impl Fn(&Seen) -> Reply + Send + Sync + 'static,
) -> Connector<FakeTransport> {
    Connector::new(options, FakeTransport::new(handler)).unwrap()
}
