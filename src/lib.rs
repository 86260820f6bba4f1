//! Client for the Akeeba Backup JSON API
//!
//! Talks to Akeeba Backup for Joomla!, Akeeba Backup for WordPress and Akeeba Solo over
//! both the legacy v1 (`view=json`) and the current v2 (`view=api`) protocols. Responses
//! wrapped in PHP notices or other junk are recovered, and [`Connector::autodetect`]
//! finds a working combination of entry point, verb, view, format and component when
//! the caller does not know it.
//!
//! All operations are async and run on tokio. The default transport is reqwest; any
//! [`Transport`] implementation can be plugged in instead.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub use backend::types::{BackendRequest, ByteRange};
pub use backend::{BackendConfig, ProxyConfig, Transport};
pub use body::Body;
pub use client::autodetect::Candidate;
pub use client::download::{ArchivePart, ArchiveParts, DownloadOptionsBuilder};
pub use client::{
    BackupOptions, BackupResult, Connector, DownloadMode, DownloadOptions, Stability,
    UpdateInformation,
};
pub use error::{Error, Result};
pub use options::{
    ConnectionOptions, ConnectionOptionsBuilder, MINIMUM_API_LEVEL, OptionOverrides, RawOptions,
    Verb, View,
};
pub use response::{ApiBody, ApiResponse};
pub use uri::{Uri, UriPart};

#[cfg(feature = "backend-reqwest")]
pub use backend::reqwest::ReqwestBackend;
#[cfg(feature = "backend-reqwest")]
pub use client::ConnectorBuilder;

pub mod auth;
pub mod backend;
mod body;
pub mod client;
mod error;
pub mod options;
mod request;
pub mod response;
pub mod uri;
