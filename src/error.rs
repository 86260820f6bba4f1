//! Error types and their stable numeric codes

use thiserror::Error;

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure raised by the connector.
///
/// The numeric codes returned by [`Error::code`] are stable: monitoring set up against
/// earlier clients of the same API keys on them.
#[derive(Debug, Error)]
pub enum Error {
    /// No secret key was supplied
    #[error("You did not specify a secret key.")]
    MissingSecret,

    /// No host name was supplied, or it normalized to nothing
    #[error("You did not specify a host name.")]
    MissingHost,

    /// Strict option parsing met a key it does not know
    #[error("Unknown connection option ‘{0}’")]
    UnknownOption(String),

    /// A URL could not be parsed
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// The transport failed to complete the HTTP exchange
    #[error(
        "Network error {code} with message “{message}”. Please check the host name and the status of your network connectivity."
    )]
    CommunicationError {
        /// HTTP status or library error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Nothing resembling an API response could be extracted from the body
    #[error("Invalid JSON data returned from the server: ‘{0}’.")]
    InvalidEncapsulatedJSON(String),

    /// The v1 envelope was fine but its body did not decode
    #[error(
        "Invalid response body. Something between the web server and this client is corrupting the response."
    )]
    InvalidJSONBody,

    /// The remote API reported a failure
    #[error("The remote JSON API on your server reports an error with message ‘{status} - {message}’")]
    RemoteError {
        /// Status reported in the API response body
        status: i64,
        /// Message reported by the server
        message: String,
    },

    /// The server does not know the API method (status 405)
    #[error(
        "Server responded it does not know of API method {0}. Is your installation broken or your Akeeba Backup / Solo version too old?"
    )]
    UnknownMethod(String),

    /// The server no longer implements the API method (status 501)
    #[error("The method {0} is no longer implemented by the Akeeba Remote JSON API on your server.")]
    NotImplemented(String),

    /// The secret key was rejected (status 503)
    #[error(
        "Authentication error (invalid Secret Word). Please check the secret word, make sure it doesn't have any whitespace you missed. Clear any site or external caches, making sure Akeeba Backup's URL isn't cached."
    )]
    InvalidSecretWord,

    /// The server speaks an API level below the configured minimum
    #[error(
        "You need to install a newer version of Akeeba Backup / Akeeba Solo on your site (API level {found}, need {required})"
    )]
    RemoteApiVersionTooLow {
        /// API level reported by the server
        found: i64,
        /// Minimum API level accepted
        required: i64,
    },

    /// Autodetection exhausted every combination
    #[error(
        "We cannot find a way to connect to your server. It seems that your server is incompatible with this client."
    )]
    NoWayToConnect {
        /// The failure observed on the last attempt
        #[source]
        last: Option<Box<Error>>,
    },

    /// A backup ID is required
    #[error("You must specify a numeric backup ID")]
    NoBackupID,

    /// A profile ID is required
    #[error("You must specify a numeric profile ID")]
    NoProfileID,

    /// Profile data to import is required
    #[error("You must supply the profile data that should be imported")]
    NoProfileData,

    /// The backup record does not exist
    #[error("The specified backup record does not exist")]
    NoSuchBackupRecord,

    /// The requested archive part is not part of the backup record
    #[error("The part number you specified does not exist in this backup record.")]
    NoSuchPart,

    /// The backup record has no archive files on the server
    #[error(
        "The archive file(s) for backup record #{0} are not available on the remote server. Please check if this is an obsolete backup record; or if the files have been sent to a different location and removed from the server; or if the backup was taken with an archiver engine which does not generate backup archives, such as DirectFTP."
    )]
    NoFilesInBackupRecord(i64),

    /// The archive files of a backup record could not be deleted
    #[error(
        "Cannot delete backup archive files for backup record {0}. Please check if the files have not been already deleted either manually or automatically, e.g. after uploading to a remote location; or whether the backup was taken with an archiver engine which does not generate backup archives, such as DirectFTP."
    )]
    CannotDeleteFiles(i64),

    /// A backup record could not be deleted
    #[error("Cannot delete backup record {0}.")]
    CannotDeleteRecord(i64),

    /// Listing backup records failed
    #[error("Could not list backup records")]
    CannotListBackupRecords,

    /// Listing backup profiles failed
    #[error("Cannot list backup profiles.")]
    CannotListProfiles,

    /// A local file could not be opened for writing
    #[error("Cannot open file ‘{0}’ for writing.")]
    CannotWriteFile(String),

    /// Downloading an archive part failed
    #[error("{message}")]
    CannotDownloadFile {
        /// What went wrong, including the file involved
        message: String,
        /// Underlying failure, if any
        #[source]
        source: Option<Box<Error>>,
    },

    /// The download mode is not one of http, chunk or url
    #[error("You must specify a download mode (http, url or chunk).")]
    NoDownloadMode,

    /// The download directory is missing or not a directory
    #[error("You must specify a path to download the files to.")]
    NoDownloadPath,

    /// URL mode requires a download URL
    #[error("You must provide a download URL for use with the url download mode")]
    NoDownloadURL,

    /// Update information could not be retrieved
    #[error("Cannot retrieve update information.")]
    CannotGetUpdateInformation,

    /// There is nothing to update
    #[error("There are no available updates to your Akeeba Backup / Akeeba Solo installation.")]
    NoUpdates,

    /// The server cannot run the update system
    #[error("Your server does not support the update system.")]
    LiveUpdateSupport,

    /// The update system is stuck fetching update information
    #[error("The update system reports that it's stuck trying to load update information.{0}")]
    LiveUpdateStuck(String),

    /// The offered update is less stable than the accepted minimum
    #[error(
        "The available update is less stable than the minimum stability you have chosen for updates. As a result the update will not proceed."
    )]
    LiveUpdateStability,

    /// The server failed to download the update package
    #[error("Update download failed with error ‘{0}’")]
    LiveUpdateDownloadError(String),

    /// The server failed to extract the update package
    #[error("Update package failed to extract with error ‘{0}’")]
    LiveUpdateExtractError(String),

    /// The server failed to install the update package
    #[error("Update package failed to install with error ‘{0}’")]
    LiveUpdateInstallError(String),

    /// The server failed to clean up after the update
    #[error("Update failed to clean up with error ‘{0}’")]
    LiveUpdateCleanupError(String),
}

impl Error {
    /// Stable numeric code of this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::MissingSecret => 37,
            Error::MissingHost => 35,
            Error::UnknownOption(_) => 0,
            Error::MalformedUrl(_) => 0,
            Error::CommunicationError { .. } => 22,
            Error::InvalidEncapsulatedJSON(_) => 23,
            Error::InvalidJSONBody => 21,
            Error::RemoteError { .. } => 101,
            Error::UnknownMethod(_) => 127,
            Error::NotImplemented(_) => 44,
            Error::InvalidSecretWord => 42,
            Error::RemoteApiVersionTooLow { .. } => 102,
            Error::NoWayToConnect { .. } => 36,
            Error::NoBackupID => 31,
            Error::NoProfileID => 39,
            Error::NoProfileData => 40,
            Error::NoSuchBackupRecord => 110,
            Error::NoSuchPart => 43,
            Error::NoFilesInBackupRecord(_) => 103,
            Error::CannotDeleteFiles(_) => 106,
            Error::CannotDeleteRecord(_) => 107,
            Error::CannotListBackupRecords => 108,
            Error::CannotListProfiles => 109,
            Error::CannotWriteFile(_) => 104,
            Error::CannotDownloadFile { .. } => 105,
            Error::NoDownloadMode => 32,
            Error::NoDownloadPath => 33,
            Error::NoDownloadURL => 34,
            Error::CannotGetUpdateInformation => 111,
            Error::NoUpdates => 1,
            Error::LiveUpdateSupport => 112,
            Error::LiveUpdateStuck(_) => 113,
            Error::LiveUpdateStability => 114,
            Error::LiveUpdateDownloadError(_) => 115,
            Error::LiveUpdateExtractError(_) => 116,
            Error::LiveUpdateInstallError(_) => 117,
            Error::LiveUpdateCleanupError(_) => 118,
        }
    }

    /// Whether this error comes from bad local configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingSecret
                | Error::MissingHost
                | Error::UnknownOption(_)
                | Error::MalformedUrl(_)
        )
    }

    /// Whether the remote server itself reported this failure.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::RemoteError { .. }
                | Error::UnknownMethod(_)
                | Error::NotImplemented(_)
                | Error::InvalidSecretWord
                | Error::RemoteApiVersionTooLow { .. }
        )
    }

    /// Whether the response could not be decoded.
    pub fn is_decoding(&self) -> bool {
        matches!(self, Error::InvalidEncapsulatedJSON(_) | Error::InvalidJSONBody)
    }

    pub(crate) fn communication(code: i64, message: impl Into<String>) -> Self {
        Error::CommunicationError {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn download(message: impl Into<String>, source: Option<Error>) -> Self {
        Error::CannotDownloadFile {
            message: message.into(),
            source: source.map(Box::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::communication(404, "Not Found").code(), 22);
        assert_eq!(Error::InvalidSecretWord.code(), 42);
        assert_eq!(Error::NotImplemented("getVersion".into()).code(), 44);
        assert_eq!(Error::NoWayToConnect { last: None }.code(), 36);
        assert_eq!(Error::LiveUpdateCleanupError(String::new()).code(), 118);
    }

    #[test]
    fn test_wrapped_errors_expose_source() {
        let error = Error::NoWayToConnect {
            last: Some(Box::new(Error::InvalidJSONBody)),
        };
        let source = error.source().expect("source");
        assert!(source.to_string().contains("Invalid response body"));

        let error = Error::download("Could not download file ‘a.jpa’", None);
        assert!(error.source().is_none());
    }

    #[test]
    fn test_classification() {
        assert!(Error::MissingHost.is_configuration());
        assert!(Error::InvalidSecretWord.is_remote());
        assert!(Error::InvalidJSONBody.is_decoding());
        assert!(!Error::communication(-1, "boom").is_remote());
    }

    #[test]
    fn test_communication_message() {
        let error = Error::communication(500, "Internal Server Error");
        assert_eq!(
            error.to_string(),
            "Network error 500 with message “Internal Server Error”. Please check the host name and the status of your network connectivity."
        );
    }
}
