//! Updating the remote installation

use super::Connector;
use super::backup::truthy;
use crate::backend::Transport;
use crate::{Error, Result};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Release stability, ordered from least to most stable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stability {
    /// Alpha release
    Alpha,
    /// Beta release
    Beta,
    /// Release candidate
    Rc,
    /// Stable release
    Stable,
}

impl Stability {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Alpha => "alpha",
            Stability::Beta => "beta",
            Stability::Rc => "rc",
            Stability::Stable => "stable",
        }
    }
}

impl FromStr for Stability {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alpha" => Ok(Stability::Alpha),
            "beta" => Ok(Stability::Beta),
            "rc" => Ok(Stability::Rc),
            "stable" => Ok(Stability::Stable),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Update status reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInformation {
    /// The server can run the update system
    pub supported: bool,
    /// The update system is stuck fetching update information
    pub stuck: bool,
    /// An update is available
    pub has_updates: bool,
    /// Offered version
    pub version: String,
    /// Stability of the offered version; `None` if the server sent an unknown value
    pub stability: Option<Stability>,
    /// The full payload
    pub raw: Value,
}

impl UpdateInformation {
    /// Read the data of an `updateGetInformation` response
    pub fn from_data(data: Value) -> Self {
        let text = |key: &str| match data.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        Self {
            supported: truthy(data.get("supported")),
            stuck: truthy(data.get("stuck")),
            has_updates: truthy(data.get("hasUpdates")),
            version: text("version"),
            stability: text("stability").parse().ok(),
            raw: data,
        }
    }

    /// Fail with [`Error::LiveUpdateStability`] if the offered release is less stable
    /// than `minimum`. A release of unknown stability counts as an alpha.
    pub fn check_stability(&self, minimum: Stability) -> Result<()> {
        if self.stability.unwrap_or(Stability::Alpha) < minimum {
            return Err(Error::LiveUpdateStability);
        }

        Ok(())
    }
}

impl<T: Transport> Connector<T> {
    /// Check for an available update.
    ///
    /// `force` makes the server reload the update information instead of using its cache.
    pub async fn get_update_information(&self, force: bool) -> Result<UpdateInformation> {
        let response = self
            .do_query("updateGetInformation", json!({ "force": force }))
            .await?;

        if !response.is_success() {
            return Err(Error::CannotGetUpdateInformation);
        }

        let info = UpdateInformation::from_data(response.into_data());

        if !info.supported {
            return Err(Error::LiveUpdateSupport);
        }

        if info.stuck {
            let hint = if force {
                String::new()
            } else {
                " Try using the command line parameter --force=1".to_string()
            };

            return Err(Error::LiveUpdateStuck(hint));
        }

        if !info.has_updates {
            return Err(Error::NoUpdates);
        }

        Ok(info)
    }

    /// Have the server download the update package
    pub async fn download_update(&self) -> Result<()> {
        self.update_step("updateDownload", Error::LiveUpdateDownloadError)
            .await
    }

    /// Have the server extract the update package
    pub async fn extract_update(&self) -> Result<()> {
        self.update_step("updateExtract", Error::LiveUpdateExtractError)
            .await
    }

    /// Have the server install the extracted update
    pub async fn install_update(&self) -> Result<()> {
        self.update_step("updateInstall", Error::LiveUpdateInstallError)
            .await
    }

    /// Have the server remove the update's temporary files
    pub async fn cleanup_update(&self) -> Result<()> {
        self.update_step("updateCleanup", Error::LiveUpdateCleanupError)
            .await
    }

    async fn update_step(&self, method: &str, error: fn(String) -> Error) -> Result<()> {
        let response = self.do_query(method, Value::Null).await?;

        if !response.is_success() {
            return Err(error(response.message()));
        }

        Ok(())
    }
}
