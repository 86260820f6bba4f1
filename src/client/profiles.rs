//! Backup profiles

use super::Connector;
use crate::backend::Transport;
use crate::{Error, Result};
use serde_json::{Value, json};

impl<T: Transport> Connector<T> {
    /// Every backup profile defined on the server
    pub async fn get_profiles(&self) -> Result<Vec<Value>> {
        let response = self.do_query("getProfiles", Value::Null).await?;

        if !response.is_success() {
            return Err(Error::CannotListProfiles);
        }

        match response.into_data() {
            Value::Array(profiles) => Ok(profiles),
            Value::Object(profiles) => Ok(profiles.into_iter().map(|(_, v)| v).collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Import a profile exported as JSON, creating a new profile
    pub async fn import_configuration(&self, json_data: &str) -> Result<Value> {
        if json_data.trim().is_empty() {
            return Err(Error::NoProfileData);
        }

        let data: Value = serde_json::from_str(json_data).map_err(|e| {
            tracing::debug!("Profile data is not valid JSON: {}", e);
            Error::NoProfileData
        })?;

        let response = self
            .do_query("importConfiguration", json!({ "profile": 0, "data": data }))
            .await?;

        if !response.is_success() {
            return Err(response.remote_error());
        }

        Ok(response.into_data())
    }

    /// Export a profile's configuration
    pub async fn export_configuration(&self, id: i64) -> Result<Value> {
        if id <= 0 {
            return Err(Error::NoProfileID);
        }

        let response = self
            .do_query("exportConfiguration", json!({ "profile": id }))
            .await?;

        if !response.is_success() {
            return Err(response.remote_error());
        }

        Ok(response.into_data())
    }
}
