//! Backup lifecycle: information, taking backups, listing and deleting records

use super::Connector;
use crate::backend::Transport;
use crate::response::ApiResponse;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Largest page of backup records the server hands out
pub const MAX_BACKUPS_PER_PAGE: u32 = 200;

/// What to back up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupOptions {
    /// Backup profile ID
    pub profile: i64,
    /// Backup description
    pub description: String,
    /// Backup comment
    pub comment: String,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            profile: 1,
            description: "Remote backup".to_string(),
            comment: String::new(),
        }
    }
}

impl BackupOptions {
    /// Backup with the given profile and default description
    pub fn with_profile(profile: i64) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }
}

/// Outcome of a finished backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupResult {
    /// Backup record ID
    pub id: i64,
    /// Archive file name
    pub archive: String,
}

/// IDs and names collected while a backup runs
#[derive(Debug, Default)]
struct BackupProgress {
    backup_id: Option<String>,
    record_id: i64,
    archive: String,
}

impl BackupProgress {
    /// Check a start or step response and remember what it tells us
    fn update(&mut self, response: &ApiResponse) -> Result<()> {
        if !response.is_success() {
            return Err(response.remote_error());
        }

        let data = response.data();

        if let Some(record_id) = data.get("BackupID").and_then(integer) {
            if record_id != 0 {
                tracing::debug!("Got backup record ID: {}", record_id);
                self.record_id = record_id;
            }
        }

        if let Some(backup_id) = data.get("backupid").and_then(text) {
            if !backup_id.is_empty() {
                tracing::debug!("Got backupID: {}", backup_id);
                self.backup_id = Some(backup_id);
            }
        }

        if let Some(archive) = data.get("Archive").and_then(text) {
            if !archive.is_empty() {
                tracing::debug!("Got archive name: {}", archive);
                self.archive = archive;
            }
        }

        Ok(())
    }
}

impl<T: Transport> Connector<T> {
    /// Version and API level of the remote installation
    pub async fn information(&self) -> Result<ApiResponse> {
        self.do_query("getVersion", Value::Null).await
    }

    /// Take a backup, stepping it until the server reports it has finished.
    ///
    /// `progress` receives the data of every start and step response, including the
    /// last one.
    pub async fn backup<F>(&self, options: &BackupOptions, mut progress: F) -> Result<BackupResult>
    where
        F: FnMut(&Value) + Send,
    {
        let description = if options.description.is_empty() {
            "Remote backup"
        } else {
            options.description.as_str()
        };

        let mut state = BackupProgress::default();
        let mut response = self
            .do_query(
                "startBackup",
                json!({
                    "profile": options.profile,
                    "description": description,
                    "comment": options.comment,
                }),
            )
            .await?;
        state.update(&response)?;

        while truthy(response.data().get("HasRun")) {
            progress(response.data());

            let params = match &state.backup_id {
                Some(backup_id) => json!({ "backupid": backup_id }),
                None => Value::Null,
            };

            response = self.do_query("stepBackup", params).await?;
            state.update(&response)?;
        }

        progress(response.data());

        Ok(BackupResult {
            id: state.record_id,
            archive: state.archive,
        })
    }

    /// A page of backup records, newest first.
    ///
    /// `from` is clamped to zero or more and `limit` to `1..=200`.
    pub async fn get_backups(&self, from: i64, limit: i64) -> Result<Vec<Value>> {
        let from = from.max(0);
        let limit = limit.clamp(1, i64::from(MAX_BACKUPS_PER_PAGE));

        let response = self
            .do_query("listBackups", json!({ "from": from, "limit": limit }))
            .await?;

        if !response.is_success() {
            return Err(Error::CannotListBackupRecords);
        }

        match response.into_data() {
            Value::Array(records) => Ok(records),
            Value::Object(records) => Ok(records.into_iter().map(|(_, v)| v).collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// One backup record
    pub async fn get_backup(&self, id: i64) -> Result<Value> {
        let response = self
            .do_query("getBackupInfo", json!({ "backup_id": id }))
            .await?;

        if !response.is_success() {
            return Err(Error::NoSuchBackupRecord);
        }

        Ok(response.into_data())
    }

    /// Delete a backup record together with its files
    pub async fn delete(&self, id: i64) -> Result<()> {
        if id <= 0 {
            return Err(Error::NoBackupID);
        }

        let response = self.do_query("delete", json!({ "backup_id": id })).await?;

        match response.status() {
            200 => Ok(()),
            404 => Err(Error::NoSuchBackupRecord),
            _ => Err(Error::CannotDeleteRecord(id)),
        }
    }

    /// Delete the archive files of a backup record, keeping the record
    pub async fn delete_files(&self, id: i64) -> Result<()> {
        if id <= 0 {
            return Err(Error::NoBackupID);
        }

        let response = self
            .do_query("deleteFiles", json!({ "backup_id": id }))
            .await?;

        match response.status() {
            200 => Ok(()),
            404 => Err(Error::NoSuchBackupRecord),
            status => {
                tracing::debug!(
                    "deleteFiles failed with status {}: {}",
                    status,
                    response.message()
                );
                Err(Error::CannotDeleteFiles(id))
            }
        }
    }
}

/// Loose truthiness of a JSON value: false, 0, "", "0", null and empty containers are false
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !(s.is_empty() || s == "0"),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

pub(crate) fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
