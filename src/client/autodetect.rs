//! Connection autodetection
//!
//! Tries every combination of component, view, verb, format and endpoint the options
//! leave open against the `getVersion` method, in a fixed order, and keeps the first
//! one that answers.

use super::{Connector, query};
use crate::backend::Transport;
use crate::options::{ConnectionOptions, OptionOverrides, Verb, View};
use crate::response::ApiResponse;
use crate::{Error, Result};
use serde_json::Value;

const COMPONENTS: [&str; 3] = ["com_akeebabackup", "com_akeeba", ""];
const VIEWS: [View; 2] = [View::Api, View::Json];
const VERBS: [Verb; 2] = [Verb::Post, Verb::Get];
const FORMATS: [&str; 2] = ["json", "raw"];
const ENDPOINTS: [&str; 3] = ["index.php", "remote.php", "wp-admin/admin-ajax.php"];

/// One combination tried during autodetection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Joomla! component
    pub component: String,
    /// API view
    pub view: View,
    /// HTTP verb
    pub verb: Verb,
    /// Joomla! format
    pub format: String,
    /// Entry point
    pub endpoint: String,
}

impl Candidate {
    fn overrides(&self) -> OptionOverrides {
        OptionOverrides {
            component: Some(self.component.clone()),
            view: Some(self.view.as_str().to_string()),
            verb: Some(self.verb.as_str().to_string()),
            format: Some(self.format.clone()),
            endpoint: Some(self.endpoint.clone()),
            ..Default::default()
        }
    }
}

/// Every combination left open by `options`, outermost loop first:
/// component, view, verb, format, endpoint.
pub fn candidates(options: &ConnectionOptions) -> Vec<Candidate> {
    let components: Vec<String> = match options.component() {
        "" => COMPONENTS.iter().map(|c| c.to_string()).collect(),
        fixed => vec![fixed.to_lowercase()],
    };

    let views: Vec<View> = match options.view() {
        Some(view) => vec![view],
        None => VIEWS.to_vec(),
    };

    let verbs: Vec<Verb> = match options.verb() {
        Some(verb) => vec![verb],
        None => VERBS.to_vec(),
    };

    let formats: Vec<String> = match options.format().to_lowercase().as_str() {
        fixed @ ("json" | "raw") => vec![fixed.to_string()],
        _ => FORMATS.iter().map(|f| f.to_string()).collect(),
    };

    let endpoints: Vec<String> = match options.endpoint() {
        "" => ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        fixed => vec![fixed.to_string()],
    };

    let mut all = Vec::with_capacity(
        components.len() * views.len() * verbs.len() * formats.len() * endpoints.len(),
    );

    for component in &components {
        for view in &views {
            for verb in &verbs {
                for format in &formats {
                    for endpoint in &endpoints {
                        all.push(Candidate {
                            component: component.clone(),
                            view: *view,
                            verb: *verb,
                            format: format.clone(),
                            endpoint: endpoint.clone(),
                        });
                    }
                }
            }
        }
    }

    all
}

impl<T: Transport> Connector<T> {
    /// Find a working way to talk to the server and make it the active configuration.
    ///
    /// Attempts stop at the first combination whose `getVersion` call decodes. A rejected
    /// secret aborts the search at once; any other failure moves on to the next
    /// combination. The winning answer must have status 200 and an API level of at
    /// least the configured minimum.
    pub async fn autodetect(&mut self) -> Result<ApiResponse> {
        let original = self.options.clone();
        let (options, response) = self.scoped(search(&self.transport, &original)).await?;

        self.set_options(options)?;

        Ok(response)
    }
}

async fn search<T: Transport>(
    transport: &T,
    original: &ConnectionOptions,
) -> Result<(ConnectionOptions, ApiResponse)> {
    let mut last_error = None;
    let mut found = None;

    for candidate in candidates(original) {
        // Always derive from the caller's options so one attempt cannot leak into the next
        let options = original.modified_clone(candidate.overrides())?;

        match query(transport, &options, "getVersion", &Value::Null).await {
            Ok(response) => {
                found = Some((options, response));
                break;
            }
            Err(Error::InvalidSecretWord) => return Err(Error::InvalidSecretWord),
            Err(e @ Error::CommunicationError { .. }) => {
                tracing::warn!(
                    "Communication error with verb “{}”, view “{}”, format “{}”, endpoint “{}”. The error was ‘{}’.",
                    candidate.verb,
                    candidate.view,
                    candidate.format,
                    candidate.endpoint,
                    e
                );
                last_error = Some(e);
            }
            Err(e) => {
                tracing::warn!(
                    "Remote API error with verb “{}”, view “{}”, format “{}”, endpoint “{}”. The error was ‘{}’.",
                    candidate.verb,
                    candidate.view,
                    candidate.format,
                    candidate.endpoint,
                    e
                );
                last_error = Some(e);
            }
        }
    }

    let Some((options, response)) = found else {
        return Err(Error::NoWayToConnect {
            last: last_error.map(Box::new),
        });
    };

    if !response.is_success() {
        return Err(response.remote_error());
    }

    let api_level = api_level(response.data());
    if api_level < options.min_api_level() {
        return Err(Error::RemoteApiVersionTooLow {
            found: api_level,
            required: options.min_api_level(),
        });
    }

    tracing::debug!(
        "Found a connection method. Verb: {}, Component: {}, View: {}, Format: {}, Endpoint: {}",
        options.effective_verb(),
        options.component(),
        options.view().map(|v| v.as_str()).unwrap_or_default(),
        options.format(),
        options.endpoint()
    );

    Ok((options, response))
}

/// API level reported by `getVersion`, which may send it as a number or a string
fn api_level(data: &Value) -> i64 {
    match data.get("api") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}
