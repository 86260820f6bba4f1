//! Request construction for both API versions
//!
//! v1 (`view=json`) wraps the call in a challenge-signed envelope sent as a single `json`
//! parameter. v2 (`view=api`) sends the data fields directly next to `method`, and
//! authenticates with `_akeebaAuth` in the URL.

use crate::options::{ConnectionOptions, Verb, View};
use crate::uri::{Uri, upsert};
use crate::{Result, auth};
use serde_json::{Value, json};

/// Query parameters (GET) or form fields (POST) for an API call.
///
/// Values are flattened the way PHP's `http_build_query` does: nested objects and
/// arrays become `key[sub]`, booleans become `1`/`0` and nulls are left out.
pub(crate) fn query_parameters(
    options: &ConnectionOptions,
    method: &str,
    data: &Value,
) -> Vec<(String, String)> {
    let mut params = Vec::new();

    match options.view() {
        Some(View::Api) => {
            flatten_data(data, &mut params);
            upsert(&mut params, "view".into(), "Api".into());
            upsert(&mut params, "method".into(), method.into());
        }
        Some(View::Json) | None => {
            params.push(("view".into(), "json".into()));
            params.push(("json".into(), encapsulate(method, data, options.secret())));
        }
    }

    let component = options.component();
    let format = options.format();

    if !component.is_empty() {
        upsert(&mut params, "option".into(), component.into());
    }

    if !format.is_empty() {
        upsert(&mut params, "format".into(), format.into());

        // Joomla! renders the site template around html output unless told otherwise
        if format == "html" && !component.is_empty() {
            upsert(&mut params, "tmpl".into(), "component".into());
        }
    }

    params
}

/// URL of an API call.
///
/// For POST the URL only carries authentication and routing parameters; the payload
/// goes into the form body built from [`query_parameters`].
pub(crate) fn make_url(
    options: &ConnectionOptions,
    method: &str,
    data: &Value,
    verb: Option<Verb>,
) -> Result<String> {
    let verb = verb.unwrap_or_else(|| options.effective_verb());

    let mut url = options.host().trim_end_matches('/').to_string();
    if !options.endpoint().is_empty() {
        url.push('/');
        url.push_str(options.endpoint());
    }

    let mut uri = Uri::parse(&url)?;

    if options.view() == Some(View::Api) {
        uri.set_var("_akeebaAuth", options.secret());
    }

    if options.is_wordpress() {
        uri.set_var("action", "akeebabackup_api");
    }

    if verb == Verb::Post {
        return Ok(uri.to_string());
    }

    for (name, value) in query_parameters(options, method, data) {
        uri.set_var(name, value);
    }

    // admin-ajax.php routes on `action` alone
    if options.is_wordpress() {
        uri.del_var("option");
        uri.del_var("view");
        uri.del_var("format");
    }

    Ok(uri.to_string())
}

/// v1 envelope: `{"encapsulation":1,"body":"<json of {method, data, challenge}>"}`
pub(crate) fn encapsulate(method: &str, data: &Value, secret: &str) -> String {
    let data = match data {
        Value::Null => json!({}),
        other => other.clone(),
    };

    let body = json!({
        "method": method,
        "data": data,
        "challenge": auth::challenge(secret),
    });

    json!({
        "encapsulation": 1,
        "body": body.to_string(),
    })
    .to_string()
}

fn flatten_data(data: &Value, out: &mut Vec<(String, String)>) {
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                flatten(key.clone(), value, out);
            }
        }
        Value::Null => {}
        other => flatten("data".to_string(), other, out),
    }
}

fn flatten(key: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => upsert(out, key, if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => upsert(out, key, n.to_string()),
        Value::String(s) => upsert(out, key, s.clone()),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(format!("{key}[{index}]"), item, out);
            }
        }
        Value::Object(map) => {
            for (sub, item) in map {
                flatten(format!("{key}[{sub}]"), item, out);
            }
        }
    }
}
