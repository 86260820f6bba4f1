//! URI value type used to build API request targets
//!
//! Unlike [`url::Url`], a [`Uri`] keeps every component exactly as it was given (no
//! trailing slash is invented for an empty path, no scheme is required) and exposes the
//! query string as an ordered, mutable set of variables.

use crate::{Error, Result};
use std::borrow::Cow;
use std::cell::OnceCell;
use std::fmt;

/// Punctuation that survives the pre-parse encoding untouched
const SAFE_PUNCTUATION: &str = "!*'();:/@?&=#$,[]";

/// A component of a [`Uri`], used to select what [`Uri::render`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriPart {
    /// `http`, `https`, …
    Scheme,
    /// User name of the authority
    User,
    /// Password of the authority
    Pass,
    /// Host name
    Host,
    /// Port number
    Port,
    /// Path, including its leading slash
    Path,
    /// Query string, without the `?`
    Query,
    /// Fragment, without the `#`
    Fragment,
}

impl UriPart {
    /// Every component, in rendering order
    pub const ALL: [UriPart; 8] = [
        UriPart::Scheme,
        UriPart::User,
        UriPart::Pass,
        UriPart::Host,
        UriPart::Port,
        UriPart::Path,
        UriPart::Query,
        UriPart::Fragment,
    ];

    /// Everything except the query string and fragment
    pub const BASE: [UriPart; 6] = [
        UriPart::Scheme,
        UriPart::User,
        UriPart::Pass,
        UriPart::Host,
        UriPart::Port,
        UriPart::Path,
    ];
}

/// A parsed, mutable URI.
///
/// The query string is always derivable from the variables. Changing a variable
/// drops the cached query string; it is rebuilt the next time it is read.
#[derive(Debug, Clone, Default)]
pub struct Uri {
    /// Scheme, without `://`
    pub scheme: String,
    /// Host name
    pub host: String,
    /// Port, if one was given
    pub port: Option<u16>,
    /// User name
    pub user: String,
    /// Password
    pub pass: String,
    /// Path
    pub path: String,
    /// Fragment
    pub fragment: String,
    query: OnceCell<String>,
    vars: Vec<(String, String)>,
}

impl Uri {
    /// Create an empty URI
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a URL string.
    ///
    /// Characters outside a conservative ASCII set are percent-encoded before the string
    /// is split into components, and every component is decoded again afterwards, so
    /// non-ASCII input is handled the same way as plain ASCII input.
    pub fn parse(raw: &str) -> Result<Self> {
        let encoded = encode_unsafe(raw);
        let malformed = || Error::MalformedUrl(raw.to_string());

        let (rest, fragment) = match encoded.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (encoded.as_str(), None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (scheme, rest) = split_scheme(rest);

        let mut uri = Uri::new();

        let path = match rest.strip_prefix("//") {
            Some(after) => {
                // Authority present; hand the whole thing to the standard parser first
                if scheme.is_some() {
                    url::Url::parse(&encoded).map_err(|_| malformed())?;
                }

                let end = after.find('/').unwrap_or(after.len());
                let (authority, path) = after.split_at(end);
                parse_authority(authority, &mut uri).ok_or_else(malformed)?;

                if uri.host.is_empty() {
                    return Err(malformed());
                }

                path
            }
            None => rest,
        };

        uri.scheme = decode(scheme.unwrap_or_default()).ok_or_else(malformed)?;
        uri.user = decode(&uri.user).ok_or_else(malformed)?;
        uri.pass = decode(&uri.pass).ok_or_else(malformed)?;
        uri.host = decode(&uri.host).ok_or_else(malformed)?;
        uri.path = decode(path).ok_or_else(malformed)?;
        uri.fragment = decode(fragment.unwrap_or_default()).ok_or_else(malformed)?;

        if let Some(query) = query {
            let query = decode(query).ok_or_else(malformed)?;
            uri.set_query(&query);
        }

        Ok(uri)
    }

    /// Reassemble the selected components, always in scheme, user, pass, host, port,
    /// path, query, fragment order.
    pub fn render(&self, parts: &[UriPart]) -> String {
        let has = |part: UriPart| parts.contains(&part);
        let mut out = String::new();

        if has(UriPart::Scheme) && !self.scheme.is_empty() {
            out.push_str(&self.scheme);
            out.push_str("://");
        }

        if has(UriPart::User) && !self.user.is_empty() {
            out.push_str(&self.user);

            if has(UriPart::Pass) && !self.pass.is_empty() {
                out.push(':');
                out.push_str(&self.pass);
            }

            out.push('@');
        }

        if has(UriPart::Host) {
            out.push_str(&self.host);
        }

        if has(UriPart::Port) {
            if let Some(port) = self.port {
                out.push(':');
                out.push_str(&port.to_string());
            }
        }

        if has(UriPart::Path) {
            out.push_str(&self.path);
        }

        if has(UriPart::Query) {
            let query = self.query();

            if !query.is_empty() {
                out.push('?');
                out.push_str(&query);
            }
        }

        if has(UriPart::Fragment) && !self.fragment.is_empty() {
            out.push('#');
            out.push_str(&self.fragment);
        }

        out
    }

    /// The query string, rebuilt from the variables if it was invalidated
    pub fn query(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.query.get_or_init(|| build_query(&self.vars)))
    }

    /// Replace every variable with those found in a query string
    pub fn set_query(&mut self, query: &str) {
        let query = query.replace("&amp;", "&");

        self.vars.clear();
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            upsert(&mut self.vars, name.into_owned(), value.into_owned());
        }

        // A freshly parsed query string is its own cache
        self.query = OnceCell::from(query);
    }

    /// Whether a query variable is set
    pub fn has_var(&self, name: &str) -> bool {
        self.vars.iter().any(|(k, _)| k == name)
    }

    /// Value of a query variable
    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a query variable, or `default` when it is unset
    pub fn get_var_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get_var(name).unwrap_or(default)
    }

    /// Set a query variable. An existing variable keeps its position.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        upsert(&mut self.vars, name.into(), value.into());
        self.query = OnceCell::new();
    }

    /// Remove a query variable
    pub fn del_var(&mut self, name: &str) {
        if !self.has_var(name) {
            return;
        }

        self.vars.retain(|(k, _)| k != name);
        self.query = OnceCell::new();
    }

    /// Replace every query variable
    pub fn set_vars<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.clear();
        for (name, value) in vars {
            upsert(&mut self.vars, name.into(), value.into());
        }
        self.query = OnceCell::new();
    }

    /// Query variables in order
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Whether the scheme is `https`
    pub fn is_tls(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&UriPart::ALL))
    }
}

impl std::str::FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

/// Insert or overwrite, keeping the first position of a repeated key
pub(crate) fn upsert(vars: &mut Vec<(String, String)>, name: String, value: String) {
    match vars.iter_mut().find(|(k, _)| *k == name) {
        Some(slot) => slot.1 = value,
        None => vars.push((name, value)),
    }
}

fn build_query(vars: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(vars)
        .finish()
}

fn encode_unsafe(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut run = String::new();

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || SAFE_PUNCTUATION.contains(c) {
            if !run.is_empty() {
                out.push_str(&urlencoding::encode(&run));
                run.clear();
            }
            out.push(c);
        } else {
            run.push(c);
        }
    }

    if !run.is_empty() {
        out.push_str(&urlencoding::encode(&run));
    }

    out
}

fn decode(part: &str) -> Option<String> {
    urlencoding::decode(part).ok().map(Cow::into_owned)
}

fn split_scheme(input: &str) -> (Option<&str>, &str) {
    let Some(colon) = input.find(':') else {
        return (None, input);
    };

    let candidate = &input[..colon];
    let valid = candidate
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    if valid {
        (Some(candidate), &input[colon + 1..])
    } else {
        (None, input)
    }
}

fn parse_authority(authority: &str, uri: &mut Uri) -> Option<()> {
    let host_port = match authority.rsplit_once('@') {
        Some((userinfo, host_port)) => {
            match userinfo.split_once(':') {
                Some((user, pass)) => {
                    uri.user = user.to_string();
                    uri.pass = pass.to_string();
                }
                None => uri.user = userinfo.to_string(),
            }
            host_port
        }
        None => authority,
    };

    // Bracketed IPv6 literals contain colons of their own
    let port_sep = match host_port.rfind(']') {
        Some(end) => host_port[end..].find(':').map(|i| i + end),
        None => host_port.rfind(':'),
    };

    match port_sep {
        Some(sep) => {
            uri.host = host_port[..sep].to_string();
            let port = &host_port[sep + 1..];

            if !port.is_empty() {
                uri.port = Some(port.parse().ok()?);
            }
        }
        None => uri.host = host_port.to_string(),
    }

    Some(())
}
