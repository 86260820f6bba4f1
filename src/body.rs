//! Form bodies for POST calls to the API

use std::borrow::Cow;

/// Request body handed to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Empty body
    Empty,

    /// Form-encoded data
    Form {
        /// Form fields, in sending order
        fields: Vec<(Cow<'static, str>, Cow<'static, str>)>,
    },
}

impl Body {
    /// Create an empty body
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a form-encoded body
    pub fn form<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Cow<'static, str>>,
        V: Into<Cow<'static, str>>,
    {
        Self::Form {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// `Content-Type` header value, if the body has one
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Empty => None,
            Body::Form { .. } => Some("application/x-www-form-urlencoded"),
        }
    }

    /// Wire representation of the body
    pub fn encode(&self) -> String {
        match self {
            Body::Empty => String::new(),
            Body::Form { fields } => fields
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }

    /// Value of a form field
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Body::Empty => None,
            Body::Form { fields } => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_ref()),
        }
    }

    /// Whether the body carries nothing
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Form { fields } => fields.is_empty(),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_encoding() {
        let body = Body::form(vec![
            ("method".to_string(), "getVersion".to_string()),
            ("data[name]".to_string(), "a b&c".to_string()),
        ]);

        assert_eq!(body.encode(), "method=getVersion&data%5Bname%5D=a%20b%26c");
        assert_eq!(body.field("method"), Some("getVersion"));
        assert_eq!(body.content_type(), Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_empty() {
        assert!(Body::empty().is_empty());
        assert_eq!(Body::default().encode(), "");
        assert!(Body::form(Vec::<(String, String)>::new()).is_empty());
    }
}
