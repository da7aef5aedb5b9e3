// ── Route descriptors ──
//
// A `Route` knows its HTTP method, its path template and whether it needs
// an access token. It turns request data into a URL plus a `RequestInit`
// that any `Fetch` implementation can execute.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use url::form_urlencoded;

use crate::error::Error;

/// HTTP method of a route.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Whether leftover request data travels in the query string.
    fn uses_query(self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
        }
    }
}

/// Transport-agnostic request options, the second half of a fetch call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInit {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestInit {
    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a bearer token as the `Authorization` header.
    pub fn bearer(self, token: &SecretString) -> Self {
        self.header("Authorization", format!("Bearer {}", token.expose_secret()))
    }

    /// Look up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A remote endpoint descriptor.
///
/// `path` may contain `{key}` placeholders that are filled from the request
/// data object, e.g. `/users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub method: Method,
    pub path: String,
    /// Requires an access token.
    #[serde(default)]
    pub private: bool,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            private: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Mark the route as requiring an access token.
    pub fn authenticated(mut self) -> Self {
        self.private = true;
        self
    }

    /// Build the URL and request options for a call with `data`.
    ///
    /// Path placeholders consume their keys from `data`. Whatever is left
    /// becomes the query string for GET/DELETE and the JSON body otherwise.
    /// `init` carries caller-supplied headers (e.g. authorization) and is
    /// returned with method and body filled in.
    pub fn fetch_params(
        &self,
        data: Option<&Value>,
        prefix: &str,
        init: RequestInit,
    ) -> Result<(String, RequestInit), Error> {
        let mut init = RequestInit {
            method: self.method,
            ..init
        };

        let (mut params, raw_body) = match data {
            None | Some(Value::Null) => (Map::new(), None),
            Some(Value::Object(map)) => (map.clone(), None),
            Some(other) => (Map::new(), Some(other.clone())),
        };

        let path = fill_placeholders(&self.path, &mut params)?;
        let mut url = format!("{}{path}", prefix.trim_end_matches('/'));

        if self.method.uses_query() {
            if raw_body.is_some() {
                return Err(Error::InvalidRequest {
                    message: format!("{} {} expects object data", self.method, self.path),
                });
            }
            if !params.is_empty() {
                let mut query = form_urlencoded::Serializer::new(String::new());
                for (key, value) in &params {
                    query.append_pair(key, &scalar_to_string(value));
                }
                let sep = if url.contains('?') { '&' } else { '?' };
                url = format!("{url}{sep}{}", query.finish());
            }
        } else if let Some(body) = raw_body {
            init.body = Some(body);
        } else if !params.is_empty() {
            init.body = Some(Value::Object(params));
        }

        Ok((url, init))
    }
}

/// Replace every `{key}` in `template` with the matching entry of `params`,
/// removing the consumed keys.
fn fill_placeholders(template: &str, params: &mut Map<String, Value>) -> Result<String, Error> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            return Err(Error::InvalidRequest {
                message: format!("unterminated placeholder in route path `{template}`"),
            });
        };
        out.push_str(&rest[..start]);
        let key = &rest[start + 1..start + len];
        let value = params.remove(key).ok_or_else(|| Error::InvalidRequest {
            message: format!("missing path parameter `{key}` for `{template}`"),
        })?;
        out.push_str(&scalar_to_string(&value));
        rest = &rest[start + len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
