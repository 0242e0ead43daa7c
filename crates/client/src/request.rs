//! Per-call transport options.
//!
//! [`RequestOptions`] is the typed counterpart of the keyword options a
//! caller passes through to the transport. The same shape is read from the
//! `client_options` settings section and merged under every call.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;
use secrecy::ExposeSecret;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::credentials::BasicAuth;

/// Options applied to a single outgoing request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    #[serde(deserialize_with = "scalar_map")]
    pub headers: BTreeMap<String, String>,
    #[serde(deserialize_with = "scalar_map")]
    pub query: BTreeMap<String, String>,
    pub json: Option<Value>,
    pub form: Option<Map<String, Value>>,
    pub body: Option<String>,
    /// Total request timeout. Read from settings as (fractional) seconds.
    #[serde(deserialize_with = "timeout_seconds")]
    pub timeout: Option<Duration>,
    pub auth: Option<BasicAuth>,
    /// Return an error for non-2xx responses.
    #[serde(skip)]
    pub raise_for_status: bool,
    /// Skip the session check and never trigger a login exchange.
    #[serde(skip)]
    pub skip_authentication: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn form(mut self, fields: Map<String, Value>) -> Self {
        self.form = Some(fields);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth::new(username, password));
        self
    }

    pub fn raise_for_status(mut self, raise: bool) -> Self {
        self.raise_for_status = raise;
        self
    }

    pub fn skip_authentication(mut self, skip: bool) -> Self {
        self.skip_authentication = skip;
        self
    }

    /// Case-insensitive header lookup.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }

    /// Whether these options already carry credentials, as an `auth` pair or
    /// an `Authorization` header.
    pub fn has_authorization(&self) -> bool {
        self.auth.is_some() || self.has_header(AUTHORIZATION.as_str())
    }

    fn has_body(&self) -> bool {
        self.json.is_some() || self.form.is_some() || self.body.is_some()
    }

    /// Layer `self` over `defaults`.
    ///
    /// Headers and query parameters merge per key with `self` winning. The
    /// body is taken whole from whichever side sets one, preferring `self`.
    /// Credentials are also taken as a group: when `self` carries an `auth`
    /// pair or an `Authorization` header, neither is taken from `defaults`.
    /// Call-level flags always come from `self`.
    pub fn merged_over(mut self, defaults: &RequestOptions) -> RequestOptions {
        let authorized = self.has_authorization();
        for (name, value) in &defaults.headers {
            let credential = name.eq_ignore_ascii_case(AUTHORIZATION.as_str());
            if !self.has_header(name) && !(authorized && credential) {
                self.headers.insert(name.clone(), value.clone());
            }
        }
        for (name, value) in &defaults.query {
            self.query
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        if !self.has_body() {
            self.json = defaults.json.clone();
            self.form = defaults.form.clone();
            self.body = defaults.body.clone();
        }
        if self.timeout.is_none() {
            self.timeout = defaults.timeout;
        }
        if !authorized {
            self.auth = defaults.auth.clone();
        }
        self
    }

    /// Apply these options to a transport request.
    ///
    /// An `Authorization` header takes precedence over `auth`, so at most one
    /// credential is sent.
    pub fn apply(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(json) = &self.json {
            builder = builder.json(json);
        } else if let Some(form) = &self.form {
            builder = builder.form(form);
        } else if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(auth) = &self.auth
            && !self.has_header(AUTHORIZATION.as_str())
        {
            builder = builder.basic_auth(&auth.username, Some(auth.password.expose_secret()));
        }
        builder
    }
}

fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "expected a scalar for {key}, found {other}"
                    )));
                }
            };
            Ok((key, value))
        })
        .collect()
}

fn timeout_seconds<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_client_options_section() {
        let options: RequestOptions = serde_json::from_value(json!({
            "headers": {"User-Agent": "authwire", "X-Retry": 3},
            "query": {"format": "json"},
            "timeout": 2.5,
            "auth": {"username": "svc", "password": "pw"}
        }))
        .unwrap();

        assert_eq!(options.headers["X-Retry"], "3");
        assert_eq!(options.query["format"], "json");
        assert_eq!(options.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(options.auth.unwrap().username, "svc");
        assert!(!options.raise_for_status);
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let result = serde_json::from_value::<RequestOptions>(json!({"timeout": -1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_not_read_from_settings() {
        let options: RequestOptions = serde_json::from_value(json!({
            "raise_for_status": true,
            "skip_authentication": true
        }))
        .unwrap();
        assert!(!options.raise_for_status);
        assert!(!options.skip_authentication);
    }

    #[test]
    fn test_merge_explicit_header_wins_case_insensitively() {
        let defaults = RequestOptions::new()
            .header("authorization", "Bearer default")
            .header("User-Agent", "authwire");
        let merged = RequestOptions::new()
            .header("Authorization", "Bearer explicit")
            .merged_over(&defaults);

        assert_eq!(merged.headers.len(), 2);
        assert_eq!(merged.headers["Authorization"], "Bearer explicit");
        assert_eq!(merged.headers["User-Agent"], "authwire");
    }

    #[test]
    fn test_merge_body_taken_as_group() {
        let defaults = RequestOptions::new().json(json!({"a": 1}));
        let merged = RequestOptions::new().body("raw").merged_over(&defaults);
        assert_eq!(merged.body.as_deref(), Some("raw"));
        assert!(merged.json.is_none());

        let merged = RequestOptions::new().merged_over(&defaults);
        assert_eq!(merged.json, Some(json!({"a": 1})));
    }

    #[test]
    fn test_merge_keeps_call_flags_and_fills_timeout() {
        let defaults = RequestOptions::new()
            .timeout(Duration::from_secs(5))
            .query_param("page", "1");
        let merged = RequestOptions::new()
            .raise_for_status(true)
            .query_param("page", "2")
            .merged_over(&defaults);

        assert!(merged.raise_for_status);
        assert_eq!(merged.timeout, Some(Duration::from_secs(5)));
        assert_eq!(merged.query["page"], "2");
    }

    #[test]
    fn test_header_setter_replaces_case_insensitive_duplicate() {
        let options = RequestOptions::new()
            .header("content-type", "text/plain")
            .header("Content-Type", "application/json");
        assert_eq!(options.headers.len(), 1);
        assert!(options.has_header("CONTENT-TYPE"));
    }

    #[test]
    fn test_merge_default_auth_skipped_when_header_explicit() {
        let defaults = RequestOptions::new().basic_auth("proxy", "pw");
        let merged = RequestOptions::new()
            .header("Authorization", "Bearer abc")
            .merged_over(&defaults);
        assert!(merged.auth.is_none());
        assert_eq!(merged.headers["Authorization"], "Bearer abc");
    }

    #[test]
    fn test_merge_default_header_skipped_when_auth_explicit() {
        let defaults = RequestOptions::new()
            .header("authorization", "Token static")
            .header("X-Trace", "1");
        let merged = RequestOptions::new()
            .basic_auth("client", "secret")
            .merged_over(&defaults);
        assert!(!merged.has_header("authorization"));
        assert!(merged.has_header("X-Trace"));
        assert_eq!(merged.auth.unwrap().username, "client");
    }

    #[test]
    fn test_apply_sends_single_authorization() {
        let options = RequestOptions::new()
            .header("Authorization", "Token static")
            .basic_auth("admin", "changeme");
        let request = options
            .apply(reqwest::Client::new().get("http://localhost/"))
            .build()
            .unwrap();

        let values: Vec<_> = request.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Token static");
    }

    #[test]
    fn test_apply_basic_auth_without_header() {
        let request = RequestOptions::new()
            .basic_auth("proxy", "pw")
            .apply(reqwest::Client::new().get("http://localhost/"))
            .build()
            .unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Basic cHJveHk6cHc=");
    }
}
