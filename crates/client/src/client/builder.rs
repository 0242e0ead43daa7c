//! Client builder for constructing [`WebClient`] instances.
//!
//! This module is responsible for:
//! - Providing a fluent builder API for client configuration
//! - Copying the credential's options, login URL and exchange body
//! - Resolving token settings and `client_options` from the settings snapshot
//! - Configuring the underlying HTTP client (redirects, TLS, client identity)
//!
//! # What this module does NOT handle:
//! - Sending requests (handled by [`WebClient::call`] in `mod.rs`)
//! - Session token storage (handled by [`crate::auth::Session`])
//!
//! # Invariants
//! - A settings object and a plain config map are mutually exclusive
//! - The credential is only read during `build()`; the client keeps copies

use std::time::Duration;

use authwire_config::Settings;
use authwire_config::constants::{CLIENT_OPTIONS_KEY, DEFAULT_MAX_REDIRECTS};
use serde_json::{Map, Value};

use crate::auth::{AuthorizationType, Session, TokenSettings};
use crate::client::WebClient;
use crate::credentials::{CredentialOptions, CredentialTuning, Credentials};
use crate::error::{ClientError, Result};
use crate::request::RequestOptions;

/// Builder for creating a new [`WebClient`].
///
/// Every option has a default; a client built with no credentials sends
/// unauthenticated requests.
#[derive(Default)]
pub struct WebClientBuilder {
    authorization_type: AuthorizationType,
    credentials: Option<Credentials>,
    settings: Option<Settings>,
    config_map: Option<Map<String, Value>>,
    timeout: Option<Duration>,
    danger_accept_invalid_certs: bool,
}

impl WebClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how requests are decorated and login responses interpreted.
    ///
    /// Default is [`AuthorizationType::None`].
    pub fn authorization_type(mut self, authorization_type: AuthorizationType) -> Self {
        self.authorization_type = authorization_type;
        self
    }

    pub fn credentials(mut self, credentials: impl Into<Credentials>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Supply client settings (tuning keys and `client_options`).
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Supply client settings as a plain map instead of a [`Settings`] object.
    pub fn config_map(mut self, map: Map<String, Value>) -> Self {
        self.config_map = Some(map);
        self
    }

    /// Set a default timeout for every request.
    ///
    /// No timeout is applied unless one is set here or per call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set whether to accept invalid TLS certificates.
    ///
    /// # Security Warning
    /// Only use this in development or testing environments. Disabling TLS
    /// verification makes the connection vulnerable to man-in-the-middle attacks.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Build the [`WebClient`] with the configured options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfiguration`] if both `settings` and
    /// `config_map` were supplied.
    /// Returns [`ClientError::Config`] if a tuning key or `client_options` is malformed.
    /// Returns [`ClientError::TlsError`] if the x509 client identity cannot be loaded.
    pub fn build(self) -> Result<WebClient> {
        let settings = match (self.settings, self.config_map) {
            (Some(_), Some(_)) => {
                return Err(ClientError::InvalidConfiguration(
                    "Multiple configuration sources used, pass settings OR a config map"
                        .to_string(),
                ));
            }
            (Some(settings), None) => settings,
            (None, Some(map)) => Settings::from_map(map),
            (None, None) => Settings::default(),
        };

        let (credential_options, login_url, credential_body, tuning) = match &self.credentials {
            Some(credentials) => (
                credentials.options(),
                credentials.login_url().cloned(),
                credentials.request_body().cloned(),
                credentials.tuning(),
            ),
            None => (
                CredentialOptions::default(),
                None,
                None,
                CredentialTuning::default(),
            ),
        };

        let token_settings = TokenSettings::from_settings(&settings, &tuning)?;
        let client_options = if settings.contains_key(CLIENT_OPTIONS_KEY) {
            settings
                .section(CLIENT_OPTIONS_KEY)?
                .deserialize::<RequestOptions>()?
        } else {
            RequestOptions::default()
        };

        let mut http_builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(DEFAULT_MAX_REDIRECTS));

        if let Some(timeout) = self.timeout {
            http_builder = http_builder.timeout(timeout);
        }

        if self.danger_accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled for this client");
            http_builder = http_builder.danger_accept_invalid_certs(true);
        }

        if let Some(identity) = &credential_options.client_identity {
            http_builder = http_builder.identity(identity.load()?);
        }

        let http = http_builder
            .build()
            .map_err(|e| ClientError::TlsError(e.to_string()))?;

        tracing::debug!(
            authorization_type = %self.authorization_type,
            credentials = self.credentials.as_ref().map(Credentials::kind).unwrap_or("none"),
            login_url = login_url.as_ref().map(|u| u.as_str()).unwrap_or(""),
            "Web client initialized"
        );

        Ok(WebClient {
            http,
            authorization_type: self.authorization_type,
            credential_options,
            login_url,
            credential_body,
            settings,
            token_settings,
            client_options,
            session: Session::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{BasicAuthCredentials, OAuth2Credentials};
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_build_without_credentials() {
        let client = WebClient::builder().build().unwrap();
        assert_eq!(client.authorization_type(), AuthorizationType::None);
        assert!(client.login_url().is_none());
        assert_eq!(client.token_settings(), &TokenSettings::default());
        assert!(client.session_expired());
    }

    #[test]
    fn test_settings_and_config_map_conflict() {
        let err = WebClient::builder()
            .settings(Settings::default())
            .config_map(Map::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_config_map_resolves_tuning_and_client_options() {
        let client = WebClient::builder()
            .config_map(map(json!({
                "token_expiry_offset": 30,
                "access_token_header": "X-Auth-Token",
                "client_options": {"headers": {"User-Agent": "authwire"}, "timeout": 5}
            })))
            .build()
            .unwrap();

        assert_eq!(client.token_settings().token_expiry_offset, 30);
        assert_eq!(
            client.token_settings().access_token_header.as_deref(),
            Some("X-Auth-Token")
        );
        assert_eq!(client.client_options.headers["User-Agent"], "authwire");
        assert_eq!(client.client_options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(client.settings().get_u64("token_expiry_offset"), Some(30));
    }

    #[test]
    fn test_malformed_client_options_rejected() {
        let err = WebClient::builder()
            .config_map(map(json!({"client_options": "fast"})))
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_credential_copied_at_build() {
        let credentials = OAuth2Credentials::builder()
            .login_url("https://auth.example.com/token")
            .auth_data(map(json!({"grant_type": "client_credentials"})))
            .access_token_timeout(600)
            .build()
            .unwrap();

        let client = WebClient::builder()
            .authorization_type(AuthorizationType::OAuth2)
            .credentials(credentials)
            .build()
            .unwrap();

        assert_eq!(
            client.login_url().map(|u| u.as_str()),
            Some("https://auth.example.com/token")
        );
        assert_eq!(
            client.credential_body.as_ref().unwrap()["grant_type"],
            "client_credentials"
        );
        assert_eq!(client.token_settings().access_token_timeout, 600);
    }

    #[test]
    fn test_client_settings_override_credential_tuning() {
        let credentials = OAuth2Credentials::builder()
            .login_url("https://auth.example.com/token")
            .auth_data(map(json!({"grant_type": "client_credentials"})))
            .refresh_token_timeout(600)
            .build()
            .unwrap();

        let client = WebClient::builder()
            .credentials(credentials)
            .config_map(map(json!({"refresh_token_timeout": 1200})))
            .build()
            .unwrap();

        assert_eq!(client.token_settings().refresh_token_timeout, 1200);
    }

    #[test]
    fn test_basic_credentials_options_copied() {
        let credentials = BasicAuthCredentials::builder()
            .username("admin")
            .password("changeme")
            .build()
            .unwrap();
        let client = WebClient::builder()
            .credentials(credentials)
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        assert_eq!(
            client.credential_options.basic_auth.as_ref().unwrap().username,
            "admin"
        );
    }
}
