//! OAuth2 token-exchange credentials.

use authwire_config::Settings;
use serde_json::{Map, Value};
use url::Url;

use super::{
    BasicAuthCredentials, CredentialOptions, CredentialTuning, ExplicitFields, required_string,
    tuning_fields, unify, url_field, validate_url,
};
use crate::error::CredentialError;

/// Parameters for exchanging `auth_data` against an OAuth2 token endpoint.
///
/// Only the token exchange and its refresh bookkeeping are supported.
/// `token_url` and `redirect_uri` are carried for callers that drive the rest
/// of the flow themselves.
#[derive(Clone)]
pub struct OAuth2Credentials {
    login_url: Url,
    token_url: Option<Url>,
    redirect_uri: Option<Url>,
    auth_data: Map<String, Value>,
    legacy_auth: Option<BasicAuthCredentials>,
    tuning: CredentialTuning,
}

impl OAuth2Credentials {
    pub fn builder() -> OAuth2CredentialsBuilder {
        OAuth2CredentialsBuilder::default()
    }

    pub fn from_settings(settings: Settings) -> Result<Self, CredentialError> {
        Self::builder().settings(settings).build()
    }

    fn from_unified(
        settings: &Settings,
        legacy_auth: Option<BasicAuthCredentials>,
    ) -> Result<Self, CredentialError> {
        let auth_data = match settings.get("auth_data") {
            Some(Value::Object(map)) => map.clone(),
            _ => {
                return Err(CredentialError::InvalidField {
                    field: "auth_data".to_string(),
                    message: "expected a mapping".to_string(),
                });
            }
        };

        let legacy_auth = match legacy_auth {
            Some(creds) => Some(creds),
            None => match settings.get("legacy_auth") {
                None | Some(Value::Null) => None,
                Some(_) => {
                    let section = settings.section("legacy_auth").map_err(|e| {
                        CredentialError::InvalidField {
                            field: "legacy_auth".to_string(),
                            message: e.to_string(),
                        }
                    })?;
                    Some(BasicAuthCredentials::from_settings(section)?)
                }
            },
        };

        Ok(Self {
            login_url: validate_url("login_url", &required_string(settings, "login_url")?)?,
            token_url: url_field(settings, "token_url")?,
            redirect_uri: url_field(settings, "redirect_uri")?,
            auth_data,
            legacy_auth,
            tuning: tuning_fields(settings)?,
        })
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    pub fn token_url(&self) -> Option<&Url> {
        self.token_url.as_ref()
    }

    pub fn redirect_uri(&self) -> Option<&Url> {
        self.redirect_uri.as_ref()
    }

    /// Body posted to the login endpoint.
    pub fn auth_data(&self) -> &Map<String, Value> {
        &self.auth_data
    }

    pub fn legacy_auth(&self) -> Option<&BasicAuthCredentials> {
        self.legacy_auth.as_ref()
    }

    pub fn tuning(&self) -> CredentialTuning {
        self.tuning
    }

    /// Transport options for the exchange: the legacy basic-auth pair, if any.
    pub fn options(&self) -> CredentialOptions {
        self.legacy_auth
            .as_ref()
            .map(BasicAuthCredentials::options)
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for OAuth2Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.auth_data.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("OAuth2Credentials")
            .field("login_url", &self.login_url.as_str())
            .field("token_url", &self.token_url.as_ref().map(Url::as_str))
            .field("redirect_uri", &self.redirect_uri.as_ref().map(Url::as_str))
            .field("auth_data_keys", &keys)
            .field("legacy_auth", &self.legacy_auth)
            .field("tuning", &self.tuning)
            .finish()
    }
}

/// Builder for [`OAuth2Credentials`].
#[derive(Default)]
pub struct OAuth2CredentialsBuilder {
    login_url: Option<String>,
    token_url: Option<String>,
    redirect_uri: Option<String>,
    auth_data: Option<Map<String, Value>>,
    legacy_auth: Option<BasicAuthCredentials>,
    refresh_token_timeout: Option<u64>,
    access_token_timeout: Option<u64>,
    token_expiry_offset: Option<i64>,
    settings: Option<Settings>,
}

impl OAuth2CredentialsBuilder {
    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = Some(url.into());
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    pub fn redirect_uri(mut self, url: impl Into<String>) -> Self {
        self.redirect_uri = Some(url.into());
        self
    }

    pub fn auth_data(mut self, data: Map<String, Value>) -> Self {
        self.auth_data = Some(data);
        self
    }

    /// Basic-auth pair used as transport auth during the token exchange.
    pub fn legacy_auth(mut self, creds: BasicAuthCredentials) -> Self {
        self.legacy_auth = Some(creds);
        self
    }

    pub fn refresh_token_timeout(mut self, seconds: u64) -> Self {
        self.refresh_token_timeout = Some(seconds);
        self
    }

    pub fn access_token_timeout(mut self, seconds: u64) -> Self {
        self.access_token_timeout = Some(seconds);
        self
    }

    pub fn token_expiry_offset(mut self, seconds: i64) -> Self {
        self.token_expiry_offset = Some(seconds);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Validate and build the credentials.
    ///
    /// `login_url` and `auth_data` are always required. `token_url` and
    /// `redirect_uri` become required once present, so an empty value is
    /// reported rather than silently dropped.
    pub fn build(self) -> Result<OAuth2Credentials, CredentialError> {
        let mut explicit = ExplicitFields::default();
        explicit.string("login_url", self.login_url);
        explicit.string("token_url", self.token_url);
        explicit.string("redirect_uri", self.redirect_uri);
        explicit.mapping("auth_data", self.auth_data);
        explicit.number("refresh_token_timeout", self.refresh_token_timeout);
        explicit.number("access_token_timeout", self.access_token_timeout);
        explicit.number("token_expiry_offset", self.token_expiry_offset);

        let mut required = vec!["login_url", "auth_data"];
        if let Some(settings) = &self.settings {
            for key in ["token_url", "redirect_uri"] {
                if settings.contains_key(key) {
                    required.push(key);
                }
            }
        }

        let has_legacy = self.legacy_auth.is_some();
        let unified = unify(explicit, has_legacy, self.settings, &required)?;

        tracing::debug!(
            login_url = unified.get_str("login_url").unwrap_or_default(),
            token_url = unified.get_str("token_url").unwrap_or_default(),
            legacy_auth = has_legacy || unified.contains_key("legacy_auth"),
            "Loading OAuth2 web credentials"
        );

        OAuth2Credentials::from_unified(&unified, self.legacy_auth)
    }
}
