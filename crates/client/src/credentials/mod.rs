//! Authentication material for the web client.
//!
//! Responsibilities:
//! - Model each supported scheme (basic auth, x509 client certificate, OAuth2)
//!   as a variant of the closed [`Credentials`] union.
//! - Unify explicit constructor fields and settings fragments into a single
//!   validated configuration.
//! - Expose the request-option fragment, login endpoint and exchange body the
//!   dispatcher needs.
//!
//! Does NOT handle:
//! - Network I/O. Constructing credentials never contacts a server.
//! - Token storage (see [`crate::auth::Session`]).
//!
//! Invariants:
//! - Explicit fields and a settings fragment are mutually exclusive.
//! - Both sources run through the same required-field validation.
//! - [`Credentials::options`] returns an owned snapshot; mutating it never
//!   affects the credential.

mod basic;
mod oauth2;
mod x509;

pub use basic::{BasicAuthCredentials, BasicAuthCredentialsBuilder};
pub use oauth2::{OAuth2Credentials, OAuth2CredentialsBuilder};
pub use x509::{X509Credentials, X509CredentialsBuilder};

use std::path::PathBuf;

use authwire_config::Settings;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{ClientError, CredentialError};

/// Username/password pair sent as HTTP basic auth.
#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s.into()))
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let password: String = password.into();
        Self {
            username: username.into(),
            password: SecretString::from(password),
        }
    }
}

impl PartialEq for BasicAuth {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

/// PEM certificate and private key presented as a TLS client identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

impl ClientIdentity {
    /// Load the PEM files into a transport identity.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TlsError`] if the files cannot be read or do not
    /// contain a usable certificate and key.
    pub fn load(&self) -> Result<reqwest::Identity, ClientError> {
        let mut pem = std::fs::read(&self.key_file).map_err(|e| {
            ClientError::TlsError(format!("reading {}: {e}", self.key_file.display()))
        })?;
        pem.push(b'\n');
        let cert = std::fs::read(&self.cert_file).map_err(|e| {
            ClientError::TlsError(format!("reading {}: {e}", self.cert_file.display()))
        })?;
        pem.extend_from_slice(&cert);

        reqwest::Identity::from_pem(&pem).map_err(|e| ClientError::TlsError(e.to_string()))
    }
}

/// Transport-level parameters contributed by a credential.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialOptions {
    pub basic_auth: Option<BasicAuth>,
    pub client_identity: Option<ClientIdentity>,
}

/// Token lifetime tuning carried by a credential.
///
/// Used as fallbacks for the client settings keys of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialTuning {
    pub access_token_timeout: Option<u64>,
    pub refresh_token_timeout: Option<u64>,
    pub token_expiry_offset: Option<i64>,
}

/// Authentication material for one of the supported schemes.
#[derive(Debug, Clone)]
pub enum Credentials {
    Basic(BasicAuthCredentials),
    X509(X509Credentials),
    OAuth2(OAuth2Credentials),
}

impl Credentials {
    /// Short name of the scheme, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Basic(_) => "basic",
            Self::X509(_) => "x509",
            Self::OAuth2(_) => "oauth2",
        }
    }

    /// Request-option fragment to merge into the login exchange.
    pub fn options(&self) -> CredentialOptions {
        match self {
            Self::Basic(c) => c.options(),
            Self::X509(c) => c.options(),
            Self::OAuth2(c) => c.options(),
        }
    }

    /// Endpoint used for the login exchange, if the scheme has one.
    pub fn login_url(&self) -> Option<&Url> {
        match self {
            Self::Basic(c) => c.login_url(),
            Self::X509(c) => Some(c.login_url()),
            Self::OAuth2(c) => Some(c.login_url()),
        }
    }

    /// Body sent with the login exchange (OAuth2 only).
    pub fn request_body(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::OAuth2(c) => Some(c.auth_data()),
            _ => None,
        }
    }

    pub fn tuning(&self) -> CredentialTuning {
        match self {
            Self::Basic(_) => CredentialTuning::default(),
            Self::X509(c) => c.tuning(),
            Self::OAuth2(c) => c.tuning(),
        }
    }
}

impl From<BasicAuthCredentials> for Credentials {
    fn from(c: BasicAuthCredentials) -> Self {
        Self::Basic(c)
    }
}

impl From<X509Credentials> for Credentials {
    fn from(c: X509Credentials) -> Self {
        Self::X509(c)
    }
}

impl From<OAuth2Credentials> for Credentials {
    fn from(c: OAuth2Credentials) -> Self {
        Self::OAuth2(c)
    }
}

/// Collects explicitly supplied fields. Empty values count as "not supplied".
#[derive(Debug, Default)]
pub(crate) struct ExplicitFields(Map<String, Value>);

impl ExplicitFields {
    pub(crate) fn string(&mut self, key: &str, value: Option<String>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.0.insert(key.to_string(), Value::String(v));
        }
    }

    pub(crate) fn number<N: Into<serde_json::Number>>(&mut self, key: &str, value: Option<N>) {
        if let Some(n) = value.map(Into::into).filter(|n| n.as_f64() != Some(0.0)) {
            self.0.insert(key.to_string(), Value::Number(n));
        }
    }

    pub(crate) fn mapping(&mut self, key: &str, value: Option<Map<String, Value>>) {
        if let Some(m) = value.filter(|m| !m.is_empty()) {
            self.0.insert(key.to_string(), Value::Object(m));
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Merge explicit fields and a settings fragment into one validated snapshot.
pub(crate) fn unify(
    explicit: ExplicitFields,
    extra_explicit: bool,
    settings: Option<Settings>,
    required: &[&str],
) -> Result<Settings, CredentialError> {
    let has_explicit = extra_explicit || !explicit.is_empty();
    let unified = match settings {
        Some(_) if has_explicit => return Err(CredentialError::MultipleSources),
        Some(settings) => settings,
        None => Settings::from_map(explicit.0),
    };

    unified
        .validate_keys(required, false)
        .map_err(CredentialError::MissingFields)?;
    Ok(unified)
}

/// Read an optional string field, accepting scalars.
pub(crate) fn string_field(
    settings: &Settings,
    key: &str,
) -> Result<Option<String>, CredentialError> {
    match settings.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(CredentialError::InvalidField {
            field: key.to_string(),
            message: "expected a string".to_string(),
        }),
    }
}

/// Read a required string field that validation has already confirmed.
pub(crate) fn required_string(settings: &Settings, key: &str) -> Result<String, CredentialError> {
    string_field(settings, key)?.ok_or_else(|| CredentialError::InvalidField {
        field: key.to_string(),
        message: "value is empty".to_string(),
    })
}

/// Read an optional URL field. Empty values count as absent.
pub(crate) fn url_field(settings: &Settings, key: &str) -> Result<Option<Url>, CredentialError> {
    string_field(settings, key)?
        .map(|value| validate_url(key, &value))
        .transpose()
}

/// Parse `value` as an absolute URL with a host.
pub(crate) fn validate_url(field: &str, value: &str) -> Result<Url, CredentialError> {
    let invalid = || {
        tracing::error!(field, "URL validation failed");
        CredentialError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        }
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    if url.has_host() { Ok(url) } else { Err(invalid()) }
}

/// Read the shared token tuning fields. Zero means "not set".
pub(crate) fn tuning_fields(settings: &Settings) -> Result<CredentialTuning, CredentialError> {
    let unsigned = |key: &str| -> Result<Option<u64>, CredentialError> {
        match settings.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => settings
                .get_u64(key)
                .map(|v| (v != 0).then_some(v))
                .ok_or_else(|| CredentialError::InvalidField {
                    field: key.to_string(),
                    message: "expected a non-negative integer".to_string(),
                }),
        }
    };
    let offset = match settings.get("token_expiry_offset") {
        None | Some(Value::Null) => None,
        Some(_) => {
            let v = settings
                .get_i64("token_expiry_offset")
                .ok_or_else(|| CredentialError::InvalidField {
                    field: "token_expiry_offset".to_string(),
                    message: "expected an integer".to_string(),
                })?;
            (v != 0).then_some(v)
        }
    };

    Ok(CredentialTuning {
        access_token_timeout: unsigned("access_token_timeout")?,
        refresh_token_timeout: unsigned("refresh_token_timeout")?,
        token_expiry_offset: offset,
    })
}
