//! Client-certificate credentials.

use std::path::{Path, PathBuf};

use authwire_config::{Settings, is_file_readable};
use url::Url;

use super::{
    ClientIdentity, CredentialOptions, CredentialTuning, ExplicitFields, required_string,
    tuning_fields, unify, validate_url,
};
use crate::error::CredentialError;

const REQUIRED_FIELDS: &[&str] = &["cert_file", "key_file", "login_url"];

/// PEM certificate/key pair presented during the login exchange.
#[derive(Debug, Clone)]
pub struct X509Credentials {
    identity: ClientIdentity,
    login_url: Url,
    tuning: CredentialTuning,
}

impl X509Credentials {
    pub fn builder() -> X509CredentialsBuilder {
        X509CredentialsBuilder::default()
    }

    pub fn from_settings(settings: Settings) -> Result<Self, CredentialError> {
        Self::builder().settings(settings).build()
    }

    fn from_unified(settings: &Settings) -> Result<Self, CredentialError> {
        let cert_file = PathBuf::from(required_string(settings, "cert_file")?);
        let key_file = PathBuf::from(required_string(settings, "key_file")?);
        let login_url = validate_url("login_url", &required_string(settings, "login_url")?)?;

        if !is_file_readable(&cert_file) {
            tracing::error!(path = %cert_file.display(), "Certificate file is not usable");
            return Err(CredentialError::CertificateFile(cert_file));
        }
        if !is_file_readable(&key_file) {
            tracing::error!(path = %key_file.display(), "Key file is not usable");
            return Err(CredentialError::KeyFile(key_file));
        }

        Ok(Self {
            identity: ClientIdentity {
                cert_file,
                key_file,
            },
            login_url,
            tuning: tuning_fields(settings)?,
        })
    }

    pub fn cert_file(&self) -> &Path {
        &self.identity.cert_file
    }

    pub fn key_file(&self) -> &Path {
        &self.identity.key_file
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    pub fn tuning(&self) -> CredentialTuning {
        self.tuning
    }

    pub fn options(&self) -> CredentialOptions {
        CredentialOptions {
            basic_auth: None,
            client_identity: Some(self.identity.clone()),
        }
    }
}

/// Builder for [`X509Credentials`].
#[derive(Debug, Default)]
pub struct X509CredentialsBuilder {
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
    login_url: Option<String>,
    access_token_timeout: Option<u64>,
    token_expiry_offset: Option<i64>,
    settings: Option<Settings>,
}

impl X509CredentialsBuilder {
    pub fn cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(path.into());
        self
    }

    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    pub fn login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = Some(login_url.into());
        self
    }

    /// Override the lifetime of issued access tokens, in seconds.
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
    /// The certificate is checked before the key, so a missing certificate is
    /// reported even when the key is also missing.
    pub fn build(self) -> Result<X509Credentials, CredentialError> {
        let mut explicit = ExplicitFields::default();
        explicit.string("cert_file", utf8_path("cert_file", self.cert_file)?);
        explicit.string("key_file", utf8_path("key_file", self.key_file)?);
        explicit.string("login_url", self.login_url);
        explicit.number("access_token_timeout", self.access_token_timeout);
        explicit.number("token_expiry_offset", self.token_expiry_offset);

        let unified = unify(explicit, false, self.settings, REQUIRED_FIELDS)?;
        X509Credentials::from_unified(&unified)
    }
}

fn utf8_path(field: &str, path: Option<PathBuf>) -> Result<Option<String>, CredentialError> {
    path.map(|p| {
        p.into_os_string()
            .into_string()
            .map_err(|_| CredentialError::InvalidField {
                field: field.to_string(),
                message: "path is not valid UTF-8".to_string(),
            })
    })
    .transpose()
}
