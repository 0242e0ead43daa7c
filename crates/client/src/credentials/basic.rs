//! Username/password credentials.

use authwire_config::Settings;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{BasicAuth, CredentialOptions, ExplicitFields, required_string, unify, url_field};
use crate::error::CredentialError;

const REQUIRED_FIELDS: &[&str] = &["username", "password"];

/// HTTP basic-auth credentials with an optional login endpoint.
#[derive(Clone)]
pub struct BasicAuthCredentials {
    username: String,
    password: SecretString,
    login_url: Option<Url>,
}

impl BasicAuthCredentials {
    pub fn builder() -> BasicAuthCredentialsBuilder {
        BasicAuthCredentialsBuilder::default()
    }

    /// Construct from a settings fragment holding `username`, `password` and
    /// an optional `login_url`.
    pub fn from_settings(settings: Settings) -> Result<Self, CredentialError> {
        Self::builder().settings(settings).build()
    }

    fn from_unified(settings: &Settings) -> Result<Self, CredentialError> {
        Ok(Self {
            username: required_string(settings, "username")?,
            password: SecretString::new(required_string(settings, "password")?.into()),
            login_url: url_field(settings, "login_url")?,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn login_url(&self) -> Option<&Url> {
        self.login_url.as_ref()
    }

    pub fn basic_auth(&self) -> BasicAuth {
        BasicAuth {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn options(&self) -> CredentialOptions {
        CredentialOptions {
            basic_auth: Some(self.basic_auth()),
            client_identity: None,
        }
    }
}

impl std::fmt::Debug for BasicAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("login_url", &self.login_url.as_ref().map(Url::as_str))
            .finish()
    }
}

/// Builder for [`BasicAuthCredentials`].
#[derive(Default)]
pub struct BasicAuthCredentialsBuilder {
    username: Option<String>,
    password: Option<SecretString>,
    login_url: Option<String>,
    settings: Option<Settings>,
}

impl BasicAuthCredentialsBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        let password: String = password.into();
        self.password = Some(SecretString::from(password));
        self
    }

    pub fn login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = Some(login_url.into());
        self
    }

    /// Supply the whole configuration as a settings fragment instead of
    /// individual fields.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Validate and build the credentials.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::MultipleSources`] if fields and settings were both supplied.
    /// - [`CredentialError::MissingFields`] if `username` or `password` is absent.
    /// - [`CredentialError::InvalidUrl`] if `login_url` is not an absolute URL.
    pub fn build(self) -> Result<BasicAuthCredentials, CredentialError> {
        let mut explicit = ExplicitFields::default();
        explicit.string("username", self.username);
        explicit.string(
            "password",
            self.password.map(|p| p.expose_secret().to_string()),
        );
        explicit.string("login_url", self.login_url);

        let unified = unify(explicit, false, self.settings, REQUIRED_FIELDS)?;
        BasicAuthCredentials::from_unified(&unified)
    }
}
