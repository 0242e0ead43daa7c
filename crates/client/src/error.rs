//! Error types for credentials and the web client.

use std::path::PathBuf;

use authwire_config::ConfigError;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while constructing credentials.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Both explicit fields and a settings fragment were supplied.
    #[error(
        "Multiple configuration sources used, pass explicit fields OR a settings fragment"
    )]
    MultipleSources,

    /// Required fields were absent or empty.
    #[error("Missing credential configuration: {0}")]
    MissingFields(#[source] ConfigError),

    /// A URL field did not parse as an absolute URL with a host.
    #[error("Validation failed for URL in {field}: {value}")]
    InvalidUrl { field: String, value: String },

    /// The certificate file is missing, empty or unreadable.
    #[error("Certificate file error: {}", .0.display())]
    CertificateFile(PathBuf),

    /// The private key file is missing, empty or unreadable.
    #[error("Key file error: {}", .0.display())]
    KeyFile(PathBuf),

    /// A field was present but had the wrong shape.
    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },
}

/// Errors that can occur during web client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Client construction received conflicting or invalid options.
    #[error("Invalid client configuration: {0}")]
    InvalidConfiguration(String),

    /// The login exchange response could not be turned into a session.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The login endpoint answered with a non-2xx status.
    #[error("Unable to generate new session: [{status}] {body} @ {url}")]
    SessionRejected {
        status: u16,
        url: String,
        body: String,
    },

    /// Unknown authorization type, or a token that cannot be used.
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Non-2xx status raised on request.
    #[error("HTTP error: {0}")]
    HttpError(#[source] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Redirect loop or too many redirects.
    #[error("Connection error: {0}")]
    Connection(#[source] reqwest::Error),

    /// Any other transport failure.
    #[error("Client error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    TlsError(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_status() {
            Self::HttpError(error)
        } else if error.is_timeout() {
            Self::Timeout(error)
        } else if error.is_redirect() {
            Self::Connection(error)
        } else {
            Self::Transport(error)
        }
    }
}

impl ClientError {
    /// Check if this error came from session or token handling.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed(_) | Self::SessionRejected { .. } | Self::AuthorizationFailed(_)
        )
    }

    /// Check if this error came from the HTTP transport.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::Timeout(_) | Self::Connection(_) | Self::Transport(_)
        )
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SessionRejected { status, .. } => Some(*status),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
