//! Authenticated web client.
//!
//! [`WebClient`] wraps a `reqwest::Client` and layers session handling over
//! every request: check the session, log in when it is stale, attach the
//! access token, merge configured defaults, then send.
//!
//! # Submodules
//! - [`builder`]: Client construction and configuration
//! - `session`: Login exchange and session inspection (private module)
//!
//! # What this module does NOT handle:
//! - Parsing login responses (delegated to [`crate::auth::Session`])
//! - Retrying failed requests. Every error propagates to the caller.
//!
//! # Invariants
//! - `call` takes `&mut self` because it may refresh the session
//! - An explicit `Authorization` header or `auth` option is never overwritten,
//!   whether passed by the caller or configured in `client_options`
//! - Only the login exchange reads response bodies

pub mod builder;
mod session;

use std::sync::Arc;

use authwire_config::Settings;
use reqwest::{Method, Response};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::auth::{AuthorizationType, Session, TokenSettings};
use crate::credentials::CredentialOptions;
use crate::error::{ClientError, Result};
use crate::request::RequestOptions;

/// A client shared between tasks. The mutex serializes session refreshes so
/// concurrent callers trigger at most one login exchange per stale session.
pub type SharedWebClient = Arc<Mutex<WebClient>>;

/// HTTP client with pluggable authentication.
///
/// # Creating a Client
///
/// ```rust,ignore
/// use authwire_client::{AuthorizationType, BasicAuthCredentials, WebClient};
///
/// let credentials = BasicAuthCredentials::builder()
///     .username("admin")
///     .password("changeme")
///     .login_url("https://auth.example.com/login")
///     .build()?;
///
/// let mut client = WebClient::builder()
///     .authorization_type(AuthorizationType::Bearer)
///     .credentials(credentials)
///     .build()?;
///
/// let response = client
///     .call(Method::GET, "https://api.example.com/items", RequestOptions::new())
///     .await?;
/// ```
pub struct WebClient {
    pub(crate) http: reqwest::Client,
    pub(crate) authorization_type: AuthorizationType,
    pub(crate) credential_options: CredentialOptions,
    pub(crate) login_url: Option<Url>,
    pub(crate) credential_body: Option<Map<String, Value>>,
    pub(crate) settings: Settings,
    pub(crate) token_settings: TokenSettings,
    pub(crate) client_options: RequestOptions,
    pub(crate) session: Session,
}

impl WebClient {
    /// Create a new client builder.
    pub fn builder() -> builder::WebClientBuilder {
        builder::WebClientBuilder::new()
    }

    pub fn authorization_type(&self) -> AuthorizationType {
        self.authorization_type
    }

    /// The settings snapshot captured at construction.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn token_settings(&self) -> &TokenSettings {
        &self.token_settings
    }

    pub fn login_url(&self) -> Option<&Url> {
        self.login_url.as_ref()
    }

    /// Wrap the client for use from several tasks.
    pub fn into_shared(self) -> SharedWebClient {
        Arc::new(Mutex::new(self))
    }

    /// Send a request, refreshing the session first when it is stale.
    ///
    /// When a login URL is configured and `options.skip_authentication` is
    /// unset, an expired session triggers a login exchange before the request
    /// is sent. A failed exchange aborts the call.
    ///
    /// # Errors
    ///
    /// - Session errors from the login exchange ([`ClientError::SessionRejected`],
    ///   [`ClientError::AuthFailed`], [`ClientError::AuthorizationFailed`]).
    /// - Transport errors ([`ClientError::Timeout`], [`ClientError::Connection`],
    ///   [`ClientError::Transport`]).
    /// - [`ClientError::HttpError`] for non-2xx responses when
    ///   `options.raise_for_status` is set.
    pub async fn call(
        &mut self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        if !options.skip_authentication && self.login_url.is_some() && self.session_expired() {
            debug!(url, "Session expired, generating new session before call");
            self.generate_session(Method::POST, RequestOptions::default()).await?;
        }

        self.dispatch(method, url, options).await
    }

    /// Attach authorization to `options` unless they already carry some.
    ///
    /// Expects `options` already merged over `client_options`, so configured
    /// credentials count as explicit.
    fn authorize(&self, mut options: RequestOptions) -> RequestOptions {
        if options.has_authorization() || self.authorization_type == AuthorizationType::None {
            return options;
        }

        if let Some(token) = self.session.access_token() {
            let bearer = format!("Bearer {}", token.expose_secret());
            options.headers.insert("Authorization".to_string(), bearer);
        } else if self.authorization_type == AuthorizationType::Basic {
            options.auth = self.credential_options.basic_auth.clone();
        }
        options
    }

    /// Send without consulting the session.
    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let target = Url::parse(url).map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}")))?;
        let options = self.authorize(options.merged_over(&self.client_options));
        let raise_for_status = options.raise_for_status;

        debug!(%method, url = %target, "Sending request");
        let request = options.apply(self.http.request(method.clone(), target));

        let response = request.send().await.map_err(|e| {
            let error = ClientError::from(e);
            tracing::error!(%method, url, error = %error, "Request failed");
            error
        })?;

        debug!(status = response.status().as_u16(), url, "Received response");

        if raise_for_status {
            return response.error_for_status().map_err(ClientError::from);
        }
        Ok(response)
    }
}

impl std::fmt::Debug for WebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebClient")
            .field("authorization_type", &self.authorization_type)
            .field("login_url", &self.login_url.as_ref().map(Url::as_str))
            .field("has_credential_body", &self.credential_body.is_some())
            .field("token_settings", &self.token_settings)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
