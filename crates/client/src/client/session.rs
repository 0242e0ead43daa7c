//! Client-level session management.
//!
//! # What this module does NOT handle:
//! - Token storage and expiry arithmetic (handled by [`Session`] in `auth.rs`)
//! - Decorating ordinary requests (handled by `WebClient::call` in `mod.rs`)
//!
//! # Invariants
//! - [`WebClient::generate_session`] requires `&mut self` because it replaces session state
//! - The login exchange never checks the session itself, so it cannot recurse

use chrono::Utc;
use reqwest::Method;
use tracing::{debug, error, info};

use crate::auth::{AuthResponse, Session};
use crate::client::WebClient;
use crate::error::{ClientError, Result};
use crate::request::RequestOptions;

impl WebClient {
    /// Whether the session must be refreshed before the next call.
    pub fn session_expired(&self) -> bool {
        self.session.is_expired(self.token_settings.token_expiry_offset)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Forget all tokens. The next authenticated call logs in again.
    pub fn clear_session(&mut self) {
        self.session.clear();
    }

    /// Perform the login exchange and update the session from its response.
    ///
    /// The credential's transport options fill in anything `options` leaves
    /// unset, and an OAuth2 exchange body is sent form-encoded.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidConfiguration`] if the credential has no login URL.
    /// - [`ClientError::SessionRejected`] if the endpoint answers with a non-2xx status.
    /// - Response parsing errors from [`Session::apply_auth_response`].
    /// - Transport errors from the exchange itself.
    pub async fn generate_session(
        &mut self,
        method: Method,
        options: RequestOptions,
    ) -> Result<()> {
        let login_url = self.login_url.clone().ok_or_else(|| {
            ClientError::InvalidConfiguration("no login URL configured".to_string())
        })?;

        let mut options = options.raise_for_status(false).skip_authentication(true);
        if options.auth.is_none() {
            options.auth = self.credential_options.basic_auth.clone();
        }
        if let Some(body) = &self.credential_body {
            options.json = None;
            options.body = None;
            options.form = Some(body.clone());
        }

        info!(url = %login_url, auth_type = %self.authorization_type, "Generating new session");
        let response = self.dispatch(method, login_url.as_str(), options).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response body".to_string());
            error!(
                status = status.as_u16(),
                body = %body,
                url = %login_url,
                "Unable to generate new session"
            );
            return Err(ClientError::SessionRejected {
                status: status.as_u16(),
                url: login_url.to_string(),
                body,
            });
        }

        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let auth_response = AuthResponse::new(headers, body.to_vec());

        self.session.apply_auth_response(
            self.authorization_type,
            &self.token_settings,
            &auth_response,
            Utc::now(),
        )?;

        debug!(expires_at = %self.session.access_token_expiry(), "Session generated");
        Ok(())
    }
}
