//! Session and token lifecycle.
//!
//! Responsibilities:
//! - Track the current access token, refresh token and their expiry instants.
//! - Decide when the session is stale (expired or within the safety offset).
//! - Parse login-exchange responses into session updates.
//!
//! Does NOT handle:
//! - Performing the login exchange (see [`crate::client::WebClient::generate_session`]).
//! - Verifying token signatures.
//!
//! Invariants:
//! - A session without an access token is always expired.
//! - Token values never appear in `Debug` output.

use std::fmt;
use std::str::FromStr;

use authwire_config::constants::{
    DEFAULT_REFRESH_TOKEN_TIMEOUT_SECS, DEFAULT_TOKEN_EXPIRY_OFFSET_SECS,
};
use authwire_config::{ConfigError, Settings};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credentials::CredentialTuning;
use crate::error::{ClientError, Result};
use crate::jwt::jwt_expiry;

/// How outgoing requests are decorated and login responses interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationType {
    #[default]
    None,
    Basic,
    Bearer,
    Jwt,
    #[serde(rename = "oauth2")]
    OAuth2,
}

impl AuthorizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::Bearer => "bearer",
            Self::Jwt => "jwt",
            Self::OAuth2 => "oauth2",
        }
    }

    /// Whether login responses for this type carry a JWT whose claims set the expiry.
    fn reads_jwt_expiry(&self) -> bool {
        matches!(self, Self::Jwt | Self::Bearer)
    }
}

impl fmt::Display for AuthorizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationType {
    type Err = ClientError;

    /// Accepts names case-insensitively, or the numeric values 0 through 4.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(Self::None),
            "basic" | "1" => Ok(Self::Basic),
            "bearer" | "2" => Ok(Self::Bearer),
            "jwt" | "3" => Ok(Self::Jwt),
            "oauth2" | "4" => Ok(Self::OAuth2),
            other => Err(ClientError::AuthorizationFailed(format!(
                "unknown authorization-type value: {other}"
            ))),
        }
    }
}

/// Token lifetime settings resolved at client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    /// Seconds before expiry at which a token is treated as stale.
    pub token_expiry_offset: i64,
    /// Response header that must carry the access token, if configured.
    pub access_token_header: Option<String>,
    /// Fixed access-token lifetime in seconds. Zero defers to the server.
    pub access_token_timeout: u64,
    /// Refresh-token lifetime in seconds.
    pub refresh_token_timeout: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            token_expiry_offset: DEFAULT_TOKEN_EXPIRY_OFFSET_SECS,
            access_token_header: None,
            access_token_timeout: 0,
            refresh_token_timeout: DEFAULT_REFRESH_TOKEN_TIMEOUT_SECS,
        }
    }
}

impl TokenSettings {
    /// Resolve from the client's settings, falling back to the credential's
    /// tuning and then to built-in defaults.
    pub fn from_settings(
        settings: &Settings,
        tuning: &CredentialTuning,
    ) -> std::result::Result<Self, ConfigError> {
        let defaults = Self::default();

        let token_expiry_offset = match settings.get("token_expiry_offset") {
            None | Some(Value::Null) => tuning
                .token_expiry_offset
                .unwrap_or(defaults.token_expiry_offset),
            Some(_) => settings
                .get_i64("token_expiry_offset")
                .ok_or_else(|| ConfigError::InvalidType {
                    key: "token_expiry_offset".to_string(),
                    expected: "integer",
                })?,
        };

        let access_token_header = match settings.get("access_token_header") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(ConfigError::InvalidType {
                    key: "access_token_header".to_string(),
                    expected: "string",
                });
            }
        };

        let unsigned = |key: &str, fallback: u64| match settings.get(key) {
            None | Some(Value::Null) => Ok(fallback),
            Some(_) => settings.get_u64(key).ok_or_else(|| ConfigError::InvalidType {
                key: key.to_string(),
                expected: "non-negative integer",
            }),
        };

        Ok(Self {
            token_expiry_offset,
            access_token_header,
            access_token_timeout: unsigned(
                "access_token_timeout",
                tuning.access_token_timeout.unwrap_or(defaults.access_token_timeout),
            )?,
            refresh_token_timeout: unsigned(
                "refresh_token_timeout",
                tuning.refresh_token_timeout.unwrap_or(defaults.refresh_token_timeout),
            )?,
        })
    }
}

/// Headers and body read from a successful login exchange.
#[derive(Debug, Clone, Default)]
pub struct AuthResponse {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl AuthResponse {
    pub fn new(headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }
}

/// Token state owned by a client.
#[derive(Clone)]
pub struct Session {
    access_token: Option<SecretString>,
    access_token_expiry: DateTime<Utc>,
    refresh_token: Option<SecretString>,
    refresh_token_expiry: Option<DateTime<Utc>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An empty session whose expiry is the current instant.
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    pub fn new_at(now: DateTime<Utc>) -> Self {
        Self {
            access_token: None,
            access_token_expiry: now,
            refresh_token: None,
            refresh_token_expiry: None,
        }
    }

    pub fn access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref()
    }

    pub fn access_token_expiry(&self) -> DateTime<Utc> {
        self.access_token_expiry
    }

    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    pub fn refresh_token_expiry(&self) -> Option<DateTime<Utc>> {
        self.refresh_token_expiry
    }

    /// Store an access token, dropping a leading `Bearer ` prefix.
    /// An empty value clears the token.
    pub fn set_access_token(&mut self, token: &str) {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        self.access_token = (!token.is_empty()).then(|| SecretString::new(token.into()));
    }

    pub fn set_access_token_expiry(&mut self, expiry: DateTime<Utc>) {
        self.access_token_expiry = expiry;
    }

    pub fn set_refresh_token(&mut self, token: &str, expiry: DateTime<Utc>) {
        self.refresh_token = (!token.is_empty()).then(|| SecretString::new(token.into()));
        self.refresh_token_expiry = Some(expiry);
    }

    /// Forget all tokens.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Whether the session must be refreshed before a call at `now`.
    pub fn session_expired_at(&self, now: DateTime<Utc>, offset_secs: i64) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        after(now, offset_secs) >= self.access_token_expiry
    }

    pub fn is_expired(&self, offset_secs: i64) -> bool {
        self.session_expired_at(Utc::now(), offset_secs)
    }

    /// Update the session from a login-exchange response.
    ///
    /// Rules apply in order and may all fire:
    /// 1. An `Authorization` response header becomes the access token.
    /// 2. A configured `access_token_header` overrides it, and must be present.
    /// 3. For OAuth2 the JSON body supplies `access_token` (with `expires_in`
    ///    or the configured timeout) and `refresh_token`.
    /// 4. For JWT and bearer types the token's claims set the expiry, which
    ///    must not already be in the past.
    pub fn apply_auth_response(
        &mut self,
        auth_type: AuthorizationType,
        settings: &TokenSettings,
        response: &AuthResponse,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(value) = response.headers.get(AUTHORIZATION) {
            self.set_access_token(header_str(value, "Authorization")?);
        }

        if let Some(name) = &settings.access_token_header {
            match response.headers.get(name.as_str()) {
                Some(value) => self.set_access_token(header_str(value, name)?),
                None => {
                    tracing::error!(
                        header = %name,
                        received = ?response.headers.keys().collect::<Vec<_>>(),
                        "Unable to find access token header in response headers"
                    );
                    return Err(ClientError::AuthFailed(
                        "Unable to find configured access token header".to_string(),
                    ));
                }
            }
        }

        if auth_type == AuthorizationType::OAuth2 {
            self.apply_oauth2_body(settings, &response.body, now)?;
        }

        if auth_type.reads_jwt_expiry() {
            let token = self.access_token.as_ref().ok_or_else(|| {
                ClientError::AuthorizationFailed("JWT access token could not be set".to_string())
            })?;
            let expiry = jwt_expiry(token.expose_secret(), now)?.ok_or_else(|| {
                ClientError::AuthorizationFailed(
                    "JWT access token carries no expiry claim".to_string(),
                )
            })?;
            self.access_token_expiry = expiry;
            if expiry < now {
                return Err(ClientError::AuthorizationFailed(
                    "JWT access token expired or could not be set".to_string(),
                ));
            }
        }

        tracing::debug!(
            auth_type = %auth_type,
            has_access_token = self.access_token.is_some(),
            has_refresh_token = self.refresh_token.is_some(),
            expires_at = %self.access_token_expiry,
            "Session updated from login response"
        );
        Ok(())
    }

    fn apply_oauth2_body(
        &mut self,
        settings: &TokenSettings,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let data: Value = serde_json::from_slice(body)
            .map_err(|e| ClientError::AuthFailed(format!("invalid OAuth2 token response: {e}")))?;
        let Value::Object(data) = data else {
            return Err(ClientError::AuthFailed(
                "OAuth2 token response is not a JSON object".to_string(),
            ));
        };

        if let Some(token) = data.get("access_token") {
            let token = token.as_str().ok_or_else(|| {
                ClientError::AuthFailed("OAuth2 access_token is not a string".to_string())
            })?;
            self.set_access_token(token);

            let lifetime = if settings.access_token_timeout == 0 {
                data.get("expires_in").and_then(seconds_value).ok_or_else(|| {
                    ClientError::AuthFailed(
                        "OAuth2 token response has no usable expires_in".to_string(),
                    )
                })?
            } else {
                i64::try_from(settings.access_token_timeout).unwrap_or(i64::MAX)
            };
            self.access_token_expiry = after(now, lifetime);
        }

        if let Some(token) = data.get("refresh_token") {
            let token = token.as_str().ok_or_else(|| {
                ClientError::AuthFailed("OAuth2 refresh_token is not a string".to_string())
            })?;
            let lifetime = i64::try_from(settings.refresh_token_timeout).unwrap_or(i64::MAX);
            self.set_refresh_token(token, after(now, lifetime));
        }

        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_access_token", &self.access_token.is_some())
            .field("access_token_expiry", &self.access_token_expiry)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .finish()
    }
}

fn header_str<'a>(value: &'a reqwest::header::HeaderValue, name: &str) -> Result<&'a str> {
    value
        .to_str()
        .map_err(|_| ClientError::AuthFailed(format!("{name} header is not valid text")))
}

fn seconds_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `now + secs`, saturating at the representable range.
pub(crate) fn after(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    Duration::try_seconds(secs)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(if secs < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::test_support::token_with_claims;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_authorization_type_from_str() {
        assert_eq!("JWT".parse::<AuthorizationType>().unwrap(), AuthorizationType::Jwt);
        assert_eq!("OAuth2".parse::<AuthorizationType>().unwrap(), AuthorizationType::OAuth2);
        assert_eq!("2".parse::<AuthorizationType>().unwrap(), AuthorizationType::Bearer);
        let err = "kerberos".parse::<AuthorizationType>().unwrap_err();
        assert!(matches!(err, ClientError::AuthorizationFailed(_)));
    }

    #[test]
    fn test_authorization_type_serde_lowercase() {
        let parsed: AuthorizationType = serde_json::from_value(json!("oauth2")).unwrap();
        assert_eq!(parsed, AuthorizationType::OAuth2);
        assert_eq!(serde_json::to_value(AuthorizationType::Bearer).unwrap(), json!("bearer"));
    }

    #[test]
    fn test_new_session_is_expired() {
        let session = Session::new_at(fixed_now());
        assert!(session.session_expired_at(fixed_now(), 10));
        assert!(session.access_token().is_none());
    }

    #[test]
    fn test_session_valid_then_stale_within_offset() {
        let now = fixed_now();
        let mut session = Session::new_at(now);
        session.set_access_token("abc123");
        session.set_access_token_expiry(now + Duration::seconds(3600));

        assert!(!session.session_expired_at(now, 10));
        assert!(!session.session_expired_at(now + Duration::seconds(3589), 10));
        assert!(session.session_expired_at(now + Duration::seconds(3590), 10));
        assert!(session.session_expired_at(now + Duration::seconds(3600), 0));
    }

    #[test]
    fn test_authorization_header_prefix_stripped() {
        let mut session = Session::new_at(fixed_now());
        let response = AuthResponse::new(headers(&[("authorization", "Bearer abc123")]), "");
        session
            .apply_auth_response(
                AuthorizationType::None,
                &TokenSettings::default(),
                &response,
                fixed_now(),
            )
            .unwrap();
        assert_eq!(session.access_token().unwrap().expose_secret(), "abc123");
    }

    #[test]
    fn test_configured_header_overrides_authorization() {
        let mut session = Session::new_at(fixed_now());
        let settings = TokenSettings {
            access_token_header: Some("X-Auth-Token".to_string()),
            ..TokenSettings::default()
        };
        let response = AuthResponse::new(
            headers(&[("authorization", "Bearer first"), ("x-auth-token", "second")]),
            "",
        );
        session
            .apply_auth_response(AuthorizationType::Basic, &settings, &response, fixed_now())
            .unwrap();
        assert_eq!(session.access_token().unwrap().expose_secret(), "second");
    }

    #[test]
    fn test_configured_header_missing_is_auth_error() {
        let mut session = Session::new_at(fixed_now());
        let settings = TokenSettings {
            access_token_header: Some("X-Auth-Token".to_string()),
            ..TokenSettings::default()
        };
        let response = AuthResponse::new(headers(&[("authorization", "Bearer abc")]), "");
        let err = session
            .apply_auth_response(AuthorizationType::Basic, &settings, &response, fixed_now())
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthFailed(_)));
    }

    #[test]
    fn test_oauth2_body_sets_tokens_and_expiry() {
        let now = fixed_now();
        let mut session = Session::new_at(now);
        let body = json!({"access_token": "t1", "refresh_token": "r1", "expires_in": 120});
        let response = AuthResponse::new(HeaderMap::new(), body.to_string());

        session
            .apply_auth_response(
                AuthorizationType::OAuth2,
                &TokenSettings::default(),
                &response,
                now,
            )
            .unwrap();

        assert_eq!(session.access_token().unwrap().expose_secret(), "t1");
        assert_eq!(session.access_token_expiry(), now + Duration::seconds(120));
        assert_eq!(session.refresh_token().unwrap().expose_secret(), "r1");
        // 84600, not 86400: the documented refresh default.
        assert_eq!(
            session.refresh_token_expiry(),
            Some(now + Duration::seconds(84_600))
        );
    }

    #[test]
    fn test_oauth2_timeout_override() {
        let now = fixed_now();
        let mut session = Session::new_at(now);
        let settings = TokenSettings {
            access_token_timeout: 900,
            refresh_token_timeout: 1800,
            ..TokenSettings::default()
        };
        let body = json!({"access_token": "t1", "refresh_token": "r1", "expires_in": 120});
        let response = AuthResponse::new(HeaderMap::new(), body.to_string());

        session
            .apply_auth_response(AuthorizationType::OAuth2, &settings, &response, now)
            .unwrap();

        assert_eq!(session.access_token_expiry(), now + Duration::seconds(900));
        assert_eq!(session.refresh_token_expiry(), Some(now + Duration::seconds(1800)));
    }

    #[test]
    fn test_oauth2_refresh_only_response() {
        let now = fixed_now();
        let mut session = Session::new_at(now);
        let response = AuthResponse::new(HeaderMap::new(), r#"{"refresh_token": "r2"}"#);
        session
            .apply_auth_response(
                AuthorizationType::OAuth2,
                &TokenSettings::default(),
                &response,
                now,
            )
            .unwrap();
        assert!(session.access_token().is_none());
        assert!(session.refresh_token().is_some());
    }

    #[test]
    fn test_oauth2_malformed_body_is_auth_error() {
        let mut session = Session::new_at(fixed_now());
        let response = AuthResponse::new(HeaderMap::new(), "<html>oops</html>");
        let err = session
            .apply_auth_response(
                AuthorizationType::OAuth2,
                &TokenSettings::default(),
                &response,
                fixed_now(),
            )
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthFailed(_)));
    }

    #[test]
    fn test_oauth2_missing_expires_in_is_auth_error() {
        let mut session = Session::new_at(fixed_now());
        let response = AuthResponse::new(HeaderMap::new(), r#"{"access_token": "t1"}"#);
        let err = session
            .apply_auth_response(
                AuthorizationType::OAuth2,
                &TokenSettings::default(),
                &response,
                fixed_now(),
            )
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthFailed(_)));
    }

    #[test]
    fn test_jwt_relative_and_absolute_expiry() {
        let now = fixed_now();
        let mut session = Session::new_at(now);
        let token = token_with_claims(&json!({"exp": 30}));
        let bearer = format!("Bearer {token}");
        let response = AuthResponse::new(headers(&[("authorization", bearer.as_str())]), "");
        session
            .apply_auth_response(AuthorizationType::Jwt, &TokenSettings::default(), &response, now)
            .unwrap();
        assert_eq!(session.access_token_expiry(), now + Duration::seconds(30));

        let absolute = now.timestamp() + 600;
        let token = token_with_claims(&json!({"exp": absolute}));
        let response = AuthResponse::new(headers(&[("authorization", token.as_str())]), "");
        let settings = TokenSettings::default();
        session
            .apply_auth_response(AuthorizationType::Bearer, &settings, &response, now)
            .unwrap();
        assert_eq!(session.access_token_expiry().timestamp(), absolute);
    }

    #[test]
    fn test_jwt_expired_on_receipt_is_authorization_error() {
        let now = fixed_now();
        let mut session = Session::new_at(now);
        let token = token_with_claims(&json!({"exp": 50000}));
        let response = AuthResponse::new(headers(&[("authorization", token.as_str())]), "");
        let err = session
            .apply_auth_response(AuthorizationType::Jwt, &TokenSettings::default(), &response, now)
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthorizationFailed(_)));
        assert_eq!(session.access_token_expiry().timestamp(), 50000);
    }

    #[test]
    fn test_jwt_without_token_is_authorization_error() {
        let mut session = Session::new_at(fixed_now());
        let err = session
            .apply_auth_response(
                AuthorizationType::Jwt,
                &TokenSettings::default(),
                &AuthResponse::default(),
                fixed_now(),
            )
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthorizationFailed(_)));
    }

    #[test]
    fn test_token_settings_precedence() {
        let tuning = CredentialTuning {
            access_token_timeout: Some(300),
            refresh_token_timeout: Some(600),
            token_expiry_offset: Some(5),
        };
        let settings = Settings::from_value(json!({
            "token_expiry_offset": 30,
            "access_token_header": "X-Token"
        }))
        .unwrap();

        let resolved = TokenSettings::from_settings(&settings, &tuning).unwrap();
        assert_eq!(resolved.token_expiry_offset, 30);
        assert_eq!(resolved.access_token_header.as_deref(), Some("X-Token"));
        assert_eq!(resolved.access_token_timeout, 300);
        assert_eq!(resolved.refresh_token_timeout, 600);

        let defaults =
            TokenSettings::from_settings(&Settings::default(), &CredentialTuning::default())
                .unwrap();
        assert_eq!(defaults, TokenSettings::default());
        assert_eq!(defaults.refresh_token_timeout, 84_600);
    }

    #[test]
    fn test_debug_does_not_leak_tokens() {
        let mut session = Session::new_at(fixed_now());
        session.set_access_token("super-secret-token");
        session.set_refresh_token("super-secret-refresh", fixed_now());
        let debug_output = format!("{session:?}");
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("has_access_token: true"));
    }
}
