//! Centralized constants for the authwire workspace.
//!
//! This module contains default values used across crates to avoid
//! magic number duplication and improve maintainability.

// =============================================================================
// Session & Token Defaults
// =============================================================================

/// Seconds subtracted from a token's expiry before it is considered usable.
/// This prevents races where a token expires between the check and the
/// request reaching the server.
pub const DEFAULT_TOKEN_EXPIRY_OFFSET_SECS: i64 = 10;

/// Default lifetime of an OAuth2 refresh token in seconds.
///
/// NOTE: 84600 is ~23.5 hours, not the conventional 86400. Kept as the
/// documented default until the intended value is confirmed.
pub const DEFAULT_REFRESH_TOKEN_TIMEOUT_SECS: u64 = 84_600;

/// Expiry claims below this value are relative ("seconds from now"),
/// anything at or above it is an absolute Unix timestamp.
pub const JWT_RELATIVE_EXPIRY_THRESHOLD_SECS: i64 = 44_640;

/// Claims searched, in order, for a JWT expiry value.
pub const JWT_EXPIRY_CLAIMS: [&str; 4] = ["exp", "expiresIn", "expires_in", "expires"];

// =============================================================================
// Connection Defaults
// =============================================================================

/// Default maximum number of HTTP redirects to follow.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Settings key holding transport options merged into every outgoing call.
pub const CLIENT_OPTIONS_KEY: &str = "client_options";

// =============================================================================
// Logging Defaults
// =============================================================================

/// Syslog socket used when a syslog sink names no location.
pub const DEFAULT_SYSLOG_LOCATION: &str = "/dev/log";

/// Process name reported to syslog when a sink names no ident.
pub const DEFAULT_SYSLOG_IDENT: &str = "authwire";

// =============================================================================
// Configuration Discovery
// =============================================================================

/// Suffix of the environment variable pointing at an application's config file.
pub const CONFIG_PATH_ENV_SUFFIX: &str = "_CONFIG_PATH";
