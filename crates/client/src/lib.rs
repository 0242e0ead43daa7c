//! Authenticated web client.
//!
//! This crate layers pluggable authentication over `reqwest`: credentials
//! (basic auth, x509 client certificates, OAuth2 token exchange), a session
//! that tracks token expiry, and a dispatcher that refreshes the session
//! before each call and attaches the current token.

pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod request;

pub use auth::{AuthResponse, AuthorizationType, Session, TokenSettings};
pub use client::builder::WebClientBuilder;
pub use client::{SharedWebClient, WebClient};
pub use credentials::{
    BasicAuth, BasicAuthCredentials, BasicAuthCredentialsBuilder, ClientIdentity,
    CredentialOptions, CredentialTuning, Credentials, OAuth2Credentials,
    OAuth2CredentialsBuilder, X509Credentials, X509CredentialsBuilder,
};
pub use error::{ClientError, CredentialError, Result};
pub use request::RequestOptions;

pub use reqwest::{Method, Response};
