//! Common test utilities for integration tests.
//!
//! # What this does NOT handle
//! - Mock server setup beyond the login endpoint (use wiremock directly in tests)
//! - Test-specific assertions or test logic

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Map, Value};
use wiremock::matchers::{method, path};

#[allow(unused_imports)]
pub use authwire_client::{
    AuthorizationType, BasicAuthCredentials, ClientError, Method, OAuth2Credentials,
    RequestOptions, WebClient, X509Credentials,
};
#[allow(unused_imports)]
pub use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sign `claims` as an HS256 JWT with a key the client never sees.
#[allow(dead_code)]
pub fn jwt(claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"server-side-secret"),
    )
    .unwrap()
}

/// Unwrap a JSON object literal into a map.
#[allow(dead_code)]
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Mount `template` on `POST /login` and count how often it is hit.
#[allow(dead_code)]
pub async fn mount_login(server: &MockServer, template: ResponseTemplate) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(move |_: &wiremock::Request| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            template.clone()
        })
        .mount(server)
        .await;

    count
}

#[allow(dead_code)]
pub fn hits(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Basic credentials pointing at the mock server's `/login`.
#[allow(dead_code)]
pub fn basic_credentials(server: &MockServer) -> BasicAuthCredentials {
    BasicAuthCredentials::builder()
        .username("admin")
        .password("changeme")
        .login_url(format!("{}/login", server.uri()))
        .build()
        .unwrap()
}
