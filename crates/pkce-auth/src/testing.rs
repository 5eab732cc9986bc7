//! Shared fixtures for unit tests: a mock token endpoint and unsigned ID
//! tokens.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Form, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::routing::post;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Url;

use crate::flow::{AuthorizationAttempt, ClientConfig};

/// What the mock saw on its last request.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub form: HashMap<String, String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: String,
    hits: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<RecordedRequest>>>,
}

/// Token endpoint on 127.0.0.1 that answers every POST with a canned
/// status and body and records the form it received.
pub(crate) struct MockTokenEndpoint {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<RecordedRequest>>>,
}

impl MockTokenEndpoint {
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(None));
        let state = MockState {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.into(),
            hits: hits.clone(),
            last: last.clone(),
        };

        let app = Router::new()
            .route("/token", post(token_handler))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits, last }
    }

    pub fn url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last.lock().unwrap().clone()
    }
}

async fn token_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, [(HeaderName, &'static str); 1], String) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    *state.last.lock().unwrap() = Some(RecordedRequest {
        form,
        accept: header(ACCEPT),
        content_type: header(CONTENT_TYPE),
    });
    (
        state.status,
        [(CONTENT_TYPE, "application/json")],
        state.body.clone(),
    )
}

/// Confidential client pointed at `token_url`.
pub(crate) fn test_config(token_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(
        "test-client",
        "http://localhost:8080/oauth/callback",
        Url::parse("https://accounts.example.com/o/oauth2/v2/auth").unwrap(),
        Url::parse(token_url).unwrap(),
    );
    config.client_secret = Some("test-secret".to_string().into());
    config
}

pub(crate) fn test_attempt(token_url: &str) -> AuthorizationAttempt {
    AuthorizationAttempt::new(Arc::new(test_config(token_url))).unwrap()
}

/// Unsigned JWT with the given payload.
pub(crate) fn unsigned_id_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Token endpoint body carrying an ID token for `audience` that is valid
/// for the next hour.
pub(crate) fn token_body_for(audience: &str) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let id_token = unsigned_id_token(&serde_json::json!({
        "iss": "https://accounts.example.com",
        "sub": "110169484474386276334",
        "aud": audience,
        "exp": now + 3600,
        "iat": now - 5,
        "email": "ada@example.com",
        "email_verified": true,
    }));
    serde_json::json!({
        "access_token": "ya29.a0AfH6SMBx",
        "token_type": "Bearer",
        "expires_in": 3599,
        "scope": "openid email profile",
        "id_token": id_token,
    })
    .to_string()
}
