//! In-process WHIP/WHEP endpoint that records every request it receives.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const ANSWER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=answer\r\nt=0 0\r\n";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Behaviour {
    pub status: StatusCode,
    pub location: Option<String>,
    pub links: Vec<String>,
    pub answer: String,
    /// Park the offer response until [`FakeEndpoint::release_offer`].
    pub hold_offer: bool,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            status: StatusCode::CREATED,
            location: Some("/session/abc123".to_string()),
            links: Vec::new(),
            answer: ANSWER_SDP.to_string(),
            hold_offer: false,
        }
    }
}

struct EndpointState {
    behaviour: Behaviour,
    requests: Mutex<Vec<Recorded>>,
    offer_received: Notify,
    release: Notify,
}

pub struct FakeEndpoint {
    pub base: String,
    state: Arc<EndpointState>,
}

impl FakeEndpoint {
    pub async fn start(behaviour: Behaviour) -> Self {
        let state = Arc::new(EndpointState {
            behaviour,
            requests: Mutex::new(Vec::new()),
            offer_received: Notify::new(),
            release: Notify::new(),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_with(&self, method: Method) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    pub fn patches(&self) -> Vec<Recorded> {
        self.requests_with(Method::PATCH)
    }

    pub async fn offer_received(&self) {
        self.state.offer_received.notified().await;
    }

    pub fn release_offer(&self) {
        self.state.release.notify_one();
    }

    /// Poll until `n` PATCH requests have arrived.
    pub async fn wait_for_patches(&self, n: usize) -> Vec<Recorded> {
        wait_until(|| self.patches().len() >= n).await;
        self.patches()
    }
}

async fn handle(
    State(state): State<Arc<EndpointState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        content_type: header_text(header::CONTENT_TYPE),
        authorization: header_text(header::AUTHORIZATION),
        body,
    });

    if method == Method::PATCH {
        return StatusCode::NO_CONTENT.into_response();
    }
    if method == Method::DELETE {
        return StatusCode::OK.into_response();
    }
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    state.offer_received.notify_one();
    let behaviour = &state.behaviour;
    if behaviour.hold_offer {
        state.release.notified().await;
    }

    let mut response = Response::builder()
        .status(behaviour.status)
        .body(Body::from(behaviour.answer.clone()))
        .unwrap();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/sdp"));
    if let Some(location) = &behaviour.location {
        headers.insert(header::LOCATION, HeaderValue::from_str(location).unwrap());
    }
    for link in &behaviour.links {
        headers.append(header::LINK, HeaderValue::from_str(link).unwrap());
    }
    response
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
