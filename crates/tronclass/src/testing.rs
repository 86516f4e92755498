//! In-process portal double for client and transfer tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use futures_util::StreamExt;
use tku_auth::{Endpoints, Session};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> String {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    }
}

type Responder = Arc<dyn Fn(&Recorded, &str) -> Response + Send + Sync>;

#[derive(Clone)]
pub(crate) struct MockPortal {
    pub base: String,
    hits: Arc<Mutex<Vec<Recorded>>>,
    responder: Responder,
}

impl MockPortal {
    /// Serve every request with `responder`, which also receives the mock's
    /// base URL for building absolute links.
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Recorded, &str) -> Response + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mock = Self {
            base: format!("http://{addr}"),
            hits: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        };
        let app = axum::Router::new()
            .fallback(handle)
            .with_state(mock.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        mock
    }

    pub fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().unwrap().clone()
    }
}

async fn handle(State(mock): State<MockPortal>, request: Request<Body>) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("").to_string();
    let headers = request.headers().clone();
    let body = axum::body::to_bytes(request.into_body(), 16 * 1024 * 1024)
        .await
        .unwrap()
        .to_vec();
    let hit = Recorded {
        method,
        path,
        query,
        headers,
        body,
    };
    let response = (mock.responder)(&hit, &mock.base);
    mock.hits.lock().unwrap().push(hit);
    response
}

/// Anonymous session pointed at a mock portal.
pub(crate) fn session_for(base: &str) -> Session {
    session_with_timeout(base, Duration::from_secs(5))
}

pub(crate) fn session_with_timeout(base: &str, timeout: Duration) -> Session {
    Session::anonymous(Endpoints::new(base, base), timeout).unwrap()
}

/// Response body yielding `chunks` with `gap` before each one. An `Err`
/// chunk aborts the connection mid-body.
pub(crate) fn trickle(chunks: Vec<std::io::Result<Bytes>>, gap: Duration) -> Body {
    Body::from_stream(futures_util::stream::iter(chunks).then(move |chunk| async move {
        tokio::time::sleep(gap).await;
        chunk
    }))
}
