use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::IntoResponse;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Clone)]
struct StubState {
    routes: Arc<HashMap<String, StubResponse>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

/// Local HTTP server answering fixed bodies by request path. Unknown paths
/// get a 404.
pub struct HttpStub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<(String, String)>>>,
    handle: JoinHandle<()>,
}

impl HttpStub {
    pub async fn start(routes: Vec<(&str, StubResponse)>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = StubState {
            routes: Arc::new(
                routes
                    .into_iter()
                    .map(|(path, response)| (path.to_string(), response))
                    .collect(),
            ),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let requests = state.requests.clone();

        let app = Router::new().fallback(answer).with_state(state);
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            requests,
            handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `(path, body)` of every request received so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn answer(State(stub): State<StubState>, uri: Uri, body: String) -> impl IntoResponse {
    let path = uri.path().to_string();
    stub.requests.lock().unwrap().push((path.clone(), body));

    let response = stub.routes.get(&path).cloned().unwrap_or(StubResponse {
        status: 404,
        body: "{}".to_string(),
    });
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
}
