//! Loopback HTTP server standing in for the portal in tests.
//!
//! Each request is answered with the next scripted response. Once the script
//! runs out the last response is repeated.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A scripted answer to one request.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Reply with a status and a JSON body.
    Json { status: u16, body: String },
    /// Hold the request for `Duration` before answering with an empty list.
    Hang(Duration),
}

impl MockResponse {
    /// A `200 OK` with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        MockResponse::Json {
            status: 200,
            body: body.into(),
        }
    }

    /// An error status with a small JSON body.
    pub fn status(status: u16) -> Self {
        MockResponse::Json {
            status,
            body: format!(r#"{{"error_code":"MockError","status":{}}}"#, status),
        }
    }
}

/// Script and request log shared with connection tasks.
#[derive(Debug)]
struct Shared {
    script: Vec<MockResponse>,
    requests: Mutex<Vec<String>>,
}

impl Shared {
    /// Log a request and pick its scripted answer.
    fn next(&self, request: String) -> MockResponse {
        let mut requests = self.requests.lock();
        let served = requests.len();
        requests.push(request);
        self.script
            .get(served)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(|| MockResponse::ok("[]"))
    }
}

/// A running mock server.
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Bind to an ephemeral loopback port and start answering.
    pub async fn start(script: Vec<MockResponse>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            script,
            requests: Mutex::new(Vec::new()),
        });
        let handle = tokio::spawn(run_server(listener, shared.clone()));

        Ok(Self {
            addr,
            shared,
            handle,
        })
    }

    /// URL of the records endpoint on this server.
    pub fn url(&self) -> String {
        format!("http://{}/records", self.addr)
    }

    /// Requests received so far, e.g. `GET /records?limit=100`.
    pub fn requests(&self) -> Vec<String> {
        self.shared.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.shared.requests.lock().len()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_server(listener: TcpListener, shared: Arc<Shared>) {
    while let Ok((stream, _)) = listener.accept().await {
        let io = TokioIo::new(stream);
        let shared = shared.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let shared = shared.clone();
                async move { handle_request(req, &shared).await }
            });

            // Clients hanging up early is expected (timeouts)
            let _ = http1::Builder::new().serve_connection(io, service).await;
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    shared: &Shared,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = shared.next(format!("{} {}", req.method(), req.uri()));

    let (status, body) = match response {
        MockResponse::Json { status, body } => (status, body),
        MockResponse::Hang(duration) => {
            tokio::time::sleep(duration).await;
            (200, "[]".to_string())
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() =
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get(url: &str) -> reqwest::Response {
        reqwest::get(url).await.unwrap()
    }

    #[tokio::test]
    async fn test_script_then_repeat_last() {
        let server = MockServer::start(vec![MockResponse::status(503), MockResponse::ok("[]")])
            .await
            .unwrap();

        assert_eq!(get(&server.url()).await.status().as_u16(), 503);
        for _ in 0..2 {
            let response = get(&server.url()).await;
            assert_eq!(response.status().as_u16(), 200);
            assert_eq!(response.text().await.unwrap(), "[]");
        }
        assert_eq!(server.request_count(), 3);
    }

    #[tokio::test]
    async fn test_logs_method_and_uri() {
        let server = MockServer::start(vec![MockResponse::ok("[]")]).await.unwrap();
        get(&format!("{}?limit=5", server.url())).await;

        assert_eq!(server.requests(), vec!["GET /records?limit=5".to_string()]);
    }

    #[tokio::test]
    async fn test_json_content_type() {
        let server = MockServer::start(vec![MockResponse::ok("[]")]).await.unwrap();
        let response = get(&server.url()).await;

        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            "application/json"
        );
    }
}
