//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use route_gateway::config::ServerConfig;
use route_gateway::http::{ForwardingHandler, LivenessHandler};
use route_gateway::routing::RouteDefinition;
use route_gateway::{GatewayServer, ServerError};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Mock backend that records every request it receives.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    disconnects: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose connection closed before the backend answered.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Wait until the backend has received `count` requests.
    pub async fn wait_for_requests(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.requests.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("backend never received the request");
    }

    /// Wait until `count` connections were closed before being answered.
    pub async fn wait_for_disconnects(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.disconnects() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("backend connection was never closed");
    }
}

/// How a mock backend answers.
#[derive(Clone, Copy)]
enum Reply {
    /// `body` in full, after `delay`.
    Full { body: &'static str, delay: Duration },
    /// Declares `declared` body bytes, sends `sent`, then stalls.
    Truncated { declared: usize, sent: &'static str },
}

/// Start a mock backend answering every request with `body` after `delay`.
pub async fn start_mock_backend(body: &'static str, delay: Duration) -> MockBackend {
    start_backend(Reply::Full { body, delay }).await
}

/// Start a mock backend whose response body never completes.
pub async fn start_stalling_backend(declared: usize, sent: &'static str) -> MockBackend {
    start_backend(Reply::Truncated { declared, sent }).await
}

async fn start_backend(reply: Reply) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let disconnects = Arc::new(AtomicUsize::new(0));

    let recorded = Arc::clone(&requests);
    let closed = Arc::clone(&disconnects);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let recorded = Arc::clone(&recorded);
                    let closed = Arc::clone(&closed);
                    tokio::spawn(handle_backend_connection(socket, recorded, closed, reply));
                }
                Err(_) => break,
            }
        }
    });

    MockBackend {
        addr,
        requests,
        disconnects,
    }
}

async fn handle_backend_connection(
    mut socket: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    disconnects: Arc<AtomicUsize>,
    reply: Reply,
) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    recorded.lock().unwrap().push(request);

    match reply {
        Reply::Full { body, delay } => {
            let mut peek = [0u8; 1];
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                read = socket.read(&mut peek) => {
                    if matches!(read, Ok(0) | Err(_)) {
                        disconnects.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                    tokio::time::sleep(delay).await;
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Reply::Truncated { declared, sent } => {
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n{sent}"
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    let mut body = buf[head_end..].to_vec();
    let chunked = headers.iter().any(|(n, v)| {
        n.eq_ignore_ascii_case("transfer-encoding") && v.eq_ignore_ascii_case("chunked")
    });
    if chunked {
        while !body.windows(5).any(|w| w == b"0\r\n\r\n") {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body = decode_chunked(&body)?;
    } else {
        let length = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);
        while body.len() < length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(length);
    }

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

fn decode_chunked(mut raw: &[u8]) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line_end = raw.windows(2).position(|w| w == b"\r\n")?;
        let size_line = std::str::from_utf8(&raw[..line_end]).ok()?;
        let size_field = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_field, 16).ok()?;
        raw = &raw[line_end + 2..];
        if size == 0 {
            return Some(body);
        }
        body.extend_from_slice(raw.get(..size)?);
        raw = raw.get(size + 2..)?;
    }
}

/// Address that refuses connections.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A gateway serving on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub server: Arc<GatewayServer>,
    pub task: JoinHandle<Result<(), ServerError>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Server tuning suitable for tests.
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        address: "127.0.0.1:0".to_string(),
        shutdown_timeout: Duration::from_secs(5),
        ..ServerConfig::default()
    }
}

/// Start a gateway with the liveness handler and one forwarding handler per
/// `(pattern, backend_url, rewrite_prefix)`.
pub async fn start_gateway(config: ServerConfig, routes: &[(&str, String, bool)]) -> TestGateway {
    let health_check_path = config.health_check_path.clone();
    let server = Arc::new(GatewayServer::new(config));
    server
        .register_handler(&health_check_path, LivenessHandler)
        .unwrap();
    for (pattern, url, rewrite) in routes {
        let route = RouteDefinition::new(*pattern, url, *rewrite).unwrap();
        server
            .register_handler(pattern, ForwardingHandler::new(route))
            .unwrap();
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.serve(listener).await })
    };

    TestGateway { addr, server, task }
}

/// Client that never follows redirects or uses environment proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
