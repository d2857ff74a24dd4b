//! HTTP gateway tests against a local one-shot server.
//!
//! Each test binds a TCP listener on an ephemeral port, accepts a single
//! request, and answers with a canned response.

use pretty_assertions::assert_eq;
use query_chat::conversation::Turn;
use query_chat::error::ChatError;
use query_chat::gateway::{DataGateway, HttpDataGateway, HttpGatewayConfig, HttpModelGateway, ModelGateway};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request captured by the fake backend.
struct CapturedRequest {
    head: String,
    body: Value,
}

impl CapturedRequest {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_lowercase());
        self.head
            .lines()
            .find(|line| line.to_lowercase().starts_with(&prefix))
            .map(|line| line[prefix.len()..].trim().to_string())
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Serves one request and returns the base URL plus a handle to the captured request.
async fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let (head_end, content_length) = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = find_header_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                break (end, length);
            }
        };

        let body_start = head_end + 4;
        while buf.len() < body_start + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        CapturedRequest {
            head: String::from_utf8_lossy(&buf[..head_end]).to_string(),
            body: serde_json::from_slice(&buf[body_start..body_start + content_length])
                .unwrap_or(Value::Null),
        }
    });

    (format!("http://{addr}/agent/api"), handle)
}

fn config(base_url: &str) -> HttpGatewayConfig {
    HttpGatewayConfig::new(base_url, "secret-token")
        .unwrap()
        .with_timeout(5)
}

#[tokio::test]
async fn test_model_gateway_posts_prompt_and_history() {
    let (base_url, server) =
        serve_once("HTTP/1.1 200 OK", json!({"response": "SELECT 1;"}).to_string()).await;
    let gateway = HttpModelGateway::new(&config(&base_url)).unwrap();
    assert_eq!(gateway.url().path(), "/agent/api/ai.php");

    let history = vec![Turn::user("hi"), Turn::assistant("Hello!")];
    let reply = gateway
        .complete("You are a SQL assistant.", &history, "how many applicants?")
        .await
        .unwrap();

    assert_eq!(reply, "SELECT 1;");

    let request = server.await.unwrap();
    assert_eq!(request.request_line(), "POST /agent/api/ai.php HTTP/1.1");
    assert_eq!(request.header("x-security-token").as_deref(), Some("secret-token"));
    assert_eq!(
        request.body,
        json!({
            "system_prompt": "You are a SQL assistant.",
            "history": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "Hello!"}
            ],
            "last_message": "how many applicants?"
        })
    );
}

#[tokio::test]
async fn test_data_gateway_returns_rows_in_backend_order() {
    let body = r#"[{"name":"Mexico","id":1},{"name":"Peru","id":2}]"#.to_string();
    let (base_url, server) = serve_once("HTTP/1.1 200 OK", body).await;
    let gateway = HttpDataGateway::new(&config(&base_url)).unwrap();
    assert_eq!(gateway.url().path(), "/agent/api/db.php");

    let rows = gateway
        .execute("SELECT name, id FROM country WHERE id > ?", &[json!(0)])
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(columns, vec!["name", "id"]);
    assert_eq!(rows[1]["name"], json!("Peru"));

    let request = server.await.unwrap();
    assert_eq!(request.request_line(), "POST /agent/api/db.php HTTP/1.1");
    assert_eq!(
        request.body,
        json!({"query": "SELECT name, id FROM country WHERE id > ?", "params": [0]})
    );
}

#[tokio::test]
async fn test_data_gateway_surfaces_backend_error() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 500 Internal Server Error",
        json!({"error": "Unknown column 'foo'"}).to_string(),
    )
    .await;
    let gateway = HttpDataGateway::new(&config(&base_url)).unwrap();

    let err = gateway.execute("SELECT foo FROM country", &[]).await.unwrap_err();

    assert!(matches!(err, ChatError::DataGateway(_)));
    assert!(err.to_string().contains("Unknown column 'foo'"));
    server.await.unwrap();
}

#[tokio::test]
async fn test_model_gateway_rejected_token() {
    let (base_url, server) =
        serve_once("HTTP/1.1 401 Unauthorized", json!({"error": "bad token"}).to_string()).await;
    let gateway = HttpModelGateway::new(&config(&base_url)).unwrap();

    let err = gateway.complete("system", &[], "hello").await.unwrap_err();

    assert!(matches!(err, ChatError::ModelGateway(_)));
    assert!(err.to_string().contains("security token"));
    server.await.unwrap();
}

#[tokio::test]
async fn test_model_gateway_malformed_body() {
    let (base_url, server) = serve_once("HTTP/1.1 200 OK", "not json".to_string()).await;
    let gateway = HttpModelGateway::new(&config(&base_url)).unwrap();

    let err = gateway.complete("system", &[], "hello").await.unwrap_err();

    assert!(matches!(err, ChatError::ModelGateway(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_backend_is_gateway_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = HttpDataGateway::new(&config(&format!("http://{addr}/api"))).unwrap();
    let err = gateway.execute("SELECT 1", &[]).await.unwrap_err();

    assert!(matches!(err, ChatError::DataGateway(_)));
    assert!(err.is_gateway());
}
