use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::types::*;
use super::*;

// -- ApiRequest serialisation --

#[test]
fn test_api_request_serialization() {
    let messages = vec![Message::user("Hello"), Message::assistant("Hi!")];
    let request = ApiRequest {
        model: "test-model",
        messages: build_api_messages(&messages),
    };

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["model"], "test-model");
    assert_eq!(json["messages"][0]["role"], "user");
    assert_eq!(json["messages"][0]["content"], "Hello");
    assert_eq!(json["messages"][1]["role"], "assistant");
    assert_eq!(json["messages"][1]["content"], "Hi!");
    assert_eq!(json.as_object().unwrap().len(), 2);
}

// -- Response classification --

#[test]
fn test_classify_success() {
    let body = r#"{
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "choices": [
            {
                "index": 0,
                "message": {"role": "assistant", "content": "Hello! How can I help?"},
                "finish_reason": "stop"
            }
        ]
    }"#;
    assert_eq!(
        classify_response(StatusCode::OK, body),
        Ok("Hello! How can I help?".to_string())
    );
}

#[test]
fn test_classify_success_uses_first_choice() {
    let body = r#"{"choices": [
        {"message": {"content": "first"}},
        {"message": {"content": "second"}}
    ]}"#;
    assert_eq!(
        classify_response(StatusCode::OK, body),
        Ok("first".to_string())
    );
}

#[test]
fn test_classify_malformed_success_bodies() {
    for body in [
        "not json",
        r#"{"choices": []}"#,
        r#"{"choices": [{"message": {"role": "assistant"}}]}"#,
        r#"{"choices": [{"message": {"content": null}}]}"#,
        r#"{"id": "no-choices"}"#,
    ] {
        assert!(
            matches!(
                classify_response(StatusCode::OK, body),
                Err(ProviderError::InvalidResponse(_))
            ),
            "body should be rejected: {}",
            body
        );
    }
}

#[test]
fn test_classify_unauthorized() {
    let body = r#"{"error": {"message": "Invalid API Key", "type": "invalid_request_error"}}"#;
    assert_eq!(
        classify_response(StatusCode::UNAUTHORIZED, body),
        Err(ProviderError::Authentication("Invalid API Key".to_string()))
    );
    assert_eq!(
        classify_response(StatusCode::UNAUTHORIZED, ""),
        Err(ProviderError::Authentication("Invalid API key".to_string()))
    );
}

#[test]
fn test_classify_rate_limited() {
    assert!(matches!(
        classify_response(StatusCode::TOO_MANY_REQUESTS, "slow down"),
        Err(ProviderError::RateLimited(_))
    ));
}

#[test]
fn test_classify_other_status_keeps_body() {
    assert_eq!(
        classify_response(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded"),
        Err(ProviderError::Http {
            status: 500,
            body: "upstream exploded".to_string(),
        })
    );
    assert!(matches!(
        classify_response(StatusCode::BAD_REQUEST, "{}"),
        Err(ProviderError::Http { status: 400, .. })
    ));
}

#[test]
fn test_api_error_parsing() {
    let json = r#"{
        "error": {
            "message": "Incorrect API key provided",
            "type": "invalid_request_error",
            "code": "invalid_api_key"
        }
    }"#;
    let error: ApiError = serde_json::from_str(json).unwrap();
    assert_eq!(error.error.message, "Incorrect API key provided");
}

// -- End-to-end against a canned HTTP server --

/// Serve exactly one canned HTTP response and hand back the raw request.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (endpoint, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn test_provider(endpoint: &str, timeout: Duration) -> OpenAiCompatProvider {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(timeout)
        .build()
        .unwrap();
    OpenAiCompatProvider::with_client(client, endpoint)
}

#[tokio::test]
async fn test_complete_sends_bearer_token_and_payload() {
    let (endpoint, server) = serve_once(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"pong"}}]}"#,
    )
    .await;
    let provider = test_provider(&endpoint, Duration::from_secs(5));
    let messages = vec![Message::user("ping")];

    let reply = provider
        .complete(CompletionRequest {
            api_key: "gsk-secret",
            model: "llama-test",
            messages: &messages,
        })
        .await;
    assert_eq!(reply, Ok("pong".to_string()));

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /v1/chat/completions"));
    assert!(
        raw.lines()
            .any(|l| l.eq_ignore_ascii_case("authorization: Bearer gsk-secret"))
    );
    let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["model"], "llama-test");
    assert_eq!(json["messages"][0]["content"], "ping");
}

#[tokio::test]
async fn test_complete_maps_http_401() {
    let (endpoint, _server) = serve_once(
        "401 Unauthorized",
        r#"{"error":{"message":"Invalid API Key"}}"#,
    )
    .await;
    let provider = test_provider(&endpoint, Duration::from_secs(5));
    let messages = vec![Message::user("ping")];

    let result = provider
        .complete(CompletionRequest {
            api_key: "bad",
            model: "m",
            messages: &messages,
        })
        .await;
    assert!(matches!(result, Err(ProviderError::Authentication(_))));
}

#[tokio::test]
async fn test_complete_maps_http_503_with_body() {
    let (endpoint, _server) = serve_once("503 Service Unavailable", r#"{"busy":true}"#).await;
    let provider = test_provider(&endpoint, Duration::from_secs(5));
    let messages = vec![Message::user("ping")];

    let result = provider
        .complete(CompletionRequest {
            api_key: "k",
            model: "m",
            messages: &messages,
        })
        .await;
    assert_eq!(
        result,
        Err(ProviderError::Http {
            status: 503,
            body: r#"{"busy":true}"#.to_string(),
        })
    );
}

#[tokio::test]
async fn test_complete_connection_refused_is_request_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    drop(listener);

    let provider = test_provider(&endpoint, Duration::from_secs(5));
    let messages = vec![Message::user("ping")];
    let result = provider
        .complete(CompletionRequest {
            api_key: "k",
            model: "m",
            messages: &messages,
        })
        .await;
    assert!(matches!(result, Err(ProviderError::RequestFailed(_))));
}

#[tokio::test]
async fn test_complete_timeout_is_request_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    let _stalled = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let provider = test_provider(&endpoint, Duration::from_millis(200));
    let messages = vec![Message::user("ping")];
    let result = provider
        .complete(CompletionRequest {
            api_key: "k",
            model: "m",
            messages: &messages,
        })
        .await;
    match result {
        Err(ProviderError::RequestFailed(detail)) => assert!(detail.contains("timed out")),
        other => panic!("expected timeout failure, got {:?}", other),
    }
}
