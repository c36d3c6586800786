//! HTTP backend tests against a throwaway local server.
//!
//! The stub speaks just enough HTTP/1.1 for reqwest: it reads one request
//! per connection, records it and answers from a fixed route table.

use pdf_optimizer::backend::chat::{ChatClient, ChatMessage, ChatRequest};
use pdf_optimizer::backend::ollama::{GenerateRequest, OllamaClient};
use pdf_optimizer::pipeline::ocr::{CloudOcr, LocalOcr};
use pdf_optimizer::{
    BackendError, OcrBackend, OcrError, OcrMode, OptimizerConfig, OptimizerError, Translator,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ── Stub server ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Route {
    path: &'static str,
    status: u16,
    body: String,
    delay: Option<Duration>,
}

fn route(path: &'static str, status: u16, body: impl Into<String>) -> Route {
    Route {
        path,
        status,
        body: body.into(),
        delay: None,
    }
}

/// A recorded request: request line, lower-cased headers and body.
#[derive(Debug, Clone)]
struct Seen {
    line: String,
    headers: String,
    body: String,
}

struct Stub {
    base: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(handle(stream, routes.clone(), log.clone()));
            }
        });
        Self { base, seen }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

async fn handle(mut stream: TcpStream, routes: Vec<Route>, log: Arc<Mutex<Vec<Seen>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
    }

    let line = head.lines().next().unwrap_or_default().to_string();
    let path = line.split_whitespace().nth(1).unwrap_or("/").to_string();
    log.lock().unwrap().push(Seen {
        line: line.clone(),
        headers: head.to_lowercase(),
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    });

    let reply = routes
        .iter()
        .find(|r| r.path == path)
        .cloned()
        .unwrap_or_else(|| route("", 404, r#"{"error":"not found"}"#));
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reply.body.len(),
        reply.body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn page_image() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page_1.png");
    std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").unwrap();
    (dir, path)
}

fn local_config(stub: &Stub) -> OptimizerConfig {
    OptimizerConfig::builder()
        .ollama_url(stub.base.clone())
        .local_ocr_timeout_secs(5)
        .startup_check_timeout_secs(5)
        .build()
        .unwrap()
}

// ── Ollama ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn local_ocr_returns_cleaned_text() {
    let stub = Stub::start(vec![route(
        "/api/generate",
        200,
        r#"{"response":"```markdown\nFactura 001\n\n\n\nTotal: 10 €\n```","done":true,"done_reason":"stop"}"#,
    )])
    .await;
    let (_dir, image) = page_image();
    let ocr = LocalOcr::from_config(&local_config(&stub));

    let text = ocr.extract_text(&image).await.unwrap();
    assert_eq!(text, "Factura 001\n\nTotal: 10 €");

    let seen = stub.requests();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].line.starts_with("POST /api/generate"));
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["model"], "llama3.2-vision:latest");
    assert_eq!(body["stream"], false);
    assert_eq!(body["images"].as_array().map(Vec::len), Some(1));
    assert!(body["options"]["temperature"].is_number());
}

#[tokio::test]
async fn local_ocr_empty_response_carries_done_reason() {
    let stub = Stub::start(vec![route(
        "/api/generate",
        200,
        r#"{"response":"   ","done":true,"done_reason":"length"}"#,
    )])
    .await;
    let (_dir, image) = page_image();
    let ocr = LocalOcr::from_config(&local_config(&stub));

    let err = ocr.extract_text(&image).await.unwrap_err();
    match err {
        OcrError::EmptyResponse {
            backend,
            done_reason,
        } => {
            assert_eq!(backend, "ollama");
            assert_eq!(done_reason, "length");
        }
        other => panic!("expected EmptyResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_becomes_status() {
    let stub = Stub::start(vec![route(
        "/api/generate",
        500,
        r#"{"error":"model runner crashed"}"#,
    )])
    .await;
    let client = OllamaClient::new(stub.base.clone());
    let req = GenerateRequest {
        model: "llama3.2:latest",
        prompt: "hola",
        images: Vec::new(),
        stream: false,
        options: None,
    };

    let err = client.generate(&req, 5).await.unwrap_err();
    match err {
        BackendError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("model runner crashed"));
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_server_times_out() {
    let mut slow = route("/api/generate", 200, r#"{"response":"late"}"#);
    slow.delay = Some(Duration::from_secs(3));
    let stub = Stub::start(vec![slow]).await;
    let client = OllamaClient::new(stub.base.clone());
    let req = GenerateRequest {
        model: "llama3.2:latest",
        prompt: "hola",
        images: Vec::new(),
        stream: false,
        options: None,
    };

    let err = client.generate(&req, 1).await.unwrap_err();
    assert!(
        matches!(err, BackendError::Timeout { secs: 1, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn verify_accepts_installed_vision_model() {
    let stub = Stub::start(vec![
        route(
            "/api/tags",
            200,
            r#"{"models":[{"name":"llama3.2-vision:latest"},{"name":"llama3.2:latest"}]}"#,
        ),
        route("/api/show", 200, r#"{"capabilities":["completion","vision"]}"#),
    ])
    .await;
    let client = OllamaClient::new(stub.base.clone());
    assert_eq!(
        client.list_models(5).await.unwrap(),
        vec!["llama3.2-vision:latest", "llama3.2:latest"]
    );

    let ocr = LocalOcr::from_config(&local_config(&stub));
    ocr.verify().await.unwrap();
}

#[tokio::test]
async fn verify_tolerates_missing_model() {
    let stub = Stub::start(vec![
        route("/api/tags", 200, r#"{"models":[]}"#),
        route("/api/show", 404, r#"{"error":"model not found"}"#),
    ])
    .await;
    let ocr = LocalOcr::from_config(&local_config(&stub));
    ocr.verify().await.unwrap();
}

#[tokio::test]
async fn verify_fails_when_server_is_down() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let config = OptimizerConfig::builder()
        .ollama_url(format!("http://127.0.0.1:{port}"))
        .startup_check_timeout_secs(2)
        .build()
        .unwrap();

    let err = LocalOcr::from_config(&config).verify().await.unwrap_err();
    assert!(
        matches!(err, OptimizerError::BackendUnavailable { .. }),
        "got {err:?}"
    );
}

// ── Chat completions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_sends_bearer_and_reads_first_choice() {
    let stub = Stub::start(vec![route(
        "/v1/chat/completions",
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"Hola"}},{"message":{"content":"second"}}]}"#,
    )])
    .await;
    let client = ChatClient::new(stub.url("/v1/chat/completions"), "sk-test");
    let req = ChatRequest {
        model: "gpt-4o-mini",
        messages: vec![ChatMessage::system("translate"), ChatMessage::user("Hello")],
        max_tokens: 100,
        temperature: 0.3,
    };

    assert_eq!(client.complete(&req, 5).await.unwrap(), "Hola");

    let seen = stub.requests();
    assert!(seen[0].headers.contains("authorization: bearer sk-test"));
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Hello");
    assert_eq!(body["max_tokens"], 100);
}

#[tokio::test]
async fn chat_without_choices_is_malformed() {
    let stub = Stub::start(vec![route("/chat", 200, r#"{"choices":[]}"#)]).await;
    let client = ChatClient::new(stub.url("/chat"), "k");
    let req = ChatRequest {
        model: "m",
        messages: vec![ChatMessage::user("x")],
        max_tokens: 10,
        temperature: 0.0,
    };

    let err = client.complete(&req, 5).await.unwrap_err();
    assert!(matches!(err, BackendError::Malformed { .. }), "got {err:?}");
}

#[tokio::test]
async fn cloud_ocr_sends_image_as_data_uri() {
    let stub = Stub::start(vec![route(
        "/chat/completions",
        200,
        r#"{"choices":[{"message":{"content":"Texto escaneado"}}]}"#,
    )])
    .await;
    let config = OptimizerConfig::builder()
        .ocr_mode(OcrMode::Cloud)
        .cloud_ocr_url(stub.url("/chat/completions"))
        .cloud_ocr_api_key("sk-deepseek")
        .build()
        .unwrap();
    let (_dir, image) = page_image();
    let ocr = CloudOcr::from_config(&config);

    assert_eq!(ocr.extract_text(&image).await.unwrap(), "Texto escaneado");

    let seen = stub.requests();
    assert!(seen[0].headers.contains("authorization: bearer sk-deepseek"));
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    let parts = body["messages"][0]["content"].as_array().unwrap();
    assert_eq!(parts[0]["type"], "image_url");
    assert!(parts[0]["image_url"]["url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert_eq!(parts[1]["type"], "text");
}

// ── Translation fallback over HTTP ───────────────────────────────────────────

#[tokio::test]
async fn translator_falls_back_from_cloud_to_local() {
    let stub = Stub::start(vec![
        route("/v1/chat/completions", 401, r#"{"error":"bad key"}"#),
        route("/api/generate", 200, r#"{"response":"Hola mundo\n"}"#),
    ])
    .await;
    let config = OptimizerConfig::builder()
        .ollama_url(stub.base.clone())
        .use_cloud_translation(true)
        .cloud_translation_api_key("sk-bad")
        .cloud_translation_url(stub.url("/v1/chat/completions"))
        .translation_timeout_secs(5)
        .build()
        .unwrap();
    let translator = Translator::from_config(&config);
    assert_eq!(translator.backend_names(), vec!["cloud", "ollama"]);

    assert_eq!(translator.translate("Hello world", Some(1)).await, "Hola mundo");

    let lines: Vec<String> = stub.requests().into_iter().map(|s| s.line).collect();
    assert!(lines[0].starts_with("POST /v1/chat/completions"));
    assert!(lines[1].starts_with("POST /api/generate"));
}

#[tokio::test]
async fn translator_keeps_original_when_everything_fails() {
    let stub = Stub::start(vec![route("/api/generate", 503, "busy")]).await;
    let config = OptimizerConfig::builder()
        .ollama_url(stub.base.clone())
        .translation_timeout_secs(5)
        .build()
        .unwrap();
    let translator = Translator::from_config(&config);
    assert_eq!(translator.backend_names(), vec!["ollama"]);

    assert_eq!(
        translator.translate("Hello world", None).await,
        "Hello world"
    );
}
