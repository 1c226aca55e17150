use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use translate_gateway::config::EngineArgs;
use translate_gateway::engine::EngineClient;
use translate_gateway::state::AppState;
use translate_gateway::{GENERATION_QUEUE_DEPTH, build_router, worker};

async fn spawn_gateway(engine_url: &str) -> SocketAddr {
    let engine = EngineClient::new(&EngineArgs {
        engine_url: engine_url.to_string(),
        engine_connect_timeout: 5,
    })
    .unwrap();

    let (queue_tx, queue_rx) = mpsc::channel(GENERATION_QUEUE_DEPTH);
    tokio::spawn(worker::generation_worker(queue_rx, engine.clone()));

    let state = Arc::new(AppState { engine, queue_tx });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn ndjson(lines: &[Value]) -> Vec<u8> {
    let mut body = Vec::new();
    for line in lines {
        body.extend_from_slice(line.to_string().as_bytes());
        body.push(b'\n');
    }
    body
}

fn engine_output(texts: &[&str], finished: bool) -> Value {
    json!({
        "outputs": texts.iter().map(|t| json!({"text": t})).collect::<Vec<_>>(),
        "finished": finished,
    })
}

#[tokio::test]
async fn health_always_returns_200_with_empty_body() {
    // no engine behind it; health must not care
    let addr = spawn_gateway("http://127.0.0.1:9").await;

    let res = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert!(res.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_streaming_joins_final_sentence_outputs() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            ndjson(&[
                engine_output(&["안녕", "잘"], false),
                engine_output(&["안녕하세요.", "잘 지내세요?"], true),
            ]),
            "application/x-ndjson",
        ))
        .mount(&engine)
        .await;

    let addr = spawn_gateway(&engine.uri()).await;
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/generate"))
        .json(&json!({"prompt": "你好。你好吗？", "temperature": 0.3}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"text": "안녕하세요. 잘 지내세요?"}));

    // the engine saw one templated prompt per sentence plus the passthrough
    // sampling field and a request id
    let requests = engine.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompts = sent["prompts"].as_array().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].as_str().unwrap().contains("你好。"));
    assert!(prompts[1].as_str().unwrap().contains("你好吗？"));
    assert_eq!(sent["sampling"], json!({"temperature": 0.3}));
    assert!(!sent["request_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn streaming_yields_nul_terminated_json_chunks() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            ndjson(&[
                engine_output(&["안녕"], false),
                engine_output(&["안녕하세요."], true),
            ]),
            "application/x-ndjson",
        ))
        .mount(&engine)
        .await;

    let addr = spawn_gateway(&engine.uri()).await;
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/generate"))
        .json(&json!({"prompt": "你好。", "stream": true}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let body = res.bytes().await.unwrap();
    assert_eq!(body.last(), Some(&0u8), "chunk stream must end with NUL");

    let chunks: Vec<Value> = body
        .split(|&b| b == 0)
        .filter(|frame| !frame.is_empty())
        .map(|frame| serde_json::from_slice(frame).unwrap())
        .collect();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], json!({"text": ["안녕"]}));
    assert_eq!(chunks[1], json!({"text": ["안녕하세요."]}));
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let addr = spawn_gateway("http://127.0.0.1:9").await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("http://{addr}/generate"))
        .json(&json!({"stream": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);

    let res = client
        .post(format!("http://{addr}/generate"))
        .json(&json!({"prompt": "你好。", "beam_width": 4}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("sampling"));
}

#[tokio::test]
async fn engine_failure_maps_to_bad_gateway() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&engine)
        .await;

    let addr = spawn_gateway(&engine.uri()).await;
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/generate"))
        .json(&json!({"prompt": "你好。"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 502);
}

#[tokio::test]
async fn disconnect_mid_generation_triggers_exactly_one_abort() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    ndjson(&[engine_output(&["안녕하세요."], true)]),
                    "application/x-ndjson",
                )
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&engine)
        .await;
    Mock::given(method("POST"))
        .and(path("/abort"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&engine)
        .await;

    let addr = spawn_gateway(&engine.uri()).await;

    // client gives up long before the engine produces anything
    let result = reqwest::Client::new()
        .post(format!("http://{addr}/generate"))
        .json(&json!({"prompt": "你好。"}))
        .timeout(Duration::from_millis(100))
        .send()
        .await;
    assert!(result.is_err(), "request should have timed out");

    let abort_count = |requests: Vec<wiremock::Request>| {
        requests
            .iter()
            .filter(|r| r.url.path() == "/abort")
            .count()
    };

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        if abort_count(engine.received_requests().await.unwrap()) >= 1 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "engine never received an abort"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // give a duplicate abort a chance to show up, then insist on exactly one
    tokio::time::sleep(Duration::from_millis(300)).await;
    let requests = engine.received_requests().await.unwrap();
    assert_eq!(abort_count(requests.clone()), 1);

    // aborted with the same request id the generation was submitted under
    let generate_req: Value = serde_json::from_slice(
        &requests
            .iter()
            .find(|r| r.url.path() == "/generate")
            .unwrap()
            .body,
    )
    .unwrap();
    let abort_req: Value = serde_json::from_slice(
        &requests
            .iter()
            .find(|r| r.url.path() == "/abort")
            .unwrap()
            .body,
    )
    .unwrap();
    assert_eq!(generate_req["request_id"], abort_req["request_id"]);
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let addr = spawn_gateway("http://127.0.0.1:9").await;

    // counters register on first use; make sure at least one request landed
    let _ = reqwest::Client::new()
        .post(format!("http://{addr}/generate"))
        .json(&json!({"prompt": "你好。"}))
        .send()
        .await
        .unwrap();

    let res = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let body = res.text().await.unwrap();
    assert!(body.contains("gateway_requests_total"));
}
