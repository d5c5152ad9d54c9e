//! Gateway integration tests over a real WebSocket
//!
//! Each test boots the full router on an ephemeral port with a scripted
//! mock LLM, connects with a WebSocket client and speaks JSON-RPC frames.

use futures::{SinkExt, StreamExt};
use selkie_agent::SupervisorAgent;
use selkie_bus::MessageBus;
use selkie_core::config::SelkieConfig;
use selkie_core::metrics::Metrics;
use selkie_llm::{LlmResponse, MockLlm, ToolCallRequest};
use selkie_memory::{MemorySystem, MemorySystemConfig, MockEmbedder};
use selkie_queue::DeliveryQueue;
use selkie_server::{router, AppState};
use selkie_session::SessionStore;
use selkie_tools::builtin::{register_task_tools, TaskStore};
use selkie_tools::ToolRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;

struct TestServer {
    ws_url: String,
    tasks: Arc<TaskStore>,
    _dir: tempfile::TempDir,
}

async fn spawn_server(auth_token: Option<&str>, llm: MockLlm) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SelkieConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.gateway.auth_token = auth_token.map(String::from);
    let config = Arc::new(config);
    let metrics = Metrics::new_shared();

    let memory = Arc::new(
        MemorySystem::open(
            MemorySystemConfig::new(config.memories_dir()),
            Arc::new(MockEmbedder::new(16)),
            None,
            metrics.clone(),
        )
        .unwrap(),
    );
    let sessions = Arc::new(SessionStore::open(config.sessions_dir()).unwrap());
    let queue = Arc::new(DeliveryQueue::open(config.queue_dir()).unwrap());
    let bus = Arc::new(MessageBus::new(queue, metrics.clone()));

    let tools = Arc::new(ToolRegistry::new());
    let tasks = Arc::new(TaskStore::open(config.tasks_path()).unwrap());
    register_task_tools(&tools, tasks.clone()).await.unwrap();

    let agent = Arc::new(SupervisorAgent::new(
        Arc::new(llm),
        tools,
        memory.clone(),
        sessions.clone(),
        "integration test assistant",
        config.agent.clone(),
        config.memory.clone(),
        metrics.clone(),
    ));

    let state = AppState::new(config, agent, sessions, memory, bus, metrics);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        ws_url: format!("ws://{}/ws", addr),
        tasks,
        _dir: dir,
    }
}

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(server: &TestServer) -> WsClient {
    let (client, _) = tokio_tungstenite::connect_async(&server.ws_url)
        .await
        .expect("connect");
    client
}

async fn send_rpc(client: &mut WsClient, frame: Value) {
    client
        .send(Message::Text(frame.to_string()))
        .await
        .expect("send");
}

async fn recv_json(client: &mut WsClient) -> Value {
    loop {
        let message = tokio::time::timeout(std::time::Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("transport error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("valid json");
        }
    }
}

#[tokio::test]
async fn test_health_requires_no_auth() {
    let server = spawn_server(Some("secret-token"), MockLlm::new()).await;
    let mut client = connect(&server).await;

    send_rpc(
        &mut client,
        json!({"jsonrpc": "2.0", "id": "h", "method": "health"}),
    )
    .await;
    let response = recv_json(&mut client).await;

    assert_eq!(response["id"], "h");
    assert_eq!(response["result"]["status"], "ok");
    assert!(response["result"]["version"].is_string());
}

#[tokio::test]
async fn test_chat_send_writes_transcript() {
    let server = spawn_server(
        Some("T"),
        MockLlm::scripted(vec![LlmResponse::text("hello from the assistant")]),
    )
    .await;
    let mut client = connect(&server).await;

    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "1", "method": "chat.send",
            "params": {"text": "hi", "session_key": "agent:main:cli:u1", "token": "T"}
        }),
    )
    .await;
    let response = recv_json(&mut client).await;

    assert_eq!(response["result"]["text"], "hello from the assistant");
    assert_eq!(response["result"]["session_key"], "agent:main:cli:u1");
    assert!(response["result"]["message_id"].is_string());

    // Transcript on disk carries both lines
    let transcript = server
        ._dir
        .path()
        .join("sessions/transcripts/agent_main_cli_u1.jsonl");
    let raw = std::fs::read_to_string(transcript).unwrap();
    assert!(raw.contains("\"role\":\"user\""));
    assert!(raw.contains("\"role\":\"assistant\""));
}

#[tokio::test]
async fn test_auth_missing_token_rejected() {
    let server = spawn_server(Some("secret-token"), MockLlm::new()).await;
    let mut client = connect(&server).await;

    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "1", "method": "chat.send",
            "params": {"text": "hi"}
        }),
    )
    .await;
    let response = recv_json(&mut client).await;

    assert_eq!(response["error"]["code"], -32001);

    // The connection survives the auth failure
    send_rpc(
        &mut client,
        json!({"jsonrpc": "2.0", "id": "2", "method": "health"}),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert_eq!(response["result"]["status"], "ok");
}

#[tokio::test]
async fn test_text_length_boundary() {
    let server = spawn_server(None, MockLlm::new()).await;
    let mut client = connect(&server).await;

    // Exactly 10 000 characters is accepted
    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "ok", "method": "chat.send",
            "params": {"text": "a".repeat(10_000)}
        }),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert!(response.get("error").is_none(), "10000 chars must pass: {response}");

    // One more character fails with invalid params
    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "too-big", "method": "chat.send",
            "params": {"text": "a".repeat(10_001)}
        }),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_stream_event_ordering() {
    let server = spawn_server(
        None,
        MockLlm::scripted(vec![LlmResponse::text("streamed reply")]),
    )
    .await;
    let mut client = connect(&server).await;

    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "s", "method": "chat.send_stream",
            "params": {"text": "stream please", "session_key": "agent:main:cli:u1"}
        }),
    )
    .await;

    // chat.start first
    let start = recv_json(&mut client).await;
    assert_eq!(start["method"], "event");
    assert_eq!(start["params"]["type"], "chat.start");
    let message_id = start["params"]["message_id"].as_str().unwrap().to_string();

    // deltas until chat.end, all for the same message_id
    let mut deltas = String::new();
    loop {
        let frame = recv_json(&mut client).await;
        assert_eq!(frame["method"], "event");
        assert_eq!(frame["params"]["message_id"], message_id.as_str());
        match frame["params"]["type"].as_str().unwrap() {
            "chat.delta" => deltas.push_str(frame["params"]["delta"].as_str().unwrap()),
            "chat.end" => break,
            other => panic!("unexpected event type {other}"),
        }
    }
    assert_eq!(deltas, "streamed reply");

    // The RPC result arrives only after chat.end
    let result = recv_json(&mut client).await;
    assert_eq!(result["id"], "s");
    assert_eq!(result["result"]["stream"], true);
    assert_eq!(result["result"]["message_id"], message_id.as_str());
}

#[tokio::test]
async fn test_destructive_confirmation_over_ws() {
    let delete_call = LlmResponse {
        tool_calls: vec![ToolCallRequest {
            id: "call_0".into(),
            name: "delete_tasks".into(),
            arguments: json!({}),
        }],
        finish_reason: "tool_calls".into(),
        ..Default::default()
    };
    let server = spawn_server(None, MockLlm::scripted(vec![delete_call])).await;
    server.tasks.create("water plants").await.unwrap();
    server.tasks.create("call mom").await.unwrap();

    let mut client = connect(&server).await;

    // First call proposes the destructive tool and asks
    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "1", "method": "chat.send",
            "params": {"text": "clear all tasks", "session_key": "agent:main:cli:u1"}
        }),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert_eq!(response["result"]["needs_input"], true);
    let prompt = response["result"]["text"].as_str().unwrap();
    assert!(prompt.contains("water plants"));
    assert!(prompt.contains("call mom"));
    assert_eq!(server.tasks.list().await.len(), 2, "nothing deleted yet");

    // Confirming executes directly, without another LLM round-trip
    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "2", "method": "chat.send",
            "params": {"text": "yes", "session_key": "agent:main:cli:u1"}
        }),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert!(response["result"]["text"]
        .as_str()
        .unwrap()
        .contains("Deleted 2 task(s)"));
    assert!(server.tasks.list().await.is_empty());
}

#[tokio::test]
async fn test_unknown_method() {
    let server = spawn_server(None, MockLlm::new()).await;
    let mut client = connect(&server).await;

    send_rpc(
        &mut client,
        json!({"jsonrpc": "2.0", "id": "x", "method": "nope.nothing"}),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    let server = spawn_server(None, MockLlm::new()).await;
    let mut client = connect(&server).await;

    client
        .send(Message::Text("{definitely not json".to_string()))
        .await
        .unwrap();
    let response = recv_json(&mut client).await;
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);

    send_rpc(
        &mut client,
        json!({"jsonrpc": "2.0", "id": "after", "method": "health"}),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert_eq!(response["result"]["status"], "ok");
}

#[tokio::test]
async fn test_binary_frames_rejected() {
    let server = spawn_server(None, MockLlm::new()).await;
    let mut client = connect(&server).await;

    client
        .send(Message::Binary(vec![1, 2, 3]))
        .await
        .unwrap();
    let response = recv_json(&mut client).await;
    assert_eq!(response["error"]["code"], -32600);

    // Connection stays usable
    send_rpc(
        &mut client,
        json!({"jsonrpc": "2.0", "id": "h", "method": "health"}),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert_eq!(response["result"]["status"], "ok");
}

#[tokio::test]
async fn test_sessions_delete_idempotent() {
    let server = spawn_server(None, MockLlm::new()).await;
    let mut client = connect(&server).await;

    // Create a session through a chat turn
    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "1", "method": "chat.send",
            "params": {"text": "hi", "session_key": "agent:main:cli:gone"}
        }),
    )
    .await;
    recv_json(&mut client).await;

    for id in ["d1", "d2"] {
        send_rpc(
            &mut client,
            json!({
                "jsonrpc": "2.0", "id": id, "method": "sessions.delete",
                "params": {"session_key": "agent:main:cli:gone"}
            }),
        )
        .await;
        let response = recv_json(&mut client).await;
        assert_eq!(response["result"]["deleted"], true, "call {id}");
    }

    send_rpc(
        &mut client,
        json!({
            "jsonrpc": "2.0", "id": "h", "method": "chat.history",
            "params": {"session_key": "agent:main:cli:gone"}
        }),
    )
    .await;
    let response = recv_json(&mut client).await;
    assert_eq!(response["result"]["messages"], json!([]));
}

#[tokio::test]
async fn test_sessions_list_after_chats() {
    let server = spawn_server(None, MockLlm::new()).await;
    let mut client = connect(&server).await;

    for (id, key) in [("1", "agent:main:cli:a"), ("2", "agent:main:cli:b")] {
        send_rpc(
            &mut client,
            json!({
                "jsonrpc": "2.0", "id": id, "method": "chat.send",
                "params": {"text": "hello", "session_key": key}
            }),
        )
        .await;
        recv_json(&mut client).await;
    }

    send_rpc(
        &mut client,
        json!({"jsonrpc": "2.0", "id": "l", "method": "sessions.list", "params": {}}),
    )
    .await;
    let response = recv_json(&mut client).await;
    let sessions = response["result"]["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
}
