//! End-to-end exercise of the chat API: a grounded tool-using turn, the
//! availability gate in every non-Ready state, timeout surfacing, and the
//! session-history retention rules.

use std::sync::Arc;
use std::time::Duration;

use agent_core::tool::{Tool, ToolResult, ToolSpec};
use agent_core::{
    AgentBuilder, ChatService, InMemorySessionStore, Role, SessionStore, ThreadId,
};
use agent_runtime::{OpenAiConfig, ScriptedProvider};
use agent_server::config::ServerConfig;
use agent_server::handlers::{AppState, ChatResponse, ErrorResponse, router};
use agent_server::state::{AgentHandle, build_service};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Map, Value, json};
use tower::ServiceExt;

/// Stub datasource tool returning a fixed regional sales table.
struct SalesTool;

#[async_trait::async_trait]
impl Tool for SalesTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "query_datasource",
            "Aggregate measures from the sales datasource",
            json!({
                "type": "object",
                "properties": {"measure": {"type": "string"}},
                "required": ["measure"],
            }),
        )
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> agent_core::Result<ToolResult> {
        Ok(ToolResult::success(
            "query_datasource",
            json!({"rows": [
                {"region": "West", "sales": 1000},
                {"region": "East", "sales": 800},
            ]}),
        ))
    }
}

struct TestApp {
    app: Router,
    provider: Arc<ScriptedProvider>,
    store: Arc<InMemorySessionStore>,
}

async fn ready_app(replies: Vec<&str>, delay: Duration, timeout: Duration) -> TestApp {
    let provider = Arc::new(ScriptedProvider::new(replies).with_delay(delay));
    let store = Arc::new(InMemorySessionStore::new());

    let agent = AgentBuilder::new()
        .provider(provider.clone())
        .tool(SalesTool)
        .system_prompt("You are a data analyst.")
        .build()
        .unwrap();
    let service = ChatService::new(agent, store.clone(), timeout);

    let handle = Arc::new(AgentHandle::new());
    handle.initialize(|| async move { Ok(service) }).await;

    TestApp {
        app: router(AppState { handle }),
        provider,
        store,
    }
}

async fn post_chat(app: Router, body: &Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn tool_call_reply() -> &'static str {
    "```tool\n{\"tool\": \"query_datasource\", \"arguments\": {\"measure\": \"sales\"}}\n```"
}

#[tokio::test]
async fn chat_turn_grounds_answer_in_tool_data() {
    let answer =
        "According to the datasource, West leads with 1000 in sales while East follows at 800.";
    let test = ready_app(
        vec![tool_call_reply(), answer],
        Duration::ZERO,
        Duration::from_secs(30),
    )
    .await;

    let (status, body) = post_chat(
        test.app.clone(),
        &json!({"message": "What is total sales by region?", "thread_id": "t1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let parsed: ChatResponse = serde_json::from_value(body).unwrap();
    assert_eq!(parsed.thread_id, "t1");
    for needle in ["West", "East", "1000", "800"] {
        assert!(parsed.response.contains(needle), "missing {needle}");
    }
    // Grounding: nothing outside the stub table shows up.
    assert!(!parsed.response.contains("North"));
    // The raw tool payload is not the answer.
    assert!(!parsed.response.contains("rows"));

    // Successful turn: user message plus final assistant message.
    let history = test.store.history(&ThreadId::from_string("t1")).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, answer);
}

#[tokio::test]
async fn missing_thread_id_starts_a_fresh_conversation() {
    let test = ready_app(
        vec!["Hello! Ask me about the data."],
        Duration::ZERO,
        Duration::from_secs(30),
    )
    .await;

    let (status, body) = post_chat(test.app.clone(), &json!({"message": "hi"})).await;
    assert_eq!(status, StatusCode::OK);

    let parsed: ChatResponse = serde_json::from_value(body).unwrap();
    assert!(!parsed.thread_id.is_empty());
    let history = test
        .store
        .history(&ThreadId::from_string(parsed.thread_id))
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn requests_before_ready_are_rejected() {
    let handle = Arc::new(AgentHandle::new());
    let app = router(AppState { handle });

    let (status, body) = post_chat(app.clone(), &json!({"message": "hi"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let err: ErrorResponse = serde_json::from_value(body).unwrap();
    assert_eq!(err.code, "AGENT_UNAVAILABLE");

    // Health stays reachable and reports the gate state.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["agent"], "uninitialized");
}

#[tokio::test]
async fn failed_initialization_keeps_rejecting_with_503() {
    // Nothing listens on port 1, so the MCP connect fails and the handle
    // lands in Failed.
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".into(),
        static_dir: "static".into(),
        transport: agent_mcp::TransportConfig::Http {
            url: "http://127.0.0.1:1/mcp".into(),
            headers: Vec::new(),
        },
        include_tools: Vec::new(),
        bound_args: Map::new(),
        llm: OpenAiConfig {
            api_key: "test-key".into(),
            ..OpenAiConfig::default()
        },
        model_id: "gpt-4.1".into(),
        temperature: 0.2,
        max_tokens: None,
        max_iterations: 10,
        system_prompt: "You are a data analyst.".into(),
        turn_timeout_secs: 30,
    };

    let handle = Arc::new(AgentHandle::new());
    handle
        .initialize(|| async {
            let (service, _client) = build_service(&config).await?;
            Ok(service)
        })
        .await;
    assert_eq!(handle.state().label(), "failed");

    let app = router(AppState { handle });
    let (status, body) = post_chat(app, &json!({"message": "hi"})).await;
    // Unavailable, never a turn error: the agent was never invoked.
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let err: ErrorResponse = serde_json::from_value(body).unwrap();
    assert_eq!(err.code, "AGENT_UNAVAILABLE");
}

#[tokio::test(start_paused = true)]
async fn timed_out_turn_returns_504_and_keeps_only_the_user_message() {
    let test = ready_app(
        vec!["too late"],
        Duration::from_secs(600),
        Duration::from_secs(1),
    )
    .await;

    let (status, body) = post_chat(
        test.app.clone(),
        &json!({"message": "slow question", "thread_id": "slow"}),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let err: ErrorResponse = serde_json::from_value(body).unwrap();
    assert_eq!(err.code, "TURN_TIMEOUT");

    assert_eq!(test.provider.calls(), 1);
    let history = test.store.history(&ThreadId::from_string("slow")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "slow question");
}

#[tokio::test]
async fn provider_failure_returns_500_and_keeps_only_the_user_message() {
    // Empty script: the very first completion call fails.
    let test = ready_app(Vec::new(), Duration::ZERO, Duration::from_secs(30)).await;

    let (status, body) = post_chat(
        test.app.clone(),
        &json!({"message": "hi", "thread_id": "t-err"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let err: ErrorResponse = serde_json::from_value(body).unwrap();
    assert_eq!(err.code, "AGENT_ERROR");

    let history = test.store.history(&ThreadId::from_string("t-err")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn turns_on_one_thread_accumulate_history() {
    let test = ready_app(
        vec!["First answer.", "Second answer."],
        Duration::ZERO,
        Duration::from_secs(30),
    )
    .await;

    for expected in ["First answer.", "Second answer."] {
        let (status, body) = post_chat(
            test.app.clone(),
            &json!({"message": "next", "thread_id": "t2"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let parsed: ChatResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.response, expected);
    }

    let history = test.store.history(&ThreadId::from_string("t2")).unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["next", "First answer.", "next", "Second answer."]
    );
    assert!(
        history
            .iter()
            .all(|m| matches!(m.role, Role::User | Role::Assistant))
    );
}

#[tokio::test]
async fn unknown_threads_have_empty_history() {
    let test = ready_app(Vec::new(), Duration::ZERO, Duration::from_secs(30)).await;
    let history = test
        .store
        .history(&ThreadId::from_string("never-seen"))
        .unwrap();
    assert!(history.is_empty());
}
