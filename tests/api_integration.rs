use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use tutor_agent::config::{AppConfig, LlmConfig, ServerConfig, SessionConfig};
use tutor_agent::llm::{ScriptedDriver, ScriptedReply};
use tutor_agent::school::InMemorySchoolStore;
use tutor_agent::server::{build_router, build_state};

fn test_config(request_timeout_secs: u64) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".into(),
            request_timeout_secs,
            body_limit_bytes: 64 * 1024,
        },
        sessions: SessionConfig {
            idle_timeout_secs: 0,
            max_sessions: 0,
            sweep_interval_secs: 60,
        },
        llm: LlmConfig {
            request_timeout_secs: 5,
        },
    })
}

fn setup(driver: ScriptedDriver) -> (TestServer, Arc<ScriptedDriver>, Arc<InMemorySchoolStore>) {
    let driver = Arc::new(driver);
    let store = Arc::new(InMemorySchoolStore::seeded());
    let state = build_state(test_config(30), driver.clone(), store.clone());
    let server = TestServer::new(build_router(state)).expect("test server");
    (server, driver, store)
}

#[tokio::test]
async fn health_check() {
    let (server, _, _) = setup(ScriptedDriver::echo());
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"status": "ok"}));
}

#[tokio::test]
async fn chat_replies_and_tracks_history() {
    let (server, _, _) = setup(ScriptedDriver::echo());

    let response = server
        .post("/api/agent/chat")
        .json(&json!({"studentName": "張小明", "message": "我的作業呢？"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["studentName"], "張小明");
    assert_eq!(body["response"], "echo: 我的作業呢？");
    assert!(body["timestamp"].is_string());

    let history: Value = server.get("/api/agent/chat-history/張小明").await.json();
    assert_eq!(history["userTurns"], 1);
    assert_eq!(history["assistantTurns"], 1);
    assert_eq!(history["summary"], "學生 張小明 的聊天記錄：共 1 個問題，1 個回應。");
}

#[tokio::test]
async fn chat_rejects_blank_fields() {
    let (server, driver, _) = setup(ScriptedDriver::echo());

    let response = server
        .post("/api/agent/chat")
        .json(&json!({"studentName": "  ", "message": "hi"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "學生姓名和訊息不能為空");

    let response = server
        .post("/api/agent/chat")
        .json(&json!({"studentName": "張小明"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert!(driver.requests().is_empty());
}

#[tokio::test]
async fn chat_runs_school_functions() {
    let (server, driver, _) = setup(ScriptedDriver::new([
        ScriptedReply::tool_call("get_student_homework", json!({"student_name": "張小明"})),
        ScriptedReply::text("你有兩份作業"),
    ]));

    let body: Value = server
        .post("/api/agent/chat")
        .json(&json!({"studentName": "張小明", "message": "我的作業"}))
        .await
        .json();
    assert_eq!(body["response"], "你有兩份作業");

    let requests = driver.requests();
    assert_eq!(requests.len(), 2);
    let tool_message = requests[1]
        .messages
        .iter()
        .find(|m| m["role"] == "tool")
        .expect("tool result fed back");
    let content = tool_message["content"].as_str().unwrap();
    assert!(content.contains("二次函數練習"), "{content}");
}

#[tokio::test]
async fn analyze_homework_saves_feedback() {
    let (server, _, store) = setup(ScriptedDriver::new([ScriptedReply::text("解題步驟清楚")]));

    let response = server
        .post("/api/agent/analyze-homework")
        .json(&json!({
            "studentName": "張小明",
            "homeworkTitle": "三角函數應用",
            "submittedContent": "sin 30 = 0.5",
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["feedback"], "解題步驟清楚");
    assert_eq!(body["homeworkTitle"], "三角函數應用");

    let data = store.snapshot().await;
    let hw = data
        .homework
        .iter()
        .find(|h| h.title == "三角函數應用")
        .unwrap();
    assert!(hw.feedback.as_deref().unwrap().contains("解題步驟清楚"));
}

#[tokio::test]
async fn analyze_homework_requires_all_fields() {
    let (server, _, _) = setup(ScriptedDriver::echo());
    let response = server
        .post("/api/agent/analyze-homework")
        .json(&json!({"studentName": "張小明", "homeworkTitle": "x"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "所有欄位都是必填的");
}

#[tokio::test]
async fn analyze_unknown_homework_returns_feedback_in_message() {
    let (server, _, _) = setup(ScriptedDriver::new([ScriptedReply::text("很好")]));
    let body: Value = server
        .post("/api/agent/analyze-homework")
        .json(&json!({
            "studentName": "張小明",
            "homeworkTitle": "不存在的作業",
            "submittedContent": "內容",
        }))
        .await
        .json();
    let feedback = body["feedback"].as_str().unwrap();
    assert!(feedback.contains("很好"), "{feedback}");
    assert!(feedback.contains("無法儲存"), "{feedback}");
}

#[tokio::test]
async fn daily_recommendation() {
    let (server, driver, _) = setup(ScriptedDriver::new([ScriptedReply::text("今天先複習二次函數")]));

    let body: Value = server
        .get("/api/agent/daily-recommendation/李小華")
        .await
        .json();
    assert_eq!(body["studentName"], "李小華");
    assert_eq!(body["recommendation"], "今天先複習二次函數");
    assert!(body["date"].is_string());

    // One-shot: no conversation is created.
    let history: Value = server.get("/api/agent/chat-history/李小華").await.json();
    assert_eq!(history["userTurns"], 0);
    assert_eq!(driver.requests().len(), 1);
}

#[tokio::test]
async fn clear_history_is_idempotent() {
    let (server, _, _) = setup(ScriptedDriver::echo());
    server
        .post("/api/agent/chat")
        .json(&json!({"studentName": "王小美", "message": "嗨"}))
        .await
        .assert_status_ok();

    let response = server.delete("/api/agent/chat-history/王小美").await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    let response = server.delete("/api/agent/chat-history/王小美").await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let history: Value = server.get("/api/agent/chat-history/王小美").await.json();
    assert_eq!(history["summary"], "尚無聊天記錄。");
}

#[tokio::test]
async fn rpc_initialize_and_list() {
    let (server, _, _) = setup(ScriptedDriver::echo());

    let body: Value = server
        .post("/mcp")
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
        .await
        .json();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert!(body.get("error").is_none());

    let body: Value = server
        .post("/mcp")
        .json(&json!({"jsonrpc": "2.0", "id": "abc", "method": "tools/list"}))
        .await
        .json();
    assert_eq!(body["id"], "abc");
    let names: Vec<&str> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "query_student_homework",
            "get_student_profile",
            "list_courses",
            "recommend_courses",
            "chat_with_student",
            "analyze_homework",
        ]
    );
}

#[tokio::test]
async fn rpc_tools_call_routes_through_agent() {
    let (server, driver, _) = setup(ScriptedDriver::echo());

    let body: Value = server
        .post("/mcp")
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "chat_with_student", "arguments": {"student_name": "張小明", "query": "你好"}},
        }))
        .await
        .json();
    assert_eq!(body["result"]["isError"], false);
    assert_eq!(body["result"]["content"][0]["type"], "text");
    assert_eq!(body["result"]["content"][0]["text"], "echo: 你好");
    assert_eq!(driver.requests().len(), 1);
}

#[tokio::test]
async fn rpc_protocol_errors() {
    let (server, _, _) = setup(ScriptedDriver::echo());

    let body: Value = server.post("/mcp").text("{oops").await.json();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
    assert!(body.get("result").is_none());

    let body: Value = server
        .post("/mcp")
        .json(&json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}))
        .await
        .json();
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["id"], 3);

    let body: Value = server
        .post("/mcp")
        .json(&json!({"jsonrpc": "1.0", "id": 4, "method": "initialize"}))
        .await
        .json();
    assert_eq!(body["error"]["code"], -32600);

    let body: Value = server
        .post("/mcp")
        .json(&json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "chat_with_student", "arguments": {"student_name": "張小明"}}}))
        .await
        .json();
    assert_eq!(body["result"]["isError"], true);
}

#[tokio::test]
async fn rest_tool_endpoints() {
    let (server, _, _) = setup(ScriptedDriver::echo());

    let body: Value = server.get("/api/agent/mcp/tools").await.json();
    assert_eq!(body["tools"].as_array().unwrap().len(), 6);
    assert_eq!(body["tools"][0]["inputSchema"]["required"], json!(["student_name"]));

    let response = server
        .post("/api/agent/mcp/call")
        .json(&json!({"arguments": {}}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "工具名稱不能為空");

    let body: Value = server
        .post("/api/agent/mcp/call")
        .json(&json!({"name": "get_student_profile", "arguments": {"student_name": "李小華"}}))
        .await
        .json();
    assert_eq!(body["isError"], false);
}

#[tokio::test]
async fn slow_requests_time_out() {
    let driver = Arc::new(ScriptedDriver::new([]).with_fallback(ScriptedReply::Hang));
    let state = build_state(
        test_config(1),
        driver,
        Arc::new(InMemorySchoolStore::seeded()),
    );
    let server = TestServer::new(build_router(state)).expect("test server");

    let response = tokio::time::timeout(
        Duration::from_secs(10),
        server
            .post("/api/agent/chat")
            .json(&json!({"studentName": "張小明", "message": "hi"})),
    )
    .await
    .expect("middleware should answer first");
    assert_eq!(response.status_code(), StatusCode::REQUEST_TIMEOUT);
}
