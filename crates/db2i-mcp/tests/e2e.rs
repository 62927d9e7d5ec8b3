//! End-to-end tool-call scenarios against the fake gateway.

mod common;

use common::FakeGateway;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::{json, Value};

use db2i_core::config::Config;
use db2i_core::loader::ConfigSource;
use db2i_core::settings::Settings;
use db2i_mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use db2i_mcp::{reload, McpServer};

fn sample_config(gateway: &FakeGateway) -> Config {
    Config::from_yaml(&format!(
        r#"
sources:
  default:
    host: 127.0.0.1
    port: {port}
    user: TESTER
    password: pw
    secure: false

tools:
  system_status:
    source: default
    description: One-row system sanity check
    statement: SELECT 1 AS X FROM SYSIBM.SYSDUMMY1
    responseFormat: markdown

  object_usage:
    source: default
    description: Unused objects
    statement: >-
      SELECT * FROM T WHERE OBJTYPE = :sql_object_type
      AND LIB IN (:library_list) AND MONTHS > :months_unused
    parameters:
      - name: sql_object_type
        type: string
        enum: [INDEX, TABLE]
      - name: months_unused
        type: integer
        min: 1
        max: 120
        default: 1
      - name: library_list
        type: array
        itemType: string
        maxLength: 50

toolsets:
  monitoring:
    tools: [system_status]
"#,
        port = gateway.addr.port()
    ))
    .unwrap()
}

fn server(gateway: &FakeGateway, settings: Settings) -> Arc<McpServer> {
    Arc::new(
        McpServer::new(settings, sample_config(gateway), Vec::new(), Vec::new()).unwrap(),
    )
}

fn rpc(method: &str, params: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".into(),
        id: Some(json!(1)),
        method: method.into(),
        params: Some(params),
    }
}

async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    let response: JsonRpcResponse = server
        .handle_request(
            rpc("tools/call", json!({"name": name, "arguments": arguments})),
            None,
        )
        .await
        .unwrap();
    assert!(response.error.is_none(), "{response:?}");
    response.result.unwrap()
}

#[tokio::test]
async fn basic_select_returns_typed_markdown() {
    let gateway = FakeGateway::spawn().await;
    let server = server(&gateway, Settings::default());

    let result = call_tool(&server, "system_status", json!({})).await;

    let structured = &result["structuredContent"];
    assert_eq!(structured["success"], true);
    assert_eq!(structured["data"][0]["X"], 1);
    assert_eq!(structured["metadata"]["rowCount"], 1);
    assert_eq!(structured["metadata"]["toolName"], "system_status");

    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("## system_status"));
    assert!(text.contains("1 row"));
    assert!(text.contains("X (INTEGER)"));
    assert!(result.get("isError").is_none() || result["isError"] == Value::Null);
}

#[tokio::test]
async fn destructive_statement_rejected_before_gateway() {
    let gateway = FakeGateway::spawn().await;
    let settings = Settings {
        execute_sql_enabled: true,
        ..Default::default()
    };
    let server = server(&gateway, settings);

    let result = call_tool(&server, "execute_sql", json!({"sql": "DROP TABLE users"})).await;

    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("restricted keyword"));
    assert_eq!(result["structuredContent"]["errorCode"], "VALIDATION_ERROR");
    // Policy rejection happens before any gateway contact.
    assert_eq!(gateway.connects.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.executes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn binding_validates_enum_and_applies_defaults() {
    let gateway = FakeGateway::spawn().await;
    let server = server(&gateway, Settings::default());

    // Valid call: three-element array expands, default fills months_unused.
    let result = call_tool(
        &server,
        "object_usage",
        json!({"sql_object_type": "INDEX", "library_list": ["A", "B", "C"]}),
    )
    .await;
    let metadata = &result["structuredContent"]["metadata"];
    assert_eq!(metadata["parameterCount"], 5);
    assert!(metadata["sqlStatement"]
        .as_str()
        .unwrap()
        .contains("IN (?, ?, ?)"));
    assert_eq!(
        metadata["processedParameters"],
        json!(["sql_object_type", "library_list", "months_unused"])
    );

    // Enum violation is refused without touching the gateway again.
    let before = gateway.executes.load(Ordering::SeqCst);
    let rejected = call_tool(
        &server,
        "object_usage",
        json!({"sql_object_type": "VIEW", "library_list": ["A"]}),
    )
    .await;
    assert_eq!(rejected["isError"], true);
    assert_eq!(
        rejected["structuredContent"]["errorCode"],
        "VALIDATION_ERROR"
    );
    assert_eq!(gateway.executes.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn concurrent_calls_share_one_pool() {
    let gateway = FakeGateway::spawn().await;
    let server = server(&gateway, Settings::default());

    let (a, b) = tokio::join!(
        call_tool(&server, "system_status", json!({})),
        call_tool(&server, "system_status", json!({})),
    );
    assert_eq!(a["structuredContent"]["success"], true);
    assert_eq!(b["structuredContent"]["success"], true);
    assert_eq!(gateway.connects.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.executes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn paginated_result_is_aggregated_in_order() {
    let gateway = FakeGateway::spawn_paged(4).await;
    let server = server(&gateway, Settings::default());

    let result = call_tool(&server, "system_status", json!({})).await;
    let structured = &result["structuredContent"];
    assert_eq!(structured["success"], true);
    // One row from the execute frame plus one per fetch round, in order.
    assert_eq!(structured["metadata"]["rowCount"], 5);
    assert_eq!(structured["data"].as_array().unwrap().len(), 5);
    assert_eq!(gateway.fetches.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn unknown_tool_reports_not_found() {
    let gateway = FakeGateway::spawn().await;
    let server = server(&gateway, Settings::default());

    let result = call_tool(&server, "ghost", json!({})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["errorCode"], "NOT_FOUND");
}

#[tokio::test]
async fn hot_reload_swaps_registry_without_touching_captured_descriptors() {
    let gateway = FakeGateway::spawn().await;
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("tools.yaml");

    let yaml = |description: &str| {
        format!(
            r#"
sources:
  default:
    host: 127.0.0.1
    port: {port}
    user: TESTER
    password: pw
    secure: false
tools:
  t:
    source: default
    description: {description}
    statement: SELECT 1 AS X FROM SYSIBM.SYSDUMMY1
"#,
            port = gateway.addr.port()
        )
    };
    std::fs::write(&path, yaml("A")).unwrap();

    let sources = vec![ConfigSource::file(path.to_string_lossy())];
    let outcome = db2i_core::loader::load(&sources, &Default::default());
    assert!(outcome.success, "{:?}", outcome.errors);

    let server = Arc::new(
        McpServer::new(
            Settings::default(),
            outcome.config.unwrap(),
            sources,
            outcome.resolved_paths,
        )
        .unwrap(),
    );

    // An in-flight call would hold this snapshot; it must survive the swap.
    let old_registry = server.state().registry_snapshot();
    let old_descriptor = old_registry.get("t").unwrap().clone();
    assert_eq!(old_descriptor.description, "A");

    std::fs::write(&path, yaml("B")).unwrap();
    assert!(reload::reload(&server).await);

    let listed = server
        .handle_request(rpc("tools/list", json!({})), None)
        .await
        .unwrap();
    let tools = listed.result.unwrap()["tools"].clone();
    assert_eq!(tools[0]["description"], "B");

    // The captured descriptor still describes the old tool.
    assert_eq!(old_descriptor.description, "A");
    assert_eq!(old_registry.get("t").unwrap().description, "A");
}

#[tokio::test]
async fn cancellation_aborts_an_in_flight_call() {
    // The gateway answers `connect` but never `execute`, so the call parks
    // at its first suspension point until cancelled.
    let gateway = FakeGateway::spawn_unresponsive().await;
    let server = server(&gateway, Settings::default());

    let call_server = server.clone();
    let call = tokio::spawn(async move {
        call_server
            .handle_request(
                rpc(
                    "tools/call",
                    json!({"name": "system_status", "arguments": {}}),
                ),
                None,
            )
            .await
            .unwrap()
    });

    // Let the call reach the gateway, then cancel it by request id.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(gateway.executes.load(Ordering::SeqCst), 1);
    let note = JsonRpcRequest {
        jsonrpc: "2.0".into(),
        id: None,
        method: "notifications/cancelled".into(),
        params: Some(json!({"requestId": 1})),
    };
    assert!(server.handle_request(note, None).await.is_none());

    let response = tokio::time::timeout(std::time::Duration::from_secs(5), call)
        .await
        .expect("cancelled call must return")
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["errorCode"], "CANCELLED");
}

#[tokio::test]
async fn broken_reload_keeps_previous_registry() {
    let gateway = FakeGateway::spawn().await;
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("tools.yaml");
    std::fs::write(
        &path,
        format!(
            r#"
sources:
  default:
    host: 127.0.0.1
    port: {port}
    user: TESTER
    password: pw
    secure: false
tools:
  t:
    source: default
    statement: SELECT 1 FROM SYSIBM.SYSDUMMY1
"#,
            port = gateway.addr.port()
        ),
    )
    .unwrap();

    let sources = vec![ConfigSource::file(path.to_string_lossy())];
    let outcome = db2i_core::loader::load(&sources, &Default::default());
    let server = Arc::new(
        McpServer::new(
            Settings::default(),
            outcome.config.unwrap(),
            sources,
            outcome.resolved_paths,
        )
        .unwrap(),
    );

    std::fs::write(&path, "tools:\n  broken: [unclosed\n").unwrap();
    assert!(!reload::reload(&server).await);

    // The old tool still serves.
    let result = call_tool(&server, "t", json!({})).await;
    assert_eq!(result["structuredContent"]["success"], true);
}
