//! End-to-end tests: stdin bytes → HTTP mock server → stdout bytes.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcp_bridge::bridge::{BridgeOptions, BridgeSummary, run_bridge};
use mcp_bridge_core::config::BridgeConfig;
use mcp_bridge_core::retry::BackoffPolicy;
use mcp_bridge_core::transport::HttpTransport;

// ─────────────────────────────────────────────────────────────────────────────
// Test Harness
// ─────────────────────────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> BridgeConfig {
    let mut config = BridgeConfig::with_uri(format!("{}/mcp", server.uri()));
    config.timeout = Duration::from_secs(5);
    config.backoff = BackoffPolicy {
        initial: Duration::from_millis(10),
        max: Duration::from_millis(50),
    };
    config
}

/// Run the bridge over `input` against `config` and return stdout.
async fn bridge(config: &BridgeConfig, input: &str) -> (String, BridgeSummary) {
    let input: &'static [u8] = Box::leak(input.as_bytes().to_vec().into_boxed_slice());
    let transport = HttpTransport::new(config).unwrap();
    let mut out = Vec::new();
    let summary = run_bridge(
        input,
        &mut out,
        transport,
        BridgeOptions::from(config),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    (String::from_utf8(out).unwrap(), summary)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ping_pong() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_string(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"jsonrpc":"2.0","id":1,"result":"pong"}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (out, summary) = bridge(
        &config_for(&server),
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
    )
    .await;

    assert_eq!(out, "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":\"pong\"}\n");
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_event_stream_yields_two_lines() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n\
             data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{}}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let (out, summary) = bridge(
        &config_for(&server),
        "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\"}\n",
    )
    .await;

    assert_eq!(
        out,
        "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\
         {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{}}\n"
    );
    assert_eq!(summary.pump.outputs, 2);
}

#[tokio::test]
async fn test_server_error_forwarded_once_then_next_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string(r#"{"id":1}"#))
        .respond_with(ResponseTemplate::new(500).set_body_raw(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"internal"}}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string(r#"{"id":2}"#))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"id":2,"result":{}}"#, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let (out, _) = bridge(&config_for(&server), "{\"id\":1}\n{\"id\":2}\n").await;

    assert_eq!(
        out,
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32603,\"message\":\"internal\"}}\n\
         {\"id\":2,\"result\":{}}\n"
    );
}

#[tokio::test]
async fn test_notification_accepted_without_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let (out, summary) = bridge(
        &config_for(&server),
        "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
    )
    .await;

    assert!(out.is_empty());
    assert_eq!(summary.pump.delivered, 1);
}

#[tokio::test]
async fn test_responses_follow_input_order() {
    let server = MockServer::start().await;
    for id in 1..=5u64 {
        // Earlier requests answer slower; order must still hold.
        Mock::given(method("POST"))
            .and(body_string(format!("{{\"id\":{id}}}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(format!("{{\"id\":{id},\"result\":{{}}}}"), "application/json")
                    .set_delay(Duration::from_millis(50 * (6 - id))),
            )
            .mount(&server)
            .await;
    }

    let input: String = (1..=5).map(|id| format!("{{\"id\":{id}}}\n")).collect();
    let (out, _) = bridge(&config_for(&server), &input).await;

    let expected: String = (1..=5)
        .map(|id| format!("{{\"id\":{id},\"result\":{{}}}}\n"))
        .collect();
    assert_eq!(out, expected);
}

#[tokio::test]
async fn test_timeout_retried_until_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"late":true}"#, "application/json")
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"))
        .with_priority(2)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.timeout = Duration::from_millis(200);
    let (out, summary) = bridge(&config, "{\"id\":1}\n").await;

    assert_eq!(out, "{\"ok\":true}\n");
    assert_eq!(summary.pump.delivered, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_event_stream_yields_silence_and_continues() {
    let server = MockServer::start().await;
    let mut bad = b"data: {\"id\":1}\n\ndata: ".to_vec();
    bad.extend_from_slice(&[0xc3, 0x28]);
    bad.extend_from_slice(b"\n\n");
    Mock::given(method("POST"))
        .and(body_string(r#"{"id":1}"#))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bad, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string(r#"{"id":2}"#))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"id":2}"#, "application/json"))
        .mount(&server)
        .await;

    let (out, summary) = bridge(&config_for(&server), "{\"id\":1}\n{\"id\":2}\n").await;

    assert_eq!(out, "{\"id\":2}\n");
    assert_eq!(summary.pump.failed, 1);
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_pretty_printed_body_written_on_one_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\n  \"jsonrpc\": \"2.0\",\n  \"id\": 1,\n  \"result\": {}\n}\n",
            "application/json",
        ))
        .mount(&server)
        .await;

    let (out, _) = bridge(&config_for(&server), "{\"id\":1}\n").await;
    assert_eq!(out, "{\"jsonrpc\": \"2.0\",\"id\": 1,\"result\": {}}\n");
}

#[tokio::test]
async fn test_pretty_printed_big_numbers_reach_stdout_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\n  \"id\": 123456789012345678901234567890,\n  \"p\": 1.50\n}\n",
            "application/json",
        ))
        .mount(&server)
        .await;

    let (out, _) = bridge(&config_for(&server), "{\"id\":1}\n").await;
    assert_eq!(out, "{\"id\": 123456789012345678901234567890,\"p\": 1.50}\n");
    assert_eq!(out.lines().count(), 1);
}

#[tokio::test]
async fn test_multiline_error_text_written_on_one_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_raw("upstream exploded\nstack trace", "text/plain"),
        )
        .mount(&server)
        .await;

    let (out, summary) = bridge(&config_for(&server), "{\"id\":1}\n").await;
    assert_eq!(out, "upstream exploded stack trace\n");
    assert_eq!(summary.pump.delivered, 1);
}
