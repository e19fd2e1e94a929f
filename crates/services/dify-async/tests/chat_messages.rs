use std::time::Duration;

use dify_async::streaming::StreamEvent;
use dify_async::test_support::EnvGuard;
use dify_async::{CancelReason, ChatRequest, ChatResult, Client, DifyConfig, DifyError};
use futures::StreamExt;
use serial_test::serial;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> Client<DifyConfig> {
    let config = DifyConfig::new()
        .with_api_base(format!("{}/v1", server.uri()))
        .with_api_key("app-test-key");
    Client::with_config(config)
}

fn sse(lines: &[&str]) -> ResponseTemplate {
    let mut body = lines.join("\n");
    body.push('\n');
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream")
}

#[tokio::test]
async fn chat_sends_wire_body_and_accumulates_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .and(header("authorization", "Bearer app-test-key"))
        .and(body_json(serde_json::json!({
            "inputs": { "user_id": "42" },
            "query": "Số dư trong ví?",
            "response_mode": "streaming",
            "conversation_id": "",
            "user": "user-42",
        })))
        .respond_with(sse(&[
            r#"data: {"event":"agent_message","answer":"Số dư: ","conversation_id":"conv-1"}"#,
            "",
            r#"data: {"event":"agent_thought","thought":"looking up wallets"}"#,
            r#"data: {"event":"agent_message","answer":"5.000.000đ","conversation_id":"conv-1"}"#,
            r#"data: {"event":"message_end","conversation_id":"conv-1"}"#,
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.chat("Số dư trong ví?", "42", None).await.unwrap();

    assert_eq!(
        result,
        ChatResult {
            answer: "Số dư: 5.000.000đ".into(),
            conversation_id: "conv-1".into(),
        }
    );
}

#[tokio::test]
async fn existing_conversation_id_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .and(body_partial_json(serde_json::json!({ "conversation_id": "abc" })))
        .respond_with(sse(&[
            r#"data: {"event":"message","answer":"again"}"#,
            r#"data: {"event":"message_end","conversation_id":"abc"}"#,
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.chat("more", "42", Some("abc")).await.unwrap();
    assert_eq!(result.answer, "again");
    assert_eq!(result.conversation_id, "abc");
}

#[tokio::test]
async fn non_success_status_surfaces_body_verbatim() {
    let server = MockServer::start().await;
    let body = r#"{"code":"unauthorized","message":"Access token is invalid","status":401}"#;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string(body))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.chat("hi", "1", None).await.unwrap_err();

    assert_eq!(err.to_string(), body);
    match err {
        DifyError::Api(obj) => {
            assert_eq!(obj.status_code, Some(401));
            assert_eq!(obj.code.as_deref(), Some("unauthorized"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_event_fails_the_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(sse(&[
            r#"data: {"event":"message","answer":"Tổng chi "}"#,
            r#"data: {"event":"message","answer":"tiêu"}"#,
            r#"data: {"event":"error","message":"Model rate limit exceeded","code":"completion_request_error","status":429}"#,
        ]))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.chat("hi", "1", None).await.unwrap_err();

    match err {
        DifyError::Upstream(event) => {
            assert_eq!(event.message, "Model rate limit exceeded");
            assert_eq!(event.code.as_deref(), Some("completion_request_error"));
            assert_eq!(event.status, Some(429));
        }
        other => panic!("expected Upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_line_is_skipped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(sse(&[
            r#"data: {"event":"message","answer":"one "}"#,
            r#"data: {"event":"message","answ"#,
            "data: [debug] heartbeat",
            r#"data: {"event":"message","answer":"two"}"#,
            r#"data: {"event":"message_end","conversation_id":"c"}"#,
        ]))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.chat("hi", "1", None).await.unwrap();
    assert_eq!(result.answer, "one two");
    assert_eq!(result.conversation_id, "c");
}

#[tokio::test]
async fn body_without_trailing_newline_keeps_last_event() {
    let server = MockServer::start().await;
    let body = "data: {\"event\":\"message\",\"answer\":\"x\"}\n\
                data: {\"event\":\"message_end\",\"conversation_id\":\"last\"}";

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.chat("hi", "1", None).await.unwrap();
    assert_eq!(result.conversation_id, "last");
}

#[tokio::test]
async fn replaying_the_same_stream_is_deterministic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(sse(&[
            r#"data: {"event":"message","answer":"a\"b\\c\n"}"#,
            r#"data: {"event":"message","answer":"ü"}"#,
            r#"data: {"event":"message_end","conversation_id":"z"}"#,
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let first = client.chat("hi", "1", None).await.unwrap();
    let second = client.chat("hi", "1", None).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.answer, "a\"b\\c\nü");
}

#[tokio::test]
async fn concurrent_turns_are_independent() {
    let server = MockServer::start().await;

    for (query, answer, conversation) in [("a", "alpha", "c-a"), ("b", "beta", "c-b")] {
        Mock::given(method("POST"))
            .and(path("/v1/chat-messages"))
            .and(body_partial_json(serde_json::json!({ "query": query })))
            .respond_with(
                sse(&[
                    format!(r#"data: {{"event":"message","answer":"{answer}"}}"#).as_str(),
                    format!(r#"data: {{"event":"message_end","conversation_id":"{conversation}"}}"#)
                        .as_str(),
                ])
                .set_delay(Duration::from_millis(if query == "a" { 50 } else { 0 })),
            )
            .mount(&server)
            .await;
    }

    let client = test_client(&server);
    let (a, b) = tokio::join!(client.chat("a", "1", None), client.chat("b", "1", None));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!((a.answer.as_str(), a.conversation_id.as_str()), ("alpha", "c-a"));
    assert_eq!((b.answer.as_str(), b.conversation_id.as_str()), ("beta", "c-b"));
}

#[tokio::test]
async fn turn_timeout_cancels() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(
            sse(&[r#"data: {"event":"message","answer":"late"}"#])
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = DifyConfig::new()
        .with_api_base(format!("{}/v1", server.uri()))
        .with_api_key("app-test-key")
        .with_turn_timeout(Duration::from_millis(100));
    let client = Client::with_config(config);

    let err = client.chat("hi", "1", None).await.unwrap_err();
    assert!(matches!(err, DifyError::Cancelled(CancelReason::TimedOut)));
}

#[tokio::test]
async fn caller_abort_cancels_in_flight_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(
            sse(&[r#"data: {"event":"message","answer":"late"}"#])
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client
        .chat_messages()
        .create_with_cancel(ChatRequest::new("hi", "1"), token)
        .await
        .unwrap_err();
    assert!(matches!(err, DifyError::Cancelled(CancelReason::Aborted)));
}

#[tokio::test]
async fn blank_user_id_is_rejected_before_sending() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.chat("hi", "", None).await.unwrap_err();
    assert!(matches!(err, DifyError::InvalidRequest(_)));
}

#[tokio::test]
#[serial(env)]
async fn missing_credentials_fail_before_sending() {
    let _env = EnvGuard::apply(&[("DIFY_API_KEY", None)]);
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = Client::with_config(DifyConfig::new().with_api_base(server.uri()));
    let err = client.chat("hi", "1", None).await.unwrap_err();
    assert!(matches!(err, DifyError::Config(_)));
}

#[tokio::test]
async fn connection_refused_is_a_retryable_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = Client::with_config(
        DifyConfig::new()
            .with_api_base(uri)
            .with_api_key("app-test-key"),
    );
    let err = client.chat("hi", "1", None).await.unwrap_err();
    assert!(matches!(err, DifyError::Reqwest(_)), "got {err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn create_stream_yields_events_live() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(sse(&[
            r#"data: {"event":"message","answer":"Hel"}"#,
            "data: not-json",
            r#"data: {"event":"message","answer":"lo"}"#,
            r#"data: {"event":"message_end","conversation_id":"abc"}"#,
        ]))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let events: Vec<StreamEvent> = client
        .chat_messages()
        .create_stream(ChatRequest::new("hi", "1"))
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    let fragments: Vec<_> = events.iter().filter_map(StreamEvent::answer_fragment).collect();
    assert_eq!(fragments, ["Hel", "lo"]);
    assert_eq!(
        events.last(),
        Some(&StreamEvent::MessageEnd {
            conversation_id: Some("abc".into())
        })
    );
}

#[tokio::test]
async fn create_stream_reports_status_errors_eagerly() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = match client
        .chat_messages()
        .create_stream(ChatRequest::new("hi", "1"))
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert_eq!(err.to_string(), "service unavailable");
    assert!(err.is_retryable());
}

#[tokio::test]
#[serial(env)]
async fn huge_env_turn_timeout_does_not_panic() {
    let _env = EnvGuard::apply(&[("DIFY_TURN_TIMEOUT_SECS", Some("18446744073709551615"))]);
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(sse(&[r#"data: {"event":"message","answer":"fine"}"#]))
        .mount(&server)
        .await;

    let result = test_client(&server).chat("hi", "1", None).await.unwrap();
    assert_eq!(result.answer, "fine");
}
