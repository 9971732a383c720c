mod harness;

use axum::http::StatusCode;
use harness::mock_upstream::{MockUpstream, Reply, event};
use serde_json::json;
use synapse_providers::types::{FinishReason, ReasoningEffort, ToolCall};
use synapse_providers::{CompletionParams, ErrorKind, Message, Provider, ProviderConfig, ProviderKind};
use tokio_util::sync::CancellationToken;

fn provider(mock: &MockUpstream) -> Box<dyn Provider> {
    let config = ProviderConfig::default()
        .with_api_key("sk-ant-test")
        .with_base_url(mock.url("/v1"));
    ProviderKind::Anthropic.build(&config).unwrap()
}

#[tokio::test]
async fn completion_sends_native_shape_and_headers() {
    let mock = MockUpstream::start(|_| {
        Reply::ok(json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [
                {"type": "thinking", "thinking": "Simple arithmetic.", "signature": "sig"},
                {"type": "text", "text": "4"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }))
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let mut params = CompletionParams::new(
        "claude-sonnet-4-5",
        vec![Message::system("Answer briefly."), Message::user("What is 2+2?")],
    );
    params.reasoning_effort = Some(ReasoningEffort::Low);
    let completion = provider.completion(&params).await.unwrap();

    let message = completion.message().unwrap();
    assert_eq!(completion.id, "msg_01");
    assert_eq!(message.content.as_deref(), Some("4"));
    assert_eq!(message.reasoning.as_ref().unwrap().content, "Simple arithmetic.");
    assert_eq!(completion.usage.unwrap().total_tokens, 15);

    let request = mock.last_request();
    assert_eq!(request.path, "/v1/messages");
    assert_eq!(request.header("x-api-key"), Some("sk-ant-test"));
    assert_eq!(request.header("anthropic-version"), Some("2023-06-01"));
    assert_eq!(request.body["system"], "Answer briefly.");
    assert_eq!(request.body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(request.body["thinking"], json!({"type": "enabled", "budget_tokens": 1024}));
    assert_eq!(request.body["max_tokens"], 4096);
}

#[tokio::test]
async fn consecutive_tool_results_share_one_user_turn() {
    let mock = MockUpstream::start(|_| {
        Reply::ok(json!({
            "id": "msg_02",
            "model": "claude-sonnet-4-5",
            "content": [{"type": "text", "text": "Paris is sunny, Rome is warm."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 30, "output_tokens": 8}
        }))
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let params = CompletionParams::new(
        "claude-sonnet-4-5",
        vec![
            Message::user("Weather in Paris and Rome?"),
            Message::assistant("").with_tool_calls(vec![
                ToolCall::new("toolu_1", "get_weather", r#"{"location":"Paris"}"#),
                ToolCall::new("toolu_2", "get_weather", r#"{"location":"Rome"}"#),
            ]),
            Message::tool("toolu_1", "sunny"),
            Message::tool("toolu_2", "warm"),
        ],
    );
    provider.completion(&params).await.unwrap();

    let messages = mock.last_request().body["messages"].clone();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["content"][0]["type"], "tool_use");
    assert_eq!(messages[1]["content"][1]["id"], "toolu_2");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
    assert_eq!(messages[2]["content"][1]["tool_use_id"], "toolu_2");
}

#[tokio::test]
async fn stream_reassembles_tool_use() {
    let mock = MockUpstream::start(|_| {
        Reply::Sse(vec![
            event("message_start", &json!({"type": "message_start", "message": {"id": "msg_03", "model": "claude-sonnet-4-5", "usage": {"input_tokens": 20, "output_tokens": 1}}})),
            event("content_block_start", &json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}})),
            event("content_block_delta", &json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Checking."}})),
            event("content_block_stop", &json!({"type": "content_block_stop", "index": 0})),
            event("content_block_start", &json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {}}})),
            event("content_block_delta", &json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"location\":"}})),
            event("content_block_delta", &json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"Paris\"}"}})),
            event("content_block_stop", &json!({"type": "content_block_stop", "index": 1})),
            event("ping", &json!({"type": "ping"})),
            event("message_delta", &json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 15}})),
            event("message_stop", &json!({"type": "message_stop"})),
        ])
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let chunks = provider
        .completion_stream(
            &CompletionParams::new("claude-sonnet-4-5", vec![Message::user("Weather in Paris?")]),
            CancellationToken::new(),
        )
        .unwrap()
        .collect_chunks()
        .await
        .unwrap();

    assert_eq!(chunks[0].content(), Some("Checking."));

    let arguments: String = chunks
        .iter()
        .filter_map(|c| c.delta()?.tool_calls.as_ref())
        .flatten()
        .filter(|call| call.id.as_deref() == Some("toolu_1"))
        .filter_map(|call| call.function.as_ref()?.arguments.clone())
        .collect();
    assert_eq!(arguments, r#"{"location":"Paris"}"#);

    let last = chunks.last().unwrap();
    assert_eq!(last.id, "msg_03");
    assert_eq!(last.finish_reason(), Some(FinishReason::ToolCalls));
    let usage = last.usage.unwrap();
    assert_eq!((usage.prompt_tokens, usage.completion_tokens), (20, 15));

    assert_eq!(mock.last_request().body["stream"], true);
}

#[tokio::test]
async fn in_band_overload_fails_stream() {
    let mock = MockUpstream::start(|_| {
        Reply::Sse(vec![
            event("message_start", &json!({"type": "message_start", "message": {"id": "msg_04", "model": "claude-sonnet-4-5"}})),
            event("content_block_delta", &json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hel"}})),
            event("error", &json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})),
        ])
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let (mut chunks, error) = provider
        .completion_stream(
            &CompletionParams::new("claude-sonnet-4-5", vec![Message::user("hi")]),
            CancellationToken::new(),
        )
        .unwrap()
        .into_parts();

    let mut received = Vec::new();
    while let Some(chunk) = chunks.recv().await {
        received.push(chunk);
    }
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].content(), Some("Hel"));

    let err = error.unwrap().await.unwrap();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn prompt_too_long_is_context_length() {
    let mock = MockUpstream::start(|_| {
        Reply::Json(
            StatusCode::BAD_REQUEST,
            json!({"type": "error", "error": {"type": "invalid_request_error", "message": "prompt is too long: 210000 tokens > 200000 maximum"}}),
        )
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let err = provider
        .completion(&CompletionParams::new("claude-sonnet-4-5", vec![Message::user("...")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContextLengthExceeded);
    assert_eq!(err.provider(), Some("anthropic"));
}
