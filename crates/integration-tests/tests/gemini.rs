mod harness;

use axum::http::StatusCode;
use harness::mock_upstream::{MockUpstream, Reply, data};
use serde_json::json;
use synapse_providers::types::{EmbedInput, FinishReason, ToolDefinition};
use synapse_providers::{
    CompletionParams, EmbeddingParams, ErrorKind, Message, Provider, ProviderConfig, ProviderKind,
};
use tokio_util::sync::CancellationToken;

fn provider(mock: &MockUpstream) -> Box<dyn Provider> {
    let config = ProviderConfig::default()
        .with_api_key("g-test")
        .with_base_url(mock.url("/v1beta"));
    ProviderKind::Gemini.build(&config).unwrap()
}

fn text_event(text: &str) -> String {
    data(&json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
        "modelVersion": "gemini-2.5-flash"
    }))
}

#[tokio::test]
async fn completion_uses_model_path_and_key_header() {
    let mock = MockUpstream::start(|_| {
        Reply::ok(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "4"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 1, "totalTokenCount": 9}
        }))
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let params = CompletionParams::new(
        "gemini-2.5-flash",
        vec![Message::system("Answer with a number."), Message::user("What is 2+2?")],
    );
    let completion = provider.completion(&params).await.unwrap();

    assert!(completion.id.starts_with("gemini-"));
    assert_eq!(completion.model, "gemini-2.5-flash");
    assert_eq!(completion.message().unwrap().content.as_deref(), Some("4"));
    assert_eq!(completion.usage.unwrap().total_tokens, 9);

    let request = mock.last_request();
    assert_eq!(request.path, "/v1beta/models/gemini-2.5-flash:generateContent");
    assert_eq!(request.header("x-goog-api-key"), Some("g-test"));
    assert_eq!(request.body["systemInstruction"]["parts"][0]["text"], "Answer with a number.");
    assert_eq!(request.body["contents"][0]["role"], "user");
}

#[tokio::test]
async fn stream_yields_fragments_in_order() {
    let mock = MockUpstream::start(|_| {
        Reply::Sse(vec![
            text_event("4"),
            text_event(" ("),
            text_event(")"),
            data(&json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": ""}]}, "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 6, "candidatesTokenCount": 3}
            })),
        ])
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let chunks = provider
        .completion_stream(
            &CompletionParams::new("gemini-2.5-flash", vec![Message::user("What is 2+2?")]),
            CancellationToken::new(),
        )
        .unwrap()
        .collect_chunks()
        .await
        .unwrap();

    let texts: Vec<&str> = chunks.iter().filter_map(|c| c.content()).collect();
    assert_eq!(texts, ["4", " (", ")"]);

    let last = chunks.last().unwrap();
    assert_eq!(last.finish_reason(), Some(FinishReason::Stop));
    assert_eq!(last.usage.unwrap().total_tokens, 9);
    assert!(chunks.iter().all(|c| c.id == last.id));

    let request = mock.last_request();
    assert_eq!(request.path, "/v1beta/models/gemini-2.5-flash:streamGenerateContent");
    assert_eq!(request.query.as_deref(), Some("alt=sse"));
}

#[tokio::test]
async fn stream_function_call_sets_tool_calls_finish() {
    let mock = MockUpstream::start(|_| {
        Reply::Sse(vec![data(&json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "get_weather", "args": {"location": "Paris"}}}
                ]},
                "finishReason": "STOP"
            }]
        }))])
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let mut params = CompletionParams::new("gemini-2.5-flash", vec![Message::user("Weather in Paris?")]);
    params.tools = Some(vec![ToolDefinition::function(
        "get_weather",
        "Get current weather",
        json!({"type": "object", "properties": {"location": {"type": "string"}}, "required": ["location"]}),
    )]);
    let chunks = provider
        .completion_stream(&params, CancellationToken::new())
        .unwrap()
        .collect_chunks()
        .await
        .unwrap();

    let call = &chunks[0].delta().unwrap().tool_calls.as_ref().unwrap()[0];
    assert!(call.id.as_deref().unwrap().starts_with("call_"));
    assert_eq!(
        call.function.as_ref().unwrap().arguments.as_deref(),
        Some(r#"{"location":"Paris"}"#)
    );
    assert_eq!(chunks.last().unwrap().finish_reason(), Some(FinishReason::ToolCalls));

    let body = mock.last_request().body;
    assert_eq!(
        body["tools"][0]["functionDeclarations"][0]["parametersJsonSchema"]["required"],
        json!(["location"])
    );
}

#[tokio::test]
async fn quota_exhaustion_is_rate_limit() {
    let mock = MockUpstream::start(|_| {
        Reply::Json(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}),
        )
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let err = provider
        .completion(&CompletionParams::new("gemini-2.5-flash", vec![Message::user("hi")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.to_string(), "[gemini] rate limit exceeded: Resource has been exhausted");
}

#[tokio::test]
async fn models_follow_page_tokens() {
    let mock = MockUpstream::start(|req| {
        if req.query.as_deref() == Some("pageToken=next-1") {
            Reply::ok(json!({"models": [{"name": "models/text-embedding-004"}]}))
        } else {
            Reply::ok(json!({
                "models": [{"name": "models/gemini-2.5-flash"}, {"name": "models/gemini-2.5-pro"}],
                "nextPageToken": "next-1"
            }))
        }
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let models = provider.list_models().await.unwrap();
    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(
        ids,
        ["models/gemini-2.5-flash", "models/gemini-2.5-pro", "models/text-embedding-004"]
    );
    assert_eq!(mock.requests()[0].path, "/v1beta/models");
}

#[tokio::test]
async fn embeddings_are_batched() {
    let mock = MockUpstream::start(|_| {
        Reply::ok(json!({"embeddings": [{"values": [0.1, 0.2]}, {"values": [0.3, 0.4]}]}))
    })
    .await
    .unwrap();
    let provider = provider(&mock);

    let params = EmbeddingParams::new(
        "models/text-embedding-004",
        EmbedInput::Multiple(vec!["first".to_owned(), "second".to_owned()]),
    );
    let response = provider.embedding(&params).await.unwrap();

    assert_eq!(response.data.len(), 2);
    assert_eq!(response.data[1].embedding, vec![0.3, 0.4]);

    let request = mock.last_request();
    assert_eq!(request.path, "/v1beta/models/text-embedding-004:batchEmbedContents");
    assert_eq!(request.body["requests"][1]["model"], "models/text-embedding-004");
    assert_eq!(request.body["requests"][1]["content"]["parts"][0]["text"], "second");
}
