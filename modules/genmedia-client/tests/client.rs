use std::time::Duration;

use genmedia_client::{
    AspectRatio, ClientConfig, GenMediaClient, GenMediaError, InlineImage, RetryPolicy,
};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key-123";

fn client_for(server: &MockServer) -> GenMediaClient {
    let config = ClientConfig::builder()
        .api_key(KEY)
        .base_url(server.uri())
        .retry(RetryPolicy::immediate(3))
        .poll_interval(Duration::from_millis(10))
        .poll_timeout(Some(Duration::from_secs(5)))
        .build();
    GenMediaClient::new(config).unwrap()
}

fn text_reply(text: &str) -> serde_json::Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

fn image_reply(mime: &str, data: &str) -> serde_json::Value {
    json!({ "candidates": [{ "content": { "parts": [
        { "text": "done" },
        { "inlineData": { "mimeType": mime, "data": data } }
    ]}}]})
}

// ---------------------------------------------------------------------------
// Structured completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn structured_completion_returns_scenes() {
    let server = MockServer::start().await;
    let reply = json!({ "scenes": [
        { "description": "Cup wakes up", "imagePrompt": "A cute coffee cup yawning" },
        { "description": "Cup pours", "imagePrompt": "A coffee cup pouring itself" }
    ]});

    Mock::given(method("POST"))
        .and(path("/models/gemini-3-pro-preview:generateContent"))
        .and(header("x-goog-api-key", KEY))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(&reply.to_string())))
        .expect(1)
        .mount(&server)
        .await;

    let scenes = assert_ok!(
        client_for(&server)
            .complete_structured("A coffee cup greets the morning", &[], 2)
            .await
    );

    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0].description, "Cup wakes up");
    assert_eq!(scenes[1].image_prompt, "A coffee cup pouring itself");
}

#[tokio::test]
async fn structured_completion_sends_references_verbatim_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-3-pro-preview:generateContent"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [
                { "text": "script" },
                { "inlineData": { "mimeType": "image/png", "data": "QUJD" } },
                { "inlineData": { "mimeType": "image/jpeg", "data": "REVG" } }
            ]}]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(text_reply(r#"{"scenes":[]}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let refs = vec![
        InlineImage::new("image/png", "QUJD"),
        InlineImage::new("image/jpeg", "REVG"),
    ];
    let scenes = client_for(&server)
        .complete_structured("script", &refs, 3)
        .await
        .unwrap();

    assert!(scenes.is_empty());
}

#[tokio::test]
async fn missing_reply_text_is_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .complete_structured("script", &[], 3)
        .await
        .unwrap_err();

    assert!(matches!(err, GenMediaError::EmptyResponse));
}

#[tokio::test]
async fn malformed_reply_is_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("not json at all")))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .complete_structured("script", &[], 3)
        .await
        .unwrap_err();

    assert!(matches!(err, GenMediaError::EmptyResponse));
}

// ---------------------------------------------------------------------------
// Retry behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limited_request_is_attempted_three_times() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate_image("prompt", AspectRatio::Square, &[])
        .await
        .unwrap_err();

    match err {
        GenMediaError::Api { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn bad_request_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid prompt"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate_image("prompt", AspectRatio::Square, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, GenMediaError::Api { status: 400, .. }));
}

#[tokio::test]
async fn server_error_then_success_recovers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_reply("image/png", "iVBOR")))
        .expect(1)
        .mount(&server)
        .await;

    let uri = client_for(&server)
        .generate_image("prompt", AspectRatio::Portrait, &[])
        .await
        .unwrap();

    assert_eq!(uri, "data:image/png;base64,iVBOR");
}

// ---------------------------------------------------------------------------
// Image generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_request_carries_aspect_and_size() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-3-pro-image-preview:generateContent"))
        .and(body_partial_json(json!({
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": "9:16", "imageSize": "1K" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_reply("image/jpeg", "/9j/4A")))
        .expect(1)
        .mount(&server)
        .await;

    let uri = client_for(&server)
        .generate_image("a teapot waving", AspectRatio::Portrait, &[])
        .await
        .unwrap();

    assert_eq!(uri, "data:image/jpeg;base64,/9j/4A");
}

#[tokio::test]
async fn text_only_image_reply_is_no_image_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(text_reply("I can't draw that")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate_image("prompt", AspectRatio::Square, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, GenMediaError::NoImageData));
}

// ---------------------------------------------------------------------------
// Video operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn video_is_submitted_polled_and_keyed() {
    let server = MockServer::start().await;
    let op_name = "models/veo-3.1-fast-generate-preview/operations/op123";

    Mock::given(method("POST"))
        .and(path("/models/veo-3.1-fast-generate-preview:predictLongRunning"))
        .and(header("x-goog-api-key", KEY))
        .and(body_partial_json(json!({
            "instances": [{ "image": { "bytesBase64Encoded": "QUJD", "mimeType": "image/png" } }],
            "parameters": { "aspectRatio": "16:9", "resolution": "720p", "sampleCount": 1 }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "name": op_name, "done": false })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{op_name}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "name": op_name, "done": false })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{op_name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name,
            "done": true,
            "response": { "generateVideoResponse": { "generatedSamples": [
                { "video": { "uri": "https://files.test/v/abc:download?alt=media" } }
            ]}}
        })))
        .mount(&server)
        .await;

    let uri = client_for(&server)
        .generate_video(
            "QUJD",
            "image/png",
            "veo-3.1-fast-generate-preview",
            AspectRatio::Landscape,
            "Hello there!",
        )
        .await
        .unwrap();

    assert_eq!(
        uri,
        format!("https://files.test/v/abc:download?alt=media&key={KEY}")
    );
}

#[tokio::test]
async fn dialogue_is_part_of_video_prompt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/veo-3.1-generate-preview:predictLongRunning"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "operations/x", "done": false })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let operation = client
        .submit_video(
            "QUJD",
            "image/webp",
            "veo-3.1-generate-preview",
            AspectRatio::Portrait,
            "Buy fresh bread!",
        )
        .await
        .unwrap();
    assert_eq!(operation.name, "operations/x");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["instances"][0]["prompt"].as_str().unwrap();
    assert!(prompt.contains("\"Buy fresh bread!\""));
    assert_eq!(body["parameters"]["aspectRatio"], "9:16");
}

#[tokio::test]
async fn failed_operation_surfaces_its_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/bad",
            "done": true,
            "error": { "code": 3, "message": "image rejected by safety filter" }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate_video(
            "QUJD",
            "image/png",
            "veo-3.1-fast-generate-preview",
            AspectRatio::Landscape,
            "hi",
        )
        .await
        .unwrap_err();

    match err {
        GenMediaError::Operation { code, message } => {
            assert_eq!(code, 3);
            assert!(message.contains("safety"));
        }
        other => panic!("expected Operation error, got {other:?}"),
    }
}

#[tokio::test]
async fn finished_operation_without_uri_is_no_video_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/empty",
            "done": true,
            "response": { "generateVideoResponse": { "generatedSamples": [] } }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate_video(
            "QUJD",
            "image/png",
            "veo-3.1-fast-generate-preview",
            AspectRatio::Landscape,
            "hi",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GenMediaError::NoVideoData));
}

#[tokio::test]
async fn operation_that_never_finishes_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "operations/slow", "done": false })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "operations/slow", "done": false })),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::builder()
        .api_key(KEY)
        .base_url(server.uri())
        .poll_interval(Duration::from_millis(20))
        .poll_timeout(Some(Duration::from_millis(100)))
        .build();
    let err = GenMediaClient::new(config)
        .unwrap()
        .generate_video(
            "QUJD",
            "image/png",
            "veo-3.1-fast-generate-preview",
            AspectRatio::Landscape,
            "hi",
        )
        .await
        .unwrap_err();

    match err {
        GenMediaError::Timeout { elapsed } => assert!(elapsed >= Duration::from_millis(100)),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn video_submission_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .submit_video(
            "QUJD",
            "image/png",
            "veo-3.1-fast-generate-preview",
            AspectRatio::Landscape,
            "hi",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GenMediaError::Api { status: 503, .. }));
}
