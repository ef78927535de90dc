use std::sync::Arc;

use genmedia_client::RetryPolicy;
use mascot_studio::{
    CredentialGuard, GenMediaConnector, MemoryCredentialStore, SceneOutcome, ScenePipeline,
    SceneRequest, SceneRunSummary, SceneStatus, StudioConfig,
};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "AIzaHttpTest";

fn pipeline_for(server: &MockServer) -> ScenePipeline {
    let config = StudioConfig {
        base_url: server.uri(),
        text_model: "text-model".to_string(),
        image_model: "image-model".to_string(),
        retry: RetryPolicy::immediate(3),
        ..StudioConfig::default()
    };
    let guard = CredentialGuard::new(Arc::new(MemoryCredentialStore::with_credential(KEY)))
        .with_env_var("MASCOT_STUDIO_HTTP_TEST_UNSET");
    ScenePipeline::new(Arc::new(GenMediaConnector::new(config)), guard)
}

fn breakdown_reply() -> serde_json::Value {
    let scenes = json!({ "scenes": [
        { "description": "The cup wakes up", "imagePrompt": "coffee cup stretching" },
        { "description": "The cup waves", "imagePrompt": "coffee cup waving" }
    ]});
    json!({ "candidates": [{ "content": { "parts": [{ "text": scenes.to_string() }] } }] })
}

#[tokio::test]
async fn rate_limited_scene_fails_after_retries_and_the_next_one_renders() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/text-model:generateContent"))
        .and(header("x-goog-api-key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(breakdown_reply()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/image-model:generateContent"))
        .and(body_string_contains("coffee cup stretching"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/image-model:generateContent"))
        .and(body_string_contains("coffee cup waving"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "QUJD" } }
            ]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline_for(&server);
    let outcome = assert_ok!(
        pipeline
            .submit(SceneRequest::new("A happy coffee cup says good morning").with_scene_count(2))
            .await
    );

    assert_eq!(
        outcome,
        SceneOutcome::Finished(SceneRunSummary {
            completed: 1,
            failed: 1
        })
    );

    let board = pipeline.snapshot();
    let statuses: Vec<SceneStatus> = board.scenes.iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![SceneStatus::Error, SceneStatus::Completed]);
    assert!(board.scenes[0].error.as_deref().unwrap().contains("429"));
    assert!(board.scenes[0].image_uri.is_none());
    assert_eq!(
        board.scenes[1].image_uri.as_deref(),
        Some("data:image/png;base64,QUJD")
    );
    assert!(board.batch_error.is_none());
}
