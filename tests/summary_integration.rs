//! Integration tests for the Gemini summarizer using wiremock.

mod support;

use std::time::Duration;

use papertag_core::summary::{GeminiSummarizer, MISSING_REPORT, Summarizer, SummaryError};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use support::start_mock_server_or_skip;

const ENDPOINT: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn candidate(payload: &serde_json::Value) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": payload.to_string() }] }
        }]
    })
}

#[tokio::test]
async fn test_summarize_returns_report_and_tags() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_string_contains("graph neural networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(&json!({
            "report": "Intro.\nFindings.\nConclusion.",
            "tags": ["Graphs", "Message Passing"]
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let summarizer = GeminiSummarizer::with_base_url("test-key", server.uri()).unwrap();
    let summary = summarizer
        .summarize("We study graph neural networks.")
        .await
        .unwrap();

    assert_eq!(summary.report, "Intro.\nFindings.\nConclusion.");
    assert_eq!(summary.suggested_tags, vec!["Graphs", "Message Passing"]);
}

#[tokio::test]
async fn test_missing_report_gets_placeholder() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(candidate(&json!({ "tags": ["x"] }))),
        )
        .mount(&server)
        .await;

    let summarizer = GeminiSummarizer::with_base_url("k", server.uri()).unwrap();
    let summary = summarizer.summarize("some text").await.unwrap();

    assert_eq!(summary.report, MISSING_REPORT);
}

#[tokio::test]
async fn test_server_error_is_transient_status() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let summarizer = GeminiSummarizer::with_base_url("k", server.uri()).unwrap();
    let err = summarizer.summarize("some text").await.unwrap_err();

    match &err {
        SummaryError::Status { status, message } => {
            assert_eq!(*status, 500);
            assert!(message.contains("backend exploded"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate(&json!({ "report": "late", "tags": [] })))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let summarizer = GeminiSummarizer::with_base_url("k", server.uri())
        .unwrap()
        .with_timeout(Duration::from_millis(200));
    let err = summarizer.summarize("some text").await.unwrap_err();

    assert!(matches!(err, SummaryError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn test_non_json_candidate_is_malformed() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Here you go!" }] } }]
        })))
        .mount(&server)
        .await;

    let summarizer = GeminiSummarizer::with_base_url("k", server.uri()).unwrap();
    let err = summarizer.summarize("some text").await.unwrap_err();

    assert!(matches!(err, SummaryError::Malformed(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_input_is_cut_to_character_budget() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("abcde\\n---"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate(&json!({ "report": "ok", "tags": [] }))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let summarizer = GeminiSummarizer::with_base_url("k", server.uri())
        .unwrap()
        .with_max_input_chars(5);
    let summary = summarizer.summarize("abcdefghij").await.unwrap();

    assert_eq!(summary.report, "ok");
}
