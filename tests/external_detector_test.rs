//! Integration tests for the external language-model detector against a
//! mock Ollama-compatible server

use pseudonym::anonymization::config::{AnonymizationConfig, DetectionMode, ExternalServiceConfig};
use pseudonym::anonymization::detector::external::{
    ExternalServiceDetector, FALLBACK_CONFIDENCE, LOCATED_CONFIDENCE,
};
use pseudonym::anonymization::models::{DetectionSource, EntityType};
use pseudonym::anonymization::AnonymizationEngine;
use pseudonym::domain::DetectionError;

const DOCUMENT: &str = "Le demandeur, Jean Dupont, représenté par le cabinet Ardoise Conseil, \
sollicite la résolution du bail.";

fn service_config(base_url: String) -> ExternalServiceConfig {
    ExternalServiceConfig {
        enabled: true,
        base_url,
        timeout_seconds: 5,
        availability_timeout_seconds: 2,
        ..ExternalServiceConfig::default()
    }
}

fn model_answer(json: &str) -> String {
    serde_json::json!({ "model": "llama3.1:8b", "response": json, "done": true }).to_string()
}

#[tokio::test]
async fn test_entities_are_relocated_in_the_document() {
    let mut server = mockito::Server::new_async().await;
    let tags = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(r#"{"models": []}"#)
        .create_async()
        .await;
    let generate = server
        .mock("POST", "/api/generate")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"model": "llama3.1:8b", "stream": false}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(model_answer(
            "```json\n{\"persons\": [{\"text\": \"Jean Dupont\"}, {\"text\": \"JD\"}], \
             \"organizations\": [{\"text\": \"Ardoise Conseil\"}, {\"text\": \"Société Fantôme\"}]}\n```",
        ))
        .create_async()
        .await;

    let detector = ExternalServiceDetector::new(service_config(server.url())).unwrap();
    let candidates = detector.extract(DOCUMENT).await.unwrap();

    tags.assert_async().await;
    generate.assert_async().await;

    // "JD" is below the minimum length
    assert_eq!(candidates.len(), 3);

    let person = &candidates[0];
    assert_eq!(person.text(), "Jean Dupont");
    assert_eq!(person.entity_type(), EntityType::Person);
    assert_eq!(person.source(), DetectionSource::ExternalService);
    assert_eq!(person.confidence(), LOCATED_CONFIDENCE);
    assert_eq!(person.span().slice(DOCUMENT), Some("Jean Dupont"));

    let organization = &candidates[1];
    assert_eq!(organization.entity_type(), EntityType::Organization);
    assert_eq!(organization.span().slice(DOCUMENT), Some("Ardoise Conseil"));

    let phantom = &candidates[2];
    assert_eq!(phantom.text(), "Société Fantôme");
    assert_eq!(phantom.span().start, 0);
    assert_eq!(phantom.confidence(), FALLBACK_CONFIDENCE);
}

#[tokio::test]
async fn test_unavailable_service_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(503)
        .create_async()
        .await;

    let detector = ExternalServiceDetector::new(service_config(server.url())).unwrap();
    assert!(!detector.is_available().await);
    assert!(matches!(
        detector.extract(DOCUMENT).await,
        Err(DetectionError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_server_error_becomes_a_diagnostic() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("POST", "/api/generate")
        .with_status(500)
        .with_body("model not loaded")
        .create_async()
        .await;

    let mut config = AnonymizationConfig::default();
    config.audit.enabled = false;
    config.external = service_config(server.url());

    let engine = AnonymizationEngine::new(config).unwrap();
    let analysis = engine
        .analyze(DOCUMENT, Some(DetectionMode::Deep))
        .await
        .unwrap();

    assert_eq!(
        analysis.detectors.last().map(String::as_str),
        Some("external_llm")
    );
    assert_eq!(analysis.diagnostics.len(), 1);
    assert_eq!(analysis.diagnostics[0].detector, "external_llm");
    assert!(analysis.diagnostics[0].message.contains("500"));
}

#[tokio::test]
async fn test_external_detector_only_runs_in_deep_mode() {
    let mut server = mockito::Server::new_async().await;
    let tags = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let mut config = AnonymizationConfig::default();
    config.audit.enabled = false;
    config.external = service_config(server.url());

    let engine = AnonymizationEngine::new(config).unwrap();
    let analysis = engine
        .analyze(DOCUMENT, Some(DetectionMode::Standard))
        .await
        .unwrap();

    assert!(!analysis.detectors.iter().any(|name| name == "external_llm"));
    tags.assert_async().await;
}
