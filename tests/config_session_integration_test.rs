//! Integration tests for configuration loading and review sessions
//!
//! Tests that modify environment variables hold ENV_MUTEX.

use chrono::{Duration, Utc};
use pseudonym::anonymization::config::DetectionMode;
use pseudonym::anonymization::{AnonymizationEngine, EntitySnapshot};
use pseudonym::config::{load_config, SessionBackend};
use pseudonym::domain::{PseudonymError, SessionId};
use pseudonym::session::{FileSessionStore, SessionManager, SessionRecord, SessionStore};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, NamedTempFile};

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    std::env::remove_var("PSEUDONYM_LOG_LEVEL");
    std::env::remove_var("PSEUDONYM_DETECTION_MODE");
    std::env::remove_var("PSEUDONYM_SESSION_TTL_MINUTES");
    std::env::remove_var("PSEUDONYM_SESSION_BACKEND");
    std::env::remove_var("TEST_PSEUDONYM_SESSION_DIR");
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_PSEUDONYM_SESSION_DIR", "/tmp/pseudonym-sessions");

    let file = write_config(
        r#"
[application]
log_level = "debug"

[anonymization]
mode = "deep"

[anonymization.external]
enabled = true
base_url = "http://ollama.internal:11434"
model = "mistral"

[anonymization.tokens]
hash_length = 8

[anonymization.tokens.templates]
PERSON = "[NOM_{id}]"

[anonymization.names]
score_cutoff = 0.9
auto_group = true

[session]
backend = "file"
# ${NOT_SUBSTITUTED_IN_COMMENTS}
directory = "${TEST_PSEUDONYM_SESSION_DIR}"
ttl_minutes = 45

[logging]
local_rotation = "hourly"
"#,
    );

    let config = load_config(file.path()).unwrap();
    cleanup_env_vars();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.anonymization.mode, DetectionMode::Deep);
    assert_eq!(config.anonymization.external.model, "mistral");
    assert_eq!(config.anonymization.tokens.hash_length, 8);
    assert!(config.anonymization.names.auto_group);
    assert_eq!(config.session.backend, SessionBackend::File);
    assert_eq!(
        config.session.directory.to_str(),
        Some("/tmp/pseudonym-sessions")
    );
    assert_eq!(config.session.ttl_minutes, 45);
    assert_eq!(config.logging.local_rotation, "hourly");

    let engine = AnonymizationEngine::new(config.anonymization).unwrap();
    let token = engine
        .tokens()
        .default_for(pseudonym::anonymization::EntityType::Person, "Jean Dupont");
    assert!(token.starts_with("[NOM_") && token.ends_with(']'));
    assert_eq!(token.len(), "[NOM_]".len() + 8);
}

#[test]
fn test_env_overrides_win_over_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("PSEUDONYM_DETECTION_MODE", "patterns");
    std::env::set_var("PSEUDONYM_SESSION_TTL_MINUTES", "5");
    std::env::set_var("PSEUDONYM_SESSION_BACKEND", "memory");

    let file = write_config("[anonymization]\nmode = \"deep\"\n\n[session]\nttl_minutes = 60\n");
    let config = load_config(file.path());
    cleanup_env_vars();

    let config = config.unwrap();
    assert_eq!(config.anonymization.mode, DetectionMode::Patterns);
    assert_eq!(config.session.ttl_minutes, 5);
    assert_eq!(config.session.backend, SessionBackend::Memory);
}

#[test]
fn test_invalid_values_are_configuration_errors() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    for content in [
        "[application]\nlog_level = \"verbose\"\n",
        "[anonymization.names]\nscore_cutoff = 1.5\n",
        "[anonymization.external]\nbase_url = \"not a url\"\n",
        "[logging]\nlocal_rotation = \"weekly\"\n",
        "[session]\ndirectory = \"${PSEUDONYM_UNSET_VARIABLE}\"\n",
    ] {
        let file = write_config(content);
        let err = load_config(file.path()).unwrap_err();
        assert!(
            matches!(err, PseudonymError::Configuration(_)),
            "{content} gave {err:?}"
        );
    }
}

#[tokio::test]
async fn test_session_survives_a_new_store_instance() {
    let dir = tempdir().unwrap();
    let engine = AnonymizationEngine::new({
        let mut config = pseudonym::anonymization::config::AnonymizationConfig::default();
        config.audit.enabled = false;
        config
    })
    .unwrap();
    let analysis = engine
        .analyze("Écrire à jean.dupont@example.fr.", Some(DetectionMode::Patterns))
        .await
        .unwrap();

    let first = SessionManager::new(
        Arc::new(FileSessionStore::new(dir.path()).await.unwrap()),
        30,
    );
    let record = first
        .create(analysis.manager.snapshot(), analysis.mode, None)
        .await
        .unwrap();

    // A later CLI invocation opens its own store on the same directory
    let second = SessionManager::new(
        Arc::new(FileSessionStore::new(dir.path()).await.unwrap()),
        30,
    );
    let loaded = second.load(&record.id).await.unwrap();
    assert_eq!(loaded.snapshot, analysis.manager.snapshot());
    assert_eq!(loaded.mode, DetectionMode::Patterns);

    let mut manager = engine.restore(loaded.snapshot);
    let id = manager.entities()[0].id.clone();
    manager.set_replacement(&id, "[COURRIEL]").unwrap();
    second.update(&record.id, manager.snapshot()).await.unwrap();

    let reloaded = first.load(&record.id).await.unwrap();
    assert_eq!(reloaded.snapshot.entities[0].replacement, "[COURRIEL]");

    second.complete(&record.id).await.unwrap();
    assert!(matches!(
        first.load(&record.id).await,
        Err(PseudonymError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_expired_sessions_read_as_absent_and_are_purged() {
    let dir = tempdir().unwrap();
    let store = FileSessionStore::new(dir.path()).await.unwrap();

    let created = Utc::now() - Duration::minutes(90);
    let record = SessionRecord {
        id: SessionId::generate(),
        source: Some("ancien.txt".to_string()),
        mode: DetectionMode::Standard,
        snapshot: EntitySnapshot {
            document: "Bail commercial".to_string(),
            entities: Vec::new(),
            groups: Vec::new(),
        },
        created_at: created,
        updated_at: created,
        expires_at: created + Duration::minutes(30),
    };
    store.write(&record).await.unwrap();

    assert!(store.read(&record.id).await.unwrap().is_none());
    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert!(!dir.path().join(format!("{}.json", record.id)).exists());
}
