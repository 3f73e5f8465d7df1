use montylite::config::RegexOptionsPolicy;
use montylite::storage::StorageEngine;
use montylite::{DbError, MontyConfig};

#[test]
fn resolve_reads_file_and_repository_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("montylite.toml");
    std::fs::write(&path, "[query]\nslow_query_ms = 42\nregex_options = \"key-order\"\n").unwrap();
    let repo = dir.path().join("repo");
    let cfg = MontyConfig::resolve(Some(&path), Some(&repo)).unwrap();
    assert_eq!(cfg.query.slow_query_ms, 42);
    assert_eq!(cfg.query.regex_options, RegexOptionsPolicy::KeyOrder);
    assert_eq!(cfg.storage.engine, StorageEngine::FlatFile);
    assert_eq!(cfg.storage.repository.as_deref(), Some(repo.as_path()));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = MontyConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, DbError::Io(_)));
}

#[test]
fn malformed_toml_is_a_config_error() {
    assert!(matches!(MontyConfig::from_toml_str("[storage\n"), Err(DbError::Config(_))));
    assert!(matches!(
        MontyConfig::from_toml_str("[query]\nregex_options = \"loose\"\n"),
        Err(DbError::Config(_))
    ));
}

#[test]
fn engine_names_round_trip_through_display() {
    for engine in [StorageEngine::Memory, StorageEngine::FlatFile] {
        assert_eq!(engine.to_string().parse::<StorageEngine>().unwrap(), engine);
    }
    assert!("Memory ".parse::<StorageEngine>().is_ok());
}
