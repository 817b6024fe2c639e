use shardgate_commons::StorageDriver;
use shardgate_configs::GatewayConfig;
use std::io::Write;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[storages]]
id = 1
storage_class = "hot"
driver = "remote"
dsn = "primary:3301"

[remote]
max_concurrency = 4
"#
    )
    .unwrap();

    let config = GatewayConfig::from_file(file.path()).unwrap();
    assert_eq!(config.storages[0].driver, StorageDriver::Remote);
    assert_eq!(config.storages[0].dsn, "primary:3301");
    assert_eq!(config.remote.max_concurrency, 4);
    assert_eq!(config.remote.page_size, 5000);
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GatewayConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_empty_file_uses_default_storage() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = GatewayConfig::from_file(file.path()).unwrap();
    assert_eq!(config.storages.len(), 1);
    assert_eq!(config.storages[0].id, 1);
    assert_eq!(config.storages[0].driver, StorageDriver::Memory);
}

#[test]
fn test_env_overrides() {
    let mut config = GatewayConfig::default();
    std::env::set_var("SHARDGATE_REMOTE_PAGE_SIZE", "250");
    std::env::set_var("SHARDGATE_LOG_LEVEL", "Warn");
    config.apply_env_overrides().unwrap();
    config.finalize().unwrap();
    std::env::remove_var("SHARDGATE_REMOTE_PAGE_SIZE");
    std::env::remove_var("SHARDGATE_LOG_LEVEL");

    assert_eq!(config.remote.page_size, 250);
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_env_override_rejects_garbage() {
    let mut config = GatewayConfig::default();
    std::env::set_var("SHARDGATE_REMOTE_MAX_CONCURRENCY", "many");
    let result = config.apply_env_overrides();
    std::env::remove_var("SHARDGATE_REMOTE_MAX_CONCURRENCY");
    assert!(result.is_err());
}
