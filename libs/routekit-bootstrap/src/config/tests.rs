use super::*;
use crate::{AppConfigProvider, ConfigProvider};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8087);
    assert_eq!(config.server.home_dir, ".");
    assert_eq!(config.server.timeout_sec, 0);
    assert_eq!(config.server.request_timeout().as_secs(), 30);

    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging["default"].console_level, "info");

    assert!(config.modules.is_empty());
}

#[test]
fn test_yaml_serialization() {
    let yaml = AppConfig::default()
        .to_yaml()
        .expect("Failed to serialize to YAML");

    assert!(yaml.contains("server:"));
    assert!(yaml.contains("logging:"));
    assert!(yaml.contains("modules:"));
}

#[test]
fn test_layered_loading_yaml_only() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("test-config.yaml");

    let yaml_content = r#"
server:
  host: "0.0.0.0"
  port: 9999
  timeout_sec: 60

modules:
  excel_io:
    max_file_size: 1024
  demo:
    greeting: "hi"
"#;

    fs::write(&config_path, yaml_content).expect("Failed to write config file");

    let config = AppConfig::load_layered(&config_path).expect("Failed to load config");

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9999);
    assert_eq!(config.server.timeout_sec, 60);
    assert_eq!(config.server.bind_addr().unwrap().port(), 9999);
    assert!(config.logging.is_none());

    assert_eq!(config.modules.len(), 2);
    assert_eq!(config.modules["excel_io"]["max_file_size"], 1024);
}

#[test]
fn test_unknown_top_level_key_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bad.yaml");
    fs::write(&config_path, "server:\n  host: \"127.0.0.1\"\n  port: 1\nbogus: true\n").unwrap();

    assert!(AppConfig::load_layered(&config_path).is_err());
}

#[test]
fn test_modules_dir_merges_yaml_files() {
    let temp_dir = tempdir().unwrap();
    let modules_dir = temp_dir.path().join("modules");
    fs::create_dir_all(&modules_dir).unwrap();
    fs::write(modules_dir.join("excel_io.yaml"), "enabled: false\n").unwrap();
    fs::write(modules_dir.join("notes.txt"), "ignored").unwrap();

    let config_path = temp_dir.path().join("app.yaml");
    fs::write(
        &config_path,
        format!(
            "server:\n  host: \"127.0.0.1\"\n  port: 8087\nmodules_dir: \"{}\"\n",
            modules_dir.display()
        ),
    )
    .unwrap();

    let config = AppConfig::load_layered(&config_path).unwrap();
    assert_eq!(config.modules.len(), 1);
    assert_eq!(config.modules["excel_io"]["enabled"], false);
}

#[test]
fn test_cli_overrides() {
    let mut config = AppConfig::default();

    let args = CliArgs {
        config: None,
        port: Some(8888),
        print_config: false,
        verbose: 2,
    };

    config.apply_cli_overrides(&args);

    assert_eq!(config.server.port, 8888);
    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging["default"].console_level, "trace");
}

#[test]
fn test_cli_overrides_keep_level_without_verbose() {
    let mut config = AppConfig::default();
    config.apply_cli_overrides(&CliArgs::default());
    assert_eq!(config.logging.unwrap()["default"].console_level, "info");
}

#[test]
fn test_config_provider_exposes_modules_and_sections() {
    let mut config = AppConfig::default();
    config
        .modules
        .insert("excel_io".into(), serde_json::json!({"enabled": true}));
    let provider = AppConfigProvider::new(config);

    assert_eq!(
        provider.get_module_config("excel_io"),
        Some(&serde_json::json!({"enabled": true}))
    );
    assert!(provider.get_module_config("missing").is_none());
    assert_eq!(provider.get_config_raw("server").unwrap()["port"], 8087);
    assert!(provider.get_config_raw("unknown").is_none());
}
