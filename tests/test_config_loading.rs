//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! Port assertions go through `from_toml_str` so a `PORT` variable in the
//! test environment cannot interfere.

use agentcrew::config::{ConfigError, CrewConfig};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use url::Url;

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[server]
host = "0.0.0.0"
health_port = 8081

[llm]
model = "llama3:8b"
temperature = 0.3
max_tokens = 512
timeout_secs = 60

[bootstrap]
workspace_dir = "/tmp/agentcrew-env"
packages = ["llama3:8b", "mistral"]

[crew]
verbose = false
max_delegations = 1
"#
    )
    .unwrap();

    let config = CrewConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.health_port, Some(8081));
    assert_eq!(config.llm.model, "llama3:8b");
    assert_eq!(config.llm.temperature, Some(0.3));
    assert_eq!(config.llm.max_tokens, Some(512));
    assert_eq!(config.llm.timeout_secs, 60);
    assert_eq!(
        config.bootstrap.workspace_dir,
        PathBuf::from("/tmp/agentcrew-env")
    );
    assert_eq!(config.bootstrap_packages(), vec!["llama3:8b", "mistral"]);
    assert!(!config.crew.verbose);
    assert_eq!(config.crew.max_delegations, 1);
}

#[test]
fn test_config_applies_defaults_when_sections_missing() {
    let config = CrewConfig::from_toml_str("[llm]\nmodel = \"phi3\"\n").unwrap();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.server.health_port, None);
    assert_eq!(config.llm.provider, "ollama");
    assert_eq!(config.llm.timeout_secs, 300);
    assert_eq!(config.bootstrap.workspace_dir, PathBuf::from("ai_agents_env"));
    assert_eq!(config.bootstrap_packages(), vec!["phi3"]);
    assert!(config.crew.verbose);
    assert_eq!(config.crew.max_delegations, 2);
}

#[test]
fn test_config_fails_when_file_does_not_exist() {
    let result = CrewConfig::load_from_file(std::path::Path::new("/nonexistent/agentcrew.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_fails_with_invalid_toml_syntax() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[server\nport = 5000").unwrap();

    let result = CrewConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_fails_with_wrong_field_type() {
    let result = CrewConfig::from_toml_str("[server]\nport = \"five thousand\"\n");
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_rejects_unsupported_provider() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[llm]\nprovider = \"anthropic\"\n").unwrap();

    let result = CrewConfig::load_from_file(temp_file.path());
    match result {
        Err(ConfigError::InvalidConfig(message)) => assert!(message.contains("anthropic")),
        other => panic!("Expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn test_config_rejects_bad_package_names() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        "[bootstrap]\npackages = [\"llama2:1b\", \"rm -rf /\"]\n"
    )
    .unwrap();

    let result = CrewConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_rejects_hostname_for_listener() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[server]\nhost = \"localhost\"\n").unwrap();

    let result = CrewConfig::load_from_file(temp_file.path());
    match result {
        Err(ConfigError::InvalidConfig(message)) => assert!(message.contains("IP address")),
        other => panic!("Expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn test_health_addr_shares_listener_host() {
    let config = CrewConfig::from_toml_str("[server]\nhost = \"0.0.0.0\"\nhealth_port = 8081\n").unwrap();
    assert_eq!(config.health_addr().unwrap().unwrap().to_string(), "0.0.0.0:8081");

    let config = CrewConfig::default();
    assert_eq!(config.health_addr().unwrap(), None);
}

#[test]
fn test_portless_ollama_host_uses_ollama_port() {
    for host in ["0.0.0.0", "localhost", " localhost "] {
        let mut config = CrewConfig::default();
        config.apply_overrides(None, Some(host.to_string()));

        let url = Url::parse(&config.llm.base_url).unwrap();
        assert_eq!(url.scheme(), "http", "for {host:?}");
        assert_eq!(url.port_or_known_default(), Some(11434), "for {host:?}");
        assert!(config.validate().is_ok());
    }

    let mut config = CrewConfig::default();
    config.apply_overrides(None, Some("0.0.0.0".to_string()));
    assert_eq!(config.llm.base_url, "http://0.0.0.0:11434");
}

#[test]
fn test_ollama_host_with_scheme_keeps_scheme_port() {
    let mut config = CrewConfig::default();
    config.apply_overrides(None, Some("https://ollama.example.com".to_string()));

    let url = Url::parse(&config.llm.base_url).unwrap();
    assert_eq!(url.port_or_known_default(), Some(443));

    config.apply_overrides(None, Some("ollama.example.com:80".to_string()));
    let url = Url::parse(&config.llm.base_url).unwrap();
    assert_eq!(url.port_or_known_default(), Some(80));
}

#[test]
fn test_overrides_take_precedence_over_file_values() {
    let mut config = CrewConfig::from_toml_str(
        r#"
[server]
port = 7000

[llm]
base_url = "http://localhost:11434"
"#,
    )
    .unwrap();

    config.apply_overrides(Some("7100".to_string()), Some("ollama.internal:11434".to_string()));

    assert_eq!(config.server.port, 7100);
    assert_eq!(config.llm.base_url, "http://ollama.internal:11434");
    assert!(config.validate().is_ok());
    assert_eq!(config.chat_addr().unwrap().port(), 7100);
}

#[test]
fn test_config_round_trips_through_show_output() {
    let config = CrewConfig::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    assert!(rendered.contains("[server]"));
    assert!(rendered.contains("[crew]"));

    let reparsed = CrewConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(reparsed, config);
}
