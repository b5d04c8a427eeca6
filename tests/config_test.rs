use bookmind::config::{BookmindConfig, validate};

#[test]
fn default_config_has_sensible_values() {
    let config = BookmindConfig::default();
    assert_eq!(config.gateway.port, 7300);
    assert_eq!(config.gateway.bind, "127.0.0.1");
    assert_eq!(config.assistant.provider, "anthropic");
    assert_eq!(config.assistant.model, "claude-sonnet-4-5-20250929");
    assert_eq!(config.assistant.max_tokens, 1024);
    assert_eq!(config.assistant.request_timeout_secs, 30);
    assert!(config.assistant.api_key.is_none());
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.session.max_turns, 200);
    assert!(validate(&config).is_ok());
}

#[test]
fn valid_toml_parses_successfully() {
    let toml_str = r#"
[gateway]
port = 8080
bind = "0.0.0.0"

[assistant]
provider = "openai"
model = "gpt-4o"
max_tokens = 2048
api_key = "sk-test"
request_timeout_secs = 10

[retrieval]
top_k = 6

[session]
max_turns = 50
"#;

    let config: BookmindConfig = toml::from_str(toml_str).expect("parse");
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.gateway.bind, "0.0.0.0");
    assert_eq!(config.assistant.provider, "openai");
    assert_eq!(config.assistant.model, "gpt-4o");
    assert_eq!(config.assistant.max_tokens, 2048);
    assert_eq!(config.assistant.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.assistant.request_timeout_secs, 10);
    assert_eq!(config.retrieval.top_k, 6);
    assert_eq!(config.session.max_turns, 50);
    assert!(validate(&config).is_ok());
}

#[test]
fn partial_config_uses_defaults_for_missing_fields() {
    let toml_str = r#"
[assistant]
api_key = "test-key"
"#;

    let config: BookmindConfig = toml::from_str(toml_str).expect("parse");
    assert_eq!(config.gateway.port, 7300);
    assert_eq!(config.gateway.bind, "127.0.0.1");
    assert_eq!(config.assistant.provider, "anthropic");
    assert_eq!(config.assistant.api_key.as_deref(), Some("test-key"));
}

#[test]
fn empty_toml_uses_all_defaults() {
    let config: BookmindConfig = toml::from_str("").expect("parse");
    assert_eq!(config.gateway.port, 7300);
    assert_eq!(config.assistant.provider, "anthropic");
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = toml::from_str::<BookmindConfig>("this is not valid toml {{{");
    assert!(result.is_err());
}

#[test]
fn validate_rejects_unknown_provider() {
    let mut config = BookmindConfig::default();
    config.assistant.provider = "gemini".into();
    let err = validate(&config).expect_err("must reject");
    assert!(err.to_string().contains("invalid provider"));
}

#[test]
fn validate_rejects_zero_bounds() {
    let mut config = BookmindConfig::default();
    config.assistant.max_tokens = 0;
    assert!(validate(&config).is_err());

    let mut config = BookmindConfig::default();
    config.assistant.request_timeout_secs = 0;
    assert!(validate(&config).is_err());

    let mut config = BookmindConfig::default();
    config.retrieval.top_k = 0;
    assert!(validate(&config).is_err());

    let mut config = BookmindConfig::default();
    config.session.max_turns = 1;
    assert!(validate(&config).is_err());
}

#[test]
fn echo_provider_is_accepted() {
    let mut config = BookmindConfig::default();
    config.assistant.provider = "echo".into();
    assert!(validate(&config).is_ok());
}
