use super::*;
use std::fs;
use tempfile::TempDir;

fn write_test_config(dir: &TempDir, filename: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(filename);
    fs::write(&path, content).unwrap();
    path
}

const MINIMAL: &str = r#"
[[pools]]
name = "orders"
size = 2

[[routes]]
channel = "incomingOrders"
default = "badOrders"

[[routes.rules]]
when = { header_ends_with = { header = "CamelFileName", suffix = ".xml" } }
to = "xmlOrders"

[[multicast]]
channel = "xmlOrders"
pool = "orders"
destinations = ["marginCompQueue", "riskMgmtQueue"]
"#;

#[test]
fn test_parse_minimal_config() {
    let config = EngineConfig::from_toml_str(MINIMAL).unwrap();
    config.validate().unwrap();

    assert_eq!(config.pools[0].size, 2);
    assert_eq!(config.routes[0].rules.len(), 1);
    assert_eq!(config.routes[0].tap_policy, TapPolicy::default());
    assert!(config.routes[0].wire_tap.is_none());
    assert_eq!(config.multicast[0].destinations.len(), 2);
    assert_eq!(config.aggregation.timeout, Duration::from_secs(30));
    assert_eq!(config.aggregation.completion, CompletionSpec::SplitSize);
    assert_eq!(config.aggregation.delimiter, ",");
}

#[test]
fn test_tap_policy_and_aggregation_durations() {
    let config = EngineConfig::from_toml_str(
        r#"
[[routes]]
channel = "in"
default = "out"
wire_tap = "audit"
tap_policy = { max_attempts = 3, timeout = "250ms", retry_delay = "1s" }

[aggregation]
timeout = "2m"
completion = { fixed = 4 }
separator = "+"
"#,
    )
    .unwrap();

    let policy = &config.routes[0].tap_policy;
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.timeout, Duration::from_millis(250));
    assert_eq!(policy.retry_delay, Duration::from_secs(1));
    assert_eq!(config.aggregation.timeout, Duration::from_secs(120));
    assert_eq!(config.aggregation.completion, CompletionSpec::Fixed(4));
    assert_eq!(config.aggregation.separator, "+");
}

#[test]
fn test_missing_default_route() {
    let config = EngineConfig::from_toml_str(
        r#"
[[routes]]
channel = "incomingOrders"
"#,
    )
    .unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigurationError::MissingDefaultRoute { .. })
    ));
}

#[test]
fn test_empty_multicast_group() {
    let config = EngineConfig::from_toml_str(
        r#"
[[pools]]
name = "orders"
size = 1

[[multicast]]
channel = "xmlOrders"
pool = "orders"
destinations = []
"#,
    )
    .unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigurationError::EmptyMulticastGroup { .. })
    ));
}

#[test]
fn test_unknown_pool_and_zero_size() {
    let unknown = EngineConfig::from_toml_str(
        r#"
[[multicast]]
channel = "xmlOrders"
pool = "missing"
destinations = ["a"]
"#,
    )
    .unwrap();
    assert!(matches!(
        unknown.validate(),
        Err(ConfigurationError::UnknownPool { .. })
    ));

    let zero = EngineConfig::from_toml_str(
        r#"
[[pools]]
name = "orders"
size = 0
"#,
    )
    .unwrap();
    assert!(matches!(
        zero.validate(),
        Err(ConfigurationError::InvalidPoolSize { .. })
    ));
}

#[test]
fn test_channel_bound_twice() {
    let mut config = EngineConfig::from_toml_str(MINIMAL).unwrap();
    config.multicast[0].channel = "incomingOrders".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigurationError::DuplicateChannel { .. })
    ));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let err = EngineConfig::from_toml_str("[[pools]\nname=").unwrap_err();
    assert!(matches!(err, ConfigurationError::Parse(_)));
}

#[tokio::test]
async fn test_loader_reads_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_test_config(&temp_dir, "engine.toml", MINIMAL);

    let config = ConfigLoader::new(&path).load().await.unwrap();
    assert_eq!(config.routes[0].channel, "incomingOrders");
}

#[tokio::test]
async fn test_loader_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::new(temp_dir.path().join("absent.toml"))
        .load()
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::Io { .. }));
}

#[tokio::test]
async fn test_bundled_order_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/orders.toml");
    let config = ConfigLoader::new(path).load().await.unwrap();

    assert_eq!(config.routes[0].wire_tap.as_deref(), Some("orderAudit"));
    assert_eq!(config.pools[0].size, 12);
    assert_eq!(config.aggregation.separator, "+");
}
