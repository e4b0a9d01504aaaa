use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::load_config;
use super::settings::Settings;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.broker.url, "redis://127.0.0.1:6379");
    assert_eq!(settings.broker.max_active, 80);
    assert_eq!(settings.broker.idle_timeout().as_secs(), 240);
    assert_eq!(settings.broker.publish_wait().as_millis(), 1000);
    assert_eq!(settings.log.level, "info");
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("relay.toml");
    fs::write(
        &path,
        r#"
            [server]
            port = 9000

            [broker]
            url = "memory://"
            max_active = 4
        "#,
    )
    .expect("write config file");

    let cfg = temp_env::with_vars_unset(
        ["CONVO__SERVER__PORT", "CONVO__BROKER__URL", "CONVO__BROKER__MAX_ACTIVE"],
        || load_config(Some(&path)),
    )
    .expect("load_config failed");

    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.broker.url, "memory://");
    assert_eq!(cfg.broker.max_active, 4);
    assert_eq!(cfg.broker.idle_timeout_secs, 240);
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("relay.toml");
    fs::write(&path, "[broker]\nurl = \"memory://\"\n").expect("write config file");

    let cfg = temp_env::with_vars(
        [
            ("CONVO__BROKER__URL", Some("redis://broker:6400")),
            ("CONVO__BROKER__IDLE_TIMEOUT_SECS", Some("30")),
            ("CONVO__BROKER__PUBLISH_WAIT_MS", Some("250")),
        ],
        || load_config(Some(&path)),
    )
    .expect("load_config failed");

    assert_eq!(cfg.broker.url, "redis://broker:6400");
    assert_eq!(cfg.broker.idle_timeout_secs, 30);
    assert_eq!(cfg.broker.publish_wait_ms, 250);
}

#[test]
#[serial]
fn missing_explicit_file_is_an_error() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent.toml");
    assert!(load_config(Some(&path)).is_err());
}
