//! Test plan for the `promozap-config` crate.
//!
//! These tests cover default handling, file discovery, environment
//! overrides and the `REDIS_URL` precedence rule.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use promozap_config::{load, load_from, AppConfig, RelayConfig, SinkKind, WhatsAppConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "REDIS_URL",
    "PROMOZAP_CONFIG",
    "PROMOZAP__REDIS__URL",
    "PROMOZAP__REDIS__CONNECT_TIMEOUT_SECONDS",
    "PROMOZAP__RELAY__SINK",
    "PROMOZAP__RELAY__PUBLISH_RETRIES",
    "PROMOZAP__RELAY__RETRY_BACKOFF_MS",
    "PROMOZAP__RELAY__SHUTDOWN_TIMEOUT_SECONDS",
    "PROMOZAP__WHATSAPP__STORE_PATH",
    "PROMOZAP__WHATSAPP__RENDER_QR",
    "PROMOZAP__LOGGING__FILTER",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(&path, contents).expect("failed to write config file");
    path
}

fn isolated() -> (TempDir, TestContext) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());
    (temp_dir, ctx)
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let (_temp_dir, _ctx) = isolated();

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.redis.url, "redis://localhost:6379");
    assert_eq!(config.redis.url, defaults.redis.url);
    assert_eq!(
        config.redis.connect_timeout_seconds,
        defaults.redis.connect_timeout_seconds
    );
    assert_eq!(config.relay.sink, SinkKind::Log);
    assert_eq!(config.relay.publish_retries, 0);
    assert_eq!(config.relay.retry_backoff_ms, defaults.relay.retry_backoff_ms);
    assert_eq!(config.whatsapp.store_path, defaults.whatsapp.store_path);
    assert!(config.whatsapp.render_qr);
    assert_eq!(config.logging.filter, "info");
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "promozap.toml",
        r#"
        [relay]
        publish_retries = 2
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/promozap.toml",
        r#"
        [relay]
        publish_retries = 7
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.relay.publish_retries, 2);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "config/promozap.toml",
        r#"
        [relay]
        sink = "classify"

        [whatsapp]
        render_qr = false
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.relay.sink, SinkKind::Classify);
    assert!(!config.whatsapp.render_qr);
    assert_eq!(config.whatsapp.store_path, defaults.whatsapp.store_path);
    assert_eq!(config.redis.url, defaults.redis.url);
}

#[test]
#[serial]
fn load_from_explicit_path_ignores_search_locations() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "promozap.toml",
        r#"
        [logging]
        filter = "warn"
        "#,
    );
    let explicit = write_config_file(
        temp_dir.path(),
        "elsewhere/relay.toml",
        r#"
        [logging]
        filter = "debug"
        "#,
    );

    let config = load_from(Some(&explicit)).expect("explicit file should load");
    assert_eq!(config.logging.filter, "debug");
}

#[test]
#[serial]
fn load_honours_config_path_environment_variable() {
    let (temp_dir, mut ctx) = isolated();

    let path = write_config_file(
        temp_dir.path(),
        "custom/settings.toml",
        r#"
        [redis]
        url = "redis://from-file:6379"
        "#,
    );
    ctx.set_var("PROMOZAP_CONFIG", path.display().to_string());

    let config = load().expect("configuration load should follow PROMOZAP_CONFIG");
    assert_eq!(config.redis.url, "redis://from-file:6379");
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let (temp_dir, mut ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "promozap.toml",
        r#"
        [relay]
        shutdown_timeout_seconds = 30
        "#,
    );

    ctx.set_var("PROMOZAP__RELAY__SHUTDOWN_TIMEOUT_SECONDS", "9");
    ctx.set_var("PROMOZAP__RELAY__SINK", "classify");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.relay.shutdown_timeout_seconds, 9);
    assert_eq!(config.relay.sink, SinkKind::Classify);
}

#[test]
#[serial]
fn redis_url_variable_wins_over_file_and_prefixed_env() {
    let (temp_dir, mut ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "promozap.toml",
        r#"
        [redis]
        url = "redis://from-file:6379"
        "#,
    );
    ctx.set_var("PROMOZAP__REDIS__URL", "redis://from-prefixed-env:6379");
    ctx.set_var("REDIS_URL", "redis://broker.internal:6380/2");

    let config = load().expect("configuration load should read REDIS_URL");
    assert_eq!(config.redis.url, "redis://broker.internal:6380/2");
}

#[test]
#[serial]
fn load_errors_on_unknown_sink() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "promozap.toml",
        r#"
        [relay]
        sink = "carrier-pigeon"
        "#,
    );

    let error = load().expect_err("unknown sink should be rejected");
    assert!(
        error.to_string().contains("invalid configuration"),
        "unexpected error message: {error}"
    );
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "promozap.toml",
        r#"
        [redis]
        url = "redis://unterminated
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn relay_config_defaults_preserve_single_publish_attempt() {
    let defaults = RelayConfig::default();
    assert_eq!(defaults.publish_retries, 0);
    assert_eq!(defaults.retry_backoff_ms, 250);
}

#[test]
fn whatsapp_config_defaults_render_qr_codes() {
    let defaults = WhatsAppConfig::default();
    assert!(defaults.render_qr);
    assert_eq!(defaults.store_path, "whatsapp/session.db");
}
