use std::env;
use std::sync::{Mutex, OnceLock};

use rust_decimal::Decimal;
use serde_json::Value;
use shipquote_cli::commands::estimate::EstimateArgs;
use shipquote_cli::commands::{doctor, estimate, methods, migrate, seed};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("SHIPQUOTE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("SHIPQUOTE_DATABASE_URL", "postgres://localhost/shipquote")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("configuration failure:"), "{message}");
    });
}

#[test]
fn seed_reports_loaded_reference_data() {
    with_env(&[("SHIPQUOTE_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("3 methods"), "unexpected message: {message}");
        assert!(message.contains("12 rates"), "unexpected message: {message}");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("SHIPQUOTE_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        let second = seed::run();

        assert_eq!(first.exit_code, 0, "first seed: {}", first.output);
        assert_eq!(second.exit_code, 0, "second seed: {}", second.output);
        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn estimate_quotes_seeded_california_cart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("SHIPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = estimate::run(EstimateArgs {
            country: Some("US".to_string()),
            state: Some("CA".to_string()),
            weight: Some(Decimal::new(3, 0)),
            subtotal: Some(Decimal::new(100, 0)),
            ..EstimateArgs::default()
        });
        assert_eq!(result.exit_code, 0, "estimate: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["estimate"]["cost"], 14.95);
        assert_eq!(payload["data"]["estimate"]["tier"], "state_specific");
        assert_eq!(payload["data"]["totals"]["taxAmount"], 7.25);
        assert_eq!(payload["data"]["totals"]["total"], 122.2);
    });
}

#[test]
fn estimate_all_lists_every_method() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("SHIPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = estimate::run(EstimateArgs {
            country: Some("US".to_string()),
            state: Some("NY".to_string()),
            weight: Some(Decimal::new(2, 0)),
            all: true,
            ..EstimateArgs::default()
        });
        assert_eq!(result.exit_code, 0, "estimate --all: {}", result.output);

        let payload = parse_payload(&result.output);
        let options = payload["data"].as_array().cloned().unwrap_or_default();
        let ids = options
            .iter()
            .map(|option| option["estimate"]["methodId"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["standard", "express", "overnight"]);
    });
}

#[test]
fn estimate_rejects_unknown_method() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("SHIPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = estimate::run(EstimateArgs {
            method: Some("teleport".to_string()),
            ..EstimateArgs::default()
        });

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "unknown_method");
    });
}

#[test]
fn estimate_without_rate_data_is_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("SHIPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(migrate::run().exit_code, 0);

        let result = estimate::run(EstimateArgs::default());

        assert_eq!(result.exit_code, 4);
        assert_eq!(parse_payload(&result.output)["error_class"], "estimate_unavailable");
    });
}

#[test]
fn methods_lists_seeded_methods_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("SHIPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = methods::run();
        assert_eq!(result.exit_code, 0, "methods: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"][0]["id"], "standard");
        assert_eq!(payload["data"][2]["id"], "overnight");
    });
}

#[test]
fn doctor_passes_on_seeded_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("SHIPQUOTE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "doctor: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
    });
}

#[test]
fn doctor_flags_missing_schema() {
    with_env(&[("SHIPQUOTE_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        let schema = checks
            .iter()
            .find(|check| check["name"] == "schema_migrations")
            .expect("schema check present");
        assert_eq!(schema["status"], "fail");
    });
}

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}", dir.path().join("shipquote.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHIPQUOTE_DATABASE_URL",
        "SHIPQUOTE_DATABASE_MAX_CONNECTIONS",
        "SHIPQUOTE_DATABASE_TIMEOUT_SECS",
        "SHIPQUOTE_SERVER_BIND_ADDRESS",
        "SHIPQUOTE_SERVER_PORT",
        "SHIPQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SHIPQUOTE_SHIPPING_FREE_SHIPPING_THRESHOLD",
        "SHIPQUOTE_SHIPPING_DEFAULT_COUNTRY",
        "SHIPQUOTE_SHIPPING_DEFAULT_STATE",
        "SHIPQUOTE_SHIPPING_DEFAULT_POSTAL_CODE",
        "SHIPQUOTE_SHIPPING_DEFAULT_ITEM_WEIGHT",
        "SHIPQUOTE_LOGGING_LEVEL",
        "SHIPQUOTE_LOGGING_FORMAT",
        "SHIPQUOTE_LOG_LEVEL",
        "SHIPQUOTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
