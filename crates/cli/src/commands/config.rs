use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use shipquote_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// One rendered config field: dotted key, env override, effective value.
struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let shipping = &config.shipping;
    vec![
        Field {
            key: "database.url",
            env_keys: &["SHIPQUOTE_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key: "database.max_connections",
            env_keys: &["SHIPQUOTE_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key: "database.timeout_secs",
            env_keys: &["SHIPQUOTE_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key: "server.bind_address",
            env_keys: &["SHIPQUOTE_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key: "server.port",
            env_keys: &["SHIPQUOTE_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key: "server.graceful_shutdown_secs",
            env_keys: &["SHIPQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Field {
            key: "shipping.free_shipping_threshold",
            env_keys: &["SHIPQUOTE_SHIPPING_FREE_SHIPPING_THRESHOLD"],
            value: optional(shipping.free_shipping_threshold.map(|value| value.to_string())),
        },
        Field {
            key: "shipping.default_country",
            env_keys: &["SHIPQUOTE_SHIPPING_DEFAULT_COUNTRY"],
            value: shipping.default_country.clone(),
        },
        Field {
            key: "shipping.default_state",
            env_keys: &["SHIPQUOTE_SHIPPING_DEFAULT_STATE"],
            value: optional(shipping.default_state.clone()),
        },
        Field {
            key: "shipping.default_postal_code",
            env_keys: &["SHIPQUOTE_SHIPPING_DEFAULT_POSTAL_CODE"],
            value: optional(shipping.default_postal_code.clone()),
        },
        Field {
            key: "shipping.default_item_weight",
            env_keys: &["SHIPQUOTE_SHIPPING_DEFAULT_ITEM_WEIGHT"],
            value: shipping.default_item_weight.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["SHIPQUOTE_LOGGING_LEVEL", "SHIPQUOTE_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["SHIPQUOTE_LOGGING_FORMAT", "SHIPQUOTE_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "<unset>".to_string())
}

fn detect_config_path() -> Option<PathBuf> {
    ["shipquote.toml", "config/shipquote.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
