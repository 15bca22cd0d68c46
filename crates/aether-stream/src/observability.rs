use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "aether.logs.jsonl";

/// Where log lines go once observability is initialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    /// Compact human-readable lines on stderr.
    Console,
    /// JSON lines appended to a file.
    JsonFile(PathBuf),
}

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    /// `EnvFilter` directive such as `info` or `aether_stream=debug`.
    pub filter: Option<String>,
    pub sink: LogSink,
}

impl ObservabilityConfig {
    /// Reads settings from the environment.
    ///
    /// - `AETHER_OBSERVABILITY_ENABLED`: enable/disable flag (default enabled).
    /// - `AETHER_LOG_LEVEL`: filter override (`info`, `debug`, ...), else `RUST_LOG`.
    /// - `AETHER_JSON_LOG_PATH`: if set, logs are JSONL in that file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("AETHER_OBSERVABILITY_ENABLED")
            .map(|v| parse_bool(&v).unwrap_or(true))
            .unwrap_or(true);
        let filter = lookup("AETHER_LOG_LEVEL").filter(|v| !v.trim().is_empty());
        let sink = match lookup("AETHER_JSON_LOG_PATH").filter(|v| !v.trim().is_empty()) {
            Some(path) => LogSink::JsonFile(PathBuf::from(path)),
            None => LogSink::Console,
        };
        Self {
            enabled,
            filter,
            sink,
        }
    }

    /// Overrides the filter directive (for example from a CLI flag).
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        if let Some(directive) = &self.filter
            && let Ok(filter) = EnvFilter::try_new(directive)
        {
            return filter;
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Initializes logging from the environment, once per process.
pub fn init_observability() {
    init_observability_with(ObservabilityConfig::from_env());
}

/// Initializes logging with explicit settings. Later calls are no-ops.
pub fn init_observability_with(config: ObservabilityConfig) {
    INIT.get_or_init(|| {
        if !config.enabled {
            return;
        }
        let env_filter = config.env_filter();
        match &config.sink {
            LogSink::JsonFile(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    let _ = std::fs::create_dir_all(parent);
                }
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(DEFAULT_LOG_FILE);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            LogSink::Console => {
                // stdout carries the streamed reply in the CLI.
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_like_the_env_expects() {
        assert_eq!(parse_bool("On"), Some(true));
        assert_eq!(parse_bool(" disabled "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn resolves_sink_and_filter_from_lookup() {
        let config = ObservabilityConfig::from_lookup(|key| match key {
            "AETHER_OBSERVABILITY_ENABLED" => Some("no".into()),
            "AETHER_LOG_LEVEL" => Some("aether_stream=debug".into()),
            "AETHER_JSON_LOG_PATH" => Some("logs/chat.jsonl".into()),
            _ => None,
        });
        assert!(!config.enabled);
        assert_eq!(config.filter.as_deref(), Some("aether_stream=debug"));
        assert_eq!(config.sink, LogSink::JsonFile(PathBuf::from("logs/chat.jsonl")));
    }

    #[test]
    fn unknown_flag_value_keeps_logging_enabled() {
        let config = ObservabilityConfig::from_lookup(|key| {
            (key == "AETHER_OBSERVABILITY_ENABLED").then(|| "sometimes".to_string())
        });
        assert!(config.enabled);
        assert_eq!(config.sink, LogSink::Console);
    }
}
