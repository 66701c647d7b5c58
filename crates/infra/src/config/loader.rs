//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Probe the standard paths for a config file; defaults when none exists
//! 2. Parse it as TOML or JSON depending on the extension
//! 3. Apply `WAYFARE_*` environment variables on top
//! 4. Validate every adapter section
//!
//! ## Environment Variables
//! For each adapter prefix `HTTP`, `DB`, `QUERY_READ` and `QUERY_MUTATION`:
//! - `WAYFARE_<PREFIX>_RETRIES`: total attempt budget
//! - `WAYFARE_<PREFIX>_RETRY_DELAY_MS`: base backoff delay
//! - `WAYFARE_<PREFIX>_TIMEOUT_MS`: per-attempt timeout, `0` disables it
//!
//! Plus `WAYFARE_LOG` (filter directives) and `WAYFARE_LOG_FORMAT`
//! (`text` or `json`).
//!
//! ## File Locations
//! `wayfare.{toml,json}` then `config.{toml,json}`, first in the working
//! directory and its parent, then next to the executable.

use std::path::{Path, PathBuf};

use wayfare_common::resilience::RetryOverrides;
use wayfare_common::{CommonError, CommonResult};

use super::{LogFormat, ResilienceConfig};

const ENV_PREFIX: &str = "WAYFARE";
const FILE_NAMES: [&str; 4] = ["wayfare.toml", "wayfare.json", "config.toml", "config.json"];

/// Load configuration from the first probed file (or defaults) with
/// environment overrides applied.
///
/// # Errors
/// Returns `CommonError::Serialization` or `CommonError::Persistence` when
/// the probed file cannot be parsed or read, and `CommonError::Config` when
/// an environment variable or a section resolves to an invalid policy.
pub fn load() -> CommonResult<ResilienceConfig> {
    let mut config = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using adapter presets");
            ResilienceConfig::default()
        }
    };

    apply_env(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_config_paths`]. Environment variables are not applied.
///
/// # Errors
/// - `CommonError::Config` if the file is missing or has an unsupported
///   extension
/// - `CommonError::Persistence` if the file cannot be read
/// - `CommonError::Serialization` if the contents do not parse
pub fn load_from_file(path: Option<PathBuf>) -> CommonResult<ResilienceConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommonError::config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CommonError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CommonError::persistence_op("read_config", e.to_string()))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> CommonResult<ResilienceConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CommonError::serialization_format("TOML", e.to_string())),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CommonError::serialization_format("JSON", e.to_string())),
        _ => Err(CommonError::config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard paths for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Apply `WAYFARE_*` variables from the process environment.
///
/// # Errors
/// Returns `CommonError::Config` naming the variable when a value does not
/// parse.
pub fn apply_env(config: &mut ResilienceConfig) -> CommonResult<()> {
    apply_env_with(config, |key| std::env::var(key).ok())
}

/// Apply environment overrides read through `lookup`.
pub fn apply_env_with<F>(config: &mut ResilienceConfig, lookup: F) -> CommonResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let sections: [(&str, &mut RetryOverrides); 4] = [
        ("HTTP", &mut config.http),
        ("DB", &mut config.database),
        ("QUERY_READ", &mut config.query_read),
        ("QUERY_MUTATION", &mut config.query_mutation),
    ];

    for (prefix, overrides) in sections {
        let retries = format!("{ENV_PREFIX}_{prefix}_RETRIES");
        if let Some(value) = env_number::<u32, _>(&lookup, &retries)? {
            overrides.retries = Some(value);
        }

        let delay = format!("{ENV_PREFIX}_{prefix}_RETRY_DELAY_MS");
        if let Some(value) = env_number::<u64, _>(&lookup, &delay)? {
            overrides.retry_delay_ms = Some(value);
        }

        let timeout = format!("{ENV_PREFIX}_{prefix}_TIMEOUT_MS");
        if let Some(value) = env_number::<u64, _>(&lookup, &timeout)? {
            overrides.per_attempt_timeout_ms = Some(value);
        }
    }

    if let Some(filter) = lookup("WAYFARE_LOG").filter(|value| !value.trim().is_empty()) {
        config.logging.filter = filter;
    }

    if let Some(format) = lookup("WAYFARE_LOG_FORMAT") {
        config.logging.format = match format.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" | "pretty" => LogFormat::Text,
            other => {
                return Err(CommonError::config_field(
                    "WAYFARE_LOG_FORMAT",
                    format!("expected `text` or `json`, got `{other}`"),
                ))
            }
        };
    }

    Ok(())
}

fn env_number<T, F>(lookup: &F, key: &str) -> CommonResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CommonError::config_field(key, format!("invalid value `{raw}`: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::{Builder, TempDir};

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create config");
        file.write_all(contents.as_bytes()).expect("write config");
        path
    }

    #[test]
    fn test_env_overrides_each_adapter() {
        let mut config = ResilienceConfig::default();
        let lookup = env(&[
            ("WAYFARE_HTTP_RETRIES", "5"),
            ("WAYFARE_HTTP_TIMEOUT_MS", "2500"),
            ("WAYFARE_DB_RETRY_DELAY_MS", "250"),
            ("WAYFARE_QUERY_MUTATION_RETRIES", "1"),
        ]);

        apply_env_with(&mut config, lookup).expect("valid env");

        assert_eq!(config.http.retries, Some(5));
        assert_eq!(config.http.per_attempt_timeout_ms, Some(2500));
        assert_eq!(config.database.retry_delay_ms, Some(250));
        assert_eq!(config.query_mutation.retries, Some(1));
        assert!(config.query_read.is_empty());
    }

    #[test]
    fn test_env_invalid_number_names_the_variable() {
        let mut config = ResilienceConfig::default();
        let lookup = env(&[("WAYFARE_DB_RETRIES", "three")]);

        let err = apply_env_with(&mut config, lookup).unwrap_err();
        let field = match err {
            CommonError::Config { field, .. } => field,
            other => panic!("expected config error, got {other:?}"),
        };
        assert_eq!(field.as_deref(), Some("WAYFARE_DB_RETRIES"));
    }

    #[test]
    fn test_env_logging_settings() {
        let mut config = ResilienceConfig::default();
        let lookup = env(&[("WAYFARE_LOG", "warn"), ("WAYFARE_LOG_FORMAT", "JSON")]);

        apply_env_with(&mut config, lookup).expect("valid env");
        assert_eq!(config.logging.filter, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);

        let err = apply_env_with(&mut config, env(&[("WAYFARE_LOG_FORMAT", "xml")]));
        assert!(err.is_err());
    }

    #[test]
    fn test_load_from_file_toml() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            "wayfare.toml",
            r#"
[logging]
format = "json"

[http]
retries = 4
per_attempt_timeout_ms = 0

[query_mutation]
retry_delay_ms = 500
"#,
        );

        let config = load_from_file(Some(path)).expect("valid toml");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, crate::config::DEFAULT_LOG_FILTER);
        assert_eq!(config.http.retries, Some(4));
        assert_eq!(config.http_policy().expect("http").per_attempt_timeout(), None);
        assert_eq!(config.query_mutation.retry_delay_ms, Some(500));
        assert!(config.database.is_empty());
    }

    #[test]
    fn test_load_from_file_json() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            "config.json",
            r#"{ "database": { "retries": 2 }, "logging": { "filter": "debug" } }"#,
        );

        let config = load_from_file(Some(path)).expect("valid json");
        assert_eq!(config.database.retries, Some(2));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/wayfare.toml")));
        assert!(matches!(result, Err(CommonError::Config { .. })));
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, "wayfare.toml", "[http\nretries = ");

        let err = load_from_file(Some(path)).unwrap_err();
        assert!(
            matches!(err, CommonError::Serialization { format: Some(ref f), .. } if f == "TOML")
        );
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let file = Builder::new().suffix(".yaml").tempfile().expect("tempfile");
        let result = parse_config("http: {}", file.path());
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_parse_config_rejects_unknown_types() {
        let result = parse_config(r#"{ "http": { "retries": "many" } }"#, Path::new("x.json"));
        assert!(matches!(
            result,
            Err(CommonError::Serialization { format: Some(ref f), .. }) if f == "JSON"
        ));
    }

    #[test]
    fn test_load_from_file_unreadable_path() {
        // A directory exists but cannot be read as a file.
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("wayfare.toml");
        std::fs::create_dir(&path).expect("create dir");

        let err = load_from_file(Some(path)).unwrap_err();
        let operation = match err {
            CommonError::Persistence { operation, .. } => operation,
            other => panic!("expected persistence error, got {other:?}"),
        };
        assert_eq!(operation.as_deref(), Some("read_config"));
    }
}
