use crate::error::{AppError, Result};
use crate::meter::{RangePreset, ResolutionChoice};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub query: QueryConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

/// The external time-series query service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

/// A set of meters polled together over a named range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub tag_ids: Vec<i64>,
    pub range: RangePreset,
    #[serde(default)]
    pub resolution: ResolutionChoice,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let expanded = expand_env_placeholders(raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;

        // Optional: allow QUERY_SERVICE_URL env to override whatever YAML had
        if let Ok(url) = std::env::var("QUERY_SERVICE_URL") {
            cfg.query.url = url;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.query.url.trim().is_empty() {
            return Err(AppError::Config("query.url cannot be empty".to_string()));
        }
        if self.query.timeout_secs == 0 {
            return Err(AppError::Config(
                "query.timeout_secs must be positive".to_string(),
            ));
        }
        if self.api.port == 0 {
            return Err(AppError::Config("api.port cannot be 0".to_string()));
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(AppError::Config("feed name cannot be empty".to_string()));
            }
            if !names.insert(feed.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate feed name: {}",
                    feed.name
                )));
            }
            if feed.tag_ids.is_empty() {
                return Err(AppError::Config(format!(
                    "feed {} has no tag_ids",
                    feed.name
                )));
            }
            if feed.interval_ms == 0 {
                return Err(AppError::Config(format!(
                    "feed {} interval_ms must be positive",
                    feed.name
                )));
            }
        }

        Ok(())
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
fn expand_env_placeholders(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                // Escape "$$" -> "$"
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                // Not a placeholder; keep the '$' as-is
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close).ok_or_else(|| {
            AppError::Config(format!("unterminated env placeholder: missing '{}'", close))
        })?;
        let val = std::env::var(&var)
            .map_err(|_| AppError::Config(format!("missing environment variable: {}", var)))?;
        out.push_str(&val);
    }

    Ok(out)
}

/// Read characters until we hit `end`, returning the collected string.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::ResolutionTier;
    use serial_test::serial;

    const BASE: &str = r#"
query:
  url: "http://localhost:5000/query"
feeds:
  - name: solar-yesterday
    tag_ids: [13, 15, 11]
    range: daily_energy
    resolution: "86400,1"
  - name: am17-today
    tag_ids: [187]
    range: today
    interval_ms: 500
"#;

    #[test]
    #[serial]
    fn test_parse_with_defaults() {
        std::env::remove_var("QUERY_SERVICE_URL");
        let cfg = Config::from_yaml(BASE).unwrap();

        assert_eq!(cfg.query.url, "http://localhost:5000/query");
        assert_eq!(cfg.query.timeout_secs, 10);
        assert_eq!(cfg.api.host, "0.0.0.0");
        assert_eq!(cfg.api.port, 8080);
        assert_eq!(cfg.feeds.len(), 2);
        assert_eq!(cfg.feeds[0].range, RangePreset::DailyEnergy);
        assert_eq!(
            cfg.feeds[0].resolution,
            ResolutionChoice::Fixed(ResolutionTier::OneDay)
        );
        assert_eq!(cfg.feeds[0].interval_ms, 1000);
        assert_eq!(cfg.feeds[1].resolution, ResolutionChoice::Auto);
        assert_eq!(cfg.feeds[1].interval_ms, 500);
    }

    #[test]
    #[serial]
    fn test_env_placeholders() {
        std::env::remove_var("QUERY_SERVICE_URL");
        std::env::set_var("METER_DELTAS_TEST_HOST", "ems.internal");
        let yaml = "query:\n  url: \"http://${METER_DELTAS_TEST_HOST}:5000/$(METER_DELTAS_TEST_HOST)?a=$$1\"\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.query.url, "http://ems.internal:5000/ems.internal?a=$1");
        std::env::remove_var("METER_DELTAS_TEST_HOST");
    }

    #[test]
    #[serial]
    fn test_missing_env_var_is_error() {
        let err = expand_env_placeholders("url: ${METER_DELTAS_DOES_NOT_EXIST}").unwrap_err();
        assert!(err.to_string().contains("METER_DELTAS_DOES_NOT_EXIST"));

        let err = expand_env_placeholders("url: ${UNTERMINATED").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    #[serial]
    fn test_env_override_of_query_url() {
        std::env::set_var("QUERY_SERVICE_URL", "http://override:5000/query");
        let cfg = Config::from_yaml(BASE).unwrap();
        assert_eq!(cfg.query.url, "http://override:5000/query");
        std::env::remove_var("QUERY_SERVICE_URL");
    }

    #[test]
    #[serial]
    fn test_validation() {
        std::env::remove_var("QUERY_SERVICE_URL");
        let duplicate = r#"
query:
  url: "http://localhost:5000/query"
feeds:
  - { name: a, tag_ids: [1], range: today }
  - { name: a, tag_ids: [2], range: today }
"#;
        assert!(matches!(
            Config::from_yaml(duplicate),
            Err(AppError::Config(_))
        ));

        let no_tags = r#"
query:
  url: "http://localhost:5000/query"
feeds:
  - { name: a, tag_ids: [], range: today }
"#;
        assert!(matches!(Config::from_yaml(no_tags), Err(AppError::Config(_))));

        let bad_step = r#"
query:
  url: "http://localhost:5000/query"
feeds:
  - { name: a, tag_ids: [1], range: today, resolution: "5,1" }
"#;
        assert!(matches!(Config::from_yaml(bad_step), Err(AppError::Yaml(_))));
    }
}
