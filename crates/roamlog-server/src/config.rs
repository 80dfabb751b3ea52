use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub cors_origin: String,
    pub reconnect_delay: Duration,
    pub db_readers: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Unset keys take their
    /// development default; malformed numbers are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: text("ROAMLOG_HOST", "0.0.0.0"),
            port: parse(&lookup, "ROAMLOG_PORT", 3001)?,
            db_path: text("ROAMLOG_DB_PATH", "roamlog.db").into(),
            upload_dir: text("ROAMLOG_UPLOAD_DIR", "./uploads").into(),
            cors_origin: text("ROAMLOG_CORS_ORIGIN", "http://localhost:3000"),
            reconnect_delay: Duration::from_millis(parse(
                &lookup,
                "ROAMLOG_RECONNECT_DELAY_MS",
                5000,
            )?),
            db_readers: parse(&lookup, "ROAMLOG_DB_READERS", 4)?,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid {}: {:?}", key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.db_path, PathBuf::from("roamlog.db"));
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.db_readers, 4);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config(&[("ROAMLOG_PORT", "8080"), ("ROAMLOG_UPLOAD_DIR", "/srv/photos")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_dir, PathBuf::from("/srv/photos"));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config(&[("ROAMLOG_RECONNECT_DELAY_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("ROAMLOG_RECONNECT_DELAY_MS"));
    }
}
