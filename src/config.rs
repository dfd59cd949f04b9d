//! Configuration Module
//!
//! Loads the cache manager's configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::cache::{default_tiers, CacheTier};

/// Cache manager configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace prefix
    pub app_id: String,
    /// Version deployed at startup
    pub version: String,
    /// Control server port
    pub server_port: u16,
    /// Upstream origin
    pub origin_url: String,
    /// NetworkFirst race bound in milliseconds
    pub network_timeout_ms: u64,
    /// Bound on every origin request in milliseconds
    pub fetch_timeout_ms: u64,
    /// How long a control message sender waits for its reply, in milliseconds
    pub message_timeout_ms: u64,
    /// Seconds between expiry sweeps
    pub sweep_interval: u64,
    /// FileStorage root; memory storage when unset
    pub cache_dir: Option<PathBuf>,
    /// Offline fallback document
    pub offline_url: String,
    /// Install precache list
    pub precache_urls: Vec<String>,
    /// Host supports a caching process
    pub caching_supported: bool,
    /// Origin path of the version manifest
    pub version_path: Option<String>,
    /// Tier table in priority order
    pub tiers: Vec<CacheTier>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `APP_ID` - Namespace prefix (default: offline-cache)
    /// - `CACHE_VERSION` - Version deployed at startup (default: v1.0.0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `ORIGIN_URL` - Upstream origin (default: http://127.0.0.1:8080)
    /// - `NETWORK_TIMEOUT_MS` - NetworkFirst timeout (default: 3000)
    /// - `FETCH_TIMEOUT_MS` - Timeout of any single origin request (default: 30000)
    /// - `MESSAGE_TIMEOUT_MS` - Wait for a control message reply (default: 60000)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `CACHE_DIR` - Persist namespaces under this directory (default: unset)
    /// - `OFFLINE_URL` - Offline fallback document (default: /offline)
    /// - `PRECACHE_URLS` - Comma-separated install precache list (default: /)
    /// - `CACHING_SUPPORTED` - Host capability flag (default: true)
    /// - `VERSION_PATH` - Read the deployed version from this origin path (default: unset)
    /// - `TIERS_FILE` - JSON tier table replacing the defaults (default: unset)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let offline_url = lookup("OFFLINE_URL").unwrap_or(defaults.offline_url);
        let tiers = match lookup("TIERS_FILE") {
            Some(path) => load_tiers(&path)?,
            None => default_tiers(&offline_url),
        };

        Ok(Self {
            app_id: lookup("APP_ID").unwrap_or(defaults.app_id),
            version: lookup("CACHE_VERSION").unwrap_or(defaults.version),
            server_port: parsed(&lookup, "SERVER_PORT").unwrap_or(defaults.server_port),
            origin_url: lookup("ORIGIN_URL").unwrap_or(defaults.origin_url),
            network_timeout_ms: parsed(&lookup, "NETWORK_TIMEOUT_MS").unwrap_or(defaults.network_timeout_ms),
            fetch_timeout_ms: parsed(&lookup, "FETCH_TIMEOUT_MS").unwrap_or(defaults.fetch_timeout_ms),
            message_timeout_ms: parsed(&lookup, "MESSAGE_TIMEOUT_MS").unwrap_or(defaults.message_timeout_ms),
            sweep_interval: parsed(&lookup, "SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            cache_dir: lookup("CACHE_DIR").map(PathBuf::from),
            precache_urls: lookup("PRECACHE_URLS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.precache_urls),
            caching_supported: parsed(&lookup, "CACHING_SUPPORTED").unwrap_or(defaults.caching_supported),
            version_path: lookup("VERSION_PATH"),
            offline_url,
            tiers,
        })
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms.max(1))
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        let offline_url = "/offline".to_string();
        Self {
            app_id: "offline-cache".to_string(),
            version: "v1.0.0".to_string(),
            server_port: 3000,
            origin_url: "http://127.0.0.1:8080".to_string(),
            network_timeout_ms: 3000,
            fetch_timeout_ms: 30_000,
            message_timeout_ms: 60_000,
            sweep_interval: 60,
            cache_dir: None,
            precache_urls: vec!["/".to_string()],
            caching_supported: true,
            version_path: None,
            tiers: default_tiers(&offline_url),
            offline_url,
        }
    }
}

/// Unparseable values fall back to the default, like unset ones.
fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn load_tiers(path: &str) -> anyhow::Result<Vec<CacheTier>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading tier table {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing tier table {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use crate::cache::{MatchRule, StrategyKind};

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.app_id, "offline-cache");
        assert_eq!(config.version, "v1.0.0");
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.network_timeout(), Duration::from_secs(3));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.precache_urls, vec!["/"]);
        assert_eq!(config.tiers.len(), 4);
    }

    #[test]
    fn test_config_from_empty_env_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.sweep_interval, 60);
        assert!(config.caching_supported);
        assert!(config.cache_dir.is_none());
        assert_eq!(config.tiers, Config::default().tiers);
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("APP_ID", "medref"),
            ("SERVER_PORT", "4000"),
            ("NETWORK_TIMEOUT_MS", "250"),
            ("FETCH_TIMEOUT_MS", "1500"),
            ("PRECACHE_URLS", "/, /index.html ,,/manifest.json"),
            ("CACHING_SUPPORTED", "false"),
            ("OFFLINE_URL", "/offline.html"),
        ]))
        .unwrap();

        assert_eq!(config.app_id, "medref");
        assert_eq!(config.server_port, 4000);
        assert_eq!(config.network_timeout_ms, 250);
        assert_eq!(config.fetch_timeout(), Duration::from_millis(1500));
        assert_eq!(config.precache_urls, vec!["/", "/index.html", "/manifest.json"]);
        assert!(!config.caching_supported);

        let fallback = config.tiers.iter().find(|t| t.name == "fallback").unwrap();
        assert_eq!(fallback.match_rules, vec![MatchRule::Exact("/offline.html".to_string())]);
    }

    #[test]
    fn test_unparseable_number_falls_back() {
        let config = Config::from_lookup(lookup_from(&[("SERVER_PORT", "http")])).unwrap();
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_tiers_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"images","strategy":"CacheFirst","max_age_ms":1000,"max_items":5,"match_rules":["ext:png"]}}]"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = Config::from_lookup(lookup_from(&[("TIERS_FILE", path.as_str())])).unwrap();
        assert_eq!(config.tiers.len(), 1);
        assert_eq!(config.tiers[0].strategy, StrategyKind::CacheFirst);
        assert!(config.tiers[0].matches("/logo.png"));
    }

    #[test]
    fn test_bad_tiers_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name":"x","match_rules":["glob:*"]}}]"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        assert!(Config::from_lookup(lookup_from(&[("TIERS_FILE", path.as_str())])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("TIERS_FILE", "/nonexistent/tiers.json")])).is_err());
    }
}
