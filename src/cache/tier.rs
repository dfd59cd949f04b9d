//! Cache Tier Registry
//!
//! Declares the named tiers, their match rules and bounds, and resolves a
//! resource key to the first matching tier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

// == Strategy Kind ==
/// How a request resolved to a tier is satisfied from cache vs. network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    CacheOnly,
    NetworkOnly,
}

// == Match Rule ==
/// A matching rule evaluated against a resource key.
///
/// Written in configuration as `kind:argument`, e.g. `ext:png,jpg` or
/// `contains:/api/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MatchRule {
    /// Path ends in one of these extensions (query string ignored)
    Extension(Vec<String>),
    /// Key starts with the string
    Prefix(String),
    /// Key contains the string
    Contains(String),
    /// Path ends with the string (query string ignored)
    Suffix(String),
    /// Path equals the string (query string ignored)
    Exact(String),
}

impl MatchRule {
    pub fn extensions(exts: &[&str]) -> Self {
        MatchRule::Extension(exts.iter().map(|e| e.to_ascii_lowercase()).collect())
    }

    /// Returns true if the rule matches the resource key.
    pub fn matches(&self, key: &str) -> bool {
        let path = strip_query(key);
        match self {
            MatchRule::Extension(exts) => match path.rsplit_once('.') {
                Some((stem, ext))
                    if !stem.is_empty() && !stem.ends_with('/') && !ext.contains('/') =>
                {
                    exts.iter().any(|e| e.eq_ignore_ascii_case(ext))
                }
                _ => false,
            },
            MatchRule::Prefix(prefix) => key.starts_with(prefix.as_str()),
            MatchRule::Contains(needle) => key.contains(needle.as_str()),
            MatchRule::Suffix(suffix) => path.ends_with(suffix.as_str()),
            MatchRule::Exact(exact) => path == exact,
        }
    }
}

fn strip_query(key: &str) -> &str {
    let end = key.find(['?', '#']).unwrap_or(key.len());
    &key[..end]
}

impl FromStr for MatchRule {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, arg) = s
            .split_once(':')
            .ok_or_else(|| CacheError::Configuration(format!("match rule '{}' has no kind", s)))?;
        if arg.is_empty() {
            return Err(CacheError::Configuration(format!(
                "match rule '{}' has an empty argument",
                s
            )));
        }

        match kind {
            "ext" => {
                let exts: Vec<&str> = arg.split(',').map(str::trim).filter(|e| !e.is_empty()).collect();
                Ok(MatchRule::extensions(&exts))
            }
            "prefix" => Ok(MatchRule::Prefix(arg.to_string())),
            "contains" => Ok(MatchRule::Contains(arg.to_string())),
            "suffix" => Ok(MatchRule::Suffix(arg.to_string())),
            "exact" => Ok(MatchRule::Exact(arg.to_string())),
            other => Err(CacheError::Configuration(format!(
                "unknown match rule kind '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for MatchRule {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MatchRule> for String {
    fn from(rule: MatchRule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::Extension(exts) => write!(f, "ext:{}", exts.join(",")),
            MatchRule::Prefix(s) => write!(f, "prefix:{}", s),
            MatchRule::Contains(s) => write!(f, "contains:{}", s),
            MatchRule::Suffix(s) => write!(f, "suffix:{}", s),
            MatchRule::Exact(s) => write!(f, "exact:{}", s),
        }
    }
}

// == Cache Tier ==
/// A named, bounded cache category with match rules and a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTier {
    pub name: String,
    pub strategy: StrategyKind,
    pub max_age_ms: u64,
    pub max_items: usize,
    pub match_rules: Vec<MatchRule>,
}

impl CacheTier {
    /// Returns true if any of the tier's rules matches the key.
    pub fn matches(&self, key: &str) -> bool {
        self.match_rules.iter().any(|rule| rule.matches(key))
    }
}

/// The default tier table: static, dynamic, pages, fallback.
pub fn default_tiers(offline_url: &str) -> Vec<CacheTier> {
    vec![
        CacheTier {
            name: "static".to_string(),
            strategy: StrategyKind::CacheFirst,
            max_age_ms: 30 * DAY_MS,
            max_items: 100,
            match_rules: vec![
                MatchRule::extensions(&["png", "jpg", "jpeg", "svg", "gif", "webp", "ico"]),
                MatchRule::extensions(&["woff", "woff2", "ttf", "eot"]),
                MatchRule::extensions(&["css", "js"]),
            ],
        },
        CacheTier {
            name: "dynamic".to_string(),
            strategy: StrategyKind::NetworkFirst,
            max_age_ms: DAY_MS,
            max_items: 50,
            match_rules: vec![
                MatchRule::Prefix("https://api.".to_string()),
                MatchRule::Contains("/api/".to_string()),
            ],
        },
        CacheTier {
            name: "pages".to_string(),
            strategy: StrategyKind::StaleWhileRevalidate,
            max_age_ms: 7 * DAY_MS,
            max_items: 50,
            match_rules: vec![
                MatchRule::Suffix("/".to_string()),
                MatchRule::extensions(&["html"]),
            ],
        },
        CacheTier {
            name: "fallback".to_string(),
            strategy: StrategyKind::CacheOnly,
            max_age_ms: 30 * DAY_MS,
            max_items: 10,
            match_rules: vec![MatchRule::Exact(offline_url.to_string())],
        },
    ]
}

// == Tier Registry ==
/// Ordered set of tiers for one process version.
///
/// Resolution order is registration order and never changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct TierRegistry {
    tiers: Vec<CacheTier>,
}

impl TierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a tier table, rejecting duplicate names.
    pub fn from_tiers(tiers: impl IntoIterator<Item = CacheTier>) -> Result<Self> {
        let mut registry = Self::new();
        for tier in tiers {
            registry.register(tier)?;
        }
        Ok(registry)
    }

    // == Register ==
    /// Appends a tier at the lowest priority.
    pub fn register(&mut self, tier: CacheTier) -> Result<()> {
        if tier.name.is_empty() || tier.name.contains('/') {
            return Err(CacheError::Configuration(format!(
                "invalid tier name '{}'",
                tier.name
            )));
        }
        if self.get(&tier.name).is_some() {
            return Err(CacheError::Configuration(format!(
                "duplicate tier '{}'",
                tier.name
            )));
        }
        if tier.max_items == 0 {
            return Err(CacheError::Configuration(format!(
                "tier '{}' must allow at least one item",
                tier.name
            )));
        }
        self.tiers.push(tier);
        Ok(())
    }

    // == Resolve ==
    /// Returns the first tier whose rules match, or None for network passthrough.
    pub fn resolve_tier(&self, key: &str) -> Option<&CacheTier> {
        self.tiers.iter().find(|tier| tier.matches(key))
    }

    pub fn get(&self, name: &str) -> Option<&CacheTier> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    pub fn tiers(&self) -> &[CacheTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TierRegistry {
        TierRegistry::from_tiers(default_tiers("/offline")).unwrap()
    }

    #[test]
    fn test_resolve_static_assets() {
        let registry = registry();
        assert_eq!(registry.resolve_tier("/logo.png").unwrap().name, "static");
        assert_eq!(registry.resolve_tier("/_next/app.js?v=3").unwrap().name, "static");
        assert_eq!(registry.resolve_tier("/fonts/a.WOFF2").unwrap().name, "static");
    }

    #[test]
    fn test_resolve_dynamic_and_pages() {
        let registry = registry();
        assert_eq!(registry.resolve_tier("/api/diseases").unwrap().name, "dynamic");
        assert_eq!(
            registry.resolve_tier("https://api.example.org/v1").unwrap().name,
            "dynamic"
        );
        assert_eq!(registry.resolve_tier("/").unwrap().name, "pages");
        assert_eq!(registry.resolve_tier("/about.html").unwrap().name, "pages");
        assert_eq!(registry.resolve_tier("/offline").unwrap().name, "fallback");
    }

    #[test]
    fn test_first_match_wins() {
        let registry = registry();
        // Matches both dynamic (/api/) and static (.js); static is checked first
        assert_eq!(registry.resolve_tier("/api/bundle.js").unwrap().name, "static");
    }

    #[test]
    fn test_unmatched_key_is_passthrough() {
        let registry = registry();
        assert!(registry.resolve_tier("/doencas").is_none());
        assert!(registry.resolve_tier("/data.json").is_none());
    }

    #[test]
    fn test_duplicate_tier_rejected() {
        let mut registry = registry();
        let dup = default_tiers("/offline").remove(0);
        let result = registry.register(dup);
        assert!(matches!(result, Err(CacheError::Configuration(_))));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut tier = default_tiers("/offline").remove(0);
        tier.max_items = 0;
        assert!(TierRegistry::from_tiers(vec![tier]).is_err());
    }

    #[test]
    fn test_match_rule_parse_and_display() {
        let rule: MatchRule = "ext:PNG, jpg".parse().unwrap();
        assert_eq!(rule, MatchRule::Extension(vec!["png".into(), "jpg".into()]));
        assert_eq!(rule.to_string(), "ext:png,jpg");

        assert!("bogus:x".parse::<MatchRule>().is_err());
        assert!("prefix:".parse::<MatchRule>().is_err());
        assert!("noseparator".parse::<MatchRule>().is_err());
    }

    #[test]
    fn test_extension_ignores_directories_with_dots() {
        let rule = MatchRule::extensions(&["js"]);
        assert!(!rule.matches("/v1.js/readme"));
        assert!(!rule.matches("/.js"));
        assert!(rule.matches("/a.js#frag"));
    }

    #[test]
    fn test_tier_deserialize_from_json() {
        let json = r#"{
            "name": "images",
            "strategy": "CacheFirst",
            "max_age_ms": 1000,
            "max_items": 5,
            "match_rules": ["ext:png", "contains:/img/"]
        }"#;
        let tier: CacheTier = serde_json::from_str(json).unwrap();
        assert!(tier.matches("/img/raw"));
        assert!(tier.matches("/a.png"));
        assert!(!tier.matches("/a.gif"));
    }
}
