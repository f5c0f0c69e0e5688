//! Monitored targets and the ordered registry that holds them.

use std::collections::HashSet;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// One monitored URL plus the key its status is persisted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    /// Parsed form, used for requests and duplicate detection.
    pub url: Url,
    pub store_key: String,
    /// The URL exactly as configured.
    raw_url: String,
}

impl Target {
    /// Build a target, deriving the store key from `name` when none is given.
    pub fn new(name: &str, url: &str, store_key: Option<&str>) -> ConfigResult<Self> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        let store_key = match store_key {
            Some(key) if !key.trim().is_empty() => key.to_string(),
            Some(_) => {
                return Err(ConfigError::Invalid {
                    field: "targets.key",
                    reason: format!("empty key for target {name:?}"),
                });
            }
            None => default_store_key(name),
        };

        Ok(Self {
            name: name.to_string(),
            url: parsed,
            store_key,
            raw_url: url.trim().to_string(),
        })
    }

    /// The URL as configured; this is what log lines and alert text show.
    pub fn url_str(&self) -> &str {
        &self.raw_url
    }
}

/// Store key used when a target does not name one: `UrlMonitor:Web.<name>:Status`.
pub fn default_store_key(name: &str) -> String {
    format!("UrlMonitor:Web.{name}:Status")
}

/// Fixed, ordered set of targets. Keys and URLs are unique.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Validate and wrap a list of targets, keeping declaration order.
    pub fn new(targets: Vec<Target>) -> ConfigResult<Self> {
        if targets.is_empty() {
            return Err(ConfigError::EmptyTargets);
        }

        let mut keys = HashSet::new();
        let mut urls = HashSet::new();
        for target in &targets {
            if !keys.insert(target.store_key.as_str()) {
                return Err(ConfigError::DuplicateKey(target.store_key.clone()));
            }
            if !urls.insert(target.url.as_str()) {
                return Err(ConfigError::DuplicateUrl(target.url.to_string()));
            }
        }

        Ok(Self { targets })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Look up a target by its store key.
    pub fn get(&self, store_key: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.store_key == store_key)
    }
}

impl<'a> IntoIterator for &'a TargetRegistry {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}
