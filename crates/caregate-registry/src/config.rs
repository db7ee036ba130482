//! caregate.toml configuration parser.
//!
//! A registry is configured once at startup: probe cadence, per-attempt
//! timeout, retry budget and the bootstrap list of downstream services.
//! Environment variables override the file, and the result is validated
//! before any registry is built. Validation errors are fatal.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Default probe cadence.
pub const DEFAULT_INTERVAL: &str = "30s";
/// Default per-attempt probe timeout.
pub const DEFAULT_TIMEOUT: &str = "5s";
/// Default number of probe attempts per check.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default health endpoint path appended to each service url.
pub const DEFAULT_HEALTH_PATH: &str = "/health";

const ENV_INTERVAL: &str = "CAREGATE_HEALTH_CHECK_INTERVAL";
const ENV_TIMEOUT: &str = "CAREGATE_HEALTH_CHECK_TIMEOUT";
const ENV_MAX_RETRIES: &str = "CAREGATE_MAX_RETRIES";
const ENV_SERVICES: &str = "CAREGATE_SERVICES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Interval between scheduled check rounds (e.g. "30s").
    pub health_check_interval: String,
    /// Timeout per probe attempt (e.g. "5s").
    pub health_check_timeout: String,
    /// Probe attempts per check before a service is marked unhealthy.
    pub max_retries: u32,
    pub health_path: String,
    /// Services registered at construction.
    pub services: Vec<ServiceEntry>,
}

/// A bootstrap service entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            health_check_interval: DEFAULT_INTERVAL.to_string(),
            health_check_timeout: DEFAULT_TIMEOUT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            services: Vec::new(),
        }
    }
}

impl RegistryConfig {
    pub fn from_file(path: &Path) -> RegistryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> RegistryResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) -> RegistryResult<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// `CAREGATE_SERVICES` holds `name=url` pairs separated by commas; a pair
    /// replaces a configured entry of the same name or is appended. A
    /// `<NAME>_SERVICE_URL` variable then overrides that service's url.
    pub fn apply_env<F>(&mut self, lookup: F) -> RegistryResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_INTERVAL) {
            self.health_check_interval = v;
        }
        if let Some(v) = lookup(ENV_TIMEOUT) {
            self.health_check_timeout = v;
        }
        if let Some(v) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = v.trim().parse().map_err(|_| {
                RegistryError::Config(format!("{ENV_MAX_RETRIES} must be an integer, got {v:?}"))
            })?;
        }
        if let Some(list) = lookup(ENV_SERVICES) {
            for entry in parse_service_list(&list)? {
                match self.services.iter_mut().find(|s| s.name == entry.name) {
                    Some(existing) => existing.url = entry.url,
                    None => self.services.push(entry),
                }
            }
        }
        for service in &mut self.services {
            if let Some(url) = lookup(&service_url_var(&service.name)) {
                service.url = url;
            }
        }
        Ok(())
    }

    /// Check the configuration for errors that must abort startup.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.interval()?.is_zero() {
            return Err(RegistryError::Config("health_check_interval must be > 0".into()));
        }
        // The scheduler and staleness clock add this to the current instant.
        let stale_after = self.stale_after()?;
        if std::time::Instant::now().checked_add(stale_after).is_none() {
            return Err(RegistryError::Config(format!(
                "health_check_interval {:?} is too large",
                self.health_check_interval
            )));
        }
        if self.timeout()?.is_zero() {
            return Err(RegistryError::Config("health_check_timeout must be > 0".into()));
        }
        if self.max_retries == 0 {
            return Err(RegistryError::Config("max_retries must be at least 1".into()));
        }
        if !self.health_path.starts_with('/') {
            return Err(RegistryError::Config(format!(
                "health_path must start with '/', got {:?}",
                self.health_path
            )));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            validate_name(&service.name)?;
            if !seen.insert(service.name.as_str()) {
                return Err(RegistryError::Config(format!(
                    "service {:?} is listed more than once",
                    service.name
                )));
            }
            validate_url(&service.url)?;
        }
        Ok(())
    }

    pub fn interval(&self) -> RegistryResult<Duration> {
        parse_duration(&self.health_check_interval)
    }

    pub fn timeout(&self) -> RegistryResult<Duration> {
        parse_duration(&self.health_check_timeout)
    }

    /// Age after which a record is no longer trusted: twice the interval.
    pub fn stale_after(&self) -> RegistryResult<Duration> {
        self.interval()?.checked_mul(2).ok_or_else(|| {
            RegistryError::Config(format!(
                "health_check_interval {:?} is too large",
                self.health_check_interval
            ))
        })
    }
}

/// Reject empty names and names that cannot appear in a URL path segment.
pub fn validate_name(name: &str) -> RegistryResult<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(RegistryError::Config(format!(
            "invalid service name {name:?} (use letters, digits, '-', '_' or '.')"
        )))
    }
}

/// Require an absolute `http://` URL with a host.
pub fn validate_url(url: &str) -> RegistryResult<()> {
    let invalid = |reason: &str| RegistryError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(invalid(&format!("unsupported scheme {other:?}"))),
        None => return Err(invalid("missing scheme")),
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    if uri.query().is_some() {
        return Err(invalid("query strings are not allowed in a base url"));
    }
    Ok(())
}

/// Environment variable overriding one service's url: `billing-v2` → `BILLING_V2_SERVICE_URL`.
pub fn service_url_var(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{stem}_SERVICE_URL")
}

fn parse_service_list(list: &str) -> RegistryResult<Vec<ServiceEntry>> {
    list.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, url) = pair.split_once('=').ok_or_else(|| {
                RegistryError::Config(format!("{ENV_SERVICES} entry {pair:?} is not name=url"))
            })?;
            Ok(ServiceEntry {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
                version: None,
            })
        })
        .collect()
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> RegistryResult<Duration> {
    let t = s.trim();
    let parsed = if let Some(ms) = t.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = t.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = t.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        t.parse::<u64>().ok().map(Duration::from_secs)
    };
    parsed.ok_or_else(|| RegistryError::InvalidDuration(s.to_string()))
}
