//! Engine configuration from environment variables.
//!
//! | Variable | Values | Default |
//! |---|---|---|
//! | `STOREKEEP_UNASSIGNABLE_POLICY` | `reject`, `strip` | `reject` |
//! | `STOREKEEP_ANY_ROLE_POLICY` | `exempt`, `restricted-union`, `restricted-intersection` | `exempt` |
//! | `STOREKEEP_LOG_FORMAT` | `json`, `text` | `json` |
//! | `STOREKEEP_LOG_FILTER` | any `EnvFilter` directive | `info` |

use anyhow::Context;
use thiserror::Error;

use storekeep_auth::{AnyRolePolicy, AuthoringPolicy, UnassignablePolicy};
use storekeep_observability::{LogFormat, ObservabilityConfig};

pub const UNASSIGNABLE_POLICY_VAR: &str = "STOREKEEP_UNASSIGNABLE_POLICY";
pub const ANY_ROLE_POLICY_VAR: &str = "STOREKEEP_ANY_ROLE_POLICY";
pub const LOG_FORMAT_VAR: &str = "STOREKEEP_LOG_FORMAT";
pub const LOG_FILTER_VAR: &str = "STOREKEEP_LOG_FILTER";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid value '{value}' (expected one of: {expected})")]
pub struct ConfigError {
    pub value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineConfig {
    pub authoring: AuthoringPolicy,
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    pub fn with_authoring(mut self, policy: AuthoringPolicy) -> Self {
        self.authoring = policy;
        self
    }

    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability = config;
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (unset keys keep their defaults).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(UNASSIGNABLE_POLICY_VAR) {
            config.authoring.unassignable =
                parse_unassignable(&raw).with_context(|| format!("reading {UNASSIGNABLE_POLICY_VAR}"))?;
        }
        if let Some(raw) = lookup(ANY_ROLE_POLICY_VAR) {
            config.authoring.any_role =
                parse_any_role(&raw).with_context(|| format!("reading {ANY_ROLE_POLICY_VAR}"))?;
        }
        if let Some(raw) = lookup(LOG_FORMAT_VAR) {
            config.observability.format =
                parse_log_format(&raw).with_context(|| format!("reading {LOG_FORMAT_VAR}"))?;
        }
        if let Some(raw) = lookup(LOG_FILTER_VAR) {
            config.observability.default_filter = raw;
        }

        Ok(config)
    }
}

fn parse_unassignable(raw: &str) -> Result<UnassignablePolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "reject" => Ok(UnassignablePolicy::Reject),
        "strip" => Ok(UnassignablePolicy::Strip),
        _ => Err(ConfigError {
            value: raw.to_string(),
            expected: "reject, strip",
        }),
    }
}

fn parse_any_role(raw: &str) -> Result<AnyRolePolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "exempt" => Ok(AnyRolePolicy::Exempt),
        "restricted-union" => Ok(AnyRolePolicy::RestrictedUnion),
        "restricted-intersection" => Ok(AnyRolePolicy::RestrictedIntersection),
        _ => Err(ConfigError {
            value: raw.to_string(),
            expected: "exempt, restricted-union, restricted-intersection",
        }),
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "text" => Ok(LogFormat::Text),
        _ => Err(ConfigError {
            value: raw.to_string(),
            expected: "json, text",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.authoring.unassignable, UnassignablePolicy::Reject);
        assert_eq!(config.authoring.any_role, AnyRolePolicy::Exempt);
    }

    #[test]
    fn reads_every_variable() {
        let config = EngineConfig::from_lookup(lookup(&[
            (UNASSIGNABLE_POLICY_VAR, "Strip"),
            (ANY_ROLE_POLICY_VAR, "restricted-intersection"),
            (LOG_FORMAT_VAR, "text"),
            (LOG_FILTER_VAR, "storekeep=debug"),
        ]))
        .unwrap();

        assert_eq!(config.authoring.unassignable, UnassignablePolicy::Strip);
        assert_eq!(config.authoring.any_role, AnyRolePolicy::RestrictedIntersection);
        assert_eq!(config.observability.format, LogFormat::Text);
        assert_eq!(config.observability.default_filter, "storekeep=debug");
    }

    #[test]
    fn malformed_value_names_the_variable() {
        let err = EngineConfig::from_lookup(lookup(&[(ANY_ROLE_POLICY_VAR, "lenient")])).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(ANY_ROLE_POLICY_VAR));
        assert!(msg.contains("lenient"));
    }
}
