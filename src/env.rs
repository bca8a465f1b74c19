//! Environment variable names used by this crate for configuring the
//! logger from a deployed service.
//!
//! These are helpers only; [`Config`] can always be built by hand.

use crate::error::ConfigError;
use crate::init::Config;
use crate::schema::ServiceContext;

/// Minimal level, e.g. `debug`, `info`, `warning`.
pub const LOG_LEVEL_ENV: &str = "STACKDRIVER_LOG_LEVEL";

/// `stackdriver` or `json`.
pub const LOG_ENCODING_ENV: &str = "STACKDRIVER_LOG_ENCODING";

/// `stdout` or `stderr`.
pub const LOG_OUTPUT_ENV: &str = "STACKDRIVER_LOG_OUTPUT";

/// Service name reported in `serviceContext`.
pub const SERVICE_NAME_ENV: &str = "STACKDRIVER_SERVICE_NAME";

/// Service version reported in `serviceContext`.
pub const SERVICE_VERSION_ENV: &str = "STACKDRIVER_SERVICE_VERSION";

impl Config {
    /// [`Config::stackdriver`] with overrides taken from the environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let mut config = Config::stackdriver();

        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Some(encoding) = lookup(LOG_ENCODING_ENV) {
            config.encoding = encoding.parse()?;
        }
        if let Some(output) = lookup(LOG_OUTPUT_ENV) {
            config.output = output.parse()?;
        }
        if let Some(service) = lookup(SERVICE_NAME_ENV) {
            let version = lookup(SERVICE_VERSION_ENV).unwrap_or_default();
            config.service_context = Some(ServiceContext::new(service, version)?);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{Encoding, Output};
    use crate::level::Level;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.level, Level::Debug);
        assert_eq!(config.encoding, Encoding::Stackdriver);
        assert_eq!(config.output, Output::Stdout);
        assert!(config.service_context.is_none());
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            (LOG_LEVEL_ENV, "warning"),
            (LOG_OUTPUT_ENV, "stderr"),
            (SERVICE_NAME_ENV, "example-service"),
            (SERVICE_VERSION_ENV, "v0.1.0"),
        ]))
        .unwrap();

        assert_eq!(config.level, Level::Warn);
        assert_eq!(config.output, Output::Stderr);
        assert_eq!(
            config.service_context,
            Some(ServiceContext::new("example-service", "v0.1.0").unwrap())
        );
    }

    #[test]
    fn invalid_values_fail() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(LOG_LEVEL_ENV, "loud")])),
            Err(ConfigError::InvalidLevel(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(SERVICE_NAME_ENV, "")])),
            Err(ConfigError::EmptyServiceName)
        ));
    }
}
