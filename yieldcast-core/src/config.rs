//! TOML settings with `YIELDCAST_*` environment overrides.

use std::{env, fmt, fs, io};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::climate::MissingMonthPolicy;

const ENV_PREFIX: &str = "YIELDCAST_";

#[derive(thiserror::Error, Debug)]
/// Errors raised while loading settings.
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The settings file is not valid TOML for [`Settings`].
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is present but unusable.
    #[error("Invalid {field}: {message}")]
    Invalid {
        /// Offending setting.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Runtime settings for the pipeline and its upstream adapters.
pub struct Settings {
    /// Base URL of the postcodes.io API.
    pub postcodes_base_url: String,
    /// Base URL of the NASA POWER API.
    pub nasa_power_base_url: String,
    /// User agent sent upstream.
    pub user_agent: String,
    /// Deadline for one postcode lookup, in seconds.
    pub location_timeout_secs: u64,
    /// Deadline for one climatology request, in seconds.
    pub climate_timeout_secs: u64,
    /// Lifetime of a cached location, in seconds (90 days by default).
    pub location_ttl_secs: u64,
    /// Lifetime of cached climatology, in seconds (30 days by default).
    pub climate_ttl_secs: u64,
    /// Maximum entries per cache; unbounded when absent.
    pub cache_capacity: Option<usize>,
    /// Handling of climatology with missing months.
    pub missing_months: MissingMonthPolicy,
    /// File receiving log output; logging is off when absent.
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            postcodes_base_url: "https://api.postcodes.io".to_owned(),
            nasa_power_base_url: "https://power.larc.nasa.gov/api".to_owned(),
            user_agent: concat!("yieldcast/", env!("CARGO_PKG_VERSION")).to_owned(),
            location_timeout_secs: 10,
            climate_timeout_secs: 30,
            location_ttl_secs: 90 * 24 * 60 * 60,
            climate_ttl_secs: 30 * 24 * 60 * 60,
            cache_capacity: None,
            missing_months: MissingMonthPolicy::ZeroFill,
            log_file: None,
        }
    }
}

impl Settings {
    /// Parse and validate settings from TOML text. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a settings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`Settings::from_toml_str`].
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `YIELDCAST_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable cannot be parsed or the result is
    /// unusable.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a value cannot be parsed or the result is unusable.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(url) = var("POSTCODES_BASE_URL") {
            self.postcodes_base_url = url;
        }
        if let Some(url) = var("NASA_POWER_BASE_URL") {
            self.nasa_power_base_url = url;
        }
        if let Some(agent) = var("USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(raw) = var("LOCATION_TIMEOUT_SECS") {
            self.location_timeout_secs = parse_var("location_timeout_secs", &raw)?;
        }
        if let Some(raw) = var("CLIMATE_TIMEOUT_SECS") {
            self.climate_timeout_secs = parse_var("climate_timeout_secs", &raw)?;
        }
        if let Some(raw) = var("LOCATION_TTL_SECS") {
            self.location_ttl_secs = parse_var("location_ttl_secs", &raw)?;
        }
        if let Some(raw) = var("CLIMATE_TTL_SECS") {
            self.climate_ttl_secs = parse_var("climate_ttl_secs", &raw)?;
        }
        if let Some(raw) = var("CACHE_CAPACITY") {
            self.cache_capacity = Some(parse_var("cache_capacity", &raw)?);
        }
        if let Some(raw) = var("MISSING_MONTHS") {
            self.missing_months = match raw.trim() {
                "zero_fill" => MissingMonthPolicy::ZeroFill,
                "reject" => MissingMonthPolicy::Reject,
                other => {
                    return Err(ConfigError::Invalid {
                        field: "missing_months",
                        message: format!("expected zero_fill or reject, got '{other}'"),
                    });
                }
            };
        }
        if let Some(path) = var("LOG_FILE") {
            self.log_file = Some(PathBuf::from(path));
        }

        self.validate()
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for empty URLs, zero timeouts, zero TTLs or a zero cache
    /// capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool, &str); 7] = [
            (
                "postcodes_base_url",
                self.postcodes_base_url.trim().is_empty(),
                "must not be empty",
            ),
            (
                "nasa_power_base_url",
                self.nasa_power_base_url.trim().is_empty(),
                "must not be empty",
            ),
            (
                "location_timeout_secs",
                self.location_timeout_secs == 0,
                "must be positive",
            ),
            (
                "climate_timeout_secs",
                self.climate_timeout_secs == 0,
                "must be positive",
            ),
            ("location_ttl_secs", self.location_ttl_secs == 0, "must be positive"),
            ("climate_ttl_secs", self.climate_ttl_secs == 0, "must be positive"),
            ("cache_capacity", self.cache_capacity == Some(0), "must be positive"),
        ];

        match checks.into_iter().find(|(_, failed, _)| *failed) {
            Some((field, _, message)) => Err(ConfigError::Invalid {
                field,
                message: message.to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// Deadline for one postcode lookup.
    #[must_use]
    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }

    /// Deadline for one climatology request.
    #[must_use]
    pub fn climate_timeout(&self) -> Duration {
        Duration::from_secs(self.climate_timeout_secs)
    }

    /// Lifetime of a cached location.
    #[must_use]
    pub fn location_ttl(&self) -> Duration {
        Duration::from_secs(self.location_ttl_secs)
    }

    /// Lifetime of cached climatology.
    #[must_use]
    pub fn climate_ttl(&self) -> Duration {
        Duration::from_secs(self.climate_ttl_secs)
    }
}

fn parse_var<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        field,
        message: format!("'{raw}': {err}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_timeouts_and_ttls() {
        let settings = Settings::default();
        assert_eq!(settings.location_timeout(), Duration::from_secs(10));
        assert_eq!(settings.climate_timeout(), Duration::from_secs(30));
        assert_eq!(settings.location_ttl(), Duration::from_secs(7_776_000));
        assert_eq!(settings.climate_ttl(), Duration::from_secs(2_592_000));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            "climate_timeout_secs = 5\nmissing_months = \"reject\"\ncache_capacity = 500\n",
        )
        .expect("valid settings");
        assert_eq!(settings.climate_timeout_secs, 5);
        assert_eq!(settings.missing_months, MissingMonthPolicy::Reject);
        assert_eq!(settings.cache_capacity, Some(500));
        assert_eq!(settings.location_timeout_secs, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::from_toml_str("clmate_timeout_secs = 5\n").expect_err("typo");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let err = Settings::from_toml_str("location_timeout_secs = 0\n").expect_err("zero");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "location_timeout_secs",
                ..
            }
        ));
    }

    #[test]
    fn environment_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("YIELDCAST_POSTCODES_BASE_URL", "http://localhost:9000"),
            ("YIELDCAST_CLIMATE_TTL_SECS", "60"),
            ("YIELDCAST_MISSING_MONTHS", "reject"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_overrides(|name| vars.get(name).map(|value| (*value).to_owned()))
            .expect("valid overrides");

        assert_eq!(settings.postcodes_base_url, "http://localhost:9000");
        assert_eq!(settings.climate_ttl(), Duration::from_secs(60));
        assert_eq!(settings.missing_months, MissingMonthPolicy::Reject);
    }

    #[test]
    fn unparsable_override_names_the_field() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|name| {
                (name == "YIELDCAST_LOCATION_TIMEOUT_SECS").then(|| "soon".to_owned())
            })
            .expect_err("not a number");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "location_timeout_secs",
                ..
            }
        ));
    }
}
