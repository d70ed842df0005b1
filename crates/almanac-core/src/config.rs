use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub expansion: ExpansionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Knobs for recurrence expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpansionConfig {
    /// Zone used to anchor floating and date-only values when ordering.
    pub timezone: String,
    /// Upper bound on occurrences materialized by a single timeline dump.
    pub max_instances: usize,
    /// Number of occurrences pulled from the rule engine per batch.
    pub page_size: u16,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from defaults, `ALMANAC_*` environment variables
    /// (`__` separates sections, e.g. `ALMANAC_EXPANSION__PAGE_SIZE`) and an
    /// optional `config.toml`.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("expansion.timezone", "UTC")?
            .set_default("expansion.max_instances", 100)?
            .set_default("expansion.page_size", 128)?
            .add_source(
                config::Environment::with_prefix("ALMANAC")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Checks the values that deserialization alone cannot reject.
    ///
    /// ## Errors
    /// Returns `CoreError::InvalidSetting` naming the first offending key.
    pub fn validate(&self) -> CoreResult<()> {
        if self.expansion.page_size == 0 {
            return Err(CoreError::InvalidSetting {
                key: "expansion.page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.expansion.max_instances == 0 {
            return Err(CoreError::InvalidSetting {
                key: "expansion.max_instances",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.expansion.timezone.trim().is_empty() {
            return Err(CoreError::InvalidSetting {
                key: "expansion.timezone",
                reason: "must name a timezone".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            expansion: ExpansionConfig {
                timezone: "UTC".to_string(),
                max_instances: 100,
                page_size: 128,
            },
        }
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    tracing::debug!(
        timezone = %settings.expansion.timezone,
        max_instances = settings.expansion.max_instances,
        "Configuration loaded"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().expect("defaults validate");
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut settings = Settings::default();
        settings.expansion.page_size = 0;

        let err = settings.validate().expect_err("page size 0 rejected");
        assert!(matches!(
            err,
            CoreError::InvalidSetting {
                key: "expansion.page_size",
                ..
            }
        ));
    }

    #[test]
    fn blank_timezone_is_rejected() {
        let mut settings = Settings::default();
        settings.expansion.timezone = "  ".to_string();

        assert!(settings.validate().is_err());
    }

    #[test_log::test]
    fn load_without_sources_uses_defaults() {
        let settings = Settings::load().expect("defaults load");
        assert!(settings.expansion.page_size > 0);
        assert!(!settings.logging.level.is_empty());
    }
}
