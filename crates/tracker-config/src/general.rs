//! General application configuration.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_timezone() -> String {
    "America/Los_Angeles".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// IANA time zone that defines "today" and the run stamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl GeneralConfig {
    /// Parse the configured time zone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for names outside the IANA database.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "general.timezone".into(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_pacific_time() {
        let config = GeneralConfig::default();
        assert_eq!(config.tz().unwrap(), chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn unknown_zone_is_invalid() {
        let config = GeneralConfig {
            timezone: "Mars/Olympus_Mons".into(),
        };
        assert!(matches!(
            config.tz(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "general.timezone"
        ));
    }
}
