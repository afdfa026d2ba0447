//! Tracker database connection settings.

use serde::{Deserialize, Serialize};

fn default_path() -> String {
    "tracker.db".into()
}

const fn default_connect_attempts() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Local database file. Used when `url` is empty.
    #[serde(default = "default_path")]
    pub path: String,

    /// Remote libSQL URL (e.g., `libsql://tracker.example.io`).
    #[serde(default)]
    pub url: String,

    /// Password for the remote database, sent as its auth token.
    #[serde(default)]
    pub password: String,

    /// Connection attempts before the run gives up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            url: String::new(),
            password: String::new(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_remote(&self) -> bool {
        !self.url.is_empty()
    }

    /// Remote access needs both a URL and a password; local access needs a path.
    pub fn is_configured(&self) -> bool {
        if self.is_remote() {
            !self.password.is_empty()
        } else {
            !self.path.is_empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_local_file() {
        let config = DatabaseConfig::default();
        assert!(!config.is_remote());
        assert!(config.is_configured());
        assert_eq!(config.connect_attempts, 2);
    }

    #[test]
    fn remote_requires_password() {
        let mut config = DatabaseConfig {
            url: "libsql://tracker.example.io".into(),
            ..Default::default()
        };
        assert!(config.is_remote());
        assert!(!config.is_configured());

        config.password = "secret".into();
        assert!(config.is_configured());
    }
}
