//! Code host (GitHub) settings.

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://api.github.com".into()
}

fn default_organization() -> String {
    "League-Java".into()
}

fn default_level_organizations() -> Vec<String> {
    vec!["League-Level0-Student".into(), "League-Level1-Student".into()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodeHostConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Personal access token.
    #[serde(default)]
    pub key: String,

    /// Organization searched by the bulk comment pass.
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Organization holding student repositories for each level, indexed by
    /// level number.
    #[serde(default = "default_level_organizations")]
    pub level_organizations: Vec<String>,
}

impl Default for CodeHostConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key: String::new(),
            organization: default_organization(),
            level_organizations: default_level_organizations(),
        }
    }
}

impl CodeHostConfig {
    pub fn is_configured(&self) -> bool {
        !self.key.is_empty()
    }

    pub fn organization_for_level(&self, level: u8) -> Option<&str> {
        self.level_organizations
            .get(usize::from(level))
            .map(String::as_str)
            .filter(|org| !org.is_empty())
    }
}
