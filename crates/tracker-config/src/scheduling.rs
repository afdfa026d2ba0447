//! Scheduling platform (Pike13) settings.

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://jtl.pike13.com".into()
}

const fn default_page_size() -> u32 {
    500
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulingConfig {
    /// Business subdomain URL; the reporting API lives under `/desk/api/v3`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for the reporting API.
    #[serde(default)]
    pub api_key: String,

    /// Rows requested per reporting query page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            page_size: default_page_size(),
        }
    }
}

impl SchedulingConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}
