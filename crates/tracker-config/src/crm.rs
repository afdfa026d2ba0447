//! CRM (Salesforce) settings.

use serde::{Deserialize, Serialize};

fn default_login_url() -> String {
    "https://login.salesforce.com".into()
}

fn default_api_version() -> String {
    "v59.0".into()
}

const fn default_connect_attempts() -> u32 {
    2
}

const fn default_batch_size() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrmConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// REST API version segment, e.g. `v59.0`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Connected-app consumer key.
    #[serde(default)]
    pub client_id: String,

    /// Connected-app consumer secret.
    #[serde(default)]
    pub client_secret: String,

    /// Integration user name.
    #[serde(default)]
    pub user: String,

    /// Integration user password with its security token appended.
    #[serde(default)]
    pub key: String,

    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Records per composite upsert request (the API caps this at 200).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            api_version: default_api_version(),
            client_id: String::new(),
            client_secret: String::new(),
            user: String::new(),
            key: String::new(),
            connect_attempts: default_connect_attempts(),
            batch_size: default_batch_size(),
        }
    }
}

impl CrmConfig {
    pub fn is_configured(&self) -> bool {
        !self.user.is_empty() && !self.key.is_empty() && !self.client_id.is_empty()
    }
}
