//! Config schema for the tracing interceptor.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How HTTP status codes are classified into span outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// 5xx and 4xx are errors, except 401 and 403 which are left unset.
    #[default]
    Server,
    /// Every 4xx and 5xx is an error.
    Strict,
    /// Only 5xx is an error.
    ServerErrors,
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Recorded as `http.server_name` on every span when set.
    pub server_name: Option<String>,
    pub status_policy: StatusPolicy,
    /// Record the `User-Agent` header as `http.user_agent`.
    #[serde(default = "default_true")]
    pub record_user_agent: bool,
    /// Record the first `X-Forwarded-For` entry as `http.client_ip`.
    #[serde(default = "default_true")]
    pub record_client_ip: bool,
    /// Record the basic-auth user name as `enduser.id`.
    #[serde(default = "default_true")]
    pub record_enduser: bool,
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            server_name: None,
            status_policy: StatusPolicy::default(),
            record_user_agent: true,
            record_client_ip: true,
            record_enduser: true,
            log_filter: default_log_filter(),
        }
    }
}

impl TracingConfig {
    /// Reject values that parse but can never be meaningful.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.server_name
            && name.trim().is_empty()
        {
            return Err(Error::invalid("server_name must not be empty"));
        }
        if self.log_filter.trim().is_empty() {
            return Err(Error::invalid("log_filter must not be empty"));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".into()
}
