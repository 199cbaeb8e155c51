//! Configuration file and environment handling for contact-relay.

use crate::error::Error;
use crate::replies::Language;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Settings of the relay. The SMTP credentials and the receiving mailbox
/// have no defaults and must come from the file or the environment.
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub smtp_server_host: String,
    #[serde(default = "Config::default_smtp_server_port")]
    pub smtp_server_port: u16,
    #[serde(default)]
    pub smtp_starttls: bool,
    #[serde(default)]
    pub smtp_server_username: String,
    #[serde(default)]
    pub smtp_server_password: String,
    #[serde(default)]
    pub site_mail_receiver: String,
    #[serde(default = "Config::default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
    #[serde(default = "Config::default_max_submissions_per_window")]
    pub max_submissions_per_window: usize,
    #[serde(default = "Config::default_rate_window_secs")]
    pub rate_window_secs: u64,
    #[serde(default = "Config::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "Config::default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default, deserialize_with = "deserialize_language")]
    pub default_language: Language,
}

fn deserialize_language<'de, D>(deserializer: D) -> Result<Language, D::Error>
where
    D: Deserializer<'de>,
{
    let tag: String = Deserialize::deserialize(deserializer)?;
    Language::from_tag(&tag)
        .ok_or_else(|| serde::de::Error::custom(format!("unsupported language `{tag}`")))
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigWrapper {
    // Everything lives under the `[relay]` section.
    pub relay: Config,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("smtp_server_host", &self.smtp_server_host)
            .field("smtp_server_port", &self.smtp_server_port)
            .field("smtp_starttls", &self.smtp_starttls)
            .field("smtp_server_username", &self.smtp_server_username)
            .field("smtp_server_password", &"<redacted>")
            .field("site_mail_receiver", &self.site_mail_receiver)
            .field("dispatch_timeout_secs", &self.dispatch_timeout_secs)
            .field("max_submissions_per_window", &self.max_submissions_per_window)
            .field("rate_window_secs", &self.rate_window_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("default_language", &self.default_language)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            smtp_server_host: String::new(),
            smtp_server_port: Self::default_smtp_server_port(),
            smtp_starttls: false,
            smtp_server_username: String::new(),
            smtp_server_password: String::new(),
            site_mail_receiver: String::new(),
            dispatch_timeout_secs: Self::default_dispatch_timeout_secs(),
            max_submissions_per_window: Self::default_max_submissions_per_window(),
            rate_window_secs: Self::default_rate_window_secs(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
            max_body_bytes: Self::default_max_body_bytes(),
            default_language: Language::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ini(&content)
    }

    /// Parse configuration from INI text.
    pub fn from_ini(content: &str) -> Result<Self, Error> {
        let wrapped_config: ConfigWrapper = serini::from_str(content)?;
        Ok(wrapped_config.relay)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, Error> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by environment variable name.
    ///
    /// Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(addr) = get("CONTACT_RELAY_LISTEN") {
            self.listen_addr = addr;
        }
        if let Some(host) = get("SMTP_SERVER_HOST") {
            self.smtp_server_host = host;
        }
        if let Some(port) = get("SMTP_SERVER_PORT") {
            self.smtp_server_port = port.trim().parse().map_err(|e| Error::InvalidConfig {
                key: "SMTP_SERVER_PORT",
                reason: format!("{e}"),
            })?;
        }
        if let Some(username) = get("SMTP_SERVER_USERNAME") {
            self.smtp_server_username = username;
        }
        if let Some(password) = get("SMTP_SERVER_PASSWORD") {
            self.smtp_server_password = password;
        }
        // Older deployments use the misspelled variable.
        if let Some(receiver) = get("SITE_MAIL_RECEIVER").or_else(|| get("SITE_MAIL_RECIEVER")) {
            self.site_mail_receiver = receiver;
        }
        Ok(self)
    }

    /// Check that every required setting is present and usable.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("smtp_server_host", &self.smtp_server_host),
            ("smtp_server_username", &self.smtp_server_username),
            ("smtp_server_password", &self.smtp_server_password),
            ("site_mail_receiver", &self.site_mail_receiver),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::MissingConfig(key));
            }
        }

        let positive = [
            ("dispatch_timeout_secs", self.dispatch_timeout_secs),
            ("rate_window_secs", self.rate_window_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.max_submissions_per_window == 0 {
            return Err(Error::InvalidConfig {
                key: "max_submissions_per_window",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Language used for the relayed mail and for visitors without a usable `Accept-Language`.
    pub fn language(&self) -> Language {
        self.default_language
    }

    // Following are needed since serde does not support default literals.

    fn default_listen_addr() -> String {
        "127.0.0.1:3000".to_string()
    }
    const fn default_smtp_server_port() -> u16 {
        465
    }
    const fn default_dispatch_timeout_secs() -> u64 {
        10
    }
    const fn default_max_submissions_per_window() -> usize {
        5
    }
    const fn default_rate_window_secs() -> u64 {
        60
    }
    const fn default_sweep_interval_secs() -> u64 {
        300
    }
    const fn default_max_body_bytes() -> usize {
        16 * 1024
    }
}
