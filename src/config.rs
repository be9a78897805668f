use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_TOKEN_URL: &str = "https://login.live.com/accesstoken.srf";
pub const DEFAULT_REGISTRATIONS_FILE: &str = "windows_push_registrations.conf";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct WnsCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub registrations_file: PathBuf,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            registrations_file: PathBuf::from(DEFAULT_REGISTRATIONS_FILE),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment. Call
    /// `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(p) => p.parse().context("PORT must be a number")?,
            None => defaults.port,
        };

        Ok(Self {
            client_id: lookup("WNS_CLIENT_ID").filter(|s| !s.is_empty()),
            client_secret: lookup("WNS_CLIENT_SECRET").filter(|s| !s.is_empty()),
            token_url: lookup("WNS_TOKEN_URL").unwrap_or(defaults.token_url),
            registrations_file: lookup("WNS_REGISTRATIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.registrations_file),
            port,
        })
    }

    /// Both halves of the client-credentials pair, if configured.
    pub fn credentials(&self) -> Option<WnsCredentials> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Some(WnsCredentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
            }),
            _ => None,
        }
    }
}
