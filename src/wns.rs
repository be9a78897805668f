use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::Mutex;

use crate::config::{Config, WnsCredentials};
use crate::error::{NotifyError, Result};
use crate::registry::Registry;
use crate::toast::{build_toast, NotifyData, DEFAULT_TITLE};

pub const WNS_SCOPE: &str = "notify.windows.com";

/// Tokens expiring within this window are refreshed before use.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Longest token lifetime taken at face value from the token endpoint.
const MAX_TOKEN_LIFETIME_SECS: i64 = 30 * 24 * 60 * 60;

pub type HttpsClient = hyper::Client<hyper_tls::HttpsConnector<hyper::client::HttpConnector>>;

pub fn https_client() -> HttpsClient {
    let https = hyper_tls::HttpsConnector::new();
    hyper::Client::builder().build::<_, hyper::Body>(https)
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    token: Option<String>,
    expiry: DateTime<Utc>,
}

impl AccessToken {
    fn usable_at(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.expiry < now + Duration::minutes(REFRESH_MARGIN_MINUTES) {
            return None;
        }
        self.token.as_deref()
    }
}

/// Caches the WNS bearer token and refreshes it with a client-credentials
/// grant when it is about to expire.
pub struct WnsTokenManager {
    client: HttpsClient,
    token_url: String,
    credentials: Option<WnsCredentials>,
    access_token: Mutex<AccessToken>,
}

impl WnsTokenManager {
    pub fn new(
        client: HttpsClient,
        token_url: impl Into<String>,
        credentials: Option<WnsCredentials>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            credentials,
            access_token: Mutex::new(AccessToken {
                token: None,
                expiry: Utc::now(),
            }),
        }
    }

    pub async fn get_token(&self) -> Result<String> {
        // Held across the refresh so concurrent senders wait for one request.
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.usable_at(Utc::now()) {
            return Ok(token.to_string());
        }

        let resp = self.request_token().await?;
        log::debug!("refreshed WNS access token, valid for {}s", resp.expires_in);

        let expiry = token_expiry(Utc::now(), resp.expires_in)?;
        cached.token = Some(resp.access_token.clone());
        cached.expiry = expiry;

        Ok(resp.access_token)
    }

    pub async fn get_auth_header(&self) -> Result<String> {
        let token = self.get_token().await?;
        Ok(format!("Bearer {}", token))
    }

    async fn request_token(&self) -> Result<TokenResponse> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| NotifyError::TokenFetch("client credentials not configured".into()))?;

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &creds.client_id)
            .append_pair("client_secret", &creds.client_secret)
            .append_pair("scope", WNS_SCOPE)
            .finish();

        let req = hyper::Request::post(self.token_url.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(hyper::Body::from(form))
            .map_err(|e| NotifyError::TokenFetch(format!("building request: {}", e)))?;

        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| NotifyError::TokenFetch(e.to_string()))?;

        let status = res.status();
        let body = hyper::body::to_bytes(res.into_body())
            .await
            .map_err(|e| NotifyError::TokenFetch(format!("reading response: {}", e)))?;

        if !status.is_success() {
            return Err(NotifyError::TokenFetch(format!(
                "token endpoint returned {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        serde_json::from_slice(&body)
            .map_err(|e| NotifyError::TokenFetch(format!("invalid token response: {}", e)))
    }

    #[cfg(test)]
    async fn set_token(&self, token: &str, expiry: DateTime<Utc>) {
        let mut cached = self.access_token.lock().await;
        cached.token = Some(token.to_string());
        cached.expiry = expiry;
    }
}

fn token_expiry(now: DateTime<Utc>, expires_in: u64) -> Result<DateTime<Utc>> {
    let secs = i64::try_from(expires_in)
        .unwrap_or(i64::MAX)
        .min(MAX_TOKEN_LIFETIME_SECS);
    now.checked_add_signed(Duration::seconds(secs))
        .ok_or_else(|| NotifyError::TokenFetch(format!("token lifetime {}s out of range", expires_in)))
}

#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    pub title: Option<String>,
    /// Registration ids; `None` or empty sends to everyone.
    pub targets: Option<Vec<String>>,
    pub data: Option<NotifyData>,
}

/// Which targets a send reached. Skipped targets have already been logged.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SendReport {
    pub delivered: Vec<String>,
    pub skipped: Vec<String>,
}

pub struct WnsNotificationService {
    client: HttpsClient,
    tokens: WnsTokenManager,
    registry: Arc<Registry>,
}

impl WnsNotificationService {
    pub fn new(config: &Config, registry: Arc<Registry>) -> Self {
        let client = https_client();
        let tokens = WnsTokenManager::new(client.clone(), &config.token_url, config.credentials());
        Self {
            client,
            tokens,
            registry,
        }
    }

    pub async fn send_message(&self, message: &str, options: NotifyOptions) -> Result<SendReport> {
        let auth = self.tokens.get_auth_header().await?;

        let title = options.title.as_deref().unwrap_or(DEFAULT_TITLE);
        let body = build_toast(title, message, options.data.as_ref());

        let mut report = SendReport::default();
        let channels = self.registry.channels_for(options.targets.as_deref()).await;

        for (target, channel) in channels {
            let channel = match channel {
                Some(c) => c,
                None => {
                    log::error!("{}", NotifyError::UnknownTarget(target.clone()));
                    report.skipped.push(target);
                    continue;
                }
            };

            match self.post_toast(&channel, &auth, &body).await {
                Ok(()) => report.delivered.push(target),
                Err(e) => {
                    log::error!("{}", e);
                    report.skipped.push(target);
                }
            }
        }

        Ok(report)
    }

    async fn post_toast(&self, channel: &str, auth: &str, body: &str) -> Result<()> {
        let delivery = |reason: String| NotifyError::Delivery {
            channel: channel.to_string(),
            reason,
        };

        let req = hyper::Request::post(channel)
            .header(AUTHORIZATION, auth)
            .header("X-WNS-Type", "wns/toast")
            .header(CONTENT_TYPE, "text/xml")
            .body(hyper::Body::from(body.to_string()))
            .map_err(|e| delivery(e.to_string()))?;

        log::debug!("posting toast to {}", channel);
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| delivery(e.to_string()))?;

        if !res.status().is_success() {
            return Err(delivery(format!("provider returned {}", res.status())));
        }
        Ok(())
    }
}
