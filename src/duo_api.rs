//! Duo Admin API client for the v2 authentication log.
//!
//! Every request is signed: the date, method, host, path and sorted
//! url-encoded parameters are joined by newlines, HMAC-SHA1'd with the
//! secret key, and sent as HTTP Basic credentials `ikey:hex-signature`
//! alongside the same `Date` header.

use crate::authlog::types::{AuthLogPage, ContinuationToken, LogQuery};
use crate::detection::AuthLogSource;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha1::Sha1;
use std::env;
use std::fs;

type HmacSha1 = Hmac<Sha1>;

/// Request path of the authentication log for an Admin API version.
pub fn auth_log_path(api_version: u8) -> String {
    format!("/admin/v{}/logs/authentication", api_version)
}

/// Duo's JSON envelope: `stat` is `"OK"` or `"FAIL"`.
#[derive(Debug, Deserialize)]
struct Envelope {
    stat: String,
    response: Option<Value>,
    code: Option<u64>,
    message: Option<String>,
    message_detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthLogResponse {
    #[serde(default)]
    authlogs: Vec<Value>,
    metadata: Option<AuthLogMetadata>,
}

#[derive(Debug, Deserialize)]
struct AuthLogMetadata {
    next_offset: Option<Vec<Value>>,
}

/// Admin API client bound to one integration.
#[derive(Debug, Clone)]
pub struct DuoClient {
    ikey: String,
    skey: String,
    host: String,
    base_url: String,
    client: Client,
}

impl DuoClient {
    /// Create a client talking to `https://{host}`
    pub fn new(ikey: String, skey: String, host: String) -> Result<Self> {
        let host = host.trim().trim_end_matches('/').to_lowercase();
        let base_url = format!("https://{}", host);
        Self::with_base_url(ikey, skey, host, base_url)
    }

    /// Create a client that signs for `host` but sends requests to `base_url`
    pub fn with_base_url(
        ikey: String,
        skey: String,
        host: String,
        base_url: String,
    ) -> Result<Self> {
        if ikey.trim().is_empty() || skey.trim().is_empty() || host.trim().is_empty() {
            return Err(anyhow!(
                "Duo integration key, secret key and API host must all be non-empty"
            ));
        }

        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            ikey: ikey.trim().to_string(),
            skey: skey.trim().to_string(),
            host: host.trim().to_lowercase(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a client with optional parameters (for CLI)
    ///
    /// Each value falls back to `DUO_IKEY`, `DUO_SKEY` and `DUO_HOST`; the
    /// secret key may also be read from the file named by `DUO_SKEY_FILE`.
    pub fn from_options(
        ikey: Option<&str>,
        skey: Option<&str>,
        host: Option<&str>,
    ) -> Result<Self> {
        let ikey = ikey
            .map(str::to_string)
            .or_else(|| env::var("DUO_IKEY").ok())
            .ok_or_else(|| {
                anyhow!(
                    "Duo integration key not set. Provide it via:\n\
                     - Command-line: --ikey DIXXXXXXXXXXXXXXXXXX\n\
                     - Environment variable: export DUO_IKEY=DIXXXXXXXXXXXXXXXXXX"
                )
            })?;

        let skey = if let Some(s) = skey {
            s.to_string()
        } else if let Ok(s) = env::var("DUO_SKEY") {
            s
        } else if let Ok(skey_file) = env::var("DUO_SKEY_FILE") {
            fs::read_to_string(&skey_file)
                .with_context(|| format!("Failed to read secret key from file: {}", skey_file))?
                .trim()
                .to_string()
        } else {
            return Err(anyhow!(
                "Duo secret key not set. Provide it via:\n\
                 - Command-line: --skey <secret>\n\
                 - Environment variable: export DUO_SKEY=<secret>\n\
                 - Secret file: export DUO_SKEY_FILE=/path/to/skey"
            ));
        };

        let host = host
            .map(str::to_string)
            .or_else(|| env::var("DUO_HOST").ok())
            .ok_or_else(|| {
                anyhow!(
                    "Duo API host not set. Provide it via:\n\
                     - Command-line: --host api-xxxxxxxx.duosecurity.com\n\
                     - Environment variable: export DUO_HOST=api-xxxxxxxx.duosecurity.com"
                )
            })?;

        Self::new(ikey, skey, host)
    }

    /// The API host used for signing
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Signed GET returning the `response` member of an `OK` envelope
    pub async fn get_json(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S -0000").to_string();
        let query = canonical_params(params);
        let authorization =
            sign_request(&self.ikey, &self.skey, &date, "GET", &self.host, path, &query)?;

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let response = self
            .client
            .get(&url)
            .header("Date", &date)
            .header("Authorization", authorization)
            .send()
            .await
            .context("Failed to send request to Duo")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        let envelope: Option<Envelope> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            return Err(match envelope {
                Some(failure) => anyhow!(
                    "Duo API request failed with status {}: {}",
                    status,
                    describe_failure(&failure)
                ),
                None => anyhow!("Duo API request failed with status {}: {}", status, body),
            });
        }

        let envelope = envelope
            .with_context(|| format!("Failed to parse JSON response from {}", path))?;
        if envelope.stat != "OK" {
            return Err(anyhow!("Duo API returned {}", describe_failure(&envelope)));
        }

        envelope
            .response
            .ok_or_else(|| anyhow!("Duo API response from {} has no `response` member", path))
    }

    /// Fetch one page of the v2 authentication log
    pub async fn authentication_log(
        &self,
        query: &LogQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<AuthLogPage> {
        let mut params = vec![
            ("mintime".to_string(), query.min_time_ms.to_string()),
            ("maxtime".to_string(), query.max_time_ms.to_string()),
            ("limit".to_string(), query.limit.to_string()),
        ];
        if let Some(token) = token {
            params.push(("next_offset".to_string(), token.to_param()));
        }

        let path = auth_log_path(query.api_version);
        let response = self.get_json(&path, &params).await?;
        let parsed: AuthLogResponse = serde_json::from_value(response)
            .context("Failed to deserialize authentication log response")?;

        let next_token = parsed
            .metadata
            .and_then(|m| m.next_offset)
            .map(|parts| ContinuationToken(parts.iter().map(offset_part).collect()))
            .filter(|token| !token.is_empty());

        Ok(AuthLogPage {
            events: parsed.authlogs,
            next_token,
        })
    }
}

#[async_trait]
impl AuthLogSource for DuoClient {
    async fn fetch_page(
        &mut self,
        query: &LogQuery,
        token: Option<&ContinuationToken>,
    ) -> Result<AuthLogPage> {
        self.authentication_log(query, token).await
    }
}

fn offset_part(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn describe_failure(envelope: &Envelope) -> String {
    let mut out = format!("stat={}", envelope.stat);
    if let Some(code) = envelope.code {
        out.push_str(&format!(" code={}", code));
    }
    if let Some(message) = &envelope.message {
        out.push_str(&format!(": {}", message));
    }
    if let Some(detail) = &envelope.message_detail {
        out.push_str(&format!(" ({})", detail));
    }
    out
}

/// Sort parameters and percent-encode keys and values, keeping `~` literal
pub fn canonical_params(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (urlencoding::encode(k).into_owned(), urlencoding::encode(v).into_owned()))
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the `Authorization` header value for a request
pub fn sign_request(
    ikey: &str,
    skey: &str,
    date: &str,
    method: &str,
    host: &str,
    path: &str,
    canonical_query: &str,
) -> Result<String> {
    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}",
        date,
        method.to_uppercase(),
        host.to_lowercase(),
        path,
        canonical_query
    );

    let mut mac = HmacSha1::new_from_slice(skey.as_bytes())
        .map_err(|e| anyhow!("Invalid Duo secret key: {}", e))?;
    mac.update(canonical.as_bytes());
    let signature: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();

    Ok(format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", ikey, signature))
    ))
}
