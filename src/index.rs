use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tokio::fs;
use tracing::warn;

use crate::config::AppConfig;
use crate::netrc::Netrc;
use crate::transmission::Torrent;

const DEFAULT_DESCRIPTION: &str = "auto upload";

/// Outcome of the index existence probe. `Unknown` means the probe itself
/// failed, which callers treat as "skip, do not re-upload".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
    Unknown,
}

/// Client for the index host. All traffic goes through the configured
/// proxy; there is no direct fallback.
pub struct IndexClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl IndexClient {
    pub fn new(cfg: &AppConfig, netrc: &Netrc) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds));
        if !cfg.proxy_url.is_empty() {
            let proxy = reqwest::Proxy::all(&cfg.proxy_url)
                .with_context(|| format!("invalid proxy url {}", cfg.proxy_url))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().context("failed to create index HTTP client")?;

        let (username, password) = cfg
            .index_host()
            .and_then(|host| netrc.lookup(&host).cloned())
            .map(|creds| (creds.login, creds.password))
            .unwrap_or_default();

        Ok(Self {
            client,
            base_url: cfg.index_base_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    /// Canonical metadata URL for a content hash. Valid whether or not the
    /// upload ran; the host resolves `.torrent` files by hash on demand.
    pub fn download_url(&self, hash: &str) -> String {
        format!("{}/dl/{}.torrent", self.base_url, hash)
    }

    pub async fn has_torrent(&self, hash: &str) -> Presence {
        let url = self.download_url(hash);
        match self.authenticated(self.client.get(&url)).send().await {
            Ok(response) if response.status() == StatusCode::OK => Presence::Present,
            Ok(_) => Presence::Absent,
            Err(err) => {
                warn!("index presence check failed for {url}: {err}");
                Presence::Unknown
            }
        }
    }

    /// Submit the torrent's metadata file with its tags. Returns the URL the
    /// index reports on success and `None` on any reply that lacks one; only
    /// a local metadata-file read error is propagated.
    pub async fn upload_torrent(
        &self,
        torrent: &Torrent,
        tags: &[String],
    ) -> Result<Option<String>> {
        let bytes = fs::read(&torrent.torrent_file)
            .await
            .with_context(|| format!("failed reading {}", torrent.torrent_file))?;
        let file_name = Path::new(&torrent.torrent_file)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.torrent".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/bittorrent")
            .context("invalid upload content type")?;
        let form = Form::new()
            .part("torrent-file", part)
            .text("torrent-name", torrent.name.clone())
            .text("torrent-description", DEFAULT_DESCRIPTION.to_string())
            .text("tags", tags.join(","));

        let request = self
            .authenticated(self.client.post(self.upload_url()))
            .multipart(form);

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("upload request failed for {}: {err}", torrent.name);
                return Ok(None);
            }
        };

        match response.json::<Value>().await {
            Ok(reply) => Ok(url_from_reply(&reply)),
            Err(err) => {
                warn!("upload reply was not valid JSON for {}: {err}", torrent.name);
                Ok(None)
            }
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/c/3/?t=json", self.base_url)
    }

    fn authenticated(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.username, Some(&self.password))
        }
    }
}

fn url_from_reply(reply: &Value) -> Option<String> {
    reply
        .get("URL")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}
