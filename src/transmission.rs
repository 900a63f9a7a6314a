use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::AppConfig;
use crate::netrc::Netrc;

/// Read-only snapshot of a torrent as reported by the source client. The
/// daemon owns and mutates these; one snapshot is taken per run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Torrent {
    pub name: String,
    pub hash_string: String,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub download_dir: String,
    #[serde(default)]
    pub torrent_file: String,
    #[serde(default)]
    pub files: Vec<TorrentFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentFile {
    /// Path relative to the torrent's download directory.
    pub name: String,
    #[serde(default)]
    pub length: u64,
}

const TORRENT_FIELDS: [&str; 6] = [
    "name",
    "hashString",
    "isFinished",
    "downloadDir",
    "torrentFile",
    "files",
];

pub struct TransmissionClient {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

impl TransmissionClient {
    pub fn new(cfg: &AppConfig, netrc: &Netrc) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds))
            .build()
            .context("failed to create Transmission HTTP client")?;

        let mut username = cfg.transmission_username.clone();
        let mut password = cfg.transmission_password.clone();
        if username.is_empty() {
            if let Some(creds) = netrc.lookup(&cfg.transmission_host) {
                username = creds.login.clone();
                password = creds.password.clone();
            }
        }

        Ok(Self {
            client,
            endpoint: format!(
                "{}/transmission/rpc",
                endpoint_base(&cfg.transmission_host, cfg.transmission_port)
            ),
            username,
            password,
        })
    }

    pub async fn list_torrents(&self) -> Result<Vec<Torrent>> {
        let payload = json!({
            "method": "torrent-get",
            "arguments": { "fields": TORRENT_FIELDS },
        });
        let response = self.rpc(payload).await?;

        if response.get("result").and_then(Value::as_str) != Some("success") {
            bail!(
                "Transmission returned error: {}",
                response
                    .get("result")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            );
        }

        let torrents = response
            .get("arguments")
            .and_then(|args| args.get("torrents"))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        serde_json::from_value(torrents).context("failed decoding torrent list")
    }

    /// One RPC round trip, renegotiating the session ID on HTTP 409 as the
    /// protocol requires.
    async fn rpc(&self, payload: Value) -> Result<Value> {
        let mut session_id: Option<String> = None;
        for _ in 0..3 {
            let mut request = self.client.post(&self.endpoint).json(&payload);
            if let Some(id) = session_id.as_deref() {
                request = request.header("X-Transmission-Session-Id", id);
            }
            if !self.username.is_empty() {
                request = request.basic_auth(&self.username, Some(&self.password));
            }

            let response = request
                .send()
                .await
                .context("transmission request failed")?;
            if response.status() == StatusCode::CONFLICT {
                session_id = response
                    .headers()
                    .get("X-Transmission-Session-Id")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                continue;
            }
            if !response.status().is_success() {
                bail!("transmission RPC failed with HTTP {}", response.status());
            }
            return response
                .json::<Value>()
                .await
                .context("failed decoding transmission response");
        }

        Err(anyhow!("failed negotiating transmission session ID"))
    }
}

fn endpoint_base(host: &str, port: u16) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    let trimmed = if trimmed.is_empty() {
        "127.0.0.1"
    } else {
        trimmed
    };
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}:{port}")
    }
}
