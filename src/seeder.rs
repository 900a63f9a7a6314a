use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::AppConfig;

/// Client for the seeding daemon's JSON-RPC endpoint.
pub struct SeederClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SeederClient {
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds))
            .build()
            .context("failed to create seeder HTTP client")?;

        Ok(Self {
            client,
            endpoint: cfg.seeder_api.clone(),
        })
    }

    /// Whether the daemon already tracks this infohash. A failed call is an
    /// error, not a negative answer.
    pub async fn has_torrent(&self, infohash: &str) -> Result<bool> {
        let reply = self
            .call(json!({ "method": "XD.TorrentStatus", "infohash": infohash }))
            .await?;
        Ok(is_known(&reply))
    }

    /// Ask the daemon to fetch and seed the torrent behind `url`. The reply
    /// is decoded but not inspected.
    pub async fn add_torrent(&self, url: &str) -> Result<()> {
        let reply = self
            .call(json!({ "method": "XD.AddTorrent", "url": url }))
            .await?;
        debug!("add-torrent reply: {reply}");
        Ok(())
    }

    async fn call(&self, payload: Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .context("seeder request failed")?;

        response
            .json::<Value>()
            .await
            .context("failed decoding seeder response")
    }
}

/// The daemon answers a status query with `{"error": <msg>}` for unknown
/// torrents and `{"error": null, "result": ...}` for tracked ones.
fn is_known(reply: &Value) -> bool {
    match reply.get("error") {
        None | Some(Value::Null) => true,
        Some(_) => false,
    }
}
