use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::index::{IndexClient, Presence};
use crate::mirror;
use crate::netrc::Netrc;
use crate::seeder::SeederClient;
use crate::tags;
use crate::transmission::{Torrent, TransmissionClient};

/// The mirroring pipeline: list torrents from the source client, and for
/// each finished release-group torrent unknown to the seeder, copy its
/// payload, upload its metadata to the index when missing, and dispatch the
/// canonical URL to the seeder.
pub struct Mirror {
    config: AppConfig,
    transmission: TransmissionClient,
    index: IndexClient,
    seeder: SeederClient,
}

impl Mirror {
    pub fn new(config: AppConfig) -> Result<Self> {
        let netrc = Netrc::load(&config.netrc_path());
        let transmission = TransmissionClient::new(&config, &netrc)?;
        let index = IndexClient::new(&config, &netrc)?;
        let seeder = SeederClient::new(&config)?;

        Ok(Self {
            config,
            transmission,
            index,
            seeder,
        })
    }

    /// One full pass over the source client's torrent set. Returns how many
    /// torrents were processed.
    pub async fn run(&self) -> Result<usize> {
        let torrents = self.transmission.list_torrents().await?;
        info!("source client reported {} torrents", torrents.len());

        let mut processed = 0usize;
        for torrent in &torrents {
            if !self.should_process(torrent).await? {
                continue;
            }
            self.process(torrent).await?;
            processed += 1;
        }

        Ok(processed)
    }

    /// A torrent is eligible once it has all its data, the seeder does not
    /// track it yet, and its name carries the release-group prefix.
    async fn should_process(&self, torrent: &Torrent) -> Result<bool> {
        if !torrent.is_finished {
            return Ok(false);
        }
        if self.seeder.has_torrent(&torrent.hash_string).await? {
            return Ok(false);
        }
        Ok(tags::has_source_prefix(&torrent.name))
    }

    async fn process(&self, torrent: &Torrent) -> Result<()> {
        info!("processing {}", torrent.name);

        mirror::copy_torrent_files(torrent, &self.config.dest_dir()).await?;

        match self.index.has_torrent(&torrent.hash_string).await {
            Presence::Present => {
                info!("index already has {}", torrent.name);
            }
            Presence::Absent => {
                self.upload_with_retries(torrent).await?;
            }
            Presence::Unknown => {
                warn!(
                    "index presence unknown for {}; skipping upload",
                    torrent.name
                );
            }
        }

        // The index serves metadata by hash on demand, so the dispatch runs
        // even when no upload was confirmed.
        let url = self.index.download_url(&torrent.hash_string);
        info!("adding {url}");
        self.seeder.add_torrent(&url).await?;

        Ok(())
    }

    async fn upload_with_retries(&self, torrent: &Torrent) -> Result<()> {
        let tags = tags::generate_tags(&torrent.name);
        let attempts = self.config.upload_attempts.max(1);
        let backoff = Duration::from_secs_f64(self.config.upload_backoff_sec.max(0.0));

        info!("upload {}", torrent.name);
        let outcome = with_retries(attempts, backoff, |attempt| {
            let tags = tags.clone();
            async move {
                let url = self.index.upload_torrent(torrent, &tags).await?;
                if url.is_none() {
                    warn!(
                        "upload failed for {}, {} tries left",
                        torrent.name,
                        attempts - attempt
                    );
                }
                Ok(url)
            }
        })
        .await?;

        match outcome {
            Some(url) => info!("uploaded to {url}"),
            None => warn!(
                "upload abandoned for {} after {attempts} attempts",
                torrent.name
            ),
        }

        Ok(())
    }
}

/// Run `op` until it yields a value, up to `attempts` times with a fixed
/// pause between tries. `op` receives the 1-based attempt number; an `Err`
/// aborts the loop immediately.
pub async fn with_retries<T, F, Fut>(
    attempts: usize,
    backoff: Duration,
    mut op: F,
) -> Result<Option<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=attempts {
        if let Some(value) = op(attempt).await? {
            return Ok(Some(value));
        }
        if attempt < attempts && !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use anyhow::anyhow;

    use super::{Mirror, with_retries};
    use crate::config::AppConfig;
    use crate::transmission::Torrent;

    #[tokio::test]
    async fn unfinished_torrent_never_passes_the_filter() {
        let mirror = Mirror::new(AppConfig {
            proxy_url: String::new(),
            netrc_path: "/nonexistent/netrc".to_string(),
            ..AppConfig::default()
        })
        .unwrap();

        // the completion check short-circuits before any remote query
        let torrent = Torrent {
            name: "[HorribleSubs] Show - 01 [1080p].mkv".to_string(),
            hash_string: "0123456789abcdef0123456789abcdef01234567".to_string(),
            is_finished: false,
            download_dir: String::new(),
            torrent_file: String::new(),
            files: Vec::new(),
        };

        assert!(!mirror.should_process(&torrent).await.unwrap());
    }

    #[tokio::test]
    async fn stops_on_first_success() {
        let calls = Cell::new(0usize);
        let result: Option<&str> = with_retries(10, Duration::ZERO, |_| {
            calls.set(calls.get() + 1);
            async { Ok(Some("url")) }
        })
        .await
        .unwrap();

        assert_eq!(result, Some("url"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn nine_failures_then_success_uses_all_ten_attempts() {
        let calls = Cell::new(0usize);
        let result = with_retries(10, Duration::ZERO, |attempt| {
            calls.set(calls.get() + 1);
            async move {
                Ok(if attempt == 10 {
                    Some("http://anodex.i2p/dl/ff.torrent".to_string())
                } else {
                    None
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(result.as_deref(), Some("http://anodex.i2p/dl/ff.torrent"));
        assert_eq!(calls.get(), 10);
    }

    #[tokio::test]
    async fn exhaustion_returns_none_without_error() {
        let calls = Cell::new(0usize);
        let result: Option<String> = with_retries(10, Duration::ZERO, |_| {
            calls.set(calls.get() + 1);
            async { Ok(None) }
        })
        .await
        .unwrap();

        assert_eq!(result, None);
        assert_eq!(calls.get(), 10);
    }

    #[tokio::test]
    async fn hard_error_aborts_the_loop() {
        let calls = Cell::new(0usize);
        let result: anyhow::Result<Option<String>> = with_retries(10, Duration::ZERO, |_| {
            calls.set(calls.get() + 1);
            async { Err(anyhow!("metadata file vanished")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
