use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
struct FileConfig {
    proxy_url: Option<String>,
    dest_dir: Option<String>,
    transmission_host: Option<String>,
    transmission_port: Option<u16>,
    transmission_username: Option<String>,
    transmission_password: Option<String>,
    index_base_url: Option<String>,
    seeder_api: Option<String>,
    upload_attempts: Option<usize>,
    upload_backoff_sec: Option<f64>,
    http_timeout_seconds: Option<u64>,
    netrc_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP proxy for all index-host traffic; empty disables proxying.
    pub proxy_url: String,
    /// Directory the mirrored payload files are copied into.
    pub dest_dir: String,
    pub transmission_host: String,
    pub transmission_port: u16,
    pub transmission_username: String,
    pub transmission_password: String,
    pub index_base_url: String,
    pub seeder_api: String,
    pub upload_attempts: usize,
    pub upload_backoff_sec: f64,
    pub http_timeout_seconds: u64,
    pub netrc_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            proxy_url: "http://127.0.0.1:4444/".to_string(),
            dest_dir: "/home/xd/storage/downloads/".to_string(),
            transmission_host: "127.0.0.1".to_string(),
            transmission_port: 9091,
            transmission_username: String::new(),
            transmission_password: String::new(),
            index_base_url: "http://anodex.i2p".to_string(),
            seeder_api: "http://127.0.0.1:1488/ecksdee/api".to_string(),
            upload_attempts: 10,
            upload_backoff_sec: 0.0,
            http_timeout_seconds: 120,
            netrc_path: String::new(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(path) = find_config_file() {
            cfg.apply_file(load_file_config(&path)?);
        }
        cfg.apply_env();

        Ok(cfg)
    }

    fn apply_file(&mut self, file_cfg: FileConfig) {
        set_opt(&mut self.proxy_url, file_cfg.proxy_url);
        set_opt(&mut self.dest_dir, file_cfg.dest_dir);
        set_opt(&mut self.transmission_host, file_cfg.transmission_host);
        set_opt(&mut self.transmission_port, file_cfg.transmission_port);
        set_opt(
            &mut self.transmission_username,
            file_cfg.transmission_username,
        );
        set_opt(
            &mut self.transmission_password,
            file_cfg.transmission_password,
        );
        set_opt(&mut self.index_base_url, file_cfg.index_base_url);
        set_opt(&mut self.seeder_api, file_cfg.seeder_api);
        set_opt_usize_min(&mut self.upload_attempts, file_cfg.upload_attempts, 1);
        set_opt_f64_min(
            &mut self.upload_backoff_sec,
            file_cfg.upload_backoff_sec,
            0.0,
        );
        set_opt_u64_min(
            &mut self.http_timeout_seconds,
            file_cfg.http_timeout_seconds,
            5,
        );
        set_opt(&mut self.netrc_path, file_cfg.netrc_path);
    }

    fn apply_env(&mut self) {
        let env_cfg = FileConfig {
            proxy_url: env_string("SEEDMIRROR_PROXY_URL"),
            dest_dir: env_string("SEEDMIRROR_DEST_DIR"),
            transmission_host: env_string("SEEDMIRROR_TRANSMISSION_HOST"),
            transmission_port: env_parse("SEEDMIRROR_TRANSMISSION_PORT"),
            transmission_username: env_string("SEEDMIRROR_TRANSMISSION_USERNAME"),
            transmission_password: env_string("SEEDMIRROR_TRANSMISSION_PASSWORD"),
            index_base_url: env_string("SEEDMIRROR_INDEX_BASE_URL"),
            seeder_api: env_string("SEEDMIRROR_SEEDER_API"),
            upload_attempts: env_parse("SEEDMIRROR_UPLOAD_ATTEMPTS"),
            upload_backoff_sec: env_parse("SEEDMIRROR_UPLOAD_BACKOFF_SEC"),
            http_timeout_seconds: env_parse("SEEDMIRROR_HTTP_TIMEOUT_SECONDS"),
            netrc_path: env_string("SEEDMIRROR_NETRC_PATH"),
        };
        self.apply_file(env_cfg);
    }

    pub fn dest_dir(&self) -> PathBuf {
        PathBuf::from(&self.dest_dir)
    }

    /// Path of the credential file; defaults to `~/.netrc`, with a leading
    /// `~/` in an explicit override expanded against $HOME.
    pub fn netrc_path(&self) -> PathBuf {
        if self.netrc_path.is_empty() {
            return dirs_home()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".netrc");
        }
        if let Some(rest) = self.netrc_path.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.netrc_path)
    }

    /// Hostname of the index base URL, used for the credential lookup.
    pub fn index_host(&self) -> Option<String> {
        reqwest::Url::parse(&self.index_base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("config.toml"),
        PathBuf::from("seedmirror.toml"),
    ];
    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("seedmirror").join("config.toml"));
    }
    paths
}

pub fn find_config_file() -> Option<PathBuf> {
    config_search_paths().into_iter().find(|path| path.exists())
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed reading {path:?}"))?;
    toml::from_str::<FileConfig>(&raw).with_context(|| format!("failed parsing {path:?}"))
}

fn dirs_home() -> Option<PathBuf> {
    env::var("HOME").ok().map(PathBuf::from)
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_parse<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn set_opt<T>(dst: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *dst = v;
    }
}

fn set_opt_usize_min(dst: &mut usize, value: Option<usize>, min: usize) {
    if let Some(v) = value {
        *dst = v.max(min);
    }
}

fn set_opt_u64_min(dst: &mut u64, value: Option<u64>, min: u64) {
    if let Some(v) = value {
        *dst = v.max(min);
    }
}

fn set_opt_f64_min(dst: &mut f64, value: Option<f64>, min: f64) {
    if let Some(v) = value {
        *dst = v.max(min);
    }
}
