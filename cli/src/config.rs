use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api";
const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct Config {
    pub db_path: PathBuf,
    pub api_base_url: String,
    pub page_size: usize,
    pub request_timeout: Duration,
}

impl Config {
    pub fn load(api_url_override: Option<String>) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "recipebox").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("recipebox.db");

        let api_base_url = api_url_override
            .or_else(|| std::env::var("RECIPEBOX_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let page_size = env_number("RECIPEBOX_PAGE_SIZE")?.unwrap_or(DEFAULT_PAGE_SIZE);
        let timeout_secs = env_number("RECIPEBOX_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Config {
            db_path,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            page_size,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => parse_number(name, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .ok()
        .with_context(|| format!("Invalid value for {name}: '{raw}' (expected a positive number)"))
}
