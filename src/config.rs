use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5500,https://gostwear-frontend.vercel.app";
const DEFAULT_PREVIEW_PATTERN: &str = r"\.vercel\.app$";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    /// Origins matching this pattern are allowed in addition to `allowed_origins`.
    pub preview_origin_pattern: Option<Regex>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env_string("HOST", "0.0.0.0");
        let port = env_string("PORT", "5000")
            .parse::<u16>()
            .context("PORT must be a valid u16")?;

        let data_dir = PathBuf::from(env_string("DATA_DIR", "data"));
        let public_dir = PathBuf::from(env_string("PUBLIC_DIR", "public"));
        let allowed_origins = parse_origins(&env_string("ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS));
        let preview_origin_pattern =
            parse_preview_pattern(&env_string("PREVIEW_ORIGIN_PATTERN", DEFAULT_PREVIEW_PATTERN))?;

        Ok(Self {
            host,
            port,
            data_dir,
            public_dir,
            allowed_origins,
            preview_origin_pattern,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.address()
            .parse::<SocketAddr>()
            .with_context(|| format!("HOST/PORT do not form a socket address: {}", self.address()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            data_dir: PathBuf::from("data"),
            public_dir: PathBuf::from("public"),
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            preview_origin_pattern: Regex::new(DEFAULT_PREVIEW_PATTERN).ok(),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect()
}

/// An empty pattern disables preview origins.
fn parse_preview_pattern(raw: &str) -> Result<Option<Regex>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let regex = Regex::new(raw).context("PREVIEW_ORIGIN_PATTERN must be a valid regex")?;
    Ok(Some(regex))
}
