use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Output format of the process log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub struct Config {
    pub listen_addr: SocketAddr,
    pub data_file: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("STOCK_CHECKER_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid STOCK_CHECKER_LISTEN_ADDR")?;
        let data_file = std::env::var("STOCK_CHECKER_DATA_FILE")
            .unwrap_or_else(|_| "./data/stock-checker.json".into())
            .into();
        let log_format = match std::env::var("STOCK_CHECKER_LOG_FORMAT")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Ok(Self {
            listen_addr,
            data_file,
            log_format,
        })
    }
}
