use serde::{Deserialize, Serialize};
use std::fs;

use crate::engine::admission::DEFAULT_MIN_LEAD_SECS;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// PostgreSQL connection URL; unset means the in-memory ledger
    #[serde(default)]
    pub postgres_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdmissionConfig {
    /// Minimum seconds between submission and scheduled time
    pub min_lead_secs: i64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            min_lead_secs: DEFAULT_MIN_LEAD_SECS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SettlementConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9090/settlements".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatcherConfig {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_size: 100,
            concurrency: 8,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
