use std::time::Duration;

use crate::sampling::RetryPolicy;

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telemetry sink (ThingsBoard-style MQTT broker)
    pub mqtt_host: String,
    pub mqtt_port: u16,
    /// Device access token, sent as the MQTT username
    pub access_token: String,
    /// SQLite URL for the fallback store
    pub database_url: String,
    /// Multiplexer addresses to enumerate, in registry order
    pub mux_addresses: Vec<u8>,
    /// Delay between polling cycles
    pub poll_interval: Duration,
    /// Readings averaged per channel per cycle
    pub batch_size: usize,
    /// Max accepted strain difference between consecutive readings
    pub diff_threshold: f64,
    /// Rejected/failed attempts before a read gives up
    pub max_retries: u32,
    /// Prompt the operator and capture a zero reference before polling
    pub capture_baseline: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mqtt_host: env_or("STRAIN_MQTT_HOST", "localhost"),
            mqtt_port: env_parse("STRAIN_MQTT_PORT", 1884),
            access_token: env_or("STRAIN_ACCESS_TOKEN", ""),
            database_url: env_or("DATABASE_URL", "sqlite://strainstation.db"),
            mux_addresses: parse_mux_addresses(&env_or("STRAIN_MUX_ADDRESSES", "0x70")),
            poll_interval: Duration::from_secs(env_parse("STRAIN_INTERVAL_SECS", 5)),
            batch_size: env_parse("STRAIN_NUM_READINGS", 100),
            diff_threshold: env_parse("STRAIN_DIFF_THRESHOLD", 500.0),
            max_retries: env_parse("STRAIN_MAX_RETRIES", 5),
            capture_baseline: env_parse("STRAIN_CAPTURE_BASELINE", false),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            threshold: self.diff_threshold,
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated address list like `0x70,0x71`.
fn parse_mux_addresses(raw: &str) -> Vec<u8> {
    raw.split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let parsed = match part.strip_prefix("0x").or_else(|| part.strip_prefix("0X")) {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => part.parse(),
            };
            match parsed {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!("ignoring malformed multiplexer address {part:?}");
                    None
                }
            }
        })
        .collect()
}
