//! Runtime configuration.
//!
//! Settings live in a JSON file whose keys use the historical spelling with
//! spaces ("check phase", "max blip ttl", ...). Missing keys fall back to
//! the defaults below; a missing file means all defaults.

use std::fs;
use std::io;

use serde::Deserialize;

use crate::error::SpotsError;

pub const DEFAULT_CONFIG_FILE: &str = "spots_config.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Try phase correction on windows that narrowly miss the preamble test.
    #[serde(rename = "check phase")]
    pub check_phase: bool,
    /// Report altitudes in meters and speeds in km/h.
    #[serde(rename = "use metric")]
    pub use_metric: bool,
    #[serde(rename = "apply bit err correction")]
    pub apply_bit_err_correction: bool,
    #[serde(rename = "run as daemon")]
    pub run_as_daemon: bool,
    #[serde(rename = "read from file")]
    pub read_from_file: bool,
    #[serde(rename = "file name")]
    pub file_name: String,
    #[serde(rename = "use text display")]
    pub use_text_display: bool,
    /// Seconds after which an aircraft without fresh messages is dropped.
    #[serde(rename = "max blip ttl")]
    pub max_blip_ttl: u64,
    #[serde(rename = "verbose logging")]
    pub verbose_logging: bool,
    #[serde(rename = "check crc")]
    pub check_crc: bool,
    /// Receiver site, used as the reference for locally unambiguous CPR.
    #[serde(rename = "user latitude")]
    pub user_latitude: f64,
    #[serde(rename = "user longitude")]
    pub user_longitude: f64,
    /// Empty means log to stderr.
    #[serde(rename = "log file")]
    pub log_file: String,
    #[serde(rename = "log max bytes")]
    pub log_max_bytes: u64,
    #[serde(rename = "log backup count")]
    pub log_backup_count: u32,
    #[serde(rename = "spots server address")]
    pub server_address: String,
    #[serde(rename = "spots server port")]
    pub server_port: u16,
    #[serde(rename = "use flight db")]
    pub use_flight_db: bool,
    #[serde(rename = "flight db name")]
    pub flight_db_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_phase: true,
            use_metric: false,
            apply_bit_err_correction: true,
            run_as_daemon: false,
            read_from_file: false,
            file_name: String::new(),
            use_text_display: false,
            max_blip_ttl: 60,
            verbose_logging: false,
            check_crc: true,
            user_latitude: 0.0,
            user_longitude: 0.0,
            log_file: String::new(),
            log_max_bytes: 1_000_000,
            log_backup_count: 5,
            server_address: "127.0.0.1".to_string(),
            server_port: 5678,
            use_flight_db: false,
            flight_db_name: String::new(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, SpotsError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(SpotsError::ConfigRead {
                    path: path.to_string(),
                    source: e,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|e| SpotsError::ConfigParse {
            path: path.to_string(),
            source: e,
        })
    }

    pub fn from_args() -> Result<Self, SpotsError> {
        let args: Vec<String> = std::env::args().collect();
        let mut config_path = DEFAULT_CONFIG_FILE.to_string();
        let mut ifile: Option<String> = None;
        let mut interactive = false;
        let mut verbose = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" => {
                    i += 1;
                    if let Some(path) = args.get(i) {
                        config_path = path.clone();
                    }
                }
                "--ifile" => {
                    i += 1;
                    ifile = args.get(i).cloned();
                }
                "--interactive" => interactive = true,
                "--verbose" => verbose = true,
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("unknown option: {other}");
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        let mut config = Self::load(&config_path)?;
        if let Some(name) = ifile {
            config.read_from_file = true;
            config.file_name = name;
        }
        if interactive {
            config.use_text_display = true;
        }
        if verbose {
            config.verbose_logging = true;
        }
        Ok(config)
    }
}

fn print_help() {
    println!(
        r#"spots1090 - 1090 MHz Mode S / ADS-B receiver

Usage: spots1090 [OPTIONS]

Options:
  --config <file>   Configuration file (default: {DEFAULT_CONFIG_FILE})
  --ifile <file>    Read IQ samples from a capture file instead of the SDR
  --interactive     Show the aircraft table on the terminal
  --verbose         Log every accepted message
  --help            Show this help
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.check_phase);
        assert!(config.check_crc);
        assert!(config.apply_bit_err_correction);
        assert!(!config.use_metric);
        assert_eq!(config.max_blip_ttl, 60);
    }

    #[test]
    fn parses_spaced_keys() {
        let config: Config = serde_json::from_str(
            r#"{
                "check phase": false,
                "use metric": true,
                "max blip ttl": 120,
                "user latitude": 52.3,
                "user longitude": 4.7,
                "spots server port": 9999,
                "flight db name": "flights.json"
            }"#,
        )
        .unwrap();
        assert!(!config.check_phase);
        assert!(config.use_metric);
        assert_eq!(config.max_blip_ttl, 120);
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.flight_db_name, "flights.json");
        // untouched keys keep their defaults
        assert!(config.check_crc);
        assert_eq!(config.server_address, "127.0.0.1");
    }
}
