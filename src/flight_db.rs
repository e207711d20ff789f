//! Persistent call-sign counters.
//!
//! A small JSON file tracking how often each call sign has been seen since
//! the database was created. The file is rewritten atomically (temp file
//! plus rename) so a crash mid-dump never leaves a torn database; a
//! malformed file on startup resets to a fresh one.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::error::SpotsError;

#[derive(Debug, Deserialize)]
struct DbFile {
    version: String,
    start_date: String,
    total_cnt: u64,
    /// Stored as `[[call_sign, count], ...]`, sorted by count descending.
    flights: Vec<(String, u64)>,
}

pub struct FlightDb {
    path: PathBuf,
    version: String,
    start_date: String,
    total_cnt: u64,
    flights: HashMap<String, u64>,
}

impl FlightDb {
    /// Load an existing database or create a fresh one. The file is
    /// written back immediately so an unwritable location fails at
    /// startup, not ten minutes in.
    pub fn open(path: &str, start_date: &str) -> Result<Self, SpotsError> {
        let path_buf = PathBuf::from(path);
        let mut db = Self {
            path: path_buf.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_date: start_date.to_string(),
            total_cnt: 0,
            flights: HashMap::new(),
        };

        match fs::read_to_string(&path_buf) {
            Ok(raw) => match serde_json::from_str::<DbFile>(&raw) {
                Ok(file) => {
                    db.version = file.version;
                    db.start_date = file.start_date;
                    db.total_cnt = file.total_cnt;
                    db.flights = file.flights.into_iter().collect();
                }
                Err(e) => {
                    warn!("flight database {path} is malformed ({e}), starting fresh");
                }
            },
            Err(_) => {}
        }

        db.dump()?;
        Ok(db)
    }

    pub fn add(&mut self, call_sign: &str) {
        *self.flights.entry(call_sign.to_string()).or_insert(0) += 1;
        self.total_cnt += 1;
    }

    #[allow(dead_code)]
    pub fn total(&self) -> u64 {
        self.total_cnt
    }

    /// The database as served to clients and written to disk.
    pub fn to_json(&self) -> Value {
        let mut flights: Vec<(&String, &u64)> = self.flights.iter().collect();
        flights.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        json!({
            "version": self.version,
            "start_date": self.start_date,
            "total_cnt": self.total_cnt,
            "flights": flights,
        })
    }

    pub fn dump(&self) -> Result<(), SpotsError> {
        let to_db_err = |e| SpotsError::FlightDb {
            path: self.path.display().to_string(),
            source: e,
        };
        let tmp = self.path.with_extension("tmp");
        let payload = serde_json::to_string_pretty(&self.to_json()).expect("db is valid json");
        fs::write(&tmp, payload).map_err(to_db_err)?;
        fs::rename(&tmp, &self.path).map_err(to_db_err)
    }
}
