//! Receiver statistics.
//!
//! One atomic counter per downlink format plus CRC and preamble totals.
//! A single handle is shared by the demodulator, the decoder and the query
//! server; increments use relaxed ordering since only totals are ever read.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};

pub struct Stats {
    start_time: i64,
    start_time_string: String,
    df: [AtomicU64; 32],
    df_total: AtomicU64,
    valid_crc: AtomicU64,
    not_valid_crc: AtomicU64,
    corrected_crc: AtomicU64,
    valid_preambles: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        let now = chrono::Local::now();
        Self {
            start_time: now.timestamp(),
            start_time_string: now.format("%a %b %e %H:%M:%S %Y").to_string(),
            df: std::array::from_fn(|_| AtomicU64::new(0)),
            df_total: AtomicU64::new(0),
            valid_crc: AtomicU64::new(0),
            not_valid_crc: AtomicU64::new(0),
            corrected_crc: AtomicU64::new(0),
            valid_preambles: AtomicU64::new(0),
        }
    }

    pub fn start_time_string(&self) -> &str {
        &self.start_time_string
    }

    /// One increment per parsed message, keyed on the 5-bit DF.
    pub fn count_df(&self, df: u8) {
        self.df[(df & 0x1F) as usize].fetch_add(1, Ordering::Relaxed);
        self.df_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_valid_crc(&self) {
        self.valid_crc.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_not_valid_crc(&self) {
        self.not_valid_crc.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_corrected_crc(&self) {
        self.corrected_crc.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_preambles(&self, n: u64) {
        self.valid_preambles.fetch_add(n, Ordering::Relaxed);
    }

    /// Counter values as a JSON object for the query interface.
    pub fn snapshot(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("spots_version".into(), json!(env!("CARGO_PKG_VERSION")));
        map.insert("start_time".into(), json!(self.start_time));
        map.insert("start_time_string".into(), json!(self.start_time_string));
        map.insert(
            "valid_preambles".into(),
            json!(self.valid_preambles.load(Ordering::Relaxed)),
        );
        map.insert("valid_crc".into(), json!(self.valid_crc.load(Ordering::Relaxed)));
        map.insert(
            "not_valid_crc".into(),
            json!(self.not_valid_crc.load(Ordering::Relaxed)),
        );
        map.insert(
            "corrected_crc".into(),
            json!(self.corrected_crc.load(Ordering::Relaxed)),
        );
        for (df, counter) in self.df.iter().enumerate() {
            map.insert(format!("df_{df}"), json!(counter.load(Ordering::Relaxed)));
        }
        map.insert("df_total".into(), json!(self.df_total.load(Ordering::Relaxed)));
        Value::Object(map)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "preambles: {} valid crc: {} not valid crc: {} corrected: {}",
            self.valid_preambles.load(Ordering::Relaxed),
            self.valid_crc.load(Ordering::Relaxed),
            self.not_valid_crc.load(Ordering::Relaxed),
            self.corrected_crc.load(Ordering::Relaxed),
        )?;
        for df in [0usize, 4, 5, 11, 16, 17, 18, 20, 21] {
            write!(f, " df{}: {}", df, self.df[df].load(Ordering::Relaxed))?;
        }
        write!(f, " df total: {}", self.df_total.load(Ordering::Relaxed))
    }
}
