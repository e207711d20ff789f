//! Fatal error kinds.
//!
//! Everything recoverable (bad CRC, CPR ambiguity, malformed query command)
//! stays local to the handling of a single message and never surfaces
//! through this type. What is left are initialisation failures that abort
//! the process with a non-zero exit code.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpotsError {
    #[error("configuration {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("configuration {path} is not valid JSON: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("capture file {path}: {source}")]
    CaptureFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to start rtl_sdr: {0}")]
    SdrSpawn(#[source] io::Error),

    #[error("flight database {path}: {source}")]
    FlightDb {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("query server {addr}: {source}")]
    ServerBind {
        addr: String,
        #[source]
        source: io::Error,
    },
}
