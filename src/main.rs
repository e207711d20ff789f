//! spots1090: a 1090 MHz Mode S / ADS-B receiver.
//!
//! IQ samples -> magnitude -> preamble detection -> CRC -> squitter
//! decoding -> CPR position resolution -> per-aircraft registry, exposed
//! to consumers over a small TCP query protocol.

mod aircraft;
mod config;
mod cpr;
mod crc;
mod demodulator;
mod display;
mod error;
mod flight_db;
mod magnitude;
mod server;
mod squitter;
mod stats;
mod tuner;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use parking_lot::{Mutex, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::aircraft::AircraftStore;
use crate::config::Config;
use crate::demodulator::Demodulator;
use crate::display::TextDisplay;
use crate::flight_db::FlightDb;
use crate::server::QueryServer;
use crate::squitter::{Decoder, RawMessage};
use crate::stats::Stats;
use crate::tuner::Tuner;

/// Flight database rewrite period, in sweeper ticks (one per second).
const FLIGHT_DB_DUMP_TICKS: u64 = 10 * 60;
/// Statistics log period, in sweeper ticks.
const STATS_LOG_TICKS: u64 = 3600;

fn main() {
    if let Err(e) = run() {
        eprintln!("spots1090: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::from_args()?);
    init_logging(&config)?;
    info!("spots1090 {} starting", env!("CARGO_PKG_VERSION"));

    let stats = Arc::new(Stats::new());
    let store = Arc::new(RwLock::new(AircraftStore::new(
        config.max_blip_ttl,
        (config.user_latitude, config.user_longitude),
    )));
    let flight_db = if config.use_flight_db && !config.flight_db_name.is_empty() {
        Some(Arc::new(Mutex::new(FlightDb::open(
            &config.flight_db_name,
            stats.start_time_string(),
        )?)))
    } else {
        None
    };

    let finished = Arc::new(AtomicBool::new(false));
    let (msg_tx, msg_rx) = bounded::<Vec<RawMessage>>(tuner::ASYNC_BUF_NUMBER);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let listener = QueryServer::bind(&config.server_address, config.server_port).await?;
        let server = Arc::new(QueryServer::new(
            Arc::clone(&store),
            Arc::clone(&stats),
            flight_db.clone(),
        ));
        let server_handle = tokio::spawn(server.serve(listener));

        let radar_handle = {
            let store = Arc::clone(&store);
            let config = Arc::clone(&config);
            let stats = Arc::clone(&stats);
            let flight_db = flight_db.clone();
            let finished = Arc::clone(&finished);
            tokio::task::spawn_blocking(move || {
                radar_loop(msg_rx, store, config, stats, flight_db, finished)
            })
        };

        let sweeper_handle = {
            let store = Arc::clone(&store);
            let config = Arc::clone(&config);
            let stats = Arc::clone(&stats);
            let flight_db = flight_db.clone();
            let finished = Arc::clone(&finished);
            tokio::spawn(sweeper(store, config, stats, flight_db, finished))
        };

        let demodulator = Demodulator::new(&config, Arc::clone(&stats));
        let tun = Tuner::new(demodulator, Arc::clone(&finished));

        if config.read_from_file {
            tun.run_file(&config.file_name, &msg_tx).await?;
            if config.run_as_daemon || config.use_text_display {
                tokio::signal::ctrl_c().await.ok();
            } else {
                // let the radar drain the queue before going down
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        } else {
            tokio::select! {
                result = tun.run_device(&msg_tx) => result?,
                _ = tokio::signal::ctrl_c() => {}
            }
        }

        finished.store(true, Ordering::SeqCst);
        drop(msg_tx);
        let _ = radar_handle.await;
        sweeper_handle.abort();
        server_handle.abort();

        if let Some(db) = &flight_db {
            if let Err(e) = db.lock().dump() {
                error!("final flight database dump failed: {e}");
            }
        }
        info!("{stats}");
        info!("spots1090 stopping");
        Ok(())
    })
}

/// Radar thread: drain the raw-message queue, parse, apply the acceptance
/// policy and merge into the registry.
fn radar_loop(
    rx: Receiver<Vec<RawMessage>>,
    store: Arc<RwLock<AircraftStore>>,
    config: Arc<Config>,
    stats: Arc<Stats>,
    flight_db: Option<Arc<Mutex<FlightDb>>>,
    finished: Arc<AtomicBool>,
) {
    let decoder = Decoder::new(Arc::clone(&config), stats);
    info!("radar running");

    while !finished.load(Ordering::SeqCst) {
        let batch = match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(batch) => batch,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        for raw in batch {
            let mut sq = decoder.parse(&raw);
            let mut store = store.write();
            if !store.accept(&mut sq) {
                continue;
            }
            decoder.decode(&mut sq);
            if config.verbose_logging {
                info!("{sq}");
            }
            if let (Some(db), Some(call_sign)) = (&flight_db, &sq.call_sign) {
                db.lock().add(call_sign);
            }
            store.ingest(sq);
        }
    }

    info!("radar stopping");
}

/// Sweeper task: once per second age out stale aircraft and feed the text
/// display; every ten minutes persist the flight database; once an hour
/// log the counters.
async fn sweeper(
    store: Arc<RwLock<AircraftStore>>,
    config: Arc<Config>,
    stats: Arc<Stats>,
    flight_db: Option<Arc<Mutex<FlightDb>>>,
    finished: Arc<AtomicBool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut display = config.use_text_display.then(TextDisplay::new);
    let mut tick: u64 = 0;

    loop {
        interval.tick().await;
        if finished.load(Ordering::SeqCst) {
            break;
        }
        tick += 1;

        let blips = {
            let mut store = store.write();
            store.remove_stale();
            store.snapshot()
        };
        if let Some(display) = display.as_mut() {
            display.render(&blips);
        }

        if tick % FLIGHT_DB_DUMP_TICKS == 0 {
            if let Some(db) = &flight_db {
                if let Err(e) = db.lock().dump() {
                    error!("flight database dump failed: {e}");
                }
            }
        }
        if tick % STATS_LOG_TICKS == 0 {
            info!("{stats}");
        }
    }
}

fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if config.verbose_logging { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if config.log_file.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        rotate_log(&config.log_file, config.log_max_bytes, config.log_backup_count);
        let file = fs::File::create(&config.log_file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .init();
    }
    Ok(())
}

/// Size-based rotation at startup: shift old logs to `.1`, `.2`, ... up to
/// the configured backup count.
fn rotate_log(path: &str, max_bytes: u64, backups: u32) {
    let Ok(meta) = fs::metadata(path) else { return };
    if meta.len() < max_bytes || backups == 0 {
        return;
    }
    for i in (1..backups).rev() {
        let _ = fs::rename(format!("{path}.{i}"), format!("{path}.{}", i + 1));
    }
    let _ = fs::rename(path, format!("{path}.1"));
}
