//! IQ sample source.
//!
//! Interleaved unsigned 8-bit I/Q at 2 MS/s around 1090 MHz, either
//! streamed from an rtl_sdr child process or read once from a capture
//! file. Each frame is mapped to magnitudes, scanned for messages and the
//! result pushed onto the bounded radar queue; a full queue is fatal and
//! raises the shared finished flag.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Sender, TrySendError};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{error, info};

use crate::demodulator::{Demodulator, PREAMBLE_US};
use crate::error::SpotsError;
use crate::magnitude::{MagnitudeLut, compute_magnitude_vector};
use crate::squitter::{MODES_LONG_MSG_BITS, RawMessage};

pub const SAMPLE_RATE: u32 = 2_000_000;
pub const CENTER_FREQ: u32 = 1_090_000_000;
/// Number of driver buffers, and the capacity of the radar queue.
pub const ASYNC_BUF_NUMBER: usize = 16;
/// Raw IQ bytes per frame: 16 x 16 KiB.
pub const DATA_LEN: usize = ASYNC_BUF_NUMBER * 1024 * 16;

/// Bytes carried over between frames so a message straddling the boundary
/// is still seen whole.
const OVERLAP_BYTES: usize = (PREAMBLE_US + MODES_LONG_MSG_BITS - 1) * 4;

pub struct Tuner {
    lut: MagnitudeLut,
    demodulator: Demodulator,
    finished: Arc<AtomicBool>,
}

impl Tuner {
    pub fn new(demodulator: Demodulator, finished: Arc<AtomicBool>) -> Self {
        Self {
            lut: MagnitudeLut::new(),
            demodulator,
            finished,
        }
    }

    /// Deliver a single frame from a capture file, then EOF.
    pub async fn run_file(
        &self,
        path: &str,
        tx: &Sender<Vec<RawMessage>>,
    ) -> Result<(), SpotsError> {
        let capture_err = |e| SpotsError::CaptureFile {
            path: path.to_string(),
            source: e,
        };
        let mut file = File::open(path).await.map_err(capture_err)?;
        info!("reading IQ samples from {path}");

        let mut data = vec![0u8; DATA_LEN];
        let mut total = 0;
        while total < DATA_LEN {
            let n = file.read(&mut data[total..]).await.map_err(capture_err)?;
            if n == 0 {
                break;
            }
            total += n;
        }
        data.truncate(total - total % 2);
        self.deliver(&data, tx);
        Ok(())
    }

    /// Stream frames from an rtl_sdr child process until the finished flag
    /// is raised or the process exits.
    pub async fn run_device(&self, tx: &Sender<Vec<RawMessage>>) -> Result<(), SpotsError> {
        let mut cmd = Command::new("rtl_sdr");
        cmd.arg("-f")
            .arg(CENTER_FREQ.to_string())
            .arg("-s")
            .arg(SAMPLE_RATE.to_string())
            .arg("-g")
            .arg("0") // maximum gain, AGC off
            .arg("-")
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(SpotsError::SdrSpawn)?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SpotsError::SdrSpawn(io::Error::other("no stdout pipe")))?;
        info!("reading from rtl_sdr at {} Hz", CENTER_FREQ);

        // [overlap from previous frame | fresh frame]
        let mut data = vec![127u8; OVERLAP_BYTES + DATA_LEN];
        'frames: while !self.finished.load(Ordering::SeqCst) {
            data.copy_within(DATA_LEN..DATA_LEN + OVERLAP_BYTES, 0);

            let mut total = 0;
            while total < DATA_LEN {
                match stdout.read(&mut data[OVERLAP_BYTES + total..]).await {
                    Ok(0) => break 'frames,
                    Ok(n) => total += n,
                    Err(e) => {
                        error!("rtl_sdr read failed: {e}");
                        break 'frames;
                    }
                }
            }
            self.deliver(&data, tx);
        }

        let _ = child.kill().await;
        Ok(())
    }

    fn deliver(&self, data: &[u8], tx: &Sender<Vec<RawMessage>>) {
        let magnitude = compute_magnitude_vector(data, &self.lut);
        let msgs = self.demodulator.detect(&magnitude);
        match tx.try_send(msgs) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                error!("radar queue overflow, shutting down");
                self.finished.store(true, Ordering::SeqCst);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.finished.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::demodulator::PREAMBLE_SAMPLES;
    use crate::squitter::test_util::raw_from_hex;
    use crate::stats::Stats;
    use crossbeam_channel::bounded;

    /// IQ byte pairs: (0, 0) maps to full-scale magnitude, (127, 127) to
    /// zero.
    fn push_sample(bytes: &mut Vec<u8>, high: bool) {
        if high {
            bytes.extend_from_slice(&[0, 0]);
        } else {
            bytes.extend_from_slice(&[127, 127]);
        }
    }

    fn encode_iq(msg: &[u8; 14]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for i in 0..PREAMBLE_SAMPLES {
            push_sample(&mut bytes, matches!(i, 0 | 2 | 7 | 9));
        }
        for bit in 0..MODES_LONG_MSG_BITS {
            let one = msg[bit / 8] & (0x80 >> (bit % 8)) != 0;
            push_sample(&mut bytes, one);
            push_sample(&mut bytes, !one);
        }
        // quiet tail so the scanner has room past the last window
        for _ in 0..16 {
            push_sample(&mut bytes, false);
        }
        bytes
    }

    #[tokio::test]
    async fn capture_file_to_raw_message() {
        let expected = raw_from_hex("8D4840D6202CC371C32CE0576098", 0.0);
        let path = std::env::temp_dir().join(format!(
            "spots1090-capture-{}.bin",
            std::process::id()
        ));
        std::fs::write(&path, encode_iq(&expected.msg)).unwrap();

        let config = Config::default();
        let demodulator = Demodulator::new(&config, Arc::new(Stats::new()));
        let tuner = Tuner::new(demodulator, Arc::new(AtomicBool::new(false)));
        let (tx, rx) = bounded(ASYNC_BUF_NUMBER);

        tuner
            .run_file(path.to_str().unwrap(), &tx)
            .await
            .unwrap();

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].msg, expected.msg);
        assert_eq!(batch[0].signal_strength, 100.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn queue_overflow_raises_finished() {
        let config = Config::default();
        let demodulator = Demodulator::new(&config, Arc::new(Stats::new()));
        let finished = Arc::new(AtomicBool::new(false));
        let tuner = Tuner::new(demodulator, Arc::clone(&finished));

        let (tx, _rx) = bounded(1);
        tuner.deliver(&[127u8; 1024], &tx);
        assert!(!finished.load(Ordering::SeqCst));
        tuner.deliver(&[127u8; 1024], &tx);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn missing_capture_file_is_fatal() {
        let config = Config::default();
        let demodulator = Demodulator::new(&config, Arc::new(Stats::new()));
        let tuner = Tuner::new(demodulator, Arc::new(AtomicBool::new(false)));
        let (tx, _rx) = bounded(ASYNC_BUF_NUMBER);

        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(tuner.run_file("/nonexistent/capture.bin", &tx));
        assert!(matches!(result, Err(SpotsError::CaptureFile { .. })));
    }
}
