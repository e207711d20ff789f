//! Preamble detection and bit slicing.
//!
//! Scans a magnitude vector for the Mode S preamble (four pulses at sample
//! offsets 0, 2, 7 and 9 of a 16-sample window at 2 MS/s), then slices the
//! following Manchester-coded payload into 112 bits. Windows that narrowly
//! miss the preamble test can optionally get one retry after a phase
//! correction of the payload samples.

use std::sync::Arc;

use crate::config::Config;
use crate::magnitude::SIG_MAX;
use crate::squitter::{MODES_LONG_MSG_BITS, MODES_LONG_MSG_BYTES, MODES_SHORT_MSG_BITS, RawMessage};
use crate::stats::Stats;

pub const PREAMBLE_US: usize = 8;
/// Samples in the preamble window at 2 MS/s.
pub const PREAMBLE_SAMPLES: usize = 2 * PREAMBLE_US;
/// Signal strength is measured over the pulse part of the window.
const PREAMBLE_STRENGTH_SAMPLES: usize = 14;

pub const SHORT_FRAME_SAMPLES: usize = PREAMBLE_SAMPLES + 2 * MODES_SHORT_MSG_BITS;
pub const LONG_FRAME_SAMPLES: usize = PREAMBLE_SAMPLES + 2 * MODES_LONG_MSG_BITS;

pub struct Demodulator {
    check_phase: bool,
    stats: Arc<Stats>,
}

impl Demodulator {
    pub fn new(config: &Config, stats: Arc<Stats>) -> Self {
        Self {
            check_phase: config.check_phase,
            stats,
        }
    }

    /// Scan a magnitude vector and return every detected message. The scan
    /// advances a whole frame past each accepted preamble and one sample
    /// otherwise.
    pub fn detect(&self, m: &[u16]) -> Vec<RawMessage> {
        let mut found = Vec::new();
        if m.len() < LONG_FRAME_SAMPLES + 1 {
            return found;
        }

        let max_start = m.len() - LONG_FRAME_SAMPLES;
        let mut i = 0;
        while i < max_start {
            if preamble_at(m, i) {
                let raw = slice_message(&m[i..i + LONG_FRAME_SAMPLES]);
                i += if raw.msg[0] & 0x80 != 0 {
                    LONG_FRAME_SAMPLES
                } else {
                    SHORT_FRAME_SAMPLES
                };
                if !raw.is_empty() {
                    found.push(raw);
                }
                continue;
            }

            if self.check_phase && i > 0 && out_of_phase(&m[i - 1..i + 11]) {
                let mut window = m[i..i + LONG_FRAME_SAMPLES].to_vec();
                apply_phase_correction(&mut window);
                if preamble_at(&window, 0) {
                    let raw = slice_message(&window);
                    if !raw.is_empty() {
                        found.push(raw);
                    }
                }
            }
            i += 1;
        }

        self.stats.count_preambles(found.len() as u64);
        found
    }
}

/// Pulse pattern test for a window starting at `i`; the caller guarantees
/// at least 15 samples past `i`.
fn preamble_at(m: &[u16], i: usize) -> bool {
    if !(m[i] > m[i + 1]
        && m[i + 1] < m[i + 2]
        && m[i + 2] > m[i + 3]
        && m[i + 3] < m[i]
        && m[i + 4] < m[i]
        && m[i + 5] < m[i]
        && m[i + 6] < m[i]
        && m[i + 7] > m[i + 8]
        && m[i + 8] < m[i + 9]
        && m[i + 9] > m[i + 6])
    {
        return false;
    }

    // the spaces inside and right after the preamble must stay below the
    // average pulse level
    let high = ((m[i] as u32 + m[i + 2] as u32 + m[i + 7] as u32 + m[i + 9] as u32) / 6) as u16;
    m[i + 4] < high
        && m[i + 5] < high
        && m[i + 11] < high
        && m[i + 12] < high
        && m[i + 13] < high
        && m[i + 14] < high
}

/// Ratio test on a 12-sample window anchored one sample before the
/// candidate preamble: energy bleeding into a quiet slot next to a pulse
/// means the ADC is sampling across bit boundaries.
fn out_of_phase(w: &[u16]) -> bool {
    w[4] > w[3] / 3 || w[11] > w[10] / 3 || w[7] > w[8] / 3 || w[0] > w[1] / 3
}

/// Redistribute the energy that straddled a sample boundary: after a sliced
/// one (high-low) the next sample is scaled up by 5/4, after a zero down by
/// 4/5.
fn apply_phase_correction(frame: &mut [u16]) {
    let mut i = PREAMBLE_SAMPLES;
    while i + 2 < frame.len() {
        if frame[i] > frame[i + 1] {
            frame[i + 2] = ((frame[i + 2] as u32 * 5) / 4).min(SIG_MAX as u32) as u16;
        } else {
            frame[i + 2] = (frame[i + 2] as u32 * 4 / 5) as u16;
        }
        i += 2;
    }
}

/// Manchester slicing: a high-low sample pair is a one, low-high a zero.
fn slice_message(frame: &[u16]) -> RawMessage {
    let mut msg = [0u8; MODES_LONG_MSG_BYTES];
    for bit in 0..MODES_LONG_MSG_BITS {
        let idx = PREAMBLE_SAMPLES + bit * 2;
        if frame[idx] > frame[idx + 1] {
            msg[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
    RawMessage {
        signal_strength: signal_strength(&frame[..PREAMBLE_STRENGTH_SAMPLES]),
        msg,
    }
}

/// Peak-to-peak amplitude of the preamble as a percentage of the dynamic
/// range, one decimal.
fn signal_strength(preamble: &[u16]) -> f64 {
    let max = preamble.iter().copied().max().unwrap_or(0) as f64;
    let min = preamble.iter().copied().min().unwrap_or(0) as f64;
    ((max - min) / SIG_MAX as f64 * 1000.0).round() / 10.0
}
