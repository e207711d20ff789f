//! Mode S squitter parsing and field decoding.
//!
//! A [`Squitter`] is one flat record with optional fields; the same type
//! carries a freshly decoded message and the merged per-aircraft state in
//! the registry. Parsing (DF + CRC) happens for every raw message pulled
//! off the queue; field decoding only for messages the registry accepts.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::cpr::RawCpr;
use crate::crc;
use crate::stats::Stats;

pub const MODES_SHORT_MSG_BITS: usize = 56;
pub const MODES_LONG_MSG_BITS: usize = 112;
pub const MODES_LONG_MSG_BYTES: usize = MODES_LONG_MSG_BITS / 8;

const METER_PER_FOOT: f64 = 0.3048;
const KPH_PER_KNOT: f64 = 1.852;

/// Callsign alphabet indexed by 6-bit groups; `#` and `_` are padding and
/// stripped from the output.
const CALLSIGN_CHARSET: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ#####_###############0123456789######";

/// Output of the demodulator: preamble signal strength (percent of the
/// 16-bit dynamic range) and 112 sliced bits. Short messages occupy the
/// first 7 bytes, the rest is trailing noise.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub signal_strength: f64,
    pub msg: [u8; MODES_LONG_MSG_BYTES],
}

impl RawMessage {
    /// True when every significant byte is zero; such windows are noise and
    /// never enter the queue.
    pub fn is_empty(&self) -> bool {
        let len = if self.msg[0] & 0x80 != 0 {
            MODES_LONG_MSG_BYTES
        } else {
            MODES_SHORT_MSG_BITS / 8
        };
        self.msg[..len].iter().all(|&b| b == 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Squitter {
    pub msg: [u8; MODES_LONG_MSG_BYTES],
    pub msg_bits: usize,
    pub downlink_format: u8,
    pub capability: u8,
    pub type_code: u8,
    pub emitter_category: u8,
    pub flight_status: u8,
    pub icao24: u32,
    /// 24-bit CRC residue; zero for an intact message, the transmitter
    /// address for DFs that overlay it on the parity field.
    pub crc_sum: u32,
    pub crc_ok: bool,
    pub corrected_bit: Option<usize>,
    pub signal_strength: f64,
    pub altitude: Option<i32>,
    pub call_sign: Option<String>,
    pub squawk: Option<String>,
    pub velocity: Option<u32>,
    pub heading: Option<u32>,
    pub vertical_rate: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub on_ground: bool,
    /// Most recent raw position frames; the registry merges these so the
    /// arrival-order flag below stays meaningful across messages.
    pub even_cpr: Option<RawCpr>,
    pub odd_cpr: Option<RawCpr>,
    /// True when the odd frame arrived after the even one; a pair
    /// completed by the odd frame decodes on the even grid.
    pub even_then_odd: bool,
}

impl Squitter {
    /// Merge a newer message into this record. Newer non-empty fields win;
    /// an empty field never erases a previously known value.
    pub fn update(&mut self, newer: &Squitter) {
        self.msg = newer.msg;
        self.msg_bits = newer.msg_bits;
        self.downlink_format = newer.downlink_format;
        self.capability = newer.capability;
        self.type_code = newer.type_code;
        self.emitter_category = newer.emitter_category;
        self.icao24 = newer.icao24;
        self.crc_sum = newer.crc_sum;
        self.crc_ok = newer.crc_ok;
        self.signal_strength = newer.signal_strength;
        if newer.flight_status != 0 {
            self.flight_status = newer.flight_status;
        }
        if newer.altitude.is_some() {
            self.altitude = newer.altitude;
        }
        if newer.call_sign.is_some() {
            self.call_sign = newer.call_sign.clone();
        }
        if newer.squawk.is_some() {
            self.squawk = newer.squawk.clone();
        }
        if newer.velocity.is_some() {
            self.velocity = newer.velocity;
        }
        if newer.heading.is_some() {
            self.heading = newer.heading;
        }
        if newer.vertical_rate.is_some() {
            self.vertical_rate = newer.vertical_rate;
        }
        if newer.latitude.is_some() {
            self.latitude = newer.latitude;
        }
        if newer.longitude.is_some() {
            self.longitude = newer.longitude;
        }
        // even/odd CPR frames and the ordering flag are merged by the
        // registry, which knows the arrival order
    }
}

impl fmt::Display for Squitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*")?;
        for b in &self.msg[..self.msg_bits / 8] {
            write!(f, "{b:02x}")?;
        }
        write!(
            f,
            "; CRC: {:06x} ({})",
            self.crc_sum,
            if self.crc_ok { "ok" } else { "not ok" }
        )?;
        write!(f, " ICAO: {:06x} DF{}", self.icao24, self.downlink_format)?;
        if matches!(self.downlink_format, 17 | 18) {
            write!(f, " TC{}", self.type_code)?;
        }
        if let Some(bit) = self.corrected_bit {
            write!(f, " (bit {bit} fixed)")?;
        }
        if let Some(alt) = self.altitude {
            write!(f, " alt: {alt}")?;
        }
        if let Some(cs) = &self.call_sign {
            write!(f, " {cs}")?;
        }
        if let Some(sq) = &self.squawk {
            write!(f, " squawk: {sq}")?;
        }
        if let Some(v) = self.velocity {
            write!(f, " vel: {v}")?;
        }
        if let Some(h) = self.heading {
            write!(f, " head: {h}")?;
        }
        if let Some(vr) = self.vertical_rate {
            write!(f, " vrate: {vr}")?;
        }
        if let Some(lat) = self.latitude {
            write!(f, " lat: {lat:.3}")?;
        }
        if let Some(lon) = self.longitude {
            write!(f, " long: {lon:.3}")?;
        }
        if self.flight_status != 0 {
            write!(f, " fs: {}", self.flight_status)?;
        }
        write!(f, " sig: {:.1}%", self.signal_strength)
    }
}

/// Decoding context: configuration plus the shared statistics handle.
pub struct Decoder {
    config: Arc<Config>,
    stats: Arc<Stats>,
}

impl Decoder {
    pub fn new(config: Arc<Config>, stats: Arc<Stats>) -> Self {
        Self { config, stats }
    }

    /// DF extraction, CRC validation and optional single-bit recovery.
    /// Statistics are counted here, once per message.
    pub fn parse(&self, raw: &RawMessage) -> Squitter {
        let mut sq = Squitter {
            signal_strength: raw.signal_strength,
            ..Squitter::default()
        };

        let df = raw.msg[0] >> 3;
        sq.downlink_format = df;
        sq.msg_bits = if df & 0x10 != 0 {
            MODES_LONG_MSG_BITS
        } else {
            MODES_SHORT_MSG_BITS
        };
        let len = sq.msg_bits / 8;
        sq.msg[..len].copy_from_slice(&raw.msg[..len]);

        if self.config.check_crc {
            sq.crc_sum = crc::checksum(&sq.msg[..len], sq.msg_bits);
            sq.crc_ok = sq.crc_sum == 0;
            if sq.crc_ok {
                self.stats.count_valid_crc();
            } else {
                self.stats.count_not_valid_crc();
            }
            if !sq.crc_ok && self.config.apply_bit_err_correction {
                if let Some(bit) = crc::fix_single_bit(&mut sq.msg[..len], sq.msg_bits) {
                    sq.corrected_bit = Some(bit);
                    sq.crc_sum = 0;
                    sq.crc_ok = true;
                    self.stats.count_valid_crc();
                    self.stats.count_corrected_crc();
                }
            }
        } else {
            sq.crc_ok = true;
        }

        sq.icao24 =
            ((sq.msg[1] as u32) << 16) | ((sq.msg[2] as u32) << 8) | sq.msg[3] as u32;
        self.stats.count_df(df);
        sq
    }

    /// Per-DF field extraction for an accepted message.
    pub fn decode(&self, sq: &mut Squitter) {
        sq.capability = sq.msg[0] & 0x07;
        sq.type_code = sq.msg[4] >> 3;
        sq.emitter_category = sq.msg[4] & 0x07;

        match sq.downlink_format {
            0 | 16 => self.decode_ac13_altitude(sq),
            4 => {
                self.decode_ac13_altitude(sq);
                decode_flight_status(sq);
            }
            5 => {
                decode_identity(sq);
                decode_flight_status(sq);
            }
            11 => {} // all-call reply carries nothing beyond the address
            17 => self.decode_adsb(sq),
            18 => {
                if matches!(sq.capability, 0 | 1 | 6) {
                    self.decode_adsb(sq);
                }
            }
            20 => {
                decode_comm_b_callsign(sq);
                self.decode_ac13_altitude(sq);
                decode_flight_status(sq);
            }
            21 => {
                decode_comm_b_callsign(sq);
                decode_identity(sq);
                decode_flight_status(sq);
            }
            df => debug!("no field decoder for DF{df}"),
        }
    }

    fn decode_ac13_altitude(&self, sq: &mut Squitter) {
        let ac13 = (((sq.msg[2] as u16) << 8) | sq.msg[3] as u16) & 0x1FFF;
        if ac13 != 0 {
            sq.altitude = Some(self.scale_altitude(parse_ac13(ac13)));
        }
    }

    fn scale_altitude(&self, feet: i32) -> i32 {
        if self.config.use_metric {
            (feet as f64 * METER_PER_FOOT).round() as i32
        } else {
            feet
        }
    }

    fn scale_speed(&self, knots: f64) -> u32 {
        if self.config.use_metric {
            (knots * KPH_PER_KNOT).round() as u32
        } else {
            knots.round() as u32
        }
    }

    fn decode_adsb(&self, sq: &mut Squitter) {
        let tc = sq.type_code;
        let sub = if tc == 29 {
            (sq.msg[4] & 0x06) >> 1
        } else {
            sq.msg[4] & 0x07
        };

        match tc {
            1..=4 => sq.call_sign = decode_callsign(&sq.msg),
            5..=8 => {
                store_cpr_frame(sq);
                let movement =
                    ((((sq.msg[4] as u16) << 4) | (sq.msg[5] as u16 >> 4)) & 0x007F) as u8;
                if movement > 0 && movement < 125 {
                    sq.velocity = Some(self.scale_speed(parse_movement(movement) as f64));
                }
                if sq.msg[5] & 0x08 != 0 {
                    let track =
                        ((((sq.msg[5] as u32) << 4) | (sq.msg[6] as u32 >> 4)) & 0x007F) * 45
                            >> 4;
                    sq.heading = Some(track);
                }
                sq.on_ground = true;
            }
            9..=18 | 20..=22 => {
                store_cpr_frame(sq);
                let ac12 = (((sq.msg[5] as u16) << 4) | (sq.msg[6] as u16 >> 4)) & 0x0FFF;
                if ac12 != 0 {
                    sq.altitude = Some(self.scale_altitude(parse_ac12(ac12)));
                }
                sq.on_ground = false;
            }
            19 => self.decode_velocity(sq, sub),
            23 if sub == 7 => {
                let id13 = ((((sq.msg[5] as u16) << 8) | sq.msg[6] as u16) & 0xFFF1) >> 3;
                if id13 != 0 {
                    sq.squawk = Some(format!("{:04X}", parse_id13(id13)));
                }
            }
            28 if sub == 1 => {
                let id13 = (((sq.msg[5] as u16) << 8) | sq.msg[6] as u16) & 0x1FFF;
                if id13 != 0 {
                    sq.squawk = Some(format!("{:04X}", parse_id13(id13)));
                }
            }
            _ => {}
        }
    }

    fn decode_velocity(&self, sq: &mut Squitter, sub: u8) {
        if (1..=4).contains(&sub) {
            let vr_field = (((sq.msg[8] & 0x07) as i32) << 6) | (sq.msg[9] as i32 >> 2);
            if vr_field != 0 {
                let mut vr = (vr_field - 1) * 64;
                if sq.msg[8] & 0x08 != 0 {
                    vr = -vr;
                }
                sq.vertical_rate = Some(if self.config.use_metric {
                    (vr as f64 * METER_PER_FOOT).round() as i32
                } else {
                    vr
                });
            }
        }

        if sub == 1 || sub == 2 {
            let ew_raw = (((sq.msg[5] & 0x03) as i32) << 8) | sq.msg[6] as i32;
            let ns_raw = (((sq.msg[7] & 0x7F) as i32) << 3) | (sq.msg[8] as i32 >> 5);
            if ew_raw != 0 && ns_raw != 0 {
                let mut ew = ew_raw - 1;
                let mut ns = ns_raw - 1;
                if sub == 2 {
                    // supersonic: 4 knot units
                    ew <<= 2;
                    ns <<= 2;
                }
                if sq.msg[5] & 0x04 != 0 {
                    ew = -ew;
                }
                if sq.msg[7] & 0x80 != 0 {
                    ns = -ns;
                }
                let speed = ((ns * ns + ew * ew) as f64).sqrt();
                sq.velocity = Some(self.scale_speed(speed));
                if speed != 0.0 {
                    let mut heading = (ew as f64).atan2(ns as f64).to_degrees();
                    if heading < 0.0 {
                        heading += 360.0;
                    }
                    sq.heading = Some(heading.round() as u32);
                }
            }
        } else if sub == 3 || sub == 4 {
            let mut airspeed = (((sq.msg[7] & 0x7F) as u32) << 3) | (sq.msg[8] as u32 >> 5);
            if airspeed != 0 {
                airspeed -= 1;
                if sub == 4 {
                    airspeed <<= 2;
                }
                sq.velocity = Some(airspeed);
            }
            if sq.msg[5] & 0x04 != 0 {
                sq.heading =
                    Some(((((sq.msg[5] & 0x03) as u32) << 8) | sq.msg[6] as u32) * 45 >> 7);
            }
        }
    }
}

fn decode_flight_status(sq: &mut Squitter) {
    sq.flight_status = sq.msg[0] & 0x07;
}

fn decode_identity(sq: &mut Squitter) {
    let id13 = (((sq.msg[2] as u16) << 8) | sq.msg[3] as u16) & 0x1FFF;
    if id13 != 0 {
        sq.squawk = Some(format!("{:04X}", parse_id13(id13)));
    }
}

/// DF20/21 carry a callsign when the message field starts with 0x20.
fn decode_comm_b_callsign(sq: &mut Squitter) {
    if sq.msg[4] == 0x20 {
        sq.call_sign = decode_callsign(&sq.msg);
    }
}

/// Eight 6-bit groups from bits 40..88, padding stripped.
fn decode_callsign(msg: &[u8]) -> Option<String> {
    let indices = [
        msg[5] >> 2,
        ((msg[5] & 0x03) << 4) | (msg[6] >> 4),
        ((msg[6] & 0x0F) << 2) | (msg[7] >> 6),
        msg[7] & 0x3F,
        msg[8] >> 2,
        ((msg[8] & 0x03) << 4) | (msg[9] >> 4),
        ((msg[9] & 0x0F) << 2) | (msg[10] >> 6),
        msg[10] & 0x3F,
    ];
    let sign: String = indices
        .iter()
        .map(|&i| CALLSIGN_CHARSET[i as usize] as char)
        .filter(|&c| c != '#' && c != '_')
        .collect();
    if sign.is_empty() { None } else { Some(sign) }
}

/// Record the raw CPR frame carried by a position message.
fn store_cpr_frame(sq: &mut Squitter) {
    let odd = sq.msg[6] & 0x04 != 0;
    let frame = RawCpr {
        latitude: (((sq.msg[6] & 0x03) as u32) << 15)
            | ((sq.msg[7] as u32) << 7)
            | (sq.msg[8] as u32 >> 1),
        longitude: (((sq.msg[8] & 0x01) as u32) << 16)
            | ((sq.msg[9] as u32) << 8)
            | sq.msg[10] as u32,
    };
    if odd {
        sq.odd_cpr = Some(frame);
    } else {
        sq.even_cpr = Some(frame);
    }
}

/// Rearrange a 13-bit identity/altitude field into the hexadecimal Gillham
/// representation (one octal digit per nibble: A B C D).
fn parse_id13(field: u16) -> u16 {
    let mut gillham = 0u16;

    if field & 0x1000 != 0 {
        gillham |= 0x0010; // C1
    }
    if field & 0x0800 != 0 {
        gillham |= 0x1000; // A1
    }
    if field & 0x0400 != 0 {
        gillham |= 0x0020; // C2
    }
    if field & 0x0200 != 0 {
        gillham |= 0x2000; // A2
    }
    if field & 0x0100 != 0 {
        gillham |= 0x0040; // C4
    }
    if field & 0x0080 != 0 {
        gillham |= 0x4000; // A4
    }
    if field & 0x0020 != 0 {
        gillham |= 0x0100; // B1
    }
    if field & 0x0010 != 0 {
        gillham |= 0x0001; // D1 or Q
    }
    if field & 0x0008 != 0 {
        gillham |= 0x0200; // B2
    }
    if field & 0x0004 != 0 {
        gillham |= 0x0002; // D2
    }
    if field & 0x0002 != 0 {
        gillham |= 0x0400; // B4
    }
    if field & 0x0001 != 0 {
        gillham |= 0x0004; // D4
    }

    gillham
}

/// Gillham (Mode A bit layout) to Mode C altitude in hundreds of feet.
/// `None` for codes that cannot occur in a valid altitude reply.
fn mode_a_to_mode_c(mode_a: u16) -> Option<i32> {
    let mut five_hundreds: i32 = 0;
    let mut one_hundreds: i32 = 0;

    // D1 set is illegal; D2 would be above 62700 ft; C1..C4 all zero is
    // not a valid code
    if mode_a & 0x888B != 0 || mode_a & 0x00F0 == 0 {
        return None;
    }

    if mode_a & 0x0010 != 0 {
        one_hundreds ^= 0x007; // C1
    }
    if mode_a & 0x0020 != 0 {
        one_hundreds ^= 0x003; // C2
    }
    if mode_a & 0x0040 != 0 {
        one_hundreds ^= 0x001; // C4
    }

    // remove 7s (make 7 -> 5, 5 -> 7)
    if one_hundreds & 5 == 5 {
        one_hundreds ^= 2;
    }
    if one_hundreds > 5 {
        return None;
    }

    if mode_a & 0x0002 != 0 {
        five_hundreds ^= 0x0FF; // D2
    }
    if mode_a & 0x0004 != 0 {
        five_hundreds ^= 0x07F; // D4
    }
    if mode_a & 0x1000 != 0 {
        five_hundreds ^= 0x03F; // A1
    }
    if mode_a & 0x2000 != 0 {
        five_hundreds ^= 0x01F; // A2
    }
    if mode_a & 0x4000 != 0 {
        five_hundreds ^= 0x00F; // A4
    }
    if mode_a & 0x0100 != 0 {
        five_hundreds ^= 0x007; // B1
    }
    if mode_a & 0x0200 != 0 {
        five_hundreds ^= 0x003; // B2
    }
    if mode_a & 0x0400 != 0 {
        five_hundreds ^= 0x001; // B4
    }

    if five_hundreds & 1 != 0 {
        one_hundreds = 6 - one_hundreds;
    }

    Some(five_hundreds * 5 + one_hundreds - 13)
}

/// 13-bit AC altitude field (DF 0/4/16/20) to feet.
fn parse_ac13(field: u16) -> i32 {
    let m_bit = field & 0x0040 != 0;
    let q_bit = field & 0x0010 != 0;

    if m_bit {
        // metric altitude reporting is not implemented
        return 0;
    }
    if q_bit {
        // 25 ft encoding: drop the M and Q bits
        let n = ((field & 0x1F80) >> 2) | ((field & 0x0020) >> 1) | (field & 0x000F);
        return n as i32 * 25 - 1000;
    }
    match mode_a_to_mode_c(parse_id13(field)) {
        Some(n) if n >= -12 => n * 100,
        _ => 0,
    }
}

/// 12-bit AC altitude field (ADS-B airborne position) to feet.
fn parse_ac12(field: u16) -> i32 {
    let q_bit = field & 0x10 != 0;

    if q_bit {
        let n = ((field & 0x0FE0) >> 1) | (field & 0x000F);
        return n as i32 * 25 - 1000;
    }
    // make a 13-bit Gillham code by inserting M=0 at bit 6
    let n = ((field & 0x0FC0) << 1) | (field & 0x003F);
    match mode_a_to_mode_c(parse_id13(n)) {
        Some(c) if c >= -12 => c * 100,
        _ => 0,
    }
}

/// Piecewise ground-speed mapping of the 7-bit surface movement code.
fn parse_movement(movement: u8) -> u32 {
    let movement = movement as u32;
    if movement > 123 {
        199 // above 175 kt
    } else if movement > 108 {
        (movement - 108) * 5 + 100
    } else if movement > 93 {
        (movement - 93) * 2 + 70
    } else if movement > 38 {
        movement - 38 + 15
    } else if movement > 12 {
        ((movement - 11) >> 1) + 2
    } else if movement > 8 {
        ((movement - 6) >> 2) + 1
    } else {
        0
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::raw_from_hex;
    use super::*;

    fn decoder(mutate: impl FnOnce(&mut Config)) -> Decoder {
        let mut config = Config::default();
        mutate(&mut config);
        Decoder::new(Arc::new(config), Arc::new(Stats::new()))
    }

    fn decode_hex(hex: &str) -> Squitter {
        let d = decoder(|_| {});
        let mut sq = d.parse(&raw_from_hex(hex, 10.0));
        d.decode(&mut sq);
        sq
    }

    #[test]
    fn parse_validates_crc_and_icao() {
        let d = decoder(|_| {});
        let sq = d.parse(&raw_from_hex("8D4840D6202CC371C32CE0576098", 10.0));
        assert!(sq.crc_ok);
        assert_eq!(sq.crc_sum, 0);
        assert_eq!(sq.downlink_format, 17);
        assert_eq!(sq.msg_bits, 112);
        assert_eq!(sq.icao24, 0x4840D6);
    }

    #[test]
    fn parse_recovers_single_bit_error() {
        let d = decoder(|_| {});
        let mut raw = raw_from_hex("8D4840D6202CC371C32CE0576098", 10.0);
        raw.msg[6] ^= 0x10;
        let sq = d.parse(&raw);
        assert!(sq.crc_ok);
        assert_eq!(sq.corrected_bit, Some(51));
        assert_eq!(sq.icao24, 0x4840D6);
    }

    #[test]
    fn parse_without_correction_leaves_crc_bad() {
        let d = decoder(|c| c.apply_bit_err_correction = false);
        let mut raw = raw_from_hex("8D4840D6202CC371C32CE0576098", 10.0);
        raw.msg[6] ^= 0x10;
        let sq = d.parse(&raw);
        assert!(!sq.crc_ok);
        assert_ne!(sq.crc_sum, 0);
    }

    #[test]
    fn callsign_padding_is_stripped() {
        let sq = decode_hex("8D4840D6202CC371C32CE0576098");
        assert_eq!(sq.type_code, 4);
        assert_eq!(sq.call_sign.as_deref(), Some("KLM1023"));
    }

    #[test]
    fn airborne_position_even_frame() {
        let sq = decode_hex("8D40621D58C382D690C8AC2863A7");
        assert_eq!(sq.icao24, 0x40621D);
        assert_eq!(sq.type_code, 11);
        assert_eq!(sq.altitude, Some(38000));
        assert!(!sq.on_ground);
        let frame = sq.even_cpr.unwrap();
        assert_eq!(frame.latitude, 93000);
        assert_eq!(frame.longitude, 51372);
        assert!(sq.odd_cpr.is_none());
    }

    #[test]
    fn airborne_position_odd_frame() {
        let sq = decode_hex("8D40621D58C386435CC412692AD6");
        let frame = sq.odd_cpr.unwrap();
        assert_eq!(frame.latitude, 74158);
        assert_eq!(frame.longitude, 50194);
        assert!(sq.even_cpr.is_none());
    }

    #[test]
    fn airborne_velocity_vectors() {
        let sq = decode_hex("8D485020994409940838175B284F");
        assert_eq!(sq.type_code, 19);
        assert_eq!(sq.velocity, Some(159));
        assert_eq!(sq.heading, Some(183));
        assert_eq!(sq.vertical_rate, Some(-832));
    }

    #[test]
    fn metric_output_scales_fields() {
        let d = decoder(|c| c.use_metric = true);
        let mut sq = d.parse(&raw_from_hex("8D40621D58C382D690C8AC2863A7", 10.0));
        d.decode(&mut sq);
        // 38000 ft
        assert_eq!(sq.altitude, Some(11582));
    }

    #[test]
    fn ac12_quantised_altitude() {
        assert_eq!(parse_ac12(0b0000_0001_0101), -875);
        // metric equivalent of -875 ft
        assert_eq!((-875.0f64 * METER_PER_FOOT).round() as i32, -267);
    }

    #[test]
    fn ac13_quantised_altitude() {
        // Q=1 field from a live DF4 reply
        assert_eq!(parse_ac13(0x0F1F), 23375);
        // M=1 (metric) is reported as 0
        assert_eq!(parse_ac13(0x0040), 0);
    }

    #[test]
    fn ac13_gillham_altitude() {
        // B2 + C4 in Gillham terms: 700 ft
        assert_eq!(parse_ac13(0x0108), 700);
    }

    #[test]
    fn identity_permutation() {
        assert_eq!(parse_id13(0x1FFF), 0x7777);
        assert_eq!(parse_id13(0), 0);
        assert_eq!(format!("{:04X}", parse_id13(0x1FFF)), "7777");
    }

    #[test]
    fn movement_code_mapping() {
        assert_eq!(parse_movement(1), 0);
        assert_eq!(parse_movement(9), 1);
        assert_eq!(parse_movement(13), 3);
        assert_eq!(parse_movement(39), 16);
        assert_eq!(parse_movement(94), 72);
        assert_eq!(parse_movement(109), 105);
        assert_eq!(parse_movement(124), 199);
    }

    #[test]
    fn merge_keeps_known_fields() {
        let mut merged = decode_hex("8D4840D6202CC371C32CE0576098");
        assert!(merged.call_sign.is_some());

        let newer = decode_hex("8D485020994409940838175B284F");
        merged.update(&newer);
        // velocity fields arrive, the callsign survives
        assert_eq!(merged.call_sign.as_deref(), Some("KLM1023"));
        assert_eq!(merged.velocity, Some(159));
        assert_eq!(merged.vertical_rate, Some(-832));
    }

    #[test]
    fn empty_raw_message_detection() {
        let raw = RawMessage {
            signal_strength: 0.0,
            msg: [0u8; MODES_LONG_MSG_BYTES],
        };
        assert!(raw.is_empty());
        assert!(!raw_from_hex("8D4840D6202CC371C32CE0576098", 0.0).is_empty());
    }
}
