//! Aircraft state registry.
//!
//! One entry per ICAO24 address, merged from successive accepted messages.
//! The registry applies the per-DF acceptance policy, resolves CPR frames
//! into positions and ages out aircraft that have gone quiet.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cpr::{self, Parity, RawCpr};
use crate::squitter::Squitter;

/// DF11 rescue: a failed CRC with a residue below this and an already
/// tracked address is treated as a one-bit slip on a known aircraft.
const ALL_CALL_RESIDUE_LIMIT: u32 = 80;

#[derive(Debug, Clone)]
pub struct Aircraft {
    pub icao: u32,
    pub msg: Squitter,
    pub seen: Instant,
    pub count: u64,
}

/// Stringified view of one aircraft for the query protocol.
#[derive(Debug, Clone, Serialize)]
pub struct BlipRecord {
    pub count: u64,
    pub timestamp: String,
    pub signal_strength: String,
    pub downlink_format: String,
    #[serde(rename = "ICAO24")]
    pub icao24: String,
    pub squawk: String,
    pub altitude: String,
    pub call_sign: String,
    pub velocity: String,
    pub heading: String,
    pub vertical_rate: String,
    pub latitude: String,
    pub longitude: String,
}

pub struct AircraftStore {
    aircraft: HashMap<u32, Aircraft>,
    ttl: Duration,
    /// Receiver site, (0, 0) when not configured.
    reference: (f64, f64),
}

impl AircraftStore {
    pub fn new(ttl_secs: u64, reference: (f64, f64)) -> Self {
        Self {
            aircraft: HashMap::new(),
            ttl: Duration::from_secs(ttl_secs),
            reference,
        }
    }

    pub fn contains(&self, icao: u32) -> bool {
        self.aircraft.contains_key(&icao)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    /// Acceptance policy. DF17/18 stand on their own CRC; DF11 may ride on
    /// a small residue against a tracked address; every other DF carries
    /// its address XORed into the parity, so the residue of a "failed"
    /// check is the candidate address.
    pub fn accept(&self, sq: &mut Squitter) -> bool {
        if sq.crc_ok {
            return true;
        }
        match sq.downlink_format {
            17 | 18 => false,
            11 => {
                if sq.crc_sum < ALL_CALL_RESIDUE_LIMIT && self.contains(sq.icao24) {
                    sq.crc_ok = true;
                    true
                } else {
                    false
                }
            }
            _ => {
                let candidate = sq.crc_sum;
                if self.contains(candidate) {
                    sq.icao24 = candidate;
                    sq.crc_ok = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Upsert an accepted, decoded message: merge fields, refresh the
    /// timestamp, stash CPR frames and try to resolve a position.
    pub fn ingest(&mut self, sq: Squitter) {
        let icao = sq.icao24;
        let now = Instant::now();

        let entry = self.aircraft.entry(icao).or_insert_with(|| Aircraft {
            icao,
            msg: Squitter::default(),
            seen: now,
            count: 0,
        });
        entry.seen = now;
        entry.count += 1;

        let fresh = sq
            .odd_cpr
            .map(|f| (f, Parity::Odd))
            .or_else(|| sq.even_cpr.map(|f| (f, Parity::Even)));

        if let Some(frame) = sq.even_cpr {
            entry.msg.even_cpr = Some(frame);
            entry.msg.even_then_odd = false;
        }
        if let Some(frame) = sq.odd_cpr {
            entry.msg.even_then_odd = entry.msg.even_cpr.is_some();
            entry.msg.odd_cpr = Some(frame);
        }
        if fresh.is_some() {
            entry.msg.on_ground = sq.on_ground;
        }

        entry.msg.update(&sq);

        if let Some((frame, parity)) = fresh {
            self.resolve_position(icao, frame, parity);
        }
    }

    /// Local decode against the last known position (or the receiver site)
    /// first, global even/odd pairing as the fallback. A successful decode
    /// consumes the stored pair.
    fn resolve_position(&mut self, icao: u32, frame: RawCpr, parity: Parity) {
        let site = self.reference;
        let Some(entry) = self.aircraft.get_mut(&icao) else {
            return;
        };
        let msg = &mut entry.msg;

        let reference = match (msg.latitude, msg.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ if site != (0.0, 0.0) => Some(site),
            _ => None,
        };

        let mut position =
            reference.and_then(|r| cpr::decode_local(r, frame, parity, msg.on_ground));

        if position.is_none() {
            if let (Some(even), Some(odd)) = (msg.even_cpr, msg.odd_cpr) {
                position = cpr::decode_global(
                    even,
                    odd,
                    msg.even_then_odd,
                    msg.on_ground,
                    reference.unwrap_or(site),
                );
            }
        }

        if let Some((lat, lon)) = position {
            msg.latitude = Some((lat * 1000.0).round() / 1000.0);
            msg.longitude = Some((lon * 1000.0).round() / 1000.0);
            msg.even_cpr = None;
            msg.odd_cpr = None;
            msg.even_then_odd = false;
        }
    }

    /// Drop aircraft whose last message is at least the TTL old.
    pub fn remove_stale(&mut self) {
        let now = Instant::now();
        self.aircraft
            .retain(|_, a| now.duration_since(a.seen) < self.ttl);
    }

    /// Independent stringified copy of every tracked aircraft.
    pub fn snapshot(&self) -> Vec<BlipRecord> {
        let now = Instant::now();
        self.aircraft
            .values()
            .map(|a| BlipRecord {
                count: a.count,
                timestamp: now.duration_since(a.seen).as_secs().to_string(),
                signal_strength: format!("{:.1}", a.msg.signal_strength),
                downlink_format: a.msg.downlink_format.to_string(),
                icao24: format!("{:06x}", a.icao),
                squawk: a.msg.squawk.clone().unwrap_or_default(),
                altitude: a.msg.altitude.map(|v| v.to_string()).unwrap_or_default(),
                call_sign: a.msg.call_sign.clone().unwrap_or_default(),
                velocity: a.msg.velocity.map(|v| v.to_string()).unwrap_or_default(),
                heading: a.msg.heading.map(|v| v.to_string()).unwrap_or_default(),
                vertical_rate: a
                    .msg
                    .vertical_rate
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                latitude: a.msg.latitude.map(|v| format!("{v:.3}")).unwrap_or_default(),
                longitude: a.msg.longitude.map(|v| format!("{v:.3}")).unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::squitter::test_util::raw_from_hex;
    use crate::squitter::Decoder;
    use crate::stats::Stats;
    use std::sync::Arc;

    fn decode(hex: &str) -> Squitter {
        let decoder = Decoder::new(Arc::new(Config::default()), Arc::new(Stats::new()));
        let mut sq = decoder.parse(&raw_from_hex(hex, 10.0));
        decoder.decode(&mut sq);
        sq
    }

    #[test]
    fn global_position_from_even_then_odd_pair() {
        let mut store = AircraftStore::new(60, (0.0, 0.0));
        store.ingest(decode("8D40621D58C382D690C8AC2863A7")); // even
        store.ingest(decode("8D40621D58C386435CC412692AD6")); // odd, later

        let blips = store.snapshot();
        assert_eq!(blips.len(), 1);
        assert_eq!(blips[0].icao24, "40621d");
        assert_eq!(blips[0].latitude, "52.257");
        assert_eq!(blips[0].longitude, "3.919");
        assert_eq!(blips[0].count, 2);
    }

    #[test]
    fn global_position_from_odd_then_even_pair() {
        let mut store = AircraftStore::new(60, (0.0, 0.0));
        store.ingest(decode("8D40621D58C386435CC412692AD6")); // odd
        store.ingest(decode("8D40621D58C382D690C8AC2863A7")); // even, later

        let blips = store.snapshot();
        assert_eq!(blips[0].latitude, "52.266");
        assert_eq!(blips[0].longitude, "3.939");
    }

    #[test]
    fn local_position_from_receiver_site() {
        let mut store = AircraftStore::new(60, (52.258, 3.918));
        store.ingest(decode("8D40621D58C382D690C8AC2863A7")); // single even frame

        let blips = store.snapshot();
        assert_eq!(blips[0].latitude, "52.257");
        assert_eq!(blips[0].longitude, "3.919");
    }

    #[test]
    fn single_frame_without_reference_has_no_position() {
        let mut store = AircraftStore::new(60, (0.0, 0.0));
        store.ingest(decode("8D40621D58C382D690C8AC2863A7"));

        let blips = store.snapshot();
        assert_eq!(blips[0].latitude, "");
        assert_eq!(blips[0].longitude, "");
    }

    #[test]
    fn merge_accumulates_fields() {
        let mut store = AircraftStore::new(60, (0.0, 0.0));
        let mut callsign = decode("8D4840D6202CC371C32CE0576098");
        callsign.icao24 = 0x485020;
        store.ingest(callsign);
        store.ingest(decode("8D485020994409940838175B284F"));

        let blips = store.snapshot();
        assert_eq!(blips.len(), 1);
        assert_eq!(blips[0].call_sign, "KLM1023");
        assert_eq!(blips[0].velocity, "159");
        assert_eq!(blips[0].heading, "183");
        assert_eq!(blips[0].vertical_rate, "-832");
    }

    #[test]
    fn df11_rescue_needs_a_tracked_aircraft() {
        let store = AircraftStore::new(60, (0.0, 0.0));
        let mut sq = Squitter {
            downlink_format: 11,
            icao24: 0x4840D6,
            crc_sum: 42,
            ..Squitter::default()
        };
        // unknown aircraft: rejected
        assert!(!store.accept(&mut sq));

        let mut store = AircraftStore::new(60, (0.0, 0.0));
        store.ingest(decode("8D4840D6202CC371C32CE0576098"));
        let mut sq = Squitter {
            downlink_format: 11,
            icao24: 0x4840D6,
            crc_sum: 42,
            ..Squitter::default()
        };
        assert!(store.accept(&mut sq));
        assert!(sq.crc_ok);

        // a large residue stays rejected even for a tracked aircraft
        let mut sq = Squitter {
            downlink_format: 11,
            icao24: 0x4840D6,
            crc_sum: 4242,
            ..Squitter::default()
        };
        assert!(!store.accept(&mut sq));
    }

    #[test]
    fn residue_as_address_rescues_surveillance_replies() {
        let mut store = AircraftStore::new(60, (0.0, 0.0));
        store.ingest(decode("8D4840D6202CC371C32CE0576098"));

        let mut sq = Squitter {
            downlink_format: 4,
            icao24: 0x123456,
            crc_sum: 0x4840D6,
            ..Squitter::default()
        };
        assert!(store.accept(&mut sq));
        assert_eq!(sq.icao24, 0x4840D6);

        // same reply against an empty registry is dropped
        let empty = AircraftStore::new(60, (0.0, 0.0));
        let mut sq = Squitter {
            downlink_format: 4,
            icao24: 0x123456,
            crc_sum: 0x4840D6,
            ..Squitter::default()
        };
        assert!(!empty.accept(&mut sq));
    }

    #[test]
    fn stale_entries_are_removed() {
        let mut store = AircraftStore::new(60, (0.0, 0.0));
        store.ingest(decode("8D4840D6202CC371C32CE0576098"));
        assert_eq!(store.len(), 1);

        store.remove_stale();
        assert_eq!(store.len(), 1);

        store
            .aircraft
            .get_mut(&0x4840D6)
            .unwrap()
            .seen = Instant::now() - Duration::from_secs(120);
        store.remove_stale();
        assert!(store.is_empty());
    }

    #[test]
    fn one_entry_per_address() {
        let mut store = AircraftStore::new(60, (0.0, 0.0));
        for _ in 0..5 {
            store.ingest(decode("8D4840D6202CC371C32CE0576098"));
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].count, 5);
    }
}
