//! Compact Position Reporting.
//!
//! Airborne positions arrive as 17-bit latitude/longitude fields in two
//! alternating encodings (even and odd zone counts). A pair of opposite
//! parity yields a globally unambiguous position; a single frame can be
//! resolved against a nearby reference instead. Both decoders are pure;
//! the frame pairing state lives with the aircraft entry.

/// Latitude bands for the longitude zone count NL, descending. NL(lat) is
/// one more than the index of the first entry strictly below |lat|.
pub const NL_TABLE: [f64; 59] = [
    87.00000000, 86.53536998, 85.75541621, 84.89166191, 83.99173563, 83.07199445,
    82.13956981, 81.19801349, 80.24923213, 79.29428225, 78.33374083, 77.36789461,
    76.39684391, 75.42056257, 74.43893416, 73.45177442, 72.45884545, 71.45986473,
    70.45451075, 69.44242631, 68.42322022, 67.39646774, 66.36171008, 65.31845310,
    64.26616523, 63.20427479, 62.13216659, 61.04917774, 59.95459277, 58.84763776,
    57.72747354, 56.59318756, 55.44378444, 54.27817472, 53.09516153, 51.89342469,
    50.67150166, 49.42776439, 48.16039128, 46.86733252, 45.54626723, 44.19454951,
    42.80914012, 41.38651832, 39.92256684, 38.41241892, 36.85025108, 35.22899598,
    33.53993436, 31.77209708, 29.91135686, 27.93898710, 25.82924707, 23.54504487,
    21.02939493, 18.18626357, 14.82817437, 10.47047130, 0.0,
];

/// Range of a 17-bit CPR field.
const CPR_MAX: f64 = 131072.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

/// One raw position frame as carried in the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCpr {
    pub latitude: u32,
    pub longitude: u32,
}

/// Number of longitude zones at a latitude: 59 at the equator down to 1
/// beyond 87 degrees.
pub fn cpr_nl(lat: f64) -> u32 {
    let lat = lat.abs();
    for (i, &band) in NL_TABLE.iter().enumerate() {
        if lat > band {
            return i as u32 + 1;
        }
    }
    NL_TABLE.len() as u32
}

fn cpr_n(lat: f64, parity: Parity) -> u32 {
    let nl = match parity {
        Parity::Even => cpr_nl(lat),
        Parity::Odd => cpr_nl(lat).saturating_sub(1),
    };
    nl.max(1)
}

fn cpr_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r < 0.0 { r + b } else { r }
}

/// Globally unambiguous decode from an even/odd pair. `even_then_odd`
/// records the arrival order and selects which encoding anchors the
/// result: a pair completed by the odd frame decodes on the even grid,
/// and vice versa. Airborne zones span 360 degrees; on the surface they
/// span 90 and `reference` places the result in the right quadrant.
/// Returns `None` when the pair is ambiguous (zone count mismatch or
/// latitude out of range).
pub fn decode_global(
    even: RawCpr,
    odd: RawCpr,
    even_then_odd: bool,
    on_ground: bool,
    reference: (f64, f64),
) -> Option<(f64, f64)> {
    let span = if on_ground { 90.0 } else { 360.0 };
    let d_lat_even = span / 60.0;
    let d_lat_odd = span / 59.0;

    let lat0 = even.latitude as f64;
    let lat1 = odd.latitude as f64;
    let lon0 = even.longitude as f64;
    let lon1 = odd.longitude as f64;

    // latitude zone index
    let j = ((59.0 * lat0 - 60.0 * lat1) / CPR_MAX + 0.5).floor();

    let mut rlat0 = d_lat_even * (cpr_mod(j, 60.0) + lat0 / CPR_MAX);
    let mut rlat1 = d_lat_odd * (cpr_mod(j, 59.0) + lat1 / CPR_MAX);

    if on_ground {
        let quadrant = (reference.0 / 90.0).floor() * 90.0;
        rlat0 += quadrant;
        rlat1 += quadrant;
    } else {
        if rlat0 >= 270.0 {
            rlat0 -= 360.0;
        }
        if rlat1 >= 270.0 {
            rlat1 -= 360.0;
        }
    }

    if !(-90.0..=90.0).contains(&rlat0) || !(-90.0..=90.0).contains(&rlat1) {
        return None;
    }
    if cpr_nl(rlat0) != cpr_nl(rlat1) {
        return None;
    }

    let (rlat, parity, lon_cpr) = if even_then_odd {
        (rlat0, Parity::Even, lon0)
    } else {
        (rlat1, Parity::Odd, lon1)
    };

    let nl = cpr_nl(rlat) as f64;
    let ni = cpr_n(rlat, parity) as f64;
    let m = ((lon0 * (nl - 1.0) - lon1 * nl) / CPR_MAX + 0.5).floor();

    let mut lon = (span / ni) * (cpr_mod(m, ni) + lon_cpr / CPR_MAX);
    if on_ground {
        lon += (reference.1 / 90.0).floor() * 90.0;
    }
    if lon > 180.0 {
        lon -= 360.0;
    }
    Some((rlat, lon))
}

/// Locally unambiguous decode of a single frame against a reference
/// position no further than half a zone away. Returns `None` when the
/// recovered latitude is implausible or too far from the reference.
pub fn decode_local(
    reference: (f64, f64),
    frame: RawCpr,
    parity: Parity,
    on_ground: bool,
) -> Option<(f64, f64)> {
    let (lat_ref, lon_ref) = reference;
    let span = if on_ground { 90.0 } else { 360.0 };
    let d_lat = match parity {
        Parity::Even => span / 60.0,
        Parity::Odd => span / 59.0,
    };

    let lat_cpr = frame.latitude as f64 / CPR_MAX;
    let j = (lat_ref / d_lat).floor()
        + (0.5 + cpr_mod(lat_ref, d_lat) / d_lat - lat_cpr).trunc();
    let rlat = d_lat * (j + lat_cpr);

    if !(-90.0..=90.0).contains(&rlat) {
        return None;
    }
    if (rlat - lat_ref).abs() > d_lat / 2.0 {
        return None;
    }
    if on_ground && (rlat / 90.0).floor() != (lat_ref / 90.0).floor() {
        return None;
    }

    let d_lon = span / cpr_n(rlat, parity) as f64;
    let lon_cpr = frame.longitude as f64 / CPR_MAX;
    let m = (lon_ref / d_lon).floor()
        + (0.5 + cpr_mod(lon_ref, d_lon) / d_lon - lon_cpr).trunc();
    let mut rlon = d_lon * (m + lon_cpr);
    if rlon > 180.0 {
        rlon -= 360.0;
    }
    Some((rlat, rlon))
}
