//! Geo commands over sorted sets scored by 52-bit interleaved geohashes.

use mr_protocol::Reply;
use mr_store::{Store, ZaddCondition, ZaddOptions};

use crate::{CommandError, eq_ascii_command, expect_min_arity, parse_f64_arg};

/// Bits per coordinate; the interleaved hash is twice this wide.
const GEO_STEP: u32 = 26;
pub const GEO_EARTH_RADIUS_IN_METERS: f64 = 6_372_797.560_856;
const GEOHASH_ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const GEOHASH_LEN: usize = 11;

#[derive(Debug, Clone, Copy)]
struct GeoBounds {
    lon: (f64, f64),
    lat: (f64, f64),
}

/// Web-mercator limits used for stored scores.
const WGS84: GeoBounds = GeoBounds {
    lon: (-180.0, 180.0),
    lat: (-85.051_128_78, 85.051_128_78),
};

/// Full latitude range used by the textual geohash.
const STANDARD: GeoBounds = GeoBounds {
    lon: (-180.0, 180.0),
    lat: (-90.0, 90.0),
};

impl GeoBounds {
    fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.lon.0..=self.lon.1).contains(&longitude) && (self.lat.0..=self.lat.1).contains(&latitude)
    }

    fn encode(&self, longitude: f64, latitude: f64) -> Option<u64> {
        if !self.contains(longitude, latitude) {
            return None;
        }
        let cells = f64::from(1_u32 << GEO_STEP);
        let lat_cell = ((latitude - self.lat.0) / (self.lat.1 - self.lat.0) * cells) as u32;
        let lon_cell = ((longitude - self.lon.0) / (self.lon.1 - self.lon.0) * cells) as u32;
        Some(interleave(lat_cell, lon_cell))
    }

    /// Center of the cell `bits` names, clamped to the bounds.
    fn decode(&self, bits: u64) -> (f64, f64) {
        let (lat_cell, lon_cell) = deinterleave(bits);
        let cells = f64::from(1_u32 << GEO_STEP);
        let center = |cell: u32, (min, max): (f64, f64)| {
            let width = max - min;
            let lo = min + f64::from(cell) / cells * width;
            let hi = min + (f64::from(cell) + 1.0) / cells * width;
            ((lo + hi) / 2.0).clamp(min, max)
        };
        (center(lon_cell, self.lon), center(lat_cell, self.lat))
    }
}

/// Latitude bits land on even positions, longitude bits on odd ones.
fn interleave(lat_cell: u32, lon_cell: u32) -> u64 {
    (0..32).fold(0_u64, |acc, bit| {
        let lat = u64::from((lat_cell >> bit) & 1);
        let lon = u64::from((lon_cell >> bit) & 1);
        acc | (lat << (2 * bit)) | (lon << (2 * bit + 1))
    })
}

fn deinterleave(bits: u64) -> (u32, u32) {
    (0..32).fold((0_u32, 0_u32), |(lat, lon), bit| {
        let lat_bit = ((bits >> (2 * bit)) & 1) as u32;
        let lon_bit = ((bits >> (2 * bit + 1)) & 1) as u32;
        (lat | (lat_bit << bit), lon | (lon_bit << bit))
    })
}

/// Sorted-set score for a coordinate pair, `None` outside the mercator range.
#[must_use]
pub fn geo_encode_wgs84(longitude: f64, latitude: f64) -> Option<u64> {
    WGS84.encode(longitude, latitude)
}

/// `(longitude, latitude)` stored under `score`.
#[must_use]
pub fn geo_decode_score(score: f64) -> Option<(f64, f64)> {
    if !score.is_finite() || score < 0.0 {
        return None;
    }
    Some(WGS84.decode(score as u64))
}

/// Haversine distance in meters.
#[must_use]
pub fn geo_distance_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let half_dlon = ((lon2.to_radians() - lon1.to_radians()) / 2.0).sin();
    if half_dlon == 0.0 {
        return GEO_EARTH_RADIUS_IN_METERS * (lat2 - lat1).abs();
    }
    let half_dlat = ((lat2 - lat1) / 2.0).sin();
    let a = (half_dlat * half_dlat + lat1.cos() * lat2.cos() * half_dlon * half_dlon).clamp(0.0, 1.0);
    2.0 * GEO_EARTH_RADIUS_IN_METERS * a.sqrt().asin()
}

/// Standard 11-character base32 geohash of the position stored under `score`.
#[must_use]
pub fn geo_hash_string_from_score(score: f64) -> Option<Vec<u8>> {
    let (longitude, latitude) = geo_decode_score(score)?;
    let bits = STANDARD.encode(longitude, latitude)?;
    let total_bits = 2 * GEO_STEP as usize;
    let hash = (0..GEOHASH_LEN)
        .map(|index| {
            // 52 bits fill ten characters; the last one is always padding.
            let symbol = match total_bits.checked_sub((index + 1) * 5) {
                Some(shift) => ((bits >> shift) & 0x1f) as usize,
                None => 0,
            };
            GEOHASH_ALPHABET[symbol]
        })
        .collect();
    Some(hash)
}

fn unit_in_meters(unit: &[u8]) -> Option<f64> {
    [("m", 1.0), ("km", 1000.0), ("ft", 0.3048), ("mi", 1609.34)]
        .into_iter()
        .find(|(name, _)| eq_ascii_command(unit, name))
        .map(|(_, meters)| meters)
}

/// `GEOADD key [NX|XX] [CH] longitude latitude member [...]`.
pub(crate) fn geoadd(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 5, "geoadd")?;
    let (mut nx, mut xx, mut ch) = (false, false, false);
    let mut index = 2;
    while let Some(token) = argv.get(index) {
        if eq_ascii_command(token, "nx") {
            nx = true;
        } else if eq_ascii_command(token, "xx") {
            xx = true;
        } else if eq_ascii_command(token, "ch") {
            ch = true;
        } else {
            break;
        }
        index += 1;
    }
    if nx && xx {
        return Err(CommandError::SyntaxError);
    }
    let triples = &argv[index..];
    if triples.is_empty() || triples.len() % 3 != 0 {
        return Err(CommandError::WrongArity("geoadd"));
    }

    let mut pairs = Vec::with_capacity(triples.len() / 3);
    for triple in triples.chunks_exact(3) {
        let longitude = parse_f64_arg(&triple[0])?;
        let latitude = parse_f64_arg(&triple[1])?;
        let bits = geo_encode_wgs84(longitude, latitude)
            .ok_or(CommandError::InvalidCoordinates(longitude, latitude))?;
        pairs.push((bits as f64, triple[2].clone()));
    }

    let options = ZaddOptions {
        condition: if nx {
            ZaddCondition::IfAbsent
        } else if xx {
            ZaddCondition::IfPresent
        } else {
            ZaddCondition::Always
        },
        ..ZaddOptions::default()
    };
    let outcome = store.zadd(&argv[1], &pairs, options, now_ms)?;
    let changed = if ch { outcome.added + outcome.updated } else { outcome.added };
    Ok(Reply::integer(changed))
}

/// `GEODIST key member1 member2 [M|KM|FT|MI]`.
pub(crate) fn geodist(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    let meters_per_unit = match argv.len() {
        4 => 1.0,
        5 => unit_in_meters(&argv[4]).ok_or(CommandError::UnknownUnit)?,
        _ => return Err(CommandError::WrongArity("geodist")),
    };
    let first = store.zscore(&argv[1], &argv[2], now_ms)?.and_then(geo_decode_score);
    let second = store.zscore(&argv[1], &argv[3], now_ms)?.and_then(geo_decode_score);
    let (Some((lon1, lat1)), Some((lon2, lat2))) = (first, second) else {
        return Ok(Reply::null_bulk());
    };
    let distance = geo_distance_m(lon1, lat1, lon2, lat2) / meters_per_unit;
    Ok(Reply::bulk(format!("{distance:.4}")))
}

pub(crate) fn geohash(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 2, "geohash")?;
    let mut hashes = Vec::with_capacity(argv.len() - 2);
    for member in &argv[2..] {
        let hash = store
            .zscore(&argv[1], member, now_ms)?
            .and_then(geo_hash_string_from_score);
        hashes.push(Reply::optional_bulk(hash));
    }
    Ok(Reply::array(hashes))
}

/// `[longitude, latitude]` per member, a null array for missing ones.
pub(crate) fn geopos(argv: &[Vec<u8>], store: &mut Store, now_ms: u64) -> Result<Reply, CommandError> {
    expect_min_arity(argv, 2, "geopos")?;
    let mut positions = Vec::with_capacity(argv.len() - 2);
    for member in &argv[2..] {
        let position = match store.zscore(&argv[1], member, now_ms)?.and_then(geo_decode_score) {
            Some((longitude, latitude)) => Reply::bulk_array([
                longitude.to_string().into_bytes(),
                latitude.to_string().into_bytes(),
            ]),
            None => Reply::null_array(),
        };
        positions.push(position);
    }
    Ok(Reply::array(positions))
}
