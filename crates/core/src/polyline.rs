//! Google encoded polyline codec.
//!
//! Each coordinate is stored as a pair of signed deltas (latitude first, then
//! longitude) against the previous coordinate, scaled by 1e5. Every delta is
//! zig-zag encoded and split into 5-bit chunks, least significant first. A
//! chunk is written as `chunk + 63`, with `0x20` set on every chunk but the
//! last.
//!
//! Decoded coordinates are returned in GeoJSON axis order: `x` is longitude,
//! `y` is latitude.

use geo::Coord;

use crate::error::DecodeError;

const PRECISION: f64 = 100_000.0;
const ALPHABET_OFFSET: u8 = 63;
const CONTINUATION: u8 = 0x20;
const PAYLOAD_MASK: u8 = 0x1f;
const ALPHABET_END: u8 = 126;

/// Decode an encoded polyline into `(longitude, latitude)` coordinates.
///
/// An empty string decodes to an empty vector. Malformed input is rejected
/// rather than decoded into whatever the bytes happen to produce.
pub fn decode(encoded: &str) -> Result<Vec<Coord<f64>>, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut coordinates = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        let lat_start = index;
        let (lat_delta, lng_start) = read_value(bytes, index)?;
        if lng_start >= bytes.len() {
            return Err(DecodeError::MissingLongitude { offset: lat_start });
        }
        let (lng_delta, next) = read_value(bytes, lng_start)?;

        lat = lat
            .checked_add(lat_delta)
            .ok_or(DecodeError::Overflow { offset: lat_start })?;
        lng = lng
            .checked_add(lng_delta)
            .ok_or(DecodeError::Overflow { offset: lng_start })?;
        index = next;

        coordinates.push(Coord {
            x: lng as f64 / PRECISION,
            y: lat as f64 / PRECISION,
        });
    }

    Ok(coordinates)
}

/// Decode into `(latitude, longitude)` tuples, the order the Directions API
/// documents its points in.
pub fn decode_lat_lng(encoded: &str) -> Result<Vec<(f64, f64)>, DecodeError> {
    Ok(decode(encoded)?.into_iter().map(|c| (c.y, c.x)).collect())
}

/// Read one zig-zag varint starting at `start`; returns the signed delta and
/// the offset of the next unread byte.
fn read_value(bytes: &[u8], start: usize) -> Result<(i64, usize), DecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut index = start;

    loop {
        let Some(&raw) = bytes.get(index) else {
            return Err(DecodeError::Truncated { offset: start });
        };
        if !raw.is_ascii() {
            return Err(DecodeError::NonAscii { offset: index, byte: raw });
        }
        if !(ALPHABET_OFFSET..=ALPHABET_END).contains(&raw) {
            return Err(DecodeError::InvalidByte {
                offset: index,
                byte: raw as char,
            });
        }

        let chunk = raw - ALPHABET_OFFSET;
        let payload = u64::from(chunk & PAYLOAD_MASK);
        // payload bits must land inside the accumulator
        if shift >= u64::BITS || (payload << shift) >> shift != payload {
            return Err(DecodeError::Overflow { offset: start });
        }
        result |= payload << shift;
        shift += 5;
        index += 1;

        if chunk & CONTINUATION == 0 {
            break;
        }
    }

    let magnitude = (result >> 1) as i64;
    let delta = if result & 1 == 1 { !magnitude } else { magnitude };
    Ok((delta, index))
}

/// Encode coordinates (longitude in `x`, latitude in `y`) as a polyline.
///
/// Values are rounded to five decimal places, so `decode(encode(c))` only
/// reproduces `c` up to that precision.
pub fn encode(coordinates: &[Coord<f64>]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for coord in coordinates {
        let lat = (coord.y * PRECISION).round() as i64;
        let lng = (coord.x * PRECISION).round() as i64;
        write_value(&mut out, lat - prev_lat);
        write_value(&mut out, lng - prev_lng);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn write_value(out: &mut String, delta: i64) {
    let mut value = if delta < 0 {
        !((delta as u64) << 1)
    } else {
        (delta as u64) << 1
    };

    while value >= u64::from(CONTINUATION) {
        let chunk = (CONTINUATION | (value as u8 & PAYLOAD_MASK)) + ALPHABET_OFFSET;
        out.push(chunk as char);
        value >>= 5;
    }
    out.push((value as u8 + ALPHABET_OFFSET) as char);
}
