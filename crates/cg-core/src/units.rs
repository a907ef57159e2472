//! Unit conversions at the vendor boundary, plus wall-clock helpers.
//!
//! Prices, amounts and costs cross the boundary as integers scaled by
//! [`PRICE_SCALE`]: divide on ingest, multiply and round on egress. Order
//! times arrive as a packed integer whose upper 32 bits hold `HHMMSS` and
//! whose lower 32 bits hold `YYYYMMDD` (0 when the vendor omits the date).

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Fixed-point factor applied to every price-like vendor field.
pub const PRICE_SCALE: i64 = 10_000;

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Vendor fixed-point integer -> real-valued price.
#[inline]
pub fn price_from_vendor(raw: i64) -> f64 {
    raw as f64 / PRICE_SCALE as f64
}

/// Real-valued price -> vendor fixed-point integer, rounded to the nearest
/// unit of `1 / PRICE_SCALE`.
#[inline]
pub fn price_to_vendor(price: f64) -> i64 {
    (price * PRICE_SCALE as f64).round() as i64
}

// ---------------------------------------------------------------------------
// Packed order times
// ---------------------------------------------------------------------------

/// Split a packed vendor time into its time-of-day and optional date.
///
/// Returns `None` for the time when the `HHMMSS` part is out of range.
pub fn unpack_vendor_time(packed: u64) -> (Option<NaiveTime>, Option<NaiveDate>) {
    let hhmmss = (packed >> 32) as u32;
    let yyyymmdd = (packed & 0xFFFF_FFFF) as u32;

    let time = NaiveTime::from_hms_opt(hhmmss / 10_000, (hhmmss / 100) % 100, hhmmss % 100);
    let date = if yyyymmdd == 0 {
        None
    } else {
        NaiveDate::from_ymd_opt(
            (yyyymmdd / 10_000) as i32,
            (yyyymmdd / 100) % 100,
            yyyymmdd % 100,
        )
    };
    (time, date)
}

/// Format the time-of-day part of a packed vendor time as `HH:MM:SS`.
///
/// Malformed values yield an empty string rather than an error; the order
/// time is informational only.
pub fn format_vendor_time(packed: u64) -> String {
    match unpack_vendor_time(packed).0 {
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => String::new(),
    }
}

/// Inverse of [`unpack_vendor_time`], used by tests and the journal tooling.
pub fn pack_vendor_time(hour: u32, minute: u32, second: u32, yyyymmdd: u32) -> u64 {
    let hhmmss = (hour * 10_000 + minute * 100 + second) as u64;
    (hhmmss << 32) | yyyymmdd as u64
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Vendor microsecond timestamp -> UTC datetime (epoch on overflow).
pub fn datetime_from_us(timeus: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(timeus).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Current time as **microseconds** since Unix epoch.
#[inline]
pub fn now_us() -> u64 {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    d.as_secs() * 1_000_000 + d.subsec_micros() as u64
}
