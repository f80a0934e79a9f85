//! Dynamic decoding of result rows.
//!
//! Rows have no fixed shape, so each cell is decoded from its binary wire
//! bytes by its reported Postgres type into a JSON value. NUMERIC is rendered
//! as a decimal string to keep full precision, and date/time values honour the
//! `infinity` sentinels. Arrays are decoded element by element with the same
//! rules. Types without a mapping become a `\x`-prefixed hex literal.

use crate::types::ResultRow;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Number, Value};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgRow, PgTypeKind, PgValueFormat};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::fmt::Write;
use std::net::{Ipv4Addr, Ipv6Addr};

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

const MICROS_PER_SECOND: u64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * 1_000_000;

/// Decode every column of `row` into a label -> value map, in column order.
pub fn decode_row(row: &PgRow) -> Result<ResultRow, sqlx::Error> {
    let mut out = ResultRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, idx)?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_cell(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let mut type_info = raw.type_info().into_owned();
    while let PgTypeKind::Domain(base) = type_info.kind() {
        type_info = base.clone();
    }
    let format = raw.format();
    let bytes = raw.as_bytes().map_err(|e| decode_error(idx, e))?;

    // Enum labels travel as text even in binary format.
    if matches!(format, PgValueFormat::Text) || matches!(type_info.kind(), PgTypeKind::Enum(_)) {
        return Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()));
    }

    decode_binary(type_info.name(), bytes).map_err(|e| decode_error(idx, e.into()))
}

fn decode_error(idx: usize, source: BoxDynError) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: idx.to_string(),
        source,
    }
}

/// Decode one binary-format value of the named type.
fn decode_binary(type_name: &str, bytes: &[u8]) -> Result<Value, String> {
    if let Some(element) = type_name.strip_suffix("[]") {
        return decode_array(element, bytes);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(fixed::<1>(bytes)?[0] != 0),
        "INT2" => Value::from(i16::from_be_bytes(fixed(bytes)?)),
        "INT4" => Value::from(i32::from_be_bytes(fixed(bytes)?)),
        "INT8" => Value::from(i64::from_be_bytes(fixed(bytes)?)),
        "OID" => Value::from(Oid(u32::from_be_bytes(fixed(bytes)?)).0),
        "FLOAT4" => float(f32::from_be_bytes(fixed(bytes)?) as f64),
        "FLOAT8" => float(f64::from_be_bytes(fixed(bytes)?)),
        "NUMERIC" => Value::String(
            numeric_to_string(bytes).ok_or_else(|| "malformed NUMERIC value".to_string())?,
        ),
        "MONEY" => Value::String(money_to_string(i64::from_be_bytes(fixed(bytes)?))),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "UNKNOWN" => Value::String(
            std::str::from_utf8(bytes)
                .map_err(|e| format!("invalid UTF-8 in {}: {}", type_name, e))?
                .to_string(),
        ),
        "\"CHAR\"" => Value::String(char::from(fixed::<1>(bytes)?[0]).to_string()),
        "JSON" => serde_json::from_slice(bytes).map_err(|e| e.to_string())?,
        "JSONB" => match bytes.split_first() {
            Some((1, body)) => serde_json::from_slice(body).map_err(|e| e.to_string())?,
            _ => return Err("unsupported JSONB version".to_string()),
        },
        "UUID" => Value::String(
            uuid::Uuid::from_slice(bytes)
                .map_err(|e| e.to_string())?
                .to_string(),
        ),
        "DATE" => Value::String(date_to_string(i32::from_be_bytes(fixed(bytes)?))?),
        "TIME" => Value::String(time_to_string(i64::from_be_bytes(fixed(bytes)?))?),
        "TIMETZ" => {
            let mut reader = Reader::new(bytes);
            let micros = reader.i64()?;
            let zone = reader.i32()?;
            Value::String(format!("{}{}", time_to_string(micros)?, utc_offset(-zone)))
        }
        "TIMESTAMP" | "TIMESTAMPTZ" => {
            let micros = i64::from_be_bytes(fixed(bytes)?);
            Value::String(timestamp_to_string(micros, type_name == "TIMESTAMPTZ")?)
        }
        "INTERVAL" => {
            let mut reader = Reader::new(bytes);
            let interval = PgInterval {
                microseconds: reader.i64()?,
                days: reader.i32()?,
                months: reader.i32()?,
            };
            Value::String(interval_to_string(&interval))
        }
        "INET" | "CIDR" => Value::String(inet_to_string(bytes)?),
        _ => hex_literal(bytes),
    };

    Ok(value)
}

/// Binary array layout: `ndim: i32, flags: i32, element oid: u32`, then
/// `(length: i32, lower bound: i32)` per dimension, then every element in
/// row-major order as `length: i32` (`-1` for NULL) followed by its bytes.
fn decode_array(element: &str, bytes: &[u8]) -> Result<Value, String> {
    let mut reader = Reader::new(bytes);
    let ndim = reader.i32()?;
    let _flags = reader.i32()?;
    let _element_oid = reader.i32()?;

    let ndim = usize::try_from(ndim).map_err(|_| format!("negative array dimension count {}", ndim))?;
    let mut dims = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        let len = reader.i32()?;
        let _lower_bound = reader.i32()?;
        dims.push(usize::try_from(len).map_err(|_| format!("negative array length {}", len))?);
    }

    let total: usize = if dims.is_empty() { 0 } else { dims.iter().product() };
    let mut items = Vec::new();
    for _ in 0..total {
        match reader.i32()? {
            -1 => items.push(Value::Null),
            len => {
                let len = usize::try_from(len).map_err(|_| format!("bad element length {}", len))?;
                items.push(decode_binary(element, reader.take(len)?)?);
            }
        }
    }

    Ok(nest(&dims, &mut items.into_iter()))
}

fn nest<I: Iterator<Item = Value>>(dims: &[usize], items: &mut I) -> Value {
    match dims.split_first() {
        Some((&len, [])) => Value::Array(items.by_ref().take(len).collect()),
        Some((&len, rest)) => Value::Array((0..len).map(|_| nest(rest, items)).collect()),
        None => Value::Array(Vec::new()),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        if self.buf.len() < n {
            return Err(format!("truncated value: need {} bytes, have {}", n, self.buf.len()));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn i32(&mut self) -> Result<i32, String> {
        Ok(i32::from_be_bytes(fixed(self.take(4)?)?))
    }

    fn i64(&mut self) -> Result<i64, String> {
        Ok(i64::from_be_bytes(fixed(self.take(8)?)?))
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], String> {
    bytes
        .try_into()
        .map_err(|_| format!("expected {} bytes, got {}", N, bytes.len()))
}

/// JSON has no NaN or infinity; those become the strings Postgres prints.
fn float(x: f64) -> Value {
    match Number::from_f64(x) {
        Some(n) => Value::Number(n),
        None if x.is_nan() => Value::String("NaN".to_string()),
        None if x > 0.0 => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}

fn hex_literal(bytes: &[u8]) -> Value {
    let mut hex = String::with_capacity(2 + bytes.len() * 2);
    hex.push_str("\\x");
    for b in bytes {
        let _ = write!(hex, "{:02x}", b);
    }
    Value::String(hex)
}

fn pg_epoch() -> Result<NaiveDateTime, String> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| "invalid epoch".to_string())
}

/// DATE is days since 2000-01-01; the extreme values mean +/- infinity.
fn date_to_string(days: i32) -> Result<String, String> {
    match days {
        i32::MAX => Ok("infinity".to_string()),
        i32::MIN => Ok("-infinity".to_string()),
        _ => pg_epoch()?
            .date()
            .checked_add_signed(Duration::days(days as i64))
            .map(|d| d.to_string())
            .ok_or_else(|| format!("date out of range: {} days", days)),
    }
}

/// TIMESTAMP[TZ] is microseconds since 2000-01-01 UTC; the extreme values
/// mean +/- infinity.
fn timestamp_to_string(micros: i64, with_zone: bool) -> Result<String, String> {
    match micros {
        i64::MAX => return Ok("infinity".to_string()),
        i64::MIN => return Ok("-infinity".to_string()),
        _ => {}
    }
    let at = pg_epoch()?
        .checked_add_signed(Duration::microseconds(micros))
        .ok_or_else(|| format!("timestamp out of range: {} us", micros))?;
    Ok(if with_zone {
        DateTime::<Utc>::from_naive_utc_and_offset(at, Utc).to_rfc3339()
    } else {
        at.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    })
}

fn time_to_string(micros: i64) -> Result<String, String> {
    if micros == MICROS_PER_DAY {
        return Ok("24:00:00".to_string());
    }
    let secs = u32::try_from(micros.div_euclid(MICROS_PER_SECOND as i64))
        .map_err(|_| format!("time out of range: {} us", micros))?;
    let nanos = (micros.rem_euclid(MICROS_PER_SECOND as i64) * 1_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .map(|t| t.to_string())
        .ok_or_else(|| format!("time out of range: {} us", micros))
}

fn utc_offset(seconds_east: i32) -> String {
    let sign = if seconds_east < 0 { '-' } else { '+' };
    let abs = seconds_east.unsigned_abs();
    let (h, m, s) = (abs / 3600, abs / 60 % 60, abs % 60);
    match (m, s) {
        (0, 0) => format!("{}{:02}", sign, h),
        (_, 0) => format!("{}{:02}:{:02}", sign, h, m),
        _ => format!("{}{:02}:{:02}:{:02}", sign, h, m, s),
    }
}

/// Render an interval the way Postgres prints it by default, e.g.
/// `1 year 2 mons 3 days 04:05:06.5`.
fn interval_to_string(interval: &PgInterval) -> String {
    fn unit(n: i32, one: &str, many: &str) -> String {
        format!("{} {}", n, if n == 1 { one } else { many })
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days, "day", "days"));
    }
    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let abs = interval.microseconds.unsigned_abs();
        let secs = abs / MICROS_PER_SECOND;
        let mut clock = format!("{}{:02}:{:02}:{:02}", sign, secs / 3600, secs / 60 % 60, secs % 60);
        let frac = abs % MICROS_PER_SECOND;
        if frac > 0 {
            let digits = format!("{:06}", frac);
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

/// INET/CIDR layout: `family: u8, bits: u8, is_cidr: u8, nbytes: u8`, then
/// the address bytes. The prefix is omitted for a host `inet`.
fn inet_to_string(bytes: &[u8]) -> Result<String, String> {
    let mut reader = Reader::new(bytes);
    let header = reader.take(4)?;
    let (family, bits, is_cidr, len) = (header[0], header[1], header[2] != 0, header[3] as usize);
    let addr = reader.take(len)?;

    let (text, max_bits) = match (family, len) {
        (PGSQL_AF_INET, 4) => (Ipv4Addr::from(fixed::<4>(addr)?).to_string(), 32),
        (PGSQL_AF_INET6, 16) => (Ipv6Addr::from(fixed::<16>(addr)?).to_string(), 128),
        _ => return Err(format!("unsupported address family {} ({} bytes)", family, len)),
    };

    Ok(if is_cidr || bits != max_bits {
        format!("{}/{}", text, bits)
    } else {
        text
    })
}

/// MONEY is an integer count of cents.
fn money_to_string(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Render a binary-format NUMERIC as a decimal string.
///
/// Layout: `ndigits: i16, weight: i16, sign: u16, dscale: u16`, then
/// `ndigits` base-10000 digits (`i16`), most significant first. `weight` is
/// the power of 10000 of the first digit.
fn numeric_to_string(bytes: &[u8]) -> Option<String> {
    let header = |i: usize| -> Option<[u8; 2]> { Some([*bytes.get(i)?, *bytes.get(i + 1)?]) };

    let ndigits = i16::from_be_bytes(header(0)?);
    let weight = i16::from_be_bytes(header(2)?) as i32;
    let sign = u16::from_be_bytes(header(4)?);
    let dscale = u16::from_be_bytes(header(6)?) as usize;

    match sign {
        NUMERIC_NAN => return Some("NaN".to_string()),
        NUMERIC_PINF => return Some("Infinity".to_string()),
        NUMERIC_NINF => return Some("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        _ => return None,
    }

    if ndigits < 0 {
        return None;
    }
    let digits: Vec<i16> = (0..ndigits as usize)
        .map(|i| header(8 + i * 2).map(i16::from_be_bytes))
        .collect::<Option<_>>()?;

    let digit = |i: i32| -> i16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG && !digits.iter().all(|d| *d == 0) {
        out.push('-');
    }

    if weight >= 0 {
        let _ = write!(out, "{}", digit(0));
        for i in 1..=weight {
            let _ = write!(out, "{:04}", digit(i));
        }
    } else {
        out.push('0');
    }

    if dscale > 0 {
        let mut frac = String::new();
        let mut i = weight + 1;
        while frac.len() < dscale {
            let _ = write!(frac, "{:04}", digit(i));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Some(out)
}
