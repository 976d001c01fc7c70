// Utility helpers for value coercion, timestamps and display formatting.
//
// Raw store values are loosely typed; everything here turns them into plain
// `f64`/chrono values once so the pipeline only ever sees typed data.
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use num_format::{Locale, ToFormattedString};
use serde_json::Value;

/// Coerce a store value to `f64`.
///
/// The store hands out numbers either as JSON numbers or as decimal text
/// (arbitrary-precision attributes), so both are accepted. Anything else,
/// including non-finite text such as `"NaN"`, yields `None`.
pub fn coerce_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok().filter(|x| x.is_finite())
        }
        _ => None,
    }
}

/// Render a store value as text. Numbers keep their JSON spelling.
pub fn coerce_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a timestamp as written by the machining app.
///
/// RFC 3339 values keep their offset so that calendar matching uses the
/// wall-clock month they were recorded in. Naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().with_timezone(&utc));
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().with_timezone(&utc))
}

/// Minutes from `start` to `end`, rounded to two decimals.
pub fn minutes_between(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> f64 {
    let secs = end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0;
    round2(secs / 60.0)
}

/// Round to two decimals, ties to even, on the exact decimal value of `x`.
///
/// Scaling by 100 first would turn near-ties such as 2.675 (stored as
/// 2.67499...) into exact ties, so the rounding goes through the formatter.
pub fn round2(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    format!("{:.2}", x).parse().unwrap_or(x)
}

/// `num / den`, or zero when the denominator is zero or the result is not finite.
pub fn ratio_or_zero(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    let r = num / den;
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Sorted distinct months and years from `start` up to `today`, stepping one
/// month at a time.
pub fn months_and_years_since(start: NaiveDate, today: NaiveDate) -> (Vec<u32>, Vec<i32>) {
    let mut months = Vec::new();
    let mut years = Vec::new();
    let mut cursor = start;
    while cursor <= today {
        if !months.contains(&cursor.month()) {
            months.push(cursor.month());
        }
        if !years.contains(&cursor.year()) {
            years.push(cursor.year());
        }
        cursor = add_months(cursor, 1);
    }
    months.sort_unstable();
    years.sort_unstable();
    (months, years)
}

/// Step a date forward by whole months, clamping the day to the target month.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let zero_based = date.month0() + months;
    let year = date.year() + (zero_based / 12) as i32;
    let month = zero_based % 12 + 1;
    let mut day = date.day();
    loop {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
            return d;
        }
        day -= 1;
    }
}

/// The month reported by default: the calendar month before `today`.
pub fn default_period(today: NaiveDate) -> (i32, u32) {
    if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
