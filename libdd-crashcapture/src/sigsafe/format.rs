// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Number and timestamp formatting usable from a signal handler.
//!
//! `core::fmt` is off limits while a crash is being handled: it may allocate through the
//! `Display` impls it dispatches to and it is not documented as async-signal-safe. Every routine
//! here writes into a caller supplied buffer, takes no lock, and runs in time bounded by the size
//! of its output.
//!
//! All routines return the length of the text written. A NUL terminator is appended after the
//! text when the buffer has room for it. When the text does not fit, nothing is written, the
//! buffer (if non-empty) starts with a NUL, and the return value is `0`.

/// Buffer size able to hold any `u64` in decimal, including the terminator.
pub const U64_DIGITS_MAX: usize = 20 + 1;
/// Buffer size able to hold any `i64` in decimal, including sign and terminator.
pub const I64_DIGITS_MAX: usize = 21;
/// Maximum number of digits a hex rendering of a `u64` uses.
pub const HEX_DIGITS_MAX: usize = 16;
/// Maximum number of significant digits honoured by [format_f64].
pub const F64_SIGNIFICANT_MAX: usize = 16;
/// Buffer size able to hold any [format_f64] output, including the terminator.
pub const F64_BUFFER_LEN: usize = 32;
/// Length of a `YYYY-MM-DDThh:mm:ssZ` timestamp, without the terminator.
pub const ISO8601_LEN: usize = 20;

const HEX_ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Appends bytes to a fixed buffer, remembering whether anything was dropped.
struct Cursor<'a> {
    buf: &'a mut [u8],
    len: usize,
    overflow: bool,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            overflow: false,
        }
    }

    fn push(&mut self, byte: u8) {
        match self.buf.get_mut(self.len) {
            Some(slot) => {
                *slot = byte;
                self.len += 1;
            }
            None => self.overflow = true,
        }
    }

    fn push_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Writes the digits of `value` zero padded to at least `width`.
    fn push_decimal(&mut self, value: u64, width: usize) {
        let mut digits = [0u8; 20];
        let used = decimal_digits(value, &mut digits);
        for _ in used..width {
            self.push(b'0');
        }
        self.push_all(&digits[digits.len() - used..]);
    }

    fn finish(self) -> usize {
        if self.overflow {
            if let Some(first) = self.buf.first_mut() {
                *first = 0;
            }
            return 0;
        }
        if let Some(terminator) = self.buf.get_mut(self.len) {
            *terminator = 0;
        }
        self.len
    }
}

/// Fills `digits` from the right and returns how many were used.
fn decimal_digits(mut value: u64, digits: &mut [u8; 20]) -> usize {
    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    digits.len() - i
}

/// Writes `value` in decimal without leading zeros.
pub fn format_u64(value: u64, buf: &mut [u8]) -> usize {
    let mut cursor = Cursor::new(buf);
    cursor.push_decimal(value, 0);
    cursor.finish()
}

/// Writes `value` in decimal, with a leading `-` when negative.
pub fn format_i64(value: i64, buf: &mut [u8]) -> usize {
    let mut cursor = Cursor::new(buf);
    if value < 0 {
        cursor.push(b'-');
    }
    cursor.push_decimal(value.unsigned_abs(), 0);
    cursor.finish()
}

/// Writes `value` in lowercase hexadecimal, left padded with `0` to `min_digits`.
/// `min_digits` is clamped to `1..=16`. No `0x` prefix is written.
pub fn format_hex(value: u64, min_digits: usize, buf: &mut [u8]) -> usize {
    let min_digits = min_digits.clamp(1, HEX_DIGITS_MAX);
    let significant = (HEX_DIGITS_MAX - value.leading_zeros() as usize / 4).max(1);
    let digits = significant.max(min_digits);

    let mut cursor = Cursor::new(buf);
    for i in (0..digits).rev() {
        let nibble = (value >> (i * 4)) & 0xf;
        cursor.push(HEX_ALPHABET[nibble as usize]);
    }
    cursor.finish()
}

/// Multiplies `value` by `10^power` in steps that stay inside the `f64` range.
fn scale_by_power_of_ten(mut value: f64, mut power: i32) -> f64 {
    while power > 300 {
        value *= 1e300;
        power -= 300;
    }
    while power < -300 {
        value /= 1e300;
        power += 300;
    }
    if power >= 0 {
        value * 10f64.powi(power)
    } else {
        value / 10f64.powi(-power)
    }
}

/// Writes `value` with at most `significant` significant digits (clamped to `1..=16`).
///
/// Special values render as `nan`, `inf` and `-inf`, and zero as `0`. Otherwise the
/// mantissa is rounded half-up, trailing fractional zeros and a dangling decimal point are
/// removed, and an exponent (`e+N` / `e-N`) is appended whenever the decimal exponent is not
/// zero: `1.5` renders as `1.5`, `150.0` as `1.5e+2` and `0.015` as `1.5e-2`.
///
/// The output is stable and parses back to the input within the requested precision; it is not
/// guaranteed to match `core::fmt` output digit for digit.
pub fn format_f64(value: f64, significant: usize, buf: &mut [u8]) -> usize {
    let mut cursor = Cursor::new(buf);
    if value.is_nan() {
        cursor.push_all(b"nan");
        return cursor.finish();
    }
    if value.is_sign_negative() && value != 0.0 {
        cursor.push(b'-');
    }
    let magnitude = value.abs();
    if magnitude.is_infinite() {
        cursor.push_all(b"inf");
        return cursor.finish();
    }
    if magnitude == 0.0 {
        cursor.push(b'0');
        return cursor.finish();
    }

    let significant = significant.clamp(1, F64_SIGNIFICANT_MAX);
    let mut exponent = magnitude.log10().floor() as i32;
    let mut mantissa = scale_by_power_of_ten(magnitude, -exponent);
    // log10 can land one off around exact powers of ten.
    if mantissa >= 10.0 {
        mantissa /= 10.0;
        exponent += 1;
    } else if mantissa < 1.0 {
        mantissa *= 10.0;
        exponent -= 1;
    }

    let limit = 10u64.pow(significant as u32);
    let mut digits = (mantissa * 10f64.powi(significant as i32 - 1) + 0.5) as u64;
    if digits >= limit {
        // Rounding carried into a new digit, e.g. 9.99 -> 10.0
        digits /= 10;
        exponent += 1;
    }

    let mut rendered = [0u8; 20];
    let used = decimal_digits(digits, &mut rendered);
    let rendered = &rendered[rendered.len() - used..];
    let fraction = rendered[1..]
        .iter()
        .rposition(|&d| d != b'0')
        .map_or(0, |last| last + 1);

    cursor.push(rendered[0]);
    if fraction > 0 {
        cursor.push(b'.');
        cursor.push_all(&rendered[1..=fraction]);
    }
    if exponent != 0 {
        cursor.push(b'e');
        cursor.push(if exponent < 0 { b'-' } else { b'+' });
        cursor.push_decimal(exponent.unsigned_abs() as u64, 0);
    }
    cursor.finish()
}

/// Converts days since 1970-01-01 to a proleptic Gregorian (year, month, day).
/// <https://howardhinnant.github.io/date_algorithms.html#civil_from_days>
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Writes the unix timestamp `seconds` as `YYYY-MM-DDThh:mm:ssZ` (UTC).
///
/// Years outside `0..=9999` are written with as many digits as they need and a leading `-` when
/// negative; callers that care about strict ISO-8601 should keep timestamps in range.
pub fn format_iso8601(seconds: i64, buf: &mut [u8]) -> usize {
    let days = seconds.div_euclid(86_400);
    let secs_of_day = seconds.rem_euclid(86_400) as u64;
    let (year, month, day) = civil_from_days(days);

    let mut cursor = Cursor::new(buf);
    if year < 0 {
        cursor.push(b'-');
    }
    cursor.push_decimal(year.unsigned_abs(), 4);
    cursor.push(b'-');
    cursor.push_decimal(u64::from(month), 2);
    cursor.push(b'-');
    cursor.push_decimal(u64::from(day), 2);
    cursor.push(b'T');
    cursor.push_decimal(secs_of_day / 3600, 2);
    cursor.push(b':');
    cursor.push_decimal(secs_of_day / 60 % 60, 2);
    cursor.push(b':');
    cursor.push_decimal(secs_of_day % 60, 2);
    cursor.push(b'Z');
    cursor.finish()
}
