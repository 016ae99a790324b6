//! Human-readable size and rate tokens.
//!
//! The extraction tool reports sizes like `12.34MiB` and rates like
//! `1.23MiB/s`. These helpers turn them into byte counts and never fail:
//! anything unparseable becomes 0.

/// Parses a size token (e.g. `12.34MiB`, `500`, `3.1 KB`, `N/A`) into bytes.
///
/// Units `K`, `M`, `G`, `T` are binary multiples and may be followed by `i`
/// and/or `B`. A leading `~` (estimated size) is ignored. Fractional bytes
/// are truncated. With an unrecognized suffix the leading numeric portion is
/// taken as raw bytes; if there is none the result is 0.
#[must_use]
pub fn parse_size_to_bytes(token: &str) -> u64 {
    let token = token.trim().trim_start_matches('~').trim();
    if token.is_empty() || token.eq_ignore_ascii_case("n/a") {
        return 0;
    }

    let upper = token.to_ascii_uppercase();
    let unitless = upper.strip_suffix('B').unwrap_or(&upper);
    let unitless = unitless.strip_suffix('I').unwrap_or(unitless);

    let (number, multiplier) = match unitless.char_indices().next_back() {
        Some((index, 'K')) => (&unitless[..index], 1024_f64),
        Some((index, 'M')) => (&unitless[..index], 1024_f64.powi(2)),
        Some((index, 'G')) => (&unitless[..index], 1024_f64.powi(3)),
        Some((index, 'T')) => (&unitless[..index], 1024_f64.powi(4)),
        _ => (unitless, 1.0),
    };

    match number.trim().parse::<f64>() {
        Ok(value) => to_bytes(value * multiplier),
        Err(_) => leading_number(token).map_or(0, to_bytes),
    }
}

/// Parses a rate token such as `1.23MiB/s` into bytes per second.
#[must_use]
pub fn parse_rate_to_bytes(token: &str) -> u64 {
    let token = token.trim();
    parse_size_to_bytes(token.strip_suffix("/s").unwrap_or(token))
}

/// Leading `[0-9.]` run of `token`, parsed as a float.
fn leading_number(token: &str) -> Option<f64> {
    let end = token
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(token.len(), |(index, _)| index);
    token[..end].parse::<f64>().ok()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_bytes(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value as u64
    } else {
        0
    }
}
