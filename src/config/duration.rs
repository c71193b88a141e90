//! ISO-8601 duration literals (`PT5M`, `PT0.5S`, `P1DT2H`, `P2W`).
//!
//! Years and months are rejected: their length depends on the calendar.

use std::time::Duration;

use crate::error::ConfigError;

/// Parse an ISO-8601 duration literal into a [`Duration`].
pub fn parse_duration(literal: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::Duration {
        value: literal.to_string(),
        reason: reason.to_string(),
    };

    let body = literal
        .trim()
        .strip_prefix(['P', 'p'])
        .ok_or_else(|| invalid("must start with 'P'"))?;
    if body.is_empty() {
        return Err(invalid("no components"));
    }

    let (date_part, time_part) = match body.find(['T', 't']) {
        Some(idx) => {
            let time = &body[idx + 1..];
            if time.is_empty() {
                return Err(invalid("'T' without time components"));
            }
            (&body[..idx], Some(time))
        }
        None => (body, None),
    };

    let mut total = 0f64;
    for (value, unit) in components(date_part).map_err(|r| invalid(&r))? {
        total += value
            * match unit {
                'W' => 7.0 * 86_400.0,
                'D' => 86_400.0,
                'Y' | 'M' => return Err(invalid("years and months are not supported")),
                _ => return Err(invalid(&format!("unknown date unit '{unit}'"))),
            };
    }
    if let Some(time_part) = time_part {
        for (value, unit) in components(time_part).map_err(|r| invalid(&r))? {
            total += value
                * match unit {
                    'H' => 3_600.0,
                    'M' => 60.0,
                    'S' => 1.0,
                    _ => return Err(invalid(&format!("unknown time unit '{unit}'"))),
                };
        }
    }

    Duration::try_from_secs_f64(total).map_err(|e| invalid(&e.to_string()))
}

/// Split `12H30M` style text into `(value, unit)` pairs.
fn components(text: &str) -> Result<Vec<(f64, char)>, String> {
    let mut out = Vec::new();
    let mut number = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() || ch == '.' || ch == ',' {
            number.push(if ch == ',' { '.' } else { ch });
            continue;
        }
        if number.is_empty() {
            return Err(format!("unit '{ch}' without a value"));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| format!("bad number {number:?}"))?;
        out.push((value, ch.to_ascii_uppercase()));
        number.clear();
    }
    if !number.is_empty() {
        return Err(format!("value {number:?} without a unit"));
    }
    Ok(out)
}
