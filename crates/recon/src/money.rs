//! Money helpers.
//!
//! Amounts are always `i64` minor units (cents). Parsing uses integer math,
//! never floats, and accepts at most 2 decimal places.

/// Parse a report amount token into cents.
///
/// Accepts `1234.56`, `1,234.56`, `$1,234.56`, `-$1,234.56`, `$-1,234.56`,
/// `($1,234.56)` and a trailing `CR` / `-` credit marker.
pub fn parse_amount(raw: &str) -> Result<i64, String> {
    let mut s = raw.trim();
    if s.is_empty() {
        return Err("empty amount".into());
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = &s[1..s.len() - 1];
    }
    if let Some(rest) = s.strip_suffix("CR") {
        negative = !negative;
        s = rest.trim_end();
    } else if let Some(rest) = s.strip_suffix('-') {
        negative = !negative;
        s = rest;
    }

    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
    let cleaned = cleaned.trim();
    let (sign_negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned),
    };
    if sign_negative {
        negative = !negative;
    }

    let minor = parse_money_string(digits)?;
    Ok(if negative { -minor } else { minor })
}

/// Decimal string (no separators, no sign) to cents.
fn parse_money_string(s: &str) -> Result<i64, String> {
    let has_digit = s.chars().any(|c| c.is_ascii_digit());
    if !has_digit || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(format!("bad amount: {s:?}"));
    }
    let (dollars, cents) = if let Some(dot) = s.find('.') {
        let whole = &s[..dot];
        let d: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|e| format!("bad dollars: {}", e))?
        };
        let frac = &s[dot + 1..];
        let c: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|e| format!("bad cents: {}", e))? * 10,
            2 => frac.parse().map_err(|e| format!("bad cents: {}", e))?,
            _ => return Err(format!("too many decimal places: {}", s)),
        };
        (d, c)
    } else {
        (s.parse().map_err(|e| format!("bad amount: {}", e))?, 0)
    };
    dollars
        .checked_mul(100)
        .and_then(|d| d.checked_add(cents))
        .ok_or_else(|| format!("amount out of range: {s}"))
}

/// Render cents as a plain 2-dp decimal (`-1234.50`), no separators.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Cents as an f64 for spreadsheet cells. Display only, never summed.
pub fn cents_to_f64(cents: i64) -> f64 {
    cents as f64 / 100.0
}
