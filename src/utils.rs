use chrono::{Datelike, NaiveDate};

/// Formats accepted for transaction dates, tried in order after `YYYY-MM`.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
];

/// Month-only formats; the day is pinned to the 1st.
const MONTH_FORMATS: &[&str] = &["%b %Y", "%B %Y", "%Y/%m", "%m/%Y"];

pub fn first_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_year_month(raw: &str) -> Option<NaiveDate> {
    let (year, month) = raw.trim().split_once('-')?;
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    first_day_of_month(year.parse().ok()?, month.parse().ok()?)
}

/// Parses a transaction date: `YYYY-MM` first, then the common statement formats.
pub fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(date) = parse_year_month(trimmed) {
        return Some(date);
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
    {
        return Some(date);
    }

    MONTH_FORMATS.iter().find_map(|fmt| {
        let padded = format!("1 {}", trimmed);
        NaiveDate::parse_from_str(&padded, &format!("%d {}", fmt)).ok()
    })
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Parses an amount after stripping currency symbols and codes, spaces and
/// thousands separators. Parenthesised values are negative.
///
/// When both `.` and `,` appear, the later one is the decimal separator. A
/// lone `,` followed by exactly three digits is a thousands separator,
/// otherwise a decimal comma.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_matches('"').trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, trimmed),
    };

    // Plain and scientific notation
    let value = match body.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            let kept: String = body
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
                .collect();
            normalize_separators(&kept)?.parse().ok()?
        }
    };

    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value.abs() } else { value })
}

fn normalize_separators(number: &str) -> Option<String> {
    if !number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = number.rfind('.');
    let last_comma = number.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => number.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => number.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = number.len() - comma - 1;
            if number.matches(',').count() == 1 && decimals != 3 {
                number.replace(',', ".")
            } else {
                number.replace(',', "")
            }
        }
        _ => number.to_string(),
    };
    Some(normalized)
}

/// `None` for NaN or infinite values.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Mean of the defined values; `None` when nothing is defined.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        finite(sum / count as f64)
    }
}
