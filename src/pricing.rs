use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::models::Cost;

#[derive(Debug, Error, PartialEq)]
pub enum PriceError {
    #[error("not a price amount: {0:?}")]
    Amount(String),
    #[error("inverted price range: {0} > {1}")]
    InvertedRange(f64, f64),
}

/// Parse a free-text price into a tagged cost. Never fails: anything that
/// cannot be understood comes back as free, with a warning logged.
pub fn parse_price_string(input: &str) -> Cost {
    match try_parse_price(input) {
        Ok(cost) => cost,
        Err(err) => {
            warn!(input, error = %err, "unparseable price, defaulting to free");
            Cost::Single(0.0)
        }
    }
}

/// Strict variant of [`parse_price_string`].
pub fn try_parse_price(input: &str) -> Result<Cost, PriceError> {
    let normalized = input.trim().to_lowercase().replace('$', "");
    let normalized = normalized.trim();

    if normalized.is_empty() || normalized == "free" {
        return Ok(Cost::Single(0.0));
    }

    if let Some((low, high)) = normalized.split_once('-') {
        let min = parse_amount(low)?;
        let max = parse_amount(high)?;
        if min > max {
            return Err(PriceError::InvertedRange(min, max));
        }
        return Ok(Cost::Range(min, max));
    }

    if normalized.contains('+') {
        return parse_amount(&normalized.replace('+', "")).map(Cost::Minimum);
    }

    parse_amount(normalized).map(Cost::Single)
}

fn parse_amount(text: &str) -> Result<f64, PriceError> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(PriceError::Amount(trimmed.to_string())),
    }
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("${}", value as i64)
    } else {
        format!("${value:.2}")
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Single(value) if *value == 0.0 => f.write_str("Free"),
            Cost::Single(value) => f.write_str(&format_amount(*value)),
            Cost::Range(min, max) => {
                write!(f, "{} - {}", format_amount(*min), format_amount(*max))
            }
            Cost::Minimum(value) => write!(f, "{}+", format_amount(*value)),
        }
    }
}
